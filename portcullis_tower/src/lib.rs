//! Access control for `tower_http` and other constructs in the ecosystem
//!
//! [`AccessControl`] pairs an [`AccessController`] with a way of working out
//! which accesses a request needs. It plugs into
//! [`ValidateRequestHeaderLayer::custom`], so any `tower` service (including
//! an `axum` router) can be guarded by it. Rejected requests never reach the
//! inner service; they are answered with the controller's bearer challenge.
//!
//! ```no_run
//! use std::collections::HashMap;
//!
//! use http::Request;
//! use portcullis::Access;
//! use portcullis_tower::AccessControl;
//! use serde_json::json;
//!
//! let options: HashMap<String, serde_json::Value> = serde_json::from_value(json!({
//!     "realm": "https://auth.example.com/token",
//!     "issuer": "issuer.example.com",
//!     "service": "registry.example.com",
//!     "rootCertBundle": "/etc/registry/token-roots.pem",
//! }))?;
//!
//! let controller = portcullis::new_access_controller(&options)?;
//!
//! // Reads need `pull`, everything else needs `push`
//! let layer = AccessControl::<_, _, ()>::new(controller, |req: &Request<()>| {
//!     let action = if req.method() == http::Method::GET { "pull" } else { "push" };
//!     vec![Access::new("repository", "lib/foo", action)]
//! })
//! .layer();
//! # drop(layer);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

use std::{fmt, marker::PhantomData, sync::Arc};

use http::{Request, Response};
use portcullis::{Access, AccessController};
use tower_http::validate_request::{ValidateRequest, ValidateRequestHeaderLayer};

/// Works out the accesses a request needs
pub trait RequestedAccess<B> {
    /// The accesses `request` must be granted to proceed
    fn requested_access(&self, request: &Request<B>) -> Vec<Access>;
}

impl<B, F> RequestedAccess<B> for F
where
    F: Fn(&Request<B>) -> Vec<Access>,
{
    #[inline]
    fn requested_access(&self, request: &Request<B>) -> Vec<Access> {
        self(request)
    }
}

/// The same accesses for every request
#[derive(Clone, Debug)]
pub struct Fixed(Arc<[Access]>);

impl Fixed {
    /// Requires `accesses` on every request
    pub fn new(accesses: impl IntoIterator<Item = Access>) -> Self {
        Self(accesses.into_iter().collect())
    }
}

impl<B> RequestedAccess<B> for Fixed {
    #[inline]
    fn requested_access(&self, _: &Request<B>) -> Vec<Access> {
        self.0.to_vec()
    }
}

/// Validates requests with an access controller
///
/// `ResBody` is the body type of the challenge response sent back when a
/// request is rejected.
pub struct AccessControl<A, R, ResBody> {
    controller: A,
    requested: R,
    _ty: PhantomData<fn() -> ResBody>,
}

impl<A, R, ResBody> AccessControl<A, R, ResBody> {
    /// Guards requests with `controller`, asking `requested` which accesses
    /// each request needs
    #[inline]
    pub fn new(controller: A, requested: R) -> Self {
        Self {
            controller,
            requested,
            _ty: PhantomData,
        }
    }

    /// The access controller in use
    #[inline]
    pub fn controller(&self) -> &A {
        &self.controller
    }

    /// Wraps this validator in a layer
    #[inline]
    pub fn layer(self) -> ValidateRequestHeaderLayer<Self> {
        ValidateRequestHeaderLayer::custom(self)
    }
}

impl<A, ResBody> AccessControl<A, Fixed, ResBody> {
    /// Guards requests with `controller`, requiring the same accesses on
    /// every request
    #[inline]
    pub fn fixed(controller: A, accesses: impl IntoIterator<Item = Access>) -> Self {
        Self::new(controller, Fixed::new(accesses))
    }
}

impl<A, R, ResBody> Clone for AccessControl<A, R, ResBody>
where
    A: Clone,
    R: Clone,
{
    #[inline]
    fn clone(&self) -> Self {
        Self {
            controller: self.controller.clone(),
            requested: self.requested.clone(),
            _ty: PhantomData,
        }
    }
}

impl<A, R, ResBody> fmt::Debug for AccessControl<A, R, ResBody>
where
    A: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("AccessControl")
            .field("controller", &self.controller)
            .finish_non_exhaustive()
    }
}

impl<A, R, ReqBody, ResBody> ValidateRequest<ReqBody> for AccessControl<A, R, ResBody>
where
    A: AccessController,
    R: RequestedAccess<ReqBody>,
    ResBody: Default,
{
    type ResponseBody = ResBody;

    fn validate(
        &mut self,
        request: &mut Request<ReqBody>,
    ) -> Result<(), Response<Self::ResponseBody>> {
        let accesses = self.requested.requested_access(request);

        match self.controller.authorized(request.headers(), &accesses) {
            Ok(()) => {
                tracing::trace!(
                    method = %request.method(),
                    uri = %request.uri(),
                    "request authorized"
                );
                Ok(())
            }
            Err(challenge) => {
                tracing::debug!(
                    method = %request.method(),
                    uri = %request.uri(),
                    error = %challenge,
                    "request rejected"
                );
                Err(challenge.into_response())
            }
        }
    }
}
