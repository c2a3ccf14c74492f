//! Bearer token access control for resource servers
//!
//! This crate authorizes requests to typed, named resources (such as
//! `repository:lib/foo`) using signed bearer tokens minted by a trusted
//! token issuer. A request states the accesses it needs; the token in its
//! `Authorization` header states the accesses it grants. The request is
//! allowed only when the token is valid and grants everything requested.
//!
//! When a request is denied, the controller produces a [`Challenge`] which
//! renders as a `401 Unauthorized` response with a bearer challenge
//! ([RFC6750][]) telling the client where to get a better token:
//!
//! ```http
//! WWW-Authenticate: Bearer realm="https://auth.example.com/token",service="registry.example.com",scope="repository:lib/foo:pull",error="insufficient_scope"
//! ```
//!
//! Tokens use the JWS compact serialization ([RFC7515][]) and must be signed
//! with RSA or ECDSA by a key whose certificate is in the configured root
//! bundle, or by a certificate chain leading to one.
//!
//! # Example
//!
//! ```no_run
//! use std::collections::HashMap;
//!
//! use http::{header, HeaderMap, HeaderValue};
//! use portcullis::{Access, AccessController};
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
//! let mut headers = HeaderMap::new();
//! headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer eyJ..."));
//!
//! let wanted = [Access::new("repository", "lib/foo", "pull")];
//! if let Err(challenge) = controller.authorized(&headers, &wanted) {
//!     let response: http::Response<()> = challenge.into_response();
//!     assert_eq!(response.status(), http::StatusCode::UNAUTHORIZED);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//!   [RFC6750]: https://tools.ietf.org/html/rfc6750
//!   [RFC7515]: https://tools.ietf.org/html/rfc7515

#![cfg_attr(docsrs, feature(doc_cfg))]
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

pub mod access;
pub mod challenge;
pub mod clock;
pub mod controller;
pub mod error;
pub mod jwa;
pub mod key;
pub mod options;
pub mod token;
pub mod trust;


#[doc(inline)]
pub use access::{Access, AccessSet, ActionSet, Resource};
#[doc(inline)]
pub use challenge::Challenge;
#[doc(inline)]
pub use controller::{AccessController, TokenAccessController};
#[doc(inline)]
pub use error::{AuthError, ConfigError};
#[doc(inline)]
pub use options::{new_access_controller, Options};
#[doc(inline)]
pub use token::{RawToken, RawTokenRef, Token, VerifiedToken};
#[doc(inline)]
pub use trust::TrustStore;
