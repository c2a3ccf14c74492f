//! Authorization of requests against bearer tokens
//!
//! An [`AccessController`] decides whether a request may take a set of
//! actions on a set of resources. [`TokenAccessController`] makes that
//! decision from the bearer token in the `Authorization` header:
//!
//! 1. the header must hold exactly `Bearer <token>`,
//! 2. the token must parse,
//! 3. the token must verify against the configured trust store, issuer
//!    and service, and
//! 4. every requested access must be granted by the token.
//!
//! The first failing step is returned as a [`Challenge`].

use std::{fmt, sync::Arc, time::Duration};

use http::{header, HeaderMap, Request};
use regex::Regex;

use crate::{
    access::{Access, AccessSet},
    challenge::Challenge,
    clock::{Clock, System},
    error::{AuthError, ConfigError},
    options::Options,
    token::{Audience, Issuer, RawTokenRef, Token, VerifyOptions, DEFAULT_LEEWAY},
    trust::TrustStore,
};

/// Decides whether a request may access resources
pub trait AccessController {
    /// Checks that the request carrying `headers` is granted every access
    /// in `accesses`
    ///
    /// # Errors
    ///
    /// Returns a challenge to send back to the client when access is denied.
    fn authorized(&self, headers: &HeaderMap, accesses: &[Access]) -> Result<(), Challenge>;

    /// Checks that `request` is granted every access in `accesses`
    ///
    /// # Errors
    ///
    /// Returns a challenge to send back to the client when access is denied.
    fn authorized_request<B>(
        &self,
        request: &Request<B>,
        accesses: &[Access],
    ) -> Result<(), Challenge>
    where
        Self: Sized,
    {
        self.authorized(request.headers(), accesses)
    }
}

macro_rules! delegate_impls {
    ($($ty:ty)*) => {
        $(
            impl<T> AccessController for $ty
            where
                T: AccessController + ?Sized,
            {
                #[inline]
                fn authorized(&self, headers: &HeaderMap, accesses: &[Access]) -> Result<(), Challenge> {
                    T::authorized(self, headers, accesses)
                }
            }
        )*
    };
}

delegate_impls!(&'_ T Box<T> Arc<T>);

/// An access controller that authorizes requests with bearer tokens
///
/// Cloning is cheap: the trust store is shared.
#[derive(Clone)]
pub struct TokenAccessController<C = System> {
    realm: String,
    issuer: Issuer,
    service: Audience,
    trust_store: Arc<TrustStore>,
    leeway: Duration,
    subject_pattern: Option<Regex>,
    clock: C,
}

impl TokenAccessController {
    /// Constructs a controller trusting tokens from `issuer` intended for
    /// `service`
    ///
    /// `realm` is where clients are told to go for a token.
    pub fn new(
        realm: impl Into<String>,
        issuer: impl Into<Issuer>,
        service: impl Into<Audience>,
        trust_store: Arc<TrustStore>,
    ) -> Self {
        Self {
            realm: realm.into(),
            issuer: issuer.into(),
            service: service.into(),
            trust_store,
            leeway: DEFAULT_LEEWAY,
            subject_pattern: None,
            clock: System,
        }
    }

    /// Constructs a controller from typed options, reading the root
    /// certificate bundle they name
    ///
    /// # Errors
    ///
    /// Returns an error if the bundle cannot be read or holds no usable
    /// certificates.
    pub fn from_options(options: &Options) -> Result<Self, ConfigError> {
        let trust_store = TrustStore::from_pem_file(&options.root_cert_bundle)?;

        Ok(Self::new(
            options.realm.clone(),
            options.issuer.clone(),
            options.service.clone(),
            Arc::new(trust_store),
        ))
    }
}

impl<C> TokenAccessController<C> {
    /// Sets the leeway applied to the `nbf` and `iat` claims
    #[must_use]
    pub fn with_leeway(self, leeway: Duration) -> Self {
        Self { leeway, ..self }
    }

    /// Requires token subjects to match `pattern`
    #[must_use]
    pub fn with_subject_pattern(self, pattern: Regex) -> Self {
        Self {
            subject_pattern: Some(pattern),
            ..self
        }
    }

    /// Replaces the clock used to check token validity
    ///
    /// The clock also decides whether certificates in an `x5c` chain are
    /// within their validity period.
    #[must_use]
    pub fn with_clock<D: Clock>(self, clock: D) -> TokenAccessController<D> {
        TokenAccessController {
            realm: self.realm,
            issuer: self.issuer,
            service: self.service,
            trust_store: self.trust_store,
            leeway: self.leeway,
            subject_pattern: self.subject_pattern,
            clock,
        }
    }

    /// Where clients are told to obtain tokens
    #[inline]
    pub fn realm(&self) -> &str {
        &self.realm
    }

    /// The trusted token issuer
    #[inline]
    pub fn issuer(&self) -> &Issuer {
        &self.issuer
    }

    /// The service name, which tokens must name as their audience
    #[inline]
    pub fn service(&self) -> &Audience {
        &self.service
    }

    /// The shared trust store
    #[inline]
    pub fn trust_store(&self) -> &Arc<TrustStore> {
        &self.trust_store
    }
}

impl<C: Clock> TokenAccessController<C> {
    fn check(&self, headers: &HeaderMap, accesses: &[Access]) -> Result<(), AuthError> {
        let raw = bearer_token(headers).ok_or(AuthError::TokenRequired)?;
        let token = Token::parse(raw)?;

        let mut options = VerifyOptions::new(&self.trust_store)
            .add_trusted_issuer(self.issuer.clone())
            .add_accepted_audience(self.service.clone())
            .with_leeway(self.leeway);

        if let Some(pattern) = &self.subject_pattern {
            options = options.check_subject(pattern);
        }

        let verified = token.verify_with_clock(&options, &self.clock)?;
        let granted = verified.access_set();

        if let Some(missing) = accesses.iter().find(|a| !granted.contains(a)) {
            tracing::debug!(
                subject = %verified.claims().subject(),
                %missing,
                "token does not grant requested access"
            );
            return Err(AuthError::InsufficientScope);
        }

        tracing::trace!(
            subject = %verified.claims().subject(),
            accesses = accesses.len(),
            "request authorized"
        );

        Ok(())
    }
}

impl<C: Clock> AccessController for TokenAccessController<C> {
    fn authorized(&self, headers: &HeaderMap, accesses: &[Access]) -> Result<(), Challenge> {
        let requested: AccessSet = accesses.iter().collect();

        self.check(headers, accesses).map_err(|error| {
            tracing::debug!(realm = %self.realm, %error, "authorization denied");
            Challenge::new(error, self.realm.clone(), self.service.as_str(), requested)
        })
    }
}

impl<C: fmt::Debug> fmt::Debug for TokenAccessController<C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TokenAccessController")
            .field("realm", &self.realm)
            .field("issuer", &self.issuer)
            .field("service", &self.service)
            .field("trust_store", &self.trust_store)
            .field("leeway", &self.leeway)
            .field("subject_pattern", &self.subject_pattern.as_ref().map(Regex::as_str))
            .field("clock", &self.clock)
            .finish()
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header
fn bearer_token(headers: &HeaderMap) -> Option<&RawTokenRef> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;

    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => {
            Some(RawTokenRef::from_str(token))
        }
        _ => None,
    }
}
