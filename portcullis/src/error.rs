//! Common errors

#![allow(missing_copy_implementations)]

use std::{error::Error as StdError, fmt, io, path::PathBuf};

use thiserror::Error;

/// The provided name could not be matched with supported algorithms
#[derive(Debug, Error)]
#[error("'{alg}' does not match supported algorithms")]
pub struct UnknownAlgorithm {
    alg: String,
}

impl UnknownAlgorithm {
    /// The algorithm name that was not recognized
    pub fn algorithm(&self) -> &str {
        &self.alg
    }
}

#[inline]
pub(crate) fn unknown_algorithm(alg: impl Into<String>) -> UnknownAlgorithm {
    UnknownAlgorithm { alg: alg.into() }
}

/// The key cannot be used with the requested algorithm
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Error)]
#[error("key incompatible with algorithm '{alg}'")]
pub struct IncompatibleAlgorithm {
    alg: crate::jwa::Algorithm,
}

#[inline]
pub(crate) fn incompatible_algorithm(
    alg: impl Into<crate::jwa::Algorithm>,
) -> IncompatibleAlgorithm {
    IncompatibleAlgorithm { alg: alg.into() }
}

/// The signature did not match
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Error)]
#[error("signature mismatch")]
pub struct SignatureMismatch {
    _p: (),
}

pub(crate) const fn signature_mismatch() -> SignatureMismatch {
    SignatureMismatch { _p: () }
}

/// An error occurring while verifying a signature with a public key
#[derive(Debug, Error)]
pub enum KeyVerifyError {
    /// The key cannot be used with this algorithm
    #[error(transparent)]
    IncompatibleAlgorithm(#[from] IncompatibleAlgorithm),

    /// Signature is invalid
    #[error(transparent)]
    SignatureMismatch(#[from] SignatureMismatch),
}

/// The public key is neither RSA nor an elliptic curve key on a supported curve
#[derive(Debug, Error)]
#[error("unsupported public key type")]
pub struct UnsupportedKey {
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

pub(crate) const fn unsupported_key() -> UnsupportedKey {
    UnsupportedKey { source: None }
}

pub(crate) fn unsupported_key_with_source(
    source: impl Into<Box<dyn StdError + Send + Sync + 'static>>,
) -> UnsupportedKey {
    UnsupportedKey {
        source: Some(source.into()),
    }
}

/// A scope string does not follow the `type:name:action[,action…]` grammar
#[derive(Debug, Error)]
#[error("invalid scope '{scope}', expected type:name:action[,action...]")]
pub struct InvalidScope {
    scope: String,
}

#[inline]
pub(crate) fn invalid_scope(scope: impl Into<String>) -> InvalidScope {
    InvalidScope {
        scope: scope.into(),
    }
}

/// The part of a token that could not be decoded
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TokenSegment {
    /// The token is not made of three dot-separated segments
    Structure,
    /// The header segment
    Header,
    /// The claims segment
    Claims,
    /// The signature segment
    Signature,
}

impl fmt::Display for TokenSegment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::Structure => "structure",
            Self::Header => "header",
            Self::Claims => "claims",
            Self::Signature => "signature",
        })
    }
}

/// The token is malformed and cannot be parsed out into header, claims, and signature
#[derive(Debug, Error)]
#[error("malformed token {segment}")]
pub struct MalformedToken {
    segment: TokenSegment,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl MalformedToken {
    /// The segment that failed to decode
    pub fn segment(&self) -> TokenSegment {
        self.segment
    }
}

pub(crate) const fn malformed_token() -> MalformedToken {
    MalformedToken {
        segment: TokenSegment::Structure,
        source: None,
    }
}

pub(crate) fn malformed_token_header(
    source: impl Into<Box<dyn StdError + Send + Sync + 'static>>,
) -> MalformedToken {
    MalformedToken {
        segment: TokenSegment::Header,
        source: Some(source.into()),
    }
}

pub(crate) fn malformed_token_claims(
    source: impl Into<Box<dyn StdError + Send + Sync + 'static>>,
) -> MalformedToken {
    MalformedToken {
        segment: TokenSegment::Claims,
        source: Some(source.into()),
    }
}

pub(crate) fn malformed_token_signature(
    source: impl Into<Box<dyn StdError + Send + Sync + 'static>>,
) -> MalformedToken {
    MalformedToken {
        segment: TokenSegment::Signature,
        source: Some(source.into()),
    }
}

/// The reason a well-formed token was not accepted
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Error)]
pub enum TokenRejection {
    /// The key id in the header does not name a trusted key
    #[error("unknown signing key")]
    UnknownSigningKey,

    /// The certificate chain in the header does not lead to a trusted root
    #[error("untrusted certificate chain")]
    UntrustedChain,

    /// The signature does not match the header and claims
    #[error("signature verification failed")]
    SignatureMismatch,

    /// The header names an algorithm outside the supported set
    #[error("unsupported signing algorithm")]
    UnsupportedAlgorithm,

    /// The issuer is not trusted
    #[error("token from untrusted issuer")]
    UntrustedIssuer,

    /// None of the token audiences are accepted
    #[error("token intended for another audience")]
    AudienceMismatch,

    /// The `nbf` claim is in the future
    #[error("token not yet valid")]
    NotYetValid,

    /// The `exp` claim is in the past
    #[error("token expired")]
    Expired,

    /// The `iat` claim is in the future
    #[error("token issued in the future")]
    IssuedInFuture,

    /// The subject does not match the required pattern
    #[error("token subject not accepted")]
    InvalidSubject,
}

/// The token was rejected during verification
#[derive(Debug, Error)]
#[error("invalid token: {reason}")]
pub struct InvalidToken {
    reason: TokenRejection,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl InvalidToken {
    /// Why the token was rejected
    pub fn reason(&self) -> TokenRejection {
        self.reason
    }
}

impl From<TokenRejection> for InvalidToken {
    #[inline]
    fn from(reason: TokenRejection) -> Self {
        invalid_token(reason)
    }
}

pub(crate) const fn invalid_token(reason: TokenRejection) -> InvalidToken {
    InvalidToken {
        reason,
        source: None,
    }
}

pub(crate) fn invalid_token_with_source(
    reason: TokenRejection,
    source: impl Into<Box<dyn StdError + Send + Sync + 'static>>,
) -> InvalidToken {
    InvalidToken {
        reason,
        source: Some(source.into()),
    }
}

/// The machine-readable error code carried in a bearer challenge
///
/// See [RFC 6750, Section 3.1](https://tools.ietf.org/html/rfc6750#section-3.1).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// `invalid_token`
    InvalidToken,
    /// `insufficient_scope`
    InsufficientScope,
}

impl ErrorCode {
    /// The code as it appears on the wire
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidToken => "invalid_token",
            Self::InsufficientScope => "insufficient_scope",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error occurring while authorizing a request
#[derive(Debug, Error)]
pub enum AuthError {
    /// The request carried no usable bearer token
    #[error("authorization token required")]
    TokenRequired,

    /// The bearer token could not be parsed
    #[error(transparent)]
    MalformedToken(#[from] MalformedToken),

    /// The bearer token was parsed but rejected
    #[error(transparent)]
    InvalidToken(#[from] InvalidToken),

    /// The bearer token does not grant every requested access
    #[error("insufficient scope")]
    InsufficientScope,
}

impl AuthError {
    /// The bearer challenge error code for this error, if any
    ///
    /// A request without credentials gets a challenge without an error code.
    pub const fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::TokenRequired => None,
            Self::MalformedToken(_) | Self::InvalidToken(_) => Some(ErrorCode::InvalidToken),
            Self::InsufficientScope => Some(ErrorCode::InsufficientScope),
        }
    }
}

/// An error occurring while building an access controller
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required option is absent or is not a string
    #[error("token auth requires a valid option string: \"{0}\"")]
    MissingOption(&'static str),

    /// The root certificate bundle could not be read
    #[error("unable to read token auth root certificate bundle file {path:?}")]
    UnreadableBundle {
        /// The configured bundle location
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// A PEM block could not be decoded as an X.509 certificate
    #[error("unable to parse token auth root certificate")]
    InvalidCertificate(#[source] openssl::error::ErrorStack),

    /// The bundle holds a PEM block that is not a certificate
    #[error("token auth root certificate bundle holds a PEM block that is not a certificate")]
    UnexpectedPemBlock,

    /// The bundle holds no certificates
    #[error("token auth requires at least one token signing root certificate")]
    NoCertificates,

    /// A certificate carries a public key that cannot verify tokens
    #[error("unable to get public key from token auth root certificate")]
    UnsupportedKey(#[from] UnsupportedKey),
}
