//! Signature algorithms accepted on tokens
//!
//! The names follow the JSON Web Algorithms standard, [RFC7518][]. Only
//! asymmetric algorithms are supported: a resource server holds public
//! keys and never shares a secret with the token issuer.
//!
//! [RFC7518]: https://tools.ietf.org/html/rfc7518

use std::{convert::TryFrom, error::Error as StdError, fmt, str::FromStr};

use crate::error;

pub mod ec;
pub mod rsa;

/// A token signing algorithm
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq)]
pub enum Algorithm {
    /// RSA family of algorithms
    Rsa(rsa::SigningAlgorithm),
    /// Elliptic curve family of algorithms
    EllipticCurve(ec::SigningAlgorithm),
}

impl Algorithm {
    /// The RS256 signing algorithm
    pub const RS256: Algorithm = Self::Rsa(rsa::SigningAlgorithm::RS256);
    /// The RS384 signing algorithm
    pub const RS384: Algorithm = Self::Rsa(rsa::SigningAlgorithm::RS384);
    /// The RS512 signing algorithm
    pub const RS512: Algorithm = Self::Rsa(rsa::SigningAlgorithm::RS512);
    /// The PS256 signing algorithm
    pub const PS256: Algorithm = Self::Rsa(rsa::SigningAlgorithm::PS256);
    /// The PS384 signing algorithm
    pub const PS384: Algorithm = Self::Rsa(rsa::SigningAlgorithm::PS384);
    /// The PS512 signing algorithm
    pub const PS512: Algorithm = Self::Rsa(rsa::SigningAlgorithm::PS512);
    /// The ES256 signing algorithm
    pub const ES256: Algorithm = Self::EllipticCurve(ec::SigningAlgorithm::ES256);
    /// The ES384 signing algorithm
    pub const ES384: Algorithm = Self::EllipticCurve(ec::SigningAlgorithm::ES384);

    /// Every supported algorithm
    pub const ALL: [Algorithm; 8] = [
        Self::RS256,
        Self::RS384,
        Self::RS512,
        Self::PS256,
        Self::PS384,
        Self::PS512,
        Self::ES256,
        Self::ES384,
    ];
}

impl From<rsa::SigningAlgorithm> for Algorithm {
    #[inline]
    fn from(alg: rsa::SigningAlgorithm) -> Self {
        Self::Rsa(alg)
    }
}

impl From<ec::SigningAlgorithm> for Algorithm {
    #[inline]
    fn from(alg: ec::SigningAlgorithm) -> Self {
        Self::EllipticCurve(alg)
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Rsa(a) => fmt::Display::fmt(a, f),
            Self::EllipticCurve(a) => fmt::Display::fmt(a, f),
        }
    }
}

impl TryFrom<&'_ str> for Algorithm {
    type Error = error::UnknownAlgorithm;

    #[inline]
    fn try_from(value: &'_ str) -> Result<Self, Self::Error> {
        match value {
            "RS256" => Ok(Algorithm::RS256),
            "RS384" => Ok(Algorithm::RS384),
            "RS512" => Ok(Algorithm::RS512),
            "PS256" => Ok(Algorithm::PS256),
            "PS384" => Ok(Algorithm::PS384),
            "PS512" => Ok(Algorithm::PS512),
            "ES256" => Ok(Algorithm::ES256),
            "ES384" => Ok(Algorithm::ES384),
            _ => Err(error::unknown_algorithm(value)),
        }
    }
}

impl FromStr for Algorithm {
    type Err = error::UnknownAlgorithm;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s)
    }
}

/// A type that can verify signatures
pub trait Verifier {
    /// The verifiable signature algorithms
    type Algorithm;

    /// The error returned on a failure to verify
    type Error: StdError + Send + Sync + 'static;

    /// Whether the specific algorithm provided is compatible
    /// with this verifier
    fn can_verify(&self, alg: Self::Algorithm) -> bool;

    /// Attempts to verify the data against the signature using the
    /// specified algorithm
    fn verify(
        &self,
        alg: Self::Algorithm,
        data: &[u8],
        signature: &[u8],
    ) -> Result<(), Self::Error>;
}
