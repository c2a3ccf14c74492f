//! Elliptic curve signature algorithms

use std::fmt;

use openssl::nid::Nid;

/// A named elliptic curve
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum Curve {
    /// The P-256 curve (prime256v1/secp256r1)
    P256,

    /// The P-384 curve (secp384r1)
    P384,
}

impl Curve {
    /// The curve identified by an OpenSSL curve name, if supported
    pub fn from_nid(nid: Nid) -> Option<Self> {
        if nid == Nid::X9_62_PRIME256V1 {
            Some(Self::P256)
        } else if nid == Nid::SECP384R1 {
            Some(Self::P384)
        } else {
            None
        }
    }
}

impl fmt::Display for Curve {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::P256 => "P-256",
            Self::P384 => "P-384",
        })
    }
}

/// Elliptic curve signing algorithms
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
#[allow(clippy::upper_case_acronyms)]
pub enum SigningAlgorithm {
    /// Elliptic curve DSA using the P-256 curve and SHA-256
    ES256,
    /// Elliptic curve DSA using the P-384 curve and SHA-384
    ES384,
}

impl SigningAlgorithm {
    /// The curve a key must be on to verify this algorithm
    #[must_use]
    pub const fn curve(self) -> Curve {
        match self {
            Self::ES256 => Curve::P256,
            Self::ES384 => Curve::P384,
        }
    }

    /// The size in bytes of the fixed-width `r || s` signature
    #[must_use]
    pub const fn signature_size(self) -> usize {
        match self {
            Self::ES256 => 64,
            Self::ES384 => 96,
        }
    }

    pub(crate) fn verification_algorithm(
        self,
    ) -> &'static ring::signature::EcdsaVerificationAlgorithm {
        match self {
            Self::ES256 => &ring::signature::ECDSA_P256_SHA256_FIXED,
            Self::ES384 => &ring::signature::ECDSA_P384_SHA384_FIXED,
        }
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::ES256 => "ES256",
            Self::ES384 => "ES384",
        };

        f.write_str(s)
    }
}
