//! RSA signature algorithms

use std::fmt;

/// RSA public key signing algorithms
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
#[allow(clippy::upper_case_acronyms)]
pub enum SigningAlgorithm {
    /// RSA with a 2048 to 8192-bit key using SHA-256 and PKCS 1.5
    RS256,
    /// RSA with a 2048 to 8192-bit key using SHA-384 and PKCS 1.5
    RS384,
    /// RSA with a 2048 to 8192-bit key using SHA-512 and PKCS 1.5
    RS512,
    /// RSA with a 2048 to 8192-bit key using SHA-256 and PSS
    PS256,
    /// RSA with a 2048 to 8192-bit key using SHA-384 and PSS
    PS384,
    /// RSA with a 2048 to 8192-bit key using SHA-512 and PSS
    PS512,
}

impl SigningAlgorithm {
    /// Whether the algorithm uses PSS padding rather than PKCS 1.5
    #[must_use]
    pub const fn is_pss(self) -> bool {
        matches!(self, Self::PS256 | Self::PS384 | Self::PS512)
    }

    pub(crate) fn verification_params(self) -> &'static ring::signature::RsaParameters {
        match self {
            Self::RS256 => &ring::signature::RSA_PKCS1_2048_8192_SHA256,
            Self::RS384 => &ring::signature::RSA_PKCS1_2048_8192_SHA384,
            Self::RS512 => &ring::signature::RSA_PKCS1_2048_8192_SHA512,
            Self::PS256 => &ring::signature::RSA_PSS_2048_8192_SHA256,
            Self::PS384 => &ring::signature::RSA_PSS_2048_8192_SHA384,
            Self::PS512 => &ring::signature::RSA_PSS_2048_8192_SHA512,
        }
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::RS256 => "RS256",
            Self::RS384 => "RS384",
            Self::RS512 => "RS512",
            Self::PS256 => "PS256",
            Self::PS384 => "PS384",
            Self::PS512 => "PS512",
        };

        f.write_str(s)
    }
}
