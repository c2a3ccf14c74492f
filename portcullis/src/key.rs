//! Public keys trusted to sign tokens
//!
//! Keys are identified by the fingerprint format used by container registry
//! token issuers: the SHA-256 digest of the DER-encoded
//! `SubjectPublicKeyInfo`, truncated to 240 bits, base32 encoded and split
//! into twelve groups of four characters.
//!
//! ```text
//! ABCD:EFGH:IJKL:MNOP:QRST:UVWX:YZ23:4567:ABCD:EFGH:IJKL:MNOP
//! ```

use aliri_braid::braid;
use data_encoding::BASE32_NOPAD;
use openssl::{
    bn::BigNumContext,
    ec::PointConversionForm,
    pkey::{HasPublic, Id, PKeyRef},
    x509::X509Ref,
};

use crate::{
    error,
    jwa::{self, ec::Curve},
};

/// An identifier for a trusted public key
#[braid(serde, ref_doc = "A borrowed reference to a key identifier ([`KeyId`])")]
pub struct KeyId;

impl KeyId {
    /// Computes the identifier of a DER-encoded `SubjectPublicKeyInfo`
    pub fn from_spki_der(der: &[u8]) -> Self {
        let digest = ring::digest::digest(&ring::digest::SHA256, der);
        let encoded = BASE32_NOPAD.encode(&digest.as_ref()[..30]);

        let groups: Vec<&str> = encoded
            .as_bytes()
            .chunks(4)
            .filter_map(|g| std::str::from_utf8(g).ok())
            .collect();

        Self::new(groups.join(":"))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Material {
    Rsa { modulus: Vec<u8>, exponent: Vec<u8> },
    EllipticCurve { curve: Curve, point: Vec<u8> },
}

/// A public key able to verify token signatures
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicKey {
    kid: KeyId,
    material: Material,
}

impl PublicKey {
    /// Extracts the verification material from an OpenSSL public key
    ///
    /// # Errors
    ///
    /// Returns an error unless the key is an RSA key or an elliptic curve key
    /// on P-256 or P-384.
    pub fn from_openssl<T: HasPublic>(key: &PKeyRef<T>) -> Result<Self, error::UnsupportedKey> {
        let der = key
            .public_key_to_der()
            .map_err(error::unsupported_key_with_source)?;

        let material = match key.id() {
            Id::RSA => {
                let rsa = key.rsa().map_err(error::unsupported_key_with_source)?;
                Material::Rsa {
                    modulus: rsa.n().to_vec(),
                    exponent: rsa.e().to_vec(),
                }
            }
            Id::EC => {
                let ec = key.ec_key().map_err(error::unsupported_key_with_source)?;
                let curve = ec
                    .group()
                    .curve_name()
                    .and_then(Curve::from_nid)
                    .ok_or_else(error::unsupported_key)?;

                let mut ctx = BigNumContext::new().map_err(error::unsupported_key_with_source)?;
                let point = ec
                    .public_key()
                    .to_bytes(ec.group(), PointConversionForm::UNCOMPRESSED, &mut ctx)
                    .map_err(error::unsupported_key_with_source)?;

                Material::EllipticCurve { curve, point }
            }
            _ => return Err(error::unsupported_key()),
        };

        Ok(Self {
            kid: KeyId::from_spki_der(&der),
            material,
        })
    }

    /// Extracts the public key of a certificate
    ///
    /// # Errors
    ///
    /// Returns an error if the certificate's key is not supported.
    pub fn from_certificate(cert: &X509Ref) -> Result<Self, error::UnsupportedKey> {
        let key = cert
            .public_key()
            .map_err(error::unsupported_key_with_source)?;
        Self::from_openssl(&key)
    }

    /// The identifier of this key
    #[inline]
    pub fn key_id(&self) -> &KeyIdRef {
        &self.kid
    }
}

impl jwa::Verifier for PublicKey {
    type Algorithm = jwa::Algorithm;
    type Error = error::KeyVerifyError;

    fn can_verify(&self, alg: Self::Algorithm) -> bool {
        match (&self.material, alg) {
            (Material::Rsa { .. }, jwa::Algorithm::Rsa(_)) => true,
            (Material::EllipticCurve { curve, .. }, jwa::Algorithm::EllipticCurve(a)) => {
                a.curve() == *curve
            }
            _ => false,
        }
    }

    fn verify(
        &self,
        alg: Self::Algorithm,
        data: &[u8],
        signature: &[u8],
    ) -> Result<(), Self::Error> {
        match (&self.material, alg) {
            (Material::Rsa { modulus, exponent }, jwa::Algorithm::Rsa(a)) => {
                let pk = ring::signature::RsaPublicKeyComponents {
                    n: modulus.as_slice(),
                    e: exponent.as_slice(),
                };

                pk.verify(a.verification_params(), data, signature)
                    .map_err(|_| error::signature_mismatch().into())
            }
            (Material::EllipticCurve { curve, point }, jwa::Algorithm::EllipticCurve(a))
                if a.curve() == *curve =>
            {
                let pk = ring::signature::UnparsedPublicKey::new(
                    a.verification_algorithm(),
                    point.as_slice(),
                );

                pk.verify(data, signature)
                    .map_err(|_| error::signature_mismatch().into())
            }
            _ => Err(error::incompatible_algorithm(alg).into()),
        }
    }
}
