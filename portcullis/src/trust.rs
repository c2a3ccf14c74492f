//! Trust anchors for token signatures
//!
//! A [`TrustStore`] is assembled once, at startup, from a PEM bundle of
//! root certificates. Each certificate contributes two things:
//!
//! * a trust anchor against which certificate chains carried in a token
//!   header (`x5c`) are verified, and
//! * a public key that may sign tokens directly, addressed by its
//!   [`KeyId`] from the token header (`kid`).
//!
//! The store is immutable afterwards and is shared across requests.

use std::{
    cmp::Ordering,
    collections::{HashMap, HashSet},
    fmt, fs,
    path::Path,
};

use openssl::{
    asn1::Asn1Time,
    stack::Stack,
    x509::{
        store::{X509Store, X509StoreBuilder},
        verify::X509VerifyFlags,
        X509StoreContext, X509,
    },
};

use crate::{
    clock::UnixTime,
    error::{self, ConfigError, TokenRejection},
    key::{KeyId, KeyIdRef, PublicKey},
};

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

const PEM_BLOCK_START: &[u8] = b"-----BEGIN ";

/// Root certificates and the public keys trusted to sign tokens
pub struct TrustStore {
    roots: X509Store,
    certificates: Vec<X509>,
    trusted_keys: HashMap<KeyId, PublicKey>,
}

impl TrustStore {
    /// Builds a trust store from a concatenated PEM bundle
    ///
    /// # Errors
    ///
    /// Every PEM block in the bundle must be an X.509 certificate carrying an
    /// RSA or P-256/P-384 elliptic curve key, and there must be at least one.
    ///
    /// A certificate on any other curve, P-521 included, fails the whole
    /// bundle with [`ConfigError::UnsupportedKey`], since no supported
    /// algorithm could verify its signatures.
    pub fn from_pem(bundle: &[u8]) -> Result<Self, ConfigError> {
        let blocks = bundle
            .windows(PEM_BLOCK_START.len())
            .filter(|w| *w == PEM_BLOCK_START)
            .count();

        if blocks == 0 {
            return Err(ConfigError::NoCertificates);
        }

        let certificates = X509::stack_from_pem(bundle).map_err(ConfigError::InvalidCertificate)?;

        if certificates.len() != blocks {
            return Err(ConfigError::UnexpectedPemBlock);
        }

        Self::from_certificates(certificates)
    }

    /// Reads and builds a trust store from a PEM bundle file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, or for any of the reasons
    /// given in [`from_pem()`][Self::from_pem].
    pub fn from_pem_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let bundle = fs::read(path).map_err(|source| ConfigError::UnreadableBundle {
            path: path.to_owned(),
            source,
        })?;

        tracing::debug!(path = %path.display(), "read root certificate bundle");
        Self::from_pem(&bundle)
    }

    /// Builds a trust store from already decoded certificates
    ///
    /// # Errors
    ///
    /// Returns an error if `certificates` is empty, or
    /// [`ConfigError::UnsupportedKey`] if any certificate carries a key other
    /// than RSA, P-256 or P-384.
    pub fn from_certificates(certificates: Vec<X509>) -> Result<Self, ConfigError> {
        if certificates.is_empty() {
            return Err(ConfigError::NoCertificates);
        }

        let mut roots = X509StoreBuilder::new().map_err(ConfigError::InvalidCertificate)?;
        roots
            .set_flags(X509VerifyFlags::NO_CHECK_TIME)
            .map_err(ConfigError::InvalidCertificate)?;
        let mut trusted_keys = HashMap::with_capacity(certificates.len());
        let mut anchors = HashSet::with_capacity(certificates.len());

        for cert in &certificates {
            let key = PublicKey::from_certificate(cert)?;
            tracing::debug!(key.id = %key.key_id(), "trusting token signing key");

            // Older OpenSSL releases refuse the same anchor twice
            if anchors.insert(cert.to_der().map_err(ConfigError::InvalidCertificate)?) {
                roots
                    .add_cert(cert.clone())
                    .map_err(ConfigError::InvalidCertificate)?;
            }
            trusted_keys.insert(key.key_id().to_owned(), key);
        }

        tracing::info!(
            certificates = certificates.len(),
            keys = trusted_keys.len(),
            "token signing trust store assembled"
        );

        Ok(Self {
            roots: roots.build(),
            certificates,
            trusted_keys,
        })
    }

    /// Looks up a trusted signing key by its identifier
    #[inline]
    pub fn key(&self, kid: &KeyIdRef) -> Option<&PublicKey> {
        self.trusted_keys.get(kid)
    }

    /// The identifiers of every trusted signing key
    pub fn key_ids(&self) -> impl Iterator<Item = &KeyIdRef> {
        self.trusted_keys.keys().map(|kid| &**kid)
    }

    /// The root certificates
    #[inline]
    pub fn certificates(&self) -> &[X509] {
        &self.certificates
    }

    /// Verifies that a certificate chain, leaf first, leads to one of the
    /// roots, and returns the leaf's public key
    ///
    /// Every certificate on the verified path, the root included, must be
    /// valid at `now`. OpenSSL's own wall-clock check is disabled so that
    /// certificates and claims are judged against the same clock.
    pub(crate) fn verify_chain(
        &self,
        chain: &[X509],
        now: UnixTime,
    ) -> Result<PublicKey, error::InvalidToken> {
        let untrusted = |source: BoxError| {
            error::invalid_token_with_source(TokenRejection::UntrustedChain, source)
        };

        let (leaf, intermediates) = chain
            .split_first()
            .ok_or_else(|| error::invalid_token(TokenRejection::UntrustedChain))?;

        let mut stack = Stack::new().map_err(|e| untrusted(e.into()))?;
        for cert in intermediates {
            stack.push(cert.clone()).map_err(|e| untrusted(e.into()))?;
        }

        let now = i64::try_from(now.0)
            .map_err(|e| untrusted(e.into()))
            .and_then(|secs| Asn1Time::from_unix(secs).map_err(|e| untrusted(e.into())))?;

        let mut context = X509StoreContext::new().map_err(|e| untrusted(e.into()))?;
        let outcome = context
            .init(&self.roots, leaf, &stack, |ctx| {
                if !ctx.verify_cert()? {
                    return Ok(Err(BoxError::from(ctx.error())));
                }

                if let Some(path) = ctx.chain() {
                    for cert in path {
                        if cert.not_before().compare(&now)? == Ordering::Greater {
                            return Ok(Err(BoxError::from("certificate is not yet valid")));
                        }
                        if cert.not_after().compare(&now)? == Ordering::Less {
                            return Ok(Err(BoxError::from("certificate has expired")));
                        }
                    }
                }

                Ok(Ok(()))
            })
            .map_err(|e| untrusted(e.into()))?;

        outcome.map_err(untrusted)?;

        PublicKey::from_certificate(leaf).map_err(|e| untrusted(e.into()))
    }
}

impl fmt::Debug for TrustStore {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut key_ids: Vec<&KeyIdRef> = self.key_ids().collect();
        key_ids.sort_unstable();

        f.debug_struct("TrustStore")
            .field("certificates", &self.certificates.len())
            .field("key_ids", &key_ids)
            .finish()
    }
}
