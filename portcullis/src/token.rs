//! Signed bearer tokens
//!
//! Tokens use the JWS compact serialization: three base64url segments
//! (header, claims, signature) joined by `.`. The signature covers the
//! exact `header.claims` bytes as received.
//!
//! A token moves through two states. [`Token::parse()`] decodes the
//! segments without trusting anything in them. [`Token::verify()`] consumes
//! the token and, if every check passes, returns a [`VerifiedToken`]. The
//! access granted by a token is only reachable from a [`VerifiedToken`].
//!
//! Verification checks, in order, stopping at the first failure:
//!
//! 1. the signature, with either a trusted key named by `kid` or the leaf
//!    of an `x5c` certificate chain that leads to a trusted root and is
//!    valid at the clock's time,
//! 2. the issuer,
//! 3. the audience,
//! 4. `nbf`, `exp` and `iat` against the clock, with leeway on `nbf` and
//!    `iat`, and
//! 5. the subject, when a subject pattern is configured.

use std::{borrow::Cow, collections::HashSet, fmt, time::Duration};

use aliri_braid::braid;
use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    Engine as _,
};
use openssl::x509::X509;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    access::{AccessSet, ResourceActions},
    clock::{Clock, System, UnixTime},
    error::{self, TokenRejection},
    jwa::{self, Verifier as _},
    key::{KeyId, KeyIdRef, PublicKey},
    trust::TrustStore,
};

/// The leeway applied to `nbf` and `iat` unless configured otherwise
pub const DEFAULT_LEEWAY: Duration = Duration::from_secs(5);

/// An audience
#[braid(serde, ref_doc = "A borrowed reference to an [`Audience`]")]
pub struct Audience;

/// An issuer of tokens
#[braid(serde, ref_doc = "A borrowed reference to an [`Issuer`]")]
pub struct Issuer;

/// The subject of a token
#[braid(serde, ref_doc = "A borrowed reference to a [`Subject`]")]
pub struct Subject;

/// A bearer token as presented by a client
///
/// This type provides custom implementations of [`Display`][RawTokenRef#impl-Display] and
/// [`Debug`][RawTokenRef#impl-Debug] so that credentials do not end up in logs.
#[braid(
    serde,
    debug = "owned",
    display = "owned",
    ord = "omit",
    ref_doc = "\
    A borrowed reference to a bearer token ([`RawToken`])\n\
    \n\
    This type provides custom implementations of [`Display`][Self#impl-Display] and \
    [`Debug`][Self#impl-Debug] so that credentials do not end up in logs.
    "
)]
#[must_use]
pub struct RawToken;

/// Redacts the token
///
/// The alternate form reveals the header and claims, followed by the
/// first few characters of the signature. Use a width to change how many
/// signature characters are shown, e.g. `{:#12?}`.
impl fmt::Debug for RawTokenRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if f.alternate() {
            f.write_str("\"")?;
            reveal_unsigned(&self.0, f, 6)?;
            f.write_str("\"")
        } else {
            f.write_str("***TOKEN***")
        }
    }
}

/// Redacts the token
///
/// The alternate form writes the whole token unless a width limits the
/// number of signature characters shown.
impl fmt::Display for RawTokenRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if f.alternate() {
            reveal_unsigned(&self.0, f, usize::MAX)
        } else {
            f.write_str("***TOKEN***")
        }
    }
}

fn reveal_unsigned(token: &str, f: &mut fmt::Formatter, default_len: usize) -> fmt::Result {
    let (message, signature) = match token.rfind('.') {
        Some(idx) => token.split_at(idx + 1),
        None => ("", token),
    };

    f.write_str(message)?;

    let max_len = f.width().unwrap_or(default_len);
    if max_len <= 1 {
        f.write_str("…")
    } else if max_len >= signature.chars().count() {
        f.write_str(signature)
    } else {
        match signature.char_indices().nth(max_len - 1) {
            Some((idx, _)) => {
                f.write_str(&signature[..idx])?;
                f.write_str("…")
            }
            None => f.write_str(signature),
        }
    }
}

/// A set of one or more [`Audience`]s
///
/// On the wire a single audience may be a bare string.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "OneOrMany<Audience>", into = "OneOrMany<Audience>")]
#[must_use]
pub struct Audiences(Vec<Audience>);

impl Audiences {
    /// An audience set with a single audience
    #[inline]
    pub fn single(aud: impl Into<Audience>) -> Self {
        Self(vec![aud.into()])
    }

    /// Indicates whether the audience set is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates through references to the audiences in the set
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &AudienceRef> {
        self.0.iter().map(|aud| &**aud)
    }
}

impl From<OneOrMany<Audience>> for Audiences {
    #[inline]
    fn from(vals: OneOrMany<Audience>) -> Self {
        match vals {
            OneOrMany::One(x) => Self(vec![x]),
            OneOrMany::Many(v) => Self(v),
        }
    }
}

impl From<Audiences> for OneOrMany<Audience> {
    #[inline]
    fn from(mut auds: Audiences) -> Self {
        match auds.0.len() {
            1 => auds.0.pop().map_or(Self::Many(Vec::new()), Self::One),
            _ => Self::Many(auds.0),
        }
    }
}

impl From<Vec<Audience>> for Audiences {
    #[inline]
    fn from(vals: Vec<Audience>) -> Self {
        Self(vals)
    }
}

impl From<Audience> for Audiences {
    #[inline]
    fn from(aud: Audience) -> Self {
        Self::single(aud)
    }
}

/// A type representing one or more items, primarily for serialization
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    /// A single item
    One(T),

    /// Zero or more items, to be serialized/deserialized as an array
    Many(Vec<T>),
}

/// The protected header of a token
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    alg: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    kid: Option<KeyId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    x5c: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    typ: Option<String>,
}

impl Header {
    /// The declared signing algorithm, which may not be supported
    #[inline]
    pub fn alg(&self) -> &str {
        &self.alg
    }

    /// The identifier of the signing key
    #[inline]
    pub fn kid(&self) -> Option<&KeyIdRef> {
        self.kid.as_deref()
    }

    /// The certificate chain of the signing key, leaf first, as standard
    /// base64 DER certificates
    #[inline]
    pub fn x5c(&self) -> Option<&[String]> {
        self.x5c.as_deref()
    }

    /// The declared media type, usually `JWT`
    #[inline]
    pub fn typ(&self) -> Option<&str> {
        self.typ.as_deref()
    }

    fn names_signing_key(&self) -> bool {
        self.kid.is_some() || self.x5c.as_ref().map_or(false, |c| !c.is_empty())
    }
}

/// The claims carried by a token
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    iss: Issuer,
    sub: Subject,
    aud: Audiences,
    exp: UnixTime,
    nbf: UnixTime,
    iat: UnixTime,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    jti: Option<String>,

    access: Vec<ResourceActions>,
}

impl Claims {
    /// The issuer (`iss`)
    #[inline]
    pub fn issuer(&self) -> &IssuerRef {
        &self.iss
    }

    /// The subject (`sub`)
    #[inline]
    pub fn subject(&self) -> &SubjectRef {
        &self.sub
    }

    /// The audiences (`aud`)
    #[inline]
    pub fn audience(&self) -> &Audiences {
        &self.aud
    }

    /// The expiration time (`exp`)
    #[inline]
    pub fn expiration(&self) -> UnixTime {
        self.exp
    }

    /// The time before which the token is not valid (`nbf`)
    #[inline]
    pub fn not_before(&self) -> UnixTime {
        self.nbf
    }

    /// The time the token was issued (`iat`)
    #[inline]
    pub fn issued_at(&self) -> UnixTime {
        self.iat
    }

    /// The token identifier (`jti`)
    #[inline]
    pub fn token_id(&self) -> Option<&str> {
        self.jti.as_deref()
    }

    /// The access grants (`access`)
    #[inline]
    pub fn access(&self) -> &[ResourceActions] {
        &self.access
    }
}

/// The checks a token must pass to be verified
#[derive(Clone, Debug)]
#[must_use]
pub struct VerifyOptions<'a> {
    trust_store: &'a TrustStore,
    trusted_issuers: HashSet<Issuer>,
    accepted_audiences: HashSet<Audience>,
    leeway: Duration,
    valid_subjects: Option<&'a Regex>,
}

impl<'a> VerifyOptions<'a> {
    /// Options that trust the keys and roots of `trust_store`, but no
    /// issuers or audiences yet
    pub fn new(trust_store: &'a TrustStore) -> Self {
        Self {
            trust_store,
            trusted_issuers: HashSet::new(),
            accepted_audiences: HashSet::new(),
            leeway: DEFAULT_LEEWAY,
            valid_subjects: None,
        }
    }

    /// Trusts tokens from `issuer`
    pub fn add_trusted_issuer(mut self, issuer: impl Into<Issuer>) -> Self {
        self.trusted_issuers.insert(issuer.into());
        self
    }

    /// Accepts tokens intended for `audience`
    pub fn add_accepted_audience(mut self, audience: impl Into<Audience>) -> Self {
        self.accepted_audiences.insert(audience.into());
        self
    }

    /// Sets the leeway applied to the `nbf` and `iat` claims
    pub fn with_leeway(self, leeway: Duration) -> Self {
        Self { leeway, ..self }
    }

    /// Requires the subject to match `pattern`
    pub fn check_subject(self, pattern: &'a Regex) -> Self {
        Self {
            valid_subjects: Some(pattern),
            ..self
        }
    }

    /// The configured leeway
    #[inline]
    pub fn leeway(&self) -> Duration {
        self.leeway
    }
}

macro_rules! expect_three {
    ($iter:expr) => {{
        let mut i = $iter;
        match (i.next(), i.next(), i.next(), i.next()) {
            (Some(first), Some(second), Some(third), None) => Some((first, second, third)),
            _ => None,
        }
    }};
}

/// A decoded, not yet verified, token
#[derive(Clone, Debug)]
pub struct Token {
    header: Header,
    claims: Claims,
    message: String,
    signature: Vec<u8>,
}

impl Token {
    /// Decodes a token without verifying it
    ///
    /// # Errors
    ///
    /// Returns an error naming the first segment that could not be decoded.
    pub fn parse(raw: &RawTokenRef) -> Result<Self, error::MalformedToken> {
        let raw = raw.as_str();
        let (header_b64, claims_b64, signature_b64) =
            expect_three!(raw.split('.')).ok_or_else(error::malformed_token)?;

        let header_json = URL_SAFE_NO_PAD
            .decode(header_b64)
            .map_err(error::malformed_token_header)?;
        let header: Header =
            serde_json::from_slice(&header_json).map_err(error::malformed_token_header)?;

        if !header.names_signing_key() {
            return Err(error::malformed_token_header(
                "header names neither a key id nor a certificate chain",
            ));
        }

        let claims_json = URL_SAFE_NO_PAD
            .decode(claims_b64)
            .map_err(error::malformed_token_claims)?;
        let claims: Claims =
            serde_json::from_slice(&claims_json).map_err(error::malformed_token_claims)?;

        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(error::malformed_token_signature)?;

        let message = raw[..header_b64.len() + 1 + claims_b64.len()].to_owned();

        Ok(Self {
            header,
            claims,
            message,
            signature,
        })
    }

    /// The header, which has not been verified
    #[inline]
    pub fn untrusted_header(&self) -> &Header {
        &self.header
    }

    /// The claims, which have not been verified
    #[inline]
    pub fn untrusted_claims(&self) -> &Claims {
        &self.claims
    }

    /// Verifies the token against the system clock
    ///
    /// # Errors
    ///
    /// Returns the first check the token failed.
    pub fn verify(self, options: &VerifyOptions) -> Result<VerifiedToken, error::InvalidToken> {
        self.verify_with_clock(options, &System)
    }

    /// Verifies the token against the provided clock
    ///
    /// # Errors
    ///
    /// Returns the first check the token failed.
    pub fn verify_with_clock<C: Clock>(
        self,
        options: &VerifyOptions,
        clock: &C,
    ) -> Result<VerifiedToken, error::InvalidToken> {
        let now = clock.now();
        self.verify_signature(options.trust_store, now)?;
        self.check_claims(options, now)?;

        let access = self.claims.access.iter().fold(AccessSet::new(), |mut set, grant| {
            set.add_grant(grant);
            set
        });

        Ok(VerifiedToken {
            claims: self.claims,
            access,
        })
    }

    fn verify_signature(
        &self,
        trust_store: &TrustStore,
        now: UnixTime,
    ) -> Result<(), error::InvalidToken> {
        let alg: jwa::Algorithm = self.header.alg.parse().map_err(|e| {
            error::invalid_token_with_source(TokenRejection::UnsupportedAlgorithm, e)
        })?;

        let key = self.signing_key(trust_store, now)?;

        key.verify(alg, self.message.as_bytes(), &self.signature)
            .map_err(|e| error::invalid_token_with_source(TokenRejection::SignatureMismatch, e))
    }

    fn signing_key<'s>(
        &self,
        trust_store: &'s TrustStore,
        now: UnixTime,
    ) -> Result<Cow<'s, PublicKey>, error::InvalidToken> {
        match (self.header.x5c(), self.header.kid()) {
            (Some(chain), _) if !chain.is_empty() => {
                let chain = decode_chain(chain).map_err(|e| {
                    error::invalid_token_with_source(TokenRejection::UntrustedChain, e)
                })?;
                trust_store.verify_chain(&chain, now).map(Cow::Owned)
            }
            (_, Some(kid)) => trust_store
                .key(kid)
                .map(Cow::Borrowed)
                .ok_or_else(|| error::invalid_token(TokenRejection::UnknownSigningKey)),
            _ => Err(error::invalid_token(TokenRejection::UnknownSigningKey)),
        }
    }

    fn check_claims(&self, options: &VerifyOptions, now: UnixTime) -> Result<(), error::InvalidToken> {
        let claims = &self.claims;

        if !options.trusted_issuers.contains(claims.issuer()) {
            return Err(error::invalid_token(TokenRejection::UntrustedIssuer));
        }

        if !claims.aud.iter().any(|aud| options.accepted_audiences.contains(aud)) {
            return Err(error::invalid_token(TokenRejection::AudienceMismatch));
        }

        let horizon = now.saturating_add(options.leeway.as_secs());

        if claims.nbf > horizon {
            return Err(error::invalid_token(TokenRejection::NotYetValid));
        }

        if claims.exp <= now {
            return Err(error::invalid_token(TokenRejection::Expired));
        }

        if claims.iat > horizon {
            return Err(error::invalid_token(TokenRejection::IssuedInFuture));
        }

        if let Some(pattern) = options.valid_subjects {
            if !pattern.is_match(claims.sub.as_str()) {
                return Err(error::invalid_token(TokenRejection::InvalidSubject));
            }
        }

        Ok(())
    }
}

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

fn decode_chain(chain: &[String]) -> Result<Vec<X509>, BoxError> {
    chain
        .iter()
        .map(|cert| -> Result<X509, BoxError> {
            let der = STANDARD.decode(cert)?;
            Ok(X509::from_der(&der)?)
        })
        .collect()
}

/// A token whose signature and claims have been verified
#[derive(Clone, Debug)]
pub struct VerifiedToken {
    claims: Claims,
    access: AccessSet,
}

impl VerifiedToken {
    /// The verified claims
    #[inline]
    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    /// The access granted by this token
    #[inline]
    pub fn access_set(&self) -> &AccessSet {
        &self.access
    }

    /// Consumes the token, keeping only the access it grants
    #[inline]
    pub fn into_access_set(self) -> AccessSet {
        self.access
    }
}

#[cfg(test)]
mod tests {
    use color_eyre::Result;
    use serde_json::json;

    use super::*;
    use crate::{access::Access, clock::TestClock, jwa::ec::Curve, test};

    const ISSUER: &str = "issuer.example.com";
    const SERVICE: &str = "registry.example.com";

    fn options(store: &TrustStore) -> VerifyOptions<'_> {
        VerifyOptions::new(store)
            .add_trusted_issuer(ISSUER)
            .add_accepted_audience(SERVICE)
    }

    fn rejection(result: Result<VerifiedToken, error::InvalidToken>) -> TokenRejection {
        match result {
            Ok(_) => panic!("expected the token to be rejected"),
            Err(err) => err.reason(),
        }
    }

    #[test]
    fn valid_token_verifies_and_grants_its_access() -> Result<()> {
        let signer = test::Signer::rsa()?;
        let raw = signer.mint(jwa::Algorithm::RS256, &test::claims(test::NOW))?;

        let token = Token::parse(&raw)?;
        assert_eq!(token.untrusted_header().alg(), "RS256");
        assert_eq!(token.untrusted_header().typ(), Some("JWT"));

        let verified = token.verify_with_clock(&options(signer.store()), &test::clock())?;
        assert_eq!(verified.claims().subject().as_str(), "alice");
        assert_eq!(verified.claims().token_id(), Some("token-1"));

        let granted = verified.access_set();
        assert!(granted.contains(&Access::new("repository", "lib/foo", "pull")));
        assert!(granted.contains(&Access::new("repository", "lib/foo", "push")));
        assert!(!granted.contains(&Access::new("repository", "lib/foo", "delete")));
        Ok(())
    }

    #[test]
    fn every_supported_algorithm_verifies() -> Result<()> {
        let rsa = test::Signer::rsa()?;
        let p256 = test::Signer::ec(Curve::P256)?;
        let p384 = test::Signer::ec(Curve::P384)?;

        for (signer, alg) in [
            (&rsa, jwa::Algorithm::RS256),
            (&rsa, jwa::Algorithm::RS384),
            (&rsa, jwa::Algorithm::RS512),
            (&rsa, jwa::Algorithm::PS256),
            (&rsa, jwa::Algorithm::PS384),
            (&rsa, jwa::Algorithm::PS512),
            (&p256, jwa::Algorithm::ES256),
            (&p384, jwa::Algorithm::ES384),
        ] {
            let raw = signer.mint(alg, &test::claims(test::NOW))?;
            Token::parse(&raw)?.verify_with_clock(&options(signer.store()), &test::clock())?;
        }

        Ok(())
    }

    #[test]
    fn rejects_untrusted_issuer() -> Result<()> {
        let signer = test::Signer::rsa()?;
        let mut claims = test::claims(test::NOW);
        claims["iss"] = json!("evil.example.com");

        let token = Token::parse(&signer.mint(jwa::Algorithm::RS256, &claims)?)?;
        let result = token.verify_with_clock(&options(signer.store()), &test::clock());

        assert_eq!(rejection(result), TokenRejection::UntrustedIssuer);
        Ok(())
    }

    #[test]
    fn rejects_other_audiences() -> Result<()> {
        let signer = test::Signer::rsa()?;
        let mut claims = test::claims(test::NOW);
        claims["aud"] = json!(["other.example.com", "another.example.com"]);

        let token = Token::parse(&signer.mint(jwa::Algorithm::RS256, &claims)?)?;
        let result = token.verify_with_clock(&options(signer.store()), &test::clock());

        assert_eq!(rejection(result), TokenRejection::AudienceMismatch);
        Ok(())
    }

    #[test]
    fn accepts_any_matching_audience() -> Result<()> {
        let signer = test::Signer::rsa()?;
        let mut claims = test::claims(test::NOW);
        claims["aud"] = json!(["other.example.com", SERVICE]);

        let token = Token::parse(&signer.mint(jwa::Algorithm::RS256, &claims)?)?;
        token.verify_with_clock(&options(signer.store()), &test::clock())?;
        Ok(())
    }

    #[test]
    fn expiry_is_exclusive() -> Result<()> {
        let signer = test::Signer::rsa()?;
        let raw = signer.mint(jwa::Algorithm::RS256, &test::claims(test::NOW))?;
        let exp = Token::parse(&raw)?.untrusted_claims().expiration();

        let at_expiry = TestClock::new(exp);
        let after_expiry = TestClock::new(exp.saturating_add(1));
        let before_expiry = TestClock::new(exp.saturating_sub(1));

        let verify = |clock: &TestClock| -> Result<_> {
            Ok(Token::parse(&raw)?.verify_with_clock(&options(signer.store()), clock))
        };

        assert_eq!(rejection(verify(&at_expiry)?), TokenRejection::Expired);
        assert_eq!(rejection(verify(&after_expiry)?), TokenRejection::Expired);
        assert!(verify(&before_expiry)?.is_ok());
        Ok(())
    }

    #[test]
    fn not_before_allows_leeway() -> Result<()> {
        let signer = test::Signer::rsa()?;
        let mut claims = test::claims(test::NOW);
        claims["nbf"] = json!(test::NOW.0 + 5);
        let raw = signer.mint(jwa::Algorithm::RS256, &claims)?;

        let within = Token::parse(&raw)?.verify_with_clock(&options(signer.store()), &test::clock());
        assert!(within.is_ok());

        let strict = options(signer.store()).with_leeway(Duration::ZERO);
        let without = Token::parse(&raw)?.verify_with_clock(&strict, &test::clock());
        assert_eq!(rejection(without), TokenRejection::NotYetValid);
        Ok(())
    }

    #[test]
    fn rejects_tokens_issued_in_the_future() -> Result<()> {
        let signer = test::Signer::rsa()?;
        let mut claims = test::claims(test::NOW);
        claims["iat"] = json!(test::NOW.0 + 60);

        let token = Token::parse(&signer.mint(jwa::Algorithm::RS256, &claims)?)?;
        let result = token.verify_with_clock(&options(signer.store()), &test::clock());

        assert_eq!(rejection(result), TokenRejection::IssuedInFuture);
        Ok(())
    }

    #[test]
    fn subject_pattern_is_enforced() -> Result<()> {
        let signer = test::Signer::rsa()?;
        let raw = signer.mint(jwa::Algorithm::RS256, &test::claims(test::NOW))?;

        let admins = Regex::new("^admin-")?;
        let result = Token::parse(&raw)?
            .verify_with_clock(&options(signer.store()).check_subject(&admins), &test::clock());
        assert_eq!(rejection(result), TokenRejection::InvalidSubject);

        let anyone = Regex::new("^[a-z]+$")?;
        Token::parse(&raw)?
            .verify_with_clock(&options(signer.store()).check_subject(&anyone), &test::clock())?;
        Ok(())
    }

    #[test]
    fn unknown_key_id_is_rejected() -> Result<()> {
        let signer = test::Signer::rsa()?;
        let stranger = test::Signer::rsa()?;

        let raw = stranger.mint(jwa::Algorithm::RS256, &test::claims(test::NOW))?;
        let result = Token::parse(&raw)?.verify_with_clock(&options(signer.store()), &test::clock());

        assert_eq!(rejection(result), TokenRejection::UnknownSigningKey);
        Ok(())
    }

    #[test]
    fn unsupported_algorithms_are_rejected() -> Result<()> {
        let signer = test::Signer::rsa()?;
        let header = json!({ "alg": "HS256", "kid": signer.key_id().as_str() });
        let raw = test::mint_with_header(&header, &test::claims(test::NOW), |_| Ok(vec![0; 32]))?;

        let result = Token::parse(&raw)?.verify_with_clock(&options(signer.store()), &test::clock());
        assert_eq!(rejection(result), TokenRejection::UnsupportedAlgorithm);
        Ok(())
    }

    #[test]
    fn tampered_claims_fail_signature_verification() -> Result<()> {
        let signer = test::Signer::rsa()?;
        let raw = signer.mint(jwa::Algorithm::RS256, &test::claims(test::NOW))?;

        let mut escalated = test::claims(test::NOW);
        escalated["access"] = json!([{ "type": "repository", "name": "lib/foo", "actions": ["*"] }]);
        let forged_claims = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&escalated)?);

        let mut parts: Vec<&str> = raw.as_str().split('.').collect();
        parts[1] = &forged_claims;
        let forged = RawToken::new(parts.join("."));

        let result = Token::parse(&forged)?.verify_with_clock(&options(signer.store()), &test::clock());
        assert_eq!(rejection(result), TokenRejection::SignatureMismatch);
        Ok(())
    }

    #[test]
    fn tampered_header_fails_signature_verification() -> Result<()> {
        let signer = test::Signer::rsa()?;
        let raw = signer.mint(jwa::Algorithm::RS256, &test::claims(test::NOW))?;

        let header = json!({ "alg": "RS256", "kid": signer.key_id().as_str(), "typ": "JWS" });
        let forged_header = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?);

        let mut parts: Vec<&str> = raw.as_str().split('.').collect();
        parts[0] = &forged_header;
        let forged = RawToken::new(parts.join("."));

        let token = Token::parse(&forged)?;
        assert_eq!(token.untrusted_header().typ(), Some("JWS"));

        let result = token.verify_with_clock(&options(signer.store()), &test::clock());
        assert_eq!(rejection(result), TokenRejection::SignatureMismatch);
        Ok(())
    }

    #[test]
    fn key_on_the_wrong_curve_is_a_signature_mismatch() -> Result<()> {
        let signer = test::Signer::ec(Curve::P256)?;
        let raw = signer.mint(jwa::Algorithm::ES256, &test::claims(test::NOW))?;

        let mut parts: Vec<String> = raw.as_str().split('.').map(str::to_owned).collect();
        let header = json!({ "alg": "ES384", "kid": signer.key_id().as_str() });
        parts[0] = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?);
        let relabeled = RawToken::new(parts.join("."));

        let result =
            Token::parse(&relabeled)?.verify_with_clock(&options(signer.store()), &test::clock());
        assert_eq!(rejection(result), TokenRejection::SignatureMismatch);
        Ok(())
    }

    #[test]
    fn certificate_chain_from_a_trusted_root_verifies() -> Result<()> {
        let authority = test::Authority::new("token-root")?;
        let store = TrustStore::from_pem(&authority.certificate().to_pem()?)?;
        let (leaf_key, leaf) = authority.issue_rsa("token-signer")?;

        let raw = test::mint_with_chain(&leaf_key, &leaf, &test::claims(test::NOW))?;
        let verified = Token::parse(&raw)?.verify_with_clock(&options(&store), &test::clock())?;

        assert!(verified
            .access_set()
            .contains(&Access::new("repository", "lib/foo", "pull")));
        Ok(())
    }

    #[test]
    fn certificate_chain_from_another_root_is_untrusted() -> Result<()> {
        let trusted = test::Authority::new("trusted-root")?;
        let rogue = test::Authority::new("rogue-root")?;
        let store = TrustStore::from_pem(&trusted.certificate().to_pem()?)?;
        let (leaf_key, leaf) = rogue.issue_rsa("token-signer")?;

        let raw = test::mint_with_chain(&leaf_key, &leaf, &test::claims(test::NOW))?;
        let result = Token::parse(&raw)?.verify_with_clock(&options(&store), &test::clock());

        assert_eq!(rejection(result), TokenRejection::UntrustedChain);
        Ok(())
    }

    #[test]
    fn certificate_chain_validity_follows_the_clock() -> Result<()> {
        let authority = test::Authority::new("token-root")?;
        let store = TrustStore::from_pem(&authority.certificate().to_pem()?)?;
        let (leaf_key, leaf) = authority.issue_rsa("token-signer")?;

        let before_issue = UnixTime(test::NOW.0 - 30 * 86_400);
        let raw = test::mint_with_chain(&leaf_key, &leaf, &test::claims(before_issue))?;
        let result = Token::parse(&raw)?
            .verify_with_clock(&options(&store), &TestClock::new(before_issue));

        assert_eq!(rejection(result), TokenRejection::UntrustedChain);
        Ok(())
    }

    #[test]
    fn parse_requires_three_segments() {
        for raw in ["", "abc", "a.b", "a.b.c.d"] {
            let err = Token::parse(RawTokenRef::from_str(raw)).unwrap_err();
            assert_eq!(err.segment(), error::TokenSegment::Structure, "{raw:?}");
        }
    }

    #[test]
    fn parse_names_the_failing_segment() -> Result<()> {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","kid":"k"}"#);
        let claims = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&test::claims(test::NOW))?);

        let cases = [
            (format!("!!!.{claims}.c2ln"), error::TokenSegment::Header),
            (
                format!("{}.{claims}.c2ln", URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256"}"#)),
                error::TokenSegment::Header,
            ),
            (format!("{header}.e30.c2ln"), error::TokenSegment::Claims),
            (format!("{header}.{claims}.!!!"), error::TokenSegment::Signature),
        ];

        for (raw, segment) in cases {
            let err = Token::parse(RawTokenRef::from_str(&raw)).unwrap_err();
            assert_eq!(err.segment(), segment, "{raw}");
        }

        Ok(())
    }

    #[test]
    fn single_audience_may_be_a_string() -> Result<()> {
        let single: Audiences = serde_json::from_str(r#""registry.example.com""#)?;
        let many: Audiences = serde_json::from_str(r#"["registry.example.com"]"#)?;

        assert_eq!(single, many);
        assert_eq!(serde_json::to_string(&single)?, r#""registry.example.com""#);
        Ok(())
    }

    #[test]
    fn raw_token_is_redacted() {
        let raw = RawToken::from_static("aGVhZGVy.Y2xhaW1z.c2lnbmF0dXJlc2lnbmF0dXJl");

        assert_eq!(format!("{raw}"), "***TOKEN***");
        assert_eq!(format!("{raw:?}"), "***TOKEN***");
        assert_eq!(format!("{raw:#?}"), "\"aGVhZGVy.Y2xhaW1z.c2lnb…\"");
        assert_eq!(format!("{raw:#}"), "aGVhZGVy.Y2xhaW1z.c2lnbmF0dXJlc2lnbmF0dXJl");
    }
}
