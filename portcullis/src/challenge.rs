//! Bearer challenges for rejected requests
//!
//! A [`Challenge`] tells a client how to obtain a token that would let the
//! request through, as described in [RFC 6750, Section 3][rfc]. It always
//! maps to `401 Unauthorized` with a header of the form:
//!
//! ```http
//! WWW-Authenticate: Bearer realm="{realm}",service="{service}",scope="{scope}",error="{code}"
//! ```
//!
//! `scope` is omitted when nothing was requested, and `error` is omitted
//! when the request carried no token at all.
//!
//!   [rfc]: https://tools.ietf.org/html/rfc6750#section-3

use std::{error::Error as StdError, fmt};

use http::{header, HeaderMap, HeaderValue, Response, StatusCode};

use crate::{access::AccessSet, error::AuthError};

/// A rejected authorization attempt, ready to be rendered as a response
#[derive(Debug)]
pub struct Challenge {
    error: AuthError,
    realm: String,
    service: String,
    access_set: AccessSet,
}

impl Challenge {
    /// Prepares a challenge for the resources requested in `access_set`
    pub fn new(
        error: AuthError,
        realm: impl Into<String>,
        service: impl Into<String>,
        access_set: AccessSet,
    ) -> Self {
        Self {
            error,
            realm: realm.into(),
            service: service.into(),
            access_set,
        }
    }

    /// Why the request was rejected
    #[inline]
    pub fn error(&self) -> &AuthError {
        &self.error
    }

    /// Consumes the challenge, keeping only the underlying error
    #[inline]
    pub fn into_error(self) -> AuthError {
        self.error
    }

    /// The access that was requested
    #[inline]
    pub fn access_set(&self) -> &AccessSet {
        &self.access_set
    }

    /// The status code of the response, always `401 Unauthorized`
    #[inline]
    pub fn status(&self) -> StatusCode {
        StatusCode::UNAUTHORIZED
    }

    /// The `WWW-Authenticate` header value, as a string
    pub fn params(&self) -> String {
        let mut params = String::from("Bearer realm=");
        push_quoted(&mut params, &self.realm);
        params.push_str(",service=");
        push_quoted(&mut params, &self.service);

        if !self.access_set.is_empty() {
            params.push_str(",scope=");
            push_quoted(&mut params, &self.access_set.scope_param());
        }

        if let Some(code) = self.error.code() {
            params.push_str(",error=");
            push_quoted(&mut params, code.as_str());
        }

        params
    }

    /// The `WWW-Authenticate` header value
    pub fn header_value(&self) -> HeaderValue {
        HeaderValue::try_from(self.params()).expect("escaped challenge is a valid header value")
    }

    /// Appends the `WWW-Authenticate` header to `headers`
    pub fn set_header(&self, headers: &mut HeaderMap) {
        headers.append(header::WWW_AUTHENTICATE, self.header_value());
    }

    /// Builds a `401 Unauthorized` response carrying the challenge
    pub fn into_response<B: Default>(self) -> Response<B> {
        let mut resp = Response::new(B::default());
        *resp.status_mut() = self.status();
        self.set_header(resp.headers_mut());
        resp
    }
}

impl fmt::Display for Challenge {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl StdError for Challenge {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.error.source()
    }
}

/// Quotes `value`, escaping quotes, backslashes, and anything that is not
/// printable ASCII
fn push_quoted(out: &mut String, value: &str) {
    out.push('"');
    out.extend(value.escape_default());
    out.push('"');
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::{
        access::Access,
        error::{invalid_token, malformed_token, TokenRejection},
    };

    const REALM: &str = "https://auth.example.com/token";
    const SERVICE: &str = "registry.example.com";

    fn requested() -> AccessSet {
        vec![
            Access::new("repository", "lib/foo", "pull"),
            Access::new("repository", "lib/foo", "push"),
        ]
        .into_iter()
        .collect()
    }

    fn extract_www_authenticate_headers<B>(resp: &Response<B>) -> BTreeSet<&[u8]> {
        resp.headers()
            .get_all(header::WWW_AUTHENTICATE)
            .into_iter()
            .map(HeaderValue::as_bytes)
            .collect()
    }

    #[test]
    fn missing_token_has_no_error_code() {
        let challenge = Challenge::new(AuthError::TokenRequired, REALM, SERVICE, requested());

        assert_eq!(
            challenge.params(),
            r#"Bearer realm="https://auth.example.com/token",service="registry.example.com",scope="repository:lib/foo:pull,push""#
        );
    }

    #[test]
    fn insufficient_scope_lists_the_requested_scope() {
        let challenge = Challenge::new(AuthError::InsufficientScope, REALM, SERVICE, requested());

        assert_eq!(
            challenge.params(),
            r#"Bearer realm="https://auth.example.com/token",service="registry.example.com",scope="repository:lib/foo:pull,push",error="insufficient_scope""#
        );
    }

    #[test]
    fn invalid_and_malformed_tokens_share_a_code() {
        for error in [
            AuthError::from(malformed_token()),
            AuthError::from(invalid_token(TokenRejection::Expired)),
        ] {
            let params = Challenge::new(error, REALM, SERVICE, requested()).params();
            assert!(params.ends_with(r#",error="invalid_token""#), "{params}");
        }
    }

    #[test]
    fn empty_request_omits_scope() {
        let challenge =
            Challenge::new(AuthError::InsufficientScope, REALM, SERVICE, AccessSet::new());

        assert_eq!(
            challenge.params(),
            r#"Bearer realm="https://auth.example.com/token",service="registry.example.com",error="insufficient_scope""#
        );
    }

    #[test]
    fn unicode_and_non_printing_values_are_escaped() {
        let challenge = Challenge::new(
            AuthError::TokenRequired,
            "\0\n\ttest™: \"Ĉu\"",
            "back\\slash",
            AccessSet::new(),
        );

        let resp = challenge.into_response::<()>();
        let headers = extract_www_authenticate_headers(&resp);

        let expected = BTreeSet::from([
            &br#"Bearer realm="\u{0}\n\ttest\u{2122}: \"\u{108}u\"",service="back\\slash""#[..],
        ]);

        assert_eq!(headers, expected);
    }

    #[test]
    fn response_is_unauthorized_and_appends_the_header() {
        let challenge = Challenge::new(AuthError::InsufficientScope, REALM, SERVICE, requested());
        let expected_value = challenge.header_value();

        let mut headers = HeaderMap::new();
        headers.append(header::WWW_AUTHENTICATE, HeaderValue::from_static("Basic"));
        challenge.set_header(&mut headers);
        assert_eq!(headers.get_all(header::WWW_AUTHENTICATE).iter().count(), 2);

        let resp = challenge.into_response::<()>();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            resp.headers().get(header::WWW_AUTHENTICATE),
            Some(&expected_value)
        );
    }

    #[test]
    fn display_is_the_underlying_error() {
        let challenge = Challenge::new(
            AuthError::from(invalid_token(TokenRejection::UntrustedIssuer)),
            REALM,
            SERVICE,
            AccessSet::new(),
        );

        assert_eq!(challenge.to_string(), "invalid token: token from untrusted issuer");
        assert!(matches!(challenge.error(), AuthError::InvalidToken(_)));
    }
}
