//! Bearer token verification.
//!
//! Tokens are HMAC-signed JWTs (`HS256` by default). A token is accepted when
//! its signature matches the configured secret, its `exp` claim lies in the
//! future, and it carries a non-blank `sub` claim.
//!
//! Verification never fails with an error: every problem with the token is
//! reported as a [`Verification::Invalid`] value, so arbitrary client input
//! cannot escape into the failure normalizer.

use std::fmt;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Deserialize;

use crate::error::{AppError, AppResult};

/// Why a token was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidToken {
    /// Not a decodable JWT, wrong algorithm, or missing required claims.
    Malformed,
    BadSignature,
    Expired,
    /// Verified token without a usable `sub` claim.
    MissingSubject,
}

impl InvalidToken {
    /// Stable label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            InvalidToken::Malformed => "malformed",
            InvalidToken::BadSignature => "bad_signature",
            InvalidToken::Expired => "expired",
            InvalidToken::MissingSubject => "missing_subject",
        }
    }
}

impl fmt::Display for InvalidToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of verifying one token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Subject(String),
    Invalid(InvalidToken),
}

#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default)]
    sub: Option<String>,
}

/// Validates bearer tokens against a shared HMAC secret.
pub struct CredentialVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl CredentialVerifier {
    /// Build a verifier for `secret` using an HMAC `algorithm`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` for non-HMAC algorithms.
    pub fn new(secret: &str, algorithm: Algorithm) -> AppResult<Self> {
        if !matches!(
            algorithm,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ) {
            return Err(AppError::ConfigError(format!(
                "unsupported token algorithm {algorithm:?}"
            )));
        }

        let mut validation = Validation::new(algorithm);
        // Expiry is exact; no grace period
        validation.leeway = 0;

        Ok(Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        })
    }

    pub fn verify(&self, token: &str) -> Verification {
        match decode::<Claims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => match data.claims.sub {
                Some(subject) if !subject.trim().is_empty() => Verification::Subject(subject),
                _ => Verification::Invalid(InvalidToken::MissingSubject),
            },
            Err(e) => Verification::Invalid(classify(e.kind())),
        }
    }
}

impl fmt::Debug for CredentialVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialVerifier")
            .field("algorithms", &self.validation.algorithms)
            .finish_non_exhaustive()
    }
}

fn classify(kind: &ErrorKind) -> InvalidToken {
    match kind {
        ErrorKind::ExpiredSignature => InvalidToken::Expired,
        ErrorKind::InvalidSignature => InvalidToken::BadSignature,
        _ => InvalidToken::Malformed,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use chrono::Utc;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde::Serialize;

    use super::*;

    const SECRET: &str = "test-secret";

    #[derive(Serialize)]
    struct TestClaims<'a> {
        #[serde(skip_serializing_if = "Option::is_none")]
        sub: Option<&'a str>,
        #[serde(skip_serializing_if = "Option::is_none")]
        exp: Option<i64>,
    }

    fn token(secret: &str, algorithm: Algorithm, sub: Option<&str>, exp: Option<i64>) -> String {
        encode(
            &Header::new(algorithm),
            &TestClaims { sub, exp },
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn in_one_hour() -> i64 {
        Utc::now().timestamp() + 3600
    }

    fn verifier() -> CredentialVerifier {
        CredentialVerifier::new(SECRET, Algorithm::HS256).unwrap()
    }

    #[test]
    fn test_valid_token_yields_subject() {
        let t = token(SECRET, Algorithm::HS256, Some("alice"), Some(in_one_hour()));
        assert_eq!(verifier().verify(&t), Verification::Subject("alice".to_string()));
    }

    #[test]
    fn test_expired_token() {
        let t = token(
            SECRET,
            Algorithm::HS256,
            Some("alice"),
            Some(Utc::now().timestamp() - 10),
        );
        assert_eq!(
            verifier().verify(&t),
            Verification::Invalid(InvalidToken::Expired)
        );
    }

    #[test]
    fn test_wrong_secret() {
        let t = token("other-secret", Algorithm::HS256, Some("alice"), Some(in_one_hour()));
        assert_eq!(
            verifier().verify(&t),
            Verification::Invalid(InvalidToken::BadSignature)
        );
    }

    #[test]
    fn test_garbage_is_malformed() {
        for input in ["", "not-a-token", "a.b.c", "....", "Bearer abc", "\u{0}\u{1}"] {
            assert_eq!(
                verifier().verify(input),
                Verification::Invalid(InvalidToken::Malformed),
                "input {input:?}"
            );
        }
    }

    #[test]
    fn test_missing_exp_is_malformed() {
        let t = token(SECRET, Algorithm::HS256, Some("alice"), None);
        assert_eq!(
            verifier().verify(&t),
            Verification::Invalid(InvalidToken::Malformed)
        );
    }

    #[test]
    fn test_missing_or_blank_subject() {
        let missing = token(SECRET, Algorithm::HS256, None, Some(in_one_hour()));
        let blank = token(SECRET, Algorithm::HS256, Some("  "), Some(in_one_hour()));

        for t in [missing, blank] {
            assert_eq!(
                verifier().verify(&t),
                Verification::Invalid(InvalidToken::MissingSubject)
            );
        }
    }

    #[test]
    fn test_algorithm_mismatch_is_rejected() {
        let t = token(SECRET, Algorithm::HS512, Some("alice"), Some(in_one_hour()));
        assert!(matches!(verifier().verify(&t), Verification::Invalid(_)));
    }

    #[test]
    fn test_configured_hs384() {
        let verifier = CredentialVerifier::new(SECRET, Algorithm::HS384).unwrap();
        let t = token(SECRET, Algorithm::HS384, Some("bob"), Some(in_one_hour()));
        assert_eq!(verifier.verify(&t), Verification::Subject("bob".to_string()));
    }

    #[test]
    fn test_rejects_asymmetric_algorithm() {
        assert!(CredentialVerifier::new(SECRET, Algorithm::RS256).is_err());
    }

    #[test]
    fn test_debug_hides_key() {
        let rendered = format!("{:?}", verifier());
        assert!(!rendered.contains(SECRET));
    }
}
