//! Fuzz the credential parsers that see raw client input.
//!
//! None of these may panic, whatever the bytes:
//!
//! - `parse_basic_authorization`: documentation gate header decoding
//! - `extract_bearer_token`: `Authorization` scheme splitting
//! - `CredentialVerifier::verify`: JWT decoding and claim checks
//! - `CorrelationId::parse`: client-supplied `X-Request-Id` values
//!
//! ```bash
//! cargo +nightly install cargo-fuzz
//! cargo +nightly fuzz run fuzz_credentials -- -max_total_time=60
//! ```

#![no_main]

use std::sync::LazyLock;

use axum::http::HeaderValue;
use front_door::auth::{CredentialVerifier, Verification, extract_bearer_token};
use front_door::context::CorrelationId;
use front_door::middleware::basic_auth::parse_basic_authorization;
use jsonwebtoken::Algorithm;
use libfuzzer_sys::fuzz_target;

static VERIFIER: LazyLock<Option<CredentialVerifier>> =
    LazyLock::new(|| CredentialVerifier::new("fuzz-secret", Algorithm::HS256).ok());

fuzz_target!(|data: &[u8]| {
    if let Ok(header) = HeaderValue::from_bytes(data)
        && let Some(token) = extract_bearer_token(&header)
        && let Some(verifier) = VERIFIER.as_ref()
    {
        // Random bytes never carry a valid HS256 signature for this key
        assert!(matches!(verifier.verify(token), Verification::Invalid(_)));
    }

    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };

    if let Some((username, _)) = parse_basic_authorization(s) {
        assert!(!username.contains(':'));
    }

    if let Some(id) = CorrelationId::parse(s) {
        assert!(HeaderValue::from_str(id.as_str()).is_ok());
    }
});
