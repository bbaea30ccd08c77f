//! Token builders for tests
//!
//! Produces syntactically valid, unsigned tokens. Only compiled for this
//! crate's tests or with the `test-util` feature.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

/// Three-segment token with the given claims payload and a dummy signature.
pub fn unsigned_token(claims: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string().as_bytes());
    format!("{header}.{payload}.sig")
}

/// Access token for `user_id` expiring at `exp` (unix seconds).
///
/// `jti` makes tokens with the same expiry distinguishable.
pub fn access_token(user_id: u64, exp: i64, jti: &str) -> String {
    unsigned_token(&serde_json::json!({
        "token_type": "access",
        "exp": exp,
        "user_id": user_id,
        "jti": jti,
    }))
}
