//! Shared-secret checks for the delegated facilitator endpoints and the
//! metrics endpoint.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Constant-time comparison that leaks neither content nor length: both
/// inputs are hashed to fixed-size digests before `subtle` compares them.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    let ha = Sha256::digest(a);
    let hb = Sha256::digest(b);
    ha.ct_eq(&hb).into()
}

/// Check a request's credential against the configured API key.
///
/// The credential comes from `x-api-key`, or else from `authorization`
/// (a `Bearer ` prefix is stripped). With no key configured nothing matches.
pub fn api_key_matches(
    expected: Option<&str>,
    x_api_key: Option<&str>,
    authorization: Option<&str>,
) -> bool {
    let Some(expected) = expected.filter(|k| !k.is_empty()) else {
        return false;
    };
    let provided = x_api_key.or_else(|| {
        authorization.map(|value| {
            let value = value.trim();
            value
                .strip_prefix("Bearer ")
                .or_else(|| value.strip_prefix("bearer "))
                .unwrap_or(value)
        })
    });
    match provided {
        Some(provided) => constant_time_eq(provided.trim().as_bytes(), expected.as_bytes()),
        None => false,
    }
}
