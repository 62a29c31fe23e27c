//! Deterministic audit digests
//!
//! The digest is never stored; it is recomputed from the canonical tuple, so
//! the encoding must not depend on incidental ordering of any key/value
//! structure. Fields are hashed in a fixed order with length prefixes.

use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

/// SHA-256 over length-prefixed fields in the given order, hex-encoded.
pub fn canonical_digest(fields: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for field in fields {
        hasher.update((field.len() as u64).to_le_bytes());
        hasher.update(field.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Audit digest of a settled payment: `(session, amount, settlement_ref)`.
///
/// The amount is normalized first so `0.50` and `0.5` digest identically.
pub fn compute_digest(session: &str, amount: Decimal, settlement_ref: &str) -> String {
    let amount = amount.normalize().to_string();
    canonical_digest(&[session, &amount, settlement_ref])
}
