use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a payment request.
///
/// `Confirmed` and `Failed` are terminal: no operation transitions a record
/// out of them. The only legal transitions are `Pending -> Confirmed` and
/// `Pending -> Failed`, applied via the store's conditional update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Awaiting a settlement that verifies
    Pending,
    /// Settlement verified; funds received
    Confirmed,
    /// Settlement inspected and rejected (under-payment)
    Failed,
}

impl PaymentStatus {
    /// Whether this status permits no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed)
    }
}

/// A merchant's request for payment, keyed by session.
///
/// `session` doubles as the idempotency key: at most one successful
/// transition out of `Pending` may occur per session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequest {
    /// Opaque unique session identifier
    pub session: String,
    /// Merchant the payment is owed to (immutable after creation)
    pub merchant_id: String,
    /// Expected amount in human-facing currency units, always > 0
    pub expected_amount: Decimal,
    /// Fractional decimal digits used converting to atomic units (6 for USDC)
    pub token_scale: u32,
    /// Ledger account that must receive the funds (immutable after creation)
    pub recipient_address: String,
    /// Current lifecycle state
    pub status: PaymentStatus,
    /// Ledger transaction reference, set exactly once on leaving `Pending`
    pub settlement_ref: Option<String>,
    /// Creation time (unix seconds)
    pub created_at: u64,
}

/// How the verification engine established that funds arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    /// Strong: recipient-owned token balances increased pre -> post
    BalanceDelta,
    /// Weak: a parsed transfer instruction targets the recipient, but the
    /// balance snapshots showed no increase. The compared amount may be the
    /// expected amount rather than an observed one; see `VerificationResult`.
    InstructionMatch,
    /// No evidence of payment found
    None,
}

/// Outcome of inspecting a settled transaction against expected terms.
///
/// `received_atomic` is always the exact amount that was compared against
/// `expected_atomic`, so callers can audit the `InstructionMatch` path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    /// Whether at least the expected amount reached the recipient
    pub ok: bool,
    /// Atomic units credited toward the expectation
    pub received_atomic: u64,
    /// Expected amount in atomic units
    pub expected_atomic: u64,
    /// Evidence path that produced `received_atomic`
    pub evidence: EvidenceKind,
    /// Classified failure when `ok` is false
    pub failure: Option<crate::VerifyFailure>,
}

/// Result of a verification attempt.
///
/// `NotYetVisible` is not a failure: the ledger has not surfaced the
/// transaction at an authoritative commitment yet and the caller may retry.
/// The payment record must not transition for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// The transaction was inspected; see the result for ok/fail
    Checked(VerificationResult),
    /// The transaction is not visible at confirmed commitment yet
    NotYetVisible,
}

/// Receipt of a digest anchoring attempt.
///
/// `anchor_ref: None` is a normal outcome; anchoring is best-effort
/// infrastructure, not required for verification correctness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorReceipt {
    /// Hex-encoded audit digest that was (or would have been) anchored
    pub digest: String,
    /// Ledger reference of the anchoring transaction, if one was confirmed
    pub anchor_ref: Option<String>,
}

/// Response returned to the host system for a verification call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyResponse {
    /// Record state after this call
    pub status: PaymentStatus,
    /// Deterministic receipt identifier derived from the session
    pub receipt_id: String,
    /// Audit digest; present once status has left `Pending`
    pub digest: Option<String>,
    /// Anchoring transaction reference, if anchoring succeeded
    pub anchor_ref: Option<String>,
    /// Evidence path of the verification, if one ran to completion
    pub evidence: EvidenceKind,
    /// Atomic units credited by the engine
    pub received_atomic: u64,
    /// Expected atomic units
    pub expected_atomic: u64,
}

/// Deterministic receipt identifier for a session.
pub fn receipt_id(session: &str) -> String {
    format!("r_{session}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn request() -> PaymentRequest {
        PaymentRequest {
            session: "s1".to_string(),
            merchant_id: "m1".to_string(),
            expected_amount: dec!(0.5),
            token_scale: 6,
            recipient_address: "R".to_string(),
            status: PaymentStatus::Pending,
            settlement_ref: None,
            created_at: 1_700_000_000,
        }
    }

    #[test]
    fn test_status_terminality() {
        assert!(!PaymentStatus::Pending.is_terminal());
        assert!(PaymentStatus::Confirmed.is_terminal());
        assert!(PaymentStatus::Failed.is_terminal());
    }

    #[test]
    fn test_status_serde_lowercase() {
        let json = serde_json::to_string(&PaymentStatus::Confirmed).unwrap();
        assert_eq!(json, "\"confirmed\"");
        let back: PaymentStatus = serde_json::from_str("\"pending\"").unwrap();
        assert_eq!(back, PaymentStatus::Pending);
    }

    #[test]
    fn test_request_roundtrip() {
        let req = request();
        let json = serde_json::to_string(&req).unwrap();
        let back: PaymentRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back.session, "s1");
        assert_eq!(back.expected_amount, dec!(0.5));
        assert_eq!(back.status, PaymentStatus::Pending);
        assert!(back.settlement_ref.is_none());
    }

    #[test]
    fn test_receipt_id_deterministic() {
        assert_eq!(receipt_id("abc"), "r_abc");
        assert_eq!(receipt_id("abc"), receipt_id("abc"));
    }

    #[test]
    fn test_evidence_kind_distinct() {
        assert_ne!(EvidenceKind::BalanceDelta, EvidenceKind::InstructionMatch);
        assert_ne!(EvidenceKind::InstructionMatch, EvidenceKind::None);
    }

    #[test]
    fn test_anchor_receipt_none_is_normal() {
        let receipt = AnchorReceipt {
            digest: "ab".repeat(32),
            anchor_ref: None,
        };
        let json = serde_json::to_string(&receipt).unwrap();
        assert!(json.contains("null"));
    }
}
