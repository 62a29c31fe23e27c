//! Verification engine
//!
//! Reconciles authoritative ledger state against an expected monetary claim.
//! The engine never raises a fault for ledger-level anomalies: every ledger
//! or decoding error is converted into a typed result, and a transaction the
//! ledger has not surfaced yet is reported as `NotYetVisible`, not a failure.
//! The engine holds no lock and is safe to invoke redundantly; transition
//! atomicity lives in the store.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::{debug, info, warn};

use tiprail_core::{EvidenceKind, VerificationResult, VerifyFailure, VerifyOutcome};
use tiprail_ledger::{InstructionInfo, LedgerClient, LedgerError};

/// Convert a human-facing amount to atomic units, rounding half up.
///
/// Goes through `Decimal` end to end; binary floating point would drift on
/// exact inputs (`0.1` at scale 6 must be exactly `100000`).
pub fn to_atomic(amount: Decimal, token_scale: u32) -> Option<u64> {
    let factor = Decimal::from(10u64.checked_pow(token_scale)?);
    amount
        .checked_mul(factor)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_u64()
}

/// Verification engine over an injected ledger capability.
pub struct VerificationEngine {
    ledger: Arc<dyn LedgerClient>,
}

impl VerificationEngine {
    pub fn new(ledger: Arc<dyn LedgerClient>) -> Self {
        Self { ledger }
    }

    /// Decide whether `settlement_ref` transferred at least
    /// `expected_amount` to `recipient`. Over-payment is tolerated.
    pub async fn verify(
        &self,
        settlement_ref: &str,
        expected_amount: Decimal,
        token_scale: u32,
        recipient: &str,
        deadline: Duration,
    ) -> VerifyOutcome {
        if settlement_ref.is_empty() {
            // Rejected before any ledger I/O
            return checked_failure(0, 0, VerifyFailure::MissingReference);
        }

        let Some(expected_atomic) = to_atomic(expected_amount, token_scale) else {
            // Not representable in u64 at this scale; no transfer can satisfy it
            return checked_failure(
                0,
                u64::MAX,
                VerifyFailure::AmountMismatch {
                    received: 0,
                    expected: u64::MAX,
                },
            );
        };

        debug!(
            "Verifying {} (expected {} atomic to {})",
            settlement_ref, expected_atomic, recipient
        );

        let parsed = match self.ledger.fetch_transaction(settlement_ref, deadline).await {
            Ok(Some(parsed)) => parsed,
            Ok(None) => {
                debug!("Transaction {} not yet visible", settlement_ref);
                return VerifyOutcome::NotYetVisible;
            }
            Err(LedgerError::Timeout) => {
                debug!("Fetch deadline exceeded for {}", settlement_ref);
                return VerifyOutcome::NotYetVisible;
            }
            Err(err) => {
                warn!("Ledger fault while verifying {}: {}", settlement_ref, err);
                return checked_failure(
                    0,
                    expected_atomic,
                    VerifyFailure::LedgerUnavailable(err.to_string()),
                );
            }
        };

        // Primary evidence: recipient-owned balance deltas
        let mut received_atomic = parsed.received_by(recipient);
        let mut evidence = if received_atomic > 0 {
            EvidenceKind::BalanceDelta
        } else {
            EvidenceKind::None
        };

        // Fallback evidence: a parsed transfer instruction targeting the
        // recipient. Structural proof only: when the instruction carries no
        // decodable amount the expected amount is credited, so the result
        // always reports the exact number that was compared.
        if received_atomic == 0 {
            if let Some(InstructionInfo::Transfer { amount, .. }) = parsed.transfer_to(recipient)
            {
                received_atomic = amount.unwrap_or(expected_atomic);
                evidence = EvidenceKind::InstructionMatch;
                warn!(
                    "Accepting weak structural evidence for {}: instruction match, {} atomic ({})",
                    settlement_ref,
                    received_atomic,
                    if amount.is_some() { "observed" } else { "assumed" },
                );
            }
        }

        let ok = received_atomic >= expected_atomic;
        info!(
            "Verification of {}: ok={}, received={}, expected={}, evidence={:?}",
            settlement_ref, ok, received_atomic, expected_atomic, evidence
        );

        VerifyOutcome::Checked(VerificationResult {
            ok,
            received_atomic,
            expected_atomic,
            evidence,
            failure: (!ok).then_some(VerifyFailure::AmountMismatch {
                received: received_atomic,
                expected: expected_atomic,
            }),
        })
    }
}

fn checked_failure(received: u64, expected: u64, failure: VerifyFailure) -> VerifyOutcome {
    VerifyOutcome::Checked(VerificationResult {
        ok: false,
        received_atomic: received,
        expected_atomic: expected,
        evidence: EvidenceKind::None,
        failure: Some(failure),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tiprail_ledger::{MockLedgerClient, ParsedTransaction, TokenBalance};

    const DEADLINE: Duration = Duration::from_secs(5);

    fn engine_with(ledger: Arc<MockLedgerClient>) -> VerificationEngine {
        VerificationEngine::new(ledger)
    }

    fn balance_tx(reference: &str, owner: &str, pre: u64, post: u64) -> ParsedTransaction {
        ParsedTransaction {
            reference: reference.to_string(),
            pre_token_balances: vec![TokenBalance {
                account_index: 1,
                owner: Some(owner.to_string()),
                amount: pre,
            }],
            post_token_balances: vec![TokenBalance {
                account_index: 1,
                owner: Some(owner.to_string()),
                amount: post,
            }],
            instructions: vec![],
        }
    }

    #[test]
    fn test_to_atomic_exact_conversions() {
        assert_eq!(to_atomic(dec!(0.5), 6), Some(500_000));
        assert_eq!(to_atomic(dec!(0.1), 6), Some(100_000));
        assert_eq!(to_atomic(dec!(1), 6), Some(1_000_000));
        assert_eq!(to_atomic(dec!(0.000001), 6), Some(1));
    }

    #[test]
    fn test_to_atomic_no_drift_across_repeats() {
        for _ in 0..1000 {
            assert_eq!(to_atomic(dec!(0.1), 6), Some(100_000));
        }
    }

    #[test]
    fn test_to_atomic_rounds_half_up() {
        // 0.0000005 at scale 6 is exactly half an atomic unit
        assert_eq!(to_atomic(dec!(0.0000005), 6), Some(1));
        assert_eq!(to_atomic(dec!(0.0000004), 6), Some(0));
    }

    #[tokio::test]
    async fn test_missing_reference_makes_no_ledger_call() {
        let ledger = Arc::new(MockLedgerClient::new());
        let engine = engine_with(ledger.clone());

        let outcome = engine.verify("", dec!(0.5), 6, "R", DEADLINE).await;
        match outcome {
            VerifyOutcome::Checked(res) => {
                assert!(!res.ok);
                assert_eq!(res.failure, Some(VerifyFailure::MissingReference));
                assert_eq!(res.evidence, EvidenceKind::None);
            }
            VerifyOutcome::NotYetVisible => panic!("expected checked failure"),
        }
        assert_eq!(ledger.fetch_calls(), 0);
    }

    #[tokio::test]
    async fn test_balance_delta_confirms() {
        // Scenario A: pre 1_000_000, post 1_500_000 owned by R, expect 0.5
        let ledger = Arc::new(MockLedgerClient::new());
        ledger.seed_transaction(balance_tx("sig", "R", 1_000_000, 1_500_000));
        let engine = engine_with(ledger);

        match engine.verify("sig", dec!(0.5), 6, "R", DEADLINE).await {
            VerifyOutcome::Checked(res) => {
                assert!(res.ok);
                assert_eq!(res.received_atomic, 500_000);
                assert_eq!(res.expected_atomic, 500_000);
                assert_eq!(res.evidence, EvidenceKind::BalanceDelta);
                assert!(res.failure.is_none());
            }
            VerifyOutcome::NotYetVisible => panic!("transaction was seeded"),
        }
    }

    #[tokio::test]
    async fn test_underpayment_fails_with_amount_mismatch() {
        let ledger = Arc::new(MockLedgerClient::new());
        ledger.seed_transaction(balance_tx("sig", "R", 0, 400_000));
        let engine = engine_with(ledger);

        match engine.verify("sig", dec!(0.5), 6, "R", DEADLINE).await {
            VerifyOutcome::Checked(res) => {
                assert!(!res.ok);
                assert_eq!(
                    res.failure,
                    Some(VerifyFailure::AmountMismatch {
                        received: 400_000,
                        expected: 500_000,
                    })
                );
                assert_eq!(res.evidence, EvidenceKind::BalanceDelta);
            }
            VerifyOutcome::NotYetVisible => panic!("transaction was seeded"),
        }
    }

    #[tokio::test]
    async fn test_overpayment_tolerated() {
        let ledger = Arc::new(MockLedgerClient::new());
        ledger.seed_transaction(balance_tx("sig", "R", 0, 2_000_000));
        let engine = engine_with(ledger);

        match engine.verify("sig", dec!(0.5), 6, "R", DEADLINE).await {
            VerifyOutcome::Checked(res) => assert!(res.ok),
            VerifyOutcome::NotYetVisible => panic!("transaction was seeded"),
        }
    }

    #[tokio::test]
    async fn test_not_found_is_not_yet_visible() {
        // Scenario B
        let ledger = Arc::new(MockLedgerClient::new());
        let engine = engine_with(ledger);

        let outcome = engine.verify("absent", dec!(0.5), 6, "R", DEADLINE).await;
        assert_eq!(outcome, VerifyOutcome::NotYetVisible);
    }

    #[tokio::test]
    async fn test_fetch_timeout_is_not_yet_visible() {
        // A deadline expiry says nothing about the transaction itself
        let ledger = Arc::new(MockLedgerClient::new());
        ledger.seed_transaction(balance_tx("sig", "R", 0, 500_000));
        ledger.fail_fetch_timeout();
        let engine = engine_with(ledger);

        let outcome = engine.verify("sig", dec!(0.5), 6, "R", DEADLINE).await;
        assert_eq!(outcome, VerifyOutcome::NotYetVisible);
    }

    #[tokio::test]
    async fn test_ledger_fault_is_transient_not_mismatch() {
        let ledger = Arc::new(MockLedgerClient::new());
        ledger.fail_fetch("connection refused");
        let engine = engine_with(ledger);

        match engine.verify("sig", dec!(0.5), 6, "R", DEADLINE).await {
            VerifyOutcome::Checked(res) => {
                assert!(!res.ok);
                let failure = res.failure.expect("classified failure");
                assert!(failure.is_transient());
                assert!(matches!(failure, VerifyFailure::LedgerUnavailable(_)));
            }
            VerifyOutcome::NotYetVisible => panic!("expected checked failure"),
        }
    }

    #[tokio::test]
    async fn test_instruction_match_uses_observed_amount() {
        let ledger = Arc::new(MockLedgerClient::new());
        let mut tx = balance_tx("sig", "X", 0, 0);
        tx.instructions = vec![InstructionInfo::Transfer {
            destination: "R".to_string(),
            amount: Some(300_000),
        }];
        ledger.seed_transaction(tx);
        let engine = engine_with(ledger);

        match engine.verify("sig", dec!(0.5), 6, "R", DEADLINE).await {
            VerifyOutcome::Checked(res) => {
                // observed 300k < expected 500k: the weak path can reject
                assert!(!res.ok);
                assert_eq!(res.evidence, EvidenceKind::InstructionMatch);
                assert_eq!(res.received_atomic, 300_000);
            }
            VerifyOutcome::NotYetVisible => panic!("transaction was seeded"),
        }
    }

    #[tokio::test]
    async fn test_instruction_match_without_amount_credits_expected() {
        let ledger = Arc::new(MockLedgerClient::new());
        let mut tx = balance_tx("sig", "X", 0, 0);
        tx.instructions = vec![InstructionInfo::Transfer {
            destination: "R".to_string(),
            amount: None,
        }];
        ledger.seed_transaction(tx);
        let engine = engine_with(ledger);

        match engine.verify("sig", dec!(0.5), 6, "R", DEADLINE).await {
            VerifyOutcome::Checked(res) => {
                // structural presence with no decodable amount: the expected
                // amount is credited, and the evidence tag says so
                assert!(res.ok);
                assert_eq!(res.evidence, EvidenceKind::InstructionMatch);
                assert_eq!(res.received_atomic, res.expected_atomic);
            }
            VerifyOutcome::NotYetVisible => panic!("transaction was seeded"),
        }
    }

    #[tokio::test]
    async fn test_balance_delta_preferred_over_instruction_match() {
        let ledger = Arc::new(MockLedgerClient::new());
        let mut tx = balance_tx("sig", "R", 0, 500_000);
        tx.instructions = vec![InstructionInfo::Transfer {
            destination: "R".to_string(),
            amount: Some(1),
        }];
        ledger.seed_transaction(tx);
        let engine = engine_with(ledger);

        match engine.verify("sig", dec!(0.5), 6, "R", DEADLINE).await {
            VerifyOutcome::Checked(res) => {
                assert!(res.ok);
                assert_eq!(res.evidence, EvidenceKind::BalanceDelta);
            }
            VerifyOutcome::NotYetVisible => panic!("transaction was seeded"),
        }
    }
}
