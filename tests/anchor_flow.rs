//! Integration tests for digests and on-chain anchoring
//!
//! 1. Digests are deterministic and stable across service instances
//! 2. Anchoring writes the digest into a memo transaction
//! 3. A missing anchor key or a failed submit never blocks confirmation

use std::sync::Arc;
use std::time::Duration;

use rust_decimal_macros::dec;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use solana_sdk::transaction::Transaction;

use tiprail_core::{PaymentStatus, TipRailConfig};
use tiprail_ledger::{MockLedgerClient, ParsedTransaction, TokenBalance, MEMO_PROGRAM_ID};
use tiprail_verify::{compute_digest, AnchorService, MemoryStore, PaymentService};

// =============================================================================
// HELPERS
// =============================================================================

const RECIPIENT: &str = "seFkxFkXEY9JGEpCyPfCWTuPZG9WK6ucf95zvKCfsRX";

fn service_with_signer(
    ledger: Arc<MockLedgerClient>,
    signer: Option<Keypair>,
) -> PaymentService {
    PaymentService::new(
        TipRailConfig {
            recipient_wallet: RECIPIENT.to_string(),
            ..TipRailConfig::default()
        },
        Arc::new(MemoryStore::new()),
        ledger,
        signer,
    )
}

fn paid_settlement(reference: &str, amount: u64) -> ParsedTransaction {
    ParsedTransaction {
        reference: reference.to_string(),
        pre_token_balances: vec![],
        post_token_balances: vec![TokenBalance {
            account_index: 1,
            owner: Some(RECIPIENT.to_string()),
            amount,
        }],
        instructions: vec![],
    }
}

// =============================================================================
// 1. Digest determinism
// =============================================================================

#[test]
fn test_digest_is_deterministic() {
    let a = compute_digest("sess-1", dec!(0.5), "sig-a");
    let b = compute_digest("sess-1", dec!(0.5), "sig-a");
    assert_eq!(a, b);
    assert_eq!(a.len(), 64);
}

#[test]
fn test_digest_changes_with_any_field() {
    let base = compute_digest("sess-1", dec!(0.5), "sig-a");
    assert_ne!(base, compute_digest("sess-2", dec!(0.5), "sig-a"));
    assert_ne!(base, compute_digest("sess-1", dec!(0.6), "sig-a"));
    assert_ne!(base, compute_digest("sess-1", dec!(0.5), "sig-b"));
}

#[test]
fn test_digest_ignores_decimal_representation() {
    // 0.5 and 0.50 are the same amount; the digest must agree
    assert_eq!(
        compute_digest("sess-1", dec!(0.5), "sig-a"),
        compute_digest("sess-1", dec!(0.50), "sig-a"),
    );
}

// =============================================================================
// 2. Anchoring through confirmation
// =============================================================================

#[tokio::test]
async fn test_confirmation_anchors_digest_in_memo() {
    let ledger = Arc::new(MockLedgerClient::new());
    ledger.seed_transaction(paid_settlement("sig-a", 500_000));
    let service = service_with_signer(ledger.clone(), Some(Keypair::new()));

    service
        .create_request("sess-1", "cafe-42", dec!(0.5))
        .await
        .unwrap();
    let response = service.verify_payment("sess-1", "sig-a").await.unwrap();

    assert_eq!(response.status, PaymentStatus::Confirmed);
    assert!(response.anchor_ref.is_some());

    let submitted = ledger.submitted();
    assert_eq!(submitted.len(), 1);
    let tx: Transaction = bincode::deserialize(&submitted[0]).unwrap();
    let memo = &tx.message.instructions[0];
    let program = tx.message.account_keys[memo.program_id_index as usize];
    assert_eq!(program, Pubkey::new_from_array(MEMO_PROGRAM_ID));
    assert_eq!(memo.data, response.digest.unwrap().into_bytes());
}

#[tokio::test]
async fn test_no_anchor_key_still_confirms() {
    let ledger = Arc::new(MockLedgerClient::new());
    ledger.seed_transaction(paid_settlement("sig-a", 500_000));
    let service = service_with_signer(ledger.clone(), None);

    service
        .create_request("sess-1", "cafe-42", dec!(0.5))
        .await
        .unwrap();
    let response = service.verify_payment("sess-1", "sig-a").await.unwrap();

    assert_eq!(response.status, PaymentStatus::Confirmed);
    assert!(response.digest.is_some());
    assert!(response.anchor_ref.is_none());
    assert!(ledger.submitted().is_empty());
}

#[tokio::test]
async fn test_anchor_submit_failure_degrades_gracefully() {
    let ledger = Arc::new(MockLedgerClient::new());
    ledger.seed_transaction(paid_settlement("sig-a", 500_000));
    ledger.fail_submit("rpc down");
    let service = service_with_signer(ledger, Some(Keypair::new()));

    service
        .create_request("sess-1", "cafe-42", dec!(0.5))
        .await
        .unwrap();
    let response = service.verify_payment("sess-1", "sig-a").await.unwrap();

    // Anchoring is best effort: the payment outcome is unaffected
    assert_eq!(response.status, PaymentStatus::Confirmed);
    assert!(response.digest.is_some());
    assert!(response.anchor_ref.is_none());
}

// =============================================================================
// 3. AnchorService in isolation
// =============================================================================

#[tokio::test]
async fn test_anchor_service_without_key_skips_quietly() {
    let ledger = Arc::new(MockLedgerClient::new());
    let anchor = AnchorService::new(ledger.clone(), None);
    assert!(!anchor.has_signer());

    let receipt = anchor.anchor("abc123", Duration::from_secs(1)).await;
    assert_eq!(receipt.digest, "abc123");
    assert!(receipt.anchor_ref.is_none());
    assert!(ledger.submitted().is_empty());
}

#[tokio::test]
async fn test_anchor_service_returns_submission_reference() {
    let ledger = Arc::new(MockLedgerClient::new());
    let anchor = AnchorService::new(ledger.clone(), Some(Keypair::new()));

    let digest = compute_digest("sess-1", dec!(0.5), "sig-a");
    let receipt = anchor.anchor(&digest, Duration::from_secs(1)).await;
    assert!(receipt.anchor_ref.is_some());
    assert_eq!(ledger.submitted().len(), 1);
}
