//! Payment service facade
//!
//! Ties the engine, digest/anchor service and record store together behind
//! the contract the host system calls. Each call may run concurrently with
//! others, including for the same session; correctness rests on the store's
//! conditional transition, so the facade is safe to invoke redundantly.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use solana_sdk::signature::Keypair;
use tracing::{debug, info};

use tiprail_core::{
    receipt_id, EvidenceKind, PayError, PaymentRequest, PaymentStatus, Result, TipRailConfig,
    VerifyOutcome, VerifyResponse,
};
use tiprail_ledger::LedgerClient;

use crate::{
    canonical_digest, compute_digest, to_atomic, AnchorService, PaymentStore, StoreError,
    VerificationEngine,
};

/// x402-style payment-required payload handed back when a request is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentPayload {
    pub code: u16,
    pub message: String,
    pub amount: Decimal,
    pub currency: String,
    pub network: String,
    pub pay_to: String,
    pub token_mint: String,
    pub memo: String,
    pub expires_at: u64,
    pub suggested_tip: Decimal,
    pub session: String,
}

/// Staff split of a tip total, with its own audit digest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TipSplit {
    pub total: Decimal,
    pub foh: Decimal,
    pub boh: Decimal,
    pub bar: Decimal,
    pub digest: String,
}

/// The verification and anchoring core, assembled.
pub struct PaymentService {
    config: TipRailConfig,
    store: Arc<dyn PaymentStore>,
    engine: VerificationEngine,
    anchor: AnchorService,
}

impl PaymentService {
    /// `anchor_signer: None` disables anchoring, nothing else.
    pub fn new(
        config: TipRailConfig,
        store: Arc<dyn PaymentStore>,
        ledger: Arc<dyn LedgerClient>,
        anchor_signer: Option<Keypair>,
    ) -> Self {
        Self {
            engine: VerificationEngine::new(ledger.clone()),
            anchor: AnchorService::new(ledger, anchor_signer),
            config,
            store,
        }
    }

    fn deadline(&self) -> Duration {
        Duration::from_secs(self.config.rpc_deadline_secs)
    }

    fn now() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }

    /// Create a payment request for a session. The session is the
    /// idempotency key; creating it twice is an error.
    pub async fn create_request(
        &self,
        session: &str,
        merchant_id: &str,
        amount: Decimal,
    ) -> Result<PaymentRequest> {
        if amount <= Decimal::ZERO {
            return Err(PayError::InvalidAmount(amount.to_string()));
        }

        let request = PaymentRequest {
            session: session.to_string(),
            merchant_id: merchant_id.to_string(),
            expected_amount: amount,
            token_scale: self.config.token_scale,
            recipient_address: self.config.recipient_wallet.clone(),
            status: PaymentStatus::Pending,
            settlement_ref: None,
            created_at: Self::now(),
        };
        self.store.create(request.clone()).await.map_err(map_store)?;

        info!(
            "Payment request created: session={}, merchant={}, amount={}",
            session, merchant_id, amount
        );
        Ok(request)
    }

    /// Payment-required payload for a request, in the shape wallets expect.
    pub fn payment_payload(&self, request: &PaymentRequest) -> PaymentPayload {
        PaymentPayload {
            code: 402,
            message: "Payment required to complete request".to_string(),
            amount: request.expected_amount,
            currency: "USDC".to_string(),
            network: self.network_label(),
            pay_to: request.recipient_address.clone(),
            token_mint: self.config.token_mint.clone(),
            memo: format!("tip:{}:{}", request.merchant_id, request.session),
            expires_at: Self::now() + self.config.payment_expiry_secs,
            suggested_tip: Self::suggest_tip(request.expected_amount),
            session: request.session.clone(),
        }
    }

    fn network_label(&self) -> String {
        if self.config.rpc_url.contains("devnet") {
            "solana-devnet".to_string()
        } else if self.config.rpc_url.contains("testnet") {
            "solana-testnet".to_string()
        } else {
            "solana-mainnet".to_string()
        }
    }

    /// Verify a claimed settlement for a session and record the outcome.
    ///
    /// Transitions: verify ok -> `Confirmed`, under-payment -> `Failed`.
    /// A not-yet-visible transaction and infrastructure faults leave the
    /// record `Pending` for the caller to retry. Terminal records are
    /// replay-safe: the call makes no ledger fetch and changes nothing.
    pub async fn verify_payment(
        &self,
        session: &str,
        settlement_ref: &str,
    ) -> Result<VerifyResponse> {
        let record = self
            .store
            .find_by_session(session)
            .await
            .map_err(map_store)?
            .ok_or_else(|| PayError::RecordNotFound(session.to_string()))?;

        if record.status.is_terminal() {
            debug!("Replay for terminal session {}: {:?}", session, record.status);
            let stored_ref = record.settlement_ref.clone().unwrap_or_default();
            return Ok(VerifyResponse {
                status: record.status,
                receipt_id: receipt_id(session),
                digest: Some(compute_digest(session, record.expected_amount, &stored_ref)),
                anchor_ref: None,
                evidence: EvidenceKind::None,
                received_atomic: 0,
                expected_atomic: to_atomic(record.expected_amount, record.token_scale)
                    .unwrap_or(0),
            });
        }

        if settlement_ref.is_empty() {
            return Err(PayError::MissingReference);
        }

        let outcome = self
            .engine
            .verify(
                settlement_ref,
                record.expected_amount,
                record.token_scale,
                &record.recipient_address,
                self.deadline(),
            )
            .await;

        let result = match outcome {
            VerifyOutcome::NotYetVisible => {
                return Ok(VerifyResponse {
                    status: PaymentStatus::Pending,
                    receipt_id: receipt_id(session),
                    digest: None,
                    anchor_ref: None,
                    evidence: EvidenceKind::None,
                    received_atomic: 0,
                    expected_atomic: to_atomic(record.expected_amount, record.token_scale)
                        .unwrap_or(0),
                });
            }
            VerifyOutcome::Checked(result) => result,
        };

        // Transient faults are not proof of non-payment: no transition.
        // The empty-reference case never reaches the engine; it is rejected
        // above, so every remaining failure here is an amount mismatch.
        if let Some(failure) = &result.failure {
            if failure.is_transient() {
                return Ok(VerifyResponse {
                    status: PaymentStatus::Pending,
                    receipt_id: receipt_id(session),
                    digest: None,
                    anchor_ref: None,
                    evidence: result.evidence,
                    received_atomic: result.received_atomic,
                    expected_atomic: result.expected_atomic,
                });
            }
        }

        let target = if result.ok {
            PaymentStatus::Confirmed
        } else {
            PaymentStatus::Failed
        };
        let applied = self
            .store
            .transition_if_pending(session, target, settlement_ref)
            .await
            .map_err(map_store)?;

        // Re-read: if we lost a race, another call's transition stands.
        let record = self
            .store
            .find_by_session(session)
            .await
            .map_err(map_store)?
            .ok_or_else(|| PayError::RecordNotFound(session.to_string()))?;

        let stored_ref = record.settlement_ref.clone().unwrap_or_default();
        let digest = record
            .status
            .is_terminal()
            .then(|| compute_digest(session, record.expected_amount, &stored_ref));

        // Anchor once, from the call that won the transition.
        let anchor_ref = match (&digest, applied) {
            (Some(digest), true) => {
                self.anchor
                    .anchor(digest, self.deadline())
                    .await
                    .anchor_ref
            }
            _ => None,
        };

        info!(
            "Verification for session {}: status={:?}, applied={}, evidence={:?}",
            session, record.status, applied, result.evidence
        );

        Ok(VerifyResponse {
            status: record.status,
            receipt_id: receipt_id(session),
            digest,
            anchor_ref,
            evidence: result.evidence,
            received_atomic: result.received_atomic,
            expected_atomic: result.expected_atomic,
        })
    }

    /// Flat 10% tip suggestion, two decimal places.
    pub fn suggest_tip(amount: Decimal) -> Decimal {
        (amount * Decimal::new(1, 1)).round_dp(2)
    }

    /// FOH 60 / BOH 30 / Bar 10 split of a tip total.
    pub fn split_total(total: Decimal) -> TipSplit {
        let foh = (total * Decimal::new(6, 1)).round_dp(2);
        let boh = (total * Decimal::new(3, 1)).round_dp(2);
        let bar = (total * Decimal::new(1, 1)).round_dp(2);
        let digest = canonical_digest(&[
            &foh.normalize().to_string(),
            &boh.normalize().to_string(),
            &bar.normalize().to_string(),
        ]);
        TipSplit {
            total,
            foh,
            boh,
            bar,
            digest,
        }
    }
}

fn map_store(err: StoreError) -> PayError {
    match err {
        StoreError::DuplicateSession(session) => PayError::DuplicateSession(session),
        StoreError::Backend(reason) => PayError::Store(reason),
    }
}
