//! Digest anchoring
//!
//! Anchors an audit digest on the ledger as the memo payload of a minimal
//! transaction signed with a service-held key. Anchoring is best-effort
//! infrastructure: neither a missing key nor a failed submission ever
//! affects the verification response.

use std::sync::Arc;
use std::time::Duration;

use solana_sdk::{
    instruction::Instruction,
    pubkey::Pubkey,
    signature::{Keypair, Signer},
    transaction::Transaction,
};
use tracing::{info, warn};

use tiprail_core::AnchorReceipt;
use tiprail_ledger::{LedgerClient, LedgerError, Result, MEMO_PROGRAM_ID};

/// Best-effort digest anchoring over the ledger client.
pub struct AnchorService {
    ledger: Arc<dyn LedgerClient>,
    signer: Option<Keypair>,
}

impl AnchorService {
    /// `signer: None` disables anchoring and nothing else.
    pub fn new(ledger: Arc<dyn LedgerClient>, signer: Option<Keypair>) -> Self {
        Self { ledger, signer }
    }

    pub fn has_signer(&self) -> bool {
        self.signer.is_some()
    }

    /// Anchor a digest. `anchor_ref: None` means skipped (no key) or failed;
    /// both are non-fatal.
    pub async fn anchor(&self, digest: &str, deadline: Duration) -> AnchorReceipt {
        let anchor_ref = match self.try_anchor(digest, deadline).await {
            Ok(reference) => reference,
            Err(err) => {
                warn!("Anchor failed (non-fatal): {}", err);
                None
            }
        };
        AnchorReceipt {
            digest: digest.to_string(),
            anchor_ref,
        }
    }

    async fn try_anchor(&self, digest: &str, deadline: Duration) -> Result<Option<String>> {
        let Some(keypair) = &self.signer else {
            info!("No anchor signing key configured; skipping anchor");
            return Ok(None);
        };

        let blockhash = self.ledger.latest_blockhash(deadline).await?;

        let memo = Instruction {
            program_id: Pubkey::new_from_array(MEMO_PROGRAM_ID),
            accounts: vec![],
            data: digest.as_bytes().to_vec(),
        };

        let tx = Transaction::new_signed_with_payer(
            &[memo],
            Some(&keypair.pubkey()),
            &[keypair],
            blockhash,
        );
        let signed = bincode::serialize(&tx)
            .map_err(|e| LedgerError::Decode(format!("anchor transaction: {e}")))?;

        let reference = self.ledger.submit_transaction(&signed, deadline).await?;
        self.ledger.await_confirmation(&reference, deadline).await?;

        info!("Digest anchored: {}", reference);
        Ok(Some(reference))
    }
}
