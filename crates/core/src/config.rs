//! Configuration values consumed by the verification core.
//!
//! The core does not parse configuration sources itself; the host loads
//! this structure (file, env, flags) and hands it over as values.

use serde::{Deserialize, Serialize};

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TipRailConfig {
    /// Solana RPC endpoint
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    /// Commitment level for ledger queries. "processed" can still be rolled
    /// back and is never treated as authoritative; anything below
    /// "confirmed" is upgraded to "confirmed" by the ledger client.
    #[serde(default = "default_commitment")]
    pub commitment: String,

    /// Wallet that must receive payments
    #[serde(default = "default_recipient")]
    pub recipient_wallet: String,

    /// SPL token mint payments are denominated in (devnet USDC default)
    #[serde(default = "default_token_mint")]
    pub token_mint: String,

    /// Fractional decimal digits of the token (6 for USDC)
    #[serde(default = "default_token_scale")]
    pub token_scale: u32,

    /// Service signing key for digest anchoring, as a JSON array of 64
    /// bytes. Absent means anchoring is disabled.
    #[serde(default)]
    pub anchor_secret: Option<String>,

    /// Seconds until an issued payment request expires
    #[serde(default = "default_payment_expiry")]
    pub payment_expiry_secs: u64,

    /// Deadline applied to each outbound ledger call
    #[serde(default = "default_rpc_deadline")]
    pub rpc_deadline_secs: u64,
}

fn default_rpc_url() -> String {
    "https://api.devnet.solana.com".to_string()
}

fn default_commitment() -> String {
    "confirmed".to_string()
}

fn default_recipient() -> String {
    "seFkxFkXEY9JGEpCyPfCWTuPZG9WK6ucf95zvKCfsRX".to_string()
}

fn default_token_mint() -> String {
    // Devnet USDC
    "4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU".to_string()
}

fn default_token_scale() -> u32 {
    6
}

fn default_payment_expiry() -> u64 {
    3600
}

fn default_rpc_deadline() -> u64 {
    30
}

impl Default for TipRailConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            commitment: default_commitment(),
            recipient_wallet: default_recipient(),
            token_mint: default_token_mint(),
            token_scale: default_token_scale(),
            anchor_secret: None,
            payment_expiry_secs: default_payment_expiry(),
            rpc_deadline_secs: default_rpc_deadline(),
        }
    }
}

impl TipRailConfig {
    /// Parse the anchor secret into raw keypair bytes.
    ///
    /// A malformed secret is a startup error, not a runtime verification
    /// condition; callers should fail fast on it.
    pub fn anchor_secret_bytes(&self) -> Result<Option<Vec<u8>>, serde_json::Error> {
        match &self.anchor_secret {
            None => Ok(None),
            Some(raw) => {
                let bytes: Vec<u8> = serde_json::from_str(raw)?;
                Ok(Some(bytes))
            }
        }
    }
}
