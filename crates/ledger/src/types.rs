//! Parsed transaction detail exposed to the verification engine

use serde::{Deserialize, Serialize};

/// Memo program ID bytes
/// Program: MemoSq4gqABAXKb96qnH8TysNcWxMyWCqXgDLGmfcHr
pub const MEMO_PROGRAM_ID: [u8; 32] = [
    5, 74, 83, 90, 153, 41, 33, 6, 77, 36, 232, 113, 96, 218, 56, 124,
    124, 53, 181, 221, 188, 146, 187, 129, 228, 31, 168, 64, 65, 5, 68, 141,
];

/// Devnet USDC mint (6 decimals)
pub const USDC_MINT_DEVNET: &str = "4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU";

/// Mainnet USDC mint (6 decimals)
pub const USDC_MINT_MAINNET: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

/// A token balance snapshot for one account within a transaction.
///
/// `amount` is in atomic units. Pre and post snapshots with the same
/// `account_index` refer to the same account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBalance {
    /// Index of the account within the transaction's account list
    pub account_index: u8,
    /// Wallet that owns the token account, when the ledger reports it
    pub owner: Option<String>,
    /// Balance in atomic units
    pub amount: u64,
}

/// A parsed instruction within a transaction.
///
/// Only token transfers are decoded structurally; everything else keeps its
/// program tag so callers can see what the transaction touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstructionInfo {
    /// A decodable token transfer. `amount` is atomic units when the parsed
    /// form carried one; `transferChecked` always does, legacy encodings may
    /// not.
    Transfer {
        destination: String,
        amount: Option<u64>,
    },
    /// Any instruction that is not a decodable transfer
    Other { program: String },
}

/// Parsed detail of a confirmed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedTransaction {
    /// Base58 transaction signature this detail was fetched for
    pub reference: String,
    /// Token balances before execution
    pub pre_token_balances: Vec<TokenBalance>,
    /// Token balances after execution
    pub post_token_balances: Vec<TokenBalance>,
    /// Parsed instruction list
    pub instructions: Vec<InstructionInfo>,
}

impl ParsedTransaction {
    /// Sum of positive recipient-owned balance deltas, in atomic units.
    ///
    /// Pairs post entries with pre entries by account index; a post entry
    /// with no pre counterpart counts from zero (freshly created token
    /// account). Zero and negative deltas contribute nothing. Multiple
    /// recipient-owned accounts in one transaction all contribute, which
    /// covers batched transfers landing in a single transaction.
    pub fn received_by(&self, recipient: &str) -> u64 {
        let mut received: u64 = 0;
        for post in &self.post_token_balances {
            if post.owner.as_deref() != Some(recipient) {
                continue;
            }
            let pre = self
                .pre_token_balances
                .iter()
                .find(|p| p.account_index == post.account_index)
                .map(|p| p.amount)
                .unwrap_or(0);
            received = received.saturating_add(post.amount.saturating_sub(pre));
        }
        received
    }

    /// First decodable transfer instruction targeting `recipient`, if any.
    pub fn transfer_to(&self, recipient: &str) -> Option<&InstructionInfo> {
        self.instructions.iter().find(|ix| {
            matches!(ix, InstructionInfo::Transfer { destination, .. } if destination == recipient)
        })
    }
}
