//! Deterministic in-memory ledger for tests and development
//!
//! All operations succeed against seeded state, no network access. Fetch
//! calls are counted so tests can assert that rejected inputs never reach
//! the ledger.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use solana_sdk::hash::Hash;
use tracing::info;

use crate::{LedgerClient, LedgerError, ParsedTransaction, Result};

#[derive(Debug, Default)]
struct MockState {
    /// Seeded transactions by reference
    transactions: HashMap<String, ParsedTransaction>,
    /// Number of fetch_transaction invocations
    fetch_calls: u64,
    /// Raw bytes of every submitted transaction
    submitted: Vec<Vec<u8>>,
    /// Forced fetch failure (simulates infrastructure outage)
    fail_fetch: Option<String>,
    /// Forced fetch deadline expiry (simulates a slow endpoint)
    fetch_times_out: bool,
    /// Forced submit failure
    fail_submit: Option<String>,
    /// Transaction counter for generating mock signatures
    tx_counter: u64,
}

/// In-memory [`LedgerClient`] in the style of a live client's mock mode.
#[derive(Debug, Default)]
pub struct MockLedgerClient {
    state: RwLock<MockState>,
}

impl MockLedgerClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a transaction so subsequent fetches see it.
    pub fn seed_transaction(&self, parsed: ParsedTransaction) {
        let mut state = self.state.write().expect("mock ledger lock poisoned");
        state.transactions.insert(parsed.reference.clone(), parsed);
    }

    /// Make every fetch fail with an RPC error until cleared.
    pub fn fail_fetch(&self, reason: &str) {
        let mut state = self.state.write().expect("mock ledger lock poisoned");
        state.fail_fetch = Some(reason.to_string());
    }

    /// Make every fetch exceed its deadline until cleared.
    pub fn fail_fetch_timeout(&self) {
        let mut state = self.state.write().expect("mock ledger lock poisoned");
        state.fetch_times_out = true;
    }

    /// Make every submit fail until cleared.
    pub fn fail_submit(&self, reason: &str) {
        let mut state = self.state.write().expect("mock ledger lock poisoned");
        state.fail_submit = Some(reason.to_string());
    }

    /// Clear forced failures.
    pub fn heal(&self) {
        let mut state = self.state.write().expect("mock ledger lock poisoned");
        state.fail_fetch = None;
        state.fetch_times_out = false;
        state.fail_submit = None;
    }

    /// How many fetches have been issued.
    pub fn fetch_calls(&self) -> u64 {
        self.state.read().expect("mock ledger lock poisoned").fetch_calls
    }

    /// Raw bytes of every transaction submitted so far.
    pub fn submitted(&self) -> Vec<Vec<u8>> {
        self.state
            .read()
            .expect("mock ledger lock poisoned")
            .submitted
            .clone()
    }

    fn generate_mock_signature(state: &mut MockState) -> String {
        state.tx_counter += 1;
        let mut sig = [0u8; 64];
        sig[0..8].copy_from_slice(&state.tx_counter.to_le_bytes());
        sig[8..16].copy_from_slice(b"mocktxn!");
        bs58::encode(sig).into_string()
    }
}

#[async_trait]
impl LedgerClient for MockLedgerClient {
    async fn fetch_transaction(
        &self,
        reference: &str,
        _deadline: Duration,
    ) -> Result<Option<ParsedTransaction>> {
        let mut state = self.state.write().expect("mock ledger lock poisoned");
        state.fetch_calls += 1;
        if state.fetch_times_out {
            return Err(LedgerError::Timeout);
        }
        if let Some(reason) = &state.fail_fetch {
            return Err(LedgerError::Rpc(reason.clone()));
        }
        Ok(state.transactions.get(reference).cloned())
    }

    async fn latest_blockhash(&self, _deadline: Duration) -> Result<Hash> {
        Ok(Hash::default())
    }

    async fn submit_transaction(&self, signed: &[u8], _deadline: Duration) -> Result<String> {
        let mut state = self.state.write().expect("mock ledger lock poisoned");
        if let Some(reason) = &state.fail_submit {
            return Err(LedgerError::TransactionFailed(reason.clone()));
        }
        state.submitted.push(signed.to_vec());
        let sig = Self::generate_mock_signature(&mut state);
        info!("[MOCK] Transaction submitted: {}", sig);
        Ok(sig)
    }

    async fn await_confirmation(&self, _reference: &str, _deadline: Duration) -> Result<()> {
        Ok(())
    }
}
