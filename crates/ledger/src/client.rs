//! Ledger client trait and the live Solana RPC implementation

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;
use tracing::{debug, info};

use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::RpcTransactionConfig;
use solana_client::rpc_request::RpcError;
use solana_sdk::{
    commitment_config::CommitmentConfig, hash::Hash, signature::Signature,
    transaction::Transaction,
};
use solana_transaction_status::{
    EncodedConfirmedTransactionWithStatusMeta, EncodedTransaction, UiInstruction, UiMessage,
    UiParsedInstruction, UiTransactionEncoding, UiTransactionTokenBalance,
};

use crate::{InstructionInfo, LedgerError, ParsedTransaction, Result, TokenBalance};

/// Capability surface the verification core requires from the ledger.
///
/// All methods take a caller-supplied deadline; on expiry they return
/// [`LedgerError::Timeout`] promptly instead of holding the connection.
/// None of them retries internally. Dropping the returned future aborts the
/// outbound request.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Fetch a transaction's parsed detail at confirmed-or-stronger
    /// commitment. `Ok(None)` means the ledger has not surfaced the
    /// transaction yet, which is an expected, retryable outcome.
    async fn fetch_transaction(
        &self,
        reference: &str,
        deadline: Duration,
    ) -> Result<Option<ParsedTransaction>>;

    /// Latest blockhash, needed to build the anchor transaction.
    async fn latest_blockhash(&self, deadline: Duration) -> Result<Hash>;

    /// Submit a bincode-encoded signed transaction; returns its base58
    /// signature. Anchor path only.
    async fn submit_transaction(&self, signed: &[u8], deadline: Duration) -> Result<String>;

    /// Wait until the referenced transaction reaches the configured
    /// commitment.
    async fn await_confirmation(&self, reference: &str, deadline: Duration) -> Result<()>;
}

/// Live ledger client over the Solana JSON-RPC API.
///
/// The underlying connection is shared read-only across concurrent
/// verification calls; the only state it mutates on the ledger is the anchor
/// transactions submitted through it.
pub struct RpcLedgerClient {
    rpc: RpcClient,
    commitment: CommitmentConfig,
}

impl RpcLedgerClient {
    /// Create a client for the given endpoint and commitment level.
    ///
    /// "processed" state can still be rolled back, so anything below
    /// "confirmed" is upgraded to "confirmed".
    pub fn new(rpc_url: &str, commitment: &str) -> Self {
        let commitment = match commitment {
            "finalized" => CommitmentConfig::finalized(),
            _ => CommitmentConfig::confirmed(),
        };
        Self {
            rpc: RpcClient::new_with_commitment(rpc_url.to_string(), commitment),
            commitment,
        }
    }

    fn parse_reference(reference: &str) -> Result<Signature> {
        reference
            .parse::<Signature>()
            .map_err(|e| LedgerError::InvalidReference(format!("{reference}: {e}")))
    }
}

/// A missing signature comes back as a null RPC result, which the client
/// surfaces as a deserialization error; transport faults look different.
fn is_not_found(err: &ClientError) -> bool {
    match err.kind() {
        ClientErrorKind::SerdeJson(_) => true,
        ClientErrorKind::RpcError(RpcError::ForUser(msg)) => msg.contains("not found"),
        _ => false,
    }
}

fn decode_balance(entry: &UiTransactionTokenBalance) -> Result<TokenBalance> {
    let amount = entry
        .ui_token_amount
        .amount
        .parse::<u64>()
        .map_err(|e| LedgerError::Decode(format!("token amount: {e}")))?;
    Ok(TokenBalance {
        account_index: entry.account_index,
        owner: Option::<String>::from(entry.owner.clone()),
        amount,
    })
}

fn decode_instruction(ix: &UiInstruction) -> InstructionInfo {
    match ix {
        UiInstruction::Parsed(UiParsedInstruction::Parsed(parsed)) => {
            let kind = parsed.parsed.get("type").and_then(|v| v.as_str());
            let info = parsed.parsed.get("info");
            if matches!(kind, Some("transfer") | Some("transferChecked")) {
                if let Some(destination) = info
                    .and_then(|i| i.get("destination"))
                    .and_then(|v| v.as_str())
                {
                    // "transfer" carries a bare amount string,
                    // "transferChecked" nests it under tokenAmount
                    let amount = info
                        .and_then(|i| i.get("amount"))
                        .and_then(|v| v.as_str())
                        .and_then(|s| s.parse::<u64>().ok())
                        .or_else(|| {
                            info.and_then(|i| i.get("tokenAmount"))
                                .and_then(|t| t.get("amount"))
                                .and_then(|v| v.as_str())
                                .and_then(|s| s.parse::<u64>().ok())
                        });
                    return InstructionInfo::Transfer {
                        destination: destination.to_string(),
                        amount,
                    };
                }
            }
            InstructionInfo::Other {
                program: parsed.program.clone(),
            }
        }
        UiInstruction::Parsed(UiParsedInstruction::PartiallyDecoded(pd)) => {
            InstructionInfo::Other {
                program: pd.program_id.clone(),
            }
        }
        UiInstruction::Compiled(_) => InstructionInfo::Other {
            program: "compiled".to_string(),
        },
    }
}

fn decode_transaction(
    reference: &str,
    fetched: EncodedConfirmedTransactionWithStatusMeta,
) -> Result<ParsedTransaction> {
    let meta = fetched
        .transaction
        .meta
        .ok_or_else(|| LedgerError::Decode("missing transaction meta".to_string()))?;

    let pre = Option::<Vec<UiTransactionTokenBalance>>::from(meta.pre_token_balances)
        .unwrap_or_default();
    let post = Option::<Vec<UiTransactionTokenBalance>>::from(meta.post_token_balances)
        .unwrap_or_default();

    let instructions = match &fetched.transaction.transaction {
        EncodedTransaction::Json(tx) => match &tx.message {
            UiMessage::Parsed(message) => {
                message.instructions.iter().map(decode_instruction).collect()
            }
            UiMessage::Raw(_) => Vec::new(),
        },
        _ => Vec::new(),
    };

    Ok(ParsedTransaction {
        reference: reference.to_string(),
        pre_token_balances: pre.iter().map(decode_balance).collect::<Result<_>>()?,
        post_token_balances: post.iter().map(decode_balance).collect::<Result<_>>()?,
        instructions,
    })
}

#[async_trait]
impl LedgerClient for RpcLedgerClient {
    async fn fetch_transaction(
        &self,
        reference: &str,
        deadline: Duration,
    ) -> Result<Option<ParsedTransaction>> {
        let signature = Self::parse_reference(reference)?;
        let config = RpcTransactionConfig {
            encoding: Some(UiTransactionEncoding::JsonParsed),
            commitment: Some(self.commitment),
            max_supported_transaction_version: Some(0),
        };

        let fetched = timeout(
            deadline,
            self.rpc.get_transaction_with_config(&signature, config),
        )
        .await
        .map_err(|_| LedgerError::Timeout)?;

        match fetched {
            Ok(tx) => {
                debug!("Fetched transaction {}", reference);
                Ok(Some(decode_transaction(reference, tx)?))
            }
            Err(err) if is_not_found(&err) => {
                debug!("Transaction {} not visible yet", reference);
                Ok(None)
            }
            Err(err) => Err(LedgerError::Rpc(format!("get_transaction: {err}"))),
        }
    }

    async fn latest_blockhash(&self, deadline: Duration) -> Result<Hash> {
        timeout(deadline, self.rpc.get_latest_blockhash())
            .await
            .map_err(|_| LedgerError::Timeout)?
            .map_err(|e| LedgerError::Rpc(format!("get_latest_blockhash: {e}")))
    }

    async fn submit_transaction(&self, signed: &[u8], deadline: Duration) -> Result<String> {
        let tx: Transaction = bincode::deserialize(signed)
            .map_err(|e| LedgerError::Decode(format!("signed transaction: {e}")))?;

        let signature = timeout(deadline, self.rpc.send_transaction(&tx))
            .await
            .map_err(|_| LedgerError::Timeout)?
            .map_err(|e| LedgerError::TransactionFailed(e.to_string()))?;

        info!("Transaction submitted: {}", signature);
        Ok(signature.to_string())
    }

    async fn await_confirmation(&self, reference: &str, deadline: Duration) -> Result<()> {
        let signature = Self::parse_reference(reference)?;

        let confirmed = timeout(
            deadline,
            self.rpc
                .confirm_transaction_with_commitment(&signature, self.commitment),
        )
        .await
        .map_err(|_| LedgerError::Timeout)?
        .map_err(|e| LedgerError::Rpc(format!("confirm_transaction: {e}")))?;

        if !confirmed.value {
            return Err(LedgerError::Unconfirmed(reference.to_string()));
        }
        info!("Transaction confirmed: {}", reference);
        Ok(())
    }
}
