//! TipRail CLI
//!
//! Command-line interface for the payment verification and anchoring core.
//! `request` and `verify` drive the full service against a live RPC endpoint;
//! `anchor`, `suggest-tip` and `split` expose the smaller pieces directly.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use solana_sdk::signature::Keypair;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tiprail_core::TipRailConfig;
use tiprail_ledger::RpcLedgerClient;
use tiprail_verify::{AnchorService, MemoryStore, PaymentService};

/// TipRail - Payment verification and anchoring for merchants
#[derive(Parser)]
#[command(name = "tiprail")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a JSON config file (defaults apply when absent)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a payment request and print the payment-required payload
    Request {
        /// Merchant identifier
        #[arg(short, long)]
        merchant: String,

        /// Expected amount in display units (e.g. 0.5)
        amount: Decimal,

        /// Session identifier (generated when omitted)
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Verify a settlement transaction against an expected payment
    Verify {
        /// Session identifier
        #[arg(short, long)]
        session: String,

        /// Merchant identifier
        #[arg(short, long, default_value = "cli")]
        merchant: String,

        /// Expected amount in display units
        #[arg(short, long)]
        amount: Decimal,

        /// Settlement transaction signature
        reference: String,
    },

    /// Anchor a digest on-chain via a memo transaction
    Anchor {
        /// Hex digest to anchor
        digest: String,
    },

    /// Suggest a tip for an order amount
    SuggestTip {
        /// Order amount in display units
        amount: Decimal,
    },

    /// Split a tip total across staff roles
    Split {
        /// Tip total in display units
        total: Decimal,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "debug,tiprail=trace"
    } else {
        "info,tiprail=debug"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<TipRailConfig> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("failed to parse config {}", path.display()))
        }
        None => Ok(TipRailConfig::default()),
    }
}

fn load_anchor_signer(config: &TipRailConfig) -> Result<Option<Keypair>> {
    let Some(bytes) = config
        .anchor_secret_bytes()
        .context("anchor secret is not a JSON byte array")?
    else {
        return Ok(None);
    };
    let keypair =
        Keypair::try_from(bytes.as_slice()).context("anchor secret is not a valid keypair")?;
    Ok(Some(keypair))
}

fn build_service(config: TipRailConfig) -> Result<PaymentService> {
    let signer = load_anchor_signer(&config)?;
    let ledger = Arc::new(RpcLedgerClient::new(&config.rpc_url, &config.commitment));
    Ok(PaymentService::new(
        config,
        Arc::new(MemoryStore::new()),
        ledger,
        signer,
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Request {
            merchant,
            amount,
            session,
        } => {
            let session = session.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            let service = build_service(config)?;
            let request = service.create_request(&session, &merchant, amount).await?;
            let payload = service.payment_payload(&request);
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }
        Commands::Verify {
            session,
            merchant,
            amount,
            reference,
        } => {
            let service = build_service(config)?;
            // The CLI has no persistent store; register the expectation
            // for this session before checking the settlement.
            service.create_request(&session, &merchant, amount).await?;
            info!("Verifying settlement {} for session {}", reference, session);
            let response = service.verify_payment(&session, &reference).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Commands::Anchor { digest } => {
            let deadline = Duration::from_secs(config.rpc_deadline_secs);
            let signer = load_anchor_signer(&config)?;
            let ledger = Arc::new(RpcLedgerClient::new(&config.rpc_url, &config.commitment));
            let anchor = AnchorService::new(ledger, signer);
            if !anchor.has_signer() {
                println!("No anchor key configured; anchoring skipped");
                return Ok(());
            }
            let receipt = anchor.anchor(&digest, deadline).await;
            match receipt.anchor_ref {
                Some(reference) => println!("Anchored: {}", reference),
                None => println!("Anchor attempt failed (digest remains valid off-chain)"),
            }
        }
        Commands::SuggestTip { amount } => {
            println!("{}", PaymentService::suggest_tip(amount));
        }
        Commands::Split { total } => {
            let split = PaymentService::split_total(total);
            println!("{}", serde_json::to_string_pretty(&split)?);
        }
    }

    Ok(())
}
