//! Cashpoint CLI - token cashouts and venue reconciliation
//!
//! Usage:
//! ```bash
//! cashpoint init
//! cashpoint config create --tokens-per-dollar 1000 --min 5 --max 500 \
//!     --customer-daily 1000 --staff-daily 5000 --commission 0
//! cashpoint customer add CUST_001 "Alice"
//! cashpoint customer credit CUST_001 20000
//! cashpoint cashout CUST_001 6000 --store STORE_01 --staff STAFF_01
//! cashpoint venue add STORE_01 "Main Street" 5
//! cashpoint reconcile submit STORE_01 2026-10-15 10000 --by OP_01
//! cashpoint reconcile record-fee REC_... 560 --by OP_02
//! cashpoint compliance system --from 2026-10-01 --to 2026-10-31
//! ```

use anyhow::Result;
use cashpoint_business::{ServiceContext, SettlementError};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod db;

use commands::{cashout, compliance, config, customer, reconcile};

/// Cashpoint - token-to-cash settlement and venue reconciliation
#[derive(Parser)]
#[command(name = "cashpoint")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Database file path
    #[arg(long, default_value = "data/cashpoint.db", global = true)]
    pub db: PathBuf,

    /// Audit journal directory
    #[arg(long, default_value = "data/journal", global = true)]
    pub journal_dir: PathBuf,

    /// Engine config JSON (thresholds, reference timezone, fallback rates)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize database schema
    Init {
        /// Remove the existing database first
        #[arg(long)]
        force: bool,
    },

    /// Show database status
    Status,

    /// Exchange rate and cashout limits
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Customer token accounts
    Customer {
        #[command(subcommand)]
        action: CustomerAction,
    },

    /// Venue master data
    Venue {
        #[command(subcommand)]
        action: VenueAction,
    },

    /// Cash out customer tokens
    Cashout {
        /// Customer ID
        customer_id: String,
        /// Tokens to convert
        tokens: i64,
        /// Venue where the cash is paid
        #[arg(long)]
        store: String,
        /// Staff member paying out
        #[arg(long)]
        staff: String,
        #[arg(long)]
        notes: Option<String>,
        /// Idempotency key; reuse it when retrying
        #[arg(long)]
        reference: Option<String>,
    },

    /// Reverse a completed cashout
    Reverse {
        /// Transaction ID
        transaction_id: String,
        #[arg(long)]
        by: String,
        #[arg(long)]
        reason: String,
    },

    /// Venue daily reconciliation
    Reconcile {
        #[command(subcommand)]
        action: ReconcileAction,
    },

    /// Compliance summaries
    Compliance {
        #[command(subcommand)]
        action: ComplianceAction,
    },

    /// Read the audit journal
    Journal {
        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,
        /// End date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        to: Option<NaiveDate>,
        /// Customer or store ID
        #[arg(long)]
        subject: Option<String>,
        /// Staff/operator ID
        #[arg(long)]
        actor: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Activate a new rate config (deactivates the current one)
    Create {
        #[arg(long)]
        tokens_per_dollar: Decimal,
        /// Minimum cashout in dollars
        #[arg(long)]
        min: Decimal,
        /// Maximum cashout per transaction in dollars
        #[arg(long)]
        max: Decimal,
        #[arg(long)]
        customer_daily: Decimal,
        #[arg(long)]
        staff_daily: Decimal,
        /// Venue commission percent (0-100)
        #[arg(long, default_value = "0")]
        commission: Decimal,
        /// RFC 3339 start time, defaults to now
        #[arg(long)]
        effective_from: Option<chrono::DateTime<chrono::Utc>>,
        #[arg(long, default_value = "ADMIN")]
        by: String,
    },
    /// Show the config in effect now
    Show,
    /// List every config, newest first
    History,
}

#[derive(Subcommand)]
pub enum CustomerAction {
    /// Open a token account
    Add { customer_id: String, name: String },
    /// Credit reward tokens
    Credit { customer_id: String, tokens: i64 },
    /// Show balance and today's totals
    Show {
        customer_id: String,
        /// Staff ID for the staff daily total
        #[arg(long, default_value = "-")]
        staff: String,
    },
    /// List recent settlement transactions
    History {
        customer_id: String,
        #[arg(long, default_value = "20")]
        limit: i64,
    },
}

#[derive(Subcommand)]
pub enum VenueAction {
    /// Register or update a venue
    Add {
        store_id: String,
        name: String,
        /// Software fee percent of gaming revenue
        fee_percentage: Decimal,
    },
    /// List venues
    List,
}

#[derive(Subcommand)]
pub enum ReconcileAction {
    /// Submit a venue's daily gaming revenue
    Submit {
        store_id: String,
        date: NaiveDate,
        revenue: Decimal,
        #[arg(long)]
        by: String,
    },
    /// Record the software fee actually collected
    RecordFee {
        reconciliation_id: String,
        amount: Decimal,
        #[arg(long)]
        by: String,
    },
    Approve {
        reconciliation_id: String,
        #[arg(long)]
        by: String,
        #[arg(long)]
        notes: Option<String>,
    },
    Flag {
        reconciliation_id: String,
        #[arg(long)]
        by: String,
        #[arg(long)]
        reason: String,
    },
    Resolve {
        reconciliation_id: String,
        #[arg(long)]
        by: String,
        #[arg(long)]
        notes: String,
    },
    /// Record the fee payment as sent
    PaymentSent {
        reconciliation_id: String,
        amount: Decimal,
        #[arg(long)]
        method: String,
        /// RFC 3339 time the payment went out, defaults to now
        #[arg(long)]
        sent_at: Option<chrono::DateTime<chrono::Utc>>,
        #[arg(long)]
        by: String,
    },
    /// Confirm (part of) the fee payment as received
    Confirm {
        reconciliation_id: String,
        amount: Decimal,
        /// RFC 3339 time the payment arrived, defaults to now
        #[arg(long)]
        received_at: Option<chrono::DateTime<chrono::Utc>>,
        #[arg(long)]
        by: String,
    },
    Dispute {
        reconciliation_id: String,
        #[arg(long)]
        by: String,
        #[arg(long)]
        reason: String,
    },
    Show { reconciliation_id: String },
    /// Audit notes of one reconciliation
    Notes { reconciliation_id: String },
    /// List reconciliations in a date range
    List {
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
        #[arg(long)]
        store: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ComplianceAction {
    /// All venues
    System {
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// One venue
    Venue {
        store_id: String,
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if let Some(parent) = cli.db.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    std::fs::create_dir_all(&cli.journal_dir).ok();

    match cli.command {
        Commands::Init { force } => {
            db::init_database(&cli.db, &cli.journal_dir, force).await?;
            println!("✅ Database initialized at {:?}", cli.db);
        }

        Commands::Status => {
            db::show_status(&cli.db).await?;
        }

        Commands::Journal {
            from,
            to,
            subject,
            actor,
        } => {
            compliance::show_journal(&cli.journal_dir, from, to, subject, actor)?;
        }

        command => {
            let app = db::connect(&cli.db, &cli.journal_dir, cli.config.as_deref()).await?;
            let result = dispatch(&app, command).await;
            app.pool().close().await;
            if let Err(err) = result {
                report_error(&err);
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

async fn dispatch(app: &ServiceContext, command: Commands) -> Result<()> {
    match command {
        Commands::Config { action } => config::handle(app, action).await,
        Commands::Customer { action } => customer::handle(app, action).await,
        Commands::Venue { action } => reconcile::handle_venue(app, action).await,
        Commands::Cashout {
            customer_id,
            tokens,
            store,
            staff,
            notes,
            reference,
        } => cashout::process(app, &customer_id, tokens, &store, &staff, notes, reference).await,
        Commands::Reverse {
            transaction_id,
            by,
            reason,
        } => cashout::reverse(app, &transaction_id, &by, &reason).await,
        Commands::Reconcile { action } => reconcile::handle(app, action).await,
        Commands::Compliance { action } => compliance::handle(app, action).await,
        Commands::Init { .. } | Commands::Status | Commands::Journal { .. } => Ok(()),
    }
}

/// Print a failed request with its stable error code
fn report_error(err: &anyhow::Error) {
    eprintln!("{}", describe_error(err));
}

fn describe_error(err: &anyhow::Error) -> String {
    match err.downcast_ref::<SettlementError>() {
        Some(settlement) if settlement.is_retryable() => format!(
            "❌ [{}] {}\n   Transient failure, nothing was applied; safe to retry",
            settlement.kind(),
            settlement
        ),
        Some(settlement) => format!("❌ [{}] {}", settlement.kind(), settlement),
        None => format!("❌ {:#}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_error_shows_kind() {
        let err = anyhow::Error::from(SettlementError::InsufficientBalance {
            required: 6_000,
            available: 2_000,
        });
        let text = describe_error(&err);
        assert!(text.starts_with("❌ [insufficient_balance]"));
        assert!(!text.contains("retry"));

        let err = anyhow::Error::from(SettlementError::from(sqlx::Error::PoolTimedOut));
        let text = describe_error(&err);
        assert!(text.starts_with("❌ [persistence_failure]"));
        assert!(text.contains("safe to retry"));

        let err = anyhow::anyhow!("Failed to load engine config");
        assert_eq!(describe_error(&err), "❌ Failed to load engine config");
    }
}
