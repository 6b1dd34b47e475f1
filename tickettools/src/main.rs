//! Operator tools for the ticket payment server.
//!
//! The server only ever learns about recurring charges when the gateway happens to deliver a webhook,
//! so these commands exist to square the local records with the gateway out of band: a subscription
//! state sync, a contact backfill for sparsely-filled orders, and a lapsed-subscriber report.
use clap::{Parser, Subcommand};

mod contacts;
mod dates;
mod report;
mod sync;

#[derive(Parser)]
#[command(name = "tickettools", about = "Operator tools for the ticket payment server")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Refresh the local subscription mirror from the gateway's STATUS API
    SyncSubscriptions {
        /// Only sync the most recent N subscription orders
        #[arg(long, conflicts_with = "all")]
        limit: Option<i64>,
        /// Sync every subscription order ever created
        #[arg(long)]
        all: bool,
    },
    /// Fill in missing contact fields on orders from the subscription mirror
    BackfillContacts {
        /// Actually write the changes. Without this flag the command is a dry run.
        #[arg(long)]
        apply: bool,
    },
    /// List subscribers whose subscription has ended and who are past the grace period
    RemovalReport {
        /// Days of grace after the subscription ends before access removal
        #[arg(long, default_value_t = 7)]
        grace_days: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Command::SyncSubscriptions { limit, all } => {
            let limit = if all { None } else { Some(limit.unwrap_or(sync::DEFAULT_SYNC_LIMIT)) };
            sync::sync_subscriptions(limit).await
        },
        Command::BackfillContacts { apply } => contacts::backfill_contacts(apply).await,
        Command::RemovalReport { grace_days } => report::removal_report(grace_days).await,
    }
}
