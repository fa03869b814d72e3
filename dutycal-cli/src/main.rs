mod app;
mod commands;
mod render;
mod utils;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::app::App;

#[derive(Parser)]
#[command(name = "dutycal")]
#[command(about = "Share a daily duty fairly between two parents and keep it on your calendar")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decide and store assignments for a date range
    Generate {
        /// First day (YYYY-MM-DD), defaults to today
        #[arg(long)]
        from: Option<String>,

        /// Last day (YYYY-MM-DD), defaults to four weeks after --from
        #[arg(long)]
        to: Option<String>,
    },
    /// Print stored assignments
    Show {
        #[arg(long)]
        from: Option<String>,

        #[arg(long)]
        to: Option<String>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate, then publish the range to the calendar
    Sync {
        #[arg(long)]
        from: Option<String>,

        #[arg(long)]
        to: Option<String>,

        /// Reconcile against an in-memory calendar instead of the remote
        #[arg(long)]
        dry_run: bool,
    },
    /// Apply calendar edits announced by a change notification
    Notify {
        /// Value of the X-Goog-Channel-ID header
        #[arg(long)]
        channel_id: String,

        /// Value of the X-Goog-Resource-ID header
        #[arg(long)]
        resource_id: String,

        /// Value of the X-Goog-Resource-State header (sync, exists, not_exists)
        #[arg(long)]
        state: String,
    },
    /// Manage change notifications from the calendar
    Watch {
        #[command(subcommand)]
        action: WatchAction,
    },
}

#[derive(Subcommand)]
enum WatchAction {
    /// Register for change notifications on the configured calendar
    Start,
    /// Stop a subscription (all of them if no id is given)
    Stop { subscription_id: Option<String> },
    /// List active subscriptions
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("dutycal=info,dutycal_core=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let app = App::load()?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, stopping after in-flight calendar calls");
                cancel.cancel();
            }
        }
    });

    match cli.command {
        Commands::Generate { from, to } => {
            commands::generate::run(&app, from.as_deref(), to.as_deref(), &cancel).await
        }
        Commands::Show { from, to, json } => {
            commands::show::run(&app, from.as_deref(), to.as_deref(), json).await
        }
        Commands::Sync { from, to, dry_run } => {
            commands::sync::run(&app, from.as_deref(), to.as_deref(), dry_run, &cancel).await
        }
        Commands::Notify {
            channel_id,
            resource_id,
            state,
        } => commands::notify::run(&app, channel_id, resource_id, &state, &cancel).await,
        Commands::Watch { action } => match action {
            WatchAction::Start => commands::watch::start(&app, &cancel).await,
            WatchAction::Stop { subscription_id } => {
                commands::watch::stop(&app, subscription_id, &cancel).await
            }
            WatchAction::List => commands::watch::list(&app).await,
        },
    }
}
