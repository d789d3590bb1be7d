//! Shared ban-list enforcement daemon
//!
//! Runs the reconciliation runtime against the registry database and the
//! platform REST API, and exposes the admin commands for operators.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use banlist_core::{ChannelId, GuildId};

mod config;
mod handlers;

use config::FileConfig;
use handlers::AdminAction;

#[derive(Parser)]
#[command(name = "banlist")]
#[command(about = "Shared ban-list enforcement across guilds", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path
    #[arg(short, long, global = true, default_value = "banlist.toml")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the enforcement daemon
    Run,

    /// Run one fleet pass and exit
    Fleet,

    /// Set the channel enforcement notices are posted to
    SetChannel {
        /// Guild id
        #[arg(short, long)]
        guild: GuildId,

        /// Channel id
        #[arg(long)]
        channel: ChannelId,
    },

    /// Enable automatic banning for a guild
    Enable {
        /// Guild id
        #[arg(short, long)]
        guild: GuildId,
    },

    /// Disable automatic banning for a guild
    Disable {
        /// Guild id
        #[arg(short, long)]
        guild: GuildId,
    },

    /// Show a guild's configuration
    Status {
        /// Guild id
        #[arg(short, long)]
        guild: GuildId,
    },

    /// Reconcile one guild immediately
    SyncNow {
        /// Guild id
        #[arg(short, long)]
        guild: GuildId,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = FileConfig::load(&cli.config)?.resolve_from_env()?;

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log_level))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Run => handlers::run_daemon(settings).await?,
        Commands::Fleet => handlers::run_fleet_once(settings).await?,
        Commands::SetChannel { guild, channel } => {
            handlers::run_admin(settings, guild, AdminAction::SetChannel(channel)).await?;
        }
        Commands::Enable { guild } => {
            handlers::run_admin(settings, guild, AdminAction::SetEnabled(true)).await?;
        }
        Commands::Disable { guild } => {
            handlers::run_admin(settings, guild, AdminAction::SetEnabled(false)).await?;
        }
        Commands::Status { guild } => {
            handlers::run_admin(settings, guild, AdminAction::Status).await?;
        }
        Commands::SyncNow { guild } => {
            handlers::run_admin(settings, guild, AdminAction::SyncNow).await?;
        }
    }

    Ok(())
}
