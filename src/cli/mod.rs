// CLI - Interface en ligne de commande du ledger
// Principe: Commandes simples, un ledger local par répertoire de données

pub mod config;
pub mod runner;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Stake Ledger Node - Staking de validateurs et récompenses par epoch
#[derive(Parser, Debug)]
#[command(name = "stake-ledger-node")]
#[command(author = "Stake Ledger Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Validator staking ledger with lockups and epoch-based rewards")]
#[command(long_about = r#"
Stake Ledger keeps validator stakes, delegations, lockups and rewards,
sealed epoch after epoch by a trusted driver.

Create a local devnet ledger:
  stake-ledger-node init

Create a ledger from a genesis file:
  stake-ledger-node init --genesis genesis.json

Seal an epoch every 10 seconds, each simulating one hour:
  stake-ledger-node run --epoch-interval 10 --epoch-duration 3600
"#)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true, default_value = "false")]
    pub verbose: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info", env = "STAKE_LEDGER_LOG")]
    pub log_level: String,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the ledger from a genesis and persist it
    Init(InitCmd),

    /// Seal epochs periodically through the local driver
    Run(RunCmd),

    /// Show ledger information
    Info(InfoCmd),

    /// Show pending rewards of a delegation
    Rewards(RewardsCmd),

    /// Key management
    Key(KeyCmd),

    /// Purge ledger data
    Purge(PurgeCmd),
}

/// Initialize the ledger
#[derive(Parser, Debug)]
pub struct InitCmd {
    /// Genesis file (JSON); devnet genesis if not specified
    #[arg(long)]
    pub genesis: Option<PathBuf>,

    /// Base path for ledger data
    #[arg(short = 'd', long, env = "STAKE_LEDGER_BASE_PATH")]
    pub base_path: Option<PathBuf>,
}

/// Run the sealing loop
#[derive(Parser, Debug)]
pub struct RunCmd {
    /// Base path for ledger data
    #[arg(short = 'd', long, env = "STAKE_LEDGER_BASE_PATH")]
    pub base_path: Option<PathBuf>,

    /// Wall-clock seconds between two seals
    #[arg(long, default_value = "10")]
    pub epoch_interval: u64,

    /// Simulated epoch duration in seconds (0 = wall clock)
    #[arg(long, default_value = "3600")]
    pub epoch_duration: u64,

    /// Gas reported as consumed during each epoch
    #[arg(long, default_value = "0")]
    pub gas_per_epoch: u128,
}

/// Show ledger info
#[derive(Parser, Debug)]
pub struct InfoCmd {
    /// Base path for ledger data
    #[arg(short = 'd', long, env = "STAKE_LEDGER_BASE_PATH")]
    pub base_path: Option<PathBuf>,

    /// Output format (text, json)
    #[arg(long, default_value = "text")]
    pub format: String,
}

/// Show a delegation's rewards
#[derive(Parser, Debug)]
pub struct RewardsCmd {
    /// Base path for ledger data
    #[arg(short = 'd', long, env = "STAKE_LEDGER_BASE_PATH")]
    pub base_path: Option<PathBuf>,

    /// Delegator account (hex)
    #[arg(long)]
    pub delegator: String,

    /// Validator id
    #[arg(long)]
    pub validator: u64,
}

/// Key management commands
#[derive(Parser, Debug)]
pub struct KeyCmd {
    #[command(subcommand)]
    pub subcommand: KeySubcommand,
}

#[derive(Subcommand, Debug)]
pub enum KeySubcommand {
    /// Generate a new ed25519 account
    Generate {
        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format (hex, json)
        #[arg(long, default_value = "json")]
        format: String,
    },
}

/// Purge ledger data
#[derive(Parser, Debug)]
pub struct PurgeCmd {
    /// Base path for ledger data
    #[arg(short = 'd', long, env = "STAKE_LEDGER_BASE_PATH")]
    pub base_path: Option<PathBuf>,

    /// Skip confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,
}

/// Répertoire de données, par défaut sous le data dir de la plateforme
pub fn get_base_path(base_path: Option<&PathBuf>) -> PathBuf {
    match base_path {
        Some(path) => path.clone(),
        None => dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("stake-ledger"),
    }
}

/// Chemin de la base RocksDB sous le répertoire de données
pub fn db_path(base_path: &std::path::Path) -> PathBuf {
    base_path.join("db")
}
