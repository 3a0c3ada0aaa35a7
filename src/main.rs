// Stake Ledger Node - Point d'entrée
// Principe: Le ledger est déterministe, le driver seul fait avancer les epochs

#![allow(dead_code)]

mod cli;
mod consensus;
mod contracts;
mod genesis;
mod node;
mod storage;
mod types;

#[cfg(test)]
mod tests;

use clap::Parser;
use cli::config::NodeConfig;
use cli::runner::run_node;
use cli::{db_path, get_base_path, Commands, InfoCmd, KeySubcommand, RewardsCmd};
use genesis::GenesisConfig;
use storage::LedgerStore;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use types::AccountId;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    let log_filter = if cli.verbose {
        "debug"
    } else {
        &cli.log_level
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(log_filter)),
        )
        .init();

    print_banner();

    match cli.command {
        Commands::Init(cmd) => {
            let genesis = match cmd.genesis {
                Some(ref path) => {
                    info!("Loading genesis from {}", path.display());
                    GenesisConfig::from_file(path)?
                }
                None => {
                    info!("No genesis file given, using devnet");
                    GenesisConfig::devnet()
                }
            };

            let base_path = get_base_path(cmd.base_path.as_ref());
            std::fs::create_dir_all(&base_path)?;

            let ledger = genesis.build_ledger()?;
            let store = LedgerStore::open(db_path(&base_path))?;
            store.initialize(&ledger)?;
            info!("Ledger initialized at {}", base_path.display());
        }

        Commands::Run(cmd) => {
            let config = NodeConfig::from_run_cmd(&cmd).map_err(|e| {
                error!("Configuration error: {}", e);
                anyhow::anyhow!("Configuration error: {}", e)
            })?;

            if let Err(e) = run_node(config).await {
                error!("Runner error: {}", e);
                return Err(anyhow::anyhow!("Runner error: {}", e));
            }
        }

        Commands::Info(cmd) => show_info(&cmd)?,

        Commands::Rewards(cmd) => show_rewards(&cmd)?,

        Commands::Key(cmd) => match cmd.subcommand {
            KeySubcommand::Generate { output, format } => {
                generate_key(output.as_ref(), &format)?;
            }
        },

        Commands::Purge(cmd) => {
            let path = get_base_path(cmd.base_path.as_ref());

            if !cmd.yes {
                println!("This will delete all ledger data at: {}", path.display());
                println!("Are you sure? [y/N]");

                let mut input = String::new();
                std::io::stdin().read_line(&mut input)?;

                if !input.trim().eq_ignore_ascii_case("y") {
                    println!("Aborted.");
                    return Ok(());
                }
            }

            if path.exists() {
                std::fs::remove_dir_all(&path)?;
                info!("Purged ledger data at: {}", path.display());
            } else {
                info!("No data to purge at: {}", path.display());
            }
        }
    }

    Ok(())
}

fn print_banner() {
    println!();
    println!("    ┌──────────────────────────────────────────┐");
    println!("    │   Stake Ledger - staking & epoch rewards  │");
    println!("    └──────────────────────────────────────────┘");
    println!("    Version: {}", env!("CARGO_PKG_VERSION"));
    println!();
}

fn show_info(cmd: &InfoCmd) -> anyhow::Result<()> {
    let store = LedgerStore::open(db_path(&get_base_path(cmd.base_path.as_ref())))?;
    let ledger = store.load()?;
    let sealed = ledger.current_sealed_epoch();
    let end_time = ledger.epoch_snapshot(sealed).map(|s| s.end_time).unwrap_or(0);

    let validators: Vec<_> = ledger
        .validators()
        .map(|v| {
            serde_json::json!({
                "id": v.id,
                "auth": v.auth.to_hex(),
                "status": v.status,
                "receivedStake": v.received_stake.to_string(),
                "selfStake": ledger.self_stake(v.id).to_string(),
            })
        })
        .collect();

    match cmd.format.as_str() {
        "json" => {
            let json = serde_json::json!({
                "sealedEpoch": sealed,
                "sealedAt": end_time,
                "totalStake": ledger.total_stake().to_string(),
                "totalActiveStake": ledger.total_active_stake().to_string(),
                "totalSupply": ledger.total_supply().to_string(),
                "minGasPrice": ledger.min_gas_price().to_string(),
                "validators": validators,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        "text" => {
            let sealed_at = chrono::DateTime::from_timestamp(end_time as i64, 0)
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| end_time.to_string());
            println!("Sealed epoch:       {} (at {})", sealed, sealed_at);
            println!("Total stake:        {}", ledger.total_stake());
            println!("Total active stake: {}", ledger.total_active_stake());
            println!("Total supply:       {}", ledger.total_supply());
            println!("Min gas price:      {}", ledger.min_gas_price());
            println!("Validators:");
            for v in ledger.validators() {
                println!(
                    "  #{} {} status={} received={} self={}",
                    v.id,
                    v.auth,
                    v.status,
                    v.received_stake,
                    ledger.self_stake(v.id)
                );
            }
        }
        other => return Err(anyhow::anyhow!("Unknown format: {}", other)),
    }
    Ok(())
}

fn show_rewards(cmd: &RewardsCmd) -> anyhow::Result<()> {
    let delegator: AccountId = cmd.delegator.parse()?;
    let store = LedgerStore::open(db_path(&get_base_path(cmd.base_path.as_ref())))?;
    let ledger = store.load()?;
    let now = ledger
        .epoch_snapshot(ledger.current_sealed_epoch())
        .map(|s| s.end_time)
        .unwrap_or(0);

    let lockup = ledger.lockup_info(&delegator, cmd.validator);
    println!("Delegator:       {}", delegator.to_hex());
    println!("Validator:       {}", cmd.validator);
    println!("Stake:           {}", ledger.stake_of(&delegator, cmd.validator));
    println!("Locked stake:    {}", ledger.locked_stake(&delegator, cmd.validator, now));
    println!("Lockup end:      {}", lockup.end_time);
    println!("Pending rewards: {}", ledger.pending_rewards(&delegator, cmd.validator));
    println!("Stashed until:   epoch {}", ledger.stashed_rewards_until(&delegator, cmd.validator));
    Ok(())
}

/// Génère un compte ed25519
fn generate_key(output: Option<&std::path::PathBuf>, format: &str) -> anyhow::Result<()> {
    use ed25519_dalek::{SigningKey, VerifyingKey};
    use rand::rngs::OsRng;

    let signing_key = SigningKey::generate(&mut OsRng);
    let verifying_key: VerifyingKey = (&signing_key).into();
    let account = AccountId::from_public_key(&verifying_key);
    let secret_hex = hex::encode(signing_key.to_bytes());

    match format {
        "json" => {
            let json = serde_json::json!({
                "scheme": "ed25519",
                "secretKey": format!("0x{}", secret_hex),
                "accountId": account.to_hex(),
            });
            let output_str = serde_json::to_string_pretty(&json)?;

            if let Some(path) = output {
                std::fs::write(path, &output_str)?;
                info!("Key saved to: {}", path.display());
            } else {
                println!("{}", output_str);
            }
        }
        "hex" => {
            println!("Secret Key: 0x{}", secret_hex);
            println!("Account ID: {}", account.to_hex());
        }
        _ => return Err(anyhow::anyhow!("Unknown format: {}", format)),
    }
    Ok(())
}
