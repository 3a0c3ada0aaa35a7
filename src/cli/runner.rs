// Runner - Boucle de scellement du driver local
// Principe: Un scellement par intervalle, sauvegarde après chaque epoch, arrêt propre

use crate::cli::config::NodeConfig;
use crate::cli::db_path;
use crate::contracts::{StakingError, StakingLedger};
use crate::node::{EpochDriver, LocalDriver, SealReport};
use crate::storage::{LedgerStore, StoreError};
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};

/// Lance la boucle de scellement jusqu'à Ctrl+C
pub async fn run_node(config: NodeConfig) -> Result<(), RunnerError> {
    info!("🚀 Starting stake ledger driver");
    info!("📁 Data path: {}", config.base_path.display());

    std::fs::create_dir_all(&config.base_path)
        .map_err(|e| RunnerError::Io(format!("Failed to create data dir: {}", e)))?;

    let store = LedgerStore::open(db_path(&config.base_path))?;
    let mut ledger = store.load()?;

    let mut driver = LocalDriver::new(ledger.driver());
    driver.sync_from_ledger(&ledger);
    driver.set_epoch_gas(config.gas_per_epoch);

    info!(
        "⛓️  Resuming at sealed epoch {} ({} validators, total stake {})",
        ledger.current_sealed_epoch(),
        ledger.last_validator_id(),
        ledger.total_stake()
    );
    info!("⏱️  Sealing every {}s", config.epoch_interval_secs);

    let mut seal_interval = tokio::time::interval(Duration::from_secs(config.epoch_interval_secs));
    // le premier tick est immédiat
    seal_interval.tick().await;

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("⚠️  Ctrl+C received, shutting down...");
                break;
            }

            _ = seal_interval.tick() => {
                if let Err(e) = seal_once(&mut ledger, &mut driver, &store, &config) {
                    error!("Seal failed: {}", e);
                    return Err(e);
                }
            }
        }
    }

    store.save(&ledger)?;
    Ok(())
}

/// Scelle une epoch puis persiste le ledger
pub fn seal_once(
    ledger: &mut StakingLedger,
    driver: &mut LocalDriver,
    store: &LedgerStore,
    config: &NodeConfig,
) -> Result<SealReport, RunnerError> {
    let sealed = ledger.current_sealed_epoch();
    let (last_end, last_block) = ledger
        .epoch_snapshot(sealed)
        .map(|s| (s.end_time, s.end_block))
        .unwrap_or((0, 0));

    let now = config.next_seal_time(last_end);
    let epoch_duration = now.saturating_sub(last_end).max(1);

    let report = driver.seal(ledger, epoch_duration, now, last_block + 1)?;
    store.save(ledger)?;

    info!(
        "📦 Epoch {} persisted: total stake {}, supply {}, min gas price {}",
        report.epoch,
        ledger.total_stake(),
        ledger.total_supply(),
        report.min_gas_price
    );
    Ok(report)
}

/// Erreurs du runner
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] StakingError),
}
