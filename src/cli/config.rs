// CLI Configuration - Arguments CLI vers configuration du runner
use crate::cli::{get_base_path, RunCmd};
use crate::types::Timestamp;
use std::path::PathBuf;

/// Configuration du runner dérivée des arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    /// Répertoire de données
    pub base_path: PathBuf,

    /// Secondes réelles entre deux scellements
    pub epoch_interval_secs: u64,

    /// Horloge des epochs
    pub clock: EpochClock,

    /// Gas reporté par epoch
    pub gas_per_epoch: u128,
}

/// Source du temps de scellement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpochClock {
    /// Heure système
    WallClock,
    /// Chaque epoch dure exactement n secondes après la précédente
    Simulated(Timestamp),
}

impl NodeConfig {
    pub fn from_run_cmd(cmd: &RunCmd) -> Result<Self, ConfigError> {
        if cmd.epoch_interval == 0 {
            return Err(ConfigError::InvalidEpochInterval(cmd.epoch_interval));
        }

        let clock = match cmd.epoch_duration {
            0 => EpochClock::WallClock,
            secs => EpochClock::Simulated(secs),
        };

        Ok(Self {
            base_path: get_base_path(cmd.base_path.as_ref()),
            epoch_interval_secs: cmd.epoch_interval,
            clock,
            gas_per_epoch: cmd.gas_per_epoch,
        })
    }

    /// Fin de l'epoch à sceller après `last_end`
    pub fn next_seal_time(&self, last_end: Timestamp) -> Timestamp {
        match self.clock {
            EpochClock::Simulated(secs) => last_end.saturating_add(secs),
            EpochClock::WallClock => {
                let now = chrono::Utc::now().timestamp().max(0) as Timestamp;
                now.max(last_end)
            }
        }
    }
}

/// Erreurs de configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Intervalle d'epoch invalide: {0}")]
    InvalidEpochInterval(u64),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_cmd(epoch_interval: u64, epoch_duration: u64) -> RunCmd {
        RunCmd {
            base_path: Some(PathBuf::from("/tmp/stake-ledger-test")),
            epoch_interval,
            epoch_duration,
            gas_per_epoch: 1_000,
        }
    }

    #[test]
    fn test_simulated_clock() {
        let config = NodeConfig::from_run_cmd(&run_cmd(5, 3600)).unwrap();
        assert_eq!(config.clock, EpochClock::Simulated(3600));
        assert_eq!(config.gas_per_epoch, 1_000);
        assert_eq!(config.next_seal_time(1_000), 4_600);
    }

    #[test]
    fn test_wall_clock_never_goes_back() {
        let config = NodeConfig::from_run_cmd(&run_cmd(5, 0)).unwrap();
        assert_eq!(config.clock, EpochClock::WallClock);
        assert_eq!(config.next_seal_time(u64::MAX), u64::MAX);
        assert!(config.next_seal_time(0) > 1_700_000_000);
    }

    #[test]
    fn test_zero_interval_rejected() {
        assert!(matches!(
            NodeConfig::from_run_cmd(&run_cmd(0, 3600)),
            Err(ConfigError::InvalidEpochInterval(0))
        ));
    }
}
