// Driver - Appelant de confiance qui scelle les epochs
//
// Le ledger ne mesure rien: uptime, blocs manqués, frais et gas viennent du
// driver. Le driver suit les poids des validateurs via les événements du ledger.

use crate::consensus::sealing::EpochMetrics;
use crate::contracts::{LedgerEvent, StakingError, StakingLedger};
use crate::types::{AccountId, Balance, BlockNumber, EpochNumber, Timestamp, ValidatorId};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// Résultat d'un scellement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealReport {
    pub epoch: EpochNumber,
    pub next_validators: Vec<ValidatorId>,
    pub min_gas_price: Balance,

    /// Événements vidés du ledger pendant le scellement
    pub events: Vec<LedgerEvent>,
}

/// Seul appelant autorisé des points d'entrée de scellement
pub trait EpochDriver {
    /// Compte configuré comme driver dans le ledger
    fn account(&self) -> AccountId;

    /// Métriques de l'epoch ouverte, dans l'ordre de son set de validateurs
    fn collect_metrics(&self, ledger: &StakingLedger, epoch_duration: Timestamp) -> EpochMetrics;

    /// Prend en compte les événements du ledger
    fn observe(&mut self, events: &[LedgerEvent]);

    /// Set actif de l'epoch suivante
    fn next_validators(&self) -> Vec<ValidatorId>;

    /// Scelle l'epoch ouverte puis fait tourner le set actif
    fn seal(
        &mut self,
        ledger: &mut StakingLedger,
        epoch_duration: Timestamp,
        now: Timestamp,
        block: BlockNumber,
    ) -> Result<SealReport, StakingError> {
        let mut events = ledger.drain_events();
        self.observe(&events);

        let metrics = self.collect_metrics(ledger, epoch_duration);
        let epoch = ledger.seal_epoch(&self.account(), &metrics, now, block)?;

        let sealed_events = ledger.drain_events();
        self.observe(&sealed_events);
        events.extend(sealed_events);

        let next_validators = self.next_validators();
        ledger.seal_epoch_validators(&self.account(), &next_validators)?;
        events.extend(ledger.drain_events());

        let report = SealReport {
            epoch,
            next_validators,
            min_gas_price: ledger.min_gas_price(),
            events,
        };
        self.after_seal(&report);
        Ok(report)
    }

    /// Appelé après un scellement réussi
    fn after_seal(&mut self, _report: &SealReport) {}
}

/// Driver mono-processus pour devnet et tests
///
/// Uptime complet par défaut, surcharges possibles par validateur.
#[derive(Debug, Clone)]
pub struct LocalDriver {
    account: AccountId,

    /// Dernier poids publié par validateur
    weights: BTreeMap<ValidatorId, Balance>,

    uptime_overrides: HashMap<ValidatorId, Timestamp>,
    offline: HashMap<ValidatorId, (Timestamp, u64)>,

    /// Frais cumulés par validateur
    fees: HashMap<ValidatorId, Balance>,

    /// Gas consommé par epoch
    epoch_gas: u128,
}

impl LocalDriver {
    pub fn new(account: AccountId) -> Self {
        Self {
            account,
            weights: BTreeMap::new(),
            uptime_overrides: HashMap::new(),
            offline: HashMap::new(),
            fees: HashMap::new(),
            epoch_gas: 0,
        }
    }

    /// Reconstruit les poids depuis l'état du ledger (après chargement)
    pub fn sync_from_ledger(&mut self, ledger: &StakingLedger) {
        self.weights = ledger
            .validators()
            .map(|v| (v.id, v.weight()))
            .collect();
        debug!("Driver synced {} validator weights", self.weights.len());
    }

    pub fn weight(&self, validator: ValidatorId) -> Balance {
        self.weights.get(&validator).copied().unwrap_or(0)
    }

    pub fn set_uptime(&mut self, validator: ValidatorId, uptime: Timestamp) {
        self.uptime_overrides.insert(validator, uptime);
    }

    pub fn clear_uptime(&mut self, validator: ValidatorId) {
        self.uptime_overrides.remove(&validator);
    }

    pub fn set_offline(&mut self, validator: ValidatorId, time: Timestamp, blocks: u64) {
        self.offline.insert(validator, (time, blocks));
    }

    /// Ajoute des frais émis par les transactions du validateur
    pub fn add_fee(&mut self, validator: ValidatorId, amount: Balance) {
        let entry = self.fees.entry(validator).or_insert(0);
        *entry = entry.saturating_add(amount);
    }

    pub fn set_epoch_gas(&mut self, gas: u128) {
        self.epoch_gas = gas;
    }
}

impl EpochDriver for LocalDriver {
    fn account(&self) -> AccountId {
        self.account
    }

    fn collect_metrics(&self, ledger: &StakingLedger, epoch_duration: Timestamp) -> EpochMetrics {
        let ids = ledger
            .epoch_snapshot(ledger.current_epoch())
            .map(|s| s.validator_ids.clone())
            .unwrap_or_default();

        let mut metrics = EpochMetrics {
            epoch_gas: self.epoch_gas,
            ..EpochMetrics::default()
        };
        for id in &ids {
            let (offline_time, offline_blocks) = self.offline.get(id).copied().unwrap_or((0, 0));
            metrics.offline_time.push(offline_time);
            metrics.offline_blocks.push(offline_blocks);
            metrics
                .uptime
                .push(self.uptime_overrides.get(id).copied().unwrap_or(epoch_duration));
            metrics
                .originated_txs_fee
                .push(self.fees.get(id).copied().unwrap_or(0));
        }
        metrics
    }

    fn observe(&mut self, events: &[LedgerEvent]) {
        for event in events {
            if let LedgerEvent::WeightUpdated { validator, weight } = event {
                self.weights.insert(*validator, *weight);
            }
        }
    }

    fn next_validators(&self) -> Vec<ValidatorId> {
        self.weights
            .iter()
            .filter(|(_, weight)| **weight > 0)
            .map(|(id, _)| *id)
            .collect()
    }

    fn after_seal(&mut self, report: &SealReport) {
        // les pénalités offline ne valent que pour une epoch
        self.offline.clear();
        info!(
            "Driver sealed epoch {} ({} validators next)",
            report.epoch,
            report.next_validators.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::params::StakingParams;
    use crate::types::TOKEN;

    fn setup() -> (StakingLedger, LocalDriver) {
        let driver = LocalDriver::new(AccountId::from_bytes([0xdd; 32]));
        let ledger = StakingLedger::new(
            StakingParams::new(),
            AccountId::from_bytes([0xaa; 32]),
            driver.account(),
            0,
        );
        (ledger, driver)
    }

    #[test]
    fn test_weights_follow_events() {
        let (mut ledger, mut driver) = setup();
        let a = ledger
            .create_validator(AccountId::from_bytes([1; 32]), vec![1; 33], TOKEN, 10)
            .unwrap();
        let b = ledger
            .create_validator(AccountId::from_bytes([2; 32]), vec![2; 33], 2 * TOKEN, 10)
            .unwrap();

        let report = driver.seal(&mut ledger, 0, 10, 1).unwrap();
        assert_eq!(report.epoch, 1);
        assert_eq!(report.next_validators, vec![a, b]);
        assert_eq!(driver.weight(b), 2 * TOKEN);
        assert_eq!(ledger.epoch_snapshot(2).unwrap().total_stake, 3 * TOKEN);

        ledger
            .deactivate_validator(&driver.account(), a, crate::consensus::validator::status::OFFLINE, 20)
            .unwrap();
        let report = driver.seal(&mut ledger, 10, 20, 2).unwrap();
        assert_eq!(report.next_validators, vec![b]);
    }

    #[test]
    fn test_metrics_follow_open_set() {
        let (mut ledger, mut driver) = setup();
        let a = ledger
            .create_validator(AccountId::from_bytes([1; 32]), vec![1; 33], TOKEN, 10)
            .unwrap();
        driver.seal(&mut ledger, 0, 10, 1).unwrap();

        driver.set_uptime(a, 5);
        driver.add_fee(a, 100);
        driver.add_fee(a, 50);
        driver.set_offline(a, 3, 4);

        let metrics = driver.collect_metrics(&ledger, 60);
        assert_eq!(metrics.uptime, vec![5]);
        assert_eq!(metrics.originated_txs_fee, vec![150]);
        assert_eq!(metrics.offline_time, vec![3]);
        assert_eq!(metrics.offline_blocks, vec![4]);

        driver.clear_uptime(a);
        assert_eq!(driver.collect_metrics(&ledger, 60).uptime, vec![60]);
    }

    #[test]
    fn test_sync_from_ledger() {
        let (mut ledger, _) = setup();
        let a = ledger
            .create_validator(AccountId::from_bytes([1; 32]), vec![1; 33], TOKEN, 10)
            .unwrap();

        let mut fresh = LocalDriver::new(AccountId::from_bytes([0xdd; 32]));
        fresh.sync_from_ledger(&ledger);
        assert_eq!(fresh.next_validators(), vec![a]);
    }

    #[test]
    fn test_wrong_driver_account_rejected() {
        let (mut ledger, _) = setup();
        let mut impostor = LocalDriver::new(AccountId::from_bytes([0xee; 32]));
        assert_eq!(
            impostor.seal(&mut ledger, 0, 10, 1),
            Err(StakingError::NotDriver)
        );
    }
}
