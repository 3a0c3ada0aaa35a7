// Tests module
// Scénarios bout-en-bout: un ledger, un driver local et une horloge simulée
//
// rewards: accumulation, commission, restake
// lockup: pénalités de déverrouillage et relocks
// sealing: pénalités offline, frais, uptime
// withdrawals: maturité, validateurs slashés
// invariants: propriétés (proptest)

pub mod rewards;
pub mod sealing;
pub mod invariants;

use crate::consensus::params::StakingParams;
use crate::contracts::StakingLedger;
use crate::node::{EpochDriver, LocalDriver, SealReport};
use crate::types::{AccountId, Balance, BlockNumber, Timestamp, ValidatorId, TOKEN};

/// Heure du premier scellement des scénarios
pub const START_TIME: Timestamp = 1_700_000_000;

/// Supply initiale des scénarios
pub const GENESIS_SUPPLY: Balance = 1_000_000 * TOKEN;

pub fn account(seed: u8) -> AccountId {
    AccountId::from_bytes([seed; 32])
}

/// Ledger piloté par un driver local
pub struct TestChain {
    pub ledger: StakingLedger,
    pub driver: LocalDriver,
    pub now: Timestamp,
    pub block: BlockNumber,
}

impl TestChain {
    pub fn new(params: StakingParams) -> Self {
        let driver = LocalDriver::new(account(0xdd));
        // epoch 0 scellée au temps 0
        let mut ledger = StakingLedger::new(params, account(0xaa), driver.account(), 0);
        ledger
            .set_total_supply(&driver.account(), GENESIS_SUPPLY)
            .unwrap();
        Self {
            ledger,
            driver,
            now: START_TIME,
            block: 0,
        }
    }

    pub fn owner(&self) -> AccountId {
        account(0xaa)
    }

    pub fn create_validator(&mut self, seed: u8, self_stake: Balance) -> ValidatorId {
        self.ledger
            .create_validator(account(seed), vec![seed; 33], self_stake, self.now)
            .unwrap()
    }

    pub fn delegate(&mut self, seed: u8, validator: ValidatorId, amount: Balance) {
        self.ledger
            .delegate(account(seed), validator, amount, self.now)
            .unwrap();
    }

    pub fn lock(&mut self, seed: u8, validator: ValidatorId, duration: Timestamp, amount: Balance) {
        self.ledger
            .lock_stake(account(seed), validator, duration, amount, self.now)
            .unwrap();
    }

    pub fn pending(&self, seed: u8, validator: ValidatorId) -> Balance {
        self.ledger.pending_rewards(&account(seed), validator)
    }

    /// Avance l'horloge de `duration` puis scelle, uptime complet par défaut
    pub fn node_seal(&mut self, duration: Timestamp) -> SealReport {
        self.now += duration;
        self.block += 1;
        self.driver
            .seal(&mut self.ledger, duration, self.now, self.block)
            .unwrap()
    }
}
