// Sealing Tests - Scellement des epochs via le driver local
//
// Pénalités offline, uptime minimal, frais et trésorerie, prix du gas,
// fermeture de la fenêtre genesis.

use super::{account, TestChain, GENESIS_SUPPLY};
use crate::consensus::params::{ParamUpdate, StakingParams, INITIAL_MIN_GAS_PRICE};
use crate::consensus::validator::status;
use crate::contracts::{GenesisValidatorRecord, LedgerEvent, StakingError};
use crate::node::EpochDriver;
use crate::types::{percent, ValidatorId, DAY, GWEI, TOKEN};

fn two_validators() -> (TestChain, ValidatorId, ValidatorId) {
    let mut chain = TestChain::new(StakingParams::new());
    let a = chain.create_validator(1, 2 * TOKEN);
    let b = chain.create_validator(2, TOKEN);
    chain.node_seal(0);
    (chain, a, b)
}

#[cfg(test)]
mod offline_tests {
    use super::*;

    #[test]
    fn test_offline_validator_deactivated() {
        let (mut chain, a, b) = two_validators();
        chain.driver.set_offline(b, 3 * DAY, 1_001);

        let report = chain.node_seal(DAY);
        let v = chain.ledger.get_validator(b).unwrap();
        assert_eq!(v.status, status::OFFLINE);
        assert_eq!(v.deactivated_epoch, 2);
        assert_eq!(v.deactivated_time, chain.now);
        assert_eq!(report.next_validators, vec![a]);
        assert_eq!(chain.ledger.total_active_stake(), 2 * TOKEN);
        assert_eq!(chain.ledger.total_stake(), 3 * TOKEN);
        assert!(report.events.contains(&LedgerEvent::ValidatorDeactivated {
            validator: b,
            status: status::OFFLINE,
        }));

        let snapshot = chain.ledger.epoch_snapshot(2).unwrap();
        assert_eq!(snapshot.offline_blocks.get(&b), Some(&1_001));
        assert_eq!(snapshot.offline_time.get(&b), Some(&(3 * DAY)));
    }

    #[test]
    fn test_offline_below_thresholds_tolerated() {
        let (mut chain, _, b) = two_validators();
        chain.driver.set_offline(b, 3 * DAY, 1_000);
        chain.node_seal(DAY);
        assert!(chain.ledger.get_validator(b).unwrap().is_active());

        chain.driver.set_offline(b, 3 * DAY - 1, 5_000);
        chain.node_seal(DAY);
        assert!(chain.ledger.get_validator(b).unwrap().is_active());
    }

    #[test]
    fn test_low_average_uptime() {
        let mut params = StakingParams::new();
        params.min_average_uptime = percent(50);
        params.average_uptime_epoch_window = 10;
        let mut chain = TestChain::new(params);
        let a = chain.create_validator(1, 2 * TOKEN);
        let b = chain.create_validator(2, TOKEN);
        chain.node_seal(0);

        chain.driver.set_uptime(b, DAY / 4);
        for _ in 0..9 {
            chain.node_seal(DAY);
        }
        assert!(chain.ledger.get_validator(b).unwrap().is_active());
        assert_eq!(chain.ledger.average_uptime(b), percent(25));

        // la fenêtre est pleine
        let report = chain.node_seal(DAY);
        assert_eq!(chain.ledger.get_validator(b).unwrap().status, status::OFFLINE);
        assert!(chain.ledger.get_validator(a).unwrap().is_active());
        assert_eq!(report.next_validators, vec![a]);
    }
}

#[cfg(test)]
mod fee_tests {
    use super::*;

    #[test]
    fn test_fees_burnt_and_treasury_minted() {
        let (mut chain, a, _) = two_validators();
        let treasury = account(0x77);
        let owner = chain.owner();
        chain
            .ledger
            .update_param(&owner, ParamUpdate::IssuedTokensRecipient(Some(treasury)))
            .unwrap();

        chain.driver.add_fee(a, 10_000);
        let report = chain.node_seal(DAY);

        assert_eq!(chain.ledger.epoch_snapshot(2).unwrap().epoch_fee, 10_000);
        assert_eq!(chain.ledger.total_supply(), GENESIS_SUPPLY - 9_000);
        assert!(report.events.contains(&LedgerEvent::TreasuryMinted {
            recipient: treasury,
            amount: 1_000,
        }));

        // frais cumulés: rien de nouveau à l'epoch suivante
        chain.node_seal(DAY);
        assert_eq!(chain.ledger.epoch_snapshot(3).unwrap().epoch_fee, 0);
        assert_eq!(chain.ledger.total_supply(), GENESIS_SUPPLY - 9_000);
    }

    #[test]
    fn test_fees_without_treasury() {
        let (mut chain, a, b) = two_validators();
        chain.ledger.params.base_reward_per_second = 0;
        chain.driver.add_fee(a, 6_000);
        chain.driver.add_fee(b, 4_000);
        chain.node_seal(DAY);

        let snapshot = chain.ledger.epoch_snapshot(2).unwrap();
        assert_eq!(snapshot.epoch_fee, 10_000);
        assert_eq!(snapshot.total_tx_reward_weight, 10_000);
        assert_eq!(chain.ledger.total_supply(), GENESIS_SUPPLY - 10_000);

        // 70% des frais redistribués (4200 pour a), 30% versés hors lockup
        assert_eq!(chain.pending(1, a), 1_260);
        assert_eq!(chain.pending(2, b), 840);
    }
}

#[cfg(test)]
mod snapshot_tests {
    use super::*;

    #[test]
    fn test_sealed_snapshot_contents() {
        let (mut chain, a, b) = two_validators();
        let report = chain.node_seal(DAY);
        assert_eq!(report.epoch, 2);
        assert_eq!(chain.ledger.current_sealed_epoch(), 2);
        assert_eq!(chain.ledger.current_epoch(), 3);

        let snapshot = chain.ledger.epoch_snapshot(2).unwrap();
        assert_eq!(snapshot.end_time, chain.now);
        assert_eq!(snapshot.end_block, 2);
        assert_eq!(snapshot.validator_ids, vec![a, b]);
        assert_eq!(snapshot.total_stake, 3 * TOKEN);
        assert_eq!(snapshot.total_supply, GENESIS_SUPPLY);
        assert_eq!(snapshot.uptime_of(a), DAY);
        assert_eq!(snapshot.base_reward_per_second, StakingParams::new().base_reward_per_second);
        assert!(snapshot.reward_per_token(a) > 0);

        let open = chain.ledger.epoch_snapshot(3).unwrap();
        assert_eq!(open.validator_ids, vec![a, b]);
        assert_eq!(open.received_stake_of(a), 2 * TOKEN);
    }

    #[test]
    fn test_gas_price_decays_without_load() {
        let (mut chain, _, _) = two_validators();
        assert_eq!(chain.ledger.min_gas_price(), INITIAL_MIN_GAS_PRICE * 95 / 100);

        let report = chain.node_seal(DAY);
        assert_eq!(report.min_gas_price, 90_250_000_000);
        assert!(report
            .events
            .contains(&LedgerEvent::MinGasPriceUpdated { price: 90_250_000_000 }));

        for _ in 0..120 {
            chain.node_seal(DAY);
        }
        assert_eq!(chain.ledger.min_gas_price(), GWEI);
    }

    #[test]
    fn test_genesis_closed_after_first_seal() {
        let (mut chain, _, _) = two_validators();
        let driver = chain.driver.account();
        let record = GenesisValidatorRecord {
            id: 9,
            auth: account(9),
            pubkey: vec![9; 33],
            status: status::OK,
            created_epoch: 0,
            created_time: 0,
            deactivated_epoch: 0,
            deactivated_time: 0,
        };
        assert_eq!(
            chain.ledger.set_genesis_validator(&driver, record),
            Err(StakingError::GenesisClosed)
        );
        assert_eq!(
            chain.ledger.set_total_supply(&driver, 1),
            Err(StakingError::GenesisClosed)
        );
    }
}
