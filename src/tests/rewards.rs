// Rewards Tests - Accumulation paresseuse, commission et restake
//
// Les montants attendus sont exacts: chaque produit est arrondi à l'entier
// inférieur dans l'ordre du calcul de scellement.

use super::{account, TestChain};
use crate::consensus::params::StakingParams;
use crate::contracts::{Rewards, StakingError};
use crate::node::EpochDriver;
use crate::types::{ValidatorId, DAY, TOKEN};

const V1: u8 = 1;
const V2: u8 = 2;
const V3: u8 = 3;
const D1: u8 = 11;
const D2: u8 = 12;

/// Trois validateurs, deux délégateurs, base de 1 unité par seconde
fn staking_chain() -> (TestChain, ValidatorId, ValidatorId) {
    let mut chain = TestChain::new(StakingParams::new());
    let v1 = chain.create_validator(V1, 4 * TOKEN / 10);
    let v2 = chain.create_validator(V2, 8 * TOKEN / 10);
    chain.create_validator(V3, 8 * TOKEN / 10);
    chain.delegate(V1, v1, 4 * TOKEN / 10);
    chain.delegate(D1, v1, 4 * TOKEN / 10);
    chain.delegate(D2, v2, 4 * TOKEN / 10);
    chain.node_seal(0);
    chain.ledger.params.base_reward_per_second = 1;
    (chain, v1, v2)
}

#[cfg(test)]
mod accrual_tests {
    use super::*;

    #[test]
    fn test_unlocked_rewards_accrue_linearly() {
        let (mut chain, v1, _) = staking_chain();

        chain.node_seal(DAY);
        assert_eq!(chain.pending(V1, v1), 6966);
        assert_eq!(chain.pending(D1, v1), 2754);

        chain.node_seal(DAY);
        assert_eq!(chain.pending(V1, v1), 13932);
        assert_eq!(chain.pending(D1, v1), 5508);
    }

    #[test]
    fn test_locked_stake_earns_more() {
        let (mut chain, v1, _) = staking_chain();
        chain.lock(V1, v1, 219 * DAY, 6 * TOKEN / 10);
        chain.lock(D1, v1, 73 * DAY, TOKEN / 10);

        chain.node_seal(DAY);
        assert_eq!(chain.pending(V1, v1), 14279);
        assert_eq!(chain.pending(D1, v1), 3074);

        chain.node_seal(DAY);
        assert_eq!(chain.pending(V1, v1), 28558);
        assert_eq!(chain.pending(D1, v1), 6150);
    }

    #[test]
    fn test_no_rewards_before_first_epoch() {
        let (chain, v1, _) = staking_chain();
        assert_eq!(chain.pending(D1, v1), 0);
        assert_eq!(chain.pending(99, v1), 0);
    }

    #[test]
    fn test_no_lockup_total_matches_emission() {
        // 1 token par seconde sur 1000 secondes, 16 tokens de stake
        let mut params = StakingParams::new();
        params.base_reward_per_second = TOKEN;
        let mut chain = TestChain::new(params);
        chain.create_validator(V1, 10 * TOKEN);
        chain.create_validator(V2, 5 * TOKEN);
        let v3 = chain.create_validator(V3, TOKEN);
        chain.lock(V3, v3, 364 * DAY, TOKEN);
        chain.node_seal(0);

        chain.node_seal(1_000);
        let total = chain.pending(V1, 1) / 10u128.pow(16)
            + chain.pending(V2, 2) / 10u128.pow(16)
            + chain.pending(V3, 3) / 10u128.pow(16);
        assert_eq!(total, 34363);
    }

    #[test]
    fn test_rewards_stop_at_deactivation() {
        let (mut chain, v1, _) = staking_chain();
        chain.node_seal(DAY);
        let driver = chain.driver.account();
        chain
            .ledger
            .deactivate_validator(&driver, v1, crate::consensus::validator::status::OFFLINE, chain.now)
            .unwrap();

        // l'epoch ouverte reste payée, le validateur n'est plus dans le set suivant
        let report = chain.node_seal(DAY);
        assert!(!report.next_validators.contains(&v1));
        let frozen = chain.pending(D1, v1);
        assert_eq!(frozen, 5508);

        chain.node_seal(DAY);
        chain.node_seal(DAY);
        assert_eq!(chain.pending(D1, v1), frozen);
    }
}

#[cfg(test)]
mod stash_tests {
    use super::*;

    #[test]
    fn test_stash_is_idempotent() {
        let (mut chain, v1, _) = staking_chain();
        chain.node_seal(DAY);

        let now = chain.now;
        assert_eq!(chain.ledger.stash_rewards(&account(D1), v1, now), Ok(2754));
        assert_eq!(chain.ledger.stash_rewards(&account(D1), v1, now), Ok(0));
        assert_eq!(chain.pending(D1, v1), 2754);
        assert_eq!(chain.ledger.stashed_rewards_until(&account(D1), v1), 2);
        assert_eq!(chain.ledger.rewards_stash(&account(D1), v1).unlocked_reward, 2754);
    }

    #[test]
    fn test_stash_unknown_validator() {
        let (mut chain, _, _) = staking_chain();
        let now = chain.now;
        assert_eq!(
            chain.ledger.stash_rewards(&account(D1), 42, now),
            Err(StakingError::ValidatorNotExists)
        );
    }

    #[test]
    fn test_delegate_checkpoints_rewards() {
        let (mut chain, v1, _) = staking_chain();
        chain.node_seal(DAY);

        // un nouveau dépôt ne change pas ce qui est déjà gagné
        chain.delegate(D1, v1, TOKEN / 10);
        assert_eq!(chain.pending(D1, v1), 2754);
        assert_eq!(chain.ledger.rewards_stash(&account(D1), v1).total(), 2754);
    }
}

#[cfg(test)]
mod claim_tests {
    use super::*;

    #[test]
    fn test_claim_mints_and_resets() {
        let (mut chain, v1, _) = staking_chain();
        chain.node_seal(DAY);
        let supply = chain.ledger.total_supply();
        let now = chain.now;

        let rewards = chain.ledger.claim_rewards(&account(D1), v1, now).unwrap();
        assert_eq!(rewards.total(), 2754);
        assert_eq!(chain.ledger.total_supply(), supply + 2754);
        assert_eq!(chain.pending(D1, v1), 0);

        assert_eq!(
            chain.ledger.claim_rewards(&account(D1), v1, now),
            Err(StakingError::ZeroRewards)
        );
    }

    #[test]
    fn test_restake_locked_rewards() {
        let (mut chain, v1, _) = staking_chain();
        chain.lock(V1, v1, 219 * DAY + 10, 2 * TOKEN / 10);
        chain.lock(D1, v1, 219 * DAY, 2 * TOKEN / 10);
        chain.node_seal(0);
        chain.node_seal(DAY);
        assert_eq!(chain.pending(D1, v1), 4681);

        let received = chain.ledger.get_validator(v1).unwrap().received_stake;
        let now = chain.now;
        let rewards = chain.ledger.restake_rewards(&account(D1), v1, now).unwrap();
        assert_eq!(
            rewards,
            Rewards {
                lockup_extra_reward: 1927,
                lockup_base_reward: 1377,
                unlocked_reward: 1377,
            }
        );

        assert_eq!(chain.ledger.stake_of(&account(D1), v1), 4 * TOKEN / 10 + 4681);
        assert_eq!(chain.ledger.locked_stake(&account(D1), v1, now), 2 * TOKEN / 10 + 3304);
        assert_eq!(chain.ledger.get_validator(v1).unwrap().received_stake, received + 4681);
        assert_eq!(chain.pending(D1, v1), 0);
    }

    #[test]
    fn test_restake_nothing() {
        let (mut chain, v1, _) = staking_chain();
        let now = chain.now;
        assert_eq!(
            chain.ledger.restake_rewards(&account(D1), v1, now),
            Err(StakingError::ZeroRewards)
        );
    }
}

#[cfg(test)]
mod lock_cycle_tests {
    use super::*;

    fn check_cycle(chain: &mut TestChain, v1: ValidatorId, v2: ValidatorId) {
        chain.node_seal(73 * DAY);
        assert_eq!(chain.pending(D1, v1), 224496);
        assert_eq!(chain.pending(D2, v2), 201042);
        assert_eq!(chain.pending(V1, v1), 1042461);
        assert_eq!(chain.pending(V2, v2), 508518);

        // lock du délégateur expiré pendant cette epoch
        chain.node_seal(DAY);
        assert_eq!(chain.pending(D1, v1), 227250);
        assert_eq!(chain.pending(V1, v1), 1056740);

        chain.node_seal(145 * DAY);
        assert_eq!(chain.pending(D1, v1), 626580);
        assert_eq!(chain.pending(V1, v1), 3127383);
        assert_eq!(chain.pending(V2, v2), 1525554);

        chain.node_seal(DAY);
        assert_eq!(chain.pending(D1, v1), 629334);
        assert_eq!(chain.pending(V1, v1), 3134349);
    }

    #[test]
    fn test_lock_unlock_cycles_repeat() {
        let (mut chain, v1, v2) = staking_chain();
        chain.lock(V1, v1, 219 * DAY, 6 * TOKEN / 10);
        chain.lock(D1, v1, 73 * DAY, TOKEN / 10);

        check_cycle(&mut chain, v1, v2);

        // tous les locks ont expiré: on reverrouille et on réclame tout
        chain.lock(V1, v1, 219 * DAY, 6 * TOKEN / 10);
        chain.lock(D1, v1, 73 * DAY, TOKEN / 10);
        let now = chain.now;
        for (seed, v) in [(D1, v1), (D2, v2), (V1, v1), (V2, v2)] {
            chain.ledger.claim_rewards(&account(seed), v, now).unwrap();
        }

        check_cycle(&mut chain, v1, v2);
    }
}
