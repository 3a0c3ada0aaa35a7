// Invariant Tests - Propriétés du ledger sous séquences d'opérations aléatoires

use super::{account, TestChain};
use crate::consensus::params::StakingParams;
use crate::contracts::scale_lockup_reward;
use crate::types::{mul_mul_div, AccountId, Balance, Timestamp, ValidatorId, DAY, HOUR, TOKEN, YEAR};
use proptest::prelude::*;
use std::collections::HashMap;

/// Une opération utilisateur ou un scellement
#[derive(Debug, Clone)]
enum Op {
    Delegate { who: u8, amount: Balance },
    Lock { who: u8, days: u64, amount: Balance },
    Undelegate { who: u8, amount: Balance },
    Seal { hours: u64 },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..3, 1u128..20).prop_map(|(who, n)| Op::Delegate { who, amount: n * TOKEN / 10 }),
        (0u8..3, 14u64..365, 1u128..20).prop_map(|(who, days, n)| Op::Lock {
            who,
            days,
            amount: n * TOKEN / 20,
        }),
        (0u8..3, 1u128..20).prop_map(|(who, n)| Op::Undelegate { who, amount: n * TOKEN / 20 }),
        (0u64..48).prop_map(|hours| Op::Seal { hours }),
    ]
}

/// Les deux premiers comptes sont les validateurs 1 et 2, le troisième délègue
fn seed_of(who: u8) -> u8 {
    match who {
        0 => 1,
        1 => 2,
        _ => 10,
    }
}

fn validator_of(who: u8) -> u64 {
    (who % 2) as u64 + 1
}

fn invariant_chain() -> TestChain {
    let mut chain = TestChain::new(StakingParams::new());
    chain.create_validator(1, TOKEN);
    chain.create_validator(2, TOKEN);
    chain.node_seal(0);
    chain
}

/// Applique une opération; les refus du ledger font partie du jeu
fn apply(chain: &mut TestChain, op: &Op, request_id: &mut u64) {
    let now = chain.now;
    match *op {
        Op::Delegate { who, amount } => {
            let _ = chain
                .ledger
                .delegate(account(seed_of(who)), validator_of(who), amount, now);
        }
        Op::Lock { who, days, amount } => {
            let _ = chain.ledger.lock_stake(
                account(seed_of(who)),
                validator_of(who),
                days * DAY,
                amount,
                now,
            );
        }
        Op::Undelegate { who, amount } => {
            *request_id += 1;
            let _ = chain.ledger.undelegate(
                account(seed_of(who)),
                validator_of(who),
                *request_id,
                amount,
                now,
            );
        }
        Op::Seal { hours } => {
            chain.node_seal(hours * HOUR);
        }
    }
}

fn check_aggregates(chain: &TestChain) -> Result<(), TestCaseError> {
    let ledger = &chain.ledger;
    let received: Balance = ledger.validators().map(|v| v.received_stake).sum();
    let active: Balance = ledger
        .validators()
        .filter(|v| v.is_active())
        .map(|v| v.received_stake)
        .sum();
    let delegated: Balance = ledger.delegations().map(|(_, d)| d.stake).sum();

    prop_assert_eq!(received, ledger.total_stake());
    prop_assert_eq!(delegated, ledger.total_stake());
    prop_assert_eq!(active, ledger.total_active_stake());

    for validator in ledger.validators() {
        let delegated: Balance = ledger
            .delegations()
            .filter(|((_, id), _)| *id == validator.id)
            .map(|(_, d)| d.stake)
            .sum();
        prop_assert_eq!(validator.received_stake, delegated);
    }

    for ((delegator, validator), delegation) in ledger.delegations() {
        let locked = ledger.locked_stake(delegator, *validator, chain.now);
        prop_assert!(locked <= delegation.stake);
    }
    Ok(())
}

fn pending_by_delegation(chain: &TestChain) -> HashMap<(AccountId, ValidatorId), Balance> {
    chain
        .ledger
        .delegations()
        .map(|(key, _)| (*key, chain.ledger.pending_rewards(&key.0, key.1)))
        .collect()
}

/// Les récompenses d'une epoch (délégateurs + commission) tiennent dans la part du validateur
fn check_epoch_pool(chain: &mut TestChain, hours: u64) -> Result<(), TestCaseError> {
    let before = pending_by_delegation(chain);
    let report = chain.node_seal(hours * HOUR);
    let after = pending_by_delegation(chain);

    let ledger = &chain.ledger;
    let sealed = ledger.epoch_snapshot(report.epoch).cloned().unwrap_or_default();
    let prev = ledger.epoch_snapshot(report.epoch - 1).cloned().unwrap_or_default();
    let duration = sealed.end_time.saturating_sub(prev.end_time) as u128;

    for id in &sealed.validator_ids {
        // uptime complète: le poids de base est le stake reçu en début d'epoch
        let pool = if sealed.total_base_reward_weight == 0 {
            0
        } else {
            mul_mul_div(
                duration,
                sealed.base_reward_per_second,
                sealed.received_stake_of(*id),
                sealed.total_base_reward_weight,
            )
        };

        let mut paid: Balance = 0;
        let mut delegations: Balance = 0;
        for (key, pending) in after.iter().filter(|(key, _)| key.1 == *id) {
            let previous = before.get(key).copied().unwrap_or(0);
            prop_assert!(*pending >= previous);
            paid += pending - previous;
            delegations += 1;
        }
        // arrondis des découpages lock / hors lock
        prop_assert!(paid <= pool + 4 * delegations, "validator {}: paid {} > pool {}", id, paid, pool);
    }
    Ok(())
}

proptest! {
    #[test]
    fn prop_aggregates_match_delegations(ops in proptest::collection::vec(op_strategy(), 1..40)) {
        let mut chain = invariant_chain();
        let mut request_id = 0;
        for op in &ops {
            apply(&mut chain, op, &mut request_id);
            check_aggregates(&chain)?;
        }
    }

    #[test]
    fn prop_epoch_rewards_within_pool(
        ops in proptest::collection::vec(op_strategy(), 1..30),
        hours in 1u64..48,
    ) {
        let mut chain = invariant_chain();
        let mut request_id = 0;
        for op in &ops {
            apply(&mut chain, op, &mut request_id);
        }
        check_epoch_pool(&mut chain, hours)?;
        check_aggregates(&chain)?;
    }

    #[test]
    fn prop_stash_is_idempotent(
        ops in proptest::collection::vec(op_strategy(), 1..30),
        who in 0u8..3,
    ) {
        let mut chain = invariant_chain();
        let mut request_id = 0;
        for op in &ops {
            apply(&mut chain, op, &mut request_id);
        }

        let delegator = account(seed_of(who));
        let validator = validator_of(who);
        let now = chain.now;
        let before = chain.ledger.pending_rewards(&delegator, validator);
        let first = chain.ledger.stash_rewards(&delegator, validator, now);
        prop_assert!(first.is_ok());

        prop_assert_eq!(chain.ledger.stash_rewards(&delegator, validator, now), Ok(0));
        prop_assert_eq!(chain.ledger.pending_rewards(&delegator, validator), before);
    }

    #[test]
    fn prop_lockup_reward_monotone_in_duration(
        full in 0u128..1_000_000 * TOKEN,
        d1 in 0u64..=YEAR,
        d2 in 0u64..=YEAR,
    ) {
        let params = StakingParams::new();
        let (short, long): (Timestamp, Timestamp) = (d1.min(d2), d1.max(d2));
        let short_reward = scale_lockup_reward(full, short, &params).total();
        let long_reward = scale_lockup_reward(full, long, &params).total();
        prop_assert!(short_reward <= long_reward);
        prop_assert!(long_reward <= full);
    }

    #[test]
    fn prop_lockup_reward_monotone_in_amount(
        a1 in 0u128..1_000_000 * TOKEN,
        a2 in 0u128..1_000_000 * TOKEN,
        duration in 0u64..=YEAR,
    ) {
        let params = StakingParams::new();
        let (small, large) = (a1.min(a2), a1.max(a2));
        prop_assert!(
            scale_lockup_reward(small, duration, &params).total()
                <= scale_lockup_reward(large, duration, &params).total()
        );
    }
}
