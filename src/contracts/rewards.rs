// Rewards - Calcul paresseux des récompenses par délégation
//
// Les récompenses ne sont jamais poussées: chaque epoch scellée publie un taux
// cumulé par token et chaque délégation le relit depuis son dernier checkpoint.

use super::delegation::{Delegation, LockedDelegation};
use super::staking::{LedgerEvent, StakingError, StakingLedger};
use crate::consensus::params::StakingParams;
use crate::types::{apply_ratio, mul_div, AccountId, Balance, EpochNumber, Timestamp, ValidatorId, UNIT};
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign};
use tracing::debug;

/// Récompense découpée selon son origine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rewards {
    /// Bonus de lockup (proportionnel à la durée)
    pub lockup_extra_reward: Balance,

    /// Part de base gagnée par le stake verrouillé
    pub lockup_base_reward: Balance,

    /// Part gagnée par le stake libre
    pub unlocked_reward: Balance,
}

impl Rewards {
    pub fn total(&self) -> Balance {
        self.lockup_extra_reward
            .saturating_add(self.lockup_base_reward)
            .saturating_add(self.unlocked_reward)
    }

    /// Part liée au lockup (extra + base)
    pub fn lockup_total(&self) -> Balance {
        self.lockup_extra_reward.saturating_add(self.lockup_base_reward)
    }

    pub fn is_zero(&self) -> bool {
        self.total() == 0
    }
}

impl Add for Rewards {
    type Output = Rewards;

    fn add(self, other: Rewards) -> Rewards {
        Rewards {
            lockup_extra_reward: self.lockup_extra_reward.saturating_add(other.lockup_extra_reward),
            lockup_base_reward: self.lockup_base_reward.saturating_add(other.lockup_base_reward),
            unlocked_reward: self.unlocked_reward.saturating_add(other.unlocked_reward),
        }
    }
}

impl AddAssign for Rewards {
    fn add_assign(&mut self, other: Rewards) {
        *self = *self + other;
    }
}

/// Applique le multiplicateur de lockup à une récompense brute
///
/// Durée 0: seul `unlocked_reward_ratio` est versé. Sinon le ratio monte
/// linéairement jusqu'à 1.0 pour un lock de durée maximale.
pub fn scale_lockup_reward(full: Balance, duration: Timestamp, params: &StakingParams) -> Rewards {
    let unlocked_ratio = params.unlocked_reward_ratio;
    if duration == 0 {
        return Rewards {
            unlocked_reward: apply_ratio(full, unlocked_ratio),
            ..Rewards::default()
        };
    }

    let max_extra_ratio = UNIT.saturating_sub(unlocked_ratio);
    let extra_ratio = mul_div(
        max_extra_ratio,
        duration as u128,
        params.max_lockup_duration as u128,
    );
    let total = mul_div(full, unlocked_ratio.saturating_add(extra_ratio), UNIT);
    let base = apply_ratio(full, unlocked_ratio);

    Rewards {
        lockup_extra_reward: total.saturating_sub(base),
        lockup_base_reward: base,
        unlocked_reward: 0,
    }
}

impl StakingLedger {
    /// Dernière epoch rémunérée pour ce validateur
    pub(crate) fn highest_payable_epoch(&self, validator: ValidatorId) -> EpochNumber {
        let sealed = self.state.current_sealed_epoch;
        match self.registry.get(validator) {
            Some(v) if v.deactivated_epoch != 0 => v.deactivated_epoch.min(sealed),
            _ => sealed,
        }
    }

    fn is_locked_up_at_epoch(&self, lockup: &LockedDelegation, epoch: EpochNumber) -> bool {
        lockup.from_epoch <= epoch && self.snapshots.end_time(epoch) <= lockup.end_time
    }

    /// Dernière epoch scellée entièrement couverte par le lock (recherche dichotomique)
    pub(crate) fn highest_lockup_epoch(&self, lockup: &LockedDelegation) -> EpochNumber {
        let mut low = lockup.from_epoch;
        let mut high = self.state.current_sealed_epoch;

        if self.is_locked_up_at_epoch(lockup, high) {
            return high;
        }
        if !self.is_locked_up_at_epoch(lockup, low) || low > high {
            return 0;
        }

        while low < high {
            let mid = (low + high) / 2;
            if self.is_locked_up_at_epoch(lockup, mid) {
                low = mid + 1;
            } else {
                high = mid;
            }
        }

        high.saturating_sub(1)
    }

    fn new_rewards_of(
        &self,
        stake: Balance,
        validator: ValidatorId,
        from: EpochNumber,
        to: EpochNumber,
    ) -> Balance {
        if from >= to {
            return 0;
        }
        let stashed_rate = self.snapshots.reward_per_token(from, validator);
        let current_rate = self.snapshots.reward_per_token(to, validator);
        mul_div(current_rate.saturating_sub(stashed_rate), stake, UNIT)
    }

    /// Récompenses accumulées depuis le dernier checkpoint
    ///
    /// L'intervalle est coupé à la dernière epoch verrouillée: avant, le stake
    /// verrouillé touche le multiplicateur de lockup; après, tout le stake est libre.
    pub(crate) fn new_rewards(&self, validator: ValidatorId, delegation: &Delegation) -> Rewards {
        let stashed_until = delegation.stashed_rewards_until;
        let payable_until = self.highest_payable_epoch(validator);
        let locked_until = self
            .highest_lockup_epoch(&delegation.lockup)
            .min(payable_until)
            .max(stashed_until);

        let lockup = &delegation.lockup;
        let whole_stake = delegation.stake;
        let unlocked_stake = whole_stake.saturating_sub(lockup.locked_stake);

        let locked_part = self.new_rewards_of(lockup.locked_stake, validator, stashed_until, locked_until);
        let unlocked_part = self.new_rewards_of(unlocked_stake, validator, stashed_until, locked_until);
        let after_lock = self.new_rewards_of(whole_stake, validator, locked_until, payable_until);

        scale_lockup_reward(locked_part, lockup.duration, &self.params)
            + scale_lockup_reward(unlocked_part, 0, &self.params)
            + scale_lockup_reward(after_lock, 0, &self.params)
    }

    /// Copie de la délégation après stash, sans écrire dans le ledger
    pub(crate) fn stashed_delegation(
        &self,
        delegator: &AccountId,
        validator: ValidatorId,
        now: Timestamp,
    ) -> (Delegation, Rewards) {
        let mut delegation = self
            .delegations
            .get(&(*delegator, validator))
            .cloned()
            .unwrap_or_default();

        let fresh = self.new_rewards(validator, &delegation);
        delegation.stashed_rewards_until = self.highest_payable_epoch(validator);
        delegation.rewards_stash += fresh;
        delegation.lockup_rewards += fresh;

        if !delegation.lockup.is_locked_up(now) {
            delegation.clear_lockup();
        }

        (delegation, fresh)
    }

    /// Écrit le stash dans le ledger, sans contrôle d'existence
    pub(crate) fn stash_delegation(
        &mut self,
        delegator: &AccountId,
        validator: ValidatorId,
        now: Timestamp,
    ) -> Rewards {
        let (delegation, fresh) = self.stashed_delegation(delegator, validator, now);
        self.delegations.insert((*delegator, validator), delegation);
        fresh
    }

    /// Déplace les récompenses en attente vers le stash, retourne le montant déplacé
    pub fn stash_rewards(
        &mut self,
        delegator: &AccountId,
        validator: ValidatorId,
        now: Timestamp,
    ) -> Result<Balance, StakingError> {
        self.validator(validator)?;
        if !self.delegations.contains_key(&(*delegator, validator)) {
            return Ok(0);
        }
        let fresh = self.stash_delegation(delegator, validator, now);
        Ok(fresh.total())
    }

    /// Récompenses réclamables (stash + non encore stashées)
    pub fn pending_rewards(&self, delegator: &AccountId, validator: ValidatorId) -> Balance {
        match self.delegations.get(&(*delegator, validator)) {
            Some(delegation) => delegation
                .rewards_stash
                .total()
                .saturating_add(self.new_rewards(validator, delegation).total()),
            None => 0,
        }
    }

    pub fn rewards_stash(&self, delegator: &AccountId, validator: ValidatorId) -> Rewards {
        self.delegations
            .get(&(*delegator, validator))
            .map(|d| d.rewards_stash)
            .unwrap_or_default()
    }

    pub fn stashed_rewards_until(&self, delegator: &AccountId, validator: ValidatorId) -> EpochNumber {
        self.delegations
            .get(&(*delegator, validator))
            .map(|d| d.stashed_rewards_until)
            .unwrap_or(0)
    }

    /// Stash puis vide la délégation de ses récompenses, sans écrire
    fn prepare_claim(
        &self,
        delegator: &AccountId,
        validator: ValidatorId,
        now: Timestamp,
    ) -> Result<(Delegation, Rewards), StakingError> {
        self.validator(validator)?;
        let (mut delegation, _) = self.stashed_delegation(delegator, validator, now);
        let rewards = std::mem::take(&mut delegation.rewards_stash);
        if rewards.is_zero() {
            return Err(StakingError::ZeroRewards);
        }
        Ok((delegation, rewards))
    }

    /// Verse les récompenses (émission de nouveaux tokens)
    pub fn claim_rewards(
        &mut self,
        delegator: &AccountId,
        validator: ValidatorId,
        now: Timestamp,
    ) -> Result<Rewards, StakingError> {
        let (delegation, rewards) = self.prepare_claim(delegator, validator, now)?;

        self.delegations.insert((*delegator, validator), delegation);
        self.state.total_supply = self.state.total_supply.saturating_add(rewards.total());
        self.emit(LedgerEvent::RewardsClaimed {
            delegator: *delegator,
            validator,
            amount: rewards.total(),
        });
        debug!("{} claimed {} from validator {}", delegator, rewards.total(), validator);
        Ok(rewards)
    }

    /// Re-délègue les récompenses; la part lockup rejoint le stake verrouillé
    pub fn restake_rewards(
        &mut self,
        delegator: &AccountId,
        validator: ValidatorId,
        now: Timestamp,
    ) -> Result<Rewards, StakingError> {
        let (delegation, rewards) = self.prepare_claim(delegator, validator, now)?;
        let amount = rewards.total();
        self.check_delegate(delegator, validator, amount)?;

        self.delegations.insert((*delegator, validator), delegation);
        self.state.total_supply = self.state.total_supply.saturating_add(amount);
        self.raw_delegate(*delegator, validator, amount, now);

        if let Some(delegation) = self.delegations.get_mut(&(*delegator, validator)) {
            if delegation.lockup.is_locked_up(now) {
                delegation.lockup.locked_stake = delegation
                    .lockup
                    .locked_stake
                    .saturating_add(rewards.lockup_total());
            }
        }
        self.sync_validator(validator);

        self.emit(LedgerEvent::RewardsRestaked {
            delegator: *delegator,
            validator,
            amount,
        });
        debug!("{} restaked {} into validator {}", delegator, amount, validator);
        Ok(rewards)
    }

    /// Crédite la commission d'une epoch directement dans le stash du validateur
    pub(crate) fn credit_commission(&mut self, validator: ValidatorId, commission: Balance, now: Timestamp) {
        let Some(auth) = self.registry.get(validator).map(|v| v.auth) else {
            return;
        };
        let self_stake = self.stake_of(&auth, validator);
        if self_stake == 0 || commission == 0 {
            return;
        }

        let locked = self.locked_stake(&auth, validator, now);
        let params = &self.params;
        let locked_commission = mul_div(commission, locked, self_stake);
        let unlocked_commission = commission.saturating_sub(locked_commission);

        let Some(delegation) = self.delegations.get_mut(&(auth, validator)) else {
            return;
        };
        let credited = scale_lockup_reward(locked_commission, delegation.lockup.duration, params)
            + scale_lockup_reward(unlocked_commission, 0, params);
        delegation.rewards_stash += credited;
        delegation.lockup_rewards += credited;
    }
}
