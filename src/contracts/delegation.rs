// Delegation - Stake par couple (délégateur, validateur)
use super::rewards::Rewards;
use super::staking::{LedgerEvent, StakingError, StakingLedger};
use crate::consensus::validator::status;
use crate::types::{apply_ratio, mul_div, AccountId, Balance, EpochNumber, Timestamp, ValidatorId};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Clé d'une délégation
pub type DelegationKey = (AccountId, ValidatorId);

/// Fenêtre de lockup courante ("épisode")
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedDelegation {
    pub locked_stake: Balance,

    /// Première epoch de l'épisode
    pub from_epoch: EpochNumber,

    pub end_time: Timestamp,

    /// Durée demandée (0 = pas de lock)
    pub duration: Timestamp,
}

impl LockedDelegation {
    /// Verrouillé jusqu'à `end_time` inclus
    pub fn is_locked_up(&self, now: Timestamp) -> bool {
        self.end_time != 0 && now <= self.end_time
    }
}

/// Pénalité d'un épisode remplacé par un re-lock
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Penalty {
    pub amount: Balance,

    /// Fin de l'épisode d'origine, la pénalité expire après
    pub end_time: Timestamp,
}

/// Délégation d'un compte vers un validateur
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegation {
    /// Stake total (libre + verrouillé)
    pub stake: Balance,

    pub lockup: LockedDelegation,

    /// Checkpoint: epoch jusqu'à laquelle les récompenses sont dans le stash
    pub stashed_rewards_until: EpochNumber,

    /// Récompenses réclamables
    pub rewards_stash: Rewards,

    /// Récompenses gagnées pendant l'épisode de lockup courant
    pub lockup_rewards: Rewards,

    pub relock_penalties: Vec<Penalty>,
}

impl Delegation {
    pub fn locked_stake(&self, now: Timestamp) -> Balance {
        if self.lockup.is_locked_up(now) {
            self.lockup.locked_stake
        } else {
            0
        }
    }

    pub fn unlocked_stake(&self, now: Timestamp) -> Balance {
        self.stake.saturating_sub(self.locked_stake(now))
    }

    pub(crate) fn clear_lockup(&mut self) {
        self.lockup = LockedDelegation::default();
        self.lockup_rewards = Rewards::default();
    }

    /// Pénalité de l'épisode courant: tout l'extra et la moitié de la base, au prorata
    pub(crate) fn pop_non_stashed_penalty(&mut self, unlock_amount: Balance, total_amount: Balance) -> Balance {
        let rewards = &mut self.lockup_rewards;
        let extra_share = mul_div(rewards.lockup_extra_reward, unlock_amount, total_amount);
        let base_share = mul_div(rewards.lockup_base_reward, unlock_amount, total_amount);

        rewards.lockup_extra_reward -= extra_share;
        rewards.lockup_base_reward -= base_share;

        extra_share + base_share / 2
    }

    /// Pénalités des épisodes remplacés, au prorata
    pub(crate) fn pop_stashed_penalty(
        &mut self,
        unlock_amount: Balance,
        total_amount: Balance,
        now: Timestamp,
    ) -> Balance {
        self.del_stale_penalties(now);
        let mut total: Balance = 0;
        for penalty in self.relock_penalties.iter_mut() {
            let share = mul_div(penalty.amount, unlock_amount, total_amount);
            penalty.amount -= share;
            total = total.saturating_add(share);
        }
        total
    }

    /// Retire les pénalités expirées ou épuisées
    pub(crate) fn del_stale_penalties(&mut self, now: Timestamp) {
        self.relock_penalties
            .retain(|p| p.end_time >= now && p.amount != 0);
    }
}

impl StakingLedger {
    pub fn stake_of(&self, delegator: &AccountId, validator: ValidatorId) -> Balance {
        self.delegations
            .get(&(*delegator, validator))
            .map(|d| d.stake)
            .unwrap_or(0)
    }

    pub fn delegation(&self, delegator: &AccountId, validator: ValidatorId) -> Option<&Delegation> {
        self.delegations.get(&(*delegator, validator))
    }

    pub fn delegations(&self) -> impl Iterator<Item = (&DelegationKey, &Delegation)> {
        self.delegations.iter()
    }

    /// Stake reçu maximal autorisé pour un self-stake donné
    fn max_received_stake(&self, self_stake: Balance) -> Balance {
        apply_ratio(self_stake, self.params.max_delegated_ratio)
    }

    /// Vérifie qu'une délégation de `amount` serait acceptée
    pub(crate) fn check_delegate(
        &self,
        delegator: &AccountId,
        validator: ValidatorId,
        amount: Balance,
    ) -> Result<(), StakingError> {
        let v = self.validator(validator)?;
        if !v.is_active() {
            return Err(StakingError::ValidatorNotActive);
        }
        if amount == 0 {
            return Err(StakingError::ZeroAmount);
        }

        let mut self_stake = self.stake_of(&v.auth, validator);
        if *delegator == v.auth {
            self_stake = self_stake.saturating_add(amount);
        }
        let received = v.received_stake.saturating_add(amount);
        if received > self.max_received_stake(self_stake) {
            return Err(StakingError::ValidatorDelegationLimitExceeded);
        }
        Ok(())
    }

    /// Délègue du stake à un validateur actif
    pub fn delegate(
        &mut self,
        delegator: AccountId,
        validator: ValidatorId,
        amount: Balance,
        now: Timestamp,
    ) -> Result<(), StakingError> {
        self.check_delegate(&delegator, validator, amount)?;
        self.raw_delegate(delegator, validator, amount, now);
        self.sync_validator(validator);
        Ok(())
    }

    /// Ajoute du stake après stash, sans contrôle
    pub(crate) fn raw_delegate(
        &mut self,
        delegator: AccountId,
        validator: ValidatorId,
        amount: Balance,
        now: Timestamp,
    ) {
        self.stash_delegation(&delegator, validator, now);

        if let Some(delegation) = self.delegations.get_mut(&(delegator, validator)) {
            delegation.stake = delegation.stake.saturating_add(amount);
        }

        let mut active = false;
        if let Some(v) = self.registry.get_mut(validator) {
            v.received_stake = v.received_stake.saturating_add(amount);
            active = v.is_active();
        }
        self.state.total_stake = self.state.total_stake.saturating_add(amount);
        if active {
            self.state.total_active_stake = self.state.total_active_stake.saturating_add(amount);
        }

        self.emit(LedgerEvent::Delegated {
            delegator,
            validator,
            amount,
        });
        debug!("{} delegated {} to validator {}", delegator, amount, validator);
    }

    /// Effet d'une réduction de stake sur le validateur
    ///
    /// Retourne le statut à appliquer. `forceful`: un self-stake sous le minimum
    /// est une erreur plutôt qu'un retrait du validateur.
    pub(crate) fn check_stake_reduction(
        &self,
        delegator: &AccountId,
        validator: ValidatorId,
        amount: Balance,
        forceful: bool,
        check_limit: bool,
    ) -> Result<Option<u64>, StakingError> {
        let v = self.validator(validator)?;
        let mut self_stake = self.stake_of(&v.auth, validator);
        if *delegator == v.auth {
            self_stake = self_stake.saturating_sub(amount);
        }

        if self_stake == 0 || !v.is_active() {
            return Ok(Some(status::WITHDRAWN));
        }
        if self_stake < self.params.min_self_stake {
            if forceful {
                return Err(StakingError::InsufficientSelfStake);
            }
            return Ok(Some(status::WITHDRAWN));
        }
        if check_limit {
            let received = v.received_stake.saturating_sub(amount);
            if received > self.max_received_stake(self_stake) {
                return Err(StakingError::ValidatorDelegationLimitExceeded);
            }
        }
        Ok(None)
    }

    /// Retire du stake d'une délégation et des agrégats
    pub(crate) fn reduce_stake(
        &mut self,
        delegator: &AccountId,
        validator: ValidatorId,
        amount: Balance,
        new_status: Option<u64>,
        now: Timestamp,
    ) {
        if let Some(delegation) = self.delegations.get_mut(&(*delegator, validator)) {
            delegation.stake = delegation.stake.saturating_sub(amount);
        }

        let mut active = false;
        if let Some(v) = self.registry.get_mut(validator) {
            v.received_stake = v.received_stake.saturating_sub(amount);
            active = v.is_active();
        }
        self.state.total_stake = self.state.total_stake.saturating_sub(amount);
        if active {
            self.state.total_active_stake = self.state.total_active_stake.saturating_sub(amount);
        }

        if let Some(flags) = new_status {
            self.set_validator_deactivated(validator, flags, now);
        }
        self.sync_validator(validator);
    }
}
