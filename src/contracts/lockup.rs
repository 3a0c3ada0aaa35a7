// Lockup - Verrouillage volontaire du stake et pénalités de déverrouillage anticipé
use super::delegation::{Delegation, LockedDelegation, Penalty};
use super::staking::{LedgerEvent, StakingError, StakingLedger};
use super::rewards::Rewards;
use crate::consensus::params::{
    FREE_RELOCKS, MAX_RELOCK_PENALTIES, RELOCK_COOLDOWN, VALIDATOR_LOCKUP_GRACE,
};
use crate::types::{AccountId, Balance, Timestamp, ValidatorId};
use tracing::debug;

impl StakingLedger {
    pub fn is_locked_up(&self, delegator: &AccountId, validator: ValidatorId, now: Timestamp) -> bool {
        self.delegations
            .get(&(*delegator, validator))
            .map(|d| d.lockup.is_locked_up(now))
            .unwrap_or(false)
    }

    /// Stake verrouillé (0 si le lock a expiré)
    pub fn locked_stake(&self, delegator: &AccountId, validator: ValidatorId, now: Timestamp) -> Balance {
        self.delegations
            .get(&(*delegator, validator))
            .map(|d| d.locked_stake(now))
            .unwrap_or(0)
    }

    pub fn unlocked_stake(&self, delegator: &AccountId, validator: ValidatorId, now: Timestamp) -> Balance {
        self.delegations
            .get(&(*delegator, validator))
            .map(|d| d.unlocked_stake(now))
            .unwrap_or(0)
    }

    /// Fenêtre de lock telle que stockée
    pub fn lockup_info(&self, delegator: &AccountId, validator: ValidatorId) -> LockedDelegation {
        self.delegations
            .get(&(*delegator, validator))
            .map(|d| d.lockup.clone())
            .unwrap_or_default()
    }

    pub fn lockup_rewards(&self, delegator: &AccountId, validator: ValidatorId) -> Rewards {
        self.delegations
            .get(&(*delegator, validator))
            .map(|d| d.lockup_rewards)
            .unwrap_or_default()
    }

    pub fn relock_penalties(&self, delegator: &AccountId, validator: ValidatorId) -> &[Penalty] {
        self.delegations
            .get(&(*delegator, validator))
            .map(|d| d.relock_penalties.as_slice())
            .unwrap_or(&[])
    }

    /// Verrouille du stake libre pour `duration` secondes
    pub fn lock_stake(
        &mut self,
        delegator: AccountId,
        validator: ValidatorId,
        duration: Timestamp,
        amount: Balance,
        now: Timestamp,
    ) -> Result<(), StakingError> {
        if amount == 0 {
            return Err(StakingError::ZeroAmount);
        }
        if self.is_locked_up(&delegator, validator, now) {
            return Err(StakingError::AlreadyLockedUp);
        }

        let delegation = self.prepare_lock(&delegator, validator, duration, amount, false, now)?;
        self.delegations.insert((delegator, validator), delegation);

        self.emit(LedgerEvent::LockedUp {
            delegator,
            validator,
            duration,
            amount,
            relock: false,
        });
        debug!("{} locked {} on validator {} for {}s", delegator, amount, validator, duration);
        Ok(())
    }

    /// Prolonge un lock actif, en ajoutant éventuellement du stake
    ///
    /// La pénalité restante de l'épisode remplacé est conservée et continue de
    /// s'appliquer aux déverrouillages jusqu'à sa fin d'origine.
    pub fn relock_stake(
        &mut self,
        delegator: AccountId,
        validator: ValidatorId,
        duration: Timestamp,
        amount: Balance,
        now: Timestamp,
    ) -> Result<(), StakingError> {
        if !self.is_locked_up(&delegator, validator, now) {
            return Err(StakingError::NotLockedUp);
        }

        let delegation = self.prepare_lock(&delegator, validator, duration, amount, true, now)?;
        self.delegations.insert((delegator, validator), delegation);

        self.emit(LedgerEvent::LockedUp {
            delegator,
            validator,
            duration,
            amount,
            relock: true,
        });
        debug!("{} relocked +{} on validator {} for {}s", delegator, amount, validator, duration);
        Ok(())
    }

    /// Calcule la délégation après (re)lock, sans écrire
    fn prepare_lock(
        &self,
        delegator: &AccountId,
        validator: ValidatorId,
        duration: Timestamp,
        amount: Balance,
        relock: bool,
        now: Timestamp,
    ) -> Result<Delegation, StakingError> {
        let v = self.validator(validator)?;
        if amount > self.unlocked_stake(delegator, validator, now) {
            return Err(StakingError::NotEnoughUnlockedStake);
        }
        if !v.is_active() {
            return Err(StakingError::ValidatorNotActive);
        }
        if duration < self.params.min_lockup_duration || duration > self.params.max_lockup_duration {
            return Err(StakingError::IncorrectDuration);
        }

        let end_time = now.saturating_add(duration);
        if *delegator != v.auth {
            let validator_end = self.lockup_info(&v.auth, validator).end_time;
            if validator_end.saturating_add(VALIDATOR_LOCKUP_GRACE) < end_time {
                return Err(StakingError::ValidatorLockupTooShort);
            }
        }

        let remaining = self.lockup_info(delegator, validator).end_time.saturating_sub(now);
        let (mut delegation, _) = self.stashed_delegation(delegator, validator, now);
        delegation.del_stale_penalties(now);

        if relock {
            let locked = delegation.lockup.locked_stake;
            let penalty = delegation.pop_non_stashed_penalty(locked, locked);
            if penalty != 0 {
                delegation.relock_penalties.push(Penalty {
                    amount: penalty,
                    end_time: delegation.lockup.end_time,
                });
                if delegation.relock_penalties.len() > MAX_RELOCK_PENALTIES {
                    return Err(StakingError::TooManyReLocks);
                }
                let frequent = delegation.relock_penalties.len() > FREE_RELOCKS
                    && end_time < delegation.lockup.end_time.saturating_add(RELOCK_COOLDOWN);
                if amount <= locked / 100 && frequent {
                    return Err(StakingError::TooFrequentReLocks);
                }
            }
        }

        // la nouvelle échéance ne peut précéder l'ancienne
        if duration < remaining {
            return Err(StakingError::LockupDurationDecreased);
        }

        let lockup = &mut delegation.lockup;
        lockup.locked_stake = lockup.locked_stake.saturating_add(amount);
        lockup.from_epoch = self.state.current_epoch();
        lockup.end_time = end_time;
        lockup.duration = duration;
        delegation.lockup_rewards = Rewards::default();

        Ok(delegation)
    }

    /// Déverrouille `amount` avant l'échéance; retourne la pénalité prélevée
    ///
    /// La pénalité est retirée du stake et brûlée.
    pub fn unlock_stake(
        &mut self,
        delegator: AccountId,
        validator: ValidatorId,
        amount: Balance,
        now: Timestamp,
    ) -> Result<Balance, StakingError> {
        let (delegation, penalty) = self.prepare_unlock(&delegator, validator, amount, now)?;
        let new_status = if penalty != 0 {
            self.check_stake_reduction(&delegator, validator, penalty, false, false)?
        } else {
            None
        };

        self.delegations.insert((delegator, validator), delegation);
        if penalty != 0 {
            self.reduce_stake(&delegator, validator, penalty, new_status, now);
            self.state.total_supply = self.state.total_supply.saturating_sub(penalty);
        }

        self.emit(LedgerEvent::Unlocked {
            delegator,
            validator,
            amount,
            penalty,
        });
        debug!("{} unlocked {} on validator {} (penalty {})", delegator, amount, validator, penalty);
        Ok(penalty)
    }

    /// Pénalité qu'un `unlock_stake` prélèverait maintenant
    pub fn estimate_unlock_penalty(
        &self,
        delegator: &AccountId,
        validator: ValidatorId,
        amount: Balance,
        now: Timestamp,
    ) -> Result<Balance, StakingError> {
        self.prepare_unlock(delegator, validator, amount, now)
            .map(|(_, penalty)| penalty)
    }

    fn prepare_unlock(
        &self,
        delegator: &AccountId,
        validator: ValidatorId,
        amount: Balance,
        now: Timestamp,
    ) -> Result<(Delegation, Balance), StakingError> {
        self.validator(validator)?;
        if amount == 0 {
            return Err(StakingError::ZeroAmount);
        }
        if !self.is_locked_up(delegator, validator, now) {
            return Err(StakingError::NotLockedUp);
        }
        let locked = self.lockup_info(delegator, validator).locked_stake;
        if amount > locked {
            return Err(StakingError::NotEnoughLockedStake);
        }

        let (mut delegation, _) = self.stashed_delegation(delegator, validator, now);
        let penalty = delegation
            .pop_non_stashed_penalty(amount, locked)
            .saturating_add(delegation.pop_stashed_penalty(amount, locked, now))
            .min(amount);

        delegation.lockup.locked_stake -= amount;
        if delegation.lockup.locked_stake == 0 {
            delegation.clear_lockup();
        }

        Ok((delegation, penalty))
    }
}
