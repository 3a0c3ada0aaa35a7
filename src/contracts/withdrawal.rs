// Withdrawal - Retraits différés du stake non verrouillé
use super::staking::{LedgerEvent, StakingError, StakingLedger};
use crate::types::{mul_div, AccountId, Balance, EpochNumber, Timestamp, ValidatorId, UNIT};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Requête de retrait en attente de maturité
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub amount: Balance,
    pub epoch: EpochNumber,
    pub time: Timestamp,
}

/// Part confisquée d'un retrait sur un validateur slashé
pub fn slashing_penalty(amount: Balance, is_cheater: bool, refund_ratio: Balance) -> Balance {
    if !is_cheater || refund_ratio >= UNIT {
        return 0;
    }
    // arrondi en faveur du ledger
    let penalty = mul_div(amount, UNIT - refund_ratio, UNIT).saturating_add(1);
    penalty.min(amount)
}

impl StakingLedger {
    pub fn withdrawal_request(
        &self,
        delegator: &AccountId,
        validator: ValidatorId,
        request_id: u64,
    ) -> Option<&WithdrawalRequest> {
        self.withdrawals.get(&(*delegator, validator, request_id))
    }

    /// Retire du stake libre; les fonds restent bloqués jusqu'au `withdraw`
    pub fn undelegate(
        &mut self,
        delegator: AccountId,
        validator: ValidatorId,
        request_id: u64,
        amount: Balance,
        now: Timestamp,
    ) -> Result<(), StakingError> {
        self.validator(validator)?;
        if amount == 0 {
            return Err(StakingError::ZeroAmount);
        }
        if amount > self.unlocked_stake(&delegator, validator, now) {
            return Err(StakingError::NotEnoughUnlockedStake);
        }
        if self.withdrawals.contains_key(&(delegator, validator, request_id)) {
            return Err(StakingError::RequestExists);
        }
        let new_status = self.check_stake_reduction(&delegator, validator, amount, true, true)?;

        self.stash_delegation(&delegator, validator, now);
        self.withdrawals.insert(
            (delegator, validator, request_id),
            WithdrawalRequest {
                amount,
                epoch: self.state.current_epoch(),
                time: now,
            },
        );
        self.reduce_stake(&delegator, validator, amount, new_status, now);

        self.emit(LedgerEvent::Undelegated {
            delegator,
            validator,
            request_id,
            amount,
        });
        debug!("{} undelegated {} from validator {} (request {})", delegator, amount, validator, request_id);
        Ok(())
    }

    /// Finalise une requête mûre; retourne le montant versé
    pub fn withdraw(
        &mut self,
        delegator: AccountId,
        validator: ValidatorId,
        request_id: u64,
        now: Timestamp,
    ) -> Result<Balance, StakingError> {
        let key = (delegator, validator, request_id);
        let request = self
            .withdrawals
            .get(&key)
            .cloned()
            .ok_or(StakingError::RequestNotExists)?;
        let v = self.validator(validator)?;

        let mut request_time = request.time;
        let mut request_epoch = request.epoch;
        if v.deactivated_time != 0 && v.deactivated_time < request_time {
            request_time = v.deactivated_time;
            request_epoch = v.deactivated_epoch;
        }

        if now < request_time.saturating_add(self.params.withdrawal_period_time) {
            return Err(StakingError::NotEnoughTimePassed);
        }
        if self.state.current_epoch() < request_epoch.saturating_add(self.params.withdrawal_period_epochs) {
            return Err(StakingError::NotEnoughEpochsPassed);
        }

        let penalty = slashing_penalty(request.amount, v.is_cheater(), v.slashing_refund_ratio);
        if request.amount <= penalty {
            return Err(StakingError::StakeIsFullySlashed);
        }

        self.withdrawals.remove(&key);
        if penalty != 0 {
            self.state.total_supply = self.state.total_supply.saturating_sub(penalty);
            warn!("Withdrawal from slashed validator {}: {} forfeited", validator, penalty);
        }

        let paid = request.amount - penalty;
        self.emit(LedgerEvent::Withdrawn {
            delegator,
            validator,
            request_id,
            amount: paid,
            penalty,
        });
        debug!("{} withdrew {} from validator {}", delegator, paid, validator);
        Ok(paid)
    }
}
