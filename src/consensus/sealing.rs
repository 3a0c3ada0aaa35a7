// Sealing - Clôture d'une epoch: pénalités offline, récompenses, uptime, prix du gas
use super::gas_price::next_min_gas_price;
use super::snapshot::EpochSnapshot;
use super::validator::status;
use crate::contracts::{LedgerEvent, StakingError, StakingLedger};
use crate::types::{apply_ratio, mul_div, mul_mul_div, AccountId, Balance, BlockNumber, EpochNumber, Timestamp, ValidatorId, UNIT};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Métriques fournies par le driver, dans l'ordre des validateurs de l'epoch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub offline_time: Vec<Timestamp>,
    pub offline_blocks: Vec<u64>,
    pub uptime: Vec<Timestamp>,

    /// Frais cumulés depuis le genesis, par validateur
    pub originated_txs_fee: Vec<Balance>,

    /// Gas consommé pendant l'epoch
    pub epoch_gas: u128,
}

impl EpochMetrics {
    fn check_len(&self, expected: usize) -> Result<(), StakingError> {
        let lengths = [
            self.offline_time.len(),
            self.offline_blocks.len(),
            self.uptime.len(),
            self.originated_txs_fee.len(),
        ];
        match lengths.iter().find(|len| **len != expected) {
            Some(got) => Err(StakingError::MetricsLengthMismatch {
                expected,
                got: *got,
            }),
            None => Ok(()),
        }
    }
}

impl StakingLedger {
    /// Scelle l'epoch ouverte (driver uniquement)
    pub fn seal_epoch(
        &mut self,
        caller: &AccountId,
        metrics: &EpochMetrics,
        now: Timestamp,
        block: BlockNumber,
    ) -> Result<EpochNumber, StakingError> {
        self.ensure_driver(caller)?;

        let epoch = self.state.current_epoch();
        let sealed = self.state.current_sealed_epoch;
        let mut snapshot = self.snapshots.get(epoch).cloned().unwrap_or_default();
        let prev = self.snapshots.get(sealed).cloned().unwrap_or_default();
        let ids = snapshot.validator_ids.clone();
        metrics.check_len(ids.len())?;
        if now < prev.end_time {
            return Err(StakingError::EpochTimeWentBackwards {
                now,
                previous_end: prev.end_time,
            });
        }

        // epoch de durée nulle: comptée comme une seconde
        let duration = (now - prev.end_time).max(1);

        self.seal_offline(&mut snapshot, &ids, metrics, now);
        self.seal_rewards(&mut snapshot, &prev, &ids, metrics, duration, now);
        self.seal_average_uptime(&ids, &metrics.uptime, duration, now);
        self.state.min_gas_price = next_min_gas_price(
            self.state.min_gas_price,
            duration,
            metrics.epoch_gas,
            self.params.target_gas_power_per_second,
            self.params.gas_price_balancing_counterweight,
        );

        self.state.current_sealed_epoch = epoch;
        self.state.genesis_closed = true;

        snapshot.end_time = now;
        snapshot.end_block = block;
        snapshot.base_reward_per_second = self.params.base_reward_per_second;
        snapshot.total_supply = self.state.total_supply;
        self.snapshots.seal(epoch, snapshot);

        self.emit(LedgerEvent::EpochSealed { epoch, end_time: now });
        info!(
            "Epoch {} sealed (duration {}s, {} validators, min gas price {})",
            epoch,
            duration,
            ids.len(),
            self.state.min_gas_price
        );
        Ok(epoch)
    }

    /// Fixe le set actif de l'epoch qui vient de s'ouvrir (driver uniquement)
    pub fn seal_epoch_validators(
        &mut self,
        caller: &AccountId,
        next_validators: &[ValidatorId],
    ) -> Result<(), StakingError> {
        self.ensure_driver(caller)?;
        let stakes = next_validators
            .iter()
            .map(|id| self.validator(*id).map(|v| (*id, v.received_stake)))
            .collect::<Result<Vec<_>, _>>()?;

        let open = self.state.current_epoch();
        let snapshot = self.snapshots.open_mut(open);
        snapshot.validator_ids = next_validators.to_vec();
        snapshot.received_stake = stakes.iter().copied().collect();
        snapshot.total_stake = stakes
            .iter()
            .fold(0, |acc: Balance, (_, stake)| acc.saturating_add(*stake));

        let price = self.state.min_gas_price;
        self.emit(LedgerEvent::MinGasPriceUpdated { price });
        debug!("Epoch {} validator set: {:?}", open, next_validators);
        Ok(())
    }

    fn seal_offline(
        &mut self,
        snapshot: &mut EpochSnapshot,
        ids: &[ValidatorId],
        metrics: &EpochMetrics,
        now: Timestamp,
    ) {
        for (i, id) in ids.iter().enumerate() {
            let offline_time = metrics.offline_time[i];
            let offline_blocks = metrics.offline_blocks[i];

            if offline_blocks > self.params.offline_penalty_threshold_blocks
                && offline_time >= self.params.offline_penalty_threshold_time
            {
                warn!("Validator {} offline for {}s / {} blocks", id, offline_time, offline_blocks);
                self.set_validator_deactivated(*id, status::OFFLINE, now);
                self.sync_validator(*id);
            }

            snapshot.offline_time.insert(*id, offline_time);
            snapshot.offline_blocks.insert(*id, offline_blocks);
        }
    }

    fn seal_rewards(
        &mut self,
        snapshot: &mut EpochSnapshot,
        prev: &EpochSnapshot,
        ids: &[ValidatorId],
        metrics: &EpochMetrics,
        duration: Timestamp,
        now: Timestamp,
    ) {
        let duration = duration as u128;
        let mut base_weights = Vec::with_capacity(ids.len());
        let mut tx_weights = Vec::with_capacity(ids.len());
        let mut total_base_weight: Balance = 0;
        let mut total_tx_weight: Balance = 0;
        let mut epoch_fee: Balance = 0;

        for (i, id) in ids.iter().enumerate() {
            let uptime = metrics.uptime[i] as u128;
            let originated = metrics.originated_txs_fee[i].saturating_sub(prev.originated_fee_of(*id));

            let tx_weight = mul_div(originated, uptime, duration);
            let stake = snapshot.received_stake_of(*id);
            let base_weight = mul_div(mul_div(stake, uptime, duration), uptime, duration);

            total_tx_weight = total_tx_weight.saturating_add(tx_weight);
            total_base_weight = total_base_weight.saturating_add(base_weight);
            epoch_fee = epoch_fee.saturating_add(originated);
            tx_weights.push(tx_weight);
            base_weights.push(base_weight);
        }

        let base_reward_per_second = self.params.base_reward_per_second;
        let validators_fee_share = self.params.validators_fee_share();
        let commission_rate = self.params.validator_commission;

        for (i, id) in ids.iter().enumerate() {
            let mut raw_reward: Balance = 0;
            if base_weights[i] != 0 {
                raw_reward = mul_mul_div(duration, base_reward_per_second, base_weights[i], total_base_weight);
            }
            if tx_weights[i] != 0 {
                let tx_reward = mul_div(epoch_fee, tx_weights[i], total_tx_weight);
                raw_reward = raw_reward.saturating_add(apply_ratio(tx_reward, validators_fee_share));
            }

            let commission = apply_ratio(raw_reward, commission_rate);
            self.credit_commission(*id, commission, now);

            let delegators_reward = raw_reward - commission;
            let received = self.registry.get(*id).map(|v| v.received_stake).unwrap_or(0);
            let reward_per_token = mul_div(delegators_reward, UNIT, received);

            snapshot.accumulated_reward_per_token.insert(
                *id,
                prev.reward_per_token(*id).saturating_add(reward_per_token),
            );
            snapshot
                .accumulated_originated_txs_fee
                .insert(*id, metrics.originated_txs_fee[i]);
            snapshot
                .accumulated_uptime
                .insert(*id, prev.uptime_of(*id).saturating_add(metrics.uptime[i]));
        }

        snapshot.epoch_fee = epoch_fee;
        snapshot.total_base_reward_weight = total_base_weight;
        snapshot.total_tx_reward_weight = total_tx_weight;

        // les frais sont brûlés, la part trésorerie est ré-émise
        self.state.total_supply = self.state.total_supply.saturating_sub(epoch_fee);
        if let Some(recipient) = self.params.issued_tokens_recipient {
            let treasury_share = apply_ratio(epoch_fee, self.params.treasury_fee_share);
            if treasury_share != 0 {
                self.state.total_supply = self.state.total_supply.saturating_add(treasury_share);
                self.emit(LedgerEvent::TreasuryMinted {
                    recipient,
                    amount: treasury_share,
                });
            }
        }
    }

    fn seal_average_uptime(
        &mut self,
        ids: &[ValidatorId],
        uptimes: &[Timestamp],
        duration: Timestamp,
        now: Timestamp,
    ) {
        let window = self.params.average_uptime_epoch_window;
        let min_average = self.params.min_average_uptime;

        for (id, uptime) in ids.iter().zip(uptimes) {
            let average = self.uptime.record(*id, *uptime, duration, window);
            let full = self
                .uptime
                .window(*id)
                .map(|w| w.is_full(window as usize))
                .unwrap_or(false);

            if min_average != 0 && full && average < min_average {
                warn!("Validator {} average uptime {} below minimum", id, average);
                self.set_validator_deactivated(*id, status::OFFLINE, now);
                self.sync_validator(*id);
            }
        }
    }
}
