// Params - Constantes économiques ajustables par l'administrateur
// Principe: Chaque changement est borné, jamais de valeur silencieusement corrigée

use crate::types::{percent, AccountId, Balance, Timestamp, DAY, GWEI, TOKEN, UNIT, YEAR};
use serde::{Deserialize, Serialize};

/// Délai minimal entre deux re-locks "gratuits" au-delà du quota
pub const RELOCK_COOLDOWN: Timestamp = 14 * DAY;

/// Nombre de pénalités de re-lock tolérées avant d'appliquer le cooldown
pub const FREE_RELOCKS: usize = 3;

/// Nombre maximal de pénalités de re-lock stockées par délégation
pub const MAX_RELOCK_PENALTIES: usize = 30;

/// Un délégateur peut verrouiller jusqu'à 30 jours après la fin du lock du validateur
pub const VALIDATOR_LOCKUP_GRACE: Timestamp = 30 * DAY;

/// Prix du gas initial
pub const INITIAL_MIN_GAS_PRICE: Balance = 100 * GWEI;

/// Bornes absolues du prix du gas
pub const MIN_GAS_PRICE_FLOOR: Balance = GWEI;
pub const MAX_GAS_PRICE_CEILING: Balance = 1_000_000 * GWEI;

/// Paramètres économiques du staking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakingParams {
    /// Self-stake minimum d'un validateur
    pub min_self_stake: Balance,

    /// Stake reçu maximal relatif au self-stake (virgule fixe)
    pub max_delegated_ratio: Balance,

    /// Commission du validateur sur les récompenses brutes
    pub validator_commission: Balance,

    /// Part des frais brûlée
    pub burnt_fee_share: Balance,

    /// Part des frais envoyée à la trésorerie
    pub treasury_fee_share: Balance,

    /// Multiplicateur de récompense pour le stake non verrouillé
    pub unlocked_reward_ratio: Balance,

    pub min_lockup_duration: Timestamp,
    pub max_lockup_duration: Timestamp,

    /// Nombre d'epochs avant qu'un retrait soit possible
    pub withdrawal_period_epochs: u64,

    /// Délai (secondes) avant qu'un retrait soit possible
    pub withdrawal_period_time: Timestamp,

    /// Récompense de base émise par seconde
    pub base_reward_per_second: Balance,

    pub offline_penalty_threshold_time: Timestamp,
    pub offline_penalty_threshold_blocks: u64,

    /// Cible de consommation de gas par seconde
    pub target_gas_power_per_second: u128,

    /// Inertie de la boucle de prix du gas (secondes)
    pub gas_price_balancing_counterweight: Timestamp,

    /// Taille de la fenêtre glissante d'uptime (epochs)
    pub average_uptime_epoch_window: u64,

    /// Uptime moyen minimal (0 = désactivé)
    pub min_average_uptime: Balance,

    /// Destinataire des tokens émis pour la trésorerie
    pub issued_tokens_recipient: Option<AccountId>,
}

impl StakingParams {
    pub fn new() -> Self {
        Self {
            min_self_stake: 317_500_000_000_000_000, // 0.3175 token
            max_delegated_ratio: 16 * UNIT,
            validator_commission: percent(15),
            burnt_fee_share: percent(20),
            treasury_fee_share: percent(10),
            unlocked_reward_ratio: percent(30),
            min_lockup_duration: 14 * DAY,
            max_lockup_duration: YEAR,
            withdrawal_period_epochs: 3,
            withdrawal_period_time: 7 * DAY,
            base_reward_per_second: 2_668_658_453_701_531_600,
            offline_penalty_threshold_time: 3 * DAY,
            offline_penalty_threshold_blocks: 1_000,
            target_gas_power_per_second: 2_000_000,
            gas_price_balancing_counterweight: 3_600,
            average_uptime_epoch_window: 100,
            min_average_uptime: 0,
            issued_tokens_recipient: None,
        }
    }

    /// Part des frais qui revient aux validateurs
    pub fn validators_fee_share(&self) -> Balance {
        UNIT.saturating_sub(self.burnt_fee_share)
            .saturating_sub(self.treasury_fee_share)
    }

    /// Applique une mise à jour après validation des bornes
    pub fn apply(&mut self, update: ParamUpdate) -> Result<(), ParamError> {
        match update {
            ParamUpdate::MinSelfStake(v) => {
                check_range(v, 100_000 * TOKEN, 10_000_000 * TOKEN)?;
                self.min_self_stake = v;
            }
            ParamUpdate::MaxDelegatedRatio(v) => {
                check_range(v, UNIT, 31 * UNIT)?;
                self.max_delegated_ratio = v;
            }
            ParamUpdate::ValidatorCommission(v) => {
                check_range(v, 0, UNIT / 2)?;
                self.validator_commission = v;
            }
            ParamUpdate::BurntFeeShare(v) => {
                check_range(v.saturating_add(self.treasury_fee_share), 0, UNIT)?;
                self.burnt_fee_share = v;
            }
            ParamUpdate::TreasuryFeeShare(v) => {
                check_range(v.saturating_add(self.burnt_fee_share), 0, UNIT)?;
                self.treasury_fee_share = v;
            }
            ParamUpdate::UnlockedRewardRatio(v) => {
                check_range(v, 0, UNIT)?;
                self.unlocked_reward_ratio = v;
            }
            ParamUpdate::MinLockupDuration(v) => {
                check_range(v as u128, DAY as u128, self.max_lockup_duration as u128)?;
                self.min_lockup_duration = v;
            }
            ParamUpdate::MaxLockupDuration(v) => {
                check_range(v as u128, self.min_lockup_duration as u128, (4 * YEAR) as u128)?;
                self.max_lockup_duration = v;
            }
            ParamUpdate::WithdrawalPeriodEpochs(v) => {
                check_range(v as u128, 2, 100)?;
                self.withdrawal_period_epochs = v;
            }
            ParamUpdate::WithdrawalPeriodTime(v) => {
                check_range(v as u128, DAY as u128, (30 * DAY) as u128)?;
                self.withdrawal_period_time = v;
            }
            ParamUpdate::BaseRewardPerSecond(v) => {
                check_range(v, 0, 32 * TOKEN)?;
                self.base_reward_per_second = v;
            }
            ParamUpdate::OfflinePenaltyThresholdTime(v) => {
                check_range(v as u128, DAY as u128, (10 * DAY) as u128)?;
                self.offline_penalty_threshold_time = v;
            }
            ParamUpdate::OfflinePenaltyThresholdBlocks(v) => {
                check_range(v as u128, 100, 1_000_000)?;
                self.offline_penalty_threshold_blocks = v;
            }
            ParamUpdate::TargetGasPowerPerSecond(v) => {
                check_range(v, 1, 2_000_000_000)?;
                self.target_gas_power_per_second = v;
            }
            ParamUpdate::GasPriceBalancingCounterweight(v) => {
                check_range(v as u128, 100, (10 * DAY) as u128)?;
                self.gas_price_balancing_counterweight = v;
            }
            ParamUpdate::AverageUptimeEpochWindow(v) => {
                check_range(v as u128, 10, 87_600)?;
                self.average_uptime_epoch_window = v;
            }
            ParamUpdate::MinAverageUptime(v) => {
                check_range(v, 0, percent(90))?;
                self.min_average_uptime = v;
            }
            ParamUpdate::IssuedTokensRecipient(v) => {
                self.issued_tokens_recipient = v;
            }
        }
        Ok(())
    }
}

impl Default for StakingParams {
    fn default() -> Self {
        Self::new()
    }
}

fn check_range(value: u128, min: u128, max: u128) -> Result<(), ParamError> {
    if value < min {
        return Err(ParamError::ValueTooSmall { value, min });
    }
    if value > max {
        return Err(ParamError::ValueTooLarge { value, max });
    }
    Ok(())
}

/// Mise à jour d'un paramètre par l'administrateur
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamUpdate {
    MinSelfStake(Balance),
    MaxDelegatedRatio(Balance),
    ValidatorCommission(Balance),
    BurntFeeShare(Balance),
    TreasuryFeeShare(Balance),
    UnlockedRewardRatio(Balance),
    MinLockupDuration(Timestamp),
    MaxLockupDuration(Timestamp),
    WithdrawalPeriodEpochs(u64),
    WithdrawalPeriodTime(Timestamp),
    BaseRewardPerSecond(Balance),
    OfflinePenaltyThresholdTime(Timestamp),
    OfflinePenaltyThresholdBlocks(u64),
    TargetGasPowerPerSecond(u128),
    GasPriceBalancingCounterweight(Timestamp),
    AverageUptimeEpochWindow(u64),
    MinAverageUptime(Balance),
    IssuedTokensRecipient(Option<AccountId>),
}

/// Erreurs de paramètres
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParamError {
    #[error("Valeur trop petite: {value} < {min}")]
    ValueTooSmall { value: u128, min: u128 },

    #[error("Valeur trop grande: {value} > {max}")]
    ValueTooLarge { value: u128, max: u128 },
}
