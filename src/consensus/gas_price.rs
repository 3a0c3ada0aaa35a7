// Gas price - Boucle de régulation du prix minimal du gas
//
// Moyenne mobile multiplicative: le ratio consommation/cible est lissé par le
// contrepoids (en secondes), borné à ±5% par epoch, puis appliqué au prix courant.

use super::params::{MAX_GAS_PRICE_CEILING, MIN_GAS_PRICE_FLOOR};
use crate::types::{mul_div, percent, Balance, Timestamp, UNIT};

/// Variation maximale par epoch
pub const MAX_DECREASE_RATIO: Balance = percent(95);
pub const MAX_INCREASE_RATIO: Balance = percent(105);

/// Calcule le prix minimal du gas de l'epoch suivante
pub fn next_min_gas_price(
    current: Balance,
    epoch_duration: Timestamp,
    epoch_gas: u128,
    target_gas_power_per_second: u128,
    counterweight: Timestamp,
) -> Balance {
    let duration = epoch_duration as u128;
    let counterweight = counterweight as u128;

    let target_gas = duration
        .saturating_mul(target_gas_power_per_second)
        .saturating_add(1);
    let gas_ratio = mul_div(epoch_gas, UNIT, target_gas);

    // Lissage: le contrepoids pèse comme un ratio neutre de 1.0
    let smoothed = mul_div(duration, gas_ratio, 1)
        .saturating_add(counterweight.saturating_mul(UNIT))
        / duration.saturating_add(counterweight).max(1);
    let ratio = smoothed.clamp(MAX_DECREASE_RATIO, MAX_INCREASE_RATIO);

    mul_div(current, ratio, UNIT).clamp(MIN_GAS_PRICE_FLOOR, MAX_GAS_PRICE_CEILING)
}
