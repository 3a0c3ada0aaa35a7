// Decimal - Arithmétique en virgule fixe (1.0 = 10^18)
//
// Toutes les divisions arrondissent vers le bas. Les produits intermédiaires
// passent par un entier de précision arbitraire: stake × taux × 10^18 dépasse u128.

use super::primitives::Balance;
use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};

/// 1.0 en virgule fixe
pub const UNIT: Balance = 1_000_000_000_000_000_000;

/// floor(a × b / c), 0 si c = 0, saturé à u128::MAX
pub fn mul_div(a: u128, b: u128, c: u128) -> u128 {
    if c == 0 || a == 0 || b == 0 {
        return 0;
    }
    if let Some(product) = a.checked_mul(b) {
        return product / c;
    }
    let quotient = BigUint::from(a) * BigUint::from(b) / BigUint::from(c);
    quotient.to_u128().unwrap_or(u128::MAX)
}

/// floor(a × b × c / d) sans débordement intermédiaire
pub fn mul_mul_div(a: u128, b: u128, c: u128, d: u128) -> u128 {
    if d == 0 {
        return 0;
    }
    let product = BigUint::from(a) * BigUint::from(b) * BigUint::from(c);
    if product.is_zero() {
        return 0;
    }
    (product / BigUint::from(d)).to_u128().unwrap_or(u128::MAX)
}

/// floor(amount × ratio / UNIT)
pub fn apply_ratio(amount: Balance, ratio: Balance) -> Balance {
    mul_div(amount, ratio, UNIT)
}

/// Ratio en virgule fixe à partir d'un pourcentage entier
pub const fn percent(value: u128) -> Balance {
    value * UNIT / 100
}
