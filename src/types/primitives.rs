// Primitives - Types fondamentaux du ledger de staking
use serde::{Deserialize, Serialize};
use std::fmt;

/// Hash universel (Blake3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hash([u8; 32]);

impl Hash {
    pub const ZERO: Hash = Hash([0u8; 32]);

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Hash(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hash des données avec Blake3
    pub fn hash(data: &[u8]) -> Self {
        let hash = blake3::hash(data);
        Hash(*hash.as_bytes())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..8]))
    }
}

/// Numéro de bloc
pub type BlockNumber = u64;

/// Timestamp Unix en secondes
pub type Timestamp = u64;

/// Balance en plus petite unité (1 token = 10^18 units)
pub type Balance = u128;

/// Numéro d'epoch scellée
pub type EpochNumber = u64;

/// Identifiant séquentiel d'un validateur (0 = aucun)
pub type ValidatorId = u64;

/// Constantes monétaires
pub const TOKEN: Balance = 1_000_000_000_000_000_000; // 10^18
pub const GWEI: Balance = 1_000_000_000; // 10^9

/// Durées
pub const HOUR: Timestamp = 3_600;
pub const DAY: Timestamp = 86_400;
pub const YEAR: Timestamp = 365 * DAY;
