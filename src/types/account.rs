// Account - Identifiants de comptes
use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// AccountId = clé publique Ed25519 (32 bytes)
/// Principe: Pas d'identité, juste des clés
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId([u8; 32]);

impl AccountId {
    /// Compte nul, jamais un propriétaire valide
    pub const ZERO: AccountId = AccountId([0u8; 32]);

    pub fn from_public_key(key: &VerifyingKey) -> Self {
        AccountId(key.to_bytes())
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        AccountId(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Représentation hexadécimale complète (0x + 64 caractères)
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0[..8]))
    }
}

impl From<[u8; 32]> for AccountId {
    fn from(bytes: [u8; 32]) -> Self {
        AccountId(bytes)
    }
}

impl FromStr for AccountId {
    type Err = AccountParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex_str = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(hex_str).map_err(|e| AccountParseError::InvalidHex(e.to_string()))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| AccountParseError::InvalidLength(b.len()))?;
        Ok(AccountId(bytes))
    }
}

/// Erreurs de parsing d'un compte
#[derive(Debug, thiserror::Error)]
pub enum AccountParseError {
    #[error("Hex invalide: {0}")]
    InvalidHex(String),

    #[error("Longueur invalide: {0} bytes (attendu 32)")]
    InvalidLength(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_display() {
        let account = AccountId::from_bytes([0xab; 32]);
        assert_eq!(account.to_string(), "0xabababababababab");
    }

    #[test]
    fn test_account_parse_roundtrip() {
        let account = AccountId::from_bytes([7; 32]);
        let parsed: AccountId = account.to_hex().parse().unwrap();
        assert_eq!(parsed, account);
    }

    #[test]
    fn test_account_parse_rejects_short() {
        let result = "0x0102".parse::<AccountId>();
        assert!(matches!(result, Err(AccountParseError::InvalidLength(2))));
    }

    #[test]
    fn test_zero_account() {
        assert!(AccountId::ZERO.is_zero());
        assert!(!AccountId::from_bytes([1; 32]).is_zero());
    }
}
