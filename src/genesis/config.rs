// Configuration genesis - État initial du ledger de staking
use crate::consensus::params::StakingParams;
use crate::consensus::validator::status;
use crate::contracts::{GenesisValidatorRecord, LockedDelegation, StakingError, StakingLedger};
use crate::types::{AccountId, Balance, Hash, Timestamp, ValidatorId, TOKEN};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Timestamp fixe du devnet (2025-01-01 00:00:00 UTC)
const DEVNET_START_TIME: Timestamp = 1_735_689_600;

/// Configuration genesis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisConfig {
    /// Nom de la chaîne
    pub chain_name: String,

    /// Propriétaire du ledger (hex)
    pub owner: String,

    /// Driver d'epochs (hex)
    pub driver: String,

    /// Fin de l'epoch 0
    pub start_time: Timestamp,

    /// Supply initiale
    pub total_supply: Balance,

    pub params: StakingParams,

    /// Validateurs, ids attribués dans l'ordre (1, 2, ...)
    pub validators: Vec<GenesisValidator>,

    #[serde(default)]
    pub delegations: Vec<GenesisDelegation>,
}

/// Validateur du genesis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisValidator {
    /// Compte d'autorité (hex)
    pub auth: String,

    /// Clé publique de consensus (hex)
    pub pubkey: String,

    pub self_stake: Balance,

    #[serde(default)]
    pub status: u64,

    #[serde(default)]
    pub lockup: Option<GenesisLockup>,
}

/// Délégation du genesis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisDelegation {
    pub delegator: String,
    pub validator: ValidatorId,
    pub stake: Balance,

    #[serde(default)]
    pub lockup: Option<GenesisLockup>,
}

/// Lock importé, démarrant au genesis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisLockup {
    pub locked_stake: Balance,
    pub duration: Timestamp,
}

impl GenesisLockup {
    fn to_locked(&self, start_time: Timestamp) -> LockedDelegation {
        LockedDelegation {
            locked_stake: self.locked_stake,
            from_epoch: 0,
            end_time: start_time.saturating_add(self.duration),
            duration: self.duration,
        }
    }
}

/// Compte déterministe du devnet
fn devnet_account(seed: &str) -> AccountId {
    AccountId::from_bytes(*Hash::hash(seed.as_bytes()).as_bytes())
}

impl GenesisConfig {
    /// Devnet local: trois validateurs, le driver local scelle les epochs
    pub fn devnet() -> Self {
        let validators = (1..=3)
            .map(|i| GenesisValidator {
                auth: devnet_account(&format!("devnet-validator-{}", i)).to_hex(),
                pubkey: format!("0x{}", hex::encode(Hash::hash(format!("devnet-pubkey-{}", i).as_bytes()).as_bytes())),
                self_stake: 1_000 * TOKEN * i as Balance,
                status: status::OK,
                lockup: None,
            })
            .collect();

        Self {
            chain_name: "devnet".to_string(),
            owner: devnet_account("devnet-owner").to_hex(),
            driver: devnet_account("devnet-driver").to_hex(),
            start_time: DEVNET_START_TIME,
            total_supply: 1_000_000 * TOKEN,
            params: StakingParams::new(),
            validators,
            delegations: vec![GenesisDelegation {
                delegator: devnet_account("devnet-delegator").to_hex(),
                validator: 1,
                stake: 500 * TOKEN,
                lockup: Some(GenesisLockup {
                    locked_stake: 250 * TOKEN,
                    duration: 90 * crate::types::DAY,
                }),
            }],
        }
    }

    /// Charge depuis un fichier JSON
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, GenesisError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Sauvegarde vers un fichier JSON
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), GenesisError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Construit le ledger via les points d'entrée genesis du driver
    pub fn build_ledger(&self) -> Result<StakingLedger, GenesisError> {
        if self.validators.is_empty() {
            return Err(GenesisError::NoValidators);
        }
        let owner = parse_account(&self.owner)?;
        let driver = parse_account(&self.driver)?;

        let mut ledger = StakingLedger::new(self.params.clone(), owner, driver, self.start_time);

        for (index, v) in self.validators.iter().enumerate() {
            let id = index as ValidatorId + 1;
            let auth = parse_account(&v.auth)?;
            let pubkey_hex = v.pubkey.strip_prefix("0x").unwrap_or(&v.pubkey);
            let pubkey = hex::decode(pubkey_hex).map_err(|e| GenesisError::InvalidPubkey(e.to_string()))?;

            let deactivated = v.status != status::OK;
            ledger.set_genesis_validator(
                &driver,
                GenesisValidatorRecord {
                    id,
                    auth,
                    pubkey,
                    status: v.status,
                    created_epoch: 0,
                    created_time: self.start_time,
                    deactivated_epoch: 0,
                    deactivated_time: if deactivated { self.start_time } else { 0 },
                },
            )?;
            ledger.set_genesis_delegation(
                &driver,
                auth,
                id,
                v.self_stake,
                v.lockup.as_ref().map(|l| l.to_locked(self.start_time)),
                self.start_time,
            )?;
        }

        for d in &self.delegations {
            let delegator = parse_account(&d.delegator)?;
            ledger.set_genesis_delegation(
                &driver,
                delegator,
                d.validator,
                d.stake,
                d.lockup.as_ref().map(|l| l.to_locked(self.start_time)),
                self.start_time,
            )?;
        }

        ledger.set_total_supply(&driver, self.total_supply)?;

        // set actif de l'epoch 1
        let active: Vec<ValidatorId> = ledger
            .validators()
            .filter(|v| v.is_active())
            .map(|v| v.id)
            .collect();
        ledger.seal_epoch_validators(&driver, &active)?;

        info!(
            "Genesis '{}' built: {} validators, total stake {}",
            self.chain_name,
            ledger.last_validator_id(),
            ledger.total_stake()
        );
        Ok(ledger)
    }
}

impl Default for GenesisConfig {
    fn default() -> Self {
        Self::devnet()
    }
}

fn parse_account(s: &str) -> Result<AccountId, GenesisError> {
    s.parse()
        .map_err(|e: crate::types::AccountParseError| GenesisError::InvalidAccount(format!("{}: {}", s, e)))
}

/// Erreurs de genesis
#[derive(Debug, thiserror::Error)]
pub enum GenesisError {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON invalide: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Compte invalide: {0}")]
    InvalidAccount(String),

    #[error("Clé publique invalide: {0}")]
    InvalidPubkey(String),

    #[error("Aucun validateur dans le genesis")]
    NoValidators,

    #[error("Import refusé: {0}")]
    Ledger(#[from] StakingError),
}
