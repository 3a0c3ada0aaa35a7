// Validator - Registre des validateurs et de leur statut
use crate::types::{AccountId, Balance, EpochNumber, Hash, Timestamp, ValidatorId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Bits de statut d'un validateur (0 = actif)
pub mod status {
    pub const OK: u64 = 0;
    pub const WITHDRAWN: u64 = 1;
    pub const OFFLINE: u64 = 1 << 3;
    pub const UNREACHABLE: u64 = 1 << 5;
    pub const DOUBLESIGN: u64 = 1 << 7;

    /// Tous les bits connus
    pub const ALL: u64 = WITHDRAWN | OFFLINE | UNREACHABLE | DOUBLESIGN;
}

/// Informations d'un validateur
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    pub id: ValidatorId,

    /// Compte qui contrôle le validateur (et détient le self-stake)
    pub auth: AccountId,

    /// Clé publique de consensus, opaque
    pub pubkey: Vec<u8>,

    /// Bitmask de statut
    pub status: u64,

    pub created_epoch: EpochNumber,
    pub created_time: Timestamp,
    pub deactivated_epoch: EpochNumber,
    pub deactivated_time: Timestamp,

    /// Somme de tout le stake délégué, self-stake inclus
    pub received_stake: Balance,

    /// Part du stake rendue aux délégateurs après un slash (0 = tout est confisqué)
    pub slashing_refund_ratio: Balance,
}

impl Validator {
    pub fn new(
        id: ValidatorId,
        auth: AccountId,
        pubkey: Vec<u8>,
        created_epoch: EpochNumber,
        created_time: Timestamp,
    ) -> Self {
        Self {
            id,
            auth,
            pubkey,
            status: status::OK,
            created_epoch,
            created_time,
            deactivated_epoch: 0,
            deactivated_time: 0,
            received_stake: 0,
            slashing_refund_ratio: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == status::OK
    }

    /// Double signature détectée
    pub fn is_cheater(&self) -> bool {
        self.status & status::DOUBLESIGN != 0
    }

    /// Poids de consensus pour le prochain set
    pub fn weight(&self) -> Balance {
        if self.is_active() {
            self.received_stake
        } else {
            0
        }
    }

    /// Un nouveau statut est-il strictement "plus inactif"?
    /// La valeur numérique du statut est proportionnelle à sa gravité.
    pub fn is_stronger_status(&self, flags: u64) -> bool {
        flags != status::OK && flags & status::ALL == flags && flags > self.status
    }
}

/// Ensemble des validateurs enregistrés
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidatorRegistry {
    validators: BTreeMap<ValidatorId, Validator>,
    by_auth: HashMap<AccountId, ValidatorId>,
    pubkey_hashes: HashSet<Hash>,
    last_validator_id: ValidatorId,
}

impl ValidatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Vérifie qu'un enregistrement serait accepté
    pub fn check_new(&self, auth: &AccountId, pubkey: &[u8]) -> Result<(), RegistryError> {
        if pubkey.is_empty() {
            return Err(RegistryError::EmptyIdentity);
        }
        if self.pubkey_hashes.contains(&Hash::hash(pubkey)) {
            return Err(RegistryError::IdentityAlreadyUsed);
        }
        if self.by_auth.contains_key(auth) {
            return Err(RegistryError::ValidatorExists);
        }
        Ok(())
    }

    /// Enregistre un validateur avec un id explicite (genesis) ou le suivant
    pub fn insert(&mut self, validator: Validator) -> Result<ValidatorId, RegistryError> {
        self.check_new(&validator.auth, &validator.pubkey)?;
        if validator.id == 0 || self.validators.contains_key(&validator.id) {
            return Err(RegistryError::ValidatorExists);
        }

        let id = validator.id;
        self.pubkey_hashes.insert(Hash::hash(&validator.pubkey));
        self.by_auth.insert(validator.auth, id);
        self.validators.insert(id, validator);
        self.last_validator_id = self.last_validator_id.max(id);
        Ok(id)
    }

    /// Prochain id séquentiel
    pub fn next_id(&self) -> ValidatorId {
        self.last_validator_id + 1
    }

    pub fn last_validator_id(&self) -> ValidatorId {
        self.last_validator_id
    }

    pub fn get(&self, id: ValidatorId) -> Option<&Validator> {
        self.validators.get(&id)
    }

    pub fn get_mut(&mut self, id: ValidatorId) -> Option<&mut Validator> {
        self.validators.get_mut(&id)
    }

    pub fn id_of(&self, auth: &AccountId) -> Option<ValidatorId> {
        self.by_auth.get(auth).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Validator> {
        self.validators.values()
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }
}

/// Erreurs du registre
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Clé publique vide")]
    EmptyIdentity,

    #[error("Clé publique déjà utilisée par un autre validateur")]
    IdentityAlreadyUsed,

    #[error("Validateur déjà existant")]
    ValidatorExists,
}
