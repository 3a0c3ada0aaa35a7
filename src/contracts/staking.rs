// Staking - Ledger de staking, délégations et récompenses par epoch
use super::delegation::{Delegation, DelegationKey, LockedDelegation};
use super::withdrawal::WithdrawalRequest;
use crate::consensus::params::{ParamError, ParamUpdate, StakingParams, INITIAL_MIN_GAS_PRICE};
use crate::consensus::snapshot::{EpochSnapshot, SnapshotStore};
use crate::consensus::uptime::UptimeTracker;
use crate::consensus::validator::{status, RegistryError, Validator, ValidatorRegistry};
use crate::types::{AccountId, Balance, EpochNumber, Timestamp, ValidatorId, UNIT};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};

/// Compteurs globaux du ledger
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerState {
    /// Dernière epoch finalisée
    pub current_sealed_epoch: EpochNumber,

    /// Stake de tous les validateurs
    pub total_stake: Balance,

    /// Stake des validateurs actifs uniquement
    pub total_active_stake: Balance,

    pub total_supply: Balance,
    pub min_gas_price: Balance,

    /// Import genesis terminé (premier scellement effectué)
    pub genesis_closed: bool,
}

impl LedgerState {
    /// Epoch en cours d'accumulation
    pub fn current_epoch(&self) -> EpochNumber {
        self.current_sealed_epoch + 1
    }
}

/// Événements émis par le ledger, consommés par le driver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    ValidatorCreated { validator: ValidatorId, auth: AccountId },
    WeightUpdated { validator: ValidatorId, weight: Balance },
    ValidatorDeactivated { validator: ValidatorId, status: u64 },
    Delegated { delegator: AccountId, validator: ValidatorId, amount: Balance },
    Undelegated { delegator: AccountId, validator: ValidatorId, request_id: u64, amount: Balance },
    Withdrawn { delegator: AccountId, validator: ValidatorId, request_id: u64, amount: Balance, penalty: Balance },
    LockedUp { delegator: AccountId, validator: ValidatorId, duration: Timestamp, amount: Balance, relock: bool },
    Unlocked { delegator: AccountId, validator: ValidatorId, amount: Balance, penalty: Balance },
    RewardsClaimed { delegator: AccountId, validator: ValidatorId, amount: Balance },
    RewardsRestaked { delegator: AccountId, validator: ValidatorId, amount: Balance },
    EpochSealed { epoch: EpochNumber, end_time: Timestamp },
    MinGasPriceUpdated { price: Balance },
    TreasuryMinted { recipient: AccountId, amount: Balance },
    ParamsUpdated { update: ParamUpdate },
    RefundRatioUpdated { validator: ValidatorId, ratio: Balance },
    OwnershipTransferred { previous: Option<AccountId>, new: Option<AccountId> },
}

/// Validateur importé au genesis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisValidatorRecord {
    pub id: ValidatorId,
    pub auth: AccountId,
    pub pubkey: Vec<u8>,
    pub status: u64,
    pub created_epoch: EpochNumber,
    pub created_time: Timestamp,
    pub deactivated_epoch: EpochNumber,
    pub deactivated_time: Timestamp,
}

/// Ledger de staking
///
/// # Thread Safety
/// Pas de synchronisation interne: chaque appel est un check-then-act qui doit
/// s'exécuter seul. Le runner détient le ledger en exclusivité.
///
/// Chaque point d'entrée valide toutes ses préconditions avant la première
/// écriture: un appel qui échoue ne laisse aucune trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StakingLedger {
    pub(crate) params: StakingParams,
    pub(crate) state: LedgerState,
    pub(crate) registry: ValidatorRegistry,
    pub(crate) delegations: HashMap<DelegationKey, Delegation>,
    pub(crate) withdrawals: HashMap<(AccountId, ValidatorId, u64), WithdrawalRequest>,
    pub(crate) snapshots: SnapshotStore,
    pub(crate) uptime: UptimeTracker,
    owner: Option<AccountId>,
    driver: AccountId,
    #[serde(skip)]
    events: Vec<LedgerEvent>,
}

impl StakingLedger {
    pub fn new(
        params: StakingParams,
        owner: AccountId,
        driver: AccountId,
        genesis_time: Timestamp,
    ) -> Self {
        let state = LedgerState {
            min_gas_price: INITIAL_MIN_GAS_PRICE,
            ..LedgerState::default()
        };

        Self {
            params,
            state,
            registry: ValidatorRegistry::new(),
            delegations: HashMap::new(),
            withdrawals: HashMap::new(),
            snapshots: SnapshotStore::new(genesis_time),
            uptime: UptimeTracker::new(),
            owner: Some(owner),
            driver,
            events: Vec::new(),
        }
    }

    // ---------------------------------------------------------------------
    // Rôles
    // ---------------------------------------------------------------------

    pub(crate) fn ensure_owner(&self, caller: &AccountId) -> Result<(), StakingError> {
        match self.owner {
            Some(owner) if owner == *caller => Ok(()),
            _ => Err(StakingError::Unauthorized),
        }
    }

    pub(crate) fn ensure_driver(&self, caller: &AccountId) -> Result<(), StakingError> {
        if *caller != self.driver {
            return Err(StakingError::NotDriver);
        }
        Ok(())
    }

    pub fn owner(&self) -> Option<AccountId> {
        self.owner
    }

    pub fn driver(&self) -> AccountId {
        self.driver
    }

    /// Transfère la propriété (compte nul refusé)
    pub fn transfer_ownership(
        &mut self,
        caller: &AccountId,
        new_owner: AccountId,
    ) -> Result<(), StakingError> {
        self.ensure_owner(caller)?;
        if new_owner.is_zero() {
            return Err(StakingError::ZeroAddress);
        }
        let previous = self.owner.replace(new_owner);
        self.emit(LedgerEvent::OwnershipTransferred {
            previous,
            new: Some(new_owner),
        });
        info!("Ownership transferred to {}", new_owner);
        Ok(())
    }

    /// Abandonne la propriété: plus aucun paramètre ne pourra changer
    pub fn renounce_ownership(&mut self, caller: &AccountId) -> Result<(), StakingError> {
        self.ensure_owner(caller)?;
        let previous = self.owner.take();
        self.emit(LedgerEvent::OwnershipTransferred { previous, new: None });
        warn!("Ownership renounced");
        Ok(())
    }

    /// Met à jour un paramètre économique
    pub fn update_param(
        &mut self,
        caller: &AccountId,
        update: ParamUpdate,
    ) -> Result<(), StakingError> {
        self.ensure_owner(caller)?;
        self.params.apply(update.clone())?;
        info!("Parameter updated: {:?}", update);
        self.emit(LedgerEvent::ParamsUpdated { update });
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Registre des validateurs
    // ---------------------------------------------------------------------

    /// Enregistre un validateur et son self-stake
    pub fn create_validator(
        &mut self,
        auth: AccountId,
        pubkey: Vec<u8>,
        self_stake: Balance,
        now: Timestamp,
    ) -> Result<ValidatorId, StakingError> {
        if self_stake < self.params.min_self_stake {
            return Err(StakingError::InsufficientSelfStake);
        }
        self.registry.check_new(&auth, &pubkey)?;

        let id = self.registry.next_id();
        let validator = Validator::new(id, auth, pubkey, self.state.current_epoch(), now);
        self.registry.insert(validator)?;
        self.emit(LedgerEvent::ValidatorCreated { validator: id, auth });

        self.raw_delegate(auth, id, self_stake, now);
        self.sync_validator(id);

        info!("Validator {} created by {} with self-stake {}", id, auth, self_stake);
        Ok(id)
    }

    /// Désactive un validateur (driver uniquement)
    pub fn deactivate_validator(
        &mut self,
        caller: &AccountId,
        id: ValidatorId,
        flags: u64,
        now: Timestamp,
    ) -> Result<(), StakingError> {
        self.ensure_driver(caller)?;
        let validator = self.validator(id)?;
        if !validator.is_stronger_status(flags) {
            return Err(StakingError::WrongValidatorStatus);
        }

        self.set_validator_deactivated(id, flags, now);
        self.sync_validator(id);
        Ok(())
    }

    /// Applique des bits de statut, sans vérification de rôle
    pub(crate) fn set_validator_deactivated(&mut self, id: ValidatorId, flags: u64, now: Timestamp) {
        let current_epoch = self.state.current_epoch();
        let Some(validator) = self.registry.get_mut(id) else {
            return;
        };

        if validator.is_active() && flags != status::OK {
            self.state.total_active_stake = self
                .state
                .total_active_stake
                .saturating_sub(validator.received_stake);
        }

        if validator.status | flags != validator.status {
            validator.status |= flags;
            if validator.deactivated_epoch == 0 {
                validator.deactivated_epoch = current_epoch;
                validator.deactivated_time = now;
            }
            let new_status = validator.status;
            warn!("Validator {} deactivated (status {:#x})", id, new_status);
            self.emit(LedgerEvent::ValidatorDeactivated {
                validator: id,
                status: new_status,
            });
        }
    }

    /// Publie le poids courant du validateur pour le prochain set
    pub(crate) fn sync_validator(&mut self, id: ValidatorId) {
        if let Some(validator) = self.registry.get(id) {
            let weight = validator.weight();
            self.emit(LedgerEvent::WeightUpdated {
                validator: id,
                weight,
            });
        }
    }

    pub fn is_slashed(&self, id: ValidatorId) -> bool {
        self.registry.get(id).map(|v| v.is_cheater()).unwrap_or(false)
    }

    /// Fixe la part remboursée aux délégateurs d'un validateur slashé
    pub fn update_slashing_refund_ratio(
        &mut self,
        caller: &AccountId,
        id: ValidatorId,
        ratio: Balance,
    ) -> Result<(), StakingError> {
        self.ensure_owner(caller)?;
        if !self.validator(id)?.is_cheater() {
            return Err(StakingError::ValidatorNotSlashed);
        }
        if ratio > UNIT {
            return Err(StakingError::RefundRatioTooHigh);
        }

        if let Some(validator) = self.registry.get_mut(id) {
            validator.slashing_refund_ratio = ratio;
        }
        self.emit(LedgerEvent::RefundRatioUpdated { validator: id, ratio });
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Genesis
    // ---------------------------------------------------------------------

    /// Importe un validateur pré-existant (driver, avant le premier scellement)
    pub fn set_genesis_validator(
        &mut self,
        caller: &AccountId,
        record: GenesisValidatorRecord,
    ) -> Result<(), StakingError> {
        self.ensure_driver(caller)?;
        if self.state.genesis_closed {
            return Err(StakingError::GenesisClosed);
        }

        let mut validator = Validator::new(
            record.id,
            record.auth,
            record.pubkey,
            record.created_epoch,
            record.created_time,
        );
        validator.status = record.status;
        validator.deactivated_epoch = record.deactivated_epoch;
        validator.deactivated_time = record.deactivated_time;

        let id = self.registry.insert(validator)?;
        self.emit(LedgerEvent::ValidatorCreated {
            validator: id,
            auth: record.auth,
        });
        self.sync_validator(id);
        Ok(())
    }

    /// Importe une délégation pré-existante (driver, avant le premier scellement)
    pub fn set_genesis_delegation(
        &mut self,
        caller: &AccountId,
        delegator: AccountId,
        id: ValidatorId,
        stake: Balance,
        lockup: Option<LockedDelegation>,
        now: Timestamp,
    ) -> Result<(), StakingError> {
        self.ensure_driver(caller)?;
        if self.state.genesis_closed {
            return Err(StakingError::GenesisClosed);
        }
        self.validator(id)?;
        if stake == 0 {
            return Err(StakingError::ZeroAmount);
        }
        // un lock vide n'est pas importé
        let lockup = lockup.filter(|lock| lock.locked_stake != 0);
        if let Some(ref lock) = lockup {
            if lock.duration < self.params.min_lockup_duration
                || lock.duration > self.params.max_lockup_duration
                || lock.end_time <= now
            {
                return Err(StakingError::IncorrectDuration);
            }
            let existing = self.stake_of(&delegator, id);
            if lock.locked_stake > existing.saturating_add(stake) {
                return Err(StakingError::NotEnoughUnlockedStake);
            }
        }

        self.raw_delegate(delegator, id, stake, now);
        if let Some(lock) = lockup {
            self.delegations.entry((delegator, id)).or_default().lockup = lock;
        }
        self.sync_validator(id);
        Ok(())
    }

    /// Ferme explicitement l'import genesis
    pub fn complete_genesis(&mut self, caller: &AccountId) -> Result<(), StakingError> {
        self.ensure_driver(caller)?;
        self.state.genesis_closed = true;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Accesseurs
    // ---------------------------------------------------------------------

    pub(crate) fn validator(&self, id: ValidatorId) -> Result<&Validator, StakingError> {
        self.registry.get(id).ok_or(StakingError::ValidatorNotExists)
    }

    pub fn get_validator(&self, id: ValidatorId) -> Option<&Validator> {
        self.registry.get(id)
    }

    pub fn validator_id_of(&self, auth: &AccountId) -> Option<ValidatorId> {
        self.registry.id_of(auth)
    }

    pub fn validators(&self) -> impl Iterator<Item = &Validator> {
        self.registry.iter()
    }

    pub fn last_validator_id(&self) -> ValidatorId {
        self.registry.last_validator_id()
    }

    /// Self-stake d'un validateur
    pub fn self_stake(&self, id: ValidatorId) -> Balance {
        self.registry
            .get(id)
            .map(|v| self.stake_of(&v.auth, id))
            .unwrap_or(0)
    }

    pub fn params(&self) -> &StakingParams {
        &self.params
    }

    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    pub fn current_epoch(&self) -> EpochNumber {
        self.state.current_epoch()
    }

    pub fn current_sealed_epoch(&self) -> EpochNumber {
        self.state.current_sealed_epoch
    }

    pub fn total_stake(&self) -> Balance {
        self.state.total_stake
    }

    pub fn total_active_stake(&self) -> Balance {
        self.state.total_active_stake
    }

    pub fn total_supply(&self) -> Balance {
        self.state.total_supply
    }

    pub fn set_total_supply(&mut self, caller: &AccountId, supply: Balance) -> Result<(), StakingError> {
        self.ensure_driver(caller)?;
        if self.state.genesis_closed {
            return Err(StakingError::GenesisClosed);
        }
        self.state.total_supply = supply;
        Ok(())
    }

    pub fn min_gas_price(&self) -> Balance {
        self.state.min_gas_price
    }

    pub fn epoch_snapshot(&self, epoch: EpochNumber) -> Option<&EpochSnapshot> {
        self.snapshots.get(epoch)
    }

    /// Snapshots scellés depuis `from` (inclus)
    pub fn sealed_snapshots_since(&self, from: EpochNumber) -> impl Iterator<Item = (EpochNumber, &EpochSnapshot)> {
        self.snapshots.sealed_since(from, self.state.current_sealed_epoch)
    }

    /// Réinjecte un snapshot scellé relu depuis l'archive
    pub fn restore_snapshot(&mut self, epoch: EpochNumber, snapshot: EpochSnapshot) {
        self.snapshots.restore(epoch, snapshot);
    }

    pub fn average_uptime(&self, id: ValidatorId) -> Balance {
        self.uptime.average(id)
    }

    // ---------------------------------------------------------------------
    // Événements
    // ---------------------------------------------------------------------

    pub(crate) fn emit(&mut self, event: LedgerEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    /// Vide la file d'événements
    pub fn drain_events(&mut self) -> Vec<LedgerEvent> {
        std::mem::take(&mut self.events)
    }
}

/// Erreurs de staking
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StakingError {
    #[error("Appelant non autorisé")]
    Unauthorized,

    #[error("Réservé au driver d'epochs")]
    NotDriver,

    #[error("Compte nul")]
    ZeroAddress,

    #[error("Validateur inexistant")]
    ValidatorNotExists,

    #[error("Validateur inactif")]
    ValidatorNotActive,

    #[error("Self-stake insuffisant")]
    InsufficientSelfStake,

    #[error("Transition de statut invalide")]
    WrongValidatorStatus,

    #[error("Limite de délégation du validateur dépassée")]
    ValidatorDelegationLimitExceeded,

    #[error("Montant nul")]
    ZeroAmount,

    #[error("Stake déverrouillé insuffisant")]
    NotEnoughUnlockedStake,

    #[error("Stake verrouillé insuffisant")]
    NotEnoughLockedStake,

    #[error("Requête de retrait déjà existante")]
    RequestExists,

    #[error("Requête de retrait inexistante")]
    RequestNotExists,

    #[error("Délai de retrait non écoulé")]
    NotEnoughTimePassed,

    #[error("Nombre d'epochs de retrait non atteint")]
    NotEnoughEpochsPassed,

    #[error("Stake entièrement slashé")]
    StakeIsFullySlashed,

    #[error("Validateur non slashé")]
    ValidatorNotSlashed,

    #[error("Ratio de remboursement trop élevé")]
    RefundRatioTooHigh,

    #[error("Durée de lock invalide")]
    IncorrectDuration,

    #[error("Le lock du validateur se termine trop tôt")]
    ValidatorLockupTooShort,

    #[error("Stake déjà verrouillé")]
    AlreadyLockedUp,

    #[error("Stake non verrouillé")]
    NotLockedUp,

    #[error("La durée de lock ne peut pas diminuer")]
    LockupDurationDecreased,

    #[error("Trop de re-locks")]
    TooManyReLocks,

    #[error("Re-locks trop fréquents")]
    TooFrequentReLocks,

    #[error("Aucune récompense")]
    ZeroRewards,

    #[error("Longueurs de métriques incohérentes: {expected} validateurs, {got} valeurs")]
    MetricsLengthMismatch { expected: usize, got: usize },

    #[error("Scellement antérieur à la fin de l'epoch précédente: {now} < {previous_end}")]
    EpochTimeWentBackwards { now: Timestamp, previous_end: Timestamp },

    #[error("Import genesis terminé")]
    GenesisClosed,

    #[error("Paramètre invalide: {0}")]
    Param(#[from] ParamError),

    #[error("Erreur du registre: {0}")]
    Registry(#[from] RegistryError),
}
