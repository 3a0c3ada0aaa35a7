// State - Persistance du ledger de staking
use super::db::{decode, Database, DatabaseError, WriteOp};
use crate::consensus::snapshot::EpochSnapshot;
use crate::contracts::StakingLedger;
use crate::types::EpochNumber;
use std::path::Path;
use tracing::debug;

/// Storage key prefixes
const KEY_LEDGER: &[u8] = b"ledger";
const KEY_SEALED_EPOCH: &[u8] = b"sealed_epoch";
const PREFIX_SNAPSHOT: &[u8] = b"snapshot:";

fn snapshot_key(epoch: EpochNumber) -> Vec<u8> {
    let mut key = PREFIX_SNAPSHOT.to_vec();
    key.extend_from_slice(&epoch.to_be_bytes());
    key
}

/// Ledger persisté dans RocksDB
///
/// Chaque sauvegarde écrit le ledger et les epochs scellées depuis la dernière
/// sauvegarde dans le même batch: un crash ne laisse jamais l'un sans l'autre.
/// Le blob du ledger ne porte que les epochs récentes; l'historique vit sous
/// `snapshot:<epoch>` et est relu au chargement.
pub struct LedgerStore {
    db: Database,
}

impl LedgerStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        Ok(Self {
            db: Database::open(path)?,
        })
    }

    pub fn is_initialized(&self) -> Result<bool, StoreError> {
        Ok(self.db.exists(KEY_LEDGER)?)
    }

    /// Premier enregistrement du ledger
    pub fn initialize(&self, ledger: &StakingLedger) -> Result<(), StoreError> {
        if self.is_initialized()? {
            return Err(StoreError::AlreadyInitialized);
        }
        self.save(ledger)
    }

    pub fn load(&self) -> Result<StakingLedger, StoreError> {
        let mut ledger: StakingLedger = self
            .db
            .get_decoded(KEY_LEDGER)?
            .ok_or(StoreError::NotInitialized)?;

        let mut restored = 0usize;
        for (key, value) in self.db.prefix_iterator(PREFIX_SNAPSHOT) {
            let Some(epoch) = epoch_of_key(&key) else {
                continue;
            };
            ledger.restore_snapshot(epoch, decode(&value)?);
            restored += 1;
        }
        debug!("Ledger loaded, {} archived snapshots", restored);
        Ok(ledger)
    }

    pub fn save(&self, ledger: &StakingLedger) -> Result<(), StoreError> {
        let sealed = ledger.current_sealed_epoch();
        let from = match self.sealed_epoch()? {
            Some(archived) => archived.saturating_add(1).min(sealed),
            None => 0,
        };

        let mut ops = vec![
            WriteOp::put_encoded(KEY_LEDGER.to_vec(), ledger)?,
            WriteOp::put_encoded(KEY_SEALED_EPOCH.to_vec(), &sealed)?,
        ];
        for (epoch, snapshot) in ledger.sealed_snapshots_since(from) {
            ops.push(WriteOp::put_encoded(snapshot_key(epoch), snapshot)?);
        }

        self.db.batch_write(ops)?;
        debug!("Ledger saved at sealed epoch {}", sealed);
        Ok(())
    }

    pub fn sealed_epoch(&self) -> Result<Option<EpochNumber>, StoreError> {
        Ok(self.db.get_decoded(KEY_SEALED_EPOCH)?)
    }

    pub fn load_snapshot(&self, epoch: EpochNumber) -> Result<Option<EpochSnapshot>, StoreError> {
        Ok(self.db.get_decoded(&snapshot_key(epoch))?)
    }

    /// Epochs dont le snapshot est archivé, triées
    pub fn archived_epochs(&self) -> Vec<EpochNumber> {
        self.db
            .prefix_iterator(PREFIX_SNAPSHOT)
            .filter_map(|(key, _)| epoch_of_key(&key))
            .collect()
    }
}

fn epoch_of_key(key: &[u8]) -> Option<EpochNumber> {
    let bytes: [u8; 8] = key.get(PREFIX_SNAPSHOT.len()..)?.try_into().ok()?;
    Some(EpochNumber::from_be_bytes(bytes))
}

/// Erreurs de persistance
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Base de données: {0}")]
    Database(#[from] DatabaseError),

    #[error("Ledger non initialisé (lancer `init`)")]
    NotInitialized,

    #[error("Ledger déjà initialisé")]
    AlreadyInitialized,
}
