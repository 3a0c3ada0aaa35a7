// Snapshot - Journal append-only des epochs scellées
use crate::types::{Balance, BlockNumber, EpochNumber, Timestamp, ValidatorId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Métriques agrégées d'une epoch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochSnapshot {
    /// Validateurs du set actif pendant l'epoch (ordre des métriques)
    pub validator_ids: Vec<ValidatorId>,

    /// Stake reçu de chaque validateur au début de l'epoch
    pub received_stake: HashMap<ValidatorId, Balance>,

    pub accumulated_reward_per_token: HashMap<ValidatorId, Balance>,
    pub accumulated_uptime: HashMap<ValidatorId, Timestamp>,
    pub accumulated_originated_txs_fee: HashMap<ValidatorId, Balance>,
    pub offline_time: HashMap<ValidatorId, Timestamp>,
    pub offline_blocks: HashMap<ValidatorId, u64>,

    pub end_time: Timestamp,
    pub end_block: BlockNumber,
    pub epoch_fee: Balance,
    pub total_base_reward_weight: Balance,
    pub total_tx_reward_weight: Balance,
    pub base_reward_per_second: Balance,
    pub total_stake: Balance,
    pub total_supply: Balance,
}

impl EpochSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reward_per_token(&self, validator: ValidatorId) -> Balance {
        self.accumulated_reward_per_token
            .get(&validator)
            .copied()
            .unwrap_or(0)
    }

    pub fn received_stake_of(&self, validator: ValidatorId) -> Balance {
        self.received_stake.get(&validator).copied().unwrap_or(0)
    }

    pub fn originated_fee_of(&self, validator: ValidatorId) -> Balance {
        self.accumulated_originated_txs_fee
            .get(&validator)
            .copied()
            .unwrap_or(0)
    }

    pub fn uptime_of(&self, validator: ValidatorId) -> Timestamp {
        self.accumulated_uptime.get(&validator).copied().unwrap_or(0)
    }
}

/// Epochs gardées dans la forme sérialisée du journal: la dernière scellée et l'ouverte
pub const SERIALIZED_EPOCHS: usize = 2;

/// Journal des snapshots, indexé par numéro d'epoch
///
/// Contient toujours l'epoch scellée courante et l'epoch ouverte qui la suit.
/// Seules ces deux epochs sont sérialisées; l'historique est archivé epoch par
/// epoch par le stockage et réinjecté avec `restore`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotStore {
    #[serde(serialize_with = "serialize_recent")]
    snapshots: BTreeMap<EpochNumber, EpochSnapshot>,
}

fn serialize_recent<S: serde::Serializer>(
    snapshots: &BTreeMap<EpochNumber, EpochSnapshot>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let recent: BTreeMap<EpochNumber, &EpochSnapshot> = snapshots
        .iter()
        .rev()
        .take(SERIALIZED_EPOCHS)
        .map(|(epoch, snapshot)| (*epoch, snapshot))
        .collect();
    recent.serialize(serializer)
}

impl SnapshotStore {
    /// Journal initial: epoch 0 scellée à `genesis_time`, epoch 1 ouverte
    pub fn new(genesis_time: Timestamp) -> Self {
        let mut snapshots = BTreeMap::new();
        let genesis = EpochSnapshot {
            end_time: genesis_time,
            ..EpochSnapshot::default()
        };
        snapshots.insert(0, genesis);
        snapshots.insert(1, EpochSnapshot::new());
        Self { snapshots }
    }

    pub fn get(&self, epoch: EpochNumber) -> Option<&EpochSnapshot> {
        self.snapshots.get(&epoch)
    }

    /// Snapshot de l'epoch ouverte (seule modifiable)
    pub fn open_mut(&mut self, open_epoch: EpochNumber) -> &mut EpochSnapshot {
        self.snapshots.entry(open_epoch).or_default()
    }

    /// Remplace l'epoch ouverte par sa version scellée et ouvre la suivante
    pub fn seal(&mut self, epoch: EpochNumber, sealed: EpochSnapshot) {
        self.snapshots.insert(epoch, sealed);
        self.snapshots.insert(epoch + 1, EpochSnapshot::new());
    }

    /// Fin de l'epoch, 0 si inconnue
    pub fn end_time(&self, epoch: EpochNumber) -> Timestamp {
        self.snapshots.get(&epoch).map(|s| s.end_time).unwrap_or(0)
    }

    /// Taux cumulé de récompense par token d'un validateur à une epoch
    pub fn reward_per_token(&self, epoch: EpochNumber, validator: ValidatorId) -> Balance {
        self.snapshots
            .get(&epoch)
            .map(|s| s.reward_per_token(validator))
            .unwrap_or(0)
    }

    /// Réinjecte un snapshot archivé; une epoch déjà présente est conservée
    pub fn restore(&mut self, epoch: EpochNumber, snapshot: EpochSnapshot) {
        self.snapshots.entry(epoch).or_insert(snapshot);
    }

    /// Snapshots scellés à partir de `from`, l'epoch ouverte exclue
    pub fn sealed_since(&self, from: EpochNumber, sealed: EpochNumber) -> impl Iterator<Item = (EpochNumber, &EpochSnapshot)> {
        self.snapshots
            .range(from..)
            .take_while(move |(epoch, _)| **epoch <= sealed)
            .map(|(epoch, snapshot)| (*epoch, snapshot))
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }
}
