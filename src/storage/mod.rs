// Storage - Persistance RocksDB du ledger
// Principe: Une sauvegarde par epoch scellée, écrite atomiquement

pub mod db;
pub mod state;

pub use db::{Database, DatabaseError, WriteOp};
pub use state::{LedgerStore, StoreError};
