// Genesis - Configuration initiale du ledger
pub mod config;

pub use config::{GenesisConfig, GenesisDelegation, GenesisError, GenesisLockup, GenesisValidator};
