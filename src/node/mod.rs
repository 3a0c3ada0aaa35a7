// Node - Driver d'epochs local
pub mod driver;

pub use driver::{EpochDriver, LocalDriver, SealReport};
