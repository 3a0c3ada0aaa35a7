// Types fondamentaux du ledger
// Principe: Minimal, auditable, déterministe

pub mod primitives;
pub mod decimal;
pub mod account;

pub use primitives::*;
pub use decimal::*;
pub use account::*;
