// Consensus - Paramètres, validateurs et scellement des epochs
// Principe: Le driver fournit les métriques, le ledger les règle

pub mod params;
pub mod validator;
pub mod snapshot;
pub mod gas_price;
pub mod uptime;
pub mod sealing;
