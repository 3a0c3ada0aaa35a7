// Contracts - Ledger de staking embarqué
// Principe: Chaque appel réussit entièrement ou ne change rien

pub mod staking;
pub mod delegation;
pub mod rewards;
pub mod lockup;
pub mod withdrawal;

pub use delegation::{Delegation, DelegationKey, LockedDelegation, Penalty};
pub use rewards::{scale_lockup_reward, Rewards};
pub use staking::{GenesisValidatorRecord, LedgerEvent, LedgerState, StakingError, StakingLedger};
pub use withdrawal::{slashing_penalty, WithdrawalRequest};
