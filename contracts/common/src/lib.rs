//! Liquid Staking Common Library
//!
//! Shared types, constants, and accounting primitives for the liquid
//! staking pool. The engine crate composes these into the pool itself.
//!
//! ## Building Blocks
//!
//! - **Stake Ledger**: per-holder principal and lazily settled rewards
//! - **Receipt Supply**: transferable receipts minted at a configurable rate
//! - **Withdrawal Queue**: capped undelegation requests, monotonic ids per validator
//! - **Staking Boundary**: `RewardOracle` and `DelegationAdapter` traits
//! - **Access Control**: single admin capability
//! - **Events**: notifications emitted by committed operations
//!
//! All values are scaled integers (`DECIMAL_UNIT` = 1.0) and every
//! division truncates toward zero.

pub mod constants;
pub mod errors;
pub mod types;
pub mod math;
pub mod events;
pub mod access_control;
pub mod oracle;
pub mod ledger;
pub mod receipts;
pub mod withdrawal_queue;


// Re-exports for convenience
pub use constants::*;
pub use errors::*;
pub use types::*;
pub use math::*;
pub use events::*;
pub use access_control::*;
pub use oracle::*;
pub use ledger::*;
pub use receipts::*;
pub use withdrawal_queue::*;
