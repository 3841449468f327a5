//! Protocol Constants
//!
//! Scales, parameter bounds and defaults for the liquid staking pool.
//! Values are scaled integers; nothing in the accounting path uses floats.

/// Value scale shared by the underlying asset and receipts
pub mod token {
    /// One whole unit (1.0) in base units
    pub const DECIMAL_UNIT: u128 = 1_000_000_000_000_000_000;
}

/// Percentage parameters (rate, stake ratio, reward ratio)
pub mod percent {
    /// Denominator of every percentage parameter
    pub const PERCENT_PRECISION: u64 = 100;

    /// Upper bound of the stake ratio (everything delegated, no buffer)
    pub const MAX_STAKE_RATIO: u64 = 100;

    /// Upper bound of the reward ratio (holder keeps all yield)
    pub const MAX_REWARD_RATIO: u64 = 100;
}

/// Defaults used when building a configuration from scratch
pub mod defaults {
    /// Receipts minted per 100 units of principal
    pub const RATE: u64 = 30;

    /// Share of each deposit forwarded to the validator
    pub const STAKE_RATIO: u64 = 90;

    /// Share of accrued yield paid to the holder
    pub const REWARD_RATIO: u64 = 75;

    /// Outstanding undelegation requests allowed per holder
    pub const WITHDRAWAL_REQUEST_LIMIT: usize = 1;
}

/// Withdrawal queue
pub mod queue {
    /// First request id handed out for a validator
    pub const FIRST_REQUEST_ID: u64 = 0;

    /// How far past the next unused id a queue hint may point
    pub const MAX_REQUEST_ID_SKIP: u64 = 1 << 32;

    /// Hard ceiling on the configurable per-holder request limit
    pub const MAX_WITHDRAWAL_REQUEST_LIMIT: usize = 64;
}

pub use defaults::WITHDRAWAL_REQUEST_LIMIT as DEFAULT_WITHDRAWAL_REQUEST_LIMIT;
pub use percent::PERCENT_PRECISION;
pub use token::DECIMAL_UNIT;
