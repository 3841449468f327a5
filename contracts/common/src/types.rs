//! Core Types for the Liquid Staking Pool
//!
//! Ledger records, queue entries and the admin-mutable configuration
//! shared by the common library and the accounting engine.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::constants::{defaults, percent, queue};
use crate::errors::{StakingError, StakingResult};

/// Type alias for holder identities (32-byte hash)
pub type Address = [u8; 32];

/// Validator identifier in the staking subsystem
pub type ValidatorId = u64;

/// Sealed epoch index
pub type Epoch = u64;

/// Undelegation request identifier, monotonic per validator
pub type RequestId = u64;

/// Scaled value (see `constants::token::DECIMAL_UNIT`)
pub type Amount = u128;

// ============ Ledger Types ============

/// Per-holder accounting state
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct StakePosition {
    /// Underlying value attributed to the holder
    pub principal: Amount,
    /// Accrued, unpaid yield
    pub stored_rewards: Amount,
    /// Epoch at which accrual was last settled
    pub last_accrual_epoch: Epoch,
}

impl StakePosition {
    /// `(last_accrual_epoch, principal, stored_rewards)`
    pub fn as_tuple(&self) -> (Epoch, Amount, Amount) {
        (self.last_accrual_epoch, self.principal, self.stored_rewards)
    }
}

// ============ Withdrawal Queue Types ============

/// Queue key: a request id is only unique within its validator
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    BorshSerialize,
    BorshDeserialize,
)]
pub struct RequestKey {
    pub validator_id: ValidatorId,
    pub request_id: RequestId,
}

impl RequestKey {
    pub fn new(validator_id: ValidatorId, request_id: RequestId) -> Self {
        Self {
            validator_id,
            request_id,
        }
    }
}

/// Value owed to the pool by a pending undelegation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct WithdrawalRequest {
    pub validator_id: ValidatorId,
    pub request_id: RequestId,
    /// Holder the undelegated value belongs to
    pub holder: Address,
    pub amount: Amount,
    /// Epoch the request was queued at
    pub created_epoch: Epoch,
}

impl WithdrawalRequest {
    pub fn key(&self) -> RequestKey {
        RequestKey::new(self.validator_id, self.request_id)
    }
}

// ============ Parameter Store ============

/// Admin-mutable parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct PoolParameters {
    /// Receipts minted per 100 units of principal
    pub rate: u64,
    /// Percent of each deposit delegated; the rest stays as liquidity
    pub stake_ratio: u64,
    /// Percent of accrued yield paid to the holder
    pub reward_ratio: u64,
    /// Current delegation target
    pub validator_id: ValidatorId,
}

impl PoolParameters {
    pub fn validate(&self) -> StakingResult<()> {
        validate_rate(self.rate)?;
        validate_stake_ratio(self.stake_ratio)?;
        validate_reward_ratio(self.reward_ratio)?;
        Ok(())
    }
}

/// Check a conversion rate
pub fn validate_rate(rate: u64) -> StakingResult<()> {
    if rate == 0 {
        return Err(StakingError::InvalidParameter {
            param: "rate",
            reason: "must be greater than 0",
        });
    }
    Ok(())
}

/// Check a stake ratio
pub fn validate_stake_ratio(stake_ratio: u64) -> StakingResult<()> {
    if stake_ratio == 0 {
        return Err(StakingError::InvalidParameter {
            param: "stake_ratio",
            reason: "must be greater than 0",
        });
    }
    if stake_ratio > percent::MAX_STAKE_RATIO {
        return Err(StakingError::InvalidParameter {
            param: "stake_ratio",
            reason: "must not exceed 100",
        });
    }
    Ok(())
}

/// Check a reward ratio
pub fn validate_reward_ratio(reward_ratio: u64) -> StakingResult<()> {
    if reward_ratio > percent::MAX_REWARD_RATIO {
        return Err(StakingError::InvalidParameter {
            param: "reward_ratio",
            reason: "must not exceed 100",
        });
    }
    Ok(())
}

/// Construction-time configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct PoolConfig {
    /// Holder of the admin capability
    pub admin: Address,
    /// Identity the pool uses towards the staking subsystem
    pub pool_address: Address,
    pub parameters: PoolParameters,
    /// Outstanding undelegation requests allowed per holder
    pub withdrawal_request_limit: usize,
}

impl PoolConfig {
    /// Configuration with default parameters
    pub fn new(admin: Address, pool_address: Address, validator_id: ValidatorId) -> Self {
        Self {
            admin,
            pool_address,
            parameters: PoolParameters {
                rate: defaults::RATE,
                stake_ratio: defaults::STAKE_RATIO,
                reward_ratio: defaults::REWARD_RATIO,
                validator_id,
            },
            withdrawal_request_limit: defaults::WITHDRAWAL_REQUEST_LIMIT,
        }
    }

    pub fn with_rate(mut self, rate: u64) -> Self {
        self.parameters.rate = rate;
        self
    }

    pub fn with_stake_ratio(mut self, stake_ratio: u64) -> Self {
        self.parameters.stake_ratio = stake_ratio;
        self
    }

    pub fn with_reward_ratio(mut self, reward_ratio: u64) -> Self {
        self.parameters.reward_ratio = reward_ratio;
        self
    }

    pub fn with_withdrawal_request_limit(mut self, limit: usize) -> Self {
        self.withdrawal_request_limit = limit;
        self
    }

    /// Validate all fields
    pub fn validate(&self) -> StakingResult<()> {
        self.parameters.validate()?;

        if self.withdrawal_request_limit == 0 {
            return Err(StakingError::InvalidParameter {
                param: "withdrawal_request_limit",
                reason: "must be greater than 0",
            });
        }
        if self.withdrawal_request_limit > queue::MAX_WITHDRAWAL_REQUEST_LIMIT {
            return Err(StakingError::InvalidParameter {
                param: "withdrawal_request_limit",
                reason: "exceeds maximum",
            });
        }
        if self.admin == [0u8; 32] {
            return Err(StakingError::InvalidParameter {
                param: "admin",
                reason: "cannot be the zero address",
            });
        }
        Ok(())
    }
}

// ============ Pool Totals ============

/// Aggregate value held or owed by the pool
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct PoolTotals {
    /// Liquid value held locally
    pub liquidity: Amount,
    /// Value currently delegated to validators
    pub delegated: Amount,
    /// Value requested back through undelegation and not yet finalized
    pub pending_undelegation: Amount,
    /// Rewards stashed into the pool during validator rotation
    pub reserves: Amount,
    /// Unlocked rewards credited by settlement and still held at the validator
    pub accrued_rewards: Amount,
    /// Reward share retained by the protocol
    pub protocol_fees: Amount,
    /// Principal ever staked
    pub total_staked: Amount,
    /// Principal redeemed by withdrawals, paid now or queued
    pub principal_paid: Amount,
    /// Reward share paid to holders
    pub rewards_paid: Amount,
}

impl PoolTotals {
    /// Principal still attributed to holders
    pub fn outstanding_principal(&self) -> Amount {
        self.total_staked.saturating_sub(self.principal_paid)
    }
}
