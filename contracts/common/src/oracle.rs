//! Staking Subsystem Boundary
//!
//! The pool never holds subsystem state. It reads epochs and reward
//! indices through [`RewardOracle`] and moves value through
//! [`DelegationAdapter`]. Fallible calls return `ExternalResult`, leaving
//! the caller to decide whether a failure aborts the operation.

use crate::errors::ExternalResult;
use crate::types::{Address, Amount, Epoch, RequestId, ValidatorId};

/// Read-only view of the staking subsystem
pub trait RewardOracle {
    /// Last sealed epoch
    fn current_sealed_epoch(&self) -> ExternalResult<Epoch>;

    /// Reward accumulated per `DECIMAL_UNIT` delegated to `validator_id`,
    /// as of `epoch`. Non-decreasing in `epoch`.
    fn accumulated_reward_per_share(
        &self,
        epoch: Epoch,
        validator_id: ValidatorId,
    ) -> ExternalResult<Amount>;

    /// Share of rewards that is unlocked, scaled by `DECIMAL_UNIT`
    fn unlocked_reward_ratio(&self) -> Amount;

    /// Whether `validator_id` accepts delegations
    fn is_validator_active(&self, validator_id: ValidatorId) -> ExternalResult<bool>;
}

/// Side-effecting calls into the staking subsystem
pub trait DelegationAdapter {
    /// Delegate `amount` to `validator_id`
    fn delegate(&mut self, validator_id: ValidatorId, amount: Amount) -> ExternalResult<()>;

    /// Start undelegating `amount` under `request_id`
    fn undelegate(
        &mut self,
        validator_id: ValidatorId,
        request_id: RequestId,
        amount: Amount,
    ) -> ExternalResult<()>;

    /// Pull rewards the subsystem holds for `owner` on `validator_id` into
    /// the pool. Returns the amount claimed.
    fn claim_stashed_rewards(
        &mut self,
        owner: &Address,
        validator_id: ValidatorId,
    ) -> ExternalResult<Amount>;

    /// Realize a matured undelegation. Fails while it is still unbonding.
    fn withdraw_undelegated(
        &mut self,
        validator_id: ValidatorId,
        request_id: RequestId,
    ) -> ExternalResult<Amount>;
}

/// Reward-per-share growth of `validator_id` between two epochs
///
/// A decreasing index is treated as no growth.
pub fn reward_per_share_delta<O: RewardOracle + ?Sized>(
    oracle: &O,
    validator_id: ValidatorId,
    from_epoch: Epoch,
    to_epoch: Epoch,
) -> ExternalResult<Amount> {
    let current = oracle.accumulated_reward_per_share(to_epoch, validator_id)?;
    let previous = oracle.accumulated_reward_per_share(from_epoch, validator_id)?;
    Ok(current.saturating_sub(previous))
}
