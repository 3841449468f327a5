//! Stake Ledger
//!
//! Per-holder principal, stored rewards and the epoch accrual was last
//! settled at. Settlement is lazy: a holder's yield is pulled from the
//! reward oracle the next time one of their operations touches the ledger.
//!
//! ## Settlement
//!
//! ```text
//! delta     = rps(current_epoch) - rps(last_accrual_epoch)
//! delegated = principal * stake_ratio / 100
//! gross     = delegated * delta / DECIMAL_UNIT
//! accrued   = gross * unlocked_ratio / DECIMAL_UNIT
//! ```
//!
//! Reads never mutate: [`StakeLedger::settled`] returns the settled copy and
//! the engine commits it once the whole operation is known to succeed.

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::StakingResult;
use crate::math::{accrued_rewards, safe_add};
use crate::oracle::{reward_per_share_delta, RewardOracle};
use crate::types::{Address, Amount, Epoch, StakePosition, ValidatorId};

/// Inputs that stay fixed for every settlement inside one operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlementContext {
    pub current_epoch: Epoch,
    pub validator_id: ValidatorId,
    pub stake_ratio: u64,
    pub unlocked_ratio: Amount,
}

/// Outcome of settling one position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settled {
    pub position: StakePosition,
    /// Rewards added by this settlement
    pub accrued: Amount,
}

/// Settle `position` up to `ctx.current_epoch`
pub fn settle_position<O: RewardOracle + ?Sized>(
    position: &StakePosition,
    oracle: &O,
    ctx: &SettlementContext,
) -> StakingResult<Settled> {
    let mut settled = *position;

    if position.principal == 0 || position.last_accrual_epoch == ctx.current_epoch {
        settled.last_accrual_epoch = ctx.current_epoch;
        return Ok(Settled {
            position: settled,
            accrued: 0,
        });
    }

    let delta = reward_per_share_delta(
        oracle,
        ctx.validator_id,
        position.last_accrual_epoch,
        ctx.current_epoch,
    )?;
    let accrued = accrued_rewards(position.principal, delta, ctx.stake_ratio, ctx.unlocked_ratio)?;

    settled.stored_rewards = safe_add(settled.stored_rewards, accrued)?;
    settled.last_accrual_epoch = ctx.current_epoch;

    debug!(
        from_epoch = position.last_accrual_epoch,
        to_epoch = ctx.current_epoch,
        principal = %position.principal,
        delta = %delta,
        accrued = %accrued,
        "settled stake position"
    );

    Ok(Settled {
        position: settled,
        accrued,
    })
}

/// Positions keyed by holder
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct StakeLedger {
    positions: BTreeMap<Address, StakePosition>,
}

impl StakeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Position of `holder`; an unknown holder reads as all zero
    pub fn position(&self, holder: &Address) -> StakePosition {
        self.positions.get(holder).copied().unwrap_or_default()
    }

    pub fn contains(&self, holder: &Address) -> bool {
        self.positions.contains_key(holder)
    }

    /// Settled copy of `holder`'s position, not committed
    pub fn settled<O: RewardOracle + ?Sized>(
        &self,
        holder: &Address,
        oracle: &O,
        ctx: &SettlementContext,
    ) -> StakingResult<Settled> {
        settle_position(&self.position(holder), oracle, ctx)
    }

    /// Store `position` for `holder`, creating the entry on first touch
    pub fn commit(&mut self, holder: Address, position: StakePosition) {
        self.positions.insert(holder, position);
    }

    /// Sum of principal across all holders
    pub fn total_principal(&self) -> Amount {
        self.positions.values().map(|p| p.principal).sum()
    }

    /// Sum of unpaid rewards across all holders
    pub fn total_stored_rewards(&self) -> Amount {
        self.positions.values().map(|p| p.stored_rewards).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Address, &StakePosition)> {
        self.positions.iter()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}
