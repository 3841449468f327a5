//! In-memory stand-ins for the staking subsystem
//!
//! `MockOracle` seals epochs and grows a reward index per validator;
//! `MockDelegation` records accepted calls and can be told to refuse any of
//! them. Both are available to downstream crates with the `testutils`
//! feature.

use std::collections::{BTreeMap, BTreeSet};

use liquid_staking_common::{
    constants::DECIMAL_UNIT,
    errors::{ExternalCall, ExternalCallError, ExternalResult},
    oracle::{DelegationAdapter, RewardOracle},
    types::{Address, Amount, Epoch, RequestId, ValidatorId},
};

/// Unlocked reward ratio reported by default (0.3)
pub const DEFAULT_UNLOCKED_RATIO: Amount = DECIMAL_UNIT * 3 / 10;

// ============ Reward Oracle ============

#[derive(Debug, Clone)]
pub struct MockOracle {
    epoch: Epoch,
    /// Reward index recorded at each sealed epoch
    index: BTreeMap<(ValidatorId, Epoch), Amount>,
    /// Index growth applied to a validator on every seal
    growth: BTreeMap<ValidatorId, Amount>,
    active: BTreeSet<ValidatorId>,
    unlocked_ratio: Amount,
    pub fail_epoch: bool,
    pub fail_reward_per_share: bool,
    pub fail_activity: bool,
}

impl MockOracle {
    /// Oracle at epoch 1 with `validators` active and no growth
    pub fn new(validators: &[ValidatorId]) -> Self {
        Self {
            epoch: 1,
            index: BTreeMap::new(),
            growth: BTreeMap::new(),
            active: validators.iter().copied().collect(),
            unlocked_ratio: DEFAULT_UNLOCKED_RATIO,
            fail_epoch: false,
            fail_reward_per_share: false,
            fail_activity: false,
        }
    }

    /// Grow `validator_id`'s index by `per_epoch` on every seal
    pub fn with_growth(mut self, validator_id: ValidatorId, per_epoch: Amount) -> Self {
        self.growth.insert(validator_id, per_epoch);
        self
    }

    pub fn with_unlocked_ratio(mut self, ratio: Amount) -> Self {
        self.unlocked_ratio = ratio;
        self
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// Advance one epoch, growing every configured validator's index
    pub fn seal_epoch(&mut self) -> Epoch {
        let previous = self.epoch;
        self.epoch += 1;
        let growth: Vec<_> = self.growth.iter().map(|(v, g)| (*v, *g)).collect();
        for (validator_id, per_epoch) in growth {
            let base = self.index_at(validator_id, previous);
            self.index.insert((validator_id, self.epoch), base + per_epoch);
        }
        self.epoch
    }

    pub fn seal_epochs(&mut self, count: u64) -> Epoch {
        for _ in 0..count {
            self.seal_epoch();
        }
        self.epoch
    }

    /// Pin the index of `validator_id` at `epoch`
    pub fn set_reward_per_share(&mut self, validator_id: ValidatorId, epoch: Epoch, value: Amount) {
        self.index.insert((validator_id, epoch), value);
    }

    pub fn set_active(&mut self, validator_id: ValidatorId, active: bool) {
        if active {
            self.active.insert(validator_id);
        } else {
            self.active.remove(&validator_id);
        }
    }

    /// Latest recorded index at or before `epoch`
    fn index_at(&self, validator_id: ValidatorId, epoch: Epoch) -> Amount {
        self.index
            .range((validator_id, 0)..=(validator_id, epoch))
            .next_back()
            .map(|(_, value)| *value)
            .unwrap_or(0)
    }
}

impl RewardOracle for MockOracle {
    fn current_sealed_epoch(&self) -> ExternalResult<Epoch> {
        if self.fail_epoch {
            return Err(ExternalCallError::new(ExternalCall::CurrentSealedEpoch, "oracle offline"));
        }
        Ok(self.epoch)
    }

    fn accumulated_reward_per_share(
        &self,
        epoch: Epoch,
        validator_id: ValidatorId,
    ) -> ExternalResult<Amount> {
        if self.fail_reward_per_share {
            return Err(ExternalCallError::new(
                ExternalCall::AccumulatedRewardPerShare,
                "oracle offline",
            ));
        }
        Ok(self.index_at(validator_id, epoch))
    }

    fn unlocked_reward_ratio(&self) -> Amount {
        self.unlocked_ratio
    }

    fn is_validator_active(&self, validator_id: ValidatorId) -> ExternalResult<bool> {
        if self.fail_activity {
            return Err(ExternalCallError::new(ExternalCall::IsValidatorActive, "oracle offline"));
        }
        Ok(self.active.contains(&validator_id))
    }
}

// ============ Delegation Adapter ============

/// A call the mock accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DelegationCall {
    Delegate {
        validator_id: ValidatorId,
        amount: Amount,
    },
    Undelegate {
        validator_id: ValidatorId,
        request_id: RequestId,
        amount: Amount,
    },
    ClaimStashedRewards {
        owner: Address,
        validator_id: ValidatorId,
        amount: Amount,
    },
    WithdrawUndelegated {
        validator_id: ValidatorId,
        request_id: RequestId,
        amount: Amount,
    },
}

#[derive(Debug, Clone, Default)]
pub struct MockDelegation {
    pub calls: Vec<DelegationCall>,
    delegated: BTreeMap<ValidatorId, Amount>,
    unbonding: BTreeMap<(ValidatorId, RequestId), Amount>,
    matured: BTreeSet<(ValidatorId, RequestId)>,
    stash: BTreeMap<ValidatorId, Amount>,
    pub fail_delegate: bool,
    pub fail_undelegate: bool,
    pub fail_claim: bool,
}

impl MockDelegation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value currently delegated to `validator_id`
    pub fn delegated_to(&self, validator_id: ValidatorId) -> Amount {
        self.delegated.get(&validator_id).copied().unwrap_or(0)
    }

    /// Value unbonding under `(validator_id, request_id)`
    pub fn unbonding(&self, validator_id: ValidatorId, request_id: RequestId) -> Option<Amount> {
        self.unbonding.get(&(validator_id, request_id)).copied()
    }

    /// Rewards the next claim on `validator_id` will yield
    pub fn set_stash(&mut self, validator_id: ValidatorId, amount: Amount) {
        self.stash.insert(validator_id, amount);
    }

    /// Let `(validator_id, request_id)` be withdrawn
    pub fn mature(&mut self, validator_id: ValidatorId, request_id: RequestId) {
        self.matured.insert((validator_id, request_id));
    }
}

impl DelegationAdapter for MockDelegation {
    fn delegate(&mut self, validator_id: ValidatorId, amount: Amount) -> ExternalResult<()> {
        if self.fail_delegate {
            return Err(ExternalCallError::new(ExternalCall::Delegate, "delegation refused"));
        }
        *self.delegated.entry(validator_id).or_insert(0) += amount;
        self.calls.push(DelegationCall::Delegate { validator_id, amount });
        Ok(())
    }

    fn undelegate(
        &mut self,
        validator_id: ValidatorId,
        request_id: RequestId,
        amount: Amount,
    ) -> ExternalResult<()> {
        if self.fail_undelegate {
            return Err(ExternalCallError::new(ExternalCall::Undelegate, "undelegation refused"));
        }
        if self.unbonding.contains_key(&(validator_id, request_id)) {
            return Err(ExternalCallError::new(ExternalCall::Undelegate, "request id in use"));
        }
        let delegated = self.delegated.entry(validator_id).or_insert(0);
        *delegated = delegated.saturating_sub(amount);
        self.unbonding.insert((validator_id, request_id), amount);
        self.calls.push(DelegationCall::Undelegate {
            validator_id,
            request_id,
            amount,
        });
        Ok(())
    }

    fn claim_stashed_rewards(
        &mut self,
        owner: &Address,
        validator_id: ValidatorId,
    ) -> ExternalResult<Amount> {
        if self.fail_claim {
            return Err(ExternalCallError::new(ExternalCall::ClaimStashedRewards, "nothing to claim"));
        }
        let amount = self.stash.remove(&validator_id).unwrap_or(0);
        self.calls.push(DelegationCall::ClaimStashedRewards {
            owner: *owner,
            validator_id,
            amount,
        });
        Ok(amount)
    }

    fn withdraw_undelegated(
        &mut self,
        validator_id: ValidatorId,
        request_id: RequestId,
    ) -> ExternalResult<Amount> {
        let key = (validator_id, request_id);
        if !self.matured.contains(&key) {
            return Err(ExternalCallError::new(ExternalCall::WithdrawUndelegated, "still unbonding"));
        }
        let amount = self.unbonding.remove(&key).ok_or_else(|| {
            ExternalCallError::new(ExternalCall::WithdrawUndelegated, "unknown request")
        })?;
        self.matured.remove(&key);
        self.calls.push(DelegationCall::WithdrawUndelegated {
            validator_id,
            request_id,
            amount,
        });
        Ok(amount)
    }
}
