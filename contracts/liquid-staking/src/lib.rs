//! Liquid Staking Pool
//!
//! Pools holders' value, delegates most of it to one validator and issues
//! fixed-rate receipts in exchange. A withdrawal owes the redeemed
//! principal plus the holder's reward payout; local funds cover what they
//! can and any shortfall becomes a queued undelegation.
//!
//! ## Operation Shape
//!
//! Every operation stages its state changes against copies, makes at most
//! one side-effecting call into the [`DelegationAdapter`], and commits only
//! after that call succeeds:
//!
//! ```text
//! validate → settle (oracle reads) → plan → adapter call → commit + events
//! ```
//!
//! A failed operation leaves [`LiquidStaking::state_digest`] unchanged.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use liquid_staking_common::{
    access_control::AdminCapability,
    errors::{StakingError, StakingResult},
    events::{EventLog, StakingEvent},
    ledger::{SettlementContext, StakeLedger},
    math::{
        pro_rata, principal_for_receipts, receipts_for_principal, safe_add, safe_sub,
        split_deposit, split_reward,
    },
    oracle::{DelegationAdapter, RewardOracle},
    receipts::ReceiptSupply,
    types::{
        validate_rate, validate_reward_ratio, validate_stake_ratio, Address, Amount, Epoch,
        PoolConfig, PoolParameters, PoolTotals, RequestId, RequestKey, StakePosition,
        ValidatorId, WithdrawalRequest,
    },
    withdrawal_queue::WithdrawalQueue,
};

#[cfg(any(test, feature = "testutils"))]
pub mod testing;

// ============ Operation Outcomes ============

/// Result of a stake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct StakeOutcome {
    /// Receipts minted to the holder
    pub receipts: Amount,
    /// Part of the deposit kept as liquidity
    pub buffered: Amount,
    /// Part of the deposit forwarded to the validator
    pub delegated: Amount,
}

/// Undelegation issued for a withdrawal shortfall
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct QueuedUnstake {
    pub validator_id: ValidatorId,
    pub request_id: RequestId,
    pub amount: Amount,
}

/// Result of a withdrawal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct WithdrawOutcome {
    pub receipts_burned: Amount,
    /// Principal redeemed
    pub value: Amount,
    /// Paid from stashed reserves (reward payout only)
    pub from_reserves: Amount,
    /// Paid from the liquidity buffer
    pub from_buffer: Amount,
    /// Holder's share of the stored rewards released
    pub reward_payout: Amount,
    /// Protocol's share of the stored rewards released
    pub protocol_share: Amount,
    pub queued: Option<QueuedUnstake>,
}

impl WithdrawOutcome {
    /// Value owed to the holder, paid now or through the queue
    pub fn owed(&self) -> Amount {
        self.value.saturating_add(self.reward_payout)
    }

    /// Value transferred to the holder right away
    pub fn transferred(&self) -> Amount {
        self.from_reserves.saturating_add(self.from_buffer)
    }
}

// ============ Engine ============

/// The pool: ledger, receipts, queue and totals behind one `&mut self` API
#[derive(Debug)]
pub struct LiquidStaking<O, D> {
    admin: AdminCapability,
    pool_address: Address,
    parameters: PoolParameters,
    ledger: StakeLedger,
    receipts: ReceiptSupply,
    queue: WithdrawalQueue,
    totals: PoolTotals,
    events: EventLog,
    oracle: O,
    delegation: D,
}

impl<O: RewardOracle, D: DelegationAdapter> LiquidStaking<O, D> {
    /// Build a pool from a validated configuration
    pub fn new(config: PoolConfig, oracle: O, delegation: D) -> StakingResult<Self> {
        config.validate()?;

        info!(
            validator_id = config.parameters.validator_id,
            rate = config.parameters.rate,
            stake_ratio = config.parameters.stake_ratio,
            reward_ratio = config.parameters.reward_ratio,
            "liquid staking pool initialized"
        );

        Ok(Self {
            admin: AdminCapability::new(config.admin),
            pool_address: config.pool_address,
            parameters: config.parameters,
            ledger: StakeLedger::new(),
            receipts: ReceiptSupply::new(),
            queue: WithdrawalQueue::new(config.withdrawal_request_limit),
            totals: PoolTotals::default(),
            events: EventLog::new(),
            oracle,
            delegation,
        })
    }

    // ============ Holder Operations ============

    /// Deposit `amount` and mint receipts at the current rate
    pub fn stake(&mut self, holder: Address, amount: Amount) -> StakingResult<StakeOutcome> {
        // 1. Amount must be positive
        if amount == 0 {
            return Err(StakingError::ZeroAmount);
        }

        // 2. Settle the holder and credit the principal
        let epoch = self.sealed_epoch()?;
        let ctx = self.settlement_context(epoch);
        let settled = self.ledger.settled(&holder, &self.oracle, &ctx)?;
        let mut position = settled.position;
        position.principal = safe_add(position.principal, amount)?;

        // 3. Plan the mint and the buffer/delegate split
        let receipts = receipts_for_principal(amount, self.parameters.rate)?;
        let mint = self.receipts.plan_mint(&holder, receipts)?;
        let (buffered, delegated) = split_deposit(amount, self.parameters.stake_ratio)?;

        let mut totals = self.totals;
        totals.accrued_rewards = safe_add(totals.accrued_rewards, settled.accrued)?;
        totals.liquidity = safe_add(totals.liquidity, buffered)?;
        totals.delegated = safe_add(totals.delegated, delegated)?;
        totals.total_staked = safe_add(totals.total_staked, amount)?;

        // 4. Forward the delegated part
        if delegated > 0 {
            let validator_id = self.parameters.validator_id;
            self.delegation
                .delegate(validator_id, delegated)
                .map_err(|err| {
                    warn!(validator_id, amount = %delegated, error = %err, "stake aborted");
                    err
                })?;
        }

        // 5. Commit
        self.ledger.commit(holder, position);
        self.receipts.apply(mint);
        self.totals = totals;
        self.events.emit(StakingEvent::Staked {
            holder,
            amount,
            receipts,
            epoch,
        });

        info!(
            holder = %short_address(&holder),
            amount = %amount,
            receipts = %receipts,
            buffered = %buffered,
            epoch,
            "stake accepted"
        );

        Ok(StakeOutcome {
            receipts,
            buffered,
            delegated,
        })
    }

    /// Burn `receipt_amount` receipts and pay out their value
    ///
    /// The holder is owed the redeemed principal plus their share of the
    /// stored rewards released pro rata. Reserves pay the reward payout
    /// first, then the liquidity buffer pays what is left. The rest is
    /// undelegated under a new request; `queue_hint` lists request ids the
    /// caller would like used, the first usable one wins.
    pub fn withdraw(
        &mut self,
        holder: Address,
        receipt_amount: Amount,
        queue_hint: &[RequestId],
    ) -> StakingResult<WithdrawOutcome> {
        // 1. Amount must be positive and covered by the balance
        if receipt_amount == 0 {
            return Err(StakingError::ZeroAmount);
        }
        let balance_before = self.receipts.balance_of(&holder);
        let burn = self.receipts.plan_burn(&holder, receipt_amount)?;

        // 2. Settle the holder
        let epoch = self.sealed_epoch()?;
        let ctx = self.settlement_context(epoch);
        let settled = self.ledger.settled(&holder, &self.oracle, &ctx)?;
        let mut position = settled.position;

        // 3. Value redeemed, capped at the holder's principal
        let value =
            principal_for_receipts(receipt_amount, self.parameters.rate)?.min(position.principal);
        position.principal = safe_sub(position.principal, value)?;

        // 4. Stored rewards
        let reward_portion = pro_rata(position.stored_rewards, receipt_amount, balance_before)?
            .min(position.stored_rewards);
        let (reward_payout, protocol_share) =
            split_reward(reward_portion, self.parameters.reward_ratio)?;
        position.stored_rewards = safe_sub(position.stored_rewards, reward_portion)?;

        // 5. Local funds: reserves for the payout, then the buffer
        let owed = safe_add(value, reward_payout)?;
        let from_reserves = reward_payout.min(self.totals.reserves);
        let from_buffer = safe_sub(owed, from_reserves)?.min(self.totals.liquidity);
        let remaining = owed - from_reserves - from_buffer;

        let mut totals = self.totals;
        totals.accrued_rewards = safe_add(totals.accrued_rewards, settled.accrued)?;
        totals.reserves = safe_sub(totals.reserves, from_reserves)?;
        totals.liquidity = safe_sub(totals.liquidity, from_buffer)?;
        totals.principal_paid = safe_add(totals.principal_paid, value)?;
        totals.rewards_paid = safe_add(totals.rewards_paid, reward_payout)?;
        totals.protocol_fees = safe_add(totals.protocol_fees, protocol_share)?;

        // 6. Queue the shortfall against a staged queue; the cap is checked
        //    before anything moves
        let mut staged_queue = None;
        let queued = if remaining > 0 {
            self.queue.ensure_capacity(&holder)?;
            let mut queue = self.queue.clone();

            let validator_id = self.parameters.validator_id;
            let request_id = queue.choose_request_id(validator_id, queue_hint)?;
            queue.enqueue(WithdrawalRequest {
                validator_id,
                request_id,
                holder,
                amount: remaining,
                created_epoch: epoch,
            })?;

            // Delegated principal is drawn first, then rewards earned on it
            let from_delegated = remaining.min(totals.delegated);
            totals.delegated -= from_delegated;
            totals.accrued_rewards = safe_sub(totals.accrued_rewards, remaining - from_delegated)?;
            totals.pending_undelegation = safe_add(totals.pending_undelegation, remaining)?;

            self.delegation
                .undelegate(validator_id, request_id, remaining)
                .map_err(|err| {
                    warn!(
                        validator_id,
                        request_id,
                        amount = %remaining,
                        error = %err,
                        "withdrawal aborted"
                    );
                    err
                })?;

            staged_queue = Some(queue);
            Some(QueuedUnstake {
                validator_id,
                request_id,
                amount: remaining,
            })
        } else {
            None
        };

        // 7. Commit
        self.receipts.apply(burn);
        self.ledger.commit(holder, position);
        self.totals = totals;
        if let Some(queue) = staged_queue {
            self.queue = queue;
        }

        let outcome = WithdrawOutcome {
            receipts_burned: receipt_amount,
            value,
            from_reserves,
            from_buffer,
            reward_payout,
            protocol_share,
            queued,
        };

        self.events.emit(StakingEvent::WithdrawalCompleted {
            holder,
            amount: owed,
            epoch,
        });
        if let Some(unstake) = queued {
            self.events.emit(StakingEvent::UnstakeQueued {
                validator_id: unstake.validator_id,
                request_id: unstake.request_id,
                amount: unstake.amount,
                epoch,
            });
        }

        info!(
            holder = %short_address(&holder),
            receipts = %receipt_amount,
            owed = %owed,
            paid = %outcome.transferred(),
            queued = %remaining,
            epoch,
            "withdrawal processed"
        );

        Ok(outcome)
    }

    /// Move receipts and the principal behind them from `from` to `to`
    ///
    /// Returns the principal moved. Stored rewards stay with their owner.
    pub fn transfer(&mut self, from: Address, to: Address, receipt_amount: Amount) -> StakingResult<Amount> {
        if receipt_amount == 0 {
            return Err(StakingError::ZeroAmount);
        }
        let balance_before = self.receipts.balance_of(&from);
        let update = self.receipts.plan_transfer(&from, &to, receipt_amount)?;

        let epoch = self.sealed_epoch()?;
        let ctx = self.settlement_context(epoch);
        let sender_settled = self.ledger.settled(&from, &self.oracle, &ctx)?;
        let recipient_settled = self.ledger.settled(&to, &self.oracle, &ctx)?;
        let mut sender = sender_settled.position;
        let mut recipient = recipient_settled.position;

        let moved = pro_rata(sender.principal, receipt_amount, balance_before)?;
        sender.principal = safe_sub(sender.principal, moved)?;
        recipient.principal = safe_add(recipient.principal, moved)?;

        let accrued = safe_add(sender_settled.accrued, recipient_settled.accrued)?;
        let accrued_rewards = safe_add(self.totals.accrued_rewards, accrued)?;

        self.receipts.apply(update);
        self.ledger.commit(from, sender);
        self.ledger.commit(to, recipient);
        self.totals.accrued_rewards = accrued_rewards;
        self.events.emit(StakingEvent::ReceiptsTransferred {
            from,
            to,
            amount: receipt_amount,
            principal: moved,
            epoch,
        });

        info!(
            from = %short_address(&from),
            to = %short_address(&to),
            receipts = %receipt_amount,
            principal = %moved,
            "receipts transferred"
        );

        Ok(moved)
    }

    /// Add plain value to the liquidity buffer
    pub fn deposit_liquidity(&mut self, from: Address, amount: Amount) -> StakingResult<()> {
        if amount == 0 {
            return Err(StakingError::ZeroAmount);
        }
        let epoch = self.sealed_epoch()?;
        let liquidity = safe_add(self.totals.liquidity, amount)?;

        self.totals.liquidity = liquidity;
        self.events
            .emit(StakingEvent::LiquidityDeposited { from, amount, epoch });

        info!(from = %short_address(&from), amount = %amount, liquidity = %liquidity, "liquidity deposited");
        Ok(())
    }

    /// Realize a matured undelegation and release the holder's queue slot
    ///
    /// Returns the amount the subsystem paid out.
    pub fn finalize_withdrawal(
        &mut self,
        holder: Address,
        validator_id: ValidatorId,
        request_id: RequestId,
    ) -> StakingResult<Amount> {
        let key = RequestKey::new(validator_id, request_id);
        let (owner, owed) = match self.queue.get(&key) {
            Some(request) => (request.holder, request.amount),
            None => {
                return Err(StakingError::WithdrawalRequestNotFound {
                    validator_id,
                    request_id,
                })
            }
        };
        if owner != holder {
            return Err(StakingError::Unauthorized {
                expected: owner,
                actual: holder,
            });
        }

        let epoch = self.sealed_epoch()?;
        let pending = safe_sub(self.totals.pending_undelegation, owed)?;

        let realized = self
            .delegation
            .withdraw_undelegated(validator_id, request_id)
            .map_err(|err| {
                warn!(validator_id, request_id, error = %err, "finalization refused");
                err
            })?;

        self.queue.remove(&key);
        self.totals.pending_undelegation = pending;
        self.events.emit(StakingEvent::WithdrawalFinalized {
            holder,
            validator_id,
            request_id,
            amount: realized,
            epoch,
        });

        info!(
            holder = %short_address(&holder),
            validator_id,
            request_id,
            amount = %realized,
            "withdrawal finalized"
        );

        Ok(realized)
    }

    // ============ Admin Operations ============

    pub fn set_rate(&mut self, caller: Address, new_rate: u64) -> StakingResult<()> {
        self.admin.ensure_admin(&caller)?;
        validate_rate(new_rate)?;
        let epoch = self.sealed_epoch()?;

        let old = std::mem::replace(&mut self.parameters.rate, new_rate);
        self.events.emit(StakingEvent::RateChanged {
            old,
            new: new_rate,
            epoch,
        });
        info!(old, new = new_rate, "rate changed");
        Ok(())
    }

    pub fn set_stake_ratio(&mut self, caller: Address, new_ratio: u64) -> StakingResult<()> {
        self.admin.ensure_admin(&caller)?;
        validate_stake_ratio(new_ratio)?;
        let epoch = self.sealed_epoch()?;

        let old = std::mem::replace(&mut self.parameters.stake_ratio, new_ratio);
        self.events.emit(StakingEvent::StakeRatioChanged {
            old,
            new: new_ratio,
            epoch,
        });
        info!(old, new = new_ratio, "stake ratio changed");
        Ok(())
    }

    pub fn set_reward_ratio(&mut self, caller: Address, new_ratio: u64) -> StakingResult<()> {
        self.admin.ensure_admin(&caller)?;
        validate_reward_ratio(new_ratio)?;
        let epoch = self.sealed_epoch()?;

        let old = std::mem::replace(&mut self.parameters.reward_ratio, new_ratio);
        self.events.emit(StakingEvent::RewardRatioChanged {
            old,
            new: new_ratio,
            epoch,
        });
        info!(old, new = new_ratio, "reward ratio changed");
        Ok(())
    }

    /// Rotate the delegation target
    ///
    /// Rewards stashed for the outgoing validator are claimed into the
    /// reserves on a best-effort basis; a claim that fails or yields
    /// nothing is recorded as `StashClaimFailed` and the rotation proceeds.
    pub fn set_validator_id(&mut self, caller: Address, new_validator: ValidatorId) -> StakingResult<()> {
        // 1. Only the admin rotates
        self.admin.ensure_admin(&caller)?;

        // 2. Target must differ and be active
        let old = self.parameters.validator_id;
        if new_validator == old {
            return Err(StakingError::SameValidator {
                validator_id: new_validator,
            });
        }
        if !self.oracle.is_validator_active(new_validator)? {
            return Err(StakingError::InactiveValidator {
                validator_id: new_validator,
            });
        }
        let epoch = self.sealed_epoch()?;

        // 3. Best-effort stash claim for the outgoing validator
        match self.delegation.claim_stashed_rewards(&self.pool_address, old) {
            Ok(amount) if amount > 0 => {
                self.totals.reserves = self.totals.reserves.saturating_add(amount);
                self.events.emit(StakingEvent::RewardsStashed {
                    validator_id: old,
                    amount,
                    epoch,
                });
                info!(validator_id = old, amount = %amount, "stashed rewards claimed");
            }
            Ok(_) => {
                warn!(validator_id = old, "stash claim yielded nothing");
                self.events.emit(StakingEvent::StashClaimFailed {
                    validator_id: old,
                    epoch,
                });
            }
            Err(err) => {
                warn!(validator_id = old, error = %err, "stash claim failed");
                self.events.emit(StakingEvent::StashClaimFailed {
                    validator_id: old,
                    epoch,
                });
            }
        }

        // 4. Rotate
        self.parameters.validator_id = new_validator;
        self.events.emit(StakingEvent::ValidatorChanged {
            old,
            new: new_validator,
            epoch,
        });
        info!(old, new = new_validator, "validator changed");
        Ok(())
    }

    /// Hand the admin capability to `new_admin`
    pub fn set_admin(&mut self, caller: Address, new_admin: Address) -> StakingResult<()> {
        self.admin.ensure_admin(&caller)?;
        let epoch = self.sealed_epoch()?;
        let old = self.admin.transfer(&caller, new_admin)?;

        self.events.emit(StakingEvent::AdminChanged {
            old,
            new: new_admin,
            epoch,
        });
        info!(old = %short_address(&old), new = %short_address(&new_admin), "admin changed");
        Ok(())
    }

    // ============ Queries ============

    /// `(liquidity, principal, rewards)` the holder could draw on now
    ///
    /// Rewards include what settlement at the current epoch would add.
    /// Nothing is committed.
    pub fn available_withdrawal_amount(&self, holder: &Address) -> StakingResult<(Amount, Amount, Amount)> {
        let epoch = self.sealed_epoch()?;
        let ctx = self.settlement_context(epoch);
        let position = self.ledger.settled(holder, &self.oracle, &ctx)?.position;
        Ok((self.totals.liquidity, position.principal, position.stored_rewards))
    }

    /// `(last_accrual_epoch, principal, stored_rewards)` as last committed
    pub fn user_stake(&self, holder: &Address) -> (Epoch, Amount, Amount) {
        self.ledger.position(holder).as_tuple()
    }

    pub fn position(&self, holder: &Address) -> StakePosition {
        self.ledger.position(holder)
    }

    pub fn receipt_balance_of(&self, holder: &Address) -> Amount {
        self.receipts.balance_of(holder)
    }

    pub fn total_supply(&self) -> Amount {
        self.receipts.total_supply()
    }

    /// Sum of principal over all holders
    pub fn total_principal(&self) -> Amount {
        self.ledger.total_principal()
    }

    /// Amount owed under a pending request
    pub fn withdrawal_request(&self, validator_id: ValidatorId, request_id: RequestId) -> Option<Amount> {
        self.queue.amount(validator_id, request_id)
    }

    pub fn outstanding_requests(&self, holder: &Address) -> &[RequestKey] {
        self.queue.outstanding(holder)
    }

    pub fn parameters(&self) -> &PoolParameters {
        &self.parameters
    }

    pub fn totals(&self) -> &PoolTotals {
        &self.totals
    }

    pub fn admin(&self) -> Address {
        self.admin.admin()
    }

    pub fn pool_address(&self) -> Address {
        self.pool_address
    }

    pub fn events(&self) -> &[StakingEvent] {
        self.events.events()
    }

    pub fn take_events(&mut self) -> Vec<StakingEvent> {
        self.events.take()
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn oracle_mut(&mut self) -> &mut O {
        &mut self.oracle
    }

    pub fn delegation(&self) -> &D {
        &self.delegation
    }

    pub fn delegation_mut(&mut self) -> &mut D {
        &mut self.delegation
    }

    /// SHA-256 over the Borsh encoding of all accounting state
    pub fn state_digest(&self) -> StakingResult<[u8; 32]> {
        let mut hasher = Sha256::new();
        hash_part(&mut hasher, &self.admin)?;
        hash_part(&mut hasher, &self.parameters)?;
        hash_part(&mut hasher, &self.ledger)?;
        hash_part(&mut hasher, &self.receipts)?;
        hash_part(&mut hasher, &self.queue)?;
        hash_part(&mut hasher, &self.totals)?;

        let mut digest = [0u8; 32];
        digest.copy_from_slice(&hasher.finalize());
        Ok(digest)
    }

    // ============ Helpers ============

    fn sealed_epoch(&self) -> StakingResult<Epoch> {
        Ok(self.oracle.current_sealed_epoch()?)
    }

    fn settlement_context(&self, current_epoch: Epoch) -> SettlementContext {
        SettlementContext {
            current_epoch,
            validator_id: self.parameters.validator_id,
            stake_ratio: self.parameters.stake_ratio,
            unlocked_ratio: self.oracle.unlocked_reward_ratio(),
        }
    }
}

fn hash_part<T: BorshSerialize>(hasher: &mut Sha256, part: &T) -> StakingResult<()> {
    let bytes = borsh::to_vec(part).map_err(|err| StakingError::Encoding(err.to_string()))?;
    hasher.update(bytes);
    Ok(())
}

/// First four bytes of an address, hex encoded, for log fields
fn short_address(address: &Address) -> String {
    address[..4].iter().map(|b| format!("{b:02x}")).collect()
}
