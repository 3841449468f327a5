//! Pool Events
//!
//! Notifications emitted by committed operations. Each event records the
//! sealed epoch it was emitted at so indexers can order them.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::types::{Address, Amount, Epoch, RequestId, ValidatorId};

/// Event types for indexing and filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
#[borsh(use_discriminant = true)]
#[repr(u8)]
pub enum EventType {
    // Parameter Events (0x01 - 0x1F)
    RateChanged = 0x01,
    StakeRatioChanged = 0x02,
    RewardRatioChanged = 0x03,
    ValidatorChanged = 0x04,
    StashClaimFailed = 0x05,
    RewardsStashed = 0x06,
    AdminChanged = 0x07,

    // Holder Events (0x20 - 0x3F)
    Staked = 0x20,
    WithdrawalCompleted = 0x21,
    UnstakeQueued = 0x22,
    WithdrawalFinalized = 0x23,
    ReceiptsTransferred = 0x24,

    // Liquidity Events (0x40 - 0x5F)
    LiquidityDeposited = 0x40,
}

/// Main event enum containing all pool events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum StakingEvent {
    // ============ Parameter Events ============

    /// Conversion rate changed
    RateChanged { old: u64, new: u64, epoch: Epoch },

    /// Stake ratio changed
    StakeRatioChanged { old: u64, new: u64, epoch: Epoch },

    /// Reward ratio changed
    RewardRatioChanged { old: u64, new: u64, epoch: Epoch },

    /// Delegation target rotated
    ValidatorChanged {
        old: ValidatorId,
        new: ValidatorId,
        epoch: Epoch,
    },

    /// Stash claim for the previous validator yielded nothing or failed
    StashClaimFailed {
        validator_id: ValidatorId,
        epoch: Epoch,
    },

    /// Stash claim credited the pool reserves
    RewardsStashed {
        validator_id: ValidatorId,
        amount: Amount,
        epoch: Epoch,
    },

    /// Admin capability handed over
    AdminChanged {
        old: Address,
        new: Address,
        epoch: Epoch,
    },

    // ============ Holder Events ============

    /// Deposit accepted and receipts minted
    Staked {
        holder: Address,
        amount: Amount,
        receipts: Amount,
        epoch: Epoch,
    },

    /// Value paid to a holder on withdrawal (buffer part plus reward payout)
    WithdrawalCompleted {
        holder: Address,
        amount: Amount,
        epoch: Epoch,
    },

    /// Shortfall queued for undelegation
    UnstakeQueued {
        validator_id: ValidatorId,
        request_id: RequestId,
        amount: Amount,
        epoch: Epoch,
    },

    /// Matured undelegation realized and paid to its holder
    WithdrawalFinalized {
        holder: Address,
        validator_id: ValidatorId,
        request_id: RequestId,
        amount: Amount,
        epoch: Epoch,
    },

    /// Receipts and the principal behind them moved between holders
    ReceiptsTransferred {
        from: Address,
        to: Address,
        amount: Amount,
        principal: Amount,
        epoch: Epoch,
    },

    // ============ Liquidity Events ============

    /// Plain value added to the liquidity buffer
    LiquidityDeposited {
        from: Address,
        amount: Amount,
        epoch: Epoch,
    },
}

impl StakingEvent {
    /// Get the event type for filtering
    pub fn event_type(&self) -> EventType {
        match self {
            Self::RateChanged { .. } => EventType::RateChanged,
            Self::StakeRatioChanged { .. } => EventType::StakeRatioChanged,
            Self::RewardRatioChanged { .. } => EventType::RewardRatioChanged,
            Self::ValidatorChanged { .. } => EventType::ValidatorChanged,
            Self::StashClaimFailed { .. } => EventType::StashClaimFailed,
            Self::RewardsStashed { .. } => EventType::RewardsStashed,
            Self::AdminChanged { .. } => EventType::AdminChanged,
            Self::Staked { .. } => EventType::Staked,
            Self::WithdrawalCompleted { .. } => EventType::WithdrawalCompleted,
            Self::UnstakeQueued { .. } => EventType::UnstakeQueued,
            Self::WithdrawalFinalized { .. } => EventType::WithdrawalFinalized,
            Self::ReceiptsTransferred { .. } => EventType::ReceiptsTransferred,
            Self::LiquidityDeposited { .. } => EventType::LiquidityDeposited,
        }
    }

    /// Sealed epoch the event was emitted at
    pub fn epoch(&self) -> Epoch {
        match self {
            Self::RateChanged { epoch, .. }
            | Self::StakeRatioChanged { epoch, .. }
            | Self::RewardRatioChanged { epoch, .. }
            | Self::ValidatorChanged { epoch, .. }
            | Self::StashClaimFailed { epoch, .. }
            | Self::RewardsStashed { epoch, .. }
            | Self::AdminChanged { epoch, .. }
            | Self::Staked { epoch, .. }
            | Self::WithdrawalCompleted { epoch, .. }
            | Self::UnstakeQueued { epoch, .. }
            | Self::WithdrawalFinalized { epoch, .. }
            | Self::ReceiptsTransferred { epoch, .. }
            | Self::LiquidityDeposited { epoch, .. } => *epoch,
        }
    }

    /// Serialize event to bytes for storage/transmission
    pub fn to_bytes(&self) -> std::io::Result<Vec<u8>> {
        borsh::to_vec(self)
    }

    /// Deserialize event from bytes
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        borsh::from_slice(bytes).ok()
    }
}

/// Event log collecting events across operations
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<StakingEvent>,
}

impl EventLog {
    /// Create a new empty event log
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Emit an event (add to log)
    pub fn emit(&mut self, event: StakingEvent) {
        self.events.push(event);
    }

    /// Get all events
    pub fn events(&self) -> &[StakingEvent] {
        &self.events
    }

    /// Drain all events, leaving the log empty
    pub fn take(&mut self) -> Vec<StakingEvent> {
        std::mem::take(&mut self.events)
    }

    /// Filter events by type
    pub fn filter_by_type(&self, event_type: EventType) -> Vec<&StakingEvent> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// Check if any events were emitted
    pub fn has_events(&self) -> bool {
        !self.events.is_empty()
    }

    /// Get number of events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type() {
        let event = StakingEvent::UnstakeQueued {
            validator_id: 1,
            request_id: 0,
            amount: 900,
            epoch: 4,
        };

        assert_eq!(event.event_type(), EventType::UnstakeQueued);
        assert_eq!(event.epoch(), 4);
    }

    #[test]
    fn test_event_serialization() {
        let event = StakingEvent::ReceiptsTransferred {
            from: [1u8; 32],
            to: [2u8; 32],
            amount: 210_000_000_000_000_000,
            principal: 700_000_000_000_000_000,
            epoch: 5,
        };

        let restored = StakingEvent::from_bytes(&event.to_bytes().unwrap()).unwrap();
        assert_eq!(event, restored);
    }

    #[test]
    fn test_event_log() {
        let mut log = EventLog::new();

        log.emit(StakingEvent::Staked {
            holder: [2u8; 32],
            amount: 100,
            receipts: 30,
            epoch: 1,
        });
        log.emit(StakingEvent::WithdrawalCompleted {
            holder: [2u8; 32],
            amount: 100,
            epoch: 2,
        });

        assert_eq!(log.len(), 2);
        assert!(log.has_events());
        assert_eq!(log.filter_by_type(EventType::Staked).len(), 1);

        let drained = log.take();
        assert_eq!(drained.len(), 2);
        assert!(log.is_empty());
    }
}
