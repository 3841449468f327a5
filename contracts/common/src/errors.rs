//! Error Types for the Liquid Staking Pool
//!
//! Every failing operation returns one of these and leaves the pool
//! untouched. `kind()` groups variants into the categories callers act on.

use thiserror::Error;

use crate::types::{Address, Amount, RequestId, ValidatorId};

/// Result type alias for pool operations
pub type StakingResult<T> = Result<T, StakingError>;

/// Result type alias for calls into the external staking subsystem
pub type ExternalResult<T> = Result<T, ExternalCallError>;

/// Main error enum for the pool
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StakingError {
    // ============ Validation Errors ============
    /// Zero amount not allowed
    #[error("amount must be greater than 0")]
    ZeroAmount,

    /// Parameter outside its allowed range
    #[error("invalid {param}: {reason}")]
    InvalidParameter {
        param: &'static str,
        reason: &'static str,
    },

    /// Rotation target equals the current validator
    #[error("new validator must be different from the old one (validator {validator_id})")]
    SameValidator { validator_id: ValidatorId },

    /// Rotation target is not active in the staking subsystem
    #[error("new validator {validator_id} is inactive")]
    InactiveValidator { validator_id: ValidatorId },

    /// Sender and recipient are the same holder
    #[error("cannot transfer receipts to self")]
    SelfTransfer,

    /// No queued request under this key
    #[error("withdrawal request {request_id} for validator {validator_id} not found")]
    WithdrawalRequestNotFound {
        validator_id: ValidatorId,
        request_id: RequestId,
    },

    /// A request is already queued under this key
    #[error("withdrawal request {request_id} for validator {validator_id} already queued")]
    DuplicateWithdrawalRequest {
        validator_id: ValidatorId,
        request_id: RequestId,
    },

    // ============ Authorization Errors ============
    /// Caller does not hold the required capability
    #[error("unauthorized caller")]
    Unauthorized { expected: Address, actual: Address },

    // ============ Balance Errors ============
    /// Receipt balance too small for the burn or transfer
    #[error("insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance { available: Amount, requested: Amount },

    // ============ Limit Errors ============
    /// Holder already has the maximum number of outstanding requests
    #[error("withdrawal request limit reached ({outstanding}/{limit})")]
    WithdrawalLimitReached { outstanding: usize, limit: usize },

    /// No request id left for this validator
    #[error("request ids exhausted for validator {validator_id}")]
    RequestIdsExhausted { validator_id: ValidatorId },

    // ============ External Errors ============
    /// Call into the staking subsystem failed
    #[error(transparent)]
    ExternalCall(#[from] ExternalCallError),

    // ============ Math Errors ============
    /// Arithmetic overflow occurred
    #[error("arithmetic overflow")]
    Overflow,

    /// Arithmetic underflow occurred
    #[error("arithmetic underflow")]
    Underflow,

    /// Division by zero
    #[error("division by zero")]
    DivisionByZero,

    // ============ Internal Errors ============
    /// State could not be Borsh encoded
    #[error("state encoding failed: {0}")]
    Encoding(String),
}

/// Error categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input or parameter; nothing changed
    Validation,
    /// Caller lacks the admin capability or does not own the resource
    Authorization,
    /// Not enough receipts
    InsufficientBalance,
    /// Per-holder withdrawal cap reached
    LimitExceeded,
    /// Staking subsystem refused or was unreachable
    ExternalCallFailure,
    /// Checked math failed
    Arithmetic,
    /// Encoding of pool state failed
    Internal,
}

impl StakingError {
    /// Returns a stable error code for logging
    pub fn code(&self) -> &'static str {
        match self {
            Self::ZeroAmount => "E001_ZERO_AMOUNT",
            Self::InvalidParameter { .. } => "E002_INVALID_PARAM",
            Self::SameValidator { .. } => "E003_SAME_VALIDATOR",
            Self::InactiveValidator { .. } => "E004_INACTIVE_VALIDATOR",
            Self::SelfTransfer => "E005_SELF_TRANSFER",
            Self::WithdrawalRequestNotFound { .. } => "E006_REQUEST_NOT_FOUND",
            Self::DuplicateWithdrawalRequest { .. } => "E007_DUPLICATE_REQUEST",
            Self::Unauthorized { .. } => "E020_UNAUTHORIZED",
            Self::InsufficientBalance { .. } => "E030_INSUFFICIENT_BALANCE",
            Self::WithdrawalLimitReached { .. } => "E040_REQUEST_LIMIT",
            Self::RequestIdsExhausted { .. } => "E041_REQUEST_IDS_EXHAUSTED",
            Self::ExternalCall(_) => "E050_EXTERNAL_CALL",
            Self::Overflow => "E080_OVERFLOW",
            Self::Underflow => "E081_UNDERFLOW",
            Self::DivisionByZero => "E082_DIV_ZERO",
            Self::Encoding(_) => "E090_ENCODING",
        }
    }

    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ZeroAmount
            | Self::InvalidParameter { .. }
            | Self::SameValidator { .. }
            | Self::InactiveValidator { .. }
            | Self::SelfTransfer
            | Self::WithdrawalRequestNotFound { .. }
            | Self::DuplicateWithdrawalRequest { .. } => ErrorKind::Validation,
            Self::Unauthorized { .. } => ErrorKind::Authorization,
            Self::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            Self::WithdrawalLimitReached { .. } | Self::RequestIdsExhausted { .. } => {
                ErrorKind::LimitExceeded
            }
            Self::ExternalCall(_) => ErrorKind::ExternalCallFailure,
            Self::Overflow | Self::Underflow | Self::DivisionByZero => ErrorKind::Arithmetic,
            Self::Encoding(_) => ErrorKind::Internal,
        }
    }

    /// Returns true if the caller can retry after changing something on their side
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InsufficientBalance { .. }
                | Self::WithdrawalLimitReached { .. }
                | Self::ExternalCall(_)
        )
    }
}

/// Staking subsystem entry points, used to label failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalCall {
    CurrentSealedEpoch,
    AccumulatedRewardPerShare,
    IsValidatorActive,
    Delegate,
    Undelegate,
    ClaimStashedRewards,
    WithdrawUndelegated,
}

impl ExternalCall {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CurrentSealedEpoch => "currentSealedEpoch",
            Self::AccumulatedRewardPerShare => "accumulatedRewardPerShare",
            Self::IsValidatorActive => "isValidatorActive",
            Self::Delegate => "delegate",
            Self::Undelegate => "undelegate",
            Self::ClaimStashedRewards => "claimStashedRewards",
            Self::WithdrawUndelegated => "withdrawUndelegated",
        }
    }
}

/// Failure reported by the staking subsystem
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("external call {} failed: {reason}", .call.name())]
pub struct ExternalCallError {
    pub call: ExternalCall,
    pub reason: String,
}

impl ExternalCallError {
    pub fn new(call: ExternalCall, reason: impl Into<String>) -> Self {
        Self {
            call,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_error_codes_unique() {
        let errors = [
            StakingError::ZeroAmount,
            StakingError::InvalidParameter { param: "rate", reason: "must be greater than 0" },
            StakingError::SameValidator { validator_id: 1 },
            StakingError::InactiveValidator { validator_id: 9 },
            StakingError::SelfTransfer,
            StakingError::WithdrawalRequestNotFound { validator_id: 1, request_id: 0 },
            StakingError::DuplicateWithdrawalRequest { validator_id: 1, request_id: 0 },
            StakingError::Unauthorized { expected: [1u8; 32], actual: [2u8; 32] },
            StakingError::InsufficientBalance { available: 1, requested: 2 },
            StakingError::WithdrawalLimitReached { outstanding: 1, limit: 1 },
            StakingError::RequestIdsExhausted { validator_id: 1 },
            StakingError::ExternalCall(ExternalCallError::new(ExternalCall::Delegate, "down")),
            StakingError::Overflow,
            StakingError::Underflow,
            StakingError::DivisionByZero,
            StakingError::Encoding("io".into()),
        ];

        let codes: Vec<_> = errors.iter().map(|e| e.code()).collect();
        let unique: BTreeSet<_> = codes.iter().collect();
        assert_eq!(codes.len(), unique.len(), "Error codes must be unique");
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(StakingError::ZeroAmount.kind(), ErrorKind::Validation);
        assert_eq!(
            StakingError::InactiveValidator { validator_id: 3 }.kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            StakingError::WithdrawalLimitReached { outstanding: 1, limit: 1 }.kind(),
            ErrorKind::LimitExceeded
        );

        let external: StakingError =
            ExternalCallError::new(ExternalCall::Undelegate, "rejected").into();
        assert_eq!(external.kind(), ErrorKind::ExternalCallFailure);
        assert!(external.is_recoverable());
    }

    #[test]
    fn test_messages() {
        let err = StakingError::WithdrawalLimitReached { outstanding: 1, limit: 1 };
        assert!(err.to_string().contains("withdrawal request limit reached"));

        let err: StakingError = ExternalCallError::new(ExternalCall::Delegate, "paused").into();
        assert_eq!(err.to_string(), "external call delegate failed: paused");
    }
}
