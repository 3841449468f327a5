//! Mathematical Utilities for the Liquid Staking Pool
//!
//! Checked scaled-integer arithmetic. Every helper multiplies before it
//! divides and truncates toward zero; the step order inside
//! [`accrued_rewards`] is fixed because it changes the last unit.
//!
//! Products of two scaled amounts exceed `u128` past roughly 18 whole
//! units, so [`mul_div`] widens to 256 bits when the narrow product
//! overflows. Only the final quotient has to fit an `Amount`.

#![allow(clippy::assign_op_pattern)]
#![allow(clippy::manual_range_contains)]

use uint::construct_uint;

use crate::constants::{percent::PERCENT_PRECISION, token::DECIMAL_UNIT};
use crate::errors::{StakingError, StakingResult};
use crate::types::Amount;

construct_uint! {
    /// 256-bit unsigned integer for intermediate products
    pub struct U256(4);
}

/// `floor(a * b / denominator)` with overflow and zero checks
pub fn mul_div(a: Amount, b: Amount, denominator: Amount) -> StakingResult<Amount> {
    if denominator == 0 {
        return Err(StakingError::DivisionByZero);
    }
    if let Some(product) = a.checked_mul(b) {
        return Ok(product / denominator);
    }

    let quotient = U256::from(a) * U256::from(b) / U256::from(denominator);
    if quotient > U256::from(Amount::MAX) {
        return Err(StakingError::Overflow);
    }
    Ok(quotient.as_u128())
}

/// `floor(amount * pct / 100)`
pub fn percent_of(amount: Amount, pct: u64) -> StakingResult<Amount> {
    mul_div(amount, pct as Amount, PERCENT_PRECISION as Amount)
}

/// Receipts minted for a deposit
///
/// receipts = principal * rate / 100
pub fn receipts_for_principal(principal: Amount, rate: u64) -> StakingResult<Amount> {
    percent_of(principal, rate)
}

/// Underlying value redeemed by burning receipts
///
/// value = receipts * 100 / rate
pub fn principal_for_receipts(receipts: Amount, rate: u64) -> StakingResult<Amount> {
    mul_div(receipts, PERCENT_PRECISION as Amount, rate as Amount)
}

/// Split a deposit into `(buffer, delegated)`
///
/// The buffer is floored; the delegated part takes the remainder so the
/// two always sum to `amount`.
pub fn split_deposit(amount: Amount, stake_ratio: u64) -> StakingResult<(Amount, Amount)> {
    let buffer_ratio = PERCENT_PRECISION
        .checked_sub(stake_ratio)
        .ok_or(StakingError::Underflow)?;
    let buffer = percent_of(amount, buffer_ratio)?;
    Ok((buffer, amount - buffer))
}

/// Yield accrued by `principal` over a reward-per-share delta
///
/// 1. delegated = principal * stake_ratio / 100
/// 2. gross     = delegated * delta / DECIMAL_UNIT
/// 3. accrued   = gross * unlocked_ratio / DECIMAL_UNIT
pub fn accrued_rewards(
    principal: Amount,
    reward_per_share_delta: Amount,
    stake_ratio: u64,
    unlocked_ratio: Amount,
) -> StakingResult<Amount> {
    if principal == 0 || reward_per_share_delta == 0 {
        return Ok(0);
    }
    let delegated = percent_of(principal, stake_ratio)?;
    let gross = mul_div(delegated, reward_per_share_delta, DECIMAL_UNIT)?;
    mul_div(gross, unlocked_ratio, DECIMAL_UNIT)
}

/// `floor(total * part / whole)`, used for pro-rata shares of a balance
pub fn pro_rata(total: Amount, part: Amount, whole: Amount) -> StakingResult<Amount> {
    mul_div(total, part, whole)
}

/// Split a reward portion into `(holder_payout, protocol_share)`
///
/// The protocol share is the remainder, so nothing is lost to rounding.
pub fn split_reward(reward_portion: Amount, reward_ratio: u64) -> StakingResult<(Amount, Amount)> {
    let payout = percent_of(reward_portion, reward_ratio)?;
    Ok((payout, reward_portion - payout))
}

/// Safe addition with overflow check
pub fn safe_add(a: Amount, b: Amount) -> StakingResult<Amount> {
    a.checked_add(b).ok_or(StakingError::Overflow)
}

/// Safe subtraction with underflow check
pub fn safe_sub(a: Amount, b: Amount) -> StakingResult<Amount> {
    a.checked_sub(b).ok_or(StakingError::Underflow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    const ONE: Amount = DECIMAL_UNIT;

    #[test_case(ONE, 30 => 300_000_000_000_000_000 ; "one unit at rate 30")]
    #[test_case(7, 30 => 2 ; "floors small amounts")]
    #[test_case(ONE, 100 => ONE ; "rate 100 is one to one")]
    #[test_case(3, 250 => 7 ; "rate above 100")]
    fn test_receipts_for_principal(principal: Amount, rate: u64) -> Amount {
        receipts_for_principal(principal, rate).unwrap()
    }

    #[test]
    fn test_principal_for_receipts_inverts_mint() {
        let receipts = receipts_for_principal(ONE, 30).unwrap();
        assert_eq!(principal_for_receipts(receipts, 30).unwrap(), ONE);

        // 2 receipts at rate 30 → 6.66.. floored
        assert_eq!(principal_for_receipts(2, 30).unwrap(), 6);
    }

    #[test]
    fn test_mul_div_widens_large_products() {
        // 400 * 120 / 300 overflows u128 at 18 decimals before the division
        assert_eq!(mul_div(400 * ONE, 120 * ONE, 300 * ONE).unwrap(), 160 * ONE);
        assert_eq!(mul_div(Amount::MAX, 2, 2).unwrap(), Amount::MAX);
        assert_eq!(mul_div(Amount::MAX, 2, 1), Err(StakingError::Overflow));
    }

    #[test]
    fn test_principal_for_receipts_zero_rate() {
        assert_eq!(principal_for_receipts(1, 0), Err(StakingError::DivisionByZero));
    }

    #[test]
    fn test_split_deposit() {
        let (buffer, delegated) = split_deposit(ONE, 90).unwrap();
        assert_eq!(buffer, ONE / 10);
        assert_eq!(delegated, ONE * 9 / 10);

        // Remainder always goes to the delegated side
        let (buffer, delegated) = split_deposit(15, 90).unwrap();
        assert_eq!((buffer, delegated), (1, 14));

        let (buffer, delegated) = split_deposit(ONE, 100).unwrap();
        assert_eq!((buffer, delegated), (0, ONE));
    }

    #[test]
    fn test_split_deposit_rejects_ratio_above_100() {
        assert_eq!(split_deposit(ONE, 101), Err(StakingError::Underflow));
    }

    #[test]
    fn test_accrued_rewards_for_one_unit() {
        // delta of 0.5 per share, 90% delegated, 30% unlocked
        let delta = ONE / 2;
        let unlocked = ONE * 3 / 10;
        let accrued = accrued_rewards(ONE, delta, 90, unlocked).unwrap();

        let expected = (delta * 9 / 10) * unlocked / ONE;
        assert_eq!(accrued, expected);
        assert_eq!(accrued, 135_000_000_000_000_000);
    }

    #[test]
    fn test_accrued_rewards_step_order() {
        // principal 3, ratio 50: step 1 floors to 1 before the delta applies
        let accrued = accrued_rewards(3, 10 * ONE, 50, ONE).unwrap();
        assert_eq!(accrued, 10);
    }

    #[test]
    fn test_accrued_rewards_zero_inputs() {
        assert_eq!(accrued_rewards(0, ONE, 90, ONE).unwrap(), 0);
        assert_eq!(accrued_rewards(ONE, 0, 90, ONE).unwrap(), 0);
    }

    #[test]
    fn test_accrued_rewards_overflow() {
        assert_eq!(
            accrued_rewards(Amount::MAX, Amount::MAX, 100, ONE),
            Err(StakingError::Overflow)
        );
    }

    #[test]
    fn test_split_reward_conserves() {
        let (payout, retained) = split_reward(1_001, 75).unwrap();
        assert_eq!(payout, 750);
        assert_eq!(retained, 251);
        assert_eq!(payout + retained, 1_001);
    }

    #[test]
    fn test_pro_rata() {
        assert_eq!(pro_rata(1_000, 1, 3).unwrap(), 333);
        assert_eq!(pro_rata(1_000, 3, 3).unwrap(), 1_000);
        assert_eq!(pro_rata(1_000, 1, 0), Err(StakingError::DivisionByZero));
    }

    #[test]
    fn test_safe_ops() {
        assert_eq!(safe_add(1, 2).unwrap(), 3);
        assert_eq!(safe_add(Amount::MAX, 1), Err(StakingError::Overflow));
        assert_eq!(safe_sub(1, 2), Err(StakingError::Underflow));
    }
}
