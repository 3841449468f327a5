//! Receipt Supply
//!
//! Per-holder receipt balances and the total issued. Every change is
//! planned first ([`SupplyUpdate`]) and applied later, so the engine can
//! abort between the two without leaving a partial balance change behind.
//!
//! Invariant: the sum of all balances equals `total_supply`.

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::errors::{StakingError, StakingResult};
use crate::math::{safe_add, safe_sub};
use crate::types::{Address, Amount};

/// Balance changes computed against a supply snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a planned update does nothing until applied"]
pub struct SupplyUpdate {
    balances: Vec<(Address, Amount)>,
    total_supply: Amount,
    total_minted: Amount,
    total_burned: Amount,
}

impl SupplyUpdate {
    /// New balance of `holder` after the update, if it is touched
    pub fn balance_after(&self, holder: &Address) -> Option<Amount> {
        self.balances
            .iter()
            .find(|(addr, _)| addr == holder)
            .map(|(_, balance)| *balance)
    }

    pub fn total_supply_after(&self) -> Amount {
        self.total_supply
    }
}

/// Receipt balances and supply counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct ReceiptSupply {
    balances: BTreeMap<Address, Amount>,
    total_supply: Amount,
    /// Cumulative receipts minted
    total_minted: Amount,
    /// Cumulative receipts burned
    total_burned: Amount,
}

impl ReceiptSupply {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance_of(&self, holder: &Address) -> Amount {
        self.balances.get(holder).copied().unwrap_or(0)
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    pub fn total_minted(&self) -> Amount {
        self.total_minted
    }

    pub fn total_burned(&self) -> Amount {
        self.total_burned
    }

    /// Number of holders with a non-zero balance
    pub fn holder_count(&self) -> usize {
        self.balances.len()
    }

    /// Plan minting `amount` receipts to `to`
    pub fn plan_mint(&self, to: &Address, amount: Amount) -> StakingResult<SupplyUpdate> {
        let balance = safe_add(self.balance_of(to), amount)?;
        Ok(SupplyUpdate {
            balances: vec![(*to, balance)],
            total_supply: safe_add(self.total_supply, amount)?,
            total_minted: safe_add(self.total_minted, amount)?,
            total_burned: self.total_burned,
        })
    }

    /// Plan burning `amount` receipts from `from`
    pub fn plan_burn(&self, from: &Address, amount: Amount) -> StakingResult<SupplyUpdate> {
        let available = self.balance_of(from);
        if amount > available {
            return Err(StakingError::InsufficientBalance {
                available,
                requested: amount,
            });
        }
        Ok(SupplyUpdate {
            balances: vec![(*from, available - amount)],
            total_supply: safe_sub(self.total_supply, amount)?,
            total_minted: self.total_minted,
            total_burned: safe_add(self.total_burned, amount)?,
        })
    }

    /// Plan moving `amount` receipts from `from` to `to`
    pub fn plan_transfer(
        &self,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> StakingResult<SupplyUpdate> {
        if from == to {
            return Err(StakingError::SelfTransfer);
        }
        let available = self.balance_of(from);
        if amount > available {
            return Err(StakingError::InsufficientBalance {
                available,
                requested: amount,
            });
        }
        let to_balance = safe_add(self.balance_of(to), amount)?;
        Ok(SupplyUpdate {
            balances: vec![(*from, available - amount), (*to, to_balance)],
            total_supply: self.total_supply,
            total_minted: self.total_minted,
            total_burned: self.total_burned,
        })
    }

    /// Apply a planned update
    pub fn apply(&mut self, update: SupplyUpdate) {
        for (holder, balance) in update.balances {
            if balance == 0 {
                self.balances.remove(&holder);
            } else {
                self.balances.insert(holder, balance);
            }
        }
        self.total_supply = update.total_supply;
        self.total_minted = update.total_minted;
        self.total_burned = update.total_burned;
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Address, &Amount)> {
        self.balances.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const ALICE: Address = [2u8; 32];
    const BOB: Address = [3u8; 32];

    fn sum_of_balances(supply: &ReceiptSupply) -> Amount {
        supply.iter().map(|(_, b)| *b).sum()
    }

    #[test]
    fn test_mint_and_burn() {
        let mut supply = ReceiptSupply::new();

        let update = supply.plan_mint(&ALICE, 300).unwrap();
        assert_eq!(update.balance_after(&ALICE), Some(300));
        supply.apply(update);

        supply.apply(supply.plan_burn(&ALICE, 100).unwrap());

        assert_eq!(supply.balance_of(&ALICE), 200);
        assert_eq!(supply.total_supply(), 200);
        assert_eq!(supply.total_minted(), 300);
        assert_eq!(supply.total_burned(), 100);
        assert_eq!(sum_of_balances(&supply), supply.total_supply());
    }

    #[test]
    fn test_plan_does_not_mutate() {
        let supply = ReceiptSupply::new();
        let update = supply.plan_mint(&ALICE, 300).unwrap();
        assert_eq!(update.total_supply_after(), 300);
        assert_eq!(supply.total_supply(), 0);
        assert_eq!(supply.balance_of(&ALICE), 0);
    }

    #[test]
    fn test_burn_more_than_balance() {
        let mut supply = ReceiptSupply::new();
        supply.apply(supply.plan_mint(&ALICE, 10).unwrap());

        assert_eq!(
            supply.plan_burn(&ALICE, 11),
            Err(StakingError::InsufficientBalance { available: 10, requested: 11 })
        );
    }

    #[test]
    fn test_transfer() {
        let mut supply = ReceiptSupply::new();
        supply.apply(supply.plan_mint(&ALICE, 300).unwrap());
        supply.apply(supply.plan_mint(&BOB, 300).unwrap());

        supply.apply(supply.plan_transfer(&ALICE, &BOB, 210).unwrap());

        assert_eq!(supply.balance_of(&ALICE), 90);
        assert_eq!(supply.balance_of(&BOB), 510);
        assert_eq!(supply.total_supply(), 600);
        assert_eq!(sum_of_balances(&supply), 600);
    }

    #[test]
    fn test_transfer_whole_balance_drops_entry() {
        let mut supply = ReceiptSupply::new();
        supply.apply(supply.plan_mint(&ALICE, 5).unwrap());
        supply.apply(supply.plan_transfer(&ALICE, &BOB, 5).unwrap());

        assert_eq!(supply.holder_count(), 1);
        assert_eq!(supply.balance_of(&ALICE), 0);
    }

    #[test]
    fn test_transfer_errors() {
        let mut supply = ReceiptSupply::new();
        supply.apply(supply.plan_mint(&ALICE, 5).unwrap());

        assert_eq!(supply.plan_transfer(&ALICE, &ALICE, 1), Err(StakingError::SelfTransfer));
        assert!(matches!(
            supply.plan_transfer(&ALICE, &BOB, 6),
            Err(StakingError::InsufficientBalance { .. })
        ));
    }
}
