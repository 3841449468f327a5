//! Access Control Module
//!
//! The pool has a single privileged role. The capability is checked before
//! any parameter is touched, so a rejected call never mutates state.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::errors::{StakingError, StakingResult};
use crate::types::Address;

/// Holder of the admin capability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct AdminCapability {
    admin: Address,
}

impl AdminCapability {
    pub fn new(admin: Address) -> Self {
        Self { admin }
    }

    pub fn admin(&self) -> Address {
        self.admin
    }

    pub fn is_admin(&self, caller: &Address) -> bool {
        self.admin == *caller
    }

    /// Fails with `Unauthorized` unless `caller` is the admin
    pub fn ensure_admin(&self, caller: &Address) -> StakingResult<()> {
        if !self.is_admin(caller) {
            return Err(StakingError::Unauthorized {
                expected: self.admin,
                actual: *caller,
            });
        }
        Ok(())
    }

    /// Hand the capability to `new_admin`, returning the previous holder
    pub fn transfer(&mut self, caller: &Address, new_admin: Address) -> StakingResult<Address> {
        self.ensure_admin(caller)?;
        if new_admin == [0u8; 32] {
            return Err(StakingError::InvalidParameter {
                param: "admin",
                reason: "cannot be the zero address",
            });
        }
        Ok(std::mem::replace(&mut self.admin, new_admin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADMIN: Address = [1u8; 32];
    const OTHER: Address = [2u8; 32];

    #[test]
    fn test_ensure_admin() {
        let cap = AdminCapability::new(ADMIN);
        assert!(cap.ensure_admin(&ADMIN).is_ok());
        assert_eq!(
            cap.ensure_admin(&OTHER),
            Err(StakingError::Unauthorized { expected: ADMIN, actual: OTHER })
        );
    }

    #[test]
    fn test_transfer() {
        let mut cap = AdminCapability::new(ADMIN);

        assert!(cap.transfer(&OTHER, OTHER).is_err());
        assert!(cap.transfer(&ADMIN, [0u8; 32]).is_err());
        assert_eq!(cap.admin(), ADMIN);

        assert_eq!(cap.transfer(&ADMIN, OTHER).unwrap(), ADMIN);
        assert!(cap.is_admin(&OTHER));
        assert!(!cap.is_admin(&ADMIN));
    }
}
