//! Withdrawal Queue
//!
//! Undelegation requests issued when a withdrawal cannot be paid from the
//! liquidity buffer. Request ids are monotonic per validator. Each holder
//! may have at most `limit` requests outstanding; a request stops counting
//! once it is finalized through the delegation adapter.

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::constants::queue::{FIRST_REQUEST_ID, MAX_REQUEST_ID_SKIP};
use crate::errors::{StakingError, StakingResult};
use crate::types::{Address, Amount, RequestId, RequestKey, ValidatorId, WithdrawalRequest};

/// Pending undelegation requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct WithdrawalQueue {
    requests: BTreeMap<RequestKey, WithdrawalRequest>,
    next_ids: BTreeMap<ValidatorId, RequestId>,
    outstanding: BTreeMap<Address, Vec<RequestKey>>,
    limit: usize,
}

impl WithdrawalQueue {
    pub fn new(limit: usize) -> Self {
        Self {
            requests: BTreeMap::new(),
            next_ids: BTreeMap::new(),
            outstanding: BTreeMap::new(),
            limit,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Keys of `holder`'s unfinalized requests, oldest first
    pub fn outstanding(&self, holder: &Address) -> &[RequestKey] {
        self.outstanding
            .get(holder)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Fails with `WithdrawalLimitReached` if `holder` cannot queue another request
    pub fn ensure_capacity(&self, holder: &Address) -> StakingResult<()> {
        let outstanding = self.outstanding(holder).len();
        if outstanding >= self.limit {
            return Err(StakingError::WithdrawalLimitReached {
                outstanding,
                limit: self.limit,
            });
        }
        Ok(())
    }

    /// Next unused id for `validator_id`
    pub fn next_request_id(&self, validator_id: ValidatorId) -> RequestId {
        self.next_ids
            .get(&validator_id)
            .copied()
            .unwrap_or(FIRST_REQUEST_ID)
    }

    /// Id for a new request against `validator_id`
    ///
    /// Takes the first hinted id that is free, not below the next unused
    /// one and at most `MAX_REQUEST_ID_SKIP` past it; otherwise the next
    /// unused id.
    pub fn choose_request_id(
        &self,
        validator_id: ValidatorId,
        hint: &[RequestId],
    ) -> StakingResult<RequestId> {
        let next = self.next_request_id(validator_id);
        let usable = |id: RequestId| {
            id >= next
                && id - next <= MAX_REQUEST_ID_SKIP
                && id.checked_add(1).is_some()
                && !self.requests.contains_key(&RequestKey::new(validator_id, id))
        };

        if let Some(id) = hint.iter().copied().find(|id| usable(*id)) {
            return Ok(id);
        }
        if usable(next) {
            Ok(next)
        } else {
            Err(StakingError::RequestIdsExhausted { validator_id })
        }
    }

    /// Record a request the delegation adapter is asked to undelegate
    pub fn enqueue(&mut self, request: WithdrawalRequest) -> StakingResult<()> {
        let key = request.key();
        if self.requests.contains_key(&key) {
            return Err(StakingError::DuplicateWithdrawalRequest {
                validator_id: key.validator_id,
                request_id: key.request_id,
            });
        }
        let successor = key
            .request_id
            .checked_add(1)
            .ok_or(StakingError::RequestIdsExhausted {
                validator_id: key.validator_id,
            })?;

        let next = self.next_ids.entry(key.validator_id).or_insert(FIRST_REQUEST_ID);
        *next = (*next).max(successor);
        self.outstanding.entry(request.holder).or_default().push(key);
        self.requests.insert(key, request);
        Ok(())
    }

    pub fn get(&self, key: &RequestKey) -> Option<&WithdrawalRequest> {
        self.requests.get(key)
    }

    /// Amount still owed under `(validator_id, request_id)`
    pub fn amount(&self, validator_id: ValidatorId, request_id: RequestId) -> Option<Amount> {
        self.get(&RequestKey::new(validator_id, request_id))
            .map(|r| r.amount)
    }

    /// Remove a finalized request and release the holder's slot
    pub fn remove(&mut self, key: &RequestKey) -> Option<WithdrawalRequest> {
        let request = self.requests.remove(key)?;
        if let Some(keys) = self.outstanding.get_mut(&request.holder) {
            keys.retain(|k| k != key);
            if keys.is_empty() {
                self.outstanding.remove(&request.holder);
            }
        }
        Some(request)
    }

    /// Total value owed by pending requests
    pub fn pending_total(&self) -> Amount {
        self.requests.values().map(|r| r.amount).sum()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const ALICE: Address = [2u8; 32];
    const BOB: Address = [3u8; 32];

    fn request(holder: Address, validator_id: ValidatorId, request_id: RequestId) -> WithdrawalRequest {
        WithdrawalRequest {
            validator_id,
            request_id,
            holder,
            amount: 100,
            created_epoch: 1,
        }
    }

    #[test]
    fn test_ids_are_monotonic_per_validator() {
        let mut queue = WithdrawalQueue::new(4);
        assert_eq!(queue.next_request_id(1), 0);

        queue.enqueue(request(ALICE, 1, queue.next_request_id(1))).unwrap();
        queue.enqueue(request(ALICE, 1, queue.next_request_id(1))).unwrap();

        assert_eq!(queue.next_request_id(1), 2);
        assert_eq!(queue.next_request_id(2), 0);
        assert_eq!(queue.amount(1, 1), Some(100));
    }

    #[test]
    fn test_choose_request_id_honors_forward_hints() {
        let mut queue = WithdrawalQueue::new(4);
        queue.enqueue(request(ALICE, 1, 0)).unwrap();

        assert_eq!(queue.choose_request_id(1, &[]), Ok(1));
        assert_eq!(queue.choose_request_id(1, &[0, 7]), Ok(7));
        assert_eq!(queue.choose_request_id(1, &[0]), Ok(1));

        queue.enqueue(request(ALICE, 1, 7)).unwrap();
        assert_eq!(queue.next_request_id(1), 8);
    }

    #[test]
    fn test_capacity() {
        let mut queue = WithdrawalQueue::new(1);
        assert!(queue.ensure_capacity(&ALICE).is_ok());

        queue.enqueue(request(ALICE, 1, 0)).unwrap();
        assert_eq!(
            queue.ensure_capacity(&ALICE),
            Err(StakingError::WithdrawalLimitReached { outstanding: 1, limit: 1 })
        );
        assert!(queue.ensure_capacity(&BOB).is_ok());
    }

    #[test]
    fn test_remove_releases_slot() {
        let mut queue = WithdrawalQueue::new(1);
        queue.enqueue(request(ALICE, 1, 0)).unwrap();

        let removed = queue.remove(&RequestKey::new(1, 0)).unwrap();
        assert_eq!(removed.holder, ALICE);
        assert!(queue.outstanding(&ALICE).is_empty());
        assert!(queue.ensure_capacity(&ALICE).is_ok());

        // Removed ids are never reissued
        assert_eq!(queue.next_request_id(1), 1);
        assert!(queue.remove(&RequestKey::new(1, 0)).is_none());
    }

    #[test]
    fn test_pending_total() {
        let mut queue = WithdrawalQueue::new(2);
        queue.enqueue(request(ALICE, 1, 0)).unwrap();
        queue.enqueue(request(BOB, 2, 0)).unwrap();
        assert_eq!(queue.pending_total(), 200);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_hints_cannot_exhaust_ids() {
        let mut queue = WithdrawalQueue::new(4);

        // Ids without a successor, or too far ahead, are ignored
        assert_eq!(queue.choose_request_id(1, &[RequestId::MAX]), Ok(0));
        assert_eq!(queue.choose_request_id(1, &[MAX_REQUEST_ID_SKIP + 1]), Ok(0));
        assert_eq!(queue.choose_request_id(1, &[MAX_REQUEST_ID_SKIP]), Ok(MAX_REQUEST_ID_SKIP));

        queue.enqueue(request(ALICE, 1, 0)).unwrap();
        assert_eq!(queue.choose_request_id(1, &[RequestId::MAX, 0]), Ok(1));
    }

    #[test]
    fn test_enqueue_refuses_taken_key() {
        let mut queue = WithdrawalQueue::new(4);
        queue.enqueue(request(ALICE, 1, 3)).unwrap();

        assert_eq!(
            queue.enqueue(request(BOB, 1, 3)),
            Err(StakingError::DuplicateWithdrawalRequest {
                validator_id: 1,
                request_id: 3,
            })
        );
        assert_eq!(queue.get(&RequestKey::new(1, 3)).map(|r| r.holder), Some(ALICE));
        assert!(queue.outstanding(&BOB).is_empty());
        assert_eq!(queue.pending_total(), 100);
    }

    #[test]
    fn test_last_request_id_is_never_issued() {
        let mut queue = WithdrawalQueue::new(4);
        assert_eq!(
            queue.enqueue(request(ALICE, 1, RequestId::MAX)),
            Err(StakingError::RequestIdsExhausted { validator_id: 1 })
        );
        assert!(queue.is_empty());
    }
}
