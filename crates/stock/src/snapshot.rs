use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use stockline_core::{BatchNo, BinId, DomainError, DomainResult, ItemId, TenantId, WarehouseId};

use crate::movement::MovementReason;

/// Identity of one stock position: (tenant, bin, item, batch).
///
/// `batch_no = None` is the un-batched position of an item in a bin; it is a
/// distinct key, not a wildcard.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StockKey {
    pub tenant_id: TenantId,
    pub bin_id: BinId,
    pub item_id: ItemId,
    pub batch_no: Option<BatchNo>,
}

/// Materialized quantities of one stock key.
///
/// The snapshot is a cache of the ledger: for every key it equals the sum of
/// all ledger deltas since creation, and it is only ever mutated in the same
/// transaction as a ledger append. Emptied positions keep their row (on-hand
/// zero) so batch/expiry history survives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSnapshot {
    pub warehouse_id: WarehouseId,
    pub qty_on_hand: i64,
    pub qty_reserved: i64,
    pub expiry_date: Option<NaiveDate>,
    pub updated_at: DateTime<Utc>,
}

impl StockSnapshot {
    /// Fresh position, created on the first movement into a key.
    pub fn empty(
        warehouse_id: WarehouseId,
        expiry_date: Option<NaiveDate>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            warehouse_id,
            qty_on_hand: 0,
            qty_reserved: 0,
            expiry_date,
            updated_at: now,
        }
    }

    /// On-hand minus reserved; never stored, always derived.
    pub fn qty_available(&self) -> i64 {
        self.qty_on_hand - self.qty_reserved
    }

    /// Apply one signed movement delta, enforcing the per-reason
    /// precondition. Returns the new on-hand balance (the `qty_after` of the
    /// ledger entry being written alongside).
    pub fn post(
        &mut self,
        reason: MovementReason,
        qty_change: i64,
        now: DateTime<Utc>,
    ) -> DomainResult<i64> {
        if qty_change == 0 {
            return Err(DomainError::validation("movement delta cannot be zero"));
        }

        if qty_change < 0 {
            let needed = -qty_change;
            if reason.checks_available() {
                let available = self.qty_available();
                if available < needed {
                    return Err(DomainError::insufficient_stock(needed, available));
                }
            } else if self.qty_on_hand < needed {
                return Err(DomainError::insufficient_stock(needed, self.qty_on_hand));
            }
        }

        self.qty_on_hand += qty_change;

        // A shrinkage correction may cut under the reserved quantity; the
        // reservation is starved rather than the invariant broken.
        if self.qty_reserved > self.qty_on_hand {
            self.qty_reserved = self.qty_on_hand;
        }

        self.updated_at = now;
        Ok(self.qty_on_hand)
    }

    /// Soft-hold `qty` against the available quantity. Not a movement: the
    /// ledger is untouched.
    pub fn reserve(&mut self, qty: i64, now: DateTime<Utc>) -> DomainResult<()> {
        if qty <= 0 {
            return Err(DomainError::validation(
                "reservation quantity must be positive",
            ));
        }
        let available = self.qty_available();
        if available < qty {
            return Err(DomainError::insufficient_available(qty, available));
        }
        self.qty_reserved += qty;
        self.updated_at = now;
        Ok(())
    }

    /// Release a previously held quantity. Saturating: a reservation starved
    /// by a shrinkage adjustment releases whatever is still held.
    pub fn release(&mut self, qty: i64, now: DateTime<Utc>) {
        self.qty_reserved = (self.qty_reserved - qty).max(0);
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn snapshot() -> StockSnapshot {
        StockSnapshot::empty(WarehouseId::new(), None, now())
    }

    #[test]
    fn post_accumulates_and_returns_balance() {
        let mut s = snapshot();
        assert_eq!(s.post(MovementReason::Receive, 10, now()).unwrap(), 10);
        assert_eq!(s.post(MovementReason::Pick, -4, now()).unwrap(), 6);
        assert_eq!(s.qty_on_hand, 6);
    }

    #[test]
    fn pick_cannot_touch_reserved_stock() {
        let mut s = snapshot();
        s.post(MovementReason::Receive, 10, now()).unwrap();
        s.reserve(8, now()).unwrap();

        let err = s.post(MovementReason::Pick, -5, now()).unwrap_err();
        assert_eq!(
            err,
            DomainError::InsufficientStock {
                requested: 5,
                available: 2
            }
        );
        assert_eq!(s.qty_on_hand, 10);
    }

    #[test]
    fn adjust_may_cut_under_reserved_but_not_below_zero() {
        let mut s = snapshot();
        s.post(MovementReason::Receive, 10, now()).unwrap();
        s.reserve(8, now()).unwrap();

        // Shrinkage below the reserved quantity clamps the reservation.
        s.post(MovementReason::Adjust, -7, now()).unwrap();
        assert_eq!(s.qty_on_hand, 3);
        assert_eq!(s.qty_reserved, 3);

        let err = s.post(MovementReason::Scrap, -4, now()).unwrap_err();
        assert_eq!(
            err,
            DomainError::InsufficientStock {
                requested: 4,
                available: 3
            }
        );
    }

    #[test]
    fn reserve_fails_beyond_available() {
        let mut s = snapshot();
        s.post(MovementReason::Receive, 5, now()).unwrap();
        s.reserve(3, now()).unwrap();

        let err = s.reserve(3, now()).unwrap_err();
        assert_eq!(
            err,
            DomainError::InsufficientAvailable {
                requested: 3,
                available: 2
            }
        );
    }

    #[test]
    fn release_saturates_at_zero() {
        let mut s = snapshot();
        s.post(MovementReason::Receive, 5, now()).unwrap();
        s.reserve(2, now()).unwrap();
        s.release(10, now());
        assert_eq!(s.qty_reserved, 0);
        assert_eq!(s.qty_on_hand, 5);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Post(MovementReason, i64),
        Reserve(i64),
        Release(i64),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0i64..50).prop_map(|q| Op::Post(MovementReason::Receive, q + 1)),
            (1i64..50).prop_map(|q| Op::Post(MovementReason::Pick, -q)),
            (1i64..50).prop_map(|q| Op::Post(MovementReason::Adjust, -q)),
            (1i64..50).prop_map(|q| Op::Reserve(q)),
            (1i64..50).prop_map(|q| Op::Release(q)),
        ]
    }

    proptest! {
        /// Property: under any interleaving of movements, reserves and
        /// releases, 0 <= reserved <= on-hand, and on-hand equals the sum of
        /// the deltas that were actually applied.
        #[test]
        fn invariants_hold_for_arbitrary_sequences(
            ops in prop::collection::vec(op_strategy(), 1..60)
        ) {
            let mut s = snapshot();
            let mut applied: i64 = 0;

            for op in ops {
                match op {
                    Op::Post(reason, delta) => {
                        if s.post(reason, delta, now()).is_ok() {
                            applied += delta;
                        }
                    }
                    Op::Reserve(q) => {
                        let _ = s.reserve(q, now());
                    }
                    Op::Release(q) => {
                        s.release(q, now());
                    }
                }

                prop_assert!(s.qty_on_hand >= 0);
                prop_assert!(s.qty_reserved >= 0);
                prop_assert!(s.qty_reserved <= s.qty_on_hand);
                prop_assert!(s.qty_available() >= 0);
            }

            prop_assert_eq!(s.qty_on_hand, applied);
        }
    }
}
