//! Soft reservations against available stock.
//!
//! A reservation is not a movement: it raises `qty_reserved` on the chosen
//! snapshots and writes nothing to the ledger. Allocation follows FEFO
//! across bins, splitting only when a single position cannot satisfy the
//! request. Reservations never expire here — release is the only way out;
//! timeout policy belongs to order fulfillment.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use stockline_core::{DomainError, DomainResult, ItemId, ReservationId, TenantId};

use crate::store::{ReservationAllocation, StockStore};

/// A granted soft hold: which positions carry how much of it.
#[derive(Debug, Clone)]
pub struct Reservation {
    pub id: ReservationId,
    pub tenant_id: TenantId,
    pub item_id: ItemId,
    pub qty: i64,
    pub allocations: Vec<ReservationAllocation>,
    pub created_at: DateTime<Utc>,
}

/// Grants and releases soft holds on behalf of order fulfillment.
#[derive(Debug)]
pub struct ReservationManager<S> {
    store: S,
    reservations: RwLock<HashMap<ReservationId, Reservation>>,
}

impl<S> ReservationManager<S>
where
    S: StockStore,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            reservations: RwLock::new(HashMap::new()),
        }
    }

    /// Reserve `qty` of an item, consuming availability in FEFO order.
    ///
    /// Fails with `InsufficientAvailable` when the item's summed
    /// availability across all bins is short; nothing is held in that case.
    pub fn reserve(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
        qty: i64,
    ) -> DomainResult<ReservationId> {
        let now = Utc::now();
        let allocations = self
            .store
            .reserve_fefo(tenant_id, item_id, qty, now)
            .map_err(DomainError::from)?;

        let id = ReservationId::new();
        let reservation = Reservation {
            id,
            tenant_id,
            item_id,
            qty,
            allocations,
            created_at: now,
        };

        let mut reservations = self
            .reservations
            .write()
            .map_err(|_| DomainError::validation("reservation registry lock poisoned"))?;
        reservations.insert(id, reservation);

        tracing::debug!(%tenant_id, %item_id, qty, reservation_id = %id, "reservation granted");
        Ok(id)
    }

    /// Release a reservation, returning its held quantities to availability.
    pub fn release(&self, tenant_id: TenantId, reservation_id: ReservationId) -> DomainResult<()> {
        let reservation = {
            let mut reservations = self
                .reservations
                .write()
                .map_err(|_| DomainError::validation("reservation registry lock poisoned"))?;

            let owned_by_tenant = reservations
                .get(&reservation_id)
                .is_some_and(|r| r.tenant_id == tenant_id);
            if !owned_by_tenant {
                return Err(DomainError::not_found());
            }
            reservations
                .remove(&reservation_id)
                .ok_or_else(DomainError::not_found)?
        };

        self.store
            .release_allocations(tenant_id, &reservation.allocations, Utc::now())
            .map_err(DomainError::from)?;

        tracing::debug!(%tenant_id, reservation_id = %reservation_id, "reservation released");
        Ok(())
    }

    pub fn get(&self, tenant_id: TenantId, reservation_id: ReservationId) -> Option<Reservation> {
        let reservations = self.reservations.read().ok()?;
        reservations
            .get(&reservation_id)
            .filter(|r| r.tenant_id == tenant_id)
            .cloned()
    }
}
