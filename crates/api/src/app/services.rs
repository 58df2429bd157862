//! Service wiring: one shared store + bus behind every workflow service.

use std::sync::Arc;

use serde_json::Value as JsonValue;

use stockline_events::{EventEnvelope, InMemoryEventBus};
use stockline_infra::queries::StockQueries;
use stockline_infra::reservation::ReservationManager;
use stockline_infra::services::{
    AdjustmentService, CountingService, ReceivingService, StockService, TransferService,
};
use stockline_infra::store::InMemoryStore;

pub type Store = Arc<InMemoryStore>;
pub type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;

/// Everything the route handlers need, built once at startup.
pub struct AppServices {
    pub stock: StockService<Store, Bus>,
    pub receiving: ReceivingService<Store, Bus>,
    pub transfers: TransferService<Store, Bus>,
    pub counting: CountingService<Store, Bus>,
    pub adjustments: AdjustmentService<Store, Bus>,
    pub reservations: ReservationManager<Store>,
    pub queries: StockQueries<Store>,
    pub bus: Bus,
}

/// Wire the in-memory backend.
///
/// Every service shares the same store, so a workflow action and the ledger
/// writes it implies commit through one lock; the bus fans committed
/// envelopes out to whoever subscribes.
pub fn build_services() -> AppServices {
    let store: Store = Arc::new(InMemoryStore::new());
    let bus: Bus = Arc::new(InMemoryEventBus::new());

    AppServices {
        stock: StockService::new(store.clone(), bus.clone()),
        receiving: ReceivingService::new(store.clone(), bus.clone()),
        transfers: TransferService::new(store.clone(), bus.clone()),
        counting: CountingService::new(store.clone(), bus.clone()),
        adjustments: AdjustmentService::new(store.clone(), bus.clone()),
        reservations: ReservationManager::new(store.clone()),
        queries: StockQueries::new(store),
        bus,
    }
}
