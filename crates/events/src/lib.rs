//! `stockline-events` — event abstractions and distribution.
//!
//! Workflow aggregates describe what happened as typed events; the stores
//! persist them and publish envelopes here for downstream consumers
//! (alerting, sync, analytics). The bus distributes, it never stores: the
//! ledger and the workflow streams remain the source of truth.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
