//! Stores: the workflow event streams and the stock ledger/snapshot state.
//!
//! `InMemoryStore` backs tests and single-process deployments;
//! `PostgresStore` maps the same semantics onto a relational schema with
//! serializable transactions.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use r#trait::{
    CommitOutcome, ReservationAllocation, StockStore, StoreError, StoredEvent, UncommittedEvent,
    WorkflowStore,
};
