//! `stockline-stock` — the stock-ledger data model.
//!
//! Quantities change only through signed movements grouped into
//! all-or-nothing batches; every applied movement leaves an immutable ledger
//! entry whose `qty_after` equals the snapshot balance it produced. The
//! arithmetic and preconditions live here as pure functions; the stores own
//! locking and persistence.

pub mod ledger;
pub mod movement;
pub mod snapshot;

pub use ledger::LedgerEntry;
pub use movement::{Movement, MovementBatch, MovementReason, MovementRef};
pub use snapshot::{StockKey, StockSnapshot};
