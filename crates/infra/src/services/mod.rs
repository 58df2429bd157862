//! Application services: one per workflow, plus the direct movement path.
//!
//! Services translate operation calls into workflow commands, derive the
//! ledger movements each decided event implies, and hand both to the
//! dispatcher for one atomic commit.

pub mod adjustment;
pub mod counting;
pub mod receiving;
pub mod stock;
pub mod transfer;

pub use adjustment::AdjustmentService;
pub use counting::CountingService;
pub use receiving::ReceivingService;
pub use stock::StockService;
pub use transfer::TransferService;
