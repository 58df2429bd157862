//! `stockline-adjustment` — approval-gated manual ledger corrections.
//!
//! Shrinkage, damage, found stock: each adjustment names target keys and
//! signed deltas with a mandatory reason, passes an approval gate with no
//! stock side effects, and posts all lines to the ledger atomically.

pub mod adjustment;

pub use adjustment::{
    AddAdjustmentLine, Adjustment, AdjustmentCommand, AdjustmentEvent, AdjustmentId,
    AdjustmentLine, AdjustmentStatus, ApproveAdjustment, CreateAdjustment, PostAdjustment,
    RejectAdjustment, SubmitAdjustment,
};
