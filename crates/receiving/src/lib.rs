//! `stockline-receiving` — goods receipt (GRN) and putaway.
//!
//! A GRN turns expected receipts into on-hand stock in a receiving bin;
//! putaway tasks then move it into confirmed storage bins. The aggregate is
//! pure: ledger movements are derived from its events one layer up.

pub mod grn;

pub use grn::{
    AddExpectedLine, AssignPutaway, CancelGrn, CancelPutaway, CompleteGrn, CompletePutaway,
    CreateGrn, Grn, GrnCommand, GrnEvent, GrnId, GrnLine, GrnStatus, OpenGrn, PutawayStatus,
    PutawayTask, ReceiveLine,
};
