//! `stockline-counting` — cycle counts with variance resolution.
//!
//! A count freezes the on-hand quantities of its scope at open time as the
//! expected baseline, captures counted quantities per line, and on closure
//! posts one adjusting ledger entry per nonzero variance. The baseline is
//! deliberately not refreshed during the count window: operators measure
//! against a known point in time.

pub mod cycle_count;

pub use cycle_count::{
    BaselineLine, CancelCount, CloseCount, CycleCount, CycleCountCommand, CycleCountEvent,
    CycleCountId, CycleCountLine, CycleCountStatus, OpenCount, RecordCount, SubmitCount,
    VarianceLine,
};
