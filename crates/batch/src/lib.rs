//! `stockline-batch` — batch/lot records, expiry classification and FEFO
//! ordering.
//!
//! The classifier is a pure read-side function: it never writes, it is
//! invoked by alert summaries and by reservation planning (first expiry,
//! first out).

pub mod batch;
pub mod expiry;

pub use batch::Batch;
pub use expiry::{ExpiryTier, classify, days_until, fefo_key};
