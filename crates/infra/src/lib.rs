//! Infrastructure layer: stores, dispatch pipeline, reservations, queries,
//! application services.
//!
//! This crate owns the transaction boundary. Every workflow action and every
//! movement batch commits through one store call that validates and applies
//! the header transition and the ledger writes together, or not at all.

pub mod dispatcher;
pub mod queries;
pub mod reservation;
pub mod services;
pub mod store;

#[cfg(test)]
mod integration_tests;
