//! `stockline-api` — HTTP surface over the stock-ledger core.
//!
//! Exposes exactly the ledger operations other modules consume: movements,
//! reservations, availability and expiry-alert queries, and the workflow
//! entry points. Authentication/RBAC is an upstream concern: requests
//! arrive with a tenant already resolved, carried in the `x-tenant-id`
//! header by the gateway.

pub mod app;
pub mod context;
pub mod middleware;
