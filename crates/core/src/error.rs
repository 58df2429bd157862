//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (quantity
/// preconditions, illegal transitions, conflicts). Infrastructure concerns
/// belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A movement would overdraw the available (or on-hand) quantity of a
    /// stock key. Recoverable: the caller may retry with a smaller quantity
    /// or a different source.
    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: i64, available: i64 },

    /// A reservation exceeds the summed available quantity for the item.
    #[error("insufficient available quantity: requested {requested}, available {available}")]
    InsufficientAvailable { requested: i64, available: i64 },

    /// Attempted state change that is not legal from the current status.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// Optimistic-lock or serialization failure. Recoverable by the caller
    /// retrying the whole operation; the core never retries internally.
    #[error("concurrent modification: {0}")]
    ConcurrentModification(String),

    /// Unknown header/line/snapshot key (domain-level).
    #[error("not found")]
    NotFound,

    /// A value failed validation (e.g. malformed or zero quantity input).
    #[error("validation failed: {0}")]
    Validation(String),
}

impl DomainError {
    pub fn insufficient_stock(requested: i64, available: i64) -> Self {
        Self::InsufficientStock {
            requested,
            available,
        }
    }

    pub fn insufficient_available(requested: i64, available: i64) -> Self {
        Self::InsufficientAvailable {
            requested,
            available,
        }
    }

    pub fn invalid_transition(msg: impl Into<String>) -> Self {
        Self::InvalidTransition(msg.into())
    }

    pub fn concurrent(msg: impl Into<String>) -> Self {
        Self::ConcurrentModification(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
