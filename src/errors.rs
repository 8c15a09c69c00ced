//! Error types returned by queue operations.

use thiserror::Error;

/// Rejected creation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CreateError {
    /// The initial capacity was zero.
    #[error("initial capacity must be greater than zero")]
    ZeroCapacity,
    /// The initial capacity exceeded the maximum capacity.
    #[error("initial capacity {initial} exceeds maximum capacity {max}")]
    InitialExceedsMax {
        /// Requested initial capacity.
        initial: usize,
        /// Requested maximum capacity.
        max: usize,
    },
}

/// A push that could not complete. The rejected value is handed back so the
/// caller can retry with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PushError<T> {
    /// The queue is full at its maximum capacity.
    #[error("queue is full")]
    Full(T),
}

impl<T> PushError<T> {
    /// Recover the value that could not be pushed.
    pub fn into_inner(self) -> T {
        match self {
            PushError::Full(value) => value,
        }
    }
}

/// A pop that did not produce a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PopError {
    /// The queue held no items.
    #[error("queue is empty")]
    Empty,
    /// The caller's predicate declined the head item; the item stays in the
    /// queue.
    #[error("head item rejected by predicate")]
    Rejected,
}
