//! Error handling for the quadix library
//!
//! This module provides the crate-wide error type and `Result` alias.
//! Query misses (`AlreadyExists`, `NotFound`) are modelled as errors so
//! they surface at the operation boundary, but they are non-error
//! control flow for callers: the trie state is unchanged when they are
//! returned.

use thiserror::Error;

/// Main error type for the quadix library
#[derive(Error, Debug)]
pub enum QuadixError {
    /// Insert found an entry with an equal key
    #[error("key already present")]
    AlreadyExists,

    /// Lookup or remove missed
    #[error("key not found")]
    NotFound,

    /// Violated precondition
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the violated precondition
        message: String,
    },

    /// Memory allocation failure
    #[error("memory allocation failed: requested {size} bytes")]
    OutOfMemory {
        /// Number of bytes requested
        size: usize,
    },

    /// Result would exceed a fixed size bound
    #[error("result too large: {size} bytes exceeds limit of {limit}")]
    Overflow {
        /// Size the operation would have produced
        size: usize,
        /// The bound that was exceeded
        limit: usize,
    },

    /// I/O error from an adapter callback
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl QuadixError {
    /// Create an invalid argument error
    pub fn invalid_argument<S: Into<String>>(message: S) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create an out of memory error
    pub fn out_of_memory(size: usize) -> Self {
        Self::OutOfMemory { size }
    }

    /// Create an overflow error
    pub fn overflow(size: usize, limit: usize) -> Self {
        Self::Overflow { size, limit }
    }

    /// True for the query-miss conditions that leave all state unchanged
    pub fn is_miss(&self) -> bool {
        matches!(self, Self::AlreadyExists | Self::NotFound)
    }
}

/// Result type alias for quadix operations
pub type Result<T> = std::result::Result<T, QuadixError>;
