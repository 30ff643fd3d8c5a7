//! # Drop Limiter Error Types
//!
//! All errors that can occur while loading drop tables, reading the history
//! ledger, talking to the inventory store or flushing reports.
//!
//! The simulation pass itself never fails: everything it touches has already
//! been validated by the time it runs.

use thiserror::Error;

/// Errors that can occur in the drop limiter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LimiterError {
    /// A time frame token such as `5min` could not be parsed.
    #[error("invalid time frame [{token}]: {reason}")]
    InvalidTimeFrame {
        /// The offending token.
        token: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A percentage such as `3.5%` could not be parsed.
    #[error("invalid percentage [{token}]: {reason}")]
    InvalidPercent {
        /// The offending token.
        token: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A limit such as `3/week` could not be parsed.
    #[error("invalid limit [{token}]: {reason}")]
    InvalidLimit {
        /// The offending token.
        token: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A line of the drop table could not be parsed.
    #[error("line {line}: unable to parse [{content}]: {reason}")]
    Parse {
        /// 1-based line number.
        line: usize,
        /// The raw line.
        content: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A drop references a pool that was never declared.
    #[error("drop for item {item_id} references unknown pool [{pool}]")]
    UnknownPool {
        /// Item whose drop line references the pool.
        item_id: u32,
        /// The undeclared pool name.
        pool: String,
    },

    /// Two drop lines declare the same item.
    #[error("item {0} is declared by more than one drop line")]
    DuplicateItem(u32),

    /// Two pool lines declare the same name.
    #[error("pool [{0}] is declared more than once")]
    DuplicatePool(String),

    /// The history ledger file exists but is malformed.
    #[error("ledger {path} line {line} is corrupt: {reason}")]
    LedgerCorrupt {
        /// Path of the ledger file.
        path: String,
        /// 1-based line number.
        line: usize,
        /// Why it was rejected.
        reason: String,
    },

    /// An I/O failure in the ledger, inventory store or report sink.
    #[error("storage failure: {0}")]
    Storage(String),
}

/// Result type for drop limiter operations.
pub type LimiterResult<T> = Result<T, LimiterError>;
