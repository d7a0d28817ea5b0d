//! Typed failure modes for the ledger core.
//!
//! Every public, fallible entry point returns `Result<_, LedgerError>`. Nothing in this crate
//! panics on a caller-reachable error path; panics are reserved for genuine internal invariant
//! breaks (store corruption), and those are wrapped in [`LedgerError::IllegalState`] rather than
//! asserted, since the caller's transaction still needs a clean rollback.

use crate::address::Address;
use crate::numeric::Amount;
use thiserror::Error;

/// The set of ways a ledger operation can fail.
///
/// The enclosing transaction must be rolled back on any variant; the core never retries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Malformed input: bad address, missing sender/timestamp, non-positive amount,
    /// `sender == receiver`, or `start_ts < current_timestamp`.
    #[error("validation failed: {0}")]
    ValidationError(String),

    /// An operation required more stored value than an account has.
    #[error("insufficient balance for {account}: requested {requested}, available {available}")]
    InsufficientBalance {
        account: Address,
        requested: Amount,
        available: Amount,
    },

    /// A referenced entity (stream id, token) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller is not authorized to mutate the referenced entity.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The operation is not legal given the entity's current state.
    #[error("illegal state: {0}")]
    IllegalState(String),
}

impl LedgerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        LedgerError::ValidationError(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        LedgerError::NotFound(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        LedgerError::Unauthorized(msg.into())
    }

    pub fn illegal_state(msg: impl Into<String>) -> Self {
        LedgerError::IllegalState(msg.into())
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
