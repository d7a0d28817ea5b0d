//! # Streaming Rebase-Token Ledger
//!
//! A deterministic accounting engine that tracks per-account balances of fungible tokens whose
//! supply can be elastically rebased, where transfers may be time-vested ("streams") rather than
//! instantaneous. Balances are a function of wall-clock time, reconstructable for any timestamp
//! without rounding drift or double-counting.
//!
//! ## Architecture
//!
//! - [`numeric`]: overflow-safe assets↔shares conversions over a 256-bit amount type
//! - [`address`]: canonical checksum-cased 20-byte account/token addresses
//! - [`stream`]: the immutable time-vested transfer record and its accrual function
//! - [`store`]: the transactional store trait, plus an in-memory reference implementation
//! - [`balance`]: balance queries, including the savepoint-based `future_*` projections
//! - [`settlement`]: folding matured streams into stored balances
//! - [`token`]: the public mutating contract — mint, burn, rebase, transfer, cancel
//! - [`guards`]: the address-normalization and settlement pre-hook guards
//! - [`hook`]: the external settlement-extension hook
//! - [`error`]: the typed failure modes every fallible entry point returns

pub mod address;
pub mod balance;
pub mod error;
pub mod guards;
pub mod hook;
pub mod numeric;
pub mod settlement;
pub mod store;
pub mod stream;
pub mod token;

pub use address::Address;
pub use error::{LedgerError, LedgerResult};
pub use hook::{NoopHook, SettlementHook};
pub use numeric::Amount;
pub use stream::{Stream, StreamId};
pub use store::{InMemoryLedgerStore, LedgerStore};
pub use token::Ledger;
