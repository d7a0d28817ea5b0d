//! The transactional ledger store abstraction, and an in-memory reference implementation.
//!
//! [`LedgerStore`] is the one storage-facing trait the engine depends on; everything else in this
//! crate is storage-agnostic. [`InMemoryLedgerStore`] is a reference implementation good enough to
//! drive every test in this crate and suitable for embedding by callers with no durable store of
//! their own. Every collection here is a `BTreeMap`/`BTreeSet`, never a `HashMap`/`HashSet` — the
//! determinism requirement in SPEC_FULL.md §5 forbids hash-map iteration-order dependence, and an
//! ordered map costs nothing extra at this scale.

use std::collections::BTreeMap;

use crate::address::Address;
use crate::error::{LedgerError, LedgerResult};
use crate::numeric::Amount;
use crate::stream::{Stream, StreamId};

/// The fields needed to insert a new, not-yet-accrued stream; the store assigns `id`.
#[derive(Clone, Debug)]
pub struct NewStream {
    pub from: Address,
    pub to: Address,
    pub start_ts: u64,
    pub duration: u64,
    pub amount: Amount,
    pub token: Address,
    pub swap_id: Option<u64>,
}

/// Opaque handle to a nested savepoint. Savepoints must be released or rolled back in LIFO order,
/// matching the nesting discipline SPEC_FULL.md §5 requires.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SavepointId(u64);

/// A signed accrual delta: `true` means a credit (receiver side), `false` a debit (sender side).
/// Magnitudes are always the non-negative result of [`Stream::streamed_amt`], so a sign flag
/// alongside an unsigned `Amount` is exactly as expressive as a signed big integer here, without
/// adding a second big-integer type to the dependency stack (see SPEC_FULL.md §9).
pub type SignedDelta = (bool, Amount);

/// The transactional CRUD + savepoint surface the engine requires of a store.
///
/// Foreign keys (a stream's `from`/`to`/`token` referencing existing accounts/tokens) are enforced
/// by running the idempotent create-if-not-exists step before any insert that references an
/// address, exactly as the distillation source's `add_stream` does via
/// `create_account_if_not_exists`/`create_token_if_not_exists`.
pub trait LedgerStore {
    fn create_account_if_not_exists(&mut self, account: &Address);
    fn create_token_if_not_exists(&mut self, token: &Address);

    fn get_balance(&self, account: &Address, token: &Address) -> Amount;
    fn set_balance(&mut self, account: &Address, token: &Address, shares: Amount);

    fn get_total_assets(&self, token: &Address) -> Amount;
    fn set_total_assets(&mut self, token: &Address, value: Amount);
    fn get_total_shares(&self, token: &Address) -> Amount;
    fn set_total_shares(&mut self, token: &Address, value: Amount);

    fn insert_stream(&mut self, stream: NewStream) -> StreamId;
    fn update_stream_amount_duration(
        &mut self,
        id: StreamId,
        duration: u64,
        amount: Amount,
    ) -> LedgerResult<()>;
    fn set_stream_accrued(&mut self, id: StreamId, accrued: bool) -> LedgerResult<()>;
    fn delete_stream(&mut self, id: StreamId) -> LedgerResult<()>;
    fn get_stream(&self, id: StreamId) -> Option<Stream>;

    /// All streams (any accrual status) touching `account` as sender or receiver for `token`,
    /// ordered by insertion id.
    fn get_streams_for_account(&self, account: &Address, token: &Address) -> Vec<Stream>;

    /// Matured (`start + duration <= t`), unaccrued, non-swap streams touching `account` for
    /// `token`, ordered by insertion id.
    fn get_matured_unaccrued_streams(&self, account: &Address, token: &Address, t: u64) -> Vec<Stream>;

    /// `MAX(start + duration)` over every stream touching `account`, across all tokens. `0` if
    /// the account has no streams at all.
    fn max_end_ts_for_account(&self, account: &Address) -> u64;

    /// Signed accrual deltas for every *unaccrued* stream touching `(account, token)` with
    /// `start <= t_out`: a credit of `streamed_amt(t_in)` when `account` is the receiver, a debit
    /// of `streamed_amt(t_out)` when `account` is the sender.
    fn signed_deltas(&self, account: &Address, token: &Address, t_out: u64, t_in: u64) -> Vec<SignedDelta>;

    fn create_savepoint(&mut self) -> SavepointId;
    fn rollback_to(&mut self, savepoint: SavepointId);
    fn release(&mut self, savepoint: SavepointId);
}

/// Reference [`LedgerStore`] implementation backed entirely by ordered in-process maps.
///
/// Savepoints are implemented by snapshotting the whole store on `create_savepoint` and restoring
/// it wholesale on `rollback_to`; this is the simplest faithful rendition of the relational
/// `SAVEPOINT`/`ROLLBACK TO SAVEPOINT` pair the distillation source's `future_balance_of` relies
/// on, and at this store's scale cloning a handful of `BTreeMap`s is cheap relative to correctness.
#[derive(Clone, Debug, Default)]
pub struct InMemoryLedgerStore {
    accounts: std::collections::BTreeSet<Address>,
    tokens: std::collections::BTreeSet<Address>,
    balances: BTreeMap<(Address, Address), Amount>,
    total_assets: BTreeMap<Address, Amount>,
    total_shares: BTreeMap<Address, Amount>,
    streams: BTreeMap<StreamId, Stream>,
    next_stream_id: StreamId,
    savepoints: Vec<(u64, InMemorySnapshot)>,
    next_savepoint_id: u64,
}

#[derive(Clone, Debug)]
struct InMemorySnapshot {
    accounts: std::collections::BTreeSet<Address>,
    tokens: std::collections::BTreeSet<Address>,
    balances: BTreeMap<(Address, Address), Amount>,
    total_assets: BTreeMap<Address, Amount>,
    total_shares: BTreeMap<Address, Amount>,
    streams: BTreeMap<StreamId, Stream>,
    next_stream_id: StreamId,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot(&self) -> InMemorySnapshot {
        InMemorySnapshot {
            accounts: self.accounts.clone(),
            tokens: self.tokens.clone(),
            balances: self.balances.clone(),
            total_assets: self.total_assets.clone(),
            total_shares: self.total_shares.clone(),
            streams: self.streams.clone(),
            next_stream_id: self.next_stream_id,
        }
    }

    fn restore(&mut self, snap: InMemorySnapshot) {
        self.accounts = snap.accounts;
        self.tokens = snap.tokens;
        self.balances = snap.balances;
        self.total_assets = snap.total_assets;
        self.total_shares = snap.total_shares;
        self.streams = snap.streams;
        self.next_stream_id = snap.next_stream_id;
    }

    fn touches(stream: &Stream, account: &Address, token: &Address) -> bool {
        &stream.token == token && (&stream.from == account || &stream.to == account)
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn create_account_if_not_exists(&mut self, account: &Address) {
        self.accounts.insert(*account);
    }

    fn create_token_if_not_exists(&mut self, token: &Address) {
        self.create_account_if_not_exists(token);
        self.tokens.insert(*token);
        self.total_assets.entry(*token).or_insert_with(Amount::zero);
        self.total_shares.entry(*token).or_insert_with(Amount::zero);
    }

    fn get_balance(&self, account: &Address, token: &Address) -> Amount {
        self.balances
            .get(&(*account, *token))
            .copied()
            .unwrap_or_else(Amount::zero)
    }

    fn set_balance(&mut self, account: &Address, token: &Address, shares: Amount) {
        self.balances.insert((*account, *token), shares);
    }

    fn get_total_assets(&self, token: &Address) -> Amount {
        self.total_assets.get(token).copied().unwrap_or_else(Amount::zero)
    }

    fn set_total_assets(&mut self, token: &Address, value: Amount) {
        self.total_assets.insert(*token, value);
    }

    fn get_total_shares(&self, token: &Address) -> Amount {
        self.total_shares.get(token).copied().unwrap_or_else(Amount::zero)
    }

    fn set_total_shares(&mut self, token: &Address, value: Amount) {
        self.total_shares.insert(*token, value);
    }

    fn insert_stream(&mut self, new: NewStream) -> StreamId {
        self.create_account_if_not_exists(&new.from);
        self.create_account_if_not_exists(&new.to);
        self.create_token_if_not_exists(&new.token);

        let id = self.next_stream_id;
        self.next_stream_id += 1;
        self.streams.insert(
            id,
            Stream {
                id,
                from: new.from,
                to: new.to,
                start_ts: new.start_ts,
                duration: new.duration,
                amount: new.amount,
                token: new.token,
                accrued: false,
                swap_id: new.swap_id,
            },
        );
        id
    }

    fn update_stream_amount_duration(
        &mut self,
        id: StreamId,
        duration: u64,
        amount: Amount,
    ) -> LedgerResult<()> {
        let stream = self
            .streams
            .get_mut(&id)
            .ok_or_else(|| LedgerError::not_found(format!("stream {id}")))?;
        stream.duration = duration;
        stream.amount = amount;
        Ok(())
    }

    fn set_stream_accrued(&mut self, id: StreamId, accrued: bool) -> LedgerResult<()> {
        let stream = self
            .streams
            .get_mut(&id)
            .ok_or_else(|| LedgerError::not_found(format!("stream {id}")))?;
        stream.accrued = accrued;
        Ok(())
    }

    fn delete_stream(&mut self, id: StreamId) -> LedgerResult<()> {
        self.streams
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| LedgerError::not_found(format!("stream {id}")))
    }

    fn get_stream(&self, id: StreamId) -> Option<Stream> {
        self.streams.get(&id).cloned()
    }

    fn get_streams_for_account(&self, account: &Address, token: &Address) -> Vec<Stream> {
        self.streams
            .values()
            .filter(|s| Self::touches(s, account, token))
            .cloned()
            .collect()
    }

    fn get_matured_unaccrued_streams(&self, account: &Address, token: &Address, t: u64) -> Vec<Stream> {
        self.streams
            .values()
            .filter(|s| {
                Self::touches(s, account, token)
                    && !s.accrued
                    && s.swap_id.is_none()
                    && s.end_ts() <= t
            })
            .cloned()
            .collect()
    }

    fn max_end_ts_for_account(&self, account: &Address) -> u64 {
        self.streams
            .values()
            .filter(|s| &s.from == account || &s.to == account)
            .map(|s| s.end_ts())
            .max()
            .unwrap_or(0)
    }

    fn signed_deltas(&self, account: &Address, token: &Address, t_out: u64, t_in: u64) -> Vec<SignedDelta> {
        self.streams
            .values()
            .filter(|s| Self::touches(s, account, token) && !s.accrued && s.start_ts <= t_out)
            .map(|s| {
                if &s.to == account {
                    (true, s.streamed_amt(t_in))
                } else {
                    (false, s.streamed_amt(t_out))
                }
            })
            .collect()
    }

    fn create_savepoint(&mut self) -> SavepointId {
        let id = self.next_savepoint_id;
        self.next_savepoint_id += 1;
        self.savepoints.push((id, self.snapshot()));
        SavepointId(id)
    }

    fn rollback_to(&mut self, savepoint: SavepointId) {
        while let Some((id, snap)) = self.savepoints.pop() {
            if id == savepoint.0 {
                self.restore(snap);
                return;
            }
        }
    }

    fn release(&mut self, savepoint: SavepointId) {
        self.savepoints.retain(|(id, _)| *id != savepoint.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> Address {
        Address::from_bytes([b; 20])
    }

    #[test]
    fn balance_defaults_to_zero() {
        let store = InMemoryLedgerStore::new();
        assert_eq!(store.get_balance(&addr(1), &addr(2)), Amount::zero());
    }

    #[test]
    fn savepoint_rollback_restores_prior_state() {
        let mut store = InMemoryLedgerStore::new();
        store.set_balance(&addr(1), &addr(2), Amount::from(100u64));
        let sp = store.create_savepoint();
        store.set_balance(&addr(1), &addr(2), Amount::from(999u64));
        assert_eq!(store.get_balance(&addr(1), &addr(2)), Amount::from(999u64));
        store.rollback_to(sp);
        assert_eq!(store.get_balance(&addr(1), &addr(2)), Amount::from(100u64));
    }

    #[test]
    fn nested_savepoint_rollback_does_not_disturb_parent() {
        let mut store = InMemoryLedgerStore::new();
        store.set_balance(&addr(1), &addr(2), Amount::from(1u64));
        let outer = store.create_savepoint();
        store.set_balance(&addr(1), &addr(2), Amount::from(2u64));
        let inner = store.create_savepoint();
        store.set_balance(&addr(1), &addr(2), Amount::from(3u64));
        store.rollback_to(inner);
        assert_eq!(store.get_balance(&addr(1), &addr(2)), Amount::from(2u64));
        store.rollback_to(outer);
        assert_eq!(store.get_balance(&addr(1), &addr(2)), Amount::from(1u64));
    }

    #[test]
    fn insert_stream_assigns_monotonic_ids() {
        let mut store = InMemoryLedgerStore::new();
        let new = |to: Address| NewStream {
            from: addr(1),
            to,
            start_ts: 0,
            duration: 10,
            amount: Amount::from(5u64),
            token: addr(9),
            swap_id: None,
        };
        let id1 = store.insert_stream(new(addr(2)));
        let id2 = store.insert_stream(new(addr(3)));
        assert!(id2 > id1);
    }

    #[test]
    fn matured_unaccrued_excludes_swap_tagged() {
        let mut store = InMemoryLedgerStore::new();
        store.insert_stream(NewStream {
            from: addr(1),
            to: addr(2),
            start_ts: 0,
            duration: 10,
            amount: Amount::from(5u64),
            token: addr(9),
            swap_id: Some(42),
        });
        let matured = store.get_matured_unaccrued_streams(&addr(1), &addr(9), 100);
        assert!(matured.is_empty());
    }
}
