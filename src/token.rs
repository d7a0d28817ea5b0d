//! Token operations: the mutating half of the public contract (SPEC_FULL.md §4.6, §6).
//!
//! `Ledger` is the public contract of the token ledger, parameterized by a store handle, a
//! settlement hook, and the token's own address — exactly the `(store_handle, token_address)`
//! parameterization SPEC_FULL.md §6 names. Every mutator that SPEC_FULL.md marks `[settles first]`
//! calls [`crate::settlement::process_streams`] as its first statement.

use tracing::{info, instrument};

use crate::address::Address;
use crate::balance;
use crate::error::{LedgerError, LedgerResult};
use crate::hook::SettlementHook;
use crate::numeric::{assets_to_shares, shares_to_assets, Amount};
use crate::settlement::process_streams;
use crate::store::{LedgerStore, NewStream};
use crate::stream::{Stream, StreamId};

/// The public contract of one token's ledger: a store handle, a settlement hook, and the token's
/// own address. Borrows the store and hook for its lifetime rather than owning them, so a single
/// store can back many tokens and many `Ledger` values can be constructed cheaply per call.
pub struct Ledger<'a> {
    store: &'a mut dyn LedgerStore,
    hook: &'a mut dyn SettlementHook,
    token: Address,
}

impl<'a> Ledger<'a> {
    /// Opens the ledger for `token`, idempotently creating it (and its underlying account) in the
    /// store if this is the first reference.
    pub fn new(store: &'a mut dyn LedgerStore, hook: &'a mut dyn SettlementHook, token: Address) -> Self {
        store.create_token_if_not_exists(&token);
        Ledger { store, hook, token }
    }

    /// Opens the ledger for a token given as a raw address string, the entry point for a caller
    /// that holds only wire-format text rather than an already-constructed [`Address`] — routes
    /// through [`crate::guards::normalize_address`] before anything else runs.
    pub fn open(
        store: &'a mut dyn LedgerStore,
        hook: &'a mut dyn SettlementHook,
        token: &str,
    ) -> LedgerResult<Self> {
        let token = crate::guards::normalize_address(token)?;
        Ok(Self::new(store, hook, token))
    }

    fn settle(&mut self, account: &Address, t: u64) {
        process_streams(self.store, self.hook, account, &self.token, t);
    }

    pub fn get_address(&self) -> Address {
        self.token
    }

    pub fn get_stored_balance(&self, wallet: &Address) -> Amount {
        let shares = self.store.get_balance(wallet, &self.token);
        let ts = self.store.get_total_shares(&self.token);
        let ta = self.store.get_total_assets(&self.token);
        shares_to_assets(shares, ts, ta)
    }

    /// `== total_assets`.
    pub fn get_stored_total_supply(&self) -> Amount {
        self.store.get_total_assets(&self.token)
    }

    pub fn balance_of(
        &self,
        wallet: &Address,
        at_ts: u64,
        count_received: bool,
        recipient_until_ts: u64,
    ) -> Amount {
        balance::balance_of(self.store, wallet, &self.token, at_ts, count_received, recipient_until_ts)
    }

    pub fn future_balance_of(&mut self, wallet: &Address, future_ts: Option<u64>) -> Amount {
        balance::future_balance_of(self.store, self.hook, wallet, &self.token, future_ts)
    }

    pub fn get_streams(&self, wallet: &Address) -> Vec<Stream> {
        balance::get_streams(self.store, wallet, &self.token)
    }

    pub fn future_get_streams(&mut self, wallet: &Address, future_ts: Option<u64>) -> Vec<Stream> {
        balance::future_get_streams(self.store, self.hook, wallet, &self.token, future_ts)
    }

    /// Increases `total_shares` by `s` and `wallet`'s stored shares by `s`; `total_assets`
    /// unchanged. Used internally by [`Ledger::mint_assets`]; calling it alone does not itself
    /// violate (I1) only because every external caller pairs it with a matching `total_assets`
    /// change.
    #[instrument(skip(self), fields(token = %self.token))]
    pub fn mint_shares(&mut self, shares: Amount, wallet: &Address) -> LedgerResult<()> {
        if shares.is_zero() {
            return Err(LedgerError::validation("mint_shares requires shares > 0"));
        }
        self.store.create_account_if_not_exists(wallet);
        let ts = self.store.get_total_shares(&self.token);
        self.store.set_total_shares(&self.token, ts + shares);
        let bal = self.store.get_balance(wallet, &self.token);
        self.store.set_balance(wallet, &self.token, bal + shares);
        info!(%wallet, %shares, "minted shares");
        Ok(())
    }

    /// Bootstraps a token at a 1:1 share:asset ratio on first mint, then mints shares
    /// proportional to the existing ratio.
    #[instrument(skip(self), fields(token = %self.token))]
    pub fn mint_assets(&mut self, assets: Amount, wallet: &Address) -> LedgerResult<()> {
        if assets.is_zero() {
            return Err(LedgerError::validation("mint_assets requires assets > 0"));
        }
        let ta = self.store.get_total_assets(&self.token);
        let ts = self.store.get_total_shares(&self.token);
        let new_shares = if ta.is_zero() {
            assets
        } else {
            assets_to_shares(assets, ts, ta)
        };
        self.store.set_total_assets(&self.token, ta + assets);
        self.mint_shares(new_shares, wallet)?;
        info!(%wallet, %assets, "minted assets");
        Ok(())
    }

    /// Sets `total_assets := new_total_assets`. `total_shares` and every stored share balance are
    /// unchanged; every asset balance scales proportionally as a result.
    #[instrument(skip(self), fields(token = %self.token))]
    pub fn rebase(&mut self, new_total_assets: Amount) -> LedgerResult<()> {
        self.store.set_total_assets(&self.token, new_total_assets);
        info!(%new_total_assets, "rebased token");
        Ok(())
    }

    /// Burns the shares equivalent to `assets` worth of value from `sender`, settling first.
    #[instrument(skip(self), fields(token = %self.token))]
    pub fn burn_assets(&mut self, assets: Amount, sender: &Address, t: u64) -> LedgerResult<()> {
        self.settle(sender, t);
        if assets.is_zero() {
            return Err(LedgerError::validation("burn_assets requires assets > 0"));
        }

        let ts = self.store.get_total_shares(&self.token);
        let ta = self.store.get_total_assets(&self.token);
        let shares_to_burn = assets_to_shares(assets, ts, ta);
        let stored_shares = self.store.get_balance(sender, &self.token);
        if shares_to_burn > stored_shares {
            return Err(LedgerError::InsufficientBalance {
                account: *sender,
                requested: assets,
                available: shares_to_assets(stored_shares, ts, ta),
            });
        }

        self.store.set_balance(sender, &self.token, stored_shares - shares_to_burn);
        self.store.set_total_assets(&self.token, ta - assets);
        self.store.set_total_shares(&self.token, ts - shares_to_burn);
        info!(%sender, %assets, "burned assets");
        Ok(())
    }

    /// Burns `amount` shares directly from `sender`, settling first. Callers are responsible for
    /// keeping `total_assets`/`total_shares` consistent; this primitive intentionally does not
    /// touch them (it exists for withdraw paths layered on top of this core).
    #[instrument(skip(self), fields(token = %self.token))]
    pub fn burn_shares(&mut self, amount: Amount, sender: &Address, t: u64) -> LedgerResult<()> {
        self.settle(sender, t);
        if amount.is_zero() {
            return Err(LedgerError::validation("burn_shares requires amount > 0"));
        }

        let stored_shares = self.store.get_balance(sender, &self.token);
        if amount > stored_shares {
            let ts = self.store.get_total_shares(&self.token);
            let ta = self.store.get_total_assets(&self.token);
            return Err(LedgerError::InsufficientBalance {
                account: *sender,
                requested: amount,
                available: shares_to_assets(stored_shares, ts, ta),
            });
        }
        self.store.set_balance(sender, &self.token, stored_shares - amount);
        info!(%sender, %amount, "burned shares");
        Ok(())
    }

    /// Opens a new time-vested transfer stream from `sender` to `receiver`, settling `sender`
    /// first. Rejects the transfer if `sender`'s projected balance at the solvency horizon cannot
    /// cover `amount`.
    #[instrument(skip(self), fields(token = %self.token))]
    #[allow(clippy::too_many_arguments)]
    pub fn transfer(
        &mut self,
        receiver: &Address,
        amount: Amount,
        duration: u64,
        start_ts: u64,
        sender: &Address,
        t: u64,
        swap_id: Option<u64>,
    ) -> LedgerResult<StreamId> {
        self.settle(sender, t);
        if sender == receiver {
            return Err(LedgerError::validation("sender and receiver must differ"));
        }

        let effective_start = if start_ts == 0 { t } else { start_ts };
        if effective_start < t {
            return Err(LedgerError::validation(format!(
                "start_ts {effective_start} is before current_timestamp {t}"
            )));
        }

        let sender_max_end = self.store.max_end_ts_for_account(sender);
        let horizon = effective_start.saturating_add(duration).max(sender_max_end);

        let projected = balance::balance_of(self.store, sender, &self.token, horizon, false, t);
        if projected < amount {
            return Err(LedgerError::InsufficientBalance {
                account: *sender,
                requested: amount,
                available: projected,
            });
        }

        let id = self.store.insert_stream(NewStream {
            from: *sender,
            to: *receiver,
            start_ts: effective_start,
            duration,
            amount,
            token: self.token,
            swap_id,
        });
        info!(%sender, %receiver, %amount, duration, start_ts = effective_start, stream_id = id, "opened stream");
        Ok(id)
    }

    /// Cancels `id`, settling `sender` first. Deletes the stream outright if it has not yet
    /// started; otherwise truncates it in place to exactly what has vested by `t`.
    #[instrument(skip(self), fields(token = %self.token))]
    pub fn cancel_stream(&mut self, id: StreamId, sender: &Address, t: u64) -> LedgerResult<()> {
        self.settle(sender, t);

        let stream = self
            .store
            .get_stream(id)
            .ok_or_else(|| LedgerError::not_found(format!("stream {id}")))?;
        if stream.from != *sender {
            return Err(LedgerError::unauthorized(format!(
                "stream {id} belongs to {}",
                stream.from
            )));
        }
        if stream.end_ts() < t {
            return Err(LedgerError::illegal_state(format!(
                "stream {id} already ended at {}",
                stream.end_ts()
            )));
        }

        if t < stream.start_ts {
            self.store.delete_stream(id)?;
            info!(stream_id = id, "cancelled stream before it started");
        } else {
            let new_duration = t - stream.start_ts;
            let new_amount = stream.streamed_amt(t);
            self.store.update_stream_amount_duration(id, new_duration, new_amount)?;
            info!(stream_id = id, new_duration, %new_amount, "truncated stream at cancellation");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hook::NoopHook;
    use crate::store::InMemoryLedgerStore;

    fn addr(b: u8) -> Address {
        Address::from_bytes([b; 20])
    }

    fn ledger(store: &mut InMemoryLedgerStore, hook: &mut NoopHook) -> Ledger<'_> {
        Ledger::new(store, hook, addr(9))
    }

    #[test]
    fn init_fresh_token_has_zero_supply_and_balances() {
        let mut store = InMemoryLedgerStore::new();
        let mut hook = NoopHook;
        let l = ledger(&mut store, &mut hook);
        assert_eq!(l.get_stored_total_supply(), Amount::zero());
        assert_eq!(l.get_stored_balance(&addr(1)), Amount::zero());
    }

    #[test]
    fn mint_then_balance() {
        let mut store = InMemoryLedgerStore::new();
        let mut hook = NoopHook;
        let mut l = ledger(&mut store, &mut hook);
        l.mint_assets(Amount::from(1000u64), &addr(1)).unwrap();
        assert_eq!(l.get_stored_balance(&addr(1)), Amount::from(1000u64));
        assert_eq!(l.get_stored_total_supply(), Amount::from(1000u64));
    }

    #[test]
    fn half_stream_scenario() {
        let mut store = InMemoryLedgerStore::new();
        let mut hook = NoopHook;
        let (s, r) = (addr(1), addr(2));
        let mut l = ledger(&mut store, &mut hook);
        l.mint_assets(Amount::from(100u64), &s).unwrap();
        l.transfer(&r, Amount::from(100u64), 1000, 0, &s, 0, None).unwrap();

        assert_eq!(l.balance_of(&r, 500, true, 500), Amount::from(50u64));
        assert_eq!(l.balance_of(&s, 500, true, 500), Amount::from(50u64));
        assert_eq!(l.balance_of(&r, 1000, true, 1000), Amount::from(100u64));
        assert_eq!(l.balance_of(&s, 1000, true, 1000), Amount::zero());
    }

    #[test]
    fn overdraft_rejected() {
        let mut store = InMemoryLedgerStore::new();
        let mut hook = NoopHook;
        let (s, r) = (addr(1), addr(2));
        let mut l = ledger(&mut store, &mut hook);
        l.mint_assets(Amount::from(100u64), &s).unwrap();

        let err = l
            .transfer(&r, Amount::from(200u64), 1000, 0, &s, 0, None)
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));

        l.transfer(&r, Amount::from(50u64), 1000, 0, &s, 0, None).unwrap();

        let err2 = l
            .transfer(&r, Amount::from(26u64), 1000, 600, &s, 500, None)
            .unwrap_err();
        assert!(matches!(err2, LedgerError::InsufficientBalance { .. }));
    }

    #[test]
    fn rebase_doubles_balances() {
        let mut store = InMemoryLedgerStore::new();
        let mut hook = NoopHook;
        let (s, r) = (addr(1), addr(2));
        let mut l = ledger(&mut store, &mut hook);
        l.mint_assets(Amount::from(1000u64), &s).unwrap();
        l.mint_assets(Amount::from(500u64), &r).unwrap();
        l.rebase(Amount::from(3000u64)).unwrap();
        assert_eq!(l.get_stored_balance(&s), Amount::from(2000u64));
        assert_eq!(l.get_stored_balance(&r), Amount::from(1000u64));
    }

    #[test]
    fn cancel_mid_stream_truncates_in_place() {
        let mut store = InMemoryLedgerStore::new();
        let mut hook = NoopHook;
        let (s, r) = (addr(1), addr(2));
        let mut l = ledger(&mut store, &mut hook);
        l.mint_assets(Amount::from(100u64), &s).unwrap();
        let id = l.transfer(&r, Amount::from(100u64), 1000, 0, &s, 0, None).unwrap();
        l.cancel_stream(id, &s, 500).unwrap();

        assert_eq!(l.balance_of(&r, 500, true, 500), Amount::from(50u64));
        assert_eq!(l.balance_of(&s, 500, true, 500), Amount::from(50u64));
        assert_eq!(l.balance_of(&r, 2000, true, 2000), Amount::from(50u64));
        assert_eq!(l.balance_of(&s, 2000, true, 2000), Amount::from(50u64));
    }

    #[test]
    fn zero_duration_stream_vests_immediately() {
        let mut store = InMemoryLedgerStore::new();
        let mut hook = NoopHook;
        let (s, r) = (addr(1), addr(2));
        let mut l = ledger(&mut store, &mut hook);
        l.mint_assets(Amount::from(100u64), &s).unwrap();
        l.transfer(&r, Amount::from(50u64), 0, 0, &s, 0, None).unwrap();
        assert_eq!(l.balance_of(&r, 0, true, 0), Amount::from(50u64));
        assert_eq!(l.balance_of(&s, 0, true, 0), Amount::from(50u64));
    }

    #[test]
    fn cancel_before_start_deletes_stream() {
        let mut store = InMemoryLedgerStore::new();
        let mut hook = NoopHook;
        let (s, r) = (addr(1), addr(2));
        let mut l = ledger(&mut store, &mut hook);
        l.mint_assets(Amount::from(100u64), &s).unwrap();
        let id = l.transfer(&r, Amount::from(50u64), 1000, 100, &s, 0, None).unwrap();
        l.cancel_stream(id, &s, 50).unwrap();
        assert!(l.get_stream_missing(id));
    }

    #[test]
    fn cancel_unauthorized_sender_rejected() {
        let mut store = InMemoryLedgerStore::new();
        let mut hook = NoopHook;
        let (s, r, other) = (addr(1), addr(2), addr(3));
        let mut l = ledger(&mut store, &mut hook);
        l.mint_assets(Amount::from(100u64), &s).unwrap();
        let id = l.transfer(&r, Amount::from(50u64), 1000, 0, &s, 0, None).unwrap();
        let err = l.cancel_stream(id, &other, 10).unwrap_err();
        assert!(matches!(err, LedgerError::Unauthorized(_)));
    }

    #[test]
    fn cancel_already_ended_rejected() {
        let mut store = InMemoryLedgerStore::new();
        let mut hook = NoopHook;
        let (s, r) = (addr(1), addr(2));
        let mut l = ledger(&mut store, &mut hook);
        l.mint_assets(Amount::from(100u64), &s).unwrap();
        let id = l.transfer(&r, Amount::from(50u64), 100, 0, &s, 0, None).unwrap();
        let err = l.cancel_stream(id, &s, 200).unwrap_err();
        assert!(matches!(err, LedgerError::IllegalState(_)));
    }

    #[test]
    fn cancel_exactly_at_end_is_permitted_identity_mutation() {
        let mut store = InMemoryLedgerStore::new();
        let mut hook = NoopHook;
        let (s, r) = (addr(1), addr(2));
        let mut l = ledger(&mut store, &mut hook);
        l.mint_assets(Amount::from(100u64), &s).unwrap();
        let id = l.transfer(&r, Amount::from(50u64), 100, 0, &s, 0, None).unwrap();
        l.cancel_stream(id, &s, 100).unwrap();
        assert_eq!(l.balance_of(&r, 100, true, 100), Amount::from(50u64));
    }

    #[test]
    fn burn_assets_insufficient_balance() {
        let mut store = InMemoryLedgerStore::new();
        let mut hook = NoopHook;
        let s = addr(1);
        let mut l = ledger(&mut store, &mut hook);
        l.mint_assets(Amount::from(10u64), &s).unwrap();
        let err = l.burn_assets(Amount::from(11u64), &s, 0).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
    }

    impl<'a> Ledger<'a> {
        fn get_stream_missing(&self, id: StreamId) -> bool {
            self.store.get_stream(id).is_none()
        }
    }
}
