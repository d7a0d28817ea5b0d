//! `process_streams`: folds matured, unaccrued streams into stored share balances.
//!
//! Runs automatically before every mutating token operation that takes `(sender,
//! current_timestamp)` (SPEC_FULL.md §4.7); the pre-op hook is an explicit call at the top of each
//! such operation, not a decorator, per the distillation source's `process_streams_before` being
//! re-expressed structurally (SPEC_FULL.md §9).

use tracing::debug;

use crate::address::Address;
use crate::hook::SettlementHook;
use crate::numeric::{assets_to_shares, shares_to_assets, Amount};
use crate::store::LedgerStore;

fn stored_balance(store: &dyn LedgerStore, account: &Address, token: &Address) -> Amount {
    let shares = store.get_balance(account, token);
    let ts = store.get_total_shares(token);
    let ta = store.get_total_assets(token);
    shares_to_assets(shares, ts, ta)
}

fn persist_balance(store: &mut dyn LedgerStore, account: &Address, token: &Address, balance: Amount) {
    let ts = store.get_total_shares(token);
    let ta = store.get_total_assets(token);
    let shares = assets_to_shares(balance, ts, ta);
    store.set_balance(account, token, shares);
}

/// Accrues every matured, unaccrued, non-swap stream touching `(account, token)` into stored
/// shares, using a single stable `(total_shares, total_assets)` basis for the whole batch so a
/// sequence of stream settlements cannot compound rounding against either party. Then invokes the
/// external hook.
pub fn process_streams(
    store: &mut dyn LedgerStore,
    hook: &mut dyn SettlementHook,
    account: &Address,
    token: &Address,
    t: u64,
) {
    let matured = store.get_matured_unaccrued_streams(account, token, t);
    if matured.is_empty() {
        hook.hook(token, account, t);
        return;
    }

    let mut balance = stored_balance(store, account, token);

    for stream in &matured {
        store
            .set_stream_accrued(stream.id, true)
            .expect("stream looked up from the store must still exist");
        let delta = stream.streamed_amt(t);

        if &stream.from == account {
            balance = balance.saturating_sub(delta);
            let counterparty_balance = stored_balance(store, &stream.to, token).saturating_add(delta);
            persist_balance(store, &stream.to, token, counterparty_balance);
            debug!(stream_id = stream.id, from = %account, to = %stream.to, amount = %delta, "settled outbound stream leg");
        } else {
            balance = balance.saturating_add(delta);
            let counterparty_balance = stored_balance(store, &stream.from, token).saturating_sub(delta);
            persist_balance(store, &stream.from, token, counterparty_balance);
            debug!(stream_id = stream.id, from = %stream.from, to = %account, amount = %delta, "settled inbound stream leg");
        }
    }

    persist_balance(store, account, token, balance);
    hook.hook(token, account, t);
}
