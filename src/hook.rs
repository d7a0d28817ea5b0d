//! The external settlement-extension hook (SPEC_FULL.md §6).
//!
//! The distillation source's `hook()` is a trivial function returning `true`, reserved for future
//! swap/pair integration; this crate treats it as an opaque boolean extension point invoked after
//! settlement and inside `future_*` read projections, and never branches on its return value
//! itself (the contract is "it must be safe to roll back", not "it changes control flow here").

use crate::address::Address;

/// A side-effectful extension point invoked at the end of settlement and inside `future_*` read
/// projections. Implementors must be safe to call inside a savepoint that may be rolled back.
pub trait SettlementHook {
    fn hook(&mut self, token: &Address, account: &Address, t: u64) -> bool;
}

/// The default hook for callers with no extension to wire in: always returns `true`, exactly
/// matching the distillation source's unconditional `hook()` body.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopHook;

impl SettlementHook for NoopHook {
    fn hook(&mut self, _token: &Address, _account: &Address, _t: u64) -> bool {
        true
    }
}
