//! Time-vested transfer records.
//!
//! A `Stream` is immutable by design: the only permitted mutations are the ones §4.5 (settlement)
//! and §4.6 (`cancel_stream`) name explicitly, and those go through the ledger store rather than
//! field assignment on a value the caller holds.

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::numeric::Amount;

/// Monotonic stream identifier, assigned by the store on insertion.
pub type StreamId = u64;

/// A single time-vested transfer of `amount` from `from` to `to`, delivered linearly over
/// `duration` starting at `start_ts`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stream {
    pub id: StreamId,
    pub from: Address,
    pub to: Address,
    pub start_ts: u64,
    pub duration: u64,
    pub amount: Amount,
    pub token: Address,
    pub accrued: bool,
    /// Opaque foreign key into swap/pair machinery this core never interprets, beyond excluding
    /// swap-tagged streams from settlement's matured-stream scan.
    pub swap_id: Option<u64>,
}

impl Stream {
    /// `true` once `t >= start_ts`.
    pub fn has_started(&self, t: u64) -> bool {
        t >= self.start_ts
    }

    /// `true` once `t >= start_ts + duration`.
    pub fn has_ended(&self, t: u64) -> bool {
        t >= self.start_ts.saturating_add(self.duration)
    }

    /// `true` when the stream has started but not yet ended.
    pub fn is_active(&self, t: u64) -> bool {
        self.has_started(t) && !self.has_ended(t)
    }

    /// The end timestamp, `start_ts + duration`.
    pub fn end_ts(&self) -> u64 {
        self.start_ts.saturating_add(self.duration)
    }

    /// The amount vested by time `t`: `0` before `start_ts`, `amount` at or after `end_ts()`,
    /// linear in between. Zero-duration streams vest immediately at `t == start_ts`.
    pub fn streamed_amt(&self, t: u64) -> Amount {
        if t < self.start_ts {
            return Amount::zero();
        }
        if self.has_ended(t) {
            return self.amount;
        }
        // 0 < elapsed < duration here, so duration != 0.
        let elapsed = Amount::from(t - self.start_ts);
        let duration = Amount::from(self.duration);
        crate::numeric::mul_div(self.amount, elapsed, duration, crate::numeric::Rounding::Down)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(start: u64, duration: u64, amount: u64) -> Stream {
        Stream {
            id: 1,
            from: Address::from_bytes([1; 20]),
            to: Address::from_bytes([2; 20]),
            start_ts: start,
            duration,
            amount: Amount::from(amount),
            token: Address::from_bytes([3; 20]),
            accrued: false,
            swap_id: None,
        }
    }

    #[test]
    fn before_start_is_zero() {
        let s = stream(100, 1000, 500);
        assert_eq!(s.streamed_amt(50), Amount::zero());
        assert!(!s.has_started(50));
    }

    #[test]
    fn after_end_is_full_amount() {
        let s = stream(0, 1000, 500);
        assert_eq!(s.streamed_amt(1000), Amount::from(500u64));
        assert_eq!(s.streamed_amt(5000), Amount::from(500u64));
        assert!(s.has_ended(1000));
    }

    #[test]
    fn midpoint_is_linear() {
        let s = stream(0, 1000, 100);
        assert_eq!(s.streamed_amt(500), Amount::from(50u64));
        assert!(s.is_active(500));
    }

    #[test]
    fn zero_duration_vests_immediately_at_start() {
        let s = stream(10, 0, 100);
        assert_eq!(s.streamed_amt(10), Amount::from(100u64));
        assert_eq!(s.streamed_amt(9), Amount::zero());
    }
}
