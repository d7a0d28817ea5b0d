//! Overflow-safe integer conversions between shares and assets.
//!
//! Amounts routinely exceed 64 bits, so the canonical quantity type here is a 256-bit unsigned
//! integer. The multiply step that feeds each conversion's division widens into a 512-bit
//! intermediate before narrowing back, the same widen-then-narrow shape this lineage's share math
//! already uses at 128 bits, just scaled up to match `Amount`'s own width.

use uint::construct_uint;

construct_uint! {
    /// 256-bit unsigned integer: the canonical asset/share quantity type.
    pub struct Amount(4);
}

construct_uint! {
    /// 512-bit unsigned integer: the intermediate used by [`mul_div`] to avoid overflow.
    struct Wide(8);
}

// `construct_uint!` already generates a `Display` impl that renders decimal digits; only the
// round-trip helpers below are added on top of it.

impl Amount {
    /// Decodes a decimal string into an `Amount`. Unparseable or empty input decodes to zero,
    /// matching the distillation source's `str_to_int` default-on-failure behavior.
    pub fn from_decimal_str(s: &str) -> Amount {
        if s.is_empty() {
            return Amount::zero();
        }
        Amount::from_str_radix(s, 10).unwrap_or_else(|_| Amount::zero())
    }

    /// Encodes an `Amount` as a decimal string, the canonical persisted form.
    pub fn to_decimal_str(&self) -> String {
        self.to_string()
    }
}

/// Rounding direction for [`mul_div`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rounding {
    /// Round towards zero (floor division). Used by both conversions in this module.
    Down,
    /// Round away from zero (ceiling division). Not used by the spec's two conversions, but kept
    /// available for callers that must round in the ledger's favor.
    Up,
}

/// Computes `(x * y) / denominator` using a widened intermediate, with configurable rounding.
///
/// Returns zero if `denominator` is zero; callers that need the zero-denominator case to mean
/// something else (as both conversions below do) check for it before calling in.
pub fn mul_div(x: Amount, y: Amount, denominator: Amount, rounding: Rounding) -> Amount {
    if denominator.is_zero() {
        return Amount::zero();
    }
    let numerator = Wide::from(x) * Wide::from(y);
    let wide_denominator = Wide::from(denominator);
    let quotient = numerator / wide_denominator;
    let remainder = numerator % wide_denominator;

    let result = match rounding {
        Rounding::Down => quotient,
        Rounding::Up => {
            if remainder > Wide::zero() {
                quotient + Wide::one()
            } else {
                quotient
            }
        }
    };

    narrow(result)
}

fn narrow(wide: Wide) -> Amount {
    let mut bytes = [0u8; 64];
    wide.to_big_endian(&mut bytes);
    Amount::from_big_endian(&bytes[32..])
}

impl From<Amount> for Wide {
    fn from(a: Amount) -> Wide {
        let mut bytes = [0u8; 32];
        a.to_big_endian(&mut bytes);
        let mut wide_bytes = [0u8; 64];
        wide_bytes[32..].copy_from_slice(&bytes);
        Wide::from_big_endian(&wide_bytes)
    }
}

/// `⌊a·total_shares / total_assets⌋`, `0` if `total_assets == 0`.
pub fn assets_to_shares(a: Amount, total_shares: Amount, total_assets: Amount) -> Amount {
    if total_assets.is_zero() {
        return Amount::zero();
    }
    mul_div(a, total_shares, total_assets, Rounding::Down)
}

/// `⌊s·total_assets / total_shares⌋`, `0` if `total_shares == 0`.
pub fn shares_to_assets(s: Amount, total_shares: Amount, total_assets: Amount) -> Amount {
    if total_shares.is_zero() {
        return Amount::zero();
    }
    mul_div(s, total_assets, total_shares, Rounding::Down)
}
