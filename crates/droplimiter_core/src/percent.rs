//! # Fixed-Point Percentages
//!
//! **NO FLOATING POINT IN RATE CALCULATIONS**
//!
//! Drop rates are written by humans as decimals (`3%`, `0.25%`) and are then
//! scaled by partial windows (`rate × remainder / window`). Doing that in
//! `f64` makes the trial list depend on rounding; doing it in fixed point
//! makes it exact and reproducible on every machine.
//!
//! A `Percent` stores the value × 1,000,000 as a `u64`, so `100%` is
//! `100_000_000` raw and the smallest expressible rate is `0.000001%`.

use std::fmt;

use crate::error::{LimiterError, LimiterResult};

/// Number of decimal places kept after the percent point.
const DECIMAL_PLACES: u32 = 6;

/// The multiplier for 6 decimal places.
const MULTIPLIER: u64 = 10u64.pow(DECIMAL_PLACES);

/// Fixed-point percentage with 6 decimal places.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct Percent(u64);

impl Percent {
    /// 0%.
    pub const ZERO: Self = Self(0);

    /// 100%.
    pub const HUNDRED: Self = Self(100 * MULTIPLIER);

    /// Creates a percentage from a whole number of percent.
    #[inline]
    #[must_use]
    pub const fn from_whole(whole: u64) -> Self {
        Self(whole * MULTIPLIER)
    }

    /// Creates a percentage from parts.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let rate = Percent::from_parts(3, 500_000); // 3.5%
    /// ```
    #[inline]
    #[must_use]
    pub const fn from_parts(whole: u64, decimal: u32) -> Self {
        Self(whole * MULTIPLIER + (decimal as u64 % MULTIPLIER))
    }

    /// Creates a percentage from its raw internal value.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw internal value (millionths of a percent).
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Returns the whole number part.
    #[inline]
    #[must_use]
    pub const fn whole(self) -> u64 {
        self.0 / MULTIPLIER
    }

    /// Returns the decimal part (0-999999).
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn decimal(self) -> u32 {
        (self.0 % MULTIPLIER) as u32
    }

    /// Returns true if this is 0%.
    #[inline]
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Returns `self × numerator / denominator`, truncated.
    ///
    /// Computed in 128 bits so the intermediate product never overflows.
    /// A zero denominator yields 0%.
    #[inline]
    #[must_use]
    pub fn scale(self, numerator: u64, denominator: u64) -> Self {
        if denominator == 0 {
            return Self::ZERO;
        }
        let scaled = u128::from(self.0) * u128::from(numerator) / u128::from(denominator);
        Self(u64::try_from(scaled).unwrap_or(u64::MAX))
    }

    /// Parses a percentage such as `5`, `5%`, `3.5%` or `.25`.
    ///
    /// # Errors
    ///
    /// Returns `LimiterError::InvalidPercent` for empty input, signs,
    /// non-digit characters, more than six decimal places or overflow.
    pub fn parse(text: &str) -> LimiterResult<Self> {
        let invalid = |reason: &str| LimiterError::InvalidPercent {
            token: text.to_string(),
            reason: reason.to_string(),
        };

        let body = text.trim();
        let body = body.strip_suffix('%').unwrap_or(body);
        let (whole, fraction) = body.split_once('.').unwrap_or((body, ""));

        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid("expected a number"));
        }
        if !whole.bytes().all(|b| b.is_ascii_digit()) || !fraction.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("expected digits with an optional decimal point"));
        }
        if fraction.len() > DECIMAL_PLACES as usize {
            return Err(invalid("at most 6 decimal places are supported"));
        }

        let whole_value = if whole.is_empty() {
            0
        } else {
            whole.parse::<u64>().map_err(|_| invalid("value too large"))?
        };

        let mut decimal_value = 0u64;
        for digit in fraction.bytes().chain(std::iter::repeat(b'0')).take(DECIMAL_PLACES as usize) {
            decimal_value = decimal_value * 10 + u64::from(digit - b'0');
        }

        whole_value
            .checked_mul(MULTIPLIER)
            .and_then(|v| v.checked_add(decimal_value))
            .map(Self)
            .ok_or_else(|| invalid("value too large"))
    }
}

impl fmt::Debug for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Percent({}.{:06}%)", self.whole(), self.decimal())
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.decimal() == 0 {
            return write!(f, "{}", self.whole());
        }
        let fraction = format!("{:06}", self.decimal());
        write!(f, "{}.{}", self.whole(), fraction.trim_end_matches('0'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_whole() {
        assert_eq!(Percent::parse("5").unwrap(), Percent::from_whole(5));
        assert_eq!(Percent::parse("5%").unwrap(), Percent::from_whole(5));
        assert_eq!(Percent::parse("100%").unwrap(), Percent::HUNDRED);
    }

    #[test]
    fn test_parse_fraction() {
        assert_eq!(Percent::parse("3.5%").unwrap(), Percent::from_parts(3, 500_000));
        assert_eq!(Percent::parse(".25").unwrap(), Percent::from_parts(0, 250_000));
        assert_eq!(Percent::parse("0.000001%").unwrap(), Percent::from_raw(1));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for bad in ["", "%", ".", "abc", "-1", "+1", "1.2345678", "1.2.3", "5 %"] {
            assert!(
                matches!(Percent::parse(bad), Err(LimiterError::InvalidPercent { .. })),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_parse_overflow() {
        assert!(Percent::parse("99999999999999999999").is_err());
        assert!(Percent::parse("18446744073709551").is_err());
    }

    #[test]
    fn test_scale_partial_window() {
        // 10% over a day, 30 seconds elapsed
        let rate = Percent::from_whole(10);
        let partial = rate.scale(30, 86_400);
        assert_eq!(partial.raw(), 10 * 1_000_000 * 30 / 86_400);

        assert_eq!(rate.scale(0, 86_400), Percent::ZERO);
        assert_eq!(rate.scale(86_400, 86_400), rate);
        assert_eq!(rate.scale(5, 0), Percent::ZERO);
    }

    #[test]
    fn test_display() {
        assert_eq!(Percent::from_whole(5).to_string(), "5");
        assert_eq!(Percent::from_parts(3, 500_000).to_string(), "3.5");
        assert_eq!(Percent::from_raw(1).to_string(), "0.000001");
    }

    #[test]
    fn test_ordering() {
        assert!(Percent::ZERO < Percent::from_raw(1));
        assert!(Percent::from_whole(99) < Percent::HUNDRED);
    }
}
