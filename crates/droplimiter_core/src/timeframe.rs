//! # Time Frames
//!
//! A length of time written as an optional count and a unit: `sec`, `5min`,
//! `2hour`, `day`, `3week`, `year`. Every time frame reduces to a whole,
//! positive number of seconds.
//!
//! A `year` is 52 weeks, not a calendar year. Rate windows written in years
//! have always meant exactly `52 × 7 × 86400` seconds and must keep meaning
//! that.

use std::fmt;
use std::str::FromStr;

use crate::error::{LimiterError, LimiterResult};

/// A unit of time, cleanly convertible to seconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    /// One second.
    Second,
    /// 60 seconds.
    Minute,
    /// 60 minutes.
    Hour,
    /// 24 hours.
    Day,
    /// 7 days.
    Week,
    /// 52 weeks.
    Year,
}

impl TimeUnit {
    /// All units, shortest first.
    pub const ALL: [Self; 6] = [
        Self::Second,
        Self::Minute,
        Self::Hour,
        Self::Day,
        Self::Week,
        Self::Year,
    ];

    /// Number of seconds in one unit.
    #[inline]
    #[must_use]
    pub const fn seconds(self) -> u64 {
        match self {
            Self::Second => 1,
            Self::Minute => 60,
            Self::Hour => 60 * 60,
            Self::Day => 60 * 60 * 24,
            Self::Week => 60 * 60 * 24 * 7,
            Self::Year => 60 * 60 * 24 * 7 * 52,
        }
    }

    /// The token used in drop files.
    #[inline]
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::Second => "sec",
            Self::Minute => "min",
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
            Self::Year => "year",
        }
    }

    /// Looks up a unit by its exact token.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|unit| unit.token() == token)
    }
}

/// A length of time: a positive count of some unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimeFrame {
    count: u64,
    unit: TimeUnit,
}

impl TimeFrame {
    /// Creates a time frame.
    ///
    /// # Errors
    ///
    /// Returns `LimiterError::InvalidTimeFrame` if `count` is zero or the
    /// frame does not fit in `u64` seconds.
    pub fn new(count: u64, unit: TimeUnit) -> LimiterResult<Self> {
        let invalid = |reason: &str| LimiterError::InvalidTimeFrame {
            token: format!("{count}{}", unit.token()),
            reason: reason.to_string(),
        };

        if count == 0 {
            return Err(invalid("count must be positive"));
        }
        if count.checked_mul(unit.seconds()).is_none() {
            return Err(invalid("too long"));
        }
        Ok(Self { count, unit })
    }

    /// Parses a string like `sec` or `5min`.
    ///
    /// The leading digit run is the count (1 when absent); the rest must be
    /// exactly one of the unit tokens.
    ///
    /// # Errors
    ///
    /// Returns `LimiterError::InvalidTimeFrame` for unknown units, a zero
    /// count or a count that overflows.
    pub fn parse(text: &str) -> LimiterResult<Self> {
        let invalid = |reason: String| LimiterError::InvalidTimeFrame {
            token: text.to_string(),
            reason,
        };

        let digits = text.bytes().take_while(u8::is_ascii_digit).count();
        let (count, unit) = text.split_at(digits);

        let count = if count.is_empty() {
            1
        } else {
            count
                .parse::<u64>()
                .map_err(|_| invalid("count too large".to_string()))?
        };

        let unit = TimeUnit::from_token(unit).ok_or_else(|| {
            let expected: Vec<&str> = TimeUnit::ALL.iter().map(|u| u.token()).collect();
            invalid(format!("unknown unit [{unit}], expected one of {}", expected.join(", ")))
        })?;

        Self::new(count, unit).map_err(|_| {
            invalid(if count == 0 {
                "count must be positive".to_string()
            } else {
                "too long".to_string()
            })
        })
    }

    /// The count of units.
    #[inline]
    #[must_use]
    pub const fn count(&self) -> u64 {
        self.count
    }

    /// The unit.
    #[inline]
    #[must_use]
    pub const fn unit(&self) -> TimeUnit {
        self.unit
    }

    /// Total length in seconds. Always positive.
    #[inline]
    #[must_use]
    pub const fn to_seconds(&self) -> u64 {
        self.count * self.unit.seconds()
    }
}

impl FromStr for TimeFrame {
    type Err = LimiterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for TimeFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.count, self.unit.token())
    }
}
