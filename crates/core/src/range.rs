//! Season and episode range expressions.
//!
//! A range expression is one of:
//!
//! - empty: everything from the domain floor up to the observed maximum
//! - `N`: exactly `N`
//! - `A-B`: `A` through `B` inclusive, in input order (an inverted range
//!   matches nothing)
//! - `A-`: `A` through the observed maximum
//! - `-B`: the domain floor through `B`

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::episode::SequenceNumber;

/// Errors produced while parsing a range expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    #[error("Invalid range format: {expression:?}")]
    InvalidFormat { expression: String },
}

impl RangeError {
    fn invalid(expression: &str) -> Self {
        Self::InvalidFormat {
            expression: expression.to_string(),
        }
    }
}

/// Inclusive integer interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeBound {
    pub low: u32,
    pub high: u32,
}

impl RangeBound {
    pub const fn new(low: u32, high: u32) -> Self {
        Self { low, high }
    }

    /// Whether the bound is inverted and can match nothing.
    pub fn is_empty(&self) -> bool {
        self.low > self.high
    }

    pub fn contains(&self, value: u32) -> bool {
        self.low <= value && value <= self.high
    }

    /// Exact decimal comparison: `12.5` is outside `[12, 12]`.
    pub fn contains_sequence(&self, sequence: SequenceNumber) -> bool {
        SequenceNumber::whole(self.low) <= sequence && sequence <= SequenceNumber::whole(self.high)
    }
}

/// Parses range expressions for one domain (seasons or episodes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeFilter {
    default_low: u32,
}

impl RangeFilter {
    /// Season ranges; season 0 holds specials.
    pub const SEASONS: RangeFilter = RangeFilter::with_floor(0);

    /// Episode ranges; episode 0 is a valid prologue number.
    pub const EPISODES: RangeFilter = RangeFilter::with_floor(0);

    pub const fn with_floor(default_low: u32) -> Self {
        Self { default_low }
    }

    pub fn default_low(&self) -> u32 {
        self.default_low
    }

    /// Parses `expression` against the highest observed index `max`.
    pub fn parse(&self, expression: Option<&str>, max: u32) -> Result<RangeBound, RangeError> {
        let expression = match expression {
            Some(e) if !e.is_empty() => e,
            _ => return Ok(RangeBound::new(self.default_low, max)),
        };

        if expression.chars().any(|c| !c.is_ascii_digit() && c != '-') {
            return Err(RangeError::invalid(expression));
        }

        if expression.contains('-') {
            let parts: Vec<&str> = expression.split('-').collect();
            if parts.len() != 2 || parts.iter().all(|p| p.is_empty()) {
                return Err(RangeError::invalid(expression));
            }

            let number = |s: &str| s.parse::<u32>().map_err(|_| RangeError::invalid(expression));

            return match (parts[0].is_empty(), parts[1].is_empty()) {
                (false, false) => Ok(RangeBound::new(number(parts[0])?, number(parts[1])?)),
                (true, false) => Ok(RangeBound::new(self.default_low, number(parts[1])?)),
                (false, true) => Ok(RangeBound::new(number(parts[0])?, max)),
                (true, true) => Err(RangeError::invalid(expression)),
            };
        }

        expression
            .parse::<u32>()
            .map(|n| RangeBound::new(n, n))
            .map_err(|_| RangeError::invalid(expression))
    }
}
