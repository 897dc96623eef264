//! Market-data collaborator interface.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::signal::PricePoint;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unsupported interval {requested}: feed bars are {native}")]
    UnsupportedInterval { requested: Interval, native: Interval },

    #[error("Feed holds {available} bars, {requested} requested")]
    InsufficientData { requested: usize, available: usize },
}

/// Which bar field a history request reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceField {
    Open,
    High,
    Low,
    /// `price` in most data vendors' vocabulary.
    #[default]
    #[serde(alias = "price")]
    Close,
}

/// Bar spacing, written the usual vendor way: `1d`, `4h`, `15m`, `30s`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Interval {
    seconds: i64,
}

impl Interval {
    pub const DAILY: Interval = Interval { seconds: 86_400 };

    pub fn from_seconds(seconds: i64) -> Self {
        Self { seconds }
    }

    #[inline]
    pub fn seconds(&self) -> i64 {
        self.seconds
    }
}

impl Default for Interval {
    fn default() -> Self {
        Self::DAILY
    }
}

impl FromStr for Interval {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| FeedError::Parse(format!("interval without unit: {}", s)))?;
        let (count, unit) = s.split_at(split);
        let count: i64 = count
            .parse()
            .map_err(|_| FeedError::Parse(format!("bad interval count: {}", s)))?;
        let unit_secs = match unit {
            "s" => 1,
            "m" => 60,
            "h" => 3_600,
            "d" => 86_400,
            "w" => 604_800,
            _ => return Err(FeedError::Parse(format!("bad interval unit: {}", s))),
        };
        if count <= 0 {
            return Err(FeedError::Parse(format!("interval must be positive: {}", s)));
        }
        Ok(Self::from_seconds(count * unit_secs))
    }
}

impl TryFrom<String> for Interval {
    type Error = FeedError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Interval> for String {
    fn from(value: Interval) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.seconds;
        if s % 604_800 == 0 {
            write!(f, "{}w", s / 604_800)
        } else if s % 86_400 == 0 {
            write!(f, "{}d", s / 86_400)
        } else if s % 3_600 == 0 {
            write!(f, "{}h", s / 3_600)
        } else if s % 60 == 0 {
            write!(f, "{}m", s / 60)
        } else {
            write!(f, "{}s", s)
        }
    }
}

/// Source of historical prices for a single instrument.
pub trait DataFeed {
    /// The most recent `window_size` bars, oldest first.
    fn history(
        &self,
        window_size: usize,
        interval: Interval,
        field: PriceField,
    ) -> Result<Vec<PricePoint>, FeedError>;
}
