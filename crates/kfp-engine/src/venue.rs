//! Trading-venue collaborator interface.

use serde::Serialize;
use thiserror::Error;

use kfp_core::{FeedError, PipelineError};

/// Snapshot of the account handed to the loop with every tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PortfolioState {
    pub total_value: f64,
    pub cash: f64,
}

/// One scheduler event: the instrument's price at `timestamp`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Tick {
    pub timestamp: i64,
    pub price: f64,
    pub portfolio: PortfolioState,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum VenueError {
    #[error("Unknown instrument {0}")]
    UnknownInstrument(String),

    #[error("Invalid target fraction {0}")]
    InvalidFraction(f64),

    #[error("Target fraction {fraction} exceeds venue cap {cap}")]
    FractionAboveCap { fraction: f64, cap: f64 },

    #[error("Invalid mark price {0}")]
    InvalidPrice(f64),

    #[error("No price marked yet for {0}")]
    NoPrice(String),
}

/// Errors that stop a run. Per-tick forecast and sizing failures never do.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Venue(#[from] VenueError),

    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// Order entry and account view for a single-instrument simulation.
pub trait TradingVenue {
    /// Rebalance `instrument` to `fraction` of total portfolio value.
    ///
    /// Negative fractions are short, `|fraction| > 1` is leveraged.
    fn submit_target_fraction(&mut self, instrument: &str, fraction: f64)
        -> Result<(), VenueError>;

    fn portfolio(&self) -> PortfolioState;
}
