use serde::Serialize;

use crate::venue::{PortfolioState, TradingVenue, VenueError};

/// One executed rebalance.
#[derive(Debug, Clone, Serialize)]
pub struct SimulatedFill {
    pub timestamp: i64,
    pub price: f64,
    pub target_fraction: f64,
    pub shares_before: f64,
    pub shares_after: f64,
    pub notional: f64,
}

/// Single-instrument paper account: cash plus a signed share position.
///
/// Rebalances fill at the last marked price with no fees or slippage.
/// Short positions credit cash, so `cash` can exceed the portfolio value.
pub struct PaperVenue {
    instrument: String,
    cash: f64,
    shares: f64,
    last_price: Option<f64>,
    last_timestamp: i64,
    max_abs_fraction: Option<f64>,
    fills: Vec<SimulatedFill>,
    equity_curve: Vec<f64>,
}

impl PaperVenue {
    pub fn new(instrument: impl Into<String>, initial_cash: f64) -> Self {
        Self {
            instrument: instrument.into(),
            cash: initial_cash,
            shares: 0.0,
            last_price: None,
            last_timestamp: 0,
            max_abs_fraction: None,
            fills: Vec::new(),
            equity_curve: vec![initial_cash],
        }
    }

    /// Reject any target with `|fraction| > cap`.
    pub fn with_fraction_cap(mut self, cap: f64) -> Self {
        self.max_abs_fraction = Some(cap);
        self
    }

    /// Revalue the position at `price` and append to the equity curve.
    pub fn mark(&mut self, timestamp: i64, price: f64) -> Result<(), VenueError> {
        if !price.is_finite() || price <= 0.0 {
            return Err(VenueError::InvalidPrice(price));
        }
        self.last_price = Some(price);
        self.last_timestamp = timestamp;
        let value = self.total_value();
        self.equity_curve.push(value);
        Ok(())
    }

    pub fn total_value(&self) -> f64 {
        self.cash + self.shares * self.last_price.unwrap_or(0.0)
    }

    pub fn shares(&self) -> f64 {
        self.shares
    }

    pub fn fills(&self) -> &[SimulatedFill] {
        &self.fills
    }

    pub fn equity_curve(&self) -> &[f64] {
        &self.equity_curve
    }
}

impl TradingVenue for PaperVenue {
    fn submit_target_fraction(
        &mut self,
        instrument: &str,
        fraction: f64,
    ) -> Result<(), VenueError> {
        if instrument != self.instrument {
            return Err(VenueError::UnknownInstrument(instrument.to_string()));
        }
        if !fraction.is_finite() {
            return Err(VenueError::InvalidFraction(fraction));
        }
        if let Some(cap) = self.max_abs_fraction {
            if fraction.abs() > cap {
                return Err(VenueError::FractionAboveCap { fraction, cap });
            }
        }
        let price = self
            .last_price
            .ok_or_else(|| VenueError::NoPrice(instrument.to_string()))?;

        let target_shares = fraction * self.total_value() / price;
        let delta = target_shares - self.shares;
        let shares_before = self.shares;
        self.cash -= delta * price;
        self.shares = target_shares;

        self.fills.push(SimulatedFill {
            timestamp: self.last_timestamp,
            price,
            target_fraction: fraction,
            shares_before,
            shares_after: target_shares,
            notional: delta * price,
        });
        Ok(())
    }

    fn portfolio(&self) -> PortfolioState {
        PortfolioState {
            total_value: self.total_value(),
            cash: self.cash,
        }
    }
}
