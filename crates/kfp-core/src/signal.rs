use serde::{Deserialize, Serialize};

/// One observed price. Immutable once recorded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Unix epoch seconds.
    pub timestamp: i64,
    pub price: f64,
}

impl PricePoint {
    pub fn new(timestamp: i64, price: f64) -> Self {
        Self { timestamp, price }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastMethod {
    Spectral,
    MonteCarlo,
    /// Raw current price, used while warming up or after a failed forecast.
    Passthrough,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub predicted_price: f64,
    pub method: ForecastMethod,
}

impl ForecastResult {
    pub fn new(predicted_price: f64, method: ForecastMethod) -> Self {
        Self {
            predicted_price,
            method,
        }
    }

    pub fn passthrough(current_price: f64) -> Self {
        Self::new(current_price, ForecastMethod::Passthrough)
    }
}

/// Output of the Kelly sizer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WagerDecision {
    /// Target fraction of total portfolio value. Negative means short.
    pub fraction: f64,
    /// Estimated probability that the forecast move is realised.
    pub probability: f64,
    /// Fractional gain implied by the forecast, `(predicted - current) / current`.
    pub edge: f64,
}

impl WagerDecision {
    /// No position, no edge.
    pub fn flat() -> Self {
        Self {
            fraction: 0.0,
            probability: 0.5,
            edge: 0.0,
        }
    }

    #[inline]
    pub fn is_long(&self) -> bool {
        self.fraction > 0.0
    }

    #[inline]
    pub fn is_short(&self) -> bool {
        self.fraction < 0.0
    }
}
