use serde::Serialize;

const TRADING_DAYS: f64 = 252.0;
const ANNUALIZATION_FACTOR: f64 = 15.874507866; // sqrt(252)

/// Computed performance and forecast-quality metrics.
#[derive(Debug, Clone, Serialize)]
pub struct Metrics {
    pub total_return_pct: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub max_drawdown_pct: f64,
    pub calmar_ratio: f64,
    /// Mean |forecast - next price| over ticks with a real forecast.
    pub forecast_mae: f64,
    /// Share of real forecasts whose direction matched the next move.
    pub directional_accuracy: f64,
    pub forecasts_scored: usize,
}

pub struct MetricsCalculator;

impl MetricsCalculator {
    /// Calculate all metrics from the equity curve and the per-tick
    /// price and forecast series.
    ///
    /// Ticks where the forecast equals the price (warm-up, fallbacks) are
    /// not scored.
    pub fn calculate(equity_curve: &[f64], prices: &[f64], forecasts: &[f64]) -> Metrics {
        let returns = Self::compute_returns(equity_curve);
        let max_dd = Self::max_drawdown(equity_curve);
        let (forecast_mae, directional_accuracy, forecasts_scored) =
            Self::forecast_quality(prices, forecasts);

        Metrics {
            total_return_pct: Self::total_return(equity_curve),
            sharpe_ratio: Self::sharpe_ratio(&returns),
            sortino_ratio: Self::sortino_ratio(&returns),
            max_drawdown_pct: max_dd,
            calmar_ratio: Self::calmar_ratio(&returns, max_dd),
            forecast_mae,
            directional_accuracy,
            forecasts_scored,
        }
    }

    /// Simple per-step returns; a zero base contributes a zero return.
    fn compute_returns(equity_curve: &[f64]) -> Vec<f64> {
        equity_curve
            .windows(2)
            .map(|w| if w[0] == 0.0 { 0.0 } else { w[1] / w[0] - 1.0 })
            .collect()
    }

    fn sharpe_ratio(returns: &[f64]) -> f64 {
        match (mean(returns), std_dev(returns)) {
            (Some(mu), sigma) if returns.len() >= 2 && sigma > 0.0 => {
                mu / sigma * ANNUALIZATION_FACTOR
            }
            _ => 0.0,
        }
    }

    /// Like Sharpe, but only losing steps count as risk.
    fn sortino_ratio(returns: &[f64]) -> f64 {
        let Some(mu) = mean(returns).filter(|_| returns.len() >= 2) else {
            return 0.0;
        };
        let losses: Vec<f64> = returns.iter().copied().filter(|&r| r < 0.0).collect();
        if losses.is_empty() {
            return if mu > 0.0 { f64::INFINITY } else { 0.0 };
        }
        match std_dev(&losses) {
            sigma if sigma > 0.0 => mu / sigma * ANNUALIZATION_FACTOR,
            _ => 0.0,
        }
    }

    /// Largest peak-to-trough fall, as a fraction of the peak.
    fn max_drawdown(equity_curve: &[f64]) -> f64 {
        let mut peak = f64::NEG_INFINITY;
        equity_curve.iter().fold(0.0f64, |worst, &value| {
            peak = peak.max(value);
            if peak > 0.0 {
                worst.max((peak - value) / peak)
            } else {
                worst
            }
        })
    }

    fn calmar_ratio(returns: &[f64], max_dd: f64) -> f64 {
        match mean(returns) {
            Some(mu) if max_dd > 0.0 && returns.len() >= 2 => mu * TRADING_DAYS / max_dd,
            _ => 0.0,
        }
    }

    fn total_return(equity_curve: &[f64]) -> f64 {
        match (equity_curve.first(), equity_curve.last()) {
            (Some(&first), Some(&last)) if equity_curve.len() >= 2 && first != 0.0 => {
                last / first - 1.0
            }
            _ => 0.0,
        }
    }

    /// Score forecast `i` against price `i + 1`.
    fn forecast_quality(prices: &[f64], forecasts: &[f64]) -> (f64, f64, usize) {
        let n = prices.len().min(forecasts.len());
        let mut abs_error = 0.0;
        let mut hits = 0usize;
        let mut scored = 0usize;

        for i in 0..n.saturating_sub(1) {
            let (current, forecast, next) = (prices[i], forecasts[i], prices[i + 1]);
            if forecast == current {
                continue;
            }
            scored += 1;
            abs_error += (forecast - next).abs();
            if (forecast - current).signum() == (next - current).signum() {
                hits += 1;
            }
        }

        if scored == 0 {
            return (0.0, 0.0, 0);
        }
        (abs_error / scored as f64, hits as f64 / scored as f64, scored)
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Population standard deviation; zero for fewer than two values.
fn std_dev(values: &[f64]) -> f64 {
    match mean(values) {
        Some(mu) if values.len() >= 2 => {
            let sum_sq: f64 = values.iter().map(|v| (v - mu) * (v - mu)).sum();
            (sum_sq / values.len() as f64).sqrt()
        }
        _ => 0.0,
    }
}
