use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use rayon::prelude::*;
use serde::Serialize;

use kfp_core::{
    ForecastMethod, ForecastResult, HistoryWindow, MonteCarloConfig, PipelineError, Result,
};

use crate::traits::{Predictor, PredictorId};

/// Terminal prices of one batch of simulated walks.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationRun {
    pub iterations: usize,
    pub horizon: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub terminal_prices: Vec<f64>,
}

impl SimulationRun {
    /// Arithmetic mean of the terminal prices.
    pub fn expected_price(&self) -> f64 {
        running_mean(&self.terminal_prices)
    }
}

/// Random-walk forecaster.
///
/// Each iteration walks `horizon` additive Gaussian steps from the current
/// price, with mean and standard deviation taken from the window's diffs; the
/// forecast is the mean terminal price.
///
/// The generator is owned and seeded from config. In parallel mode one base
/// seed is drawn per call and chunk `i` runs on
/// `StdRng::seed_from_u64(base.wrapping_add(i))`; the chunk count is fixed by
/// config, so output depends only on the seed, not on the rayon pool size.
pub struct MonteCarloPredictor {
    iterations: usize,
    horizon: usize,
    parallel: bool,
    chunks: usize,
    rng: StdRng,
}

impl MonteCarloPredictor {
    pub fn new(config: &MonteCarloConfig) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(config.seed))
    }

    /// Use a caller-supplied generator instead of the configured seed.
    pub fn with_rng(config: &MonteCarloConfig, rng: StdRng) -> Self {
        Self {
            iterations: config.iterations,
            horizon: config.horizon,
            parallel: config.parallel,
            chunks: config.chunks.max(1),
            rng,
        }
    }

    /// Expected price after `horizon` steps from `start`.
    pub fn predict(&mut self, diffs: &[f64], start: f64) -> Result<f64> {
        Ok(self.simulate(diffs, start)?.expected_price())
    }

    /// Run all iterations and keep every terminal price.
    pub fn simulate(&mut self, diffs: &[f64], start: f64) -> Result<SimulationRun> {
        let (mean, std_dev) = mean_and_std(diffs)?;
        let step = Normal::new(mean, std_dev).map_err(|e| {
            PipelineError::simulation(format!(
                "bad step distribution (mean={}, std={}): {}",
                mean, std_dev, e
            ))
        })?;

        let terminal_prices = if self.parallel {
            self.simulate_parallel(step, start)
        } else {
            let horizon = self.horizon;
            let rng = &mut self.rng;
            (0..self.iterations)
                .map(|_| walk(rng, &step, start, horizon))
                .collect()
        };

        Ok(SimulationRun {
            iterations: self.iterations,
            horizon: self.horizon,
            mean,
            std_dev,
            terminal_prices,
        })
    }

    fn simulate_parallel(&mut self, step: Normal<f64>, start: f64) -> Vec<f64> {
        let base_seed: u64 = self.rng.gen();
        let chunks = self.chunks.min(self.iterations);
        let per_chunk = self.iterations / chunks;
        let remainder = self.iterations % chunks;
        let horizon = self.horizon;

        let chunk_results: Vec<Vec<f64>> = (0..chunks)
            .into_par_iter()
            .map(|i| {
                let mut rng = StdRng::seed_from_u64(base_seed.wrapping_add(i as u64));
                let count = per_chunk + usize::from(i < remainder);
                (0..count)
                    .map(|_| walk(&mut rng, &step, start, horizon))
                    .collect()
            })
            .collect();

        chunk_results.into_iter().flatten().collect()
    }
}

impl Predictor for MonteCarloPredictor {
    fn forecast(&mut self, window: &HistoryWindow) -> Result<ForecastResult> {
        let diffs = window.diffs()?;
        let start = window
            .latest()
            .map(|p| p.price)
            .ok_or_else(|| PipelineError::insufficient_history(2, 0))?;

        let run = self.simulate(&diffs, start)?;
        let expected = run.expected_price();
        debug!(
            "monte carlo: start={:.4} mu={:.5} sigma={:.5} expected={:.4} k={}",
            start, run.mean, run.std_dev, expected, run.iterations
        );
        Ok(ForecastResult::new(expected, ForecastMethod::MonteCarlo))
    }

    fn id(&self) -> PredictorId {
        "monte_carlo"
    }

    fn method(&self) -> ForecastMethod {
        ForecastMethod::MonteCarlo
    }
}

/// Sample mean and unbiased (n - 1) standard deviation.
pub fn mean_and_std(values: &[f64]) -> Result<(f64, f64)> {
    if values.len() < 2 {
        return Err(PipelineError::insufficient_history(2, values.len()));
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Ok((mean, variance.sqrt()))
}

fn walk<R: Rng + ?Sized>(rng: &mut R, step: &Normal<f64>, start: f64, horizon: usize) -> f64 {
    (0..horizon).fold(start, |price, _| price + step.sample(rng))
}

/// Incremental mean, exact when every value is equal.
fn running_mean(values: &[f64]) -> f64 {
    values
        .iter()
        .enumerate()
        .fold(0.0, |mean, (i, &v)| mean + (v - mean) / (i + 1) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(iterations: usize, horizon: usize, seed: u64) -> MonteCarloConfig {
        MonteCarloConfig {
            iterations,
            horizon,
            seed,
            ..MonteCarloConfig::default()
        }
    }

    #[test]
    fn test_mean_and_std_unbiased() {
        let (mean, std) = mean_and_std(&[1.0, 3.0]).unwrap();
        assert!((mean - 2.0).abs() < 1e-12);
        assert!((std - 2.0f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_requires_two_diffs() {
        let mut mc = MonteCarloPredictor::new(&config(10, 1, 1));
        assert_eq!(
            mc.predict(&[0.5], 100.0),
            Err(PipelineError::insufficient_history(2, 1))
        );
        assert!(mc.predict(&[], 100.0).is_err());
    }

    #[test]
    fn test_zero_volatility_returns_start_exactly() {
        for k in [1, 7, 100] {
            let mut mc = MonteCarloPredictor::new(&config(k, 1, 9));
            let forecast = mc.predict(&[0.0, 0.0, 0.0, 0.0], 123.45).unwrap();
            assert_eq!(forecast, 123.45);
        }
    }

    #[test]
    fn test_converges_to_drift() {
        let diffs: Vec<f64> = (0..20).map(|i| if i % 2 == 0 { 1.5 } else { -0.5 }).collect();
        let (mu, _) = mean_and_std(&diffs).unwrap();
        let horizon = 3;

        let mut mc = MonteCarloPredictor::new(&config(20_000, horizon, 7));
        let forecast = mc.predict(&diffs, 100.0).unwrap();
        let expected = 100.0 + mu * horizon as f64;
        assert!(
            (forecast - expected).abs() < 0.06,
            "forecast {} not near {}",
            forecast,
            expected
        );
    }

    #[test]
    fn test_seeded_runs_reproducible() {
        let diffs = [1.0, -2.0, 3.0, 1.0, -2.0];
        let a = MonteCarloPredictor::new(&config(50, 2, 11))
            .simulate(&diffs, 50.0)
            .unwrap();
        let b = MonteCarloPredictor::new(&config(50, 2, 11))
            .simulate(&diffs, 50.0)
            .unwrap();
        assert_eq!(a.terminal_prices, b.terminal_prices);
        assert_eq!(a.terminal_prices.len(), 50);
    }

    #[test]
    fn test_parallel_reproducible_and_complete() {
        let diffs = [1.0, -2.0, 3.0, 1.0, -2.0];
        let cfg = MonteCarloConfig {
            iterations: 1003,
            horizon: 1,
            seed: 5,
            parallel: true,
            chunks: 8,
        };
        let a = MonteCarloPredictor::new(&cfg).simulate(&diffs, 50.0).unwrap();
        let b = MonteCarloPredictor::new(&cfg).simulate(&diffs, 50.0).unwrap();
        assert_eq!(a.terminal_prices.len(), 1003);
        assert_eq!(a.terminal_prices, b.terminal_prices);
    }

    #[test]
    fn test_forecast_from_window() {
        let mut window = HistoryWindow::new(4).unwrap();
        for (i, p) in [10.0, 10.0, 10.0, 10.0].iter().enumerate() {
            window.push(kfp_core::PricePoint::new(i as i64, *p));
        }
        let mut mc = MonteCarloPredictor::new(&config(25, 1, 3));
        let forecast = mc.forecast(&window).unwrap();
        assert_eq!(forecast.method, ForecastMethod::MonteCarlo);
        assert_eq!(forecast.predicted_price, 10.0);
    }
}
