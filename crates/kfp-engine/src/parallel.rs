use serde::Serialize;

use kfp_core::{ForecastResult, HistoryWindow, PipelineConfig, PipelineError, WagerDecision};
use kfp_strategy::{KellySizer, MonteCarloPredictor, Predictor, SpectralPredictor};

use crate::engine::{DecisionLoop, TickHandler, TickOutcome};
use crate::recorder::Recorder;
use crate::venue::{EngineError, Tick, TradingVenue};

/// One predictor's view of a window, sized but never traded.
#[derive(Debug, Clone, Serialize)]
pub struct ShadowLeg {
    pub predictor: &'static str,
    pub forecast: Option<ForecastResult>,
    pub decision: Option<WagerDecision>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShadowComparison {
    pub spectral: ShadowLeg,
    pub monte_carlo: ShadowLeg,
}

/// Run the spectral and Monte Carlo predictors side by side.
///
/// Both forecast the same window snapshot concurrently via `rayon::join`.
pub struct ShadowComparator {
    spectral: SpectralPredictor,
    monte_carlo: MonteCarloPredictor,
    sizer: KellySizer,
    sizing_lookback: Option<usize>,
}

impl ShadowComparator {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            spectral: SpectralPredictor::new(&config.spectral),
            monte_carlo: MonteCarloPredictor::new(&config.monte_carlo),
            sizer: KellySizer::new(&config.kelly),
            sizing_lookback: config.kelly.lookback,
        }
    }

    pub fn compare(&mut self, window: &HistoryWindow) -> ShadowComparison {
        let (spectral, monte_carlo) = rayon::join(
            || self.spectral.forecast(window),
            || self.monte_carlo.forecast(window),
        );

        ShadowComparison {
            spectral: self.leg(self.spectral.id(), window, spectral),
            monte_carlo: self.leg(self.monte_carlo.id(), window, monte_carlo),
        }
    }

    fn leg(
        &self,
        predictor: &'static str,
        window: &HistoryWindow,
        forecast: Result<ForecastResult, PipelineError>,
    ) -> ShadowLeg {
        let sized = forecast.and_then(|f| {
            let current = window
                .latest()
                .map(|p| p.price)
                .ok_or_else(|| PipelineError::insufficient_history(1, 0))?;
            let diffs = match self.sizing_lookback {
                Some(count) => window.recent_diffs(count)?,
                None => window.diffs()?,
            };
            let decision = self.sizer.wager_or_flat(&diffs, current, f.predicted_price)?;
            Ok((f, decision))
        });

        match sized {
            Ok((forecast, decision)) => ShadowLeg {
                predictor,
                forecast: Some(forecast),
                decision: Some(decision),
                error: None,
            },
            Err(e) => ShadowLeg {
                predictor,
                forecast: None,
                decision: None,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Wraps a `DecisionLoop` and records both predictors' shadow forecasts
/// every tick under `shadow_<predictor>`.
pub struct ShadowHandler {
    inner: DecisionLoop,
    comparator: ShadowComparator,
}

impl ShadowHandler {
    pub fn new(inner: DecisionLoop, comparator: ShadowComparator) -> Self {
        Self { inner, comparator }
    }

    pub fn inner(&self) -> &DecisionLoop {
        &self.inner
    }
}

impl TickHandler for ShadowHandler {
    fn on_tick(
        &mut self,
        tick: &Tick,
        venue: &mut dyn TradingVenue,
        recorder: &mut dyn Recorder,
    ) -> Result<TickOutcome, EngineError> {
        let outcome = self.inner.on_tick(tick, venue, recorder)?;

        let comparison = self.comparator.compare(self.inner.window());
        for leg in [&comparison.spectral, &comparison.monte_carlo] {
            let value = leg.forecast.map_or(tick.price, |f| f.predicted_price);
            recorder.record(&format!("shadow_{}", leg.predictor), value);
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kfp_core::{ForecastMethod, PricePoint};

    fn window(prices: &[f64]) -> HistoryWindow {
        let mut w = HistoryWindow::new(prices.len()).unwrap();
        for (i, &p) in prices.iter().enumerate() {
            w.push(PricePoint::new(i as i64, p));
        }
        w
    }

    #[test]
    fn test_compare_both_predictors() {
        let mut comparator = ShadowComparator::new(&PipelineConfig::default());
        let w = window(&[100.0, 101.0, 99.0, 102.0, 103.0, 101.0, 104.0, 105.0, 103.0, 106.0]);
        let before = w.prices();

        let cmp = comparator.compare(&w);
        assert_eq!(cmp.spectral.predictor, "spectral");
        assert_eq!(cmp.monte_carlo.predictor, "monte_carlo");
        assert_eq!(
            cmp.spectral.forecast.map(|f| f.method),
            Some(ForecastMethod::Spectral)
        );
        assert_eq!(
            cmp.monte_carlo.forecast.map(|f| f.method),
            Some(ForecastMethod::MonteCarlo)
        );
        for leg in [&cmp.spectral, &cmp.monte_carlo] {
            let d = leg.decision.unwrap();
            assert!(d.fraction.abs() <= 2.5);
        }
        assert_eq!(w.prices(), before);
    }

    #[test]
    fn test_compare_sizes_on_lookback_diffs() {
        // Older diffs are large losses; the last three are small gains.
        let prices = [100.0, 90.0, 80.0, 70.0, 60.0, 61.0, 62.0, 63.0];
        let w = window(&prices);

        let mut config = PipelineConfig::default();
        config.kelly.probability = kfp_core::ProbabilityEstimator::NaiveFrequency;
        config.kelly.clamp = false;
        let full = ShadowComparator::new(&config).compare(&w);

        config.kelly.lookback = Some(3);
        let recent = ShadowComparator::new(&config).compare(&w);

        let p_full = full.monte_carlo.decision.unwrap().probability;
        let p_recent = recent.monte_carlo.decision.unwrap().probability;
        assert!((p_full - 3.0 / 7.0).abs() < 1e-12);
        assert_eq!(p_recent, 1.0);
    }

    #[test]
    fn test_compare_reports_errors() {
        let mut comparator = ShadowComparator::new(&PipelineConfig::default());
        let w = window(&[100.0]);
        let cmp = comparator.compare(&w);
        assert!(cmp.monte_carlo.forecast.is_none());
        assert!(cmp.monte_carlo.error.is_some());
    }
}
