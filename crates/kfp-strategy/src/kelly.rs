use log::debug;

use kfp_core::{KellyConfig, PipelineError, ProbabilityEstimator, Result, WagerDecision};

/// Kelly-criterion sizer.
///
/// Turns recent diffs plus a forecast into the fraction of portfolio value to
/// hold: with edge `b = (predicted - current) / current`, win probability `p`
/// and `q = 1 - p`, the raw fraction is `f = (b*p - q) / b`.
///
/// The probability estimator and the leverage clamp are chosen independently.
#[derive(Debug, Clone)]
pub struct KellySizer {
    estimator: ProbabilityEstimator,
    max_leverage: Option<f64>,
    min_edge: f64,
}

impl KellySizer {
    pub fn new(config: &KellyConfig) -> Self {
        Self {
            estimator: config.probability,
            max_leverage: config.clamp.then_some(config.max_leverage),
            min_edge: config.min_edge,
        }
    }

    pub fn estimator(&self) -> ProbabilityEstimator {
        self.estimator
    }

    /// Probability that the forecast move is realised.
    pub fn probability(&self, diffs: &[f64], current: f64, predicted: f64) -> Result<f64> {
        if diffs.is_empty() {
            return Err(PipelineError::insufficient_history(1, 0));
        }
        let n = diffs.len() as f64;

        let p = match self.estimator {
            ProbabilityEstimator::NaiveFrequency => {
                diffs.iter().filter(|&&d| d > 0.0).count() as f64 / n
            }
            ProbabilityEstimator::ThresholdCrossing => {
                if predicted > current {
                    let delta = predicted - current;
                    1.0 - diffs.iter().filter(|&&d| d <= -delta).count() as f64 / n
                } else if predicted < current {
                    let delta = current - predicted;
                    1.0 - diffs.iter().filter(|&&d| d >= delta).count() as f64 / n
                } else {
                    return Err(PipelineError::undefined_edge(current, predicted));
                }
            }
        };
        Ok(p)
    }

    /// Size a position from the diffs and the forecast.
    ///
    /// Fails with `UndefinedEdge` when the forecast is within `min_edge`
    /// (relative) of the current price, which covers a forecast that only
    /// differs from the price by floating-point rounding.
    pub fn wager(&self, diffs: &[f64], current: f64, predicted: f64) -> Result<WagerDecision> {
        let edge = (predicted - current) / current;
        if !edge.is_finite() || edge.abs() <= self.min_edge {
            return Err(PipelineError::undefined_edge(current, predicted));
        }

        let probability = self.probability(diffs, current, predicted)?;
        let raw = raw_fraction(probability, edge);
        let fraction = match self.max_leverage {
            Some(cap) => raw.clamp(-cap, cap),
            None => raw,
        };

        debug!(
            "kelly: p={:.4} b={:.6} raw={:.4} fraction={:.4}",
            probability, edge, raw, fraction
        );

        Ok(WagerDecision {
            fraction,
            probability,
            edge,
        })
    }

    /// `wager`, with a zero edge mapped to a flat position.
    pub fn wager_or_flat(
        &self,
        diffs: &[f64],
        current: f64,
        predicted: f64,
    ) -> Result<WagerDecision> {
        match self.wager(diffs, current, predicted) {
            Err(PipelineError::UndefinedEdge { .. }) => Ok(WagerDecision::flat()),
            other => other,
        }
    }
}

impl Default for KellySizer {
    fn default() -> Self {
        Self::new(&KellyConfig::default())
    }
}

/// Kelly fraction for win probability `p` at odds `b`.
#[inline]
pub fn raw_fraction(p: f64, b: f64) -> f64 {
    let q = 1.0 - p;
    (b * p - q) / b
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sizer(estimator: ProbabilityEstimator, clamp: bool) -> KellySizer {
        KellySizer::new(&KellyConfig {
            probability: estimator,
            clamp,
            max_leverage: 2.5,
            ..KellyConfig::default()
        })
    }

    fn window_diffs(prices: &[f64]) -> Vec<f64> {
        prices.windows(2).map(|w| w[1] - w[0]).collect()
    }

    #[test]
    fn test_naive_frequency() {
        let s = sizer(ProbabilityEstimator::NaiveFrequency, false);
        let p = s.probability(&[1.0, -1.0, 2.0, 0.0], 100.0, 101.0).unwrap();
        assert!((p - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_threshold_crossing_up_and_down() {
        let s = sizer(ProbabilityEstimator::ThresholdCrossing, true);
        let diffs = [-3.0, -1.0, 0.5, 2.0];
        // Up 1.0: diffs <= -1.0 would undo it (2 of 4)
        assert!((s.probability(&diffs, 100.0, 101.0).unwrap() - 0.5).abs() < 1e-12);
        // Down 1.0: only diffs >= 1.0 undo it (1 of 4)
        assert!((s.probability(&diffs, 100.0, 99.0).unwrap() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_clamps_large_positive_fraction() {
        // b = -0.1, p = 5/9 => raw f = +5
        let mut diffs = vec![12.0; 4];
        diffs.extend([1.0; 5]);
        let unclamped = sizer(ProbabilityEstimator::ThresholdCrossing, false)
            .wager(&diffs, 100.0, 90.0)
            .unwrap();
        assert!((unclamped.fraction - 5.0).abs() < 1e-9);

        let clamped = sizer(ProbabilityEstimator::ThresholdCrossing, true)
            .wager(&diffs, 100.0, 90.0)
            .unwrap();
        assert_eq!(clamped.fraction, 2.5);
    }

    #[test]
    fn test_clamps_large_negative_fraction() {
        // b = +0.1, p = 5/11 => raw f = -5
        let mut diffs = vec![-12.0; 6];
        diffs.extend([1.0; 5]);
        let unclamped = sizer(ProbabilityEstimator::ThresholdCrossing, false)
            .wager(&diffs, 100.0, 110.0)
            .unwrap();
        assert!((unclamped.fraction + 5.0).abs() < 1e-9);

        let clamped = sizer(ProbabilityEstimator::ThresholdCrossing, true)
            .wager(&diffs, 100.0, 110.0)
            .unwrap();
        assert_eq!(clamped.fraction, -2.5);
    }

    #[test]
    fn test_undefined_edge() {
        let s = KellySizer::default();
        let err = s.wager(&[1.0, -1.0], 100.0, 100.0).unwrap_err();
        assert!(matches!(err, PipelineError::UndefinedEdge { .. }));

        let flat = s.wager_or_flat(&[1.0, -1.0], 100.0, 100.0).unwrap();
        assert_eq!(flat.fraction, 0.0);
    }

    #[test]
    fn test_rounding_noise_edge_is_undefined() {
        let s = sizer(ProbabilityEstimator::ThresholdCrossing, true);
        let diffs = [0.0; 9];
        for (current, noisy) in [
            (101.37, 101.37000000000002),
            (33.3, 33.29999999999999),
            (0.7, 0.7000000000000002),
        ] {
            assert_ne!(current, noisy);
            assert!(matches!(
                s.wager(&diffs, current, noisy),
                Err(PipelineError::UndefinedEdge { .. })
            ));
            assert_eq!(s.wager_or_flat(&diffs, current, noisy).unwrap().fraction, 0.0);
        }
        // A real one-cent move is still sized.
        assert!(s.wager(&[0.5, -0.5], 101.37, 101.38).is_ok());
    }

    #[test]
    fn test_zero_current_price_is_undefined() {
        let s = KellySizer::default();
        assert!(matches!(
            s.wager(&[1.0], 0.0, 1.0),
            Err(PipelineError::UndefinedEdge { .. })
        ));
    }

    #[test]
    fn test_empty_diffs() {
        let s = KellySizer::default();
        assert_eq!(
            s.wager(&[], 100.0, 101.0),
            Err(PipelineError::insufficient_history(1, 0))
        );
    }

    #[test]
    fn test_reference_window_scenario() {
        let prices = [100.0, 101.0, 99.0, 102.0, 103.0, 101.0, 104.0, 105.0, 103.0, 106.0];
        let diffs = window_diffs(&prices);
        let s = sizer(ProbabilityEstimator::ThresholdCrossing, true);

        let decision = s.wager(&diffs, 106.0, 107.0).unwrap();
        // Three of nine diffs (-2 each) would undo a +1 move.
        assert!((decision.probability - 2.0 / 3.0).abs() < 1e-12);
        assert!((decision.edge - 1.0 / 106.0).abs() < 1e-12);
        assert!(decision.fraction >= -2.5 && decision.fraction <= 2.5);

        // A 1% edge cannot pay for a one-in-three loss rate: raw Kelly is
        // about -34.7 and the clamp holds it at the short cap.
        let raw = raw_fraction(decision.probability, decision.edge);
        assert!((raw - (2.0 / 3.0 - (1.0 / 3.0) * 106.0)).abs() < 1e-9);
        assert_eq!(decision.fraction, -2.5);
    }

    #[test]
    fn test_clamp_independent_of_estimator() {
        let diffs = [1.0, 1.0, 1.0, -1.0];
        let clamped = sizer(ProbabilityEstimator::NaiveFrequency, true)
            .wager(&diffs, 100.0, 100.5)
            .unwrap();
        let unclamped = sizer(ProbabilityEstimator::NaiveFrequency, false)
            .wager(&diffs, 100.0, 100.5)
            .unwrap();
        assert_eq!(clamped.probability, unclamped.probability);
        assert!(unclamped.fraction < -2.5);
        assert_eq!(clamped.fraction, -2.5);
    }
}
