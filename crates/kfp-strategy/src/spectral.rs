use log::debug;
use rustfft::{num_complex::Complex, FftPlanner};

use kfp_core::{
    ForecastMethod, ForecastResult, HistoryWindow, PipelineError, Result, SpectralConfig,
};

use crate::traits::{Predictor, PredictorId};

/// Frequency bins and complex amplitudes of one padded price series.
#[derive(Debug, Clone)]
pub struct Spectrum {
    /// Cycles per year, in FFT bin order.
    pub frequencies: Vec<f64>,
    pub amplitudes: Vec<Complex<f64>>,
}

impl Spectrum {
    /// Zero every bin whose absolute frequency exceeds `pass_band`.
    ///
    /// Only `|f|` is inspected, so each positive bin and its negative mirror
    /// are kept or dropped together and the inverse stays real.
    pub fn low_pass(&mut self, pass_band: f64) {
        for (amp, &freq) in self.amplitudes.iter_mut().zip(&self.frequencies) {
            if freq.abs() > pass_band {
                *amp = Complex::new(0.0, 0.0);
            }
        }
    }
}

/// Per-bin sample frequencies for an `n`-point transform with spacing `dt`.
///
/// Same layout as numpy's `fftfreq`: `[0, 1, ..., ceil(n/2) - 1, -floor(n/2), ..., -1] / (n * dt)`.
pub fn frequencies(n: usize, dt: f64) -> Vec<f64> {
    let scale = 1.0 / (n as f64 * dt);
    let positive = (n + 1) / 2;
    (0..n)
        .map(|i| {
            if i < positive {
                i as f64 * scale
            } else {
                (i as f64 - n as f64) * scale
            }
        })
        .collect()
}

/// Low-pass Fourier filter that treats the smoothed last price as the "true" price.
///
/// The window is padded with copies of the latest price to damp the edge
/// discontinuity, transformed, brick-wall filtered above `cutoff + buffer`
/// cycles per year, transformed back, and the padding dropped again.
///
/// The planner caches forward and inverse plans per transform length, so a
/// fixed window replans only on the first tick.
pub struct SpectralPredictor {
    pass_band: f64,
    padding: usize,
    sample_spacing: f64,
    planner: FftPlanner<f64>,
}

impl SpectralPredictor {
    pub fn new(config: &SpectralConfig) -> Self {
        Self {
            pass_band: config.pass_band(),
            padding: config.padding,
            sample_spacing: 1.0 / config.samples_per_year,
            planner: FftPlanner::new(),
        }
    }

    /// Transform `prices` plus tail padding into the frequency domain.
    pub fn spectrum(&mut self, prices: &[f64]) -> Result<Spectrum> {
        let last = *prices
            .last()
            .ok_or_else(|| PipelineError::degenerate_spectrum("empty price series"))?;

        let mut buffer: Vec<Complex<f64>> = prices
            .iter()
            .chain(std::iter::repeat(&last).take(self.padding))
            .map(|&p| Complex::new(p, 0.0))
            .collect();

        let n = buffer.len();
        self.planner.plan_fft_forward(n).process(&mut buffer);

        Ok(Spectrum {
            frequencies: frequencies(n, self.sample_spacing),
            amplitudes: buffer,
        })
    }

    /// The filtered series, same length as `prices`.
    pub fn filter_series(&mut self, prices: &[f64]) -> Result<Vec<f64>> {
        let mut spectrum = self.spectrum(prices)?;
        spectrum.low_pass(self.pass_band);

        let n = spectrum.amplitudes.len();
        let mut buffer = spectrum.amplitudes;
        self.planner.plan_fft_inverse(n).process(&mut buffer);

        // rustfft leaves the inverse unnormalised
        let norm = 1.0 / n as f64;
        let filtered: Vec<f64> = buffer
            .iter()
            .take(prices.len())
            .map(|c| c.re * norm)
            .collect();

        if filtered.iter().any(|v| !v.is_finite()) {
            return Err(PipelineError::degenerate_spectrum(
                "filtered series is not finite",
            ));
        }
        Ok(filtered)
    }
}

impl Predictor for SpectralPredictor {
    fn forecast(&mut self, window: &HistoryWindow) -> Result<ForecastResult> {
        if !window.ready() {
            return Err(PipelineError::insufficient_window(
                window.capacity(),
                window.len(),
            ));
        }

        let prices = window.prices();
        let filtered = self.filter_series(&prices)?;
        let smoothed = *filtered
            .last()
            .ok_or_else(|| PipelineError::degenerate_spectrum("empty filtered series"))?;

        debug!(
            "spectral: raw={:.4} smoothed={:.4} n={} padding={}",
            prices[prices.len() - 1],
            smoothed,
            prices.len(),
            self.padding
        );

        Ok(ForecastResult::new(smoothed, ForecastMethod::Spectral))
    }

    fn id(&self) -> PredictorId {
        "spectral"
    }

    fn method(&self) -> ForecastMethod {
        ForecastMethod::Spectral
    }
}
