use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::error::PipelineError;
use crate::feed::{Interval, PriceField};

/// Top-level pipeline config, parsed from TOML.
///
/// Every section is optional; missing keys take the defaults below.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub instrument: InstrumentConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub predictor: PredictorConfig,
    #[serde(default)]
    pub spectral: SpectralConfig,
    #[serde(default)]
    pub monte_carlo: MonteCarloConfig,
    #[serde(default)]
    pub kelly: KellyConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub paper: PaperConfig,
}

impl PipelineConfig {
    /// Load config from a TOML file path.
    pub fn from_toml(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate config from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and merge multiple TOML files (later files override earlier).
    pub fn from_toml_files(paths: &[&Path]) -> Result<Self, ConfigError> {
        let (first, rest) = paths
            .split_first()
            .ok_or_else(|| ConfigError::Parse("no config files provided".into()))?;

        let mut base = read_toml_value(first)?;
        for path in rest {
            merge_toml(&mut base, read_toml_value(path)?);
        }

        let merged = toml::to_string(&base).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Self::from_toml_str(&merged)
    }

    /// Reject configurations no tick could run under.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.window.capacity == 0 {
            return Err(PipelineError::invalid_config(
                "window.capacity must be positive",
            ));
        }
        if self.predictor.kind == PredictorKind::MonteCarlo && self.window.capacity < 3 {
            return Err(PipelineError::invalid_config(
                "window.capacity must be at least 3 for the Monte Carlo predictor",
            ));
        }
        self.spectral.validate()?;
        self.monte_carlo.validate()?;
        self.kelly.validate()?;
        if self.execution.order_style != OrderStyle::TargetFraction {
            return Err(PipelineError::invalid_config(format!(
                "execution.order_style {:?} is not supported; the decision loop only submits target fractions",
                self.execution.order_style
            )));
        }
        if !(self.paper.initial_cash > 0.0) {
            return Err(PipelineError::invalid_config(
                "paper.initial_cash must be positive",
            ));
        }
        Ok(())
    }
}

fn read_toml_value(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
    toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
}

fn merge_toml(base: &mut toml::Value, overlay: toml::Value) {
    if let (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) = (base, overlay) {
        for (key, value) in overlay_table {
            if let Some(base_value) = base_table.get_mut(&key) {
                if base_value.is_table() && value.is_table() {
                    merge_toml(base_value, value);
                    continue;
                }
            }
            base_table.insert(key, value);
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentConfig {
    #[serde(default = "default_symbol")]
    pub symbol: String,
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            symbol: default_symbol(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default)]
    pub interval: Interval,
    #[serde(default)]
    pub field: PriceField,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Number of prices kept in the rolling history.
    #[serde(default = "default_10")]
    pub capacity: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self { capacity: 10 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictorKind {
    Spectral,
    #[default]
    MonteCarlo,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictorConfig {
    #[serde(default)]
    pub kind: PredictorKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpectralConfig {
    /// Low-pass cutoff in cycles per year. `inf` passes everything.
    #[serde(default = "default_0_30")]
    pub cutoff: f64,
    /// Extra band added to the cutoff before bins are zeroed.
    #[serde(default = "default_0_05")]
    pub buffer: f64,
    /// Copies of the latest price appended before the transform.
    #[serde(default = "default_1000")]
    pub padding: usize,
    /// Samples per year; the transform's sample spacing is its inverse.
    #[serde(default = "default_252_f64")]
    pub samples_per_year: f64,
    /// Ticks that must pass before the filter output is trusted.
    #[serde(default = "default_252")]
    pub maturity_ticks: u64,
}

impl Default for SpectralConfig {
    fn default() -> Self {
        Self {
            cutoff: 0.30,
            buffer: 0.05,
            padding: 1000,
            samples_per_year: 252.0,
            maturity_ticks: 252,
        }
    }
}

impl SpectralConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !(self.cutoff > 0.0) {
            return Err(PipelineError::invalid_config(
                "spectral.cutoff must be positive",
            ));
        }
        if !(self.buffer >= 0.0) {
            return Err(PipelineError::invalid_config(
                "spectral.buffer must be non-negative",
            ));
        }
        if !(self.samples_per_year > 0.0) || !self.samples_per_year.is_finite() {
            return Err(PipelineError::invalid_config(
                "spectral.samples_per_year must be a positive number",
            ));
        }
        Ok(())
    }

    /// Highest frequency (cycles per year) left untouched by the filter.
    #[inline]
    pub fn pass_band(&self) -> f64 {
        self.cutoff + self.buffer
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonteCarloConfig {
    #[serde(default = "default_100")]
    pub iterations: usize,
    /// Steps simulated per walk.
    #[serde(default = "default_1")]
    pub horizon: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Split iterations across the rayon pool.
    #[serde(default)]
    pub parallel: bool,
    /// Independent RNG streams used in parallel mode.
    #[serde(default = "default_8")]
    pub chunks: usize,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            iterations: 100,
            horizon: 1,
            seed: default_seed(),
            parallel: false,
            chunks: 8,
        }
    }
}

impl MonteCarloConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.iterations == 0 {
            return Err(PipelineError::invalid_config(
                "monte_carlo.iterations must be positive",
            ));
        }
        if self.horizon == 0 {
            return Err(PipelineError::invalid_config(
                "monte_carlo.horizon must be positive",
            ));
        }
        if self.parallel && self.chunks == 0 {
            return Err(PipelineError::invalid_config(
                "monte_carlo.chunks must be positive in parallel mode",
            ));
        }
        Ok(())
    }
}

/// How the sizer estimates the probability that the forecast move happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbabilityEstimator {
    /// Share of positive diffs, regardless of the forecast.
    NaiveFrequency,
    /// Share of diffs that would not have undone a move of the forecast size.
    #[default]
    ThresholdCrossing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KellyConfig {
    #[serde(default)]
    pub probability: ProbabilityEstimator,
    /// Clamp the raw Kelly fraction to `[-max_leverage, max_leverage]`.
    #[serde(default = "default_true")]
    pub clamp: bool,
    #[serde(default = "default_2_50")]
    pub max_leverage: f64,
    /// Only the most recent diffs feed the estimator. `None` uses the whole window.
    #[serde(default)]
    pub lookback: Option<usize>,
    /// Relative edges with `|b| <= min_edge` count as no edge at all.
    #[serde(default = "default_min_edge")]
    pub min_edge: f64,
}

impl Default for KellyConfig {
    fn default() -> Self {
        Self {
            probability: ProbabilityEstimator::ThresholdCrossing,
            clamp: true,
            max_leverage: 2.5,
            lookback: None,
            min_edge: default_min_edge(),
        }
    }
}

impl KellyConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.clamp && !(self.max_leverage > 0.0) {
            return Err(PipelineError::invalid_config(
                "kelly.max_leverage must be positive when clamping",
            ));
        }
        if !(self.min_edge >= 0.0) || !self.min_edge.is_finite() {
            return Err(PipelineError::invalid_config(
                "kelly.min_edge must be a non-negative number",
            ));
        }
        if self.lookback == Some(0) {
            return Err(PipelineError::invalid_config(
                "kelly.lookback must be positive",
            ));
        }
        Ok(())
    }
}

/// Order sizing conventions found across older strategy versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStyle {
    /// Absolute share count computed from cash.
    AbsoluteShares,
    /// Share delta against the current position.
    ShareDelta,
    /// Rebalance to a fraction of total portfolio value.
    #[default]
    TargetFraction,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default)]
    pub order_style: OrderStyle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperConfig {
    #[serde(default = "default_100000")]
    pub initial_cash: f64,
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            initial_cash: 100_000.0,
        }
    }
}

// Default value helpers
fn default_true() -> bool { true }
fn default_1() -> usize { 1 }
fn default_8() -> usize { 8 }
fn default_10() -> usize { 10 }
fn default_100() -> usize { 100 }
fn default_252() -> u64 { 252 }
fn default_1000() -> usize { 1000 }
fn default_seed() -> u64 { 42 }
fn default_0_05() -> f64 { 0.05 }
fn default_0_30() -> f64 { 0.30 }
fn default_2_50() -> f64 { 2.50 }
fn default_min_edge() -> f64 { 1e-12 }
fn default_252_f64() -> f64 { 252.0 }
fn default_100000() -> f64 { 100_000.0 }
fn default_symbol() -> String { "GS".into() }

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(String),

    #[error("config parse error: {0}")]
    Parse(String),

    #[error(transparent)]
    Invalid(#[from] PipelineError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::from_toml_str("").unwrap();
        assert_eq!(config.window.capacity, 10);
        assert_eq!(config.predictor.kind, PredictorKind::MonteCarlo);
        assert_eq!(config.kelly.probability, ProbabilityEstimator::ThresholdCrossing);
        assert!(config.kelly.clamp);
        assert_eq!(config.monte_carlo.iterations, 100);
        assert_eq!(config.spectral.padding, 1000);
        assert!((config.spectral.pass_band() - 0.35).abs() < 1e-12);
        assert_eq!(config.data.interval, Interval::DAILY);
        assert_eq!(config.data.field, PriceField::Close);
    }

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
[instrument]
symbol = "AAPL"

[data]
interval = "1d"
field = "price"

[window]
capacity = 300

[predictor]
kind = "spectral"

[spectral]
cutoff = 0.5
padding = 200
maturity_ticks = 100

[kelly]
probability = "naive_frequency"
clamp = false
lookback = 9
"#;

        let config = PipelineConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.instrument.symbol, "AAPL");
        assert_eq!(config.window.capacity, 300);
        assert_eq!(config.predictor.kind, PredictorKind::Spectral);
        assert!((config.spectral.cutoff - 0.5).abs() < 1e-12);
        assert!((config.spectral.buffer - 0.05).abs() < 1e-12);
        assert_eq!(config.spectral.maturity_ticks, 100);
        assert_eq!(config.kelly.probability, ProbabilityEstimator::NaiveFrequency);
        assert!(!config.kelly.clamp);
        assert_eq!(config.kelly.lookback, Some(9));
    }

    #[test]
    fn test_infinite_cutoff_allowed() {
        let config = PipelineConfig::from_toml_str("[spectral]\ncutoff = inf\n").unwrap();
        assert!(config.spectral.cutoff.is_infinite());
    }

    #[test]
    fn test_invalid_values_rejected() {
        for bad in [
            "[window]\ncapacity = 0\n",
            "[monte_carlo]\niterations = 0\n",
            "[monte_carlo]\nhorizon = 0\n",
            "[spectral]\ncutoff = 0.0\n",
            "[spectral]\ncutoff = -1.0\n",
            "[kelly]\nmax_leverage = 0.0\n",
            "[kelly]\nmin_edge = -1.0\n",
            "[execution]\norder_style = \"share_delta\"\n",
        ] {
            assert!(
                matches!(PipelineConfig::from_toml_str(bad), Err(ConfigError::Invalid(_))),
                "expected rejection for {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_unknown_variant_is_parse_error() {
        let err = PipelineConfig::from_toml_str("[kelly]\nprobability = \"blend\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_merge_overlay() {
        let mut base: toml::Value =
            toml::from_str("[window]\ncapacity = 10\n[kelly]\nclamp = true\n").unwrap();
        let overlay: toml::Value = toml::from_str("[window]\ncapacity = 20\n").unwrap();
        merge_toml(&mut base, overlay);
        let merged = toml::to_string(&base).unwrap();
        let config = PipelineConfig::from_toml_str(&merged).unwrap();
        assert_eq!(config.window.capacity, 20);
        assert!(config.kelly.clamp);
    }

    #[test]
    fn test_shipped_spectral_overlay() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config");
        let base = dir.join("default.toml");
        let overlay = dir.join("spectral.toml");
        let config = PipelineConfig::from_toml_files(&[base.as_path(), overlay.as_path()]).unwrap();
        assert_eq!(config.predictor.kind, PredictorKind::Spectral);
        assert_eq!(config.window.capacity, 252);
        assert_eq!(config.kelly.lookback, Some(9));
        assert_eq!(config.kelly.min_edge, 1e-12);
    }
}
