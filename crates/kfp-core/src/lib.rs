pub mod candle;
pub mod config;
pub mod error;
pub mod feed;
pub mod signal;
pub mod window;

pub use candle::CandleStore;
pub use config::{
    ConfigError, KellyConfig, MonteCarloConfig, OrderStyle, PipelineConfig, PredictorKind,
    ProbabilityEstimator, SpectralConfig,
};
pub use error::{ErrorKind, PipelineError, Result};
pub use feed::{DataFeed, FeedError, Interval, PriceField};
pub use signal::{ForecastMethod, ForecastResult, PricePoint, WagerDecision};
pub use window::HistoryWindow;
