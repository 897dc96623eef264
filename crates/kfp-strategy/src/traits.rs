use kfp_core::{ForecastMethod, ForecastResult, HistoryWindow, Result};

/// Unique predictor identifier.
pub type PredictorId = &'static str;

/// Next-price forecaster over a snapshot of the rolling history.
///
/// Implementations read the window and never mutate it; any state they carry
/// (a seeded generator, for instance) is their own. Must be `Send` so a
/// shadow run can evaluate two predictors on one snapshot concurrently.
pub trait Predictor: Send {
    /// Forecast the next price from the current window contents.
    ///
    /// Input errors (`InsufficientHistory`, `InsufficientWindow`) mean "not
    /// enough data yet"; computation errors mean the forecast broke down for
    /// this snapshot.
    fn forecast(&mut self, window: &HistoryWindow) -> Result<ForecastResult>;

    fn id(&self) -> PredictorId;

    fn method(&self) -> ForecastMethod;
}
