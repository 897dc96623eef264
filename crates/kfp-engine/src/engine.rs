use log::{debug, info, warn};
use serde::Serialize;

use kfp_core::{
    DataFeed, ErrorKind, ForecastMethod, ForecastResult, HistoryWindow, Interval, PipelineConfig,
    PipelineError, PriceField, PricePoint, WagerDecision,
};
use kfp_strategy::{build_predictor, KellySizer, Predictor};

use crate::recorder::Recorder;
use crate::venue::{EngineError, Tick, TradingVenue};

pub const PRICE_SERIES: &str = "price";
pub const FORECAST_SERIES: &str = "forecast";
pub const FRACTION_SERIES: &str = "fraction";
pub const PROBABILITY_SERIES: &str = "probability";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    WarmingUp,
    Active,
}

/// What one tick did.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Nothing submitted.
    WarmingUp,
    /// A Kelly-sized target fraction was submitted.
    Traded(WagerDecision),
    /// Forecast or sizing failed and a flat target was submitted instead.
    Fallback(PipelineError),
}

/// Entry point the scheduler calls once per price event.
pub trait TickHandler {
    fn on_tick(
        &mut self,
        tick: &Tick,
        venue: &mut dyn TradingVenue,
        recorder: &mut dyn Recorder,
    ) -> Result<TickOutcome, EngineError>;
}

/// Per-instrument forecast and sizing loop.
///
/// Pushes every tick into the history window. Once the window is full (and,
/// for the spectral predictor, more than `maturity_ticks` ticks have been
/// seen) each tick forecasts, sizes with Kelly and submits one target
/// fraction. Forecast and sizing failures never abort the run.
pub struct DecisionLoop {
    instrument: String,
    window: HistoryWindow,
    predictor: Box<dyn Predictor>,
    sizer: KellySizer,
    state: LoopState,
    ticks: u64,
    maturity_ticks: Option<u64>,
    sizing_lookback: Option<usize>,
    interval: Interval,
    field: PriceField,
}

impl DecisionLoop {
    /// Build the loop and its predictor from a validated config.
    pub fn new(config: &PipelineConfig) -> Result<Self, PipelineError> {
        Self::with_predictor(config, build_predictor(config))
    }

    /// Use a caller-supplied predictor; sizing and windowing still come from `config`.
    ///
    /// `config` is validated here too.
    pub fn with_predictor(
        config: &PipelineConfig,
        predictor: Box<dyn Predictor>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        let maturity_ticks = match predictor.method() {
            ForecastMethod::Spectral => Some(config.spectral.maturity_ticks),
            _ => None,
        };

        Ok(Self {
            instrument: config.instrument.symbol.clone(),
            window: HistoryWindow::new(config.window.capacity)?,
            predictor,
            sizer: KellySizer::new(&config.kelly),
            state: LoopState::WarmingUp,
            ticks: 0,
            maturity_ticks,
            sizing_lookback: config.kelly.lookback,
            interval: config.data.interval,
            field: config.data.field,
        })
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn window(&self) -> &HistoryWindow {
        &self.window
    }

    pub fn predictor_id(&self) -> &'static str {
        self.predictor.id()
    }

    /// Fill the window from `feed` before the first tick.
    ///
    /// Priming does not advance the tick counter, so it never shortens the
    /// spectral maturity period. Returns the number of points loaded.
    pub fn prime(&mut self, feed: &dyn DataFeed) -> Result<usize, EngineError> {
        let history = feed.history(self.window.capacity(), self.interval, self.field)?;
        for point in &history {
            self.window.push(*point);
        }
        info!(
            "{}: primed window with {} points ({}/{})",
            self.instrument,
            history.len(),
            self.window.len(),
            self.window.capacity()
        );
        Ok(history.len())
    }

    fn mature(&self) -> bool {
        self.window.ready() && self.maturity_ticks.map_or(true, |m| self.ticks > m)
    }

    fn sizing_diffs(&self) -> Result<Vec<f64>, PipelineError> {
        match self.sizing_lookback {
            Some(count) => self.window.recent_diffs(count),
            None => self.window.diffs(),
        }
    }

    fn decide(&mut self, price: f64) -> Result<(ForecastResult, WagerDecision), PipelineError> {
        let forecast = self.predictor.forecast(&self.window)?;
        let diffs = self.sizing_diffs()?;
        let decision = self.sizer.wager(&diffs, price, forecast.predicted_price)?;
        Ok((forecast, decision))
    }

    fn trade(
        &mut self,
        tick: &Tick,
        venue: &mut dyn TradingVenue,
        recorder: &mut dyn Recorder,
    ) -> Result<TickOutcome, EngineError> {
        match self.decide(tick.price) {
            Ok((forecast, decision)) => {
                venue.submit_target_fraction(&self.instrument, decision.fraction)?;
                debug!(
                    "{} tick {}: price={:.4} forecast={:.4} fraction={:.4}",
                    self.instrument,
                    self.ticks,
                    tick.price,
                    forecast.predicted_price,
                    decision.fraction
                );
                record_tick(recorder, tick.price, forecast.predicted_price, &decision);
                Ok(TickOutcome::Traded(decision))
            }
            Err(err) => match err.kind() {
                ErrorKind::Input => {
                    debug!("{} tick {}: {}; skipping", self.instrument, self.ticks, err);
                    record_passthrough(recorder, tick.price);
                    Ok(TickOutcome::WarmingUp)
                }
                ErrorKind::Computation => {
                    warn!(
                        "{} tick {}: {}; going flat",
                        self.instrument, self.ticks, err
                    );
                    let flat = WagerDecision::flat();
                    venue.submit_target_fraction(&self.instrument, flat.fraction)?;
                    record_tick(recorder, tick.price, tick.price, &flat);
                    Ok(TickOutcome::Fallback(err))
                }
                ErrorKind::Configuration => Err(err.into()),
            },
        }
    }
}

impl TickHandler for DecisionLoop {
    fn on_tick(
        &mut self,
        tick: &Tick,
        venue: &mut dyn TradingVenue,
        recorder: &mut dyn Recorder,
    ) -> Result<TickOutcome, EngineError> {
        self.window.push(PricePoint::new(tick.timestamp, tick.price));
        self.ticks += 1;

        if self.state == LoopState::WarmingUp && self.mature() {
            self.state = LoopState::Active;
            info!(
                "{}: active after {} ticks (predictor={}, portfolio={:.2})",
                self.instrument,
                self.ticks,
                self.predictor.id(),
                tick.portfolio.total_value
            );
        }

        match self.state {
            LoopState::WarmingUp => {
                record_passthrough(recorder, tick.price);
                Ok(TickOutcome::WarmingUp)
            }
            LoopState::Active => self.trade(tick, venue, recorder),
        }
    }
}

/// Every series gets one value per tick so they stay aligned.
fn record_passthrough(recorder: &mut dyn Recorder, price: f64) {
    record_tick(recorder, price, price, &WagerDecision::flat());
}

fn record_tick(recorder: &mut dyn Recorder, price: f64, forecast: f64, decision: &WagerDecision) {
    recorder.record(PRICE_SERIES, price);
    recorder.record(FORECAST_SERIES, forecast);
    recorder.record(FRACTION_SERIES, decision.fraction);
    recorder.record(PROBABILITY_SERIES, decision.probability);
}
