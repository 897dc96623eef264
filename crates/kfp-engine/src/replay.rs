use log::{debug, info};
use serde::Serialize;

use kfp_core::PricePoint;

use crate::engine::{TickHandler, TickOutcome};
use crate::fill_sim::PaperVenue;
use crate::recorder::Recorder;
use crate::venue::{EngineError, Tick, TradingVenue};

pub const PORTFOLIO_SERIES: &str = "portfolio_value";

/// Tick counts from one replay.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReplaySummary {
    pub ticks: usize,
    pub warmup_ticks: usize,
    pub trades: usize,
    pub fallbacks: usize,
    pub final_value: f64,
}

/// Historical scheduler: one tick per price point, in order.
///
/// For each point the venue is marked first, the handler sees the marked
/// portfolio, and the post-trade portfolio value is recorded.
pub struct Replay<'a> {
    points: &'a [PricePoint],
}

impl<'a> Replay<'a> {
    pub fn new(points: &'a [PricePoint]) -> Self {
        Self { points }
    }

    pub fn run(
        &self,
        handler: &mut dyn TickHandler,
        venue: &mut PaperVenue,
        recorder: &mut dyn Recorder,
    ) -> Result<ReplaySummary, EngineError> {
        let mut summary = ReplaySummary::default();

        for point in self.points {
            venue.mark(point.timestamp, point.price)?;
            let tick = Tick {
                timestamp: point.timestamp,
                price: point.price,
                portfolio: venue.portfolio(),
            };

            match handler.on_tick(&tick, venue, recorder)? {
                TickOutcome::WarmingUp => summary.warmup_ticks += 1,
                TickOutcome::Traded(_) => summary.trades += 1,
                TickOutcome::Fallback(_) => summary.fallbacks += 1,
            }
            summary.ticks += 1;

            let value = venue.portfolio().total_value;
            recorder.record(PORTFOLIO_SERIES, value);
            debug!("t={} portfolio value: {:.2}", point.timestamp, value);
        }

        summary.final_value = venue.total_value();
        info!(
            "replay done: {} ticks, {} trades, {} fallbacks, final value {:.2}",
            summary.ticks, summary.trades, summary.fallbacks, summary.final_value
        );
        Ok(summary)
    }
}
