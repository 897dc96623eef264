pub mod engine;
pub mod fill_sim;
pub mod metrics;
pub mod parallel;
pub mod recorder;
pub mod replay;
pub mod venue;

pub use engine::{DecisionLoop, LoopState, TickHandler, TickOutcome};
pub use fill_sim::{PaperVenue, SimulatedFill};
pub use metrics::{Metrics, MetricsCalculator};
pub use parallel::{ShadowComparator, ShadowComparison, ShadowHandler, ShadowLeg};
pub use recorder::{Recorder, SeriesRecorder};
pub use replay::{Replay, ReplaySummary};
pub use venue::{EngineError, PortfolioState, Tick, TradingVenue, VenueError};
