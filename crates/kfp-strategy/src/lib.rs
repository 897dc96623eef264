pub mod kelly;
pub mod monte_carlo;
pub mod spectral;
pub mod traits;

pub use kelly::KellySizer;
pub use monte_carlo::{MonteCarloPredictor, SimulationRun};
pub use spectral::{SpectralPredictor, Spectrum};
pub use traits::{Predictor, PredictorId};

use kfp_core::{PipelineConfig, PredictorKind};

/// Build the predictor selected in config.
pub fn build_predictor(config: &PipelineConfig) -> Box<dyn Predictor> {
    match config.predictor.kind {
        PredictorKind::Spectral => Box::new(SpectralPredictor::new(&config.spectral)),
        PredictorKind::MonteCarlo => Box::new(MonteCarloPredictor::new(&config.monte_carlo)),
    }
}
