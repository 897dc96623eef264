use criterion::{black_box, criterion_group, criterion_main, Criterion};

use kfp_core::{
    HistoryWindow, MonteCarloConfig, PipelineConfig, PredictorKind, PricePoint, SpectralConfig,
};
use kfp_engine::{DecisionLoop, PaperVenue, Replay, SeriesRecorder};
use kfp_strategy::{MonteCarloPredictor, Predictor, SpectralPredictor};

fn make_prices(n: usize) -> Vec<PricePoint> {
    let base_ts: i64 = 1735689600;
    (0..n)
        .map(|i| {
            // Trending price with some noise
            let trend = (i as f64) * 0.01;
            let noise = ((i as f64) * 0.1).sin() * 0.5;
            PricePoint::new(base_ts + (i as i64) * 86_400, 100.0 + trend + noise)
        })
        .collect()
}

fn full_window(points: &[PricePoint]) -> HistoryWindow {
    let mut window = HistoryWindow::new(points.len()).unwrap();
    for p in points {
        window.push(*p);
    }
    window
}

fn bench_spectral_forecast(c: &mut Criterion) {
    let window = full_window(&make_prices(252));
    let mut predictor = SpectralPredictor::new(&SpectralConfig::default());

    c.bench_function("spectral_forecast_252_pad_1000", |b| {
        b.iter(|| black_box(predictor.forecast(black_box(&window)).unwrap()));
    });
}

fn bench_monte_carlo(c: &mut Criterion) {
    let window = full_window(&make_prices(10));
    let mut serial = MonteCarloPredictor::new(&MonteCarloConfig {
        iterations: 10_000,
        ..MonteCarloConfig::default()
    });
    let mut parallel = MonteCarloPredictor::new(&MonteCarloConfig {
        iterations: 10_000,
        parallel: true,
        ..MonteCarloConfig::default()
    });

    c.bench_function("monte_carlo_10k_serial", |b| {
        b.iter(|| black_box(serial.forecast(black_box(&window)).unwrap()));
    });
    c.bench_function("monte_carlo_10k_parallel", |b| {
        b.iter(|| black_box(parallel.forecast(black_box(&window)).unwrap()));
    });
}

fn bench_replay(c: &mut Criterion) {
    let points = make_prices(2_000);

    for kind in [PredictorKind::MonteCarlo, PredictorKind::Spectral] {
        let mut config = PipelineConfig::default();
        config.predictor.kind = kind;
        config.window.capacity = 64;
        config.spectral.maturity_ticks = 64;

        c.bench_function(&format!("replay_2k_{:?}", kind), |b| {
            b.iter(|| {
                let mut lp = DecisionLoop::new(&config).unwrap();
                let mut venue = PaperVenue::new("GS", 100_000.0);
                let mut rec = SeriesRecorder::new();
                let summary = Replay::new(black_box(&points))
                    .run(&mut lp, &mut venue, &mut rec)
                    .unwrap();
                black_box(summary);
            });
        });
    }
}

criterion_group!(benches, bench_spectral_forecast, bench_monte_carlo, bench_replay);
criterion_main!(benches);
