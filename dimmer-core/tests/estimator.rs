use dimmer_core::estimator::{
    AcceptanceBand, DEFAULT_FILTER_WINDOW, Micros, PeriodEstimator, SampleVerdict,
};

fn mains_band() -> AcceptanceBand {
    AcceptanceBand::from_frequency_range(45.0, 65.0)
}

fn estimator(window: usize, alpha: f32) -> PeriodEstimator {
    PeriodEstimator::new(mains_band(), window, alpha)
}

#[test]
fn even_window_sizes_never_take_effect() {
    for requested in [2, 4, 8, 12] {
        let estimator = estimator(requested, 1.0);
        assert_eq!(
            estimator.window_len(),
            DEFAULT_FILTER_WINDOW,
            "window request {requested} should fall back to the odd default"
        );
        assert_eq!(estimator.window_len() % 2, 1);
    }
}

#[test]
fn in_band_samples_clear_the_fault_and_update_the_period() {
    let mut estimator = estimator(5, 1.0);
    assert!(estimator.is_faulty());

    let verdict = estimator.ingest(Micros::new(20_000));
    assert_eq!(verdict, SampleVerdict::Accepted);
    assert!(!estimator.is_faulty());
    assert_eq!(estimator.period(), Micros::new(20_000));
}

#[test]
fn out_of_band_samples_latch_the_fault_and_freewheel() {
    let mut estimator = estimator(5, 1.0);
    estimator.ingest(Micros::new(20_000));
    let before = estimator.period();

    for raw in [5_000, 40_000, 0, u32::MAX] {
        let verdict = estimator.ingest(Micros::new(raw));
        assert_eq!(verdict, SampleVerdict::Rejected, "raw {raw} should be rejected");
        assert!(estimator.is_faulty());
        assert_eq!(
            estimator.period(),
            before,
            "rejected sample {raw} must not move the filtered period"
        );
    }
}

#[test]
fn filled_window_reports_the_median_of_the_last_samples() {
    let mut estimator = estimator(5, 1.0);
    for raw in [19_800, 20_200, 19_900, 20_100, 20_000] {
        estimator.ingest(Micros::new(raw));
    }
    // Sorted window: 19800 19900 20000 20100 20200.
    assert_eq!(estimator.period(), Micros::new(20_000));

    // The sixth sample overwrites the oldest (19800); the median moves.
    estimator.ingest(Micros::new(21_000));
    assert_eq!(estimator.period(), Micros::new(20_100));
}

#[test]
fn unit_alpha_passes_the_median_through() {
    let mut estimator = estimator(3, 1.0);
    for raw in [20_000, 20_000, 20_000, 20_400] {
        estimator.ingest(Micros::new(raw));
    }
    // Window now 20400 20000 20000; median stays 20000.
    assert_eq!(estimator.period(), Micros::new(20_000));
}

#[test]
fn fractional_alpha_smooths_median_steps() {
    let mut estimator = estimator(3, 0.5);
    for raw in [20_000, 20_000, 20_000] {
        estimator.ingest(Micros::new(raw));
    }
    assert_eq!(estimator.period(), Micros::new(20_000));

    estimator.ingest(Micros::new(21_000));
    // Median still 20000: the filtered value must not move.
    assert_eq!(estimator.period(), Micros::new(20_000));

    estimator.ingest(Micros::new(21_000));
    // Median jumps to 21000; the low-pass stage takes half the step.
    assert_eq!(estimator.period(), Micros::new(20_500));
}

#[test]
fn steady_fifty_hertz_round_trip() {
    let mut estimator = estimator(5, 1.0);
    for _ in 0..5 {
        estimator.ingest(Micros::new(20_000));
    }
    assert!(!estimator.is_faulty());
    assert!((estimator.frequency_hz() - 50.0).abs() < 0.01);
}

#[test]
fn single_glitch_faults_one_sample_and_recovery_resumes_tracking() {
    let mut estimator = estimator(5, 1.0);
    for _ in 0..5 {
        estimator.ingest(Micros::new(20_000));
    }
    assert!(!estimator.is_faulty());

    estimator.ingest(Micros::new(5_000));
    assert!(estimator.is_faulty());
    assert_eq!(estimator.period(), Micros::new(20_000));

    estimator.ingest(Micros::new(20_000));
    assert!(!estimator.is_faulty());
    assert_eq!(estimator.period(), Micros::new(20_000));
    assert!((estimator.frequency_hz() - 50.0).abs() < 0.01);
}
