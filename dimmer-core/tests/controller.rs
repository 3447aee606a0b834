use core::ops::{Add, Sub};
use core::time::Duration;

use dimmer_core::config::{ConfigError, DimmerConfig};
use dimmer_core::controller::{DimmerController, TimerFacility, TimerId};
use dimmer_core::firing::EdgeKind;
use dimmer_core::pulse::{FiringPhase, GateDrive};
use dimmer_core::telemetry::DimmerEventKind;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct MockInstant(u64);

impl MockInstant {
    fn micros(value: u64) -> Self {
        Self(value)
    }
}

impl Add<Duration> for MockInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        Self(self.0 + u64::try_from(rhs.as_micros()).expect("duration fits"))
    }
}

impl Sub for MockInstant {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Self::Output {
        Duration::from_micros(self.0 - rhs.0)
    }
}

#[derive(Default)]
struct MockTimers {
    armed: Vec<(TimerId, Duration)>,
    cancelled: Vec<TimerId>,
}

impl MockTimers {
    fn last_armed(&self, id: TimerId) -> Option<Duration> {
        self.armed
            .iter()
            .rev()
            .find(|(armed_id, _)| *armed_id == id)
            .map(|(_, delay)| *delay)
    }

    fn reset(&mut self) {
        self.armed.clear();
        self.cancelled.clear();
    }
}

impl TimerFacility for MockTimers {
    fn arm(&mut self, id: TimerId, delay: Duration) {
        self.armed.push((id, delay));
    }

    fn cancel(&mut self, id: TimerId) {
        self.cancelled.push(id);
    }
}

#[derive(Default)]
struct MockGate {
    active: bool,
    starts: usize,
    stops: usize,
}

impl GateDrive for MockGate {
    fn start_burst(&mut self) {
        self.active = true;
        self.starts += 1;
    }

    fn stop_burst(&mut self) {
        self.active = false;
        self.stops += 1;
    }
}

type TestController = DimmerController<MockInstant, MockTimers, MockGate>;

fn build_controller(config: &DimmerConfig) -> TestController {
    DimmerController::new(config, MockTimers::default(), MockGate::default())
        .expect("controller construction should succeed")
}

/// Feeds enough steady 50 Hz edges to prime the filter window.
fn prime_at_fifty_hertz(controller: &mut TestController, edges: u64) -> MockInstant {
    let mut now = MockInstant::micros(0);
    controller.on_zero_cross_edge(now);
    for _ in 0..edges {
        now = now + Duration::from_micros(20_000);
        controller.on_zero_cross_edge(now);
    }
    now
}

#[test]
fn invalid_frequency_band_fails_construction() {
    let config = DimmerConfig {
        min_freq_hz: 65.0,
        max_freq_hz: 45.0,
        ..DimmerConfig::default()
    };
    let result = DimmerController::<MockInstant, _, _>::new(
        &config,
        MockTimers::default(),
        MockGate::default(),
    );
    assert!(matches!(result, Err(ConfigError::InvalidFrequencyBand)));
}

#[test]
fn starts_idle_disabled_and_faulty() {
    let controller = build_controller(&DimmerConfig::default());
    assert!(!controller.is_enabled());
    assert!(controller.is_faulty());
    assert_eq!(controller.phase(), FiringPhase::Idle);
    assert!((controller.current_power() - 0.0).abs() < f32::EPSILON);
}

#[test]
fn first_edge_only_records_a_timestamp() {
    let mut controller = build_controller(&DimmerConfig::default());
    controller.enable_output();
    controller.on_zero_cross_edge(MockInstant::micros(1_000));

    // No interval exists yet, so no estimator verdict may be logged.
    let events: Vec<_> = controller.events().oldest_ordered().copied().collect();
    assert!(!events.contains(&DimmerEventKind::EdgeAccepted));
    assert!(!events.contains(&DimmerEventKind::EdgeRejected));
}

#[test]
fn half_cycle_prediction_is_armed_even_while_faulty() {
    let mut controller = build_controller(&DimmerConfig::default());
    controller.on_zero_cross_edge(MockInstant::micros(0));

    // The estimator freewheels on the 50 Hz nominal; the predictor keeps
    // running so firing can resume the instant the signal becomes valid.
    assert_eq!(
        controller.timers().last_armed(TimerId::HalfCycle),
        Some(Duration::from_micros(10_000))
    );
    assert_eq!(controller.timers().last_armed(TimerId::FiringDelay), None);
}

#[test]
fn half_cycle_prediction_compensates_detector_latency() {
    let config = DimmerConfig {
        measurement_delay: Duration::from_micros(3_000),
        ..DimmerConfig::default()
    };
    let mut controller = build_controller(&config);
    prime_at_fifty_hertz(&mut controller, 5);

    assert_eq!(
        controller.timers().last_armed(TimerId::HalfCycle),
        Some(Duration::from_micros(7_000))
    );
}

#[test]
fn full_chain_fires_both_half_cycles() {
    let mut controller = build_controller(&DimmerConfig::default());
    controller.enable_output();
    controller.set_power(100.0);
    prime_at_fifty_hertz(&mut controller, 5);

    // Hardware half-cycle: firing delay armed from the confirmed edge.
    let hardware_lead = controller
        .timers()
        .last_armed(TimerId::FiringDelay)
        .expect("hardware half-cycle should arm the firing delay");
    assert!((277..=278).contains(&u64::try_from(hardware_lead.as_micros()).unwrap()));
    assert_eq!(controller.phase(), FiringPhase::AwaitingFire);

    controller.on_timer(TimerId::FiringDelay);
    assert!(controller.gate().active);
    assert_eq!(controller.phase(), FiringPhase::Firing);
    assert_eq!(
        controller.timers().last_armed(TimerId::PulseStop),
        Some(Duration::from_micros(500))
    );

    controller.on_timer(TimerId::PulseStop);
    assert!(!controller.gate().active);
    assert_eq!(controller.phase(), FiringPhase::Idle);

    // Synthetic half-cycle: the predicted edge replays the firing decision.
    controller.timers_mut().reset();
    controller.on_timer(TimerId::HalfCycle);
    assert!(controller.timers().last_armed(TimerId::FiringDelay).is_some());

    controller.on_timer(TimerId::FiringDelay);
    controller.on_timer(TimerId::PulseStop);

    let events: Vec<_> = controller.events().oldest_ordered().copied().collect();
    assert!(events.contains(&DimmerEventKind::PulseFired(EdgeKind::Hardware)));
    assert!(events.contains(&DimmerEventKind::SyntheticEdge));
    assert!(events.contains(&DimmerEventKind::PulseFired(EdgeKind::Predicted)));
}

#[test]
fn no_firing_occurs_while_faulty() {
    let mut controller = build_controller(&DimmerConfig::default());
    controller.enable_output();
    controller.set_power(100.0);
    let now = prime_at_fifty_hertz(&mut controller, 5);
    assert!(!controller.is_faulty());

    // A 5 ms interval is far outside the 45-65 Hz band.
    controller.timers_mut().reset();
    controller.on_zero_cross_edge(now + Duration::from_micros(5_000));
    assert!(controller.is_faulty());
    assert_eq!(controller.timers().last_armed(TimerId::FiringDelay), None);
    assert!(controller
        .timers()
        .cancelled
        .contains(&TimerId::FiringDelay));
    assert!(!controller.gate().active);
    assert_eq!(controller.phase(), FiringPhase::Idle);

    // The filtered period freewheels, so the predictor stays on 50 Hz timing.
    assert_eq!(
        controller.timers().last_armed(TimerId::HalfCycle),
        Some(Duration::from_micros(10_000))
    );
}

#[test]
fn firing_timer_expiry_reconfirms_fault_state() {
    let mut controller = build_controller(&DimmerConfig::default());
    controller.enable_output();
    controller.set_power(50.0);
    let now = prime_at_fifty_hertz(&mut controller, 5);
    assert_eq!(controller.phase(), FiringPhase::AwaitingFire);

    // Fault arrives after the firing delay was armed.
    controller.on_zero_cross_edge(now + Duration::from_micros(5_000));
    let starts_before = controller.gate().starts;

    controller.on_timer(TimerId::FiringDelay);
    assert_eq!(controller.gate().starts, starts_before);
    assert!(!controller.gate().active);
}

#[test]
fn firing_timer_expiry_reconfirms_enable_state() {
    let mut controller = build_controller(&DimmerConfig::default());
    controller.enable_output();
    controller.set_power(50.0);
    prime_at_fifty_hertz(&mut controller, 5);
    assert_eq!(controller.phase(), FiringPhase::AwaitingFire);

    controller.disable_output();
    controller.on_timer(TimerId::FiringDelay);

    assert_eq!(controller.gate().starts, 0);
    assert!(!controller.gate().active);
    assert_eq!(controller.phase(), FiringPhase::Idle);
}

#[test]
fn disable_output_truncates_an_in_flight_burst() {
    let mut controller = build_controller(&DimmerConfig::default());
    controller.enable_output();
    controller.set_power(100.0);
    prime_at_fifty_hertz(&mut controller, 5);
    controller.on_timer(TimerId::FiringDelay);
    assert!(controller.gate().active);

    controller.disable_output();
    assert!(!controller.gate().active);
    assert_eq!(controller.phase(), FiringPhase::Idle);
    assert!(!controller.is_enabled());

    // Firing stays suppressed until re-enabled.
    let now = MockInstant::micros(1_000_000);
    controller.on_zero_cross_edge(now);
    controller.on_zero_cross_edge(now + Duration::from_micros(20_000));
    assert_eq!(controller.gate().starts, 1);

    controller.enable_output();
    controller.on_zero_cross_edge(now + Duration::from_micros(40_000));
    assert!(controller.timers().last_armed(TimerId::FiringDelay).is_some());
}

#[test]
fn low_power_fires_late_in_the_half_cycle() {
    let mut controller = build_controller(&DimmerConfig::default());
    controller.enable_output();
    controller.set_power(0.0);
    prime_at_fifty_hertz(&mut controller, 5);

    let lead = controller
        .timers()
        .last_armed(TimerId::FiringDelay)
        .expect("zero power still fires, just very late");
    assert!((9_721..=9_723).contains(&u64::try_from(lead.as_micros()).unwrap()));
}

#[test]
fn status_snapshot_tracks_the_controller() {
    let mut controller = build_controller(&DimmerConfig::default());
    controller.enable_output();
    controller.set_power(30.0);
    prime_at_fifty_hertz(&mut controller, 5);

    let status = controller.status();
    assert!((status.power_percent - 30.0).abs() < f32::EPSILON);
    assert!((status.firing_angle_deg - 124.0).abs() < 1e-3);
    assert!((status.frequency_hz - 50.0).abs() < 0.01);
    assert!(!status.faulty);
    assert!(status.enabled);
}

#[test]
fn runtime_setters_take_effect_on_the_next_cycle() {
    let mut controller = build_controller(&DimmerConfig::default());
    controller.enable_output();
    controller.set_power(50.0);
    let now = prime_at_fifty_hertz(&mut controller, 5);

    controller.set_measurement_delay(Duration::from_micros(2_000));
    controller.timers_mut().reset();
    controller.on_zero_cross_edge(now + Duration::from_micros(20_000));

    // Hardware firing lead: (90 / 180) * 10000 - 2000.
    assert_eq!(
        controller.timers().last_armed(TimerId::FiringDelay),
        Some(Duration::from_micros(3_000))
    );
    // Prediction lead: 10000 - 2000.
    assert_eq!(
        controller.timers().last_armed(TimerId::HalfCycle),
        Some(Duration::from_micros(8_000))
    );
}
