//! The dimmer controller: zero-cross prediction, timer choreography, and the
//! lifecycle surface consumed by the outer control loop.
//!
//! The hardware detector reports only rising edges, one per full mains
//! cycle, yet the TRIAC must be fired once per half-cycle. On every hardware
//! edge the controller measures the raw interval, updates the period
//! estimator, runs the firing decision for the confirmed half-cycle, and
//! arms a one-shot timer that synthesizes the opposite-polarity crossing at
//! mid-period. The synthetic edge replays the same firing decision for the
//! second half-cycle, so conduction stays symmetric across both polarities.
//!
//! Detector latency is compensated where it exists: the hardware path
//! subtracts the configured measurement delay from its firing lead, and the
//! mid-period prediction is armed `period/2 - delay` after the (late)
//! interrupt so the synthetic edge lands on the true crossing. The synthetic
//! path itself needs no compensation, since no physical detector sits in it.

use core::ops::Sub;
use core::time::Duration;

use crate::config::{ConfigError, DimmerConfig};
use crate::estimator::{AcceptanceBand, Micros, PeriodEstimator, SampleVerdict};
use crate::firing::{self, EdgeKind, FiringPlan, PowerSetting, SkipReason};
use crate::pulse::{FiringPhase, GateDrive};
use crate::telemetry::{ControllerStatus, DimmerEventKind, EventLog};

/// The three one-shot timers the controller schedules.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "use-defmt", derive(defmt::Format))]
pub enum TimerId {
    /// Fires at the predicted mid-period crossing (the synthetic edge).
    HalfCycle,
    /// Fires at the computed phase-angle offset.
    FiringDelay,
    /// Ends the gate burst.
    PulseStop,
}

/// Abstraction over the platform's one-shot timer capability.
///
/// All three [`TimerId`]s must be independently armable at once. Arming an
/// already-armed timer re-schedules it; cancelling an idle timer is a no-op.
/// Expiry is delivered back through
/// [`DimmerController::on_timer`].
pub trait TimerFacility {
    /// Arms (or re-arms) the one-shot timer to fire after `delay`.
    fn arm(&mut self, id: TimerId, delay: Duration);

    /// Cancels the timer if armed.
    fn cancel(&mut self, id: TimerId);
}

/// Phase-angle dimmer controller.
///
/// Generic over the monotonic instant type `I` supplied by the platform, the
/// timer facility, and the gate drive. All state is created once at
/// construction and lives for the controller's lifetime; the timers and gate
/// are owned exclusively by this instance.
pub struct DimmerController<I, T, G> {
    estimator: PeriodEstimator,
    power: PowerSetting,
    enabled: bool,
    measurement_delay: Micros,
    pulse_width: Duration,
    last_edge: Option<I>,
    phase: FiringPhase,
    pending_edge: EdgeKind,
    timers: T,
    gate: G,
    events: EventLog,
}

impl<I, T, G> DimmerController<I, T, G>
where
    I: Copy + Sub<I, Output = Duration>,
    T: TimerFacility,
    G: GateDrive,
{
    /// Creates the controller with output disabled and power at zero.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the configuration fails
    /// [`DimmerConfig::validate`]; the caller must treat this as fatal and
    /// not enable output.
    pub fn new(config: &DimmerConfig, timers: T, gate: G) -> Result<Self, ConfigError> {
        config.validate()?;
        let band = AcceptanceBand::from_frequency_range(config.min_freq_hz, config.max_freq_hz);
        Ok(Self {
            estimator: PeriodEstimator::new(band, config.filter_window, config.lpf_alpha),
            power: PowerSetting::off(),
            enabled: false,
            measurement_delay: Micros::from_duration(config.measurement_delay),
            pulse_width: config.pulse_width,
            last_edge: None,
            phase: FiringPhase::Idle,
            pending_edge: EdgeKind::Hardware,
            timers,
            gate,
            events: EventLog::new(),
        })
    }

    /// Handles one hardware-detected rising edge.
    ///
    /// This is the entry point for the edge-interrupt chain: estimator
    /// update, then the firing decision for the hardware-confirmed
    /// half-cycle, then the mid-period prediction for the synthetic one. The
    /// very first edge only records its timestamp, as there is no previous
    /// edge to measure against.
    pub fn on_zero_cross_edge(&mut self, now: I) {
        let raw = self.last_edge.map(|previous| Micros::from_duration(now - previous));
        self.last_edge = Some(now);

        if let Some(raw) = raw {
            match self.estimator.ingest(raw) {
                SampleVerdict::Accepted => self.events.record(DimmerEventKind::EdgeAccepted),
                SampleVerdict::Rejected => self.events.record(DimmerEventKind::EdgeRejected),
            }
        }

        self.run_firing_decision(EdgeKind::Hardware);
        self.arm_half_cycle_prediction();
    }

    /// Handles expiry of one of the controller's one-shot timers.
    pub fn on_timer(&mut self, id: TimerId) {
        match id {
            TimerId::HalfCycle => {
                self.events.record(DimmerEventKind::SyntheticEdge);
                self.run_firing_decision(EdgeKind::Predicted);
            }
            TimerId::FiringDelay => self.fire_if_still_allowed(),
            TimerId::PulseStop => self.finish_pulse(),
        }
    }

    fn run_firing_decision(&mut self, edge: EdgeKind) {
        let half_period = Micros::new(self.estimator.period().as_u32() / 2);
        let plan = firing::plan_firing(
            self.power.angle_deg(),
            half_period,
            edge,
            self.measurement_delay,
            self.enabled,
            self.estimator.is_faulty(),
        );

        match plan {
            FiringPlan::Arm(lead) => {
                self.pending_edge = edge;
                self.phase = FiringPhase::AwaitingFire;
                self.timers.arm(TimerId::FiringDelay, lead.as_duration());
            }
            FiringPlan::FireNow => {
                self.pending_edge = edge;
                self.fire_if_still_allowed();
            }
            FiringPlan::Skip(reason) => self.suppress(reason),
        }
    }

    fn suppress(&mut self, reason: SkipReason) {
        self.events.record(DimmerEventKind::PulseSuppressed(reason));
        match reason {
            SkipReason::OutputDisabled | SkipReason::SignalFault => {
                // Fail safe: withhold this half-cycle entirely.
                self.timers.cancel(TimerId::FiringDelay);
                self.gate.stop_burst();
                self.phase = FiringPhase::Idle;
            }
            // A zero half-period only means there is nothing to schedule; an
            // in-flight burst still ends through its pulse-stop timer.
            SkipReason::DegenerateTiming => {}
        }
    }

    /// Re-confirm-before-act: the firing timer may have been armed before a
    /// fault or disable arrived, so the state is checked again here instead
    /// of relying on timer cancellation.
    fn fire_if_still_allowed(&mut self) {
        if !self.enabled || self.estimator.is_faulty() {
            let reason = if self.enabled {
                SkipReason::SignalFault
            } else {
                SkipReason::OutputDisabled
            };
            self.suppress(reason);
            return;
        }

        self.gate.start_burst();
        self.phase = FiringPhase::Firing;
        self.timers.arm(TimerId::PulseStop, self.pulse_width);
        self.events
            .record(DimmerEventKind::PulseFired(self.pending_edge));
    }

    fn finish_pulse(&mut self) {
        self.gate.stop_burst();
        self.phase = FiringPhase::Idle;
    }

    fn arm_half_cycle_prediction(&mut self) {
        let half_period = i64::from(self.estimator.period().as_u32() / 2);
        let lead = half_period - i64::from(self.measurement_delay.as_u32());
        if lead > 0 {
            #[allow(clippy::cast_sign_loss)]
            self.timers
                .arm(TimerId::HalfCycle, Duration::from_micros(lead as u64));
        }
    }

    /// Sets the desired conduction level, clamped to `[0, 100]` percent.
    pub fn set_power(&mut self, power_percent: f32) {
        self.power.set(power_percent);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        self.events.record(DimmerEventKind::PowerChanged(
            (self.power.level_percent() + 0.5) as u8,
        ));
    }

    /// Permits firing from the next zero-cross event on.
    pub fn enable_output(&mut self) {
        self.enabled = true;
        self.events.record(DimmerEventKind::OutputEnabled);
    }

    /// Immediately forces the gate off and suppresses future firing.
    ///
    /// Safe to call from the idle/polling context while a firing timer is
    /// mid-flight: the timer's callback re-confirms the enabled state before
    /// acting, so the armed timer itself does not need to be cancelled here.
    pub fn disable_output(&mut self) {
        self.enabled = false;
        self.gate.stop_burst();
        self.phase = FiringPhase::Idle;
        self.events.record(DimmerEventKind::OutputDisabled);
    }

    /// Updates the detector-to-interrupt latency compensation.
    pub fn set_measurement_delay(&mut self, delay: Duration) {
        self.measurement_delay = Micros::from_duration(delay);
    }

    /// Updates the estimator's low-pass smoothing factor (clamped to `[0, 1]`).
    pub fn set_lpf_alpha(&mut self, alpha: f32) {
        self.estimator.set_alpha(alpha);
    }

    /// Commanded power level in percent.
    #[must_use]
    pub const fn current_power(&self) -> f32 {
        self.power.level_percent()
    }

    /// Firing angle derived from the power level, degrees.
    #[must_use]
    pub const fn firing_angle_deg(&self) -> f32 {
        self.power.angle_deg()
    }

    /// Filtered mains frequency in hertz.
    #[must_use]
    pub fn frequency_hz(&self) -> f32 {
        self.estimator.frequency_hz()
    }

    /// Returns `true` while the estimator reports an out-of-band signal.
    #[must_use]
    pub const fn is_faulty(&self) -> bool {
        self.estimator.is_faulty()
    }

    /// Returns `true` while output firing is enabled.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Current per-half-cycle actuation phase.
    #[must_use]
    pub const fn phase(&self) -> FiringPhase {
        self.phase
    }

    /// Read access to the period estimator.
    #[must_use]
    pub const fn estimator(&self) -> &PeriodEstimator {
        &self.estimator
    }

    /// Read access to the bounded telemetry log.
    #[must_use]
    pub const fn events(&self) -> &EventLog {
        &self.events
    }

    /// Discards retained telemetry events.
    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    /// Read access to the timer facility.
    #[must_use]
    pub const fn timers(&self) -> &T {
        &self.timers
    }

    /// Mutable access to the timer facility.
    pub fn timers_mut(&mut self) -> &mut T {
        &mut self.timers
    }

    /// Read access to the gate drive.
    #[must_use]
    pub const fn gate(&self) -> &G {
        &self.gate
    }

    /// Mutable access to the gate drive.
    pub fn gate_mut(&mut self) -> &mut G {
        &mut self.gate
    }

    /// Snapshot of the externally observable state.
    #[must_use]
    pub fn status(&self) -> ControllerStatus {
        ControllerStatus {
            power_percent: self.power.level_percent(),
            firing_angle_deg: self.power.angle_deg(),
            frequency_hz: self.estimator.frequency_hz(),
            faulty: self.estimator.is_faulty(),
            enabled: self.enabled,
            phase: self.phase,
        }
    }
}
