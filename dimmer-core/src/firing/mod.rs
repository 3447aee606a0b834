//! Power-to-angle mapping and the per-half-cycle firing decision.
//!
//! The decision logic is a pure function from the current angle, half-period,
//! and edge provenance to a [`FiringPlan`], so the scheduler's behavior is
//! table-testable without timers or a clock. The controller module owns the
//! choreography that turns a plan into an armed timer or an immediate burst.

#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

use crate::estimator::Micros;

/// Firing angle at 100 % power: fire almost immediately after the crossing.
pub const MIN_FIRING_ANGLE_DEG: f32 = 5.0;

/// Firing angle at 0 % power: fire almost at the end of the half-cycle.
pub const MAX_FIRING_ANGLE_DEG: f32 = 175.0;

/// Lead time below which arming a one-shot timer is pointless; the pulse is
/// started immediately instead.
pub const MIN_ARM_LEAD: Micros = Micros::new(50);

/// Maps a power level to a firing angle in degrees.
///
/// Linear inverse mapping: 0 % ⇒ [`MAX_FIRING_ANGLE_DEG`], 100 % ⇒
/// [`MIN_FIRING_ANGLE_DEG`]. This approximates true RMS phase control (the
/// exact RMS-vs-angle relation is non-linear) and relies on the outer control
/// loop to close the residual error.
#[must_use]
pub fn angle_for_power(power_percent: f32) -> f32 {
    let clamped = power_percent.clamp(0.0, 100.0);
    MAX_FIRING_ANGLE_DEG - (clamped / 100.0) * (MAX_FIRING_ANGLE_DEG - MIN_FIRING_ANGLE_DEG)
}

/// Externally-set power level and its derived firing angle.
///
/// The angle is never set directly; it always follows the clamped power level
/// through [`angle_for_power`].
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "use-defmt", derive(defmt::Format))]
pub struct PowerSetting {
    level_percent: f32,
    angle_deg: f32,
}

impl PowerSetting {
    /// Zero-power setting (angle at the end of the half-cycle).
    #[must_use]
    pub const fn off() -> Self {
        Self {
            level_percent: 0.0,
            angle_deg: MAX_FIRING_ANGLE_DEG,
        }
    }

    /// Updates the level (clamped to `[0, 100]`) and re-derives the angle.
    pub fn set(&mut self, power_percent: f32) {
        self.level_percent = power_percent.clamp(0.0, 100.0);
        self.angle_deg = angle_for_power(self.level_percent);
    }

    /// Current power level in percent.
    #[must_use]
    pub const fn level_percent(&self) -> f32 {
        self.level_percent
    }

    /// Derived firing angle in degrees.
    #[must_use]
    pub const fn angle_deg(&self) -> f32 {
        self.angle_deg
    }
}

impl Default for PowerSetting {
    fn default() -> Self {
        Self::off()
    }
}

/// Provenance of a zero-cross event.
///
/// Only hardware-detected edges carry the physical detector's latency; the
/// synthetic mid-cycle edge is generated by a timer and needs no
/// compensation.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "use-defmt", derive(defmt::Format))]
pub enum EdgeKind {
    /// Rising edge reported by the physical detector.
    Hardware,
    /// Simulated opposite-polarity edge predicted at mid-period.
    Predicted,
}

impl EdgeKind {
    /// Short lowercase label for status output.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            EdgeKind::Hardware => "hardware",
            EdgeKind::Predicted => "predicted",
        }
    }
}

/// Reason a half-cycle goes unfired.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "use-defmt", derive(defmt::Format))]
pub enum SkipReason {
    /// Output has not been enabled (or was disabled).
    OutputDisabled,
    /// The period estimator currently reports an out-of-band signal.
    SignalFault,
    /// The half-period is zero; arming a timer would be meaningless.
    DegenerateTiming,
}

impl SkipReason {
    /// Short lowercase label for status output.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            SkipReason::OutputDisabled => "output-disabled",
            SkipReason::SignalFault => "signal-fault",
            SkipReason::DegenerateTiming => "degenerate-timing",
        }
    }
}

/// Scheduling decision for one half-cycle.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "use-defmt", derive(defmt::Format))]
pub enum FiringPlan {
    /// Arm the firing-delay timer for the given lead time.
    Arm(Micros),
    /// The lead time is at or below [`MIN_ARM_LEAD`]; fire immediately.
    FireNow,
    /// Withhold firing for this half-cycle.
    Skip(SkipReason),
}

/// Computes the firing decision for one zero-cross event.
///
/// The delay is `(angle / 180°) · half_period`, reduced by the detector
/// latency on hardware edges only. Disabled output and signal fault fail safe
/// by withholding the pulse rather than firing on unreliable timing.
#[must_use]
pub fn plan_firing(
    angle_deg: f32,
    half_period: Micros,
    edge: EdgeKind,
    measurement_delay: Micros,
    enabled: bool,
    faulty: bool,
) -> FiringPlan {
    if !enabled {
        return FiringPlan::Skip(SkipReason::OutputDisabled);
    }
    if faulty {
        return FiringPlan::Skip(SkipReason::SignalFault);
    }
    if half_period == Micros::ZERO {
        return FiringPlan::Skip(SkipReason::DegenerateTiming);
    }

    let angle_delay_us = (angle_deg / 180.0) * half_period.as_u32() as f32;
    let lead_us = match edge {
        EdgeKind::Hardware => angle_delay_us as i64 - i64::from(measurement_delay.as_u32()),
        EdgeKind::Predicted => angle_delay_us as i64,
    };

    if lead_us > i64::from(MIN_ARM_LEAD.as_u32()) {
        FiringPlan::Arm(Micros::new(lead_us as u32))
    } else {
        FiringPlan::FireNow
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_maps_linearly_to_angle() {
        assert!((angle_for_power(0.0) - 175.0).abs() < 1e-4);
        assert!((angle_for_power(50.0) - 90.0).abs() < 1e-4);
        assert!((angle_for_power(100.0) - 5.0).abs() < 1e-4);
    }

    #[test]
    fn power_is_clamped_before_mapping() {
        assert!((angle_for_power(-5.0) - 175.0).abs() < 1e-4);
        assert!((angle_for_power(150.0) - 5.0).abs() < 1e-4);
    }

    #[test]
    fn hardware_edges_compensate_detector_latency() {
        let plan = plan_firing(
            90.0,
            Micros::new(10_000),
            EdgeKind::Hardware,
            Micros::new(3_000),
            true,
            false,
        );
        assert_eq!(plan, FiringPlan::Arm(Micros::new(2_000)));
    }

    #[test]
    fn predicted_edges_use_the_raw_angle_delay() {
        let plan = plan_firing(
            90.0,
            Micros::new(10_000),
            EdgeKind::Predicted,
            Micros::new(3_000),
            true,
            false,
        );
        assert_eq!(plan, FiringPlan::Arm(Micros::new(5_000)));
    }

    #[test]
    fn short_lead_fires_immediately() {
        let plan = plan_firing(
            5.0,
            Micros::new(10_000),
            EdgeKind::Hardware,
            Micros::new(250),
            true,
            false,
        );
        assert_eq!(plan, FiringPlan::FireNow);
    }

    #[test]
    fn disabled_output_wins_over_fault() {
        let plan = plan_firing(
            90.0,
            Micros::new(10_000),
            EdgeKind::Hardware,
            Micros::ZERO,
            false,
            true,
        );
        assert_eq!(plan, FiringPlan::Skip(SkipReason::OutputDisabled));
    }

    #[test]
    fn zero_half_period_is_degenerate() {
        let plan = plan_firing(
            90.0,
            Micros::ZERO,
            EdgeKind::Predicted,
            Micros::ZERO,
            true,
            false,
        );
        assert_eq!(plan, FiringPlan::Skip(SkipReason::DegenerateTiming));
    }
}
