//! Gate pulse-train actuation.
//!
//! A TRIAC gate is latched by a short burst of fixed-frequency, fixed-duty
//! drive rather than a continuous level; once line current flows the device
//! stays on for the remainder of the half-cycle on its own. The burst
//! parameters here mirror a 10 kHz carrier at half duty, bounded to a few
//! hundred microseconds.

use core::time::Duration;

/// Carrier frequency of the gate burst.
pub const PULSE_TRAIN_FREQ_HZ: u32 = 10_000;

/// Duty cycle of the gate burst, in percent.
pub const PULSE_TRAIN_DUTY_PERCENT: u8 = 50;

/// Bounded duration of one gate burst.
pub const PULSE_TRAIN_DURATION: Duration = Duration::from_micros(500);

/// Abstraction over the pulse-capable gate output.
///
/// Implementations drive a hardware PWM channel (or a recording fake): the
/// carrier and duty are fixed at configuration time, so the core only ever
/// switches the burst on and off. `stop_burst` must be safe to call when no
/// burst is active.
pub trait GateDrive {
    /// Starts the fixed-frequency, fixed-duty burst.
    fn start_burst(&mut self);

    /// Stops the burst, forcing the gate output low.
    fn stop_burst(&mut self);
}

/// Gate drive that performs no hardware interaction.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopGateDrive;

impl NoopGateDrive {
    /// Creates a new no-op gate drive.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl GateDrive for NoopGateDrive {
    fn start_burst(&mut self) {}

    fn stop_burst(&mut self) {}
}

/// Per-half-cycle actuation state.
///
/// Fault or disable forces [`Idle`](FiringPhase::Idle) from any state with
/// the output off; the normal progression is
/// `Idle → AwaitingFire → Firing → Idle`.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "use-defmt", derive(defmt::Format))]
pub enum FiringPhase {
    /// No pulse pending for the current half-cycle.
    #[default]
    Idle,
    /// The firing-delay timer is armed.
    AwaitingFire,
    /// The gate burst is in flight.
    Firing,
}

impl FiringPhase {
    /// Returns `true` when no pulse is pending or active.
    #[must_use]
    pub const fn is_idle(self) -> bool {
        matches!(self, FiringPhase::Idle)
    }

    /// Returns `true` while the gate burst is active.
    #[must_use]
    pub const fn is_firing(self) -> bool {
        matches!(self, FiringPhase::Firing)
    }

    /// Short lowercase label for status output.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            FiringPhase::Idle => "idle",
            FiringPhase::AwaitingFire => "awaiting-fire",
            FiringPhase::Firing => "firing",
        }
    }
}
