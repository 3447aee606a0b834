//! Dimmer plumbing shared by the host and MCU halves of this binary.
//!
//! Everything here is pure data and arithmetic: the embassy instant newtype
//! that satisfies the core's monotonic-instant bounds, duration conversions
//! between `core::time` and `embassy-time`, and the power command queue the
//! demo control loop feeds into the dimmer task.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use core::ops::{Add, Sub};
use core::time::Duration as CoreDuration;

#[cfg(not(target_os = "none"))]
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
#[cfg(target_os = "none")]
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};
use embassy_time::{Duration as EmbassyDuration, Instant};

/// Raw mutex used by the queues and signals shared between tasks.
#[cfg(target_os = "none")]
pub type DimmerMutex = ThreadModeRawMutex;
/// Raw mutex used by the queues and signals shared between tasks.
#[cfg(not(target_os = "none"))]
pub type DimmerMutex = NoopRawMutex;

/// Depth of the power command queue between the control loop and the dimmer.
pub const POWER_QUEUE_DEPTH: usize = 4;

/// Commands the outer control loop may issue to the dimmer task.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum PowerCommand {
    /// Update the conduction level, percent.
    SetPower(f32),
    /// Permit firing.
    Enable,
    /// Force the gate off and suppress firing.
    Disable,
}

/// Queue carrying [`PowerCommand`]s into the dimmer task.
pub type PowerQueue = Channel<DimmerMutex, PowerCommand, POWER_QUEUE_DEPTH>;

/// Convenience sender alias for the power command queue.
pub type PowerSender<'a> = Sender<'a, DimmerMutex, PowerCommand, POWER_QUEUE_DEPTH>;

/// Convenience receiver alias for the power command queue.
pub type PowerReceiver<'a> = Receiver<'a, DimmerMutex, PowerCommand, POWER_QUEUE_DEPTH>;

/// Embassy-backed monotonic instant satisfying the dimmer core's bounds.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct FirmwareInstant(Instant);

impl FirmwareInstant {
    /// Wraps an embassy instant.
    #[must_use]
    pub const fn new(instant: Instant) -> Self {
        Self(instant)
    }

    /// Returns the wrapped embassy instant.
    #[must_use]
    pub const fn into_inner(self) -> Instant {
        self.0
    }
}

impl From<Instant> for FirmwareInstant {
    fn from(instant: Instant) -> Self {
        Self::new(instant)
    }
}

impl Add<CoreDuration> for FirmwareInstant {
    type Output = Self;

    fn add(self, rhs: CoreDuration) -> Self::Output {
        Self(self.0 + core_duration_to_embassy(rhs))
    }
}

impl Sub for FirmwareInstant {
    type Output = CoreDuration;

    fn sub(self, rhs: Self) -> Self::Output {
        CoreDuration::from_micros((self.0 - rhs.0).as_micros())
    }
}

/// Converts a `core::time` duration to the embassy representation.
#[must_use]
pub fn core_duration_to_embassy(duration: CoreDuration) -> EmbassyDuration {
    let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
    EmbassyDuration::from_micros(micros)
}
