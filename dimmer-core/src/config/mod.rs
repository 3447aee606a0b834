//! Construction-time configuration for the dimmer controller.

use core::fmt;
use core::time::Duration;

use crate::estimator::DEFAULT_FILTER_WINDOW;
use crate::pulse::PULSE_TRAIN_DURATION;

/// Options fixed when the controller is created.
///
/// The filter window and smoothing factor are sanitized rather than rejected
/// (see [`PeriodEstimator::new`](crate::estimator::PeriodEstimator::new));
/// only an unusable frequency band fails validation, since every later
/// decision depends on it.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "use-defmt", derive(defmt::Format))]
pub struct DimmerConfig {
    /// Lowest expected mains frequency, hertz.
    pub min_freq_hz: f32,
    /// Highest expected mains frequency, hertz.
    pub max_freq_hz: f32,
    /// Requested median window size (forced odd; see the estimator).
    pub filter_window: usize,
    /// Low-pass smoothing factor in `[0, 1]`; 1.0 disables smoothing.
    pub lpf_alpha: f32,
    /// Fixed latency of the physical edge detector.
    pub measurement_delay: Duration,
    /// Duration of the gate burst.
    pub pulse_width: Duration,
}

impl DimmerConfig {
    /// Checks the options that cannot be sanitized.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidFrequencyBand`] when the frequency range
    /// is empty, inverted, or includes non-positive frequencies.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_freq_hz <= 0.0 || self.min_freq_hz >= self.max_freq_hz {
            return Err(ConfigError::InvalidFrequencyBand);
        }
        Ok(())
    }
}

impl Default for DimmerConfig {
    fn default() -> Self {
        Self {
            min_freq_hz: 45.0,
            max_freq_hz: 65.0,
            filter_window: DEFAULT_FILTER_WINDOW,
            lpf_alpha: 1.0,
            measurement_delay: Duration::ZERO,
            pulse_width: PULSE_TRAIN_DURATION,
        }
    }
}

/// Errors surfaced when controller construction fails.
///
/// Construction failure is fatal to the caller: the controller must not be
/// enabled afterwards.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "use-defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// `min_freq_hz` is non-positive or not below `max_freq_hz`.
    InvalidFrequencyBand,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}
