//! Mains period estimation over the raw zero-cross interval stream.
//!
//! The hardware edge detector delivers one rising edge per mains cycle, with
//! jitter and the occasional spurious pulse. This module turns that stream
//! into a stable period estimate: an acceptance band rejects impossible
//! intervals outright, a median window absorbs single-sample spikes that a
//! linear filter would slowly wash in, and an exponential low-pass stage
//! smooths the residual cycle-to-cycle jitter the median does not suppress.

#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

use core::time::Duration;

/// Compile-time capacity of the median window.
///
/// The configured logical window size must stay at or below this; keeping the
/// window single-digit keeps the per-sample sort negligible against the
/// microsecond-scale timing budget.
pub const MAX_FILTER_WINDOW: usize = 15;

/// Window size substituted when the configured size is even, zero, or larger
/// than [`MAX_FILTER_WINDOW`]. Odd-only windows keep the median index
/// unambiguous.
pub const DEFAULT_FILTER_WINDOW: usize = 5;

/// Nominal 50 Hz mains period used before the first valid sample arrives.
pub const NOMINAL_PERIOD: Micros = Micros::new(20_000);

/// Microsecond count carried between the edge source and the estimator.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "use-defmt", derive(defmt::Format))]
pub struct Micros(u32);

impl Micros {
    /// Zero microseconds.
    pub const ZERO: Micros = Micros(0);

    /// Wraps a raw microsecond count.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Returns the raw microsecond count.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Converts to a [`Duration`].
    #[must_use]
    pub const fn as_duration(self) -> Duration {
        Duration::from_micros(self.0 as u64)
    }

    /// Converts from a [`Duration`], saturating at `u32::MAX` microseconds.
    ///
    /// Anything long enough to saturate is far outside every acceptance band
    /// this crate can express, so the saturated value is still rejected.
    #[must_use]
    pub fn from_duration(duration: Duration) -> Self {
        Self(u32::try_from(duration.as_micros()).unwrap_or(u32::MAX))
    }
}

impl From<Micros> for Duration {
    fn from(value: Micros) -> Self {
        value.as_duration()
    }
}

/// Raw-period validity band derived from the expected mains frequency range.
///
/// A raw interval is plausible only when it lies strictly between the periods
/// of the fastest and slowest expected mains frequency; everything else is a
/// detector glitch or signal loss.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "use-defmt", derive(defmt::Format))]
pub struct AcceptanceBand {
    min_period: Micros,
    max_period: Micros,
}

impl AcceptanceBand {
    /// Builds the band from a frequency range in hertz.
    ///
    /// The period bounds invert the frequency bounds: the highest expected
    /// frequency yields the shortest acceptable period. The caller is
    /// responsible for validating the range (see
    /// [`DimmerConfig::validate`](crate::config::DimmerConfig::validate)).
    #[must_use]
    pub fn from_frequency_range(min_freq_hz: f32, max_freq_hz: f32) -> Self {
        Self {
            min_period: Micros::new((1_000_000.0 / max_freq_hz) as u32),
            max_period: Micros::new((1_000_000.0 / min_freq_hz) as u32),
        }
    }

    /// Returns `true` when the raw period lies strictly inside the band.
    #[must_use]
    pub fn contains(&self, raw: Micros) -> bool {
        raw > self.min_period && raw < self.max_period
    }

    /// Shortest acceptable raw period (exclusive bound).
    #[must_use]
    pub const fn min_period(&self) -> Micros {
        self.min_period
    }

    /// Longest acceptable raw period (exclusive bound).
    #[must_use]
    pub const fn max_period(&self) -> Micros {
        self.max_period
    }
}

/// Outcome of feeding one raw interval into the estimator.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "use-defmt", derive(defmt::Format))]
pub enum SampleVerdict {
    /// The sample was inside the acceptance band and updated the filter.
    Accepted,
    /// The sample was outside the band; the filter kept its last good state.
    Rejected,
}

impl SampleVerdict {
    /// Returns `true` for [`SampleVerdict::Accepted`].
    #[must_use]
    pub const fn is_accepted(self) -> bool {
        matches!(self, SampleVerdict::Accepted)
    }
}

/// Cascaded median + exponential low-pass estimator of the mains period.
///
/// Owned by a single producer (the edge-consuming path); never touched from
/// two contexts at once. The filtered period is always defined: it starts at
/// the 50 Hz nominal and freewheels on the last good value whenever samples
/// are rejected, so downstream consumers never observe an undefined period.
pub struct PeriodEstimator {
    band: AcceptanceBand,
    window: [u32; MAX_FILTER_WINDOW],
    window_len: usize,
    cursor: usize,
    primed: bool,
    alpha: f32,
    filtered_us: f32,
    faulty: bool,
}

impl PeriodEstimator {
    /// Creates an estimator over the given acceptance band.
    ///
    /// `window_len` is forced odd: even, zero, or oversized requests silently
    /// fall back to [`DEFAULT_FILTER_WINDOW`]. `alpha` is clamped to `[0, 1]`
    /// (1.0 disables the low-pass stage).
    #[must_use]
    pub fn new(band: AcceptanceBand, window_len: usize, alpha: f32) -> Self {
        Self {
            band,
            window: [0; MAX_FILTER_WINDOW],
            window_len: effective_window(window_len),
            cursor: 0,
            primed: false,
            alpha: alpha.clamp(0.0, 1.0),
            filtered_us: NOMINAL_PERIOD.as_u32() as f32,
            faulty: true,
        }
    }

    /// Feeds one raw edge-to-edge interval into the filter cascade.
    pub fn ingest(&mut self, raw: Micros) -> SampleVerdict {
        if !self.band.contains(raw) {
            // Freewheel: keep the last good filtered period untouched so the
            // cascade does not re-bootstrap once valid samples resume.
            self.faulty = true;
            return SampleVerdict::Rejected;
        }

        self.faulty = false;
        self.window[self.cursor] = raw.as_u32();
        self.cursor += 1;
        if self.cursor == self.window_len {
            self.cursor = 0;
            self.primed = true;
        }

        if self.primed {
            let median = self.median() as f32;
            self.filtered_us = self.alpha * median + (1.0 - self.alpha) * self.filtered_us;
        } else {
            // Bootstrap: no smoothing until the window has filled once.
            self.filtered_us = raw.as_u32() as f32;
        }

        SampleVerdict::Accepted
    }

    fn median(&self) -> u32 {
        let mut sorted = self.window;
        let sorted = &mut sorted[..self.window_len];
        sorted.sort_unstable();
        sorted[self.window_len / 2]
    }

    /// Current filtered mains period.
    #[must_use]
    pub fn period(&self) -> Micros {
        Micros::new((self.filtered_us + 0.5) as u32)
    }

    /// Current mains frequency in hertz, or 0.0 when the period is zero.
    #[must_use]
    pub fn frequency_hz(&self) -> f32 {
        let period = self.period().as_u32();
        if period == 0 {
            0.0
        } else {
            1_000_000.0 / period as f32
        }
    }

    /// Returns `true` while the most recent sample was out of band (or no
    /// valid sample has arrived yet).
    #[must_use]
    pub const fn is_faulty(&self) -> bool {
        self.faulty
    }

    /// Effective (odd) median window size.
    #[must_use]
    pub const fn window_len(&self) -> usize {
        self.window_len
    }

    /// Current low-pass smoothing factor.
    #[must_use]
    pub const fn alpha(&self) -> f32 {
        self.alpha
    }

    /// Updates the low-pass smoothing factor, clamped to `[0, 1]`.
    pub fn set_alpha(&mut self, alpha: f32) {
        self.alpha = alpha.clamp(0.0, 1.0);
    }

    /// Acceptance band this estimator validates against.
    #[must_use]
    pub const fn band(&self) -> AcceptanceBand {
        self.band
    }
}

fn effective_window(requested: usize) -> usize {
    if requested == 0 || requested > MAX_FILTER_WINDOW || requested % 2 == 0 {
        DEFAULT_FILTER_WINDOW
    } else {
        requested
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mains_band() -> AcceptanceBand {
        AcceptanceBand::from_frequency_range(45.0, 65.0)
    }

    #[test]
    fn band_bounds_invert_the_frequency_range() {
        let band = mains_band();
        assert_eq!(band.min_period(), Micros::new(15_384));
        assert_eq!(band.max_period(), Micros::new(22_222));
    }

    #[test]
    fn band_bounds_are_exclusive() {
        let band = mains_band();
        assert!(!band.contains(band.min_period()));
        assert!(!band.contains(band.max_period()));
        assert!(band.contains(Micros::new(20_000)));
    }

    #[test]
    fn even_window_requests_fall_back_to_default() {
        for requested in [0, 2, 4, 6, MAX_FILTER_WINDOW + 2] {
            let estimator = PeriodEstimator::new(mains_band(), requested, 1.0);
            assert_eq!(estimator.window_len(), DEFAULT_FILTER_WINDOW);
        }
        let estimator = PeriodEstimator::new(mains_band(), 7, 1.0);
        assert_eq!(estimator.window_len(), 7);
    }

    #[test]
    fn starts_faulty_with_the_nominal_period() {
        let estimator = PeriodEstimator::new(mains_band(), 5, 1.0);
        assert!(estimator.is_faulty());
        assert_eq!(estimator.period(), NOMINAL_PERIOD);
    }

    #[test]
    fn bootstrap_tracks_raw_samples_before_the_window_fills() {
        let mut estimator = PeriodEstimator::new(mains_band(), 5, 1.0);
        estimator.ingest(Micros::new(19_900));
        assert_eq!(estimator.period(), Micros::new(19_900));
        estimator.ingest(Micros::new(20_100));
        assert_eq!(estimator.period(), Micros::new(20_100));
    }

    #[test]
    fn alpha_is_clamped() {
        let mut estimator = PeriodEstimator::new(mains_band(), 5, 3.0);
        assert!((estimator.alpha() - 1.0).abs() < f32::EPSILON);
        estimator.set_alpha(-0.5);
        assert!(estimator.alpha().abs() < f32::EPSILON);
    }
}
