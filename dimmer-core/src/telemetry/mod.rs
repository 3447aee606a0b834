//! Status snapshot and telemetry event catalog.
//!
//! Events are strongly typed and encode to compact numeric codes so a
//! diagnostics transport (RTT, a host session log) can carry them cheaply;
//! the bounded log keeps the most recent events for status queries without
//! allocation. Recording is always in-band with the control path; nothing
//! here blocks or suspends.

use core::fmt;

use heapless::{HistoryBuf, OldestOrdered};

use crate::firing::{EdgeKind, SkipReason};
use crate::pulse::FiringPhase;

/// Default capacity of the bounded event log.
pub const EVENT_LOG_DEPTH: usize = 32;

/// Snapshot of the externally observable controller state.
///
/// This is the whole surface a supervising control loop needs: what the
/// output is commanded to, what the mains is doing, and whether the signal
/// can currently be trusted.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "use-defmt", derive(defmt::Format))]
pub struct ControllerStatus {
    /// Commanded power level, percent.
    pub power_percent: f32,
    /// Firing angle derived from the power level, degrees.
    pub firing_angle_deg: f32,
    /// Filtered mains frequency, hertz.
    pub frequency_hz: f32,
    /// `true` while the estimator reports an out-of-band signal.
    pub faulty: bool,
    /// `true` while output firing is enabled.
    pub enabled: bool,
    /// Current per-half-cycle actuation phase.
    pub phase: FiringPhase,
}

impl fmt::Display for ControllerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "power {:.1}% angle {:.1}deg freq {:.2}Hz fault {} output {} phase {}",
            self.power_percent,
            self.firing_angle_deg,
            self.frequency_hz,
            if self.faulty { "yes" } else { "no" },
            if self.enabled { "on" } else { "off" },
            self.phase.label(),
        )
    }
}

/// Discriminated telemetry events emitted by the controller.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "use-defmt", derive(defmt::Format))]
pub enum DimmerEventKind {
    /// A hardware edge interval passed the acceptance band.
    EdgeAccepted,
    /// A hardware edge interval was rejected; the filter freewheels.
    EdgeRejected,
    /// The predicted mid-cycle edge fired.
    SyntheticEdge,
    /// Output firing was enabled.
    OutputEnabled,
    /// Output firing was disabled and the gate forced off.
    OutputDisabled,
    /// A gate burst started for the given half-cycle.
    PulseFired(EdgeKind),
    /// A half-cycle went unfired.
    PulseSuppressed(SkipReason),
    /// The commanded power level changed (rounded percent).
    PowerChanged(u8),
    /// Escape hatch for codes this build does not know.
    Custom(u16),
}

impl fmt::Display for DimmerEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DimmerEventKind::EdgeAccepted => f.write_str("edge-accepted"),
            DimmerEventKind::EdgeRejected => f.write_str("edge-rejected"),
            DimmerEventKind::SyntheticEdge => f.write_str("synthetic-edge"),
            DimmerEventKind::OutputEnabled => f.write_str("output-enabled"),
            DimmerEventKind::OutputDisabled => f.write_str("output-disabled"),
            DimmerEventKind::PulseFired(edge) => write!(f, "pulse-fired {}", edge.label()),
            DimmerEventKind::PulseSuppressed(reason) => {
                write!(f, "pulse-suppressed {}", reason.label())
            }
            DimmerEventKind::PowerChanged(percent) => write!(f, "power-changed {percent}%"),
            DimmerEventKind::Custom(code) => write!(f, "custom({code})"),
        }
    }
}

impl DimmerEventKind {
    const EDGE_ACCEPTED_CODE: u16 = 0x0000;
    const EDGE_REJECTED_CODE: u16 = 0x0001;
    const SYNTHETIC_EDGE_CODE: u16 = 0x0002;
    const OUTPUT_ENABLED_CODE: u16 = 0x0003;
    const OUTPUT_DISABLED_CODE: u16 = 0x0004;
    const PULSE_FIRED_BASE: u16 = 0x0010;
    const PULSE_SUPPRESSED_BASE: u16 = 0x0020;
    const POWER_CHANGED_BASE: u16 = 0x0100;
    const POWER_CHANGED_MAX: u16 = Self::POWER_CHANGED_BASE + 100;

    /// Encodes the event into a compact transport-friendly discriminant.
    #[must_use]
    #[allow(clippy::cast_lossless)]
    pub const fn to_raw(self) -> u16 {
        match self {
            DimmerEventKind::EdgeAccepted => Self::EDGE_ACCEPTED_CODE,
            DimmerEventKind::EdgeRejected => Self::EDGE_REJECTED_CODE,
            DimmerEventKind::SyntheticEdge => Self::SYNTHETIC_EDGE_CODE,
            DimmerEventKind::OutputEnabled => Self::OUTPUT_ENABLED_CODE,
            DimmerEventKind::OutputDisabled => Self::OUTPUT_DISABLED_CODE,
            DimmerEventKind::PulseFired(edge) => Self::PULSE_FIRED_BASE + edge_index(edge),
            DimmerEventKind::PulseSuppressed(reason) => {
                Self::PULSE_SUPPRESSED_BASE + skip_index(reason)
            }
            DimmerEventKind::PowerChanged(percent) => {
                Self::POWER_CHANGED_BASE + percent as u16
            }
            DimmerEventKind::Custom(code) => code,
        }
    }

    /// Decodes a raw discriminant, falling back to [`Custom`](Self::Custom).
    #[must_use]
    pub fn from_raw(code: u16) -> Self {
        match code {
            Self::EDGE_ACCEPTED_CODE => DimmerEventKind::EdgeAccepted,
            Self::EDGE_REJECTED_CODE => DimmerEventKind::EdgeRejected,
            Self::SYNTHETIC_EDGE_CODE => DimmerEventKind::SyntheticEdge,
            Self::OUTPUT_ENABLED_CODE => DimmerEventKind::OutputEnabled,
            Self::OUTPUT_DISABLED_CODE => DimmerEventKind::OutputDisabled,
            value if (Self::PULSE_FIRED_BASE..Self::PULSE_FIRED_BASE + 2).contains(&value) => {
                let offset = value - Self::PULSE_FIRED_BASE;
                edge_from_index(offset).map_or(DimmerEventKind::Custom(value), |edge| {
                    DimmerEventKind::PulseFired(edge)
                })
            }
            value
                if (Self::PULSE_SUPPRESSED_BASE..Self::PULSE_SUPPRESSED_BASE + 3)
                    .contains(&value) =>
            {
                let offset = value - Self::PULSE_SUPPRESSED_BASE;
                skip_from_index(offset).map_or(DimmerEventKind::Custom(value), |reason| {
                    DimmerEventKind::PulseSuppressed(reason)
                })
            }
            value if (Self::POWER_CHANGED_BASE..=Self::POWER_CHANGED_MAX).contains(&value) => {
                let percent = u8::try_from(value - Self::POWER_CHANGED_BASE).unwrap_or(u8::MAX);
                DimmerEventKind::PowerChanged(percent)
            }
            value => DimmerEventKind::Custom(value),
        }
    }
}

const fn edge_index(edge: EdgeKind) -> u16 {
    match edge {
        EdgeKind::Hardware => 0,
        EdgeKind::Predicted => 1,
    }
}

const fn edge_from_index(index: u16) -> Option<EdgeKind> {
    match index {
        0 => Some(EdgeKind::Hardware),
        1 => Some(EdgeKind::Predicted),
        _ => None,
    }
}

const fn skip_index(reason: SkipReason) -> u16 {
    match reason {
        SkipReason::OutputDisabled => 0,
        SkipReason::SignalFault => 1,
        SkipReason::DegenerateTiming => 2,
    }
}

const fn skip_from_index(index: u16) -> Option<SkipReason> {
    match index {
        0 => Some(SkipReason::OutputDisabled),
        1 => Some(SkipReason::SignalFault),
        2 => Some(SkipReason::DegenerateTiming),
        _ => None,
    }
}

/// Bounded log of the most recent telemetry events, oldest evicted first.
pub struct EventLog<const DEPTH: usize = EVENT_LOG_DEPTH> {
    buf: HistoryBuf<DimmerEventKind, DEPTH>,
}

impl<const DEPTH: usize> EventLog<DEPTH> {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: HistoryBuf::new(),
        }
    }

    /// Appends an event, evicting the oldest when full.
    pub fn record(&mut self, kind: DimmerEventKind) {
        self.buf.write(kind);
    }

    /// Number of retained events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns `true` when no events are retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.len() == 0
    }

    /// Iterates retained events from oldest to newest.
    pub fn oldest_ordered(&self) -> OldestOrdered<'_, DimmerEventKind> {
        self.buf.oldest_ordered()
    }

    /// Discards all retained events.
    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

impl<const DEPTH: usize> Default for EventLog<DEPTH> {
    fn default() -> Self {
        Self::new()
    }
}
