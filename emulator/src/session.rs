use std::cell::Cell;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::ops::{Add, Sub};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use crossterm::style::Stylize;

use dimmer_core::config::DimmerConfig;
use dimmer_core::controller::{DimmerController, TimerFacility, TimerId};
use dimmer_core::pulse::GateDrive;

pub const DEFAULT_LOG_PATH: &str = "evidence/emulator-session.log";

pub const HELP_LINES: &[&str] = &[
    "status            - show power, frequency, fault, and phase",
    "power <pct>       - set the commanded power level (0-100)",
    "alpha <0..1>      - set the low-pass smoothing factor",
    "latency <us>      - set the simulated detector latency",
    "jitter <us>       - set the peak mains period jitter",
    "enable / disable  - gate the output on or off",
    "run [n]           - simulate n mains cycles (default 1)",
    "glitch            - inject one spurious detector edge",
    "drop <n>          - swallow the next n detector edges",
    "events            - print and clear the telemetry log",
    "gate              - print recent gate transitions",
    "help              - show this text",
    "exit / quit       - close the session",
];

/// Microsecond instant on the simulated clock.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct SimInstant(u64);

impl SimInstant {
    fn micros(value: u64) -> Self {
        Self(value)
    }
}

impl Add<Duration> for SimInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        Self(self.0 + u64::try_from(rhs.as_micros()).unwrap_or(u64::MAX))
    }
}

impl Sub for SimInstant {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Self::Output {
        Duration::from_micros(self.0 - rhs.0)
    }
}

type SharedClock = Rc<Cell<u64>>;

const fn timer_slot(id: TimerId) -> usize {
    match id {
        TimerId::HalfCycle => 0,
        TimerId::FiringDelay => 1,
        TimerId::PulseStop => 2,
    }
}

const ALL_TIMERS: [TimerId; 3] = [TimerId::HalfCycle, TimerId::FiringDelay, TimerId::PulseStop];

/// One-shot timer bank driven by the simulated clock.
pub struct SimTimers {
    clock: SharedClock,
    deadlines: [Option<u64>; 3],
}

impl SimTimers {
    fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            deadlines: [None; 3],
        }
    }

    fn next_due(&self) -> Option<(TimerId, u64)> {
        let mut best: Option<(TimerId, u64)> = None;
        for id in ALL_TIMERS {
            if let Some(at) = self.deadlines[timer_slot(id)] {
                if best.is_none_or(|(_, t)| at < t) {
                    best = Some((id, at));
                }
            }
        }
        best
    }

    fn pop(&mut self, id: TimerId) {
        self.deadlines[timer_slot(id)] = None;
    }
}

impl TimerFacility for SimTimers {
    fn arm(&mut self, id: TimerId, delay: Duration) {
        let at = self.clock.get() + u64::try_from(delay.as_micros()).unwrap_or(u64::MAX);
        self.deadlines[timer_slot(id)] = Some(at);
    }

    fn cancel(&mut self, id: TimerId) {
        self.deadlines[timer_slot(id)] = None;
    }
}

/// Gate drive that records timestamped transitions instead of toggling a pin.
pub struct SimGate {
    clock: SharedClock,
    active: bool,
    bursts: usize,
    transitions: Vec<(u64, bool)>,
}

impl SimGate {
    fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            active: false,
            bursts: 0,
            transitions: Vec::new(),
        }
    }
}

impl GateDrive for SimGate {
    fn start_burst(&mut self) {
        if !self.active {
            self.bursts += 1;
            self.transitions.push((self.clock.get(), true));
        }
        self.active = true;
    }

    fn stop_burst(&mut self) {
        if self.active {
            self.transitions.push((self.clock.get(), false));
        }
        self.active = false;
    }
}

/// Simulated mains line seen through a rising-edge detector.
struct MainsSim {
    period_us: u64,
    jitter_us: u64,
    latency_us: u64,
    next_edge_us: u64,
    seed: u64,
}

impl MainsSim {
    fn new() -> Self {
        Self {
            period_us: 20_000,
            jitter_us: 0,
            latency_us: 0,
            next_edge_us: 20_000,
            seed: 0x5DEE_CE66_D151_1E25,
        }
    }

    /// Advances past the pending edge and schedules the next one.
    fn advance(&mut self) {
        let jitter = self.next_jitter();
        let nominal = i64::try_from(self.period_us).unwrap_or(i64::MAX);
        let step = (nominal + jitter).max(1);
        self.next_edge_us += u64::try_from(step).unwrap_or(1);
    }

    /// Deterministic jitter in `[-jitter_us, +jitter_us]`.
    fn next_jitter(&mut self) -> i64 {
        if self.jitter_us == 0 {
            return 0;
        }
        self.seed = self
            .seed
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        let span = 2 * self.jitter_us + 1;
        let offset = (self.seed >> 33) % span;
        i64::try_from(offset).unwrap_or(0) - i64::try_from(self.jitter_us).unwrap_or(0)
    }
}

enum SimEvent {
    Timer(TimerId, u64),
    Edge { at_isr: u64, glitch: bool },
}

/// Interactive simulation session wrapping one dimmer controller.
pub struct Session {
    clock: SharedClock,
    controller: DimmerController<SimInstant, SimTimers, SimGate>,
    mains: MainsSim,
    drop_pending: u32,
    glitch_at: Option<u64>,
    transcript: Option<BufWriter<fs::File>>,
}

impl Session {
    /// Creates a session, opening the transcript log when a path is given.
    pub fn new(log_path: Option<PathBuf>) -> io::Result<Self> {
        let clock: SharedClock = Rc::new(Cell::new(0));
        let timers = SimTimers::new(Rc::clone(&clock));
        let gate = SimGate::new(Rc::clone(&clock));
        let controller = DimmerController::new(&DimmerConfig::default(), timers, gate)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err.to_string()))?;

        let transcript = match log_path {
            Some(path) => Some(open_transcript(&path)?),
            None => None,
        };

        Ok(Self {
            clock,
            controller,
            mains: MainsSim::new(),
            drop_pending: 0,
            glitch_at: None,
            transcript,
        })
    }

    /// Executes one command line and returns the lines to print.
    pub fn handle_command(&mut self, input: &str) -> io::Result<Vec<String>> {
        let mut words = input.split_whitespace();
        let command = words.next().unwrap_or_default();
        let argument = words.next();

        let responses = match command {
            "help" => HELP_LINES.iter().map(|line| (*line).to_string()).collect(),
            "status" => vec![self.status_line()],
            "power" => match parse_f32(argument) {
                Some(value) => {
                    self.controller.set_power(value);
                    vec![format!(
                        "power set to {:.1}% (angle {:.1}deg)",
                        self.controller.current_power(),
                        self.controller.firing_angle_deg()
                    )]
                }
                None => vec!["usage: power <pct>".to_string()],
            },
            "alpha" => match parse_f32(argument) {
                Some(value) => {
                    self.controller.set_lpf_alpha(value);
                    vec![format!("low-pass alpha set to {value:.2}")]
                }
                None => vec!["usage: alpha <0..1>".to_string()],
            },
            "latency" => match parse_u64(argument) {
                Some(value) => {
                    self.mains.latency_us = value;
                    self.controller
                        .set_measurement_delay(Duration::from_micros(value));
                    vec![format!("detector latency set to {value} us")]
                }
                None => vec!["usage: latency <us>".to_string()],
            },
            "jitter" => match parse_u64(argument) {
                Some(value) => {
                    self.mains.jitter_us = value;
                    vec![format!("peak jitter set to {value} us")]
                }
                None => vec!["usage: jitter <us>".to_string()],
            },
            "enable" => {
                self.controller.enable_output();
                vec!["output enabled".to_string()]
            }
            "disable" => {
                self.controller.disable_output();
                vec!["output disabled, gate forced off".to_string()]
            }
            "run" => {
                let cycles = parse_u64(argument).unwrap_or(1).min(100_000);
                self.run_cycles(cycles)
            }
            "glitch" => {
                // A spurious detector pulse lands 3 ms after the next edge.
                self.glitch_at = Some(self.mains.next_edge_us + 3_000);
                vec!["spurious edge queued".to_string()]
            }
            "drop" => match parse_u64(argument) {
                Some(value) => {
                    self.drop_pending += u32::try_from(value.min(1_000)).unwrap_or(1_000);
                    vec![format!("next {value} detector edges will be swallowed")]
                }
                None => vec!["usage: drop <n>".to_string()],
            },
            "events" => {
                let lines: Vec<String> = self
                    .controller
                    .events()
                    .oldest_ordered()
                    .map(|event| format!("  {event}"))
                    .collect();
                self.controller.clear_events();
                if lines.is_empty() {
                    vec!["no events retained".to_string()]
                } else {
                    lines
                }
            }
            "gate" => {
                let transitions = &self.controller.gate().transitions;
                if transitions.is_empty() {
                    vec!["no gate transitions recorded".to_string()]
                } else {
                    transitions
                        .iter()
                        .rev()
                        .take(10)
                        .rev()
                        .map(|(at, high)| {
                            format!("  t={at:>10} us gate {}", if *high { "on" } else { "off" })
                        })
                        .collect()
                }
            }
            other => vec![format!("unknown command `{other}`; try `help`")],
        };

        self.log_exchange(input, &responses)?;
        Ok(responses)
    }

    fn status_line(&self) -> String {
        let status = self.controller.status();
        let mut line = format!("t={:>10} us  {status}", self.clock.get());
        if status.faulty {
            line.push(' ');
            line.push_str(&"[FAULT]".red().to_string());
        }
        line
    }

    /// Runs the event-driven simulation until `cycles` mains cycles elapse.
    fn run_cycles(&mut self, cycles: u64) -> Vec<String> {
        let bursts_before = self.controller.gate().bursts;
        let mut elapsed_cycles = 0;
        let mut dropped = 0;

        while elapsed_cycles < cycles {
            match self.next_event() {
                SimEvent::Timer(id, at) => {
                    self.clock.set(at);
                    self.controller.timers_mut().pop(id);
                    self.controller.on_timer(id);
                }
                SimEvent::Edge { at_isr, glitch } => {
                    if glitch {
                        self.glitch_at = None;
                        self.clock.set(at_isr);
                        self.controller.on_zero_cross_edge(SimInstant::micros(at_isr));
                    } else if self.drop_pending > 0 {
                        self.drop_pending -= 1;
                        dropped += 1;
                        elapsed_cycles += 1;
                        self.mains.advance();
                    } else {
                        self.clock.set(at_isr);
                        self.controller.on_zero_cross_edge(SimInstant::micros(at_isr));
                        elapsed_cycles += 1;
                        self.mains.advance();
                    }
                }
            }
        }

        let bursts = self.controller.gate().bursts - bursts_before;
        let mut lines = vec![format!(
            "ran {elapsed_cycles} mains cycles ({dropped} edges dropped, {bursts} gate bursts)"
        )];
        lines.push(self.status_line());
        lines
    }

    /// Picks the earliest pending event; timers win ties so a burst ends
    /// before the next edge is processed at the same microsecond.
    fn next_event(&self) -> SimEvent {
        let edge_time = match self.glitch_at {
            Some(at) if at < self.mains.next_edge_us => at,
            _ => self.mains.next_edge_us,
        };
        let glitch = self
            .glitch_at
            .is_some_and(|at| at < self.mains.next_edge_us);
        let at_isr = edge_time + self.mains.latency_us;

        match self.controller.timers().next_due() {
            Some((id, at)) if at <= at_isr => SimEvent::Timer(id, at),
            _ => SimEvent::Edge { at_isr, glitch },
        }
    }

    fn log_exchange(&mut self, input: &str, responses: &[String]) -> io::Result<()> {
        if let Some(writer) = self.transcript.as_mut() {
            writeln!(writer, "> {input}")?;
            for response in responses {
                writeln!(writer, "{response}")?;
            }
            writer.flush()?;
        }
        Ok(())
    }
}

fn open_transcript(path: &Path) -> io::Result<BufWriter<fs::File>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = BufWriter::new(file);
    writeln!(writer, "AC dimmer emulator transcript")?;
    Ok(writer)
}

fn parse_f32(argument: Option<&str>) -> Option<f32> {
    argument.and_then(|raw| raw.parse().ok())
}

fn parse_u64(argument: Option<&str>) -> Option<u64> {
    argument.and_then(|raw| raw.parse().ok())
}
