use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::exti::ExtiInput;
use embassy_stm32::gpio::{OutputType, Pull};
use embassy_stm32::time::hz;
use embassy_stm32::timer::simple_pwm::{PwmPin, SimplePwm};
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use embassy_time::Instant;

use dimmer_core::config::DimmerConfig;
use dimmer_core::controller::{DimmerController, TimerFacility, TimerId};
use dimmer_core::edge::EdgeLatch;
use dimmer_core::pulse::PULSE_TRAIN_FREQ_HZ;

use crate::dimmer::{self, DimmerMutex, FirmwareInstant, PowerQueue};
use crate::hw::PwmGateDrive;

mod dimmer_task;
mod edge_task;
mod power_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

/// Fixed latency of the zero-cross detector path, microseconds.
const DETECTOR_LATENCY_US: u64 = 3_000;

pub(super) static EDGE_LATCH: EdgeLatch = EdgeLatch::new();
pub(super) static EDGE_SIGNAL: Signal<DimmerMutex, ()> = Signal::new();
pub(super) static POWER_QUEUE: PowerQueue = Channel::new();

const fn timer_slot(id: TimerId) -> usize {
    match id {
        TimerId::HalfCycle => 0,
        TimerId::FiringDelay => 1,
        TimerId::PulseStop => 2,
    }
}

const ALL_TIMERS: [TimerId; 3] = [TimerId::HalfCycle, TimerId::FiringDelay, TimerId::PulseStop];

/// Three one-shot deadlines multiplexed onto the embassy time driver.
pub struct DeadlineBank {
    slots: [Option<Instant>; 3],
}

impl DeadlineBank {
    const fn new() -> Self {
        Self { slots: [None; 3] }
    }

    /// Earliest armed deadline, if any.
    pub(crate) fn next_due(&self) -> Option<(TimerId, Instant)> {
        let mut best: Option<(TimerId, Instant)> = None;
        for id in ALL_TIMERS {
            if let Some(at) = self.slots[timer_slot(id)] {
                if best.is_none_or(|(_, t)| at < t) {
                    best = Some((id, at));
                }
            }
        }
        best
    }

    /// Clears a deadline that is about to be delivered.
    pub(crate) fn take(&mut self, id: TimerId) {
        self.slots[timer_slot(id)] = None;
    }
}

impl TimerFacility for DeadlineBank {
    fn arm(&mut self, id: TimerId, delay: core::time::Duration) {
        let deadline = Instant::now() + dimmer::core_duration_to_embassy(delay);
        self.slots[timer_slot(id)] = Some(deadline);
    }

    fn cancel(&mut self, id: TimerId) {
        self.slots[timer_slot(id)] = None;
    }
}

type FirmwareController = DimmerController<FirmwareInstant, DeadlineBank, PwmGateDrive>;

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let p = hal::init(hal::Config::default());

    let zero_cross = ExtiInput::new(p.PA0, p.EXTI0, Pull::Down);

    let gate_pin = PwmPin::new_ch1(p.PA6, OutputType::PushPull);
    let pwm = SimplePwm::new(
        p.TIM3,
        Some(gate_pin),
        None,
        None,
        None,
        hz(PULSE_TRAIN_FREQ_HZ),
        Default::default(),
    );
    let gate = PwmGateDrive::new(pwm.split().ch1);

    let config = DimmerConfig {
        measurement_delay: core::time::Duration::from_micros(DETECTOR_LATENCY_US),
        ..DimmerConfig::default()
    };
    let mut controller = DimmerController::new(&config, DeadlineBank::new(), gate)
        .expect("dimmer configuration must be valid");
    controller.enable_output();

    spawner
        .spawn(edge_task::run(zero_cross, &EDGE_LATCH, &EDGE_SIGNAL))
        .expect("failed to spawn zero-cross task");
    spawner
        .spawn(dimmer_task::run(
            controller,
            &EDGE_LATCH,
            &EDGE_SIGNAL,
            POWER_QUEUE.receiver(),
        ))
        .expect("failed to spawn dimmer task");
    spawner
        .spawn(power_task::run(POWER_QUEUE.sender()))
        .expect("failed to spawn power ramp task");

    core::future::pending::<()>().await;
}
