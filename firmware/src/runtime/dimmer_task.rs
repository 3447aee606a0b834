use defmt::info;
use embassy_futures::select::{Either4, select4};
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Instant, Ticker, Timer};

use dimmer_core::edge::EdgeLatch;

use super::FirmwareController;
use crate::dimmer::{DimmerMutex, FirmwareInstant, PowerCommand, PowerReceiver};

/// Interval between status lines on the defmt log.
const STATUS_INTERVAL: Duration = Duration::from_millis(100);

/// Drives the dimmer controller from edges, deadlines, and power commands.
///
/// The one-shot timers armed by the controller live in its [`DeadlineBank`]
/// (see [`super::DeadlineBank`]); this task sleeps on the earliest armed
/// deadline and re-evaluates whenever an edge or command arrives first.
#[embassy_executor::task]
pub async fn run(
    mut controller: FirmwareController,
    latch: &'static EdgeLatch,
    edges: &'static Signal<DimmerMutex, ()>,
    commands: PowerReceiver<'static>,
) -> ! {
    let mut status_tick = Ticker::every(STATUS_INTERVAL);

    loop {
        let deadline = controller.timers().next_due();
        let timer = match deadline {
            Some((_, at)) => Timer::at(at),
            None => Timer::at(Instant::MAX),
        };

        match select4(edges.wait(), timer, commands.receive(), status_tick.next()).await {
            Either4::First(()) => {
                if let Some(stamp_us) = latch.take() {
                    let now = FirmwareInstant::new(Instant::from_micros(stamp_us));
                    controller.on_zero_cross_edge(now);
                }
            }
            Either4::Second(()) => {
                if let Some((id, _)) = deadline {
                    controller.timers_mut().take(id);
                    controller.on_timer(id);
                }
            }
            Either4::Third(command) => match command {
                PowerCommand::SetPower(percent) => controller.set_power(percent),
                PowerCommand::Enable => controller.enable_output(),
                PowerCommand::Disable => controller.disable_output(),
            },
            Either4::Fourth(()) => info!("dimmer {}", controller.status()),
        }
    }
}
