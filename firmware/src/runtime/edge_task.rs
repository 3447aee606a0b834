use embassy_stm32::exti::ExtiInput;
use embassy_sync::signal::Signal;
use embassy_time::Instant;

use dimmer_core::edge::EdgeLatch;

use crate::dimmer::DimmerMutex;

/// Mirrors each detector rising edge into the latch and wakes the dimmer.
///
/// This task is the latch's single producer; the dimmer task is the single
/// consumer. The timestamp is taken as close to the EXTI wake-up as the
/// executor allows, and the residual detector-to-task latency is covered by
/// the configured measurement delay.
#[embassy_executor::task]
pub async fn run(
    mut input: ExtiInput<'static>,
    latch: &'static EdgeLatch,
    edges: &'static Signal<DimmerMutex, ()>,
) -> ! {
    loop {
        input.wait_for_rising_edge().await;
        latch.record(Instant::now().as_micros());
        edges.signal(());
    }
}
