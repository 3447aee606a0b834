use embassy_time::{Duration, Timer};

use crate::dimmer::{PowerCommand, PowerSender};

/// Pace of the demo setpoint walk.
const RAMP_INTERVAL: Duration = Duration::from_millis(50);

/// Upper end of the demo setpoint walk, percent.
const RAMP_CEILING: f32 = 50.0;

/// Setpoint change per step, percent.
const RAMP_STEP: f32 = 1.0;

/// Stand-in for the outer voltage-regulation loop.
///
/// Walks the power setpoint up to [`RAMP_CEILING`] and back down so a scope
/// on the gate pin shows the whole firing-angle range without a real
/// feedback loop attached.
#[embassy_executor::task]
pub async fn run(commands: PowerSender<'static>) -> ! {
    let mut percent = 0.0_f32;
    let mut step = RAMP_STEP;

    loop {
        commands.send(PowerCommand::SetPower(percent)).await;

        percent += step;
        if percent >= RAMP_CEILING {
            percent = RAMP_CEILING;
            step = -RAMP_STEP;
        } else if percent <= 0.0 {
            percent = 0.0;
            step = RAMP_STEP;
        }

        Timer::after(RAMP_INTERVAL).await;
    }
}
