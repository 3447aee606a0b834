//! STM32 peripheral bindings for the dimmer core.
//!
//! Pin plan: the zero-cross detector output lands on PA0 (EXTI0) and the
//! TRIAC gate driver input on PA6 (TIM3 channel 1). The PWM timer runs at
//! the gate burst carrier continuously; firing only switches the duty
//! between zero and the configured burst duty, so the output pin carries a
//! pulse train rather than a level while a burst is active.

#![cfg(target_os = "none")]

use dimmer_core::pulse::{GateDrive, PULSE_TRAIN_DUTY_PERCENT};
use embassy_stm32::peripherals::TIM3;
use embassy_stm32::timer::simple_pwm::SimplePwmChannel;

/// PWM burst driver on the TRIAC gate pin.
pub struct PwmGateDrive {
    channel: SimplePwmChannel<'static, TIM3>,
}

impl PwmGateDrive {
    /// Takes over the PWM channel with the output forced off.
    #[must_use]
    pub fn new(mut channel: SimplePwmChannel<'static, TIM3>) -> Self {
        channel.set_duty_cycle_fully_off();
        channel.enable();
        Self { channel }
    }
}

impl GateDrive for PwmGateDrive {
    fn start_burst(&mut self) {
        self.channel.set_duty_cycle_percent(PULSE_TRAIN_DUTY_PERCENT);
    }

    fn stop_burst(&mut self) {
        self.channel.set_duty_cycle_fully_off();
    }
}
