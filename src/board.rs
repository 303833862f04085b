//! STM32F103 "blue pill" wiring.
//!
//! - PA0, PA1: TIM2 25kHz PWM to fan 1 and fan 2
//! - PB8, PB9: tachometer inputs (EXTI9_5, rising edge)
//! - PA4: thermistor divider (ADC1)
//! - PB12: mode button to ground (EXTI15_10, falling edge)

use core::sync::atomic::{AtomicUsize, Ordering};

use stm32f1xx_hal::{
    gpio::{
        gpioa::{PA0, PA1},
        Alternate, PushPull,
    },
    pac,
    prelude::*,
    timer::{Channel, PwmHz, Tim2NoRemap, C1, C2},
};

use crate::consts::PWM_FREQ_HZ;

// global logger
use defmt_rtt as _;
use panic_probe as _;

// same panicking *behavior* as `panic-probe` but doesn't print a panic message
// this prevents the panic message being printed *twice* when `defmt::panic` is
// invoked
#[defmt::panic_handler]
fn panic() -> ! {
    cortex_m::asm::udf()
}

static COUNT: AtomicUsize = AtomicUsize::new(0);
defmt::timestamp!("{=usize}", {
    // NOTE(no-CAS) `timestamps` runs with interrupts disabled
    let n = COUNT.load(Ordering::Relaxed);
    COUNT.store(n + 1, Ordering::Relaxed);
    n
});

pub type FanPwm = PwmHz<
    pac::TIM2,
    Tim2NoRemap,
    (C1, C2),
    (PA0<Alternate<PushPull>>, PA1<Alternate<PushPull>>),
>;

/// Runs once, before the first fan enables its channel: fixes the period and
/// holds both outputs low until the control task writes a speed.
pub fn setup_fan_pwm(pwm: &mut FanPwm) {
    pwm.set_period(PWM_FREQ_HZ.Hz());
    for channel in [Channel::C1, Channel::C2] {
        pwm.set_duty(channel, 0);
    }
}
