use core::sync::atomic::{AtomicBool, Ordering};

use embedded_hal::Pwm;

use crate::consts::FULL_SPEED;

/// PWM output the fans are driven through.
pub trait DutyCycle {
    type Channel: Copy;

    /// Runs the timer's one-time setup if it has not run yet, returns whether
    /// it ran. Plain HAL timers are set up when they are built.
    fn ensure_configured(&mut self) -> bool {
        false
    }

    fn enable_channel(&mut self, channel: Self::Channel);

    /// Applies `percent` (0..=100) to `channel`.
    fn write_duty_cycle(&mut self, channel: Self::Channel, percent: u8);
}

impl<P> DutyCycle for P
where
    P: Pwm<Duty = u16>,
    P::Channel: Copy,
{
    type Channel = P::Channel;

    fn enable_channel(&mut self, channel: Self::Channel) {
        self.enable(channel);
    }

    fn write_duty_cycle(&mut self, channel: Self::Channel, percent: u8) {
        let duty = percent_to_duty(self.get_max_duty(), percent);
        self.set_duty(channel, duty);
    }
}

/// Scales a percentage to the timer's duty range, values above 100 are
/// treated as 100.
pub fn percent_to_duty(max_duty: u16, percent: u8) -> u16 {
    let percent = percent.min(FULL_SPEED);
    (u32::from(max_duty) * u32::from(percent) / u32::from(FULL_SPEED)) as u16
}

/// Guard for setup that must run exactly once across all users of a shared
/// resource.
#[derive(Debug, Default)]
pub struct ConfigureOnce {
    done: AtomicBool,
}

impl ConfigureOnce {
    pub const fn new() -> Self {
        Self {
            done: AtomicBool::new(false),
        }
    }

    /// Runs `setup` on the first call only. Returns whether it ran.
    pub fn ensure(&self, setup: impl FnOnce()) -> bool {
        if self
            .done
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            setup();
            true
        } else {
            false
        }
    }

    pub fn is_configured(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }
}

/// PWM timer shared by several fans, its `setup` runs when the first fan
/// built on it asks for it and never again.
pub struct SharedTimer<P> {
    pwm: P,
    setup: fn(&mut P),
    configured: ConfigureOnce,
}

impl<P> SharedTimer<P> {
    pub fn new(pwm: P, setup: fn(&mut P)) -> Self {
        Self {
            pwm,
            setup,
            configured: ConfigureOnce::new(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.configured.is_configured()
    }

    pub fn inner(&self) -> &P {
        &self.pwm
    }

    pub fn release(self) -> P {
        self.pwm
    }
}

impl<P: DutyCycle> DutyCycle for SharedTimer<P> {
    type Channel = P::Channel;

    fn ensure_configured(&mut self) -> bool {
        let setup = self.setup;
        let pwm = &mut self.pwm;
        self.configured.ensure(|| setup(pwm))
    }

    fn enable_channel(&mut self, channel: Self::Channel) {
        self.pwm.enable_channel(channel);
    }

    fn write_duty_cycle(&mut self, channel: Self::Channel, percent: u8) {
        self.pwm.write_duty_cycle(channel, percent);
    }
}
