use crate::{
    consts::FULL_SPEED,
    curve::{FanBounds, SpeedCurve, SpeedCurvePoint},
    mode::Mode,
    pwm::DutyCycle,
    sensor::Sensor,
    tacho::{Clock, TachoBank, TachoReader},
    Error, Result,
};

/// Static description of one fan.
#[derive(Debug, Copy, Clone)]
pub struct FanDef<'c, Ch> {
    pub curve: &'c [SpeedCurvePoint],
    /// PWM channel driving the fan
    pub channel: Ch,
    /// tachometer input the fan's sense wire is connected to, if any
    pub tacho: Option<usize>,
}

/// One fan: its validated curve, PWM channel and optional tachometer.
pub struct Fan<'a, S, Ch> {
    curve: SpeedCurve,
    bounds: FanBounds,
    sensor: &'a S,
    channel: Ch,
    tacho: Option<TachoReader<'a>>,
    speed: u8,
}

impl<'a, S, Ch> Fan<'a, S, Ch>
where
    S: Sensor,
    Ch: Copy,
{
    /// Validates the curve, prepares the PWM channel and claims the counter of
    /// the fan's tachometer input if it has one.
    ///
    /// Fails when the curve is invalid or has no speed usable for `Low` and
    /// `High`. A tachometer input that is out of range or already taken is not
    /// an error, the fan is built without RPM readings and a warning is logged.
    pub fn new<P, const N: usize>(
        def: &FanDef<'_, Ch>,
        sensor: &'a S,
        pwm: &mut P,
        tachos: &'a TachoBank<N>,
        clock: &impl Clock,
    ) -> Result<Self>
    where
        P: DutyCycle<Channel = Ch>,
    {
        let curve = SpeedCurve::new(def.curve)?;
        let bounds = curve.bounds().ok_or(Error::DegenerateCurve)?;
        debug!("fan bounds {}..{}", bounds.min_speed, bounds.max_speed);

        if pwm.ensure_configured() {
            info!("pwm timer configured");
        }
        pwm.enable_channel(def.channel);

        let tacho = def.tacho.and_then(|input| match tachos.register(input) {
            Some(handle) => {
                debug!("tacho input {}", handle.index);
                Some(TachoReader::new(handle.cell, clock))
            }
            None => {
                warn!("tacho input {} unavailable, fan runs without rpm", input);
                None
            }
        });

        Ok(Self {
            curve,
            bounds,
            sensor,
            channel: def.channel,
            tacho,
            speed: 0,
        })
    }

    pub fn curve(&self) -> &SpeedCurve {
        &self.curve
    }

    pub fn bounds(&self) -> FanBounds {
        self.bounds
    }

    pub fn channel(&self) -> Ch {
        self.channel
    }

    /// Last speed written, in percent.
    pub fn speed(&self) -> u8 {
        self.speed
    }

    pub fn has_tacho(&self) -> bool {
        self.tacho.is_some()
    }

    /// Speed `mode` asks for right now.
    pub fn mode_speed(&self, mode: Mode) -> u8 {
        match mode {
            Mode::Auto => self.curve.interpolate(self.sensor.smoothed_temp()),
            Mode::Low => self.bounds.min_speed,
            Mode::High => self.bounds.max_speed,
            Mode::Full => FULL_SPEED,
        }
    }

    /// Evaluates `mode` and writes the result to the fan's channel.
    pub fn set_mode_speed<P>(&mut self, mode: Mode, pwm: &mut P) -> u8
    where
        P: DutyCycle<Channel = Ch>,
    {
        let speed = self.mode_speed(mode);
        trace!("{} -> {}%", mode.name(), speed);
        self.set_speed(speed, pwm);
        speed
    }

    /// Writes `speed` unchanged, curve validation keeps it within 0..=100.
    pub fn set_speed<P>(&mut self, speed: u8, pwm: &mut P)
    where
        P: DutyCycle<Channel = Ch>,
    {
        self.speed = speed;
        pwm.write_duty_cycle(self.channel, speed);
    }

    /// Average RPM since the last reset, `None` without a tachometer.
    pub fn rpm(&self, clock: &impl Clock) -> Option<u16> {
        self.tacho.as_ref().map(|t| t.rpm(clock))
    }

    pub fn reset_tacho(&mut self, clock: &impl Clock) {
        if let Some(tacho) = self.tacho.as_mut() {
            tacho.reset(clock);
        }
    }

    /// Reads the RPM and restarts the measurement window.
    pub fn take_rpm(&mut self, clock: &impl Clock) -> Option<u16> {
        self.tacho.as_mut().map(|t| t.take_rpm(clock))
    }
}

#[cfg(test)]
mod tests {
    use core::cell::Cell;

    use super::*;
    use crate::{
        pwm::{
            tests::{set_40us_period, RecordingPwm},
            SharedTimer,
        },
        sensor::SmoothedTemperature,
    };

    const CURVE: &[SpeedCurvePoint] = &[
        SpeedCurvePoint::new(0, 20),
        SpeedCurvePoint::new(50, 60),
        SpeedCurvePoint::new(100, 100),
    ];

    struct FakeClock(Cell<u32>);

    impl Clock for FakeClock {
        fn now_ms(&self) -> u32 {
            self.0.get()
        }
    }

    fn def(channel: usize, tacho: Option<usize>) -> FanDef<'static, usize> {
        FanDef {
            curve: CURVE,
            channel,
            tacho,
        }
    }

    #[test]
    fn each_mode_writes_once() {
        let temp = SmoothedTemperature::new(1.0);
        temp.record(25.0);
        let tachos: TachoBank<2> = TachoBank::new();
        let clock = FakeClock(Cell::new(0));
        let mut pwm = RecordingPwm::default();
        let mut fan = Fan::new(&def(1, None), &temp, &mut pwm, &tachos, &clock).unwrap();

        for (mode, expected) in [
            (Mode::Auto, 40),
            (Mode::Low, 20),
            (Mode::High, 60),
            (Mode::Full, 100),
        ] {
            pwm.writes.clear();
            assert_eq!(fan.set_mode_speed(mode, &mut pwm), expected);
            assert_eq!(
                pwm.writes,
                [(1, crate::pwm::percent_to_duty(320, expected))]
            );
            assert_eq!(fan.speed(), expected);
        }
    }

    #[test]
    fn auto_follows_sensor() {
        let temp = SmoothedTemperature::new(1.0);
        let tachos: TachoBank<1> = TachoBank::new();
        let clock = FakeClock(Cell::new(0));
        let mut pwm = RecordingPwm::default();
        let fan = Fan::new(&def(0, None), &temp, &mut pwm, &tachos, &clock).unwrap();

        temp.record(-5.0);
        assert_eq!(fan.mode_speed(Mode::Auto), 20);
        temp.record(75.0);
        assert_eq!(fan.mode_speed(Mode::Auto), 80);
        temp.record(120.0);
        assert_eq!(fan.mode_speed(Mode::Auto), 100);
    }

    #[test]
    fn enables_its_channel() {
        let temp = SmoothedTemperature::new(1.0);
        let tachos: TachoBank<1> = TachoBank::new();
        let clock = FakeClock(Cell::new(0));
        let mut pwm = RecordingPwm::default();
        let fan = Fan::new(&def(3, None), &temp, &mut pwm, &tachos, &clock).unwrap();

        assert!(pwm.enabled[3]);
        assert!(!pwm.enabled[0]);
        assert_eq!(fan.channel(), 3);
        assert!(pwm.periods.is_empty());
    }

    #[test]
    fn each_timer_is_set_up_once() {
        let temp = SmoothedTemperature::new(1.0);
        let tachos: TachoBank<1> = TachoBank::new();
        let clock = FakeClock(Cell::new(0));
        let mut timer_a = SharedTimer::new(RecordingPwm::default(), set_40us_period);
        let mut timer_b = SharedTimer::new(RecordingPwm::default(), set_40us_period);

        for channel in [0, 1] {
            Fan::new(&def(channel, None), &temp, &mut timer_a, &tachos, &clock).unwrap();
        }
        Fan::new(&def(2, None), &temp, &mut timer_b, &tachos, &clock).unwrap();

        assert!(timer_a.is_configured());
        assert!(timer_b.is_configured());
        let (a, b) = (timer_a.release(), timer_b.release());
        assert_eq!(a.periods, [40]);
        assert_eq!(b.periods, [40]);
        assert_eq!(a.enabled, [true, true, false, false]);
        assert_eq!(b.enabled, [false, false, true, false]);
    }

    #[test]
    fn rejects_curve_without_bounds() {
        let temp = SmoothedTemperature::new(1.0);
        let tachos: TachoBank<1> = TachoBank::new();
        let clock = FakeClock(Cell::new(0));
        let mut pwm = RecordingPwm::default();
        let def = FanDef {
            curve: &[SpeedCurvePoint::new(0, 0), SpeedCurvePoint::new(40, 100)],
            channel: 0,
            tacho: None,
        };

        let err = Fan::new(&def, &temp, &mut pwm, &tachos, &clock).err();
        assert_eq!(err, Some(Error::DegenerateCurve));
    }

    #[test]
    fn rejects_invalid_curve() {
        let temp = SmoothedTemperature::new(1.0);
        let tachos: TachoBank<1> = TachoBank::new();
        let clock = FakeClock(Cell::new(0));
        let mut pwm = RecordingPwm::default();
        let def = FanDef {
            curve: &[SpeedCurvePoint::new(40, 30), SpeedCurvePoint::new(20, 60)],
            channel: 0,
            tacho: Some(0),
        };

        let err = Fan::new(&def, &temp, &mut pwm, &tachos, &clock).err();
        assert_eq!(err, Some(Error::UnsortedCurve { index: 1 }));
        // nothing claimed for a fan that was never built
        assert_eq!(tachos.claimed(), 0);
    }

    #[test]
    fn rpm_from_claimed_counter() {
        let temp = SmoothedTemperature::new(1.0);
        let tachos: TachoBank<1> = TachoBank::new();
        let clock = FakeClock(Cell::new(10_000));
        let mut pwm = RecordingPwm::default();
        let mut fan = Fan::new(&def(0, Some(0)), &temp, &mut pwm, &tachos, &clock).unwrap();

        for _ in 0..20 {
            tachos.pulse(0);
        }
        clock.0.set(11_000);
        assert_eq!(fan.rpm(&clock), Some(600));

        fan.reset_tacho(&clock);
        assert_eq!(fan.rpm(&clock), Some(0));

        for _ in 0..30 {
            tachos.pulse(0);
        }
        clock.0.set(12_000);
        assert_eq!(fan.take_rpm(&clock), Some(900));
        assert_eq!(fan.rpm(&clock), Some(0));
    }

    #[test]
    fn fan_without_tacho_has_no_rpm() {
        let temp = SmoothedTemperature::new(1.0);
        let tachos: TachoBank<1> = TachoBank::new();
        let clock = FakeClock(Cell::new(0));
        let mut pwm = RecordingPwm::default();
        let mut fan = Fan::new(&def(0, None), &temp, &mut pwm, &tachos, &clock).unwrap();

        assert!(!fan.has_tacho());
        assert_eq!(fan.rpm(&clock), None);
        fan.reset_tacho(&clock);
        assert_eq!(fan.take_rpm(&clock), None);
        assert_eq!(tachos.claimed(), 0);
    }

    #[test]
    fn tacho_bound_to_its_input() {
        let temp = SmoothedTemperature::new(1.0);
        let tachos: TachoBank<2> = TachoBank::new();
        let clock = FakeClock(Cell::new(0));
        let mut pwm = RecordingPwm::default();

        let a = Fan::new(&def(0, None), &temp, &mut pwm, &tachos, &clock).unwrap();
        let b = Fan::new(&def(1, Some(1)), &temp, &mut pwm, &tachos, &clock).unwrap();

        for _ in 0..20 {
            tachos.pulse(1);
        }
        clock.0.set(1000);
        assert_eq!(a.rpm(&clock), None);
        assert_eq!(b.rpm(&clock), Some(600));
    }

    #[test]
    fn taken_tacho_input_keeps_existing_counter() {
        let temp = SmoothedTemperature::new(1.0);
        let tachos: TachoBank<2> = TachoBank::new();
        let clock = FakeClock(Cell::new(0));
        let mut pwm = RecordingPwm::default();

        let first = Fan::new(&def(0, Some(0)), &temp, &mut pwm, &tachos, &clock).unwrap();
        for _ in 0..8 {
            tachos.pulse(0);
        }

        let second = Fan::new(&def(1, Some(0)), &temp, &mut pwm, &tachos, &clock).unwrap();
        let third = Fan::new(&def(2, Some(2)), &temp, &mut pwm, &tachos, &clock).unwrap();
        assert!(!second.has_tacho());
        assert!(!third.has_tacho());
        assert_eq!(second.rpm(&clock), None);
        assert_eq!(tachos.rejected(), 2);

        // the refused registration didn't reset the first counter
        clock.0.set(1000);
        assert_eq!(first.rpm(&clock), Some(240));
    }
}
