//! Two fan controller on a STM32F103, see `board` for the pinout.
#![no_main]
#![no_std]

use pwm_fan_firmware::{
    consts::{SMOOTHING, TACHOMETER_MAX},
    Clock, FanDef, SmoothedTemperature, SpeedCurvePoint, TachoBank,
};
use stm32f1xx_hal::timer::Channel;

const NO_OF_FANS: usize = 2;

static TACHOS: TachoBank<TACHOMETER_MAX> = TachoBank::new();
static TEMPERATURE: SmoothedTemperature = SmoothedTemperature::new(SMOOTHING);

const CASE_CURVE: &[SpeedCurvePoint] = &[
    SpeedCurvePoint::new(25, 0),
    SpeedCurvePoint::new(30, 30),
    SpeedCurvePoint::new(40, 60),
    SpeedCurvePoint::new(50, 100),
];

const RADIATOR_CURVE: &[SpeedCurvePoint] = &[
    SpeedCurvePoint::new(20, 25),
    SpeedCurvePoint::new(35, 50),
    SpeedCurvePoint::new(45, 80),
    SpeedCurvePoint::new(55, 100),
];

const FANS: [FanDef<'static, Channel>; NO_OF_FANS] = [
    FanDef {
        curve: CASE_CURVE,
        channel: Channel::C1,
        tacho: Some(0),
    },
    FanDef {
        curve: RADIATOR_CURVE,
        channel: Channel::C2,
        tacho: Some(1),
    },
];

/// milliseconds since boot from the systick monotonic
pub struct Uptime;

impl Clock for Uptime {
    fn now_ms(&self) -> u32 {
        app::monotonics::now().ticks() as u32
    }
}

#[rtic::app(device = stm32f1xx_hal::pac, dispatchers = [USART1])]
mod app {
    use embedded_hal::adc::OneShot;
    use heapless::Vec;
    use pwm_fan_firmware::{
        board::{setup_fan_pwm, FanPwm},
        consts::{CONTROL_PERIOD_MS, PWM_FREQ_HZ, RPM_WINDOW_TICKS, SAMPLE_PERIOD_MS},
        sensor::adc_reading_to_temp,
        Fan, Mode, SharedTimer, SmoothedTemperature,
    };
    use stm32f1xx_hal::{
        adc::Adc,
        gpio::{
            gpioa::PA4,
            gpiob::{PB12, PB8, PB9},
            Analog, Edge, ExtiPin, Input, PullUp,
        },
        pac::ADC1,
        prelude::*,
        timer::Tim2NoRemap,
    };
    use systick_monotonic::{ExtU64, Systick};

    use super::{Channel, Uptime, FANS, NO_OF_FANS, TACHOS, TEMPERATURE};

    #[monotonic(binds = SysTick, default = true)]
    type MonoTimer = Systick<1000>;

    #[shared]
    struct Shared {
        mode: Mode,
    }

    #[local]
    struct Local {
        adc: Adc<ADC1>,
        thermistor_pin: PA4<Analog>,
        pwm: SharedTimer<FanPwm>,
        fans: Vec<Fan<'static, SmoothedTemperature, Channel>, NO_OF_FANS>,
        tacho_pins: (PB8<Input<PullUp>>, PB9<Input<PullUp>>),
        button: PB12<Input<PullUp>>,
        ticks: u8,
    }

    #[init]
    fn init(mut cx: init::Context) -> (Shared, Local, init::Monotonics) {
        let mut flash = cx.device.FLASH.constrain();
        let rcc = cx.device.RCC.constrain();
        let clocks = rcc
            .cfgr
            .use_hse(8.MHz())
            .sysclk(48.MHz())
            .pclk1(24.MHz())
            .adcclk(2.MHz())
            .freeze(&mut flash.acr);

        let mono = Systick::new(cx.core.SYST, clocks.sysclk().raw());

        let mut afio = cx.device.AFIO.constrain();
        let mut gpioa = cx.device.GPIOA.split();
        let mut gpiob = cx.device.GPIOB.split();

        let adc = Adc::adc1(cx.device.ADC1, clocks);
        let thermistor_pin = gpioa.pa4.into_analog(&mut gpioa.crl);

        let pwm_pins = (
            gpioa.pa0.into_alternate_push_pull(&mut gpioa.crl),
            gpioa.pa1.into_alternate_push_pull(&mut gpioa.crl),
        );
        let pwm = cx.device.TIM2.pwm_hz::<Tim2NoRemap, _, _>(
            pwm_pins,
            &mut afio.mapr,
            PWM_FREQ_HZ.Hz(),
            &clocks,
        );
        let mut pwm = SharedTimer::new(pwm, setup_fan_pwm);

        let mut tacho1 = gpiob.pb8.into_pull_up_input(&mut gpiob.crh);
        let mut tacho2 = gpiob.pb9.into_pull_up_input(&mut gpiob.crh);
        let mut button = gpiob.pb12.into_pull_up_input(&mut gpiob.crh);
        tacho1.make_interrupt_source(&mut afio);
        tacho1.trigger_on_edge(&mut cx.device.EXTI, Edge::Rising);
        tacho1.enable_interrupt(&mut cx.device.EXTI);
        tacho2.make_interrupt_source(&mut afio);
        tacho2.trigger_on_edge(&mut cx.device.EXTI, Edge::Rising);
        tacho2.enable_interrupt(&mut cx.device.EXTI);
        button.make_interrupt_source(&mut afio);
        button.trigger_on_edge(&mut cx.device.EXTI, Edge::Falling);
        button.enable_interrupt(&mut cx.device.EXTI);

        let uptime = Uptime;
        let mut fans = Vec::new();
        for (i, def) in FANS.iter().enumerate() {
            match Fan::new(def, &TEMPERATURE, &mut pwm, &TACHOS, &uptime) {
                Ok(fan) => {
                    fans.push(fan).ok();
                }
                Err(e) => defmt::error!("fan {} disabled: {}", i, e),
            }
        }
        defmt::info!("{} fans, {} tachometers", fans.len(), TACHOS.claimed());

        sample_temperature::spawn().ok();
        control::spawn().ok();

        (
            Shared {
                mode: Mode::default(),
            },
            Local {
                adc,
                thermistor_pin,
                pwm,
                fans,
                tacho_pins: (tacho1, tacho2),
                button,
                ticks: 0,
            },
            init::Monotonics(mono),
        )
    }

    #[task(local = [adc, thermistor_pin])]
    fn sample_temperature(cx: sample_temperature::Context) {
        let reading: Result<u16, _> = cx.local.adc.read(cx.local.thermistor_pin);
        match reading {
            Ok(reading) => TEMPERATURE.record(adc_reading_to_temp(reading)),
            Err(_) => defmt::warn!("adc read failed"),
        }
        sample_temperature::spawn_after(SAMPLE_PERIOD_MS.millis()).ok();
    }

    #[task(shared = [mode], local = [pwm, fans, ticks])]
    fn control(mut cx: control::Context) {
        let mode = cx.shared.mode.lock(|mode| *mode);
        let pwm = cx.local.pwm;
        let uptime = Uptime;

        *cx.local.ticks += 1;
        let end_of_window = *cx.local.ticks >= RPM_WINDOW_TICKS;
        if end_of_window {
            *cx.local.ticks = 0;
        }

        for fan in cx.local.fans.iter_mut() {
            let speed = fan.set_mode_speed(mode, pwm);
            let rpm = if end_of_window {
                fan.take_rpm(&uptime)
            } else {
                fan.rpm(&uptime)
            };
            match rpm {
                Some(rpm) => defmt::debug!("{}: {}% {} rpm", mode, speed, rpm),
                None => defmt::debug!("{}: {}%", mode, speed),
            }
        }
        control::spawn_after(CONTROL_PERIOD_MS.millis()).ok();
    }

    #[task(binds = EXTI9_5, local = [tacho_pins], priority = 3)]
    fn tacho_edge(cx: tacho_edge::Context) {
        // input numbers are the ones `FANS` binds to
        let (tacho1, tacho2) = cx.local.tacho_pins;
        if tacho1.check_interrupt() {
            TACHOS.pulse(0);
            tacho1.clear_interrupt_pending_bit();
        }
        if tacho2.check_interrupt() {
            TACHOS.pulse(1);
            tacho2.clear_interrupt_pending_bit();
        }
    }

    #[task(binds = EXTI15_10, shared = [mode], local = [button], priority = 2)]
    fn button_press(mut cx: button_press::Context) {
        cx.local.button.clear_interrupt_pending_bit();
        let mode = cx.shared.mode.lock(|mode| {
            *mode = mode.next();
            *mode
        });
        defmt::info!("mode {}", mode.name());
    }
}
