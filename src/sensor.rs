use core::sync::atomic::{AtomicU32, Ordering};

#[allow(unused_imports)]
use micromath::F32Ext;

use crate::consts::{ADC_RESOLUTION, B_PARAM, R_10K, V_SUPPLY, ZERO_K_IN_C};

/// Temperature source for fans in `Auto` mode.
pub trait Sensor {
    /// Smoothed temperature in degrees Celsius. NaN until the first sample.
    fn smoothed_temp(&self) -> f32;
}

impl<S: Sensor + ?Sized> Sensor for &S {
    fn smoothed_temp(&self) -> f32 {
        (**self).smoothed_temp()
    }
}

// quiet NaN, `f32::to_bits` isn't usable in a const initializer yet
const NO_SAMPLE: u32 = 0x7fc0_0000;

/// Exponential moving average of temperature samples.
///
/// One task records samples, any number of fans read the value through a
/// shared reference.
#[derive(Debug)]
pub struct SmoothedTemperature {
    bits: AtomicU32,
    smoothing: f32,
}

impl SmoothedTemperature {
    /// `smoothing` is the weight of each new sample, in `(0, 1]`.
    pub const fn new(smoothing: f32) -> Self {
        Self {
            bits: AtomicU32::new(NO_SAMPLE),
            smoothing,
        }
    }

    pub fn record(&self, celsius: f32) {
        let previous = f32::from_bits(self.bits.load(Ordering::Relaxed));
        let next = if previous.is_nan() {
            celsius
        } else {
            previous + self.smoothing * (celsius - previous)
        };
        trace!("temp sample {}, smoothed {}", celsius, next);
        self.bits.store(next.to_bits(), Ordering::Relaxed);
    }
}

impl Sensor for SmoothedTemperature {
    fn smoothed_temp(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

/// NTC thermistor on the low side of a divider with a 10k resistor.
pub fn adc_reading_to_temp(adc_reading: u16) -> f32 {
    let v_out: f32 = adc_reading as f32 * V_SUPPLY / ADC_RESOLUTION;
    trace!("v_out {}", v_out);
    trace!("adc_reading: {}", adc_reading);

    let r_ntc = (v_out * R_10K) / (V_SUPPLY - v_out);
    trace!("rt {}", r_ntc);

    let t_25_c_in_k = ZERO_K_IN_C + 25.0;

    let temp_k = (t_25_c_in_k * B_PARAM)
        / (t_25_c_in_k * (r_ntc / R_10K).ln() + B_PARAM);

    trace!("k {}", temp_k);
    temp_k - ZERO_K_IN_C
}
