/// PWM frequency in Hz, 25kHz matches the intel 4-wire fan spec
pub const PWM_FREQ_HZ: u32 = 25_000;
/// standard 3/4-wire fans emit two tacho pulses per revolution
pub const PULSES_PER_REVOLUTION: u32 = 2;
/// number of tachometer inputs the board can count at once
pub const TACHOMETER_MAX: usize = 2;
/// upper bound on the number of points in a speed curve
pub const MAX_CURVE_POINTS: usize = 8;
pub const FULL_SPEED: u8 = 100;

/// 10k resistor measured resistance in Ohms
pub const R_10K: f32 = 10000.0;
/// voltage
pub const V_SUPPLY: f32 = 3.3;
/// B-coefficient of the thermistor (guessed)
pub const B_PARAM: f32 = 3700.0; //3200.0;
/// 0*C in kelvin
pub const ZERO_K_IN_C: f32 = 273.15;
// Analog to digital resolution
pub const ADC_RESOLUTION: f32 = 4096.0;
/// weight of a new sample in the exponential moving average
pub const SMOOTHING: f32 = 0.1;

pub const SAMPLE_PERIOD_MS: u64 = 250;
pub const CONTROL_PERIOD_MS: u64 = 1000;
/// tacho window is restarted after this many control ticks
pub const RPM_WINDOW_TICKS: u8 = 4;
