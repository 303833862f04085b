//! Tachometer pulse counting.
//!
//! Every tachometer input owns one [`TachoCell`] in a [`TachoBank`]. The edge
//! interrupt only ever increments its cell, the control loop reads it through
//! a [`TachoReader`] which turns pulses per window into RPM.

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use crate::consts::PULSES_PER_REVOLUTION;

/// Source of monotonic milliseconds, allowed to wrap.
pub trait Clock {
    fn now_ms(&self) -> u32;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ms(&self) -> u32 {
        (**self).now_ms()
    }
}

/// Increment side of a pulse counter, called from interrupt context.
pub trait PulseSink {
    fn pulse(&self);
}

/// Read side of a pulse counter.
pub trait PulseCounter {
    fn count(&self) -> u32;
    /// Returns the current count and starts again from zero.
    fn reset(&self) -> u32;
}

/// One pulse counter. Wraps on overflow.
#[derive(Debug, Default)]
pub struct TachoCell {
    pulses: AtomicU32,
}

impl TachoCell {
    pub const fn new() -> Self {
        Self {
            pulses: AtomicU32::new(0),
        }
    }
}

impl PulseSink for TachoCell {
    #[inline(always)]
    fn pulse(&self) {
        self.pulses.fetch_add(1, Ordering::Relaxed);
    }
}

impl PulseCounter for TachoCell {
    #[inline(always)]
    fn count(&self) -> u32 {
        self.pulses.load(Ordering::Relaxed)
    }

    #[inline(always)]
    fn reset(&self) -> u32 {
        self.pulses.swap(0, Ordering::Relaxed)
    }
}

/// Fixed set of `N` pulse counters, one per physical tachometer input.
#[derive(Debug)]
pub struct TachoBank<const N: usize> {
    cells: [TachoCell; N],
    claimed: [AtomicBool; N],
    rejected: AtomicUsize,
}

/// A claimed counter together with its input index in the bank.
#[derive(Debug, Copy, Clone)]
pub struct TachoHandle<'a> {
    pub index: usize,
    pub cell: &'a TachoCell,
}

impl<const N: usize> TachoBank<N> {
    pub const fn new() -> Self {
        Self {
            cells: [const { TachoCell::new() }; N],
            claimed: [const { AtomicBool::new(false) }; N],
            rejected: AtomicUsize::new(0),
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Number of inputs bound to a counter.
    pub fn claimed(&self) -> usize {
        self.claimed
            .iter()
            .filter(|c| c.load(Ordering::Relaxed))
            .count()
    }

    /// Registrations refused because the input was out of range or taken.
    pub fn rejected(&self) -> usize {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Binds the counter of tachometer input `index`.
    ///
    /// `None` with a warning when `index` is beyond the bank or the input is
    /// already bound, existing counters are left untouched.
    pub fn register(&self, index: usize) -> Option<TachoHandle<'_>> {
        let Some(claimed) = self.claimed.get(index) else {
            warn!(
                "tachometer input {} out of range, only {} supported",
                index, N
            );
            self.rejected.fetch_add(1, Ordering::Relaxed);
            return None;
        };
        if claimed.swap(true, Ordering::AcqRel) {
            warn!("tachometer input {} is already in use", index);
            self.rejected.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        let cell = &self.cells[index];
        cell.reset();
        Some(TachoHandle { index, cell })
    }

    /// Edge handler entry point. Pulses on unbound inputs are dropped.
    #[inline(always)]
    pub fn pulse(&self, index: usize) {
        if let Some(claimed) = self.claimed.get(index) {
            if claimed.load(Ordering::Relaxed) {
                self.cells[index].pulse();
            }
        }
    }
}

impl<const N: usize> Default for TachoBank<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// RPM from `pulses` counted over `elapsed_ms`.
///
/// Only whole revolutions count, a zero length window reads 0 and results
/// beyond `u16::MAX` saturate.
pub fn pulses_to_rpm(pulses: u32, elapsed_ms: u32) -> u16 {
    if elapsed_ms == 0 {
        return 0;
    }
    let revolutions = pulses / PULSES_PER_REVOLUTION;
    let elapsed_s = elapsed_ms as f32 / 1000.0;

    (revolutions as f32 * (60.0 / elapsed_s)) as u16
}

/// Measurement window over one pulse counter.
///
/// [`rpm`](Self::rpm) averages over everything since the last reset, callers
/// restart the window with [`reset`](Self::reset) or read and restart in one
/// go with [`take_rpm`](Self::take_rpm).
#[derive(Debug)]
pub struct TachoReader<'a, C: PulseCounter = TachoCell> {
    counter: &'a C,
    window_start: u32,
}

impl<'a, C: PulseCounter> TachoReader<'a, C> {
    pub fn new(counter: &'a C, clock: &impl Clock) -> Self {
        let mut reader = Self {
            counter,
            window_start: 0,
        };
        reader.reset(clock);
        reader
    }

    pub fn pulses(&self) -> u32 {
        self.counter.count()
    }

    pub fn rpm(&self, clock: &impl Clock) -> u16 {
        let elapsed = clock.now_ms().wrapping_sub(self.window_start);
        pulses_to_rpm(self.counter.count(), elapsed)
    }

    pub fn reset(&mut self, clock: &impl Clock) {
        self.counter.reset();
        self.window_start = clock.now_ms();
    }

    pub fn take_rpm(&mut self, clock: &impl Clock) -> u16 {
        let now = clock.now_ms();
        let pulses = self.counter.reset();
        let rpm = pulses_to_rpm(pulses, now.wrapping_sub(self.window_start));
        self.window_start = now;
        rpm
    }
}
