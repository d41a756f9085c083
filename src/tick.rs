//! Millisecond time base for blocking operations
//!
//! Blocking suspend, abort and polling bound their busy-waits with a
//! [`Tick`]. Most systems already run a millisecond counter. Implement
//! `Tick` on it, or use [`SysTickClock`] to drive one from SysTick.

use core::cell::Cell;

use cortex_m::interrupt::{self, Mutex};
use cortex_m::peripheral::{scb::SystemHandler, syst::SystClkSource, SCB, SYST};

/// A free-running millisecond counter
///
/// `now` may wrap. Callers only ever compare two readings with a
/// wrapping subtraction.
pub trait Tick {
    /// Returns the current time, in milliseconds
    fn now(&self) -> u32;
    /// Stop the counter from advancing
    fn suspend(&mut self) {}
    /// Undo [`suspend`](Tick::suspend)
    fn resume(&mut self) {}
}

impl<T: Tick + ?Sized> Tick for &mut T {
    fn now(&self) -> u32 {
        (**self).now()
    }
    fn suspend(&mut self) {
        (**self).suspend()
    }
    fn resume(&mut self) {
        (**self).resume()
    }
}

/// A millisecond count shared with an interrupt handler
///
/// Place this in a `static`, and call [`increment`](Ticks::increment) from
/// the `SysTick` exception.
///
/// ```no_run
/// use stm32u5_dma::tick::Ticks;
///
/// static TICKS: Ticks = Ticks::new();
///
/// // #[exception]
/// fn SysTick() {
///     TICKS.increment();
/// }
/// ```
pub struct Ticks {
    count: Mutex<Cell<u32>>,
}

impl Ticks {
    pub const fn new() -> Self {
        Ticks {
            count: Mutex::new(Cell::new(0)),
        }
    }

    /// Advance the count by one millisecond
    pub fn increment(&self) {
        interrupt::free(|cs| {
            let count = self.count.borrow(cs);
            count.set(count.get().wrapping_add(1));
        })
    }

    pub fn get(&self) -> u32 {
        interrupt::free(|cs| self.count.borrow(cs).get())
    }
}

impl Default for Ticks {
    fn default() -> Self {
        Self::new()
    }
}

/// A [`Tick`] that runs SysTick at 1 kHz
///
/// The `SysTick` exception must call [`Ticks::increment`] on the same
/// `Ticks` for the clock to advance.
pub struct SysTickClock<'a> {
    syst: SYST,
    ticks: &'a Ticks,
}

impl<'a> SysTickClock<'a> {
    /// Take SysTick and start a 1 ms period from the core clock
    pub fn new(mut syst: SYST, core_hz: u32, ticks: &'a Ticks) -> Self {
        syst.set_clock_source(SystClkSource::Core);
        syst.set_reload((core_hz / 1000).saturating_sub(1));
        syst.clear_current();
        syst.enable_interrupt();
        syst.enable_counter();
        SysTickClock { syst, ticks }
    }

    /// Set the SysTick exception priority
    ///
    /// `priority` is the raw 8-bit value. The core ignores the bits it
    /// doesn't implement. Blocking waits from an interrupt handler need a
    /// more urgent (lower) SysTick priority than that handler.
    ///
    /// ```no_run
    /// use stm32u5_dma::tick::{SysTickClock, Ticks};
    ///
    /// static TICKS: Ticks = Ticks::new();
    ///
    /// let mut cp = cortex_m::Peripherals::take().unwrap();
    /// let clock = SysTickClock::new(cp.SYST, 160_000_000, &TICKS)
    ///     .with_priority(&mut cp.SCB, 0x10);
    /// ```
    pub fn with_priority(self, scb: &mut SCB, priority: u8) -> Self {
        // Safety: SysTick only advances the tick count, so changing its
        // priority can't break a priority-based critical section here.
        unsafe { scb.set_priority(SystemHandler::SysTick, priority) };
        self
    }

    /// Stop SysTick, and return it
    pub fn free(mut self) -> SYST {
        self.syst.disable_interrupt();
        self.syst.disable_counter();
        self.syst
    }
}

impl Tick for SysTickClock<'_> {
    fn now(&self) -> u32 {
        self.ticks.get()
    }
    fn suspend(&mut self) {
        self.syst.disable_interrupt();
    }
    fn resume(&mut self) {
        self.syst.enable_interrupt();
    }
}

/// Simulated time for host tests
///
/// Every reading advances the clock by one millisecond. At a chosen time,
/// the clock raises status flags on a mocked channel, standing in for the
/// hardware finishing its work.
#[cfg(test)]
pub(crate) mod sim {
    use super::Tick;
    use crate::ral::gpdma::ch::{CBR1, CSR};
    use core::cell::Cell;

    pub(crate) struct SimClock {
        now: Cell<u32>,
        csr: *mut u32,
        cbr1: *mut u32,
        raise: Option<(u32, u32)>,
    }

    impl SimClock {
        /// A clock that never raises flags
        pub(crate) fn new() -> Self {
            SimClock {
                now: Cell::new(0),
                csr: core::ptr::null_mut(),
                cbr1: core::ptr::null_mut(),
                raise: None,
            }
        }

        /// Raise `flags` in `csr` once the clock reaches `at`
        ///
        /// When the flags include TCF, the block counter in `cbr1` drops
        /// to zero as well.
        pub(crate) fn raising(csr: *mut u32, cbr1: *mut u32, at: u32, flags: u32) -> Self {
            SimClock {
                now: Cell::new(0),
                csr,
                cbr1,
                raise: Some((at, flags)),
            }
        }

        /// Start counting from `start`
        pub(crate) fn starting_at(self, start: u32) -> Self {
            self.now.set(start);
            if let Some((at, flags)) = self.raise {
                return SimClock {
                    raise: Some((start.wrapping_add(at), flags)),
                    ..self
                };
            }
            self
        }

        pub(crate) fn elapsed_since(&self, start: u32) -> u32 {
            self.now.get().wrapping_sub(start)
        }
    }

    impl Tick for SimClock {
        fn now(&self) -> u32 {
            let now = self.now.get().wrapping_add(1);
            self.now.set(now);
            if let Some((at, flags)) = self.raise {
                if now == at {
                    // Safety: tests hand in pointers into a live mock.
                    unsafe {
                        self.csr.write_volatile(self.csr.read_volatile() | flags);
                        if flags & CSR::TCF::mask != 0 {
                            self.cbr1
                                .write_volatile(self.cbr1.read_volatile() & !CBR1::BNDT::mask);
                        }
                    }
                }
            }
            now
        }
    }
}
