//! DMA interrupt support

use crate::{
    channel::{Channel, State},
    ral::{self, gpdma::ch},
    tick::Tick,
    transfer::error_code,
};

/// Notifications from [`on_interrupt`]
///
/// Every method does nothing by default. Implement the ones you need. The
/// handler has already updated the channel state when a method runs, so
/// you may start the next transfer from `complete` or `abort`.
pub trait Callbacks<T> {
    /// Half of the block (or repeated block, node or queue) moved
    fn half_complete(&mut self, channel: &mut Channel<T>) {
        let _ = channel;
    }
    /// The transfer completed
    fn complete(&mut self, channel: &mut Channel<T>) {
        let _ = channel;
    }
    /// An [`abort_it`](Channel::abort_it) finished
    fn abort(&mut self, channel: &mut Channel<T>) {
        let _ = channel;
    }
    /// A [`suspend_it`](Channel::suspend_it) took effect
    fn suspend(&mut self, channel: &mut Channel<T>) {
        let _ = channel;
    }
    /// The hardware reported an error. See
    /// [`last_errors`](Channel::last_errors).
    fn error(&mut self, channel: &mut Channel<T>) {
        let _ = channel;
    }
}

/// Ignore every notification
impl<T> Callbacks<T> for () {}

impl<T: Tick> Channel<T> {
    /// Returns `true` if the controller reports a pending interrupt for this channel
    pub fn is_interrupt(&self) -> bool {
        let mask = 1 << self.index;
        #[allow(unused_mut)]
        let mut pending = self.controller.MISR.read();
        #[cfg(feature = "trustzone")]
        {
            pending |= self.controller.SMISR.read();
        }
        pending & mask != 0
    }
}

/// Handle a DMA channel interrupt
///
/// Services one event per call, in priority order: half transfer, transfer
/// complete, suspend, then errors. A half transfer that arrives together
/// with the transfer complete is handled along with it.
///
/// Call `on_interrupt` in the channel's interrupt handler. Share the channel
/// with your thread code through a critical section:
///
/// ```no_run
/// use core::cell::RefCell;
/// use cortex_m::interrupt::{self, Mutex};
/// use stm32u5_dma::{on_interrupt, tick::SysTickClock, Callbacks, Channel};
///
/// type Clock = SysTickClock<'static>;
///
/// static CHANNEL: Mutex<RefCell<Option<Channel<Clock>>>> = Mutex::new(RefCell::new(None));
///
/// struct Done;
///
/// impl Callbacks<Clock> for Done {
///     fn complete(&mut self, channel: &mut Channel<Clock>) {
///         // Release the buffers...
///     }
/// }
///
/// // #[cortex_m_rt::interrupt]
/// fn GPDMA1_CH0() {
///     interrupt::free(|cs| {
///         if let Some(channel) = CHANNEL.borrow(cs).borrow_mut().as_mut() {
///             on_interrupt(channel, &mut Done);
///         }
///     });
/// }
/// ```
pub fn on_interrupt<T, C>(channel: &mut Channel<T>, callbacks: &mut C)
where
    T: Tick,
    C: Callbacks<T> + ?Sized,
{
    if !channel.is_interrupt() {
        return;
    }

    let ch = channel.registers;
    let enabled = ral::read_reg!(crate::ral::gpdma::ch, ch, CCR) & ch::IT_ALL;
    // Interrupt enables and their flags share bit positions.
    let flags = ral::read_reg!(crate::ral::gpdma::ch, ch, CSR) & enabled;

    if flags & ch::CSR::HTF::mask != 0 {
        ral::write_reg!(crate::ral::gpdma::ch, ch, CFCR, HTF: 1);
        callbacks.half_complete(channel);
        if flags & ch::CSR::TCF::mask == 0 {
            return;
        }
    }

    if flags & ch::CSR::TCF::mask != 0 {
        ral::write_reg!(crate::ral::gpdma::ch, ch, CFCR, TCF: 1);
        if channel.is_idle() {
            ral::write_reg!(crate::ral::gpdma::ch, ch, CFCR, HTF: 1);
            channel.disable_interrupts();
            channel.state = State::Idle;
        }
        callbacks.complete(channel);
        return;
    }

    if flags & ch::CSR::SUSPF::mask != 0 {
        ral::write_reg!(crate::ral::gpdma::ch, ch, CFCR, SUSPF: 1);
        if channel.state == State::Abort {
            channel.reset_channel();
            channel.disable_interrupts();
            channel.state = State::Idle;
            callbacks.abort(channel);
        } else {
            ral::modify_reg!(crate::ral::gpdma::ch, ch, CCR, SUSPIE: 0);
            channel.state = State::Suspend;
            callbacks.suspend(channel);
        }
        return;
    }

    let errors = error_code(flags);
    if errors.is_empty() {
        return;
    }
    channel.last_errors |= errors;
    ral::write_reg!(crate::ral::gpdma::ch, ch, CFCR, ch::FLAGS_ALL);
    let fatal = ch::CSR::DTEF::mask | ch::CSR::ULEF::mask | ch::CSR::USEF::mask;
    if flags & fatal != 0 {
        channel.reset_channel();
        channel.disable_interrupts();
        channel.state = State::Idle;
    }
    log::error!("DMA{}: {}", channel.index, channel.last_errors);
    callbacks.error(channel);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::tests::{channel, m2m};
    use crate::ral::mock::{self, Gpdma};
    use crate::tick::sim::SimClock;
    use crate::ErrorCode;

    const SRC: u32 = 0x2000_0000;
    const DST: u32 = 0x2000_4000;

    #[derive(Default)]
    struct Events {
        half: usize,
        complete: usize,
        abort: usize,
        suspend: usize,
        error: usize,
        states: [Option<State>; 4],
    }

    impl Events {
        fn saw(&mut self, state: State) {
            if let Some(slot) = self.states.iter_mut().find(|slot| slot.is_none()) {
                *slot = Some(state);
            }
        }
    }

    impl<T: Tick> Callbacks<T> for Events {
        fn half_complete(&mut self, channel: &mut Channel<T>) {
            self.half += 1;
            self.saw(channel.state());
        }
        fn complete(&mut self, channel: &mut Channel<T>) {
            self.complete += 1;
            self.saw(channel.state());
        }
        fn abort(&mut self, channel: &mut Channel<T>) {
            self.abort += 1;
            self.saw(channel.state());
        }
        fn suspend(&mut self, channel: &mut Channel<T>) {
            self.suspend += 1;
            self.saw(channel.state());
        }
        fn error(&mut self, channel: &mut Channel<T>) {
            self.error += 1;
            self.saw(channel.state());
        }
    }

    fn running(gpdma: &Gpdma, index: usize) -> Channel<SimClock> {
        let mut chan = channel(gpdma, index, SimClock::new());
        chan.init().unwrap();
        chan.set_config_direct(&m2m()).unwrap();
        unsafe { chan.start_direct_it(SRC, DST, 64) }.unwrap();
        gpdma.set_busy(index);
        chan
    }

    #[test]
    fn ignores_other_channels() {
        let gpdma = Gpdma::new();
        let mut chan = running(&gpdma, 0);
        gpdma.raise(0, ch::CSR::TCF::mask | ch::CSR::IDLEF::mask);
        gpdma.set_misr(1);

        let mut events = Events::default();
        on_interrupt(&mut chan, &mut events);
        assert_eq!(events.complete, 0);
        assert_eq!(chan.state(), State::Active);
    }

    #[test]
    fn transfer_complete() {
        let gpdma = Gpdma::new();
        let mut chan = running(&gpdma, 0);
        gpdma.raise(0, ch::CSR::TCF::mask | ch::CSR::IDLEF::mask);
        gpdma.set_misr(0);

        let mut events = Events::default();
        on_interrupt(&mut chan, &mut events);
        assert_eq!(events.complete, 1);
        assert_eq!(events.states[0], Some(State::Idle));
        assert_eq!(chan.state(), State::Idle);
        assert_eq!(gpdma.read(0, mock::CCR) & ch::IT_ALL, 0);
        assert_eq!(gpdma.read(0, mock::CFCR), ch::CFCR::HTF::mask);
    }

    #[test]
    fn block_complete_while_running() {
        let gpdma = Gpdma::new();
        let mut chan = running(&gpdma, 0);
        gpdma.raise(0, ch::CSR::TCF::mask);
        gpdma.set_misr(0);

        let mut events = Events::default();
        on_interrupt(&mut chan, &mut events);
        assert_eq!(events.complete, 1);
        assert_eq!(chan.state(), State::Active);
        assert_ne!(gpdma.read(0, mock::CCR) & ch::IT_ALL, 0);
    }

    #[test]
    fn half_transfer_alone() {
        let gpdma = Gpdma::new();
        let mut chan = running(&gpdma, 2);
        gpdma.raise(2, ch::CSR::HTF::mask);
        gpdma.set_misr(2);

        let mut events = Events::default();
        on_interrupt(&mut chan, &mut events);
        assert_eq!(events.half, 1);
        assert_eq!(events.complete, 0);
        assert_eq!(chan.state(), State::Active);
    }

    #[test]
    fn half_and_full_together() {
        let gpdma = Gpdma::new();
        let mut chan = running(&gpdma, 2);
        gpdma.raise(
            2,
            ch::CSR::HTF::mask | ch::CSR::TCF::mask | ch::CSR::IDLEF::mask,
        );
        gpdma.set_misr(2);

        let mut events = Events::default();
        on_interrupt(&mut chan, &mut events);
        assert_eq!(events.half, 1);
        assert_eq!(events.complete, 1);
        assert_eq!(
            events.states[..2],
            [Some(State::Active), Some(State::Idle)]
        );
    }

    #[test]
    fn masked_flags_are_ignored() {
        let gpdma = Gpdma::new();
        let mut chan = channel(&gpdma, 3, SimClock::new());
        chan.init().unwrap();
        chan.set_config_direct(&m2m()).unwrap();
        unsafe {
            chan.start_direct_it_opt(SRC, DST, 64, crate::Interrupts::empty())
        }
        .unwrap();
        gpdma.set_busy(3);
        gpdma.raise(3, ch::CSR::HTF::mask);
        gpdma.set_misr(3);

        let mut events = Events::default();
        on_interrupt(&mut chan, &mut events);
        assert_eq!(events.half, 0);
        assert_eq!(events.error, 0);
    }

    #[test]
    fn suspend_then_resume() {
        let gpdma = Gpdma::new();
        let mut chan = running(&gpdma, 5);
        chan.suspend_it().unwrap();
        gpdma.raise(5, ch::CSR::SUSPF::mask);
        gpdma.set_misr(5);

        let mut events = Events::default();
        on_interrupt(&mut chan, &mut events);
        assert_eq!(events.suspend, 1);
        assert_eq!(chan.state(), State::Suspend);
        assert_eq!(gpdma.read(5, mock::CCR) & ch::CCR::SUSPIE::mask, 0);

        chan.resume().unwrap();
        assert_eq!(chan.state(), State::Active);
    }

    #[test]
    fn abort_completes() {
        let gpdma = Gpdma::new();
        let mut chan = running(&gpdma, 5);
        chan.abort_it().unwrap();
        assert_eq!(chan.state(), State::Abort);
        gpdma.raise(5, ch::CSR::SUSPF::mask);
        gpdma.set_misr(5);

        let mut events = Events::default();
        on_interrupt(&mut chan, &mut events);
        assert_eq!(events.abort, 1);
        assert_eq!(events.states[0], Some(State::Idle));
        let ccr = gpdma.read(5, mock::CCR);
        assert_ne!(ccr & ch::CCR::RESET::mask, 0);
        assert_eq!(ccr & ch::IT_ALL, 0);
    }

    #[test]
    fn transfer_error() {
        let gpdma = Gpdma::new();
        let mut chan = running(&gpdma, 7);
        gpdma.raise(7, ch::CSR::DTEF::mask);
        gpdma.set_misr(7);

        let mut events = Events::default();
        on_interrupt(&mut chan, &mut events);
        assert_eq!(events.error, 1);
        assert_eq!(events.states[0], Some(State::Idle));
        assert_eq!(chan.last_errors(), ErrorCode::DTE);
        assert_eq!(gpdma.read(7, mock::CFCR), ch::FLAGS_ALL);
        assert_ne!(gpdma.read(7, mock::CCR) & ch::CCR::RESET::mask, 0);
    }

    #[test]
    fn errors_reported_together() {
        let gpdma = Gpdma::new();
        let mut chan = running(&gpdma, 7);
        gpdma.raise(7, ch::CSR::TOF::mask | ch::CSR::DTEF::mask);
        gpdma.set_misr(7);

        let mut events = Events::default();
        on_interrupt(&mut chan, &mut events);
        assert_eq!(events.error, 1);
        assert_eq!(events.complete + events.half + events.abort + events.suspend, 0);
        assert_eq!(chan.last_errors(), ErrorCode::TO | ErrorCode::DTE);
        assert_eq!(chan.state(), State::Idle);
    }

    #[test]
    fn error_callback_may_restart() {
        struct Restart(Option<crate::Result<()>>);

        impl<T: Tick> Callbacks<T> for Restart {
            fn error(&mut self, channel: &mut Channel<T>) {
                // The channel is already reset and idle.
                self.0 = Some(unsafe { channel.start_direct_it(SRC, DST, 32) });
            }
        }

        let gpdma = Gpdma::new();
        let mut chan = running(&gpdma, 8);
        gpdma.raise(8, ch::CSR::ULEF::mask);
        gpdma.set_misr(8);

        let mut restart = Restart(None);
        on_interrupt(&mut chan, &mut restart);
        assert_eq!(restart.0, Some(Ok(())));
        assert_eq!(chan.state(), State::Active);
        assert_eq!(chan.last_errors(), ErrorCode::empty());
        assert_eq!(gpdma.read(8, mock::CBR1) & ch::CBR1::BNDT::mask, 32);
        assert_ne!(gpdma.read(8, mock::CCR) & ch::CCR::RESET::mask, 0);
    }

    #[test]
    fn trigger_overrun_keeps_running() {
        let gpdma = Gpdma::new();
        let mut chan = running(&gpdma, 7);
        gpdma.raise(7, ch::CSR::TOF::mask);
        gpdma.set_misr(7);

        let mut events = Events::default();
        on_interrupt(&mut chan, &mut events);
        assert_eq!(events.error, 1);
        assert_eq!(events.states[0], Some(State::Active));
        assert_eq!(chan.last_errors(), ErrorCode::TO);
        assert_eq!(gpdma.read(7, mock::CCR) & ch::CCR::RESET::mask, 0);
    }

    #[test]
    fn unit_callbacks() {
        let gpdma = Gpdma::new();
        let mut chan = running(&gpdma, 1);
        gpdma.raise(1, ch::CSR::TCF::mask | ch::CSR::IDLEF::mask);
        gpdma.set_misr(1);
        on_interrupt(&mut chan, &mut ());
        assert_eq!(chan.state(), State::Idle);
    }
}
