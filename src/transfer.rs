//! Starting, suspending, aborting and polling transfers
//!
//! Every `start_*` function is `unsafe`. The DMA controller reads and writes
//! the addresses you hand it, outside of the compiler's view. You must make
//! sure that the memory stays valid, and that nothing else accesses it,
//! until the transfer completes or you abort it.

use crate::{
    channel::{Channel, State, TransferMode},
    config::{DataWidth, TransferLevel, MAX_BLOCK_SIZE},
    node::{Node, LINK_ADDRESS},
    queue::Queue,
    ral::{self, gpdma::ch},
    tick::Tick,
    Error, ErrorCode, Result,
};

/// Milliseconds to wait for the channel to confirm a suspend
pub const SUSPEND_TIMEOUT_MS: u32 = 5;

bitflags::bitflags! {
    /// Optional interrupts for a transfer
    ///
    /// Transfer complete and the error interrupts are always enabled when
    /// a transfer starts with interrupts.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Interrupts: u32 {
        const HALF_TRANSFER = ch::CCR::HTIE::mask;
        const TRIGGER_OVERRUN = ch::CCR::TOIE::mask;
        /// Interrupts enabled by the plain `*_it` starts
        const DEFAULT = Self::HALF_TRANSFER.bits() | Self::TRIGGER_OVERRUN.bits();
    }
}

/// Interrupts enabled for every transfer started with interrupts
const REQUIRED_INTERRUPTS: u32 =
    ch::CCR::TCIE::mask | ch::CCR::DTEIE::mask | ch::CCR::ULEIE::mask | ch::CCR::USEIE::mask;

const ERROR_FLAGS: u32 = ch::CSR::DTEF::mask | ch::CSR::USEF::mask | ch::CSR::ULEF::mask;

/// Translate status flags into error codes
pub(crate) fn error_code(flags: u32) -> ErrorCode {
    let mut code = ErrorCode::empty();
    code.set(ErrorCode::DTE, flags & ch::CSR::DTEF::mask != 0);
    code.set(ErrorCode::USE, flags & ch::CSR::USEF::mask != 0);
    code.set(ErrorCode::ULE, flags & ch::CSR::ULEF::mask != 0);
    code.set(ErrorCode::TO, flags & ch::CSR::TOF::mask != 0);
    code
}

fn check_size(size: u32) -> Result<()> {
    if size == 0 || size > MAX_BLOCK_SIZE {
        Err(Error::InvalidParameter)
    } else {
        Ok(())
    }
}

impl<T: Tick> Channel<T> {
    /// Start a direct transfer, and poll for completion
    ///
    /// `size` is the block size in bytes, `1..=0xFFFF`. The channel must be
    /// idle in [`TransferMode::Direct`].
    ///
    /// # Safety
    ///
    /// See the [module documentation](crate::transfer).
    pub unsafe fn start_direct(&mut self, src: u32, dst: u32, size: u32) -> Result<()> {
        self.begin_direct(src, dst, size, None)
    }

    /// Start a direct transfer with the default interrupts
    ///
    /// # Safety
    ///
    /// See the [module documentation](crate::transfer).
    pub unsafe fn start_direct_it(&mut self, src: u32, dst: u32, size: u32) -> Result<()> {
        self.begin_direct(src, dst, size, Some(Interrupts::DEFAULT))
    }

    /// Start a direct transfer with the chosen optional interrupts
    ///
    /// # Safety
    ///
    /// See the [module documentation](crate::transfer).
    pub unsafe fn start_direct_it_opt(
        &mut self,
        src: u32,
        dst: u32,
        size: u32,
        interrupts: Interrupts,
    ) -> Result<()> {
        self.begin_direct(src, dst, size, Some(interrupts))
    }

    fn begin_direct(
        &mut self,
        src: u32,
        dst: u32,
        size: u32,
        interrupts: Option<Interrupts>,
    ) -> Result<()> {
        if self.mode != TransferMode::Direct {
            log::error!("DMA{}: not configured for direct transfers", self.index);
            return Err(Error::InvalidParameter);
        }
        check_size(size)?;
        self.claim()?;
        self.program_direct(src, dst, size, interrupts);
        Ok(())
    }

    /// Start a linked-list transfer, and poll for completion
    ///
    /// The queue's nodes must stay put until the transfer ends. A circular
    /// queue switches the channel to [`TransferMode::LinkedListCircular`].
    ///
    /// # Safety
    ///
    /// See the [module documentation](crate::transfer).
    pub unsafe fn start_linked_list(&mut self, queue: &Queue<'_>) -> Result<()> {
        self.begin_linked_list(queue, None)
    }

    /// Start a linked-list transfer with the default interrupts
    ///
    /// # Safety
    ///
    /// See the [module documentation](crate::transfer).
    pub unsafe fn start_linked_list_it(&mut self, queue: &Queue<'_>) -> Result<()> {
        self.begin_linked_list(queue, Some(Interrupts::DEFAULT))
    }

    /// Start a linked-list transfer with the chosen optional interrupts
    ///
    /// # Safety
    ///
    /// See the [module documentation](crate::transfer).
    pub unsafe fn start_linked_list_it_opt(
        &mut self,
        queue: &Queue<'_>,
        interrupts: Interrupts,
    ) -> Result<()> {
        self.begin_linked_list(queue, Some(interrupts))
    }

    fn begin_linked_list(
        &mut self,
        queue: &Queue<'_>,
        interrupts: Option<Interrupts>,
    ) -> Result<()> {
        if self.mode == TransferMode::Direct {
            log::error!("DMA{}: not configured for linked-list transfers", self.index);
            return Err(Error::InvalidParameter);
        }
        let (base, link) = queue.head_link().ok_or(Error::InvalidParameter)?;
        if queue.kind() != Some(self.node_kind()) {
            log::error!("DMA{}: queue holds {:?} nodes", self.index, queue.kind());
            return Err(Error::InvalidParameter);
        }
        self.claim()?;
        if queue.is_circular() {
            self.mode = TransferMode::LinkedListCircular;
        }
        self.block_size = queue.head().map_or(0, |head| head.data().2);
        self.program_linked_list(base, link, interrupts);
        Ok(())
    }

    /// Start a peripheral transfer with the default interrupts
    ///
    /// See [`start_periph_it_opt`](Channel::start_periph_it_opt).
    ///
    /// # Safety
    ///
    /// See the [module documentation](crate::transfer).
    pub unsafe fn start_periph_it(
        &mut self,
        node: &mut Node,
        src: u32,
        dst: u32,
        size: u32,
    ) -> Result<()> {
        self.start_periph_it_opt(node, src, dst, size, Interrupts::DEFAULT)
    }

    /// Start a peripheral transfer with the chosen optional interrupts
    ///
    /// In [`TransferMode::LinkedListCircular`], the addresses and size go
    /// into `node`, which must be the node given to
    /// [`set_config_periph_circular`](Channel::set_config_periph_circular),
    /// and the channel loops on it. Any other node is rejected. In [`TransferMode::Direct`], `node` is
    /// ignored and this is a direct transfer. Linear linked-list mode is
    /// rejected.
    ///
    /// # Safety
    ///
    /// See the [module documentation](crate::transfer).
    pub unsafe fn start_periph_it_opt(
        &mut self,
        node: &mut Node,
        src: u32,
        dst: u32,
        size: u32,
        interrupts: Interrupts,
    ) -> Result<()> {
        check_size(size)?;
        match self.mode {
            TransferMode::LinkedListLinear => {
                log::error!("DMA{}: peripheral transfers need circular mode", self.index);
                Err(Error::InvalidParameter)
            }
            TransferMode::Direct => self.begin_direct(src, dst, size, Some(interrupts)),
            TransferMode::LinkedListCircular => {
                if self.head != Some(node.address()) {
                    log::error!("DMA{}: node was not configured for this channel", self.index);
                    return Err(Error::InvalidParameter);
                }
                self.claim()?;
                node.update_data(src, dst, size);
                let address = node.address();
                let link = (address & LINK_ADDRESS) | node.kind().update_all();
                self.block_size = size;
                self.program_linked_list(address & !LINK_ADDRESS, link, Some(interrupts));
                Ok(())
            }
        }
    }

    /// Move from Idle to Active, or report the channel busy
    fn claim(&mut self) -> Result<()> {
        if self.state != State::Idle {
            log::warn!("DMA{}: busy in state {:?}", self.index, self.state);
            return Err(Error::Busy);
        }
        self.last_errors = ErrorCode::empty();
        self.state = State::Active;
        Ok(())
    }

    fn program_direct(&mut self, src: u32, dst: u32, size: u32, interrupts: Option<Interrupts>) {
        self.block_size = size;
        let ch = self.registers;
        ral::write_reg!(crate::ral::gpdma::ch, ch, CSAR, src);
        ral::write_reg!(crate::ral::gpdma::ch, ch, CDAR, dst);
        ral::modify_reg!(crate::ral::gpdma::ch, ch, CBR1, BNDT: size);
        self.prepare_interrupts(interrupts);
        ral::write_reg!(crate::ral::gpdma::ch, ch, CLLR, 0);
        ral::modify_reg!(crate::ral::gpdma::ch, ch, CCR, EN: 1);
        log::debug!("DMA{}: direct {:#010x} -> {:#010x}, {} bytes", self.index, src, dst, size);
    }

    fn program_linked_list(&mut self, base: u32, link: u32, interrupts: Option<Interrupts>) {
        self.head = Some(base | (link & LINK_ADDRESS));
        let ch = self.registers;
        ral::write_reg!(crate::ral::gpdma::ch, ch, CLBAR, base & ch::CLBAR::LBA::mask);
        ral::write_reg!(crate::ral::gpdma::ch, ch, CLLR, link);
        self.prepare_interrupts(interrupts);
        ral::modify_reg!(crate::ral::gpdma::ch, ch, CBR1, BNDT: 0);
        ral::modify_reg!(crate::ral::gpdma::ch, ch, CCR, EN: 1);
        log::debug!("DMA{}: linked list at {:#010x}", self.index, base | (link & LINK_ADDRESS));
    }

    /// Clear stale flags, then enable the transfer's interrupts
    fn prepare_interrupts(&self, interrupts: Option<Interrupts>) {
        let ch = self.registers;
        ral::write_reg!(crate::ral::gpdma::ch, ch, CFCR, ch::FLAGS_ALL);
        let ccr = ch.CCR.read() & !ch::IT_ALL;
        match interrupts {
            Some(optional) => ch.CCR.write(ccr | REQUIRED_INTERRUPTS | optional.bits()),
            None => ch.CCR.write(ccr),
        }
    }

    /// Reset the channel, dropping whatever it was doing
    pub(crate) fn reset_channel(&self) {
        let ch = self.registers;
        ral::modify_reg!(crate::ral::gpdma::ch, ch, CCR, RESET: 1);
    }

    pub(crate) fn disable_interrupts(&self) {
        let ch = self.registers;
        let ccr = ch.CCR.read();
        ch.CCR.write(ccr & !ch::IT_ALL);
    }

    /// Wait for the suspend flag, or time out
    fn wait_for_suspend(&self) -> Result<()> {
        let ch = self.registers;
        let start = self.tick.now();
        while !ral::read_reg!(crate::ral::gpdma::ch, ch, CSR, SUSPF == 1) {
            if self.tick.now().wrapping_sub(start) > SUSPEND_TIMEOUT_MS {
                return Err(Error::SuspendTimeout);
            }
        }
        Ok(())
    }

    /// Suspend the running transfer, and wait for the channel to confirm
    ///
    /// On a timeout, the channel stays [`State::Active`]. If the hardware
    /// went idle in the meantime, the channel is reset and left
    /// [`State::Idle`] instead.
    pub fn suspend(&mut self) -> Result<()> {
        self.expect_state(&[State::Active])?;
        if self.is_idle() {
            return Err(Error::AlreadyIdle);
        }
        let ch = self.registers;
        ral::modify_reg!(crate::ral::gpdma::ch, ch, CCR, SUSP: 1);
        if let Err(err) = self.wait_for_suspend() {
            log::warn!("DMA{}: suspend not confirmed", self.index);
            if self.is_idle() {
                self.reset_channel();
                self.state = State::Idle;
            }
            return Err(err);
        }
        self.state = State::Suspend;
        log::debug!("DMA{}: suspended", self.index);
        Ok(())
    }

    /// Request a suspend, and let the interrupt handler confirm it
    pub fn suspend_it(&mut self) -> Result<()> {
        self.expect_state(&[State::Active])?;
        if self.is_idle() {
            return Err(Error::AlreadyIdle);
        }
        self.state = State::Suspend;
        let ch = self.registers;
        ral::modify_reg!(crate::ral::gpdma::ch, ch, CCR, SUSPIE: 1, SUSP: 1);
        Ok(())
    }

    /// Resume a suspended transfer
    pub fn resume(&mut self) -> Result<()> {
        self.expect_state(&[State::Suspend])?;
        let ch = self.registers;
        ral::modify_reg!(crate::ral::gpdma::ch, ch, CCR, SUSP: 0);
        self.state = State::Active;
        Ok(())
    }

    /// Stop the transfer, and wait for the channel to confirm
    ///
    /// Returns [`Error::AlreadyIdle`] if the hardware has nothing to abort.
    /// On a timeout, the channel returns to its previous state, unless the
    /// hardware went idle, in which case it's reset and left [`State::Idle`].
    pub fn abort(&mut self) -> Result<()> {
        self.expect_state(&[State::Idle, State::Active])?;
        if self.is_idle() {
            return Err(Error::AlreadyIdle);
        }
        let previous = self.state;
        self.state = State::Abort;
        let ch = self.registers;
        ral::modify_reg!(crate::ral::gpdma::ch, ch, CCR, SUSP: 1);
        if let Err(err) = self.wait_for_suspend() {
            log::warn!("DMA{}: abort not confirmed", self.index);
            if self.is_idle() {
                self.reset_channel();
                self.state = State::Idle;
            } else {
                self.state = previous;
            }
            return Err(err);
        }
        self.reset_channel();
        ral::write_reg!(crate::ral::gpdma::ch, ch, CFCR, ch::FLAGS_ALL);
        self.state = State::Idle;
        log::debug!("DMA{}: aborted", self.index);
        Ok(())
    }

    /// Request an abort, and let the interrupt handler finish it
    pub fn abort_it(&mut self) -> Result<()> {
        self.expect_state(&[State::Idle, State::Active])?;
        if self.is_idle() {
            return Err(Error::AlreadyIdle);
        }
        self.state = State::Abort;
        let ch = self.registers;
        ral::modify_reg!(crate::ral::gpdma::ch, ch, CCR, SUSPIE: 1, SUSP: 1);
        Ok(())
    }

    /// Wait until the transfer reaches `level`, for up to `timeout_ms`
    ///
    /// Circular transfers never finish, so they're rejected. On a timeout
    /// the transfer is aborted. On a hardware error, the channel is reset
    /// and the collected error codes are returned.
    pub fn poll_for_transfer(&mut self, level: TransferLevel, timeout_ms: u32) -> Result<()> {
        self.expect_state(&[State::Active])?;
        if self.mode == TransferMode::LinkedListCircular {
            log::error!("DMA{}: circular transfers can't be polled", self.index);
            return Err(Error::InvalidParameter);
        }

        let ch = self.registers;
        if ral::read_reg!(crate::ral::gpdma::ch, ch, CSR, TOF == 1) {
            self.last_errors |= ErrorCode::TO;
            ral::write_reg!(crate::ral::gpdma::ch, ch, CFCR, TOF: 1);
        }

        let wanted = match level {
            TransferLevel::Half => ch::CSR::HTF::mask | ch::CSR::IDLEF::mask,
            TransferLevel::Full => ch::CSR::IDLEF::mask,
        };
        let start = self.tick.now();
        let flags = loop {
            let flags = ral::read_reg!(crate::ral::gpdma::ch, ch, CSR);
            if flags & wanted != 0 {
                break flags;
            }
            if self.tick.now().wrapping_sub(start) > timeout_ms {
                log::warn!("DMA{}: transfer timed out after {} ms", self.index, timeout_ms);
                if let Err(err) = self.abort() {
                    log::warn!("DMA{}: abort after timeout failed: {}", self.index, err);
                }
                return Err(Error::Timeout);
            }
        };

        if flags & ERROR_FLAGS != 0 {
            self.last_errors |= error_code(flags & ERROR_FLAGS);
            ral::write_reg!(crate::ral::gpdma::ch, ch, CFCR, ch::FLAGS_ALL);
            self.reset_channel();
            self.state = State::Idle;
            log::error!("DMA{}: {}", self.index, self.last_errors);
            return Err(Error::Transfer(self.last_errors));
        }

        match level {
            TransferLevel::Half => {
                ral::write_reg!(crate::ral::gpdma::ch, ch, CFCR, HTF: 1);
            }
            TransferLevel::Full => {
                ral::write_reg!(crate::ral::gpdma::ch, ch, CFCR, TCF: 1, HTF: 1);
                self.state = State::Idle;
            }
        }
        Ok(())
    }

    /// Bytes that the running transfer has yet to move
    ///
    /// This counts the current block, the data held in the FIFO, and the
    /// blocks still to repeat.
    pub fn remaining_bytes(&self) -> u32 {
        let ch = self.registers;
        let bndt = ral::read_reg!(crate::ral::gpdma::ch, ch, CBR1, BNDT);
        let brc = ral::read_reg!(crate::ral::gpdma::ch, ch, CBR1, BRC);
        bndt + self.fifo_bytes() + brc * self.block_size
    }

    /// Bytes held in the channel FIFO
    pub fn fifo_bytes(&self) -> u32 {
        let ch = self.registers;
        let fifol = ral::read_reg!(crate::ral::gpdma::ch, ch, CSR, FIFOL);
        let width = DataWidth::from_raw(ral::read_reg!(crate::ral::gpdma::ch, ch, CTR1, DDW_LOG2));
        fifol * width.bytes()
    }
}
