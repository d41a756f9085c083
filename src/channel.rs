//! DMA channel

use crate::{
    config::{
        check_burst, DataHandling, DataWidth, DirectConfig, DirectEventMode, ExecutionMode,
        HardwareRequestMode, Increment, LinkedListConfig, LinkedListEventMode, Port, Priority,
        RepeatBlock, Request, Step, TriggerConfig,
    },
    node::{
        decode_data_handling, decode_request, decode_trigger, encode_cbr1_repeat, encode_cbr2,
        encode_ctr3, encode_data_handling, encode_direction, encode_trigger, Node, NodeKind,
        LINK_ADDRESS,
    },
    ral::{
        self,
        gpdma::{self, ch, CHANNEL_COUNT, FIRST_2D_CHANNEL, GPDMA1},
        Static,
    },
    tick::Tick,
    Error, ErrorCode, Result,
};

#[cfg(feature = "trustzone")]
use crate::config::SecurityAttribute;

/// Channel lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    /// Not initialized
    Reset,
    /// Initialized, not yet configured
    Init,
    /// Configured and ready to start
    Idle,
    /// Transferring
    Active,
    /// Suspended, or a suspend was requested
    Suspend,
    /// An abort was requested
    Abort,
}

/// How the channel moves data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferMode {
    /// One block described by the channel registers
    Direct,
    /// A queue of nodes that ends
    LinkedListLinear,
    /// A queue of nodes that loops
    LinkedListCircular,
}

/// A GPDMA channel
///
/// You should rely on your HAL to allocate `Channel`s. If your HAL does not
/// allocate channels, or if you're designing the HAL, use [`new`](Channel::new)
/// to create a DMA channel.
///
/// A channel starts in [`State::Reset`]. [`init`](Channel::init) it, give it
/// a direct or linked-list configuration, then start transfers. The
/// channel uses `T` to bound its busy-waits.
pub struct Channel<T> {
    /// Our channel number, expected to be between 0 to (CHANNEL_COUNT - 1)
    pub(crate) index: usize,
    /// This channel's registers
    pub(crate) registers: Static<ch::RegisterBlock>,
    /// The controller, for the shared interrupt status
    pub(crate) controller: Static<gpdma::RegisterBlock>,
    pub(crate) state: State,
    pub(crate) mode: TransferMode,
    pub(crate) last_errors: ErrorCode,
    pub(crate) user_data: *const (),
    /// Block size of the running transfer, in bytes
    pub(crate) block_size: u32,
    /// Address of the first node of the running linked-list transfer
    pub(crate) head: Option<u32>,
    pub(crate) tick: T,
}

impl<T: Tick> Channel<T> {
    /// Creates the DMA channel described by `index`
    ///
    /// # Safety
    ///
    /// This will create a handle that may alias global, mutable state.
    /// You must make sure that only one `Channel` exists for each `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not less than [`CHANNEL_COUNT`].
    #[inline(always)]
    pub unsafe fn new(index: usize, tick: T) -> Self {
        Self::from_address(GPDMA1, index, tick)
    }

    /// Creates a DMA channel on the controller at `gpdma`
    ///
    /// Use this for the secure alias of GPDMA1.
    ///
    /// # Safety
    ///
    /// `gpdma` must point to a GPDMA controller. See [`new`](Channel::new)
    /// for the aliasing requirements.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not less than [`CHANNEL_COUNT`].
    pub unsafe fn from_address(
        gpdma: *const gpdma::RegisterBlock,
        index: usize,
        tick: T,
    ) -> Self {
        if index < CHANNEL_COUNT {
            Channel {
                index,
                registers: Static(core::ptr::addr_of!((*gpdma).CH[index])),
                controller: Static(gpdma),
                state: State::Reset,
                mode: TransferMode::Direct,
                last_errors: ErrorCode::empty(),
                user_data: core::ptr::null(),
                block_size: 0,
                head: None,
                tick,
            }
        } else {
            panic!("DMA channel index {} exceeds CHANNEL_COUNT", index);
        }
    }

    /// Returns the DMA channel number
    ///
    /// Channels are unique and numbered within the half-open range `[0, CHANNEL_COUNT)`.
    pub fn channel(&self) -> usize {
        self.index
    }

    /// Returns `true` if this channel supports 2D addressing
    pub fn is_2d(&self) -> bool {
        self.index >= FIRST_2D_CHANNEL
    }

    /// The kind of node that this channel loads
    pub fn node_kind(&self) -> NodeKind {
        NodeKind::for_channel(self.index)
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn mode(&self) -> TransferMode {
        self.mode
    }

    /// Returns the errors collected since the last transfer started
    pub fn last_errors(&self) -> ErrorCode {
        self.last_errors
    }

    /// Returns the address of the node that started the running
    /// linked-list transfer
    pub fn linked_list_head(&self) -> Option<u32> {
        self.head
    }

    /// Attach an opaque pointer for your interrupt callbacks
    pub fn set_user_data(&mut self, data: *const ()) {
        self.user_data = data;
    }

    pub fn user_data(&self) -> *const () {
        self.user_data
    }

    pub fn tick(&self) -> &T {
        &self.tick
    }

    pub fn tick_mut(&mut self) -> &mut T {
        &mut self.tick
    }

    /// Returns `true` if the hardware reports the channel idle
    pub fn is_idle(&self) -> bool {
        let ch = self.registers;
        ral::read_reg!(crate::ral::gpdma::ch, ch, CSR, IDLEF == 1)
    }

    /// Returns `true` if the channel is enabled
    pub fn is_enabled(&self) -> bool {
        let ch = self.registers;
        ral::read_reg!(crate::ral::gpdma::ch, ch, CCR, EN == 1)
    }

    /// Prepare the channel for configuration
    ///
    /// Registers are left alone. The channel must be in [`State::Reset`].
    pub fn init(&mut self) -> Result<()> {
        self.expect_state(&[State::Reset])?;
        self.mode = TransferMode::Direct;
        self.last_errors = ErrorCode::empty();
        self.user_data = core::ptr::null();
        self.block_size = 0;
        self.head = None;
        self.state = State::Init;
        log::debug!("DMA{}: initialized", self.index);
        Ok(())
    }

    /// Disable the channel, and return its registers to their reset values
    ///
    /// This works in any state, and leaves the channel in [`State::Reset`].
    pub fn deinit(&mut self) {
        let ch = self.registers;
        ral::modify_reg!(crate::ral::gpdma::ch, ch, CCR, EN: 0);
        ral::write_reg!(crate::ral::gpdma::ch, ch, CFCR, ch::FLAGS_ALL);
        ral::write_reg!(crate::ral::gpdma::ch, ch, CCR, 0);
        ral::write_reg!(crate::ral::gpdma::ch, ch, CTR1, 0);
        ral::write_reg!(crate::ral::gpdma::ch, ch, CTR2, 0);
        ral::write_reg!(crate::ral::gpdma::ch, ch, CBR1, 0);
        if self.is_2d() {
            ral::write_reg!(crate::ral::gpdma::ch, ch, CTR3, 0);
            ral::write_reg!(crate::ral::gpdma::ch, ch, CBR2, 0);
        }
        ral::write_reg!(crate::ral::gpdma::ch, ch, CLLR, 0);
        self.head = None;
        self.state = State::Reset;
        log::debug!("DMA{}: deinitialized", self.index);
    }

    pub(crate) fn expect_state(&self, allowed: &[State]) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            log::error!("DMA{}: not allowed in state {:?}", self.index, self.state);
            Err(Error::InvalidParameter)
        }
    }

    /// Direct sub-settings need an idle channel in direct mode
    fn expect_direct_idle(&self) -> Result<()> {
        self.expect_state(&[State::Idle])?;
        if self.mode != TransferMode::Direct {
            log::error!("DMA{}: not configured for direct transfers", self.index);
            return Err(Error::InvalidParameter);
        }
        Ok(())
    }

    /// Linked-list sub-settings need an idle channel in a linked-list mode
    fn expect_linked_list_idle(&self) -> Result<()> {
        self.expect_state(&[State::Idle])?;
        if self.mode == TransferMode::Direct {
            log::error!("DMA{}: not configured for linked-list transfers", self.index);
            return Err(Error::InvalidParameter);
        }
        Ok(())
    }

    fn expect_2d(&self) -> Result<()> {
        if self.is_2d() {
            Ok(())
        } else {
            log::error!("DMA{}: no 2D addressing on this channel", self.index);
            Err(Error::InvalidParameter)
        }
    }

    //
    // Direct configuration
    //

    /// Configure the channel for direct transfers
    ///
    /// The channel must be in [`State::Init`] or [`State::Idle`]. On success,
    /// it's idle in [`TransferMode::Direct`].
    pub fn set_config_direct(&mut self, config: &DirectConfig) -> Result<()> {
        config.check()?;
        self.expect_state(&[State::Init, State::Idle])?;

        let ch = self.registers;
        ral::modify_reg!(crate::ral::gpdma::ch, ch, CCR, PRIO: config.priority.raw());
        ral::modify_reg!(
            crate::ral::gpdma::ch,
            ch,
            CTR1,
            SINC: config.src_increment.raw(),
            SDW_LOG2: config.src_width.raw(),
            DINC: config.dst_increment.raw(),
            DDW_LOG2: config.dst_width.raw()
        );
        if let Request::Peripheral(sel) = config.request {
            ral::modify_reg!(crate::ral::gpdma::ch, ch, CTR2, REQSEL: sel as u32);
        }
        let direction = encode_direction(config.direction);
        let ctr2 = ch.CTR2.read() & !DIRECTION_MASK;
        ch.CTR2.write(ctr2 | direction);

        self.mode = TransferMode::Direct;
        self.state = State::Idle;
        Ok(())
    }

    /// Read back the direct configuration from the channel registers
    pub fn config_direct(&self) -> DirectConfig {
        let ch = self.registers;
        let (request, direction) = decode_request(ch.CTR2.read());
        let (sinc, sdw, dinc, ddw) = ral::read_reg!(
            crate::ral::gpdma::ch,
            ch,
            CTR1,
            SINC,
            SDW_LOG2,
            DINC,
            DDW_LOG2
        );
        DirectConfig {
            request,
            direction,
            src_increment: Increment::from_raw(sinc),
            dst_increment: Increment::from_raw(dinc),
            src_width: DataWidth::from_raw(sdw),
            dst_width: DataWidth::from_raw(ddw),
            priority: self.priority(),
        }
    }

    /// Configure the channel for direct peripheral transfers
    ///
    /// Same as [`set_config_direct`](Channel::set_config_direct). Pair it
    /// with [`start_periph_it`](Channel::start_periph_it).
    pub fn set_config_periph_direct(&mut self, config: &DirectConfig) -> Result<()> {
        self.set_config_direct(config)
    }

    pub fn config_periph_direct(&self) -> DirectConfig {
        self.config_direct()
    }

    pub fn set_hardware_request_mode(&mut self, mode: HardwareRequestMode) -> Result<()> {
        self.expect_direct_idle()?;
        let ch = self.registers;
        ral::modify_reg!(crate::ral::gpdma::ch, ch, CTR2, BREQ: mode.raw());
        Ok(())
    }

    pub fn reset_hardware_request_mode(&mut self) -> Result<()> {
        self.set_hardware_request_mode(HardwareRequestMode::Burst)
    }

    pub fn hardware_request_mode(&self) -> HardwareRequestMode {
        let ch = self.registers;
        HardwareRequestMode::from_raw(ral::read_reg!(crate::ral::gpdma::ch, ch, CTR2, BREQ))
    }

    /// Set the source and destination AHB ports
    pub fn set_ports(&mut self, src: Port, dst: Port) -> Result<()> {
        self.expect_direct_idle()?;
        let ch = self.registers;
        ral::modify_reg!(crate::ral::gpdma::ch, ch, CTR1, SAP: src.raw(), DAP: dst.raw());
        Ok(())
    }

    pub fn reset_ports(&mut self) -> Result<()> {
        self.set_ports(Port::Port0, Port::Port0)
    }

    /// Returns the (source, destination) ports
    pub fn ports(&self) -> (Port, Port) {
        let ch = self.registers;
        let (sap, dap) = ral::read_reg!(crate::ral::gpdma::ch, ch, CTR1, SAP, DAP);
        (Port::from_raw(sap), Port::from_raw(dap))
    }

    /// Set the source and destination burst lengths, in bytes
    ///
    /// Each length must be within `1..=64`.
    pub fn set_burst(&mut self, src: u8, dst: u8) -> Result<()> {
        check_burst(src, dst)?;
        self.expect_direct_idle()?;
        let ch = self.registers;
        ral::modify_reg!(
            crate::ral::gpdma::ch,
            ch,
            CTR1,
            SBL_1: (src - 1) as u32,
            DBL_1: (dst - 1) as u32
        );
        Ok(())
    }

    pub fn reset_burst(&mut self) -> Result<()> {
        self.set_burst(1, 1)
    }

    /// Returns the (source, destination) burst lengths, in bytes
    pub fn burst(&self) -> (u8, u8) {
        let ch = self.registers;
        let (sbl, dbl) = ral::read_reg!(crate::ral::gpdma::ch, ch, CTR1, SBL_1, DBL_1);
        (sbl as u8 + 1, dbl as u8 + 1)
    }

    pub fn set_trigger(&mut self, trigger: &TriggerConfig) -> Result<()> {
        trigger.check()?;
        self.expect_direct_idle()?;
        let ch = self.registers;
        let ctr2 = ch.CTR2.read() & !TRIGGER_MASK;
        ch.CTR2.write(ctr2 | encode_trigger(trigger));
        Ok(())
    }

    pub fn reset_trigger(&mut self) -> Result<()> {
        self.set_trigger(&TriggerConfig::default())
    }

    pub fn trigger(&self) -> TriggerConfig {
        decode_trigger(self.registers.CTR2.read())
    }

    pub fn set_data_handling(&mut self, handling: &DataHandling) -> Result<()> {
        self.expect_direct_idle()?;
        let ch = self.registers;
        let ctr1 = ch.CTR1.read() & !DATA_HANDLING_MASK;
        ch.CTR1.write(ctr1 | encode_data_handling(handling));
        Ok(())
    }

    pub fn reset_data_handling(&mut self) -> Result<()> {
        self.set_data_handling(&DataHandling::default())
    }

    pub fn data_handling(&self) -> DataHandling {
        decode_data_handling(self.registers.CTR1.read())
    }

    /// Set the 2D addressing parameters
    ///
    /// Only channels 12 through 15 accept this.
    pub fn set_repeat_block(&mut self, repeat: &RepeatBlock) -> Result<()> {
        repeat.check()?;
        self.expect_2d()?;
        self.expect_direct_idle()?;
        let ch = self.registers;
        let cbr1 = ch.CBR1.read() & ch::CBR1::BNDT::mask;
        ch.CBR1.write(cbr1 | encode_cbr1_repeat(repeat));
        ral::write_reg!(crate::ral::gpdma::ch, ch, CTR3, encode_ctr3(repeat));
        ral::write_reg!(crate::ral::gpdma::ch, ch, CBR2, encode_cbr2(repeat));
        ral::modify_reg!(crate::ral::gpdma::ch, ch, CTR2, TCEM: repeat.event_mode.raw());
        Ok(())
    }

    pub fn reset_repeat_block(&mut self) -> Result<()> {
        self.set_repeat_block(&RepeatBlock::default())
    }

    /// Returns the 2D addressing parameters, or `None` on a linear channel
    pub fn repeat_block(&self) -> Option<RepeatBlock> {
        if !self.is_2d() {
            return None;
        }
        let ch = self.registers;
        let (brc, sdec, ddec, brsdec, brddec) =
            ral::read_reg!(crate::ral::gpdma::ch, ch, CBR1, BRC, SDEC, DDEC, BRSDEC, BRDDEC);
        let (sao, dao) = ral::read_reg!(crate::ral::gpdma::ch, ch, CTR3, SAO, DAO);
        let (brsao, brdao) = ral::read_reg!(crate::ral::gpdma::ch, ch, CBR2, BRSAO, BRDAO);
        let tcem = ral::read_reg!(crate::ral::gpdma::ch, ch, CTR2, TCEM);
        Some(RepeatBlock {
            block_count: brc as u16 + 1,
            burst_src_offset: sao as u16,
            burst_dst_offset: dao as u16,
            block_src_offset: brsao as u16,
            block_dst_offset: brdao as u16,
            burst_src_step: Step::from_raw(sdec),
            burst_dst_step: Step::from_raw(ddec),
            block_src_step: Step::from_raw(brsdec),
            block_dst_step: Step::from_raw(brddec),
            event_mode: DirectEventMode::from_raw(tcem),
        })
    }

    /// Set the source and destination security attributes
    #[cfg(feature = "trustzone")]
    pub fn set_access_attributes(
        &mut self,
        src: SecurityAttribute,
        dst: SecurityAttribute,
    ) -> Result<()> {
        self.expect_direct_idle()?;
        let ch = self.registers;
        ral::modify_reg!(crate::ral::gpdma::ch, ch, CTR1, SSEC: src.raw(), DSEC: dst.raw());
        Ok(())
    }

    #[cfg(feature = "trustzone")]
    pub fn reset_access_attributes(&mut self) -> Result<()> {
        self.set_access_attributes(SecurityAttribute::NonSecure, SecurityAttribute::NonSecure)
    }

    /// Returns the (source, destination) security attributes
    #[cfg(feature = "trustzone")]
    pub fn access_attributes(&self) -> (SecurityAttribute, SecurityAttribute) {
        let ch = self.registers;
        let (ssec, dsec) = ral::read_reg!(crate::ral::gpdma::ch, ch, CTR1, SSEC, DSEC);
        (SecurityAttribute::from_raw(ssec), SecurityAttribute::from_raw(dsec))
    }

    //
    // Linked-list configuration
    //

    /// Configure the channel for linked-list transfers
    ///
    /// The channel must be in [`State::Init`] or [`State::Idle`]. On success,
    /// it's idle in [`TransferMode::LinkedListLinear`]. Starting a circular
    /// queue switches the mode to [`TransferMode::LinkedListCircular`].
    pub fn set_config_linked_list(&mut self, config: &LinkedListConfig) -> Result<()> {
        self.expect_state(&[State::Init, State::Idle])?;
        self.write_linked_list_config(config);
        self.mode = TransferMode::LinkedListLinear;
        self.state = State::Idle;
        Ok(())
    }

    fn write_linked_list_config(&self, config: &LinkedListConfig) {
        let ch = self.registers;
        ral::modify_reg!(
            crate::ral::gpdma::ch,
            ch,
            CCR,
            PRIO: config.priority.raw(),
            LAP: config.fetch_port.raw()
        );
        ral::modify_reg!(crate::ral::gpdma::ch, ch, CTR2, TCEM: config.event_mode.raw());
        ral::modify_reg!(crate::ral::gpdma::ch, ch, CBR1, BNDT: 0);
    }

    pub fn config_linked_list(&self) -> LinkedListConfig {
        LinkedListConfig {
            priority: self.priority(),
            fetch_port: self.linked_list_fetch_port(),
            event_mode: self.linked_list_event_mode(),
        }
    }

    pub fn set_linked_list_event_mode(&mut self, mode: LinkedListEventMode) -> Result<()> {
        self.expect_linked_list_idle()?;
        let ch = self.registers;
        ral::modify_reg!(crate::ral::gpdma::ch, ch, CTR2, TCEM: mode.raw());
        Ok(())
    }

    pub fn reset_linked_list_event_mode(&mut self) -> Result<()> {
        self.set_linked_list_event_mode(LinkedListEventMode::Block)
    }

    pub fn linked_list_event_mode(&self) -> LinkedListEventMode {
        let ch = self.registers;
        LinkedListEventMode::from_raw(ral::read_reg!(crate::ral::gpdma::ch, ch, CTR2, TCEM))
    }

    /// Set the port that the channel uses to fetch nodes
    pub fn set_linked_list_fetch_port(&mut self, port: Port) -> Result<()> {
        self.expect_linked_list_idle()?;
        let ch = self.registers;
        ral::modify_reg!(crate::ral::gpdma::ch, ch, CCR, LAP: port.raw());
        Ok(())
    }

    pub fn reset_linked_list_fetch_port(&mut self) -> Result<()> {
        self.set_linked_list_fetch_port(Port::Port0)
    }

    pub fn linked_list_fetch_port(&self) -> Port {
        let ch = self.registers;
        Port::from_raw(ral::read_reg!(crate::ral::gpdma::ch, ch, CCR, LAP))
    }

    pub fn set_linked_list_priority(&mut self, priority: Priority) -> Result<()> {
        self.expect_linked_list_idle()?;
        let ch = self.registers;
        ral::modify_reg!(crate::ral::gpdma::ch, ch, CCR, PRIO: priority.raw());
        Ok(())
    }

    pub fn reset_linked_list_priority(&mut self) -> Result<()> {
        self.set_linked_list_priority(Priority::LowWeightLow)
    }

    pub fn priority(&self) -> Priority {
        let ch = self.registers;
        Priority::from_raw(ral::read_reg!(crate::ral::gpdma::ch, ch, CCR, PRIO))
    }

    pub fn set_linked_list_execution_mode(&mut self, mode: ExecutionMode) -> Result<()> {
        self.expect_linked_list_idle()?;
        let ch = self.registers;
        ral::modify_reg!(crate::ral::gpdma::ch, ch, CCR, LSM: mode.raw());
        Ok(())
    }

    pub fn reset_linked_list_execution_mode(&mut self) -> Result<()> {
        self.set_linked_list_execution_mode(ExecutionMode::Queue)
    }

    pub fn linked_list_execution_mode(&self) -> ExecutionMode {
        let ch = self.registers;
        ExecutionMode::from_raw(ral::read_reg!(crate::ral::gpdma::ch, ch, CCR, LSM))
    }

    //
    // Peripheral circular transfers
    //

    /// Configure a circular peripheral transfer through a single node
    ///
    /// The node is filled from `config` and linked to itself. Keep it in
    /// place, and hand it to [`start_periph_it`](Channel::start_periph_it)
    /// to start each transfer.
    pub fn set_config_periph_circular(
        &mut self,
        node: &mut Node,
        config: &DirectConfig,
    ) -> Result<()> {
        config.check()?;
        self.expect_state(&[State::Init, State::Idle])?;

        *node = Node::fill_direct(self.node_kind(), config, LinkedListEventMode::Block)?;
        let address = node.address();
        node.set_link((address & LINK_ADDRESS) | self.node_kind().update_all());

        self.write_linked_list_config(&LinkedListConfig {
            priority: config.priority,
            fetch_port: Port::Port0,
            event_mode: LinkedListEventMode::Queue,
        });
        self.head = Some(address);
        self.mode = TransferMode::LinkedListCircular;
        self.state = State::Idle;
        Ok(())
    }

    /// Read back the circular peripheral configuration from `node`
    pub fn config_periph_circular(&self, node: &Node) -> DirectConfig {
        DirectConfig {
            priority: self.priority(),
            ..node.direct_config()
        }
    }
}

/// SWREQ, DREQ and BREQ. A new direct configuration always starts with
/// burst requests.
const DIRECTION_MASK: u32 = ch::CTR2::SWREQ::mask | ch::CTR2::DREQ::mask | ch::CTR2::BREQ::mask;

const TRIGGER_MASK: u32 =
    ch::CTR2::TRIGM::mask | ch::CTR2::TRIGPOL::mask | ch::CTR2::TRIGSEL::mask;

const DATA_HANDLING_MASK: u32 = ch::CTR1::SBX::mask
    | ch::CTR1::DBX::mask
    | ch::CTR1::DHX::mask
    | ch::CTR1::PAM_0::mask
    | ch::CTR1::PAM_1::mask;

// It's OK to send a channel across an execution context.
// They can't be cloned or copied, so there's no chance of
// them being (mutably) shared.
unsafe impl<T: Send> Send for Channel<T> {}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::{Direction, TriggerMode, TriggerPolarity, TriggerSource};
    use crate::ral::mock::{self, Gpdma};
    use crate::tick::sim::SimClock;

    pub(crate) fn channel<T: Tick>(gpdma: &Gpdma, index: usize, tick: T) -> Channel<T> {
        // Safety: the mock outlives the channel in every test.
        unsafe { Channel::from_address(gpdma.registers(), index, tick) }
    }

    pub(crate) fn m2m() -> DirectConfig {
        DirectConfig {
            src_width: DataWidth::Word,
            dst_width: DataWidth::Word,
            priority: Priority::High,
            ..DirectConfig::default()
        }
    }

    pub(crate) fn m2p(request: u8) -> DirectConfig {
        DirectConfig {
            request: Request::Peripheral(request),
            direction: Direction::MemoryToPeripheral,
            src_increment: Increment::Incremented,
            dst_increment: Increment::Fixed,
            src_width: DataWidth::Byte,
            dst_width: DataWidth::Byte,
            priority: Priority::LowWeightMid,
        }
    }

    #[test]
    #[should_panic]
    fn index_out_of_range() {
        let gpdma = Gpdma::new();
        channel(&gpdma, CHANNEL_COUNT, SimClock::new());
    }

    #[test]
    fn lifecycle() {
        let gpdma = Gpdma::new();
        let mut chan = channel(&gpdma, 3, SimClock::new());
        assert_eq!(chan.state(), State::Reset);
        assert_eq!(chan.set_config_direct(&m2m()), Err(Error::InvalidParameter));

        chan.init().unwrap();
        assert_eq!(chan.state(), State::Init);
        assert_eq!(chan.init(), Err(Error::InvalidParameter));

        chan.set_config_direct(&m2m()).unwrap();
        assert_eq!(chan.state(), State::Idle);
        assert_eq!(chan.mode(), TransferMode::Direct);

        chan.deinit();
        assert_eq!(chan.state(), State::Reset);
        assert_eq!(gpdma.read(3, mock::CCR), 0);
        assert_eq!(gpdma.read(3, mock::CTR1), 0);
        assert_eq!(gpdma.read(3, mock::CFCR), ch::FLAGS_ALL);
    }

    #[test]
    fn deinit_clears_2d_registers() {
        let gpdma = Gpdma::new();
        gpdma.write(12, mock::CTR3, 0xAAAA);
        gpdma.write(12, mock::CBR2, 0x5555);
        gpdma.write(11, mock::CTR3, 0xAAAA);
        channel(&gpdma, 12, SimClock::new()).deinit();
        channel(&gpdma, 11, SimClock::new()).deinit();
        assert_eq!(gpdma.read(12, mock::CTR3), 0);
        assert_eq!(gpdma.read(12, mock::CBR2), 0);
        // Linear channels don't implement CTR3.
        assert_eq!(gpdma.read(11, mock::CTR3), 0xAAAA);
    }

    #[test]
    fn direct_config_registers() {
        let gpdma = Gpdma::new();
        let mut chan = channel(&gpdma, 0, SimClock::new());
        chan.init().unwrap();
        chan.set_config_direct(&m2p(0x15)).unwrap();

        let ctr2 = gpdma.read(0, mock::CTR2);
        assert_eq!(ctr2 & ch::CTR2::REQSEL::mask, 0x15);
        assert_ne!(ctr2 & ch::CTR2::DREQ::mask, 0);
        assert_eq!(ctr2 & ch::CTR2::SWREQ::mask, 0);
        assert_eq!(chan.config_direct(), m2p(0x15));

        chan.set_config_direct(&m2m()).unwrap();
        let ctr2 = gpdma.read(0, mock::CTR2);
        assert_ne!(ctr2 & ch::CTR2::SWREQ::mask, 0);
        assert_eq!(ctr2 & ch::CTR2::DREQ::mask, 0);
        assert_eq!(chan.config_direct(), m2m());
    }

    #[test]
    fn direct_config_rejects_mismatched_request() {
        let gpdma = Gpdma::new();
        let mut chan = channel(&gpdma, 0, SimClock::new());
        chan.init().unwrap();
        let config = DirectConfig {
            request: Request::Peripheral(3),
            ..m2m()
        };
        assert_eq!(chan.set_config_direct(&config), Err(Error::InvalidParameter));
        assert_eq!(chan.state(), State::Init);
    }

    #[test]
    fn direct_sub_settings() {
        let gpdma = Gpdma::new();
        let mut chan = channel(&gpdma, 1, SimClock::new());
        chan.init().unwrap();
        assert_eq!(chan.set_burst(4, 4), Err(Error::InvalidParameter));
        chan.set_config_direct(&m2m()).unwrap();

        chan.set_hardware_request_mode(HardwareRequestMode::Block).unwrap();
        assert_eq!(chan.hardware_request_mode(), HardwareRequestMode::Block);
        chan.reset_hardware_request_mode().unwrap();
        assert_eq!(chan.hardware_request_mode(), HardwareRequestMode::Burst);

        chan.set_ports(Port::Port1, Port::Port0).unwrap();
        assert_eq!(chan.ports(), (Port::Port1, Port::Port0));
        chan.reset_ports().unwrap();
        assert_eq!(chan.ports(), (Port::Port0, Port::Port0));

        chan.set_burst(16, 64).unwrap();
        assert_eq!(chan.burst(), (16, 64));
        assert_eq!(chan.set_burst(0, 4), Err(Error::InvalidParameter));
        assert_eq!(chan.set_burst(4, 65), Err(Error::InvalidParameter));
        chan.reset_burst().unwrap();
        assert_eq!(chan.burst(), (1, 1));

        let trigger = TriggerConfig {
            source: TriggerSource(0x21),
            polarity: TriggerPolarity::Falling,
            mode: TriggerMode::Node,
        };
        chan.set_trigger(&trigger).unwrap();
        assert_eq!(chan.trigger(), trigger);
        assert_eq!(
            chan.set_trigger(&TriggerConfig {
                source: TriggerSource(0x40),
                ..trigger
            }),
            Err(Error::InvalidParameter)
        );
        chan.reset_trigger().unwrap();
        assert_eq!(chan.trigger(), TriggerConfig::default());

        let handling = DataHandling {
            dst_halfword_exchange: true,
            pack: true,
            ..DataHandling::default()
        };
        chan.set_data_handling(&handling).unwrap();
        assert_eq!(chan.data_handling(), handling);
        chan.reset_data_handling().unwrap();
        assert_eq!(chan.data_handling(), DataHandling::default());

        // The sub-settings kept the base configuration.
        assert_eq!(chan.config_direct(), m2m());
    }

    #[test]
    fn direct_sub_settings_need_direct_mode() {
        let gpdma = Gpdma::new();
        let mut chan = channel(&gpdma, 1, SimClock::new());
        chan.init().unwrap();
        chan.set_config_linked_list(&LinkedListConfig::default()).unwrap();
        assert_eq!(chan.set_ports(Port::Port1, Port::Port1), Err(Error::InvalidParameter));
        assert_eq!(
            chan.set_hardware_request_mode(HardwareRequestMode::Block),
            Err(Error::InvalidParameter)
        );
    }

    #[test]
    fn repeat_block_on_2d_channel() {
        let gpdma = Gpdma::new();
        let repeat = RepeatBlock {
            block_count: 10,
            burst_src_offset: 4,
            burst_dst_offset: 8,
            block_src_offset: 0x100,
            block_dst_offset: 0x200,
            burst_src_step: Step::Increment,
            burst_dst_step: Step::Decrement,
            block_src_step: Step::Decrement,
            block_dst_step: Step::Increment,
            event_mode: DirectEventMode::RepeatedBlock,
        };

        let mut linear = channel(&gpdma, 11, SimClock::new());
        linear.init().unwrap();
        linear.set_config_direct(&m2m()).unwrap();
        assert_eq!(linear.set_repeat_block(&repeat), Err(Error::InvalidParameter));
        assert_eq!(linear.repeat_block(), None);

        let mut chan = channel(&gpdma, 12, SimClock::new());
        chan.init().unwrap();
        chan.set_config_direct(&m2m()).unwrap();
        chan.set_repeat_block(&repeat).unwrap();
        assert_eq!(chan.repeat_block(), Some(repeat));
        assert_eq!(gpdma.read(12, mock::CTR3), 4 | (8 << 16));
        assert_eq!(gpdma.read(12, mock::CBR2), 0x100 | (0x200 << 16));

        assert_eq!(
            chan.set_repeat_block(&RepeatBlock {
                block_count: 0,
                ..repeat
            }),
            Err(Error::InvalidParameter)
        );
        chan.reset_repeat_block().unwrap();
        assert_eq!(chan.repeat_block(), Some(RepeatBlock::default()));
    }

    #[test]
    fn linked_list_config() {
        let gpdma = Gpdma::new();
        let mut chan = channel(&gpdma, 5, SimClock::new());
        chan.init().unwrap();
        gpdma.write(5, mock::CBR1, 0x40);
        let config = LinkedListConfig {
            priority: Priority::LowWeightHigh,
            fetch_port: Port::Port1,
            event_mode: LinkedListEventMode::Node,
        };
        chan.set_config_linked_list(&config).unwrap();
        assert_eq!(chan.mode(), TransferMode::LinkedListLinear);
        assert_eq!(chan.state(), State::Idle);
        assert_eq!(chan.config_linked_list(), config);
        assert_eq!(gpdma.read(5, mock::CBR1), 0);

        chan.set_linked_list_execution_mode(ExecutionMode::Node).unwrap();
        assert_eq!(chan.linked_list_execution_mode(), ExecutionMode::Node);
        chan.reset_linked_list_execution_mode().unwrap();
        assert_eq!(chan.linked_list_execution_mode(), ExecutionMode::Queue);

        chan.reset_linked_list_priority().unwrap();
        chan.reset_linked_list_fetch_port().unwrap();
        chan.reset_linked_list_event_mode().unwrap();
        assert_eq!(chan.config_linked_list(), LinkedListConfig::default());

        chan.set_config_direct(&m2m()).unwrap();
        assert_eq!(
            chan.set_linked_list_priority(Priority::High),
            Err(Error::InvalidParameter)
        );
    }

    #[test]
    fn periph_direct_config() {
        let gpdma = Gpdma::new();
        let mut chan = channel(&gpdma, 5, SimClock::new());
        chan.init().unwrap();
        chan.set_config_periph_direct(&m2p(0x15)).unwrap();
        assert_eq!(chan.mode(), TransferMode::Direct);
        assert_eq!(chan.state(), State::Idle);
        assert_eq!(chan.config_periph_direct(), m2p(0x15));
        assert_eq!(chan.config_periph_direct(), chan.config_direct());
    }

    #[test]
    fn periph_circular_config() {
        #[repr(align(64))]
        struct Aligned(Node);

        let gpdma = Gpdma::new();
        let mut chan = channel(&gpdma, 2, SimClock::new());
        chan.init().unwrap();
        let mut storage = Aligned(Node::default());
        chan.set_config_periph_circular(&mut storage.0, &m2p(7)).unwrap();

        let node = &storage.0;
        assert_eq!(chan.mode(), TransferMode::LinkedListCircular);
        assert_eq!(chan.state(), State::Idle);
        assert_eq!(node.kind(), NodeKind::Linear);
        assert_eq!(
            node.link(),
            (node.address() & LINK_ADDRESS) | NodeKind::Linear.update_all()
        );
        assert_eq!(chan.linked_list_event_mode(), LinkedListEventMode::Queue);
        assert_eq!(chan.config_periph_circular(node), m2p(7));
        assert_eq!(chan.linked_list_head(), Some(node.address()));
    }

    #[test]
    fn user_data() {
        let gpdma = Gpdma::new();
        let mut chan = channel(&gpdma, 0, SimClock::new());
        let value = 7u32;
        chan.set_user_data(&value as *const u32 as *const ());
        assert_eq!(chan.user_data(), &value as *const u32 as *const ());
        chan.init().unwrap();
        assert!(chan.user_data().is_null());
    }
}
