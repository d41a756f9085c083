//! Linked-list nodes
//!
//! A node is the register image that the channel loads when it follows a
//! link. The image holds CTR1, CTR2, CBR1, CSAR and CDAR, then CTR3 and CBR2
//! for 2D nodes, and the link (CLLR) last.
//!
//! A *static* node holds every word. Inside a dynamic queue (see
//! [`Queue::convert_to_dynamic`](crate::Queue::convert_to_dynamic)) a node
//! only holds the words that the previous link asks the hardware to load,
//! packed in register order.

use crate::config::{
    check_burst, DataHandling, DataWidth, Direction, DirectConfig, HardwareRequestMode, Increment,
    LinkedListEventMode, NodeConfig, Port, Priority, RepeatBlock, Request, SecurityAttribute, Step,
    TriggerConfig, TriggerMode, TriggerPolarity, TriggerSource, TruncPad, DirectEventMode,
    MAX_BLOCK_SIZE,
};
use crate::ral::gpdma::ch::{CBR1, CBR2, CLLR, CTR1, CTR2, CTR3};
use crate::ral::gpdma::FIRST_2D_CHANNEL;
use crate::{Error, Result};

/// Shift a value into a field of a register image
macro_rules! put {
    ($reg:ident::$field:ident, $value:expr) => {
        (($value as u32) << $reg::$field::offset) & $reg::$field::mask
    };
}

/// Extract a field from a register image
macro_rules! get {
    ($word:expr, $reg:ident::$field:ident) => {
        ($word & $reg::$field::mask) >> $reg::$field::offset
    };
}

pub(crate) const CTR1_IDX: usize = 0;
pub(crate) const CTR2_IDX: usize = 1;
pub(crate) const CBR1_IDX: usize = 2;
/// Source address. Dynamic conversion never drops this word.
pub(crate) const CSAR_IDX: usize = 3;
pub(crate) const CDAR_IDX: usize = 4;
pub(crate) const CTR3_IDX: usize = 5;
pub(crate) const CBR2_IDX: usize = 6;

/// Link address bits of a link word
pub(crate) const LINK_ADDRESS: u32 = CLLR::LA::mask;

/// Update bits, indexed by register position. The link's own bit (ULL)
/// is handled by [`update_bit`].
const UPDATE_BITS: [u32; 7] = [
    CLLR::UT1::mask,
    CLLR::UT2::mask,
    CLLR::UB1::mask,
    CLLR::USA::mask,
    CLLR::UDA::mask,
    CLLR::UT3::mask,
    CLLR::UB2::mask,
];

/// Update bits that reload every register of a linear node
pub const UPDATE_LINEAR: u32 = CLLR::UT1::mask
    | CLLR::UT2::mask
    | CLLR::UB1::mask
    | CLLR::USA::mask
    | CLLR::UDA::mask
    | CLLR::ULL::mask;

/// Update bits that reload every register of a 2D node
pub const UPDATE_ALL: u32 = UPDATE_LINEAR | CLLR::UT3::mask | CLLR::UB2::mask;

/// The addressing layout of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NodeKind {
    /// Five transfer registers plus the link
    Linear,
    /// Seven transfer registers (adds CTR3 and CBR2) plus the link
    TwoD,
}

impl NodeKind {
    /// The node kind that suits `channel`
    ///
    /// Channels 12 through 15 support 2D addressing.
    pub const fn for_channel(channel: usize) -> Self {
        if channel >= FIRST_2D_CHANNEL {
            NodeKind::TwoD
        } else {
            NodeKind::Linear
        }
    }

    /// Number of words in a static node, link included
    pub const fn word_count(self) -> usize {
        match self {
            NodeKind::Linear => 6,
            NodeKind::TwoD => 8,
        }
    }

    /// Index of the link word in a static node
    pub const fn link_index(self) -> usize {
        self.word_count() - 1
    }

    /// Update bits that reload a full node of this kind
    pub const fn update_all(self) -> u32 {
        match self {
            NodeKind::Linear => UPDATE_LINEAR,
            NodeKind::TwoD => UPDATE_ALL,
        }
    }
}

/// The update bit for the register at `idx` of a static `kind` node
pub(crate) const fn update_bit(kind: NodeKind, idx: usize) -> u32 {
    if idx == kind.link_index() {
        CLLR::ULL::mask
    } else {
        UPDATE_BITS[idx]
    }
}

/// A linked-list node
///
/// The DMA controller reads the register words directly out of the node,
/// so a node that's part of a running transfer must stay put in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node {
    Linear([u32; 6]),
    TwoD([u32; 8]),
}

impl Default for Node {
    fn default() -> Self {
        Node::new(NodeKind::Linear)
    }
}

impl Node {
    /// A zeroed node of the given kind
    pub const fn new(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Linear => Node::Linear([0; 6]),
            NodeKind::TwoD => Node::TwoD([0; 8]),
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Linear(_) => NodeKind::Linear,
            Node::TwoD(_) => NodeKind::TwoD,
        }
    }

    /// The raw register words
    pub fn words(&self) -> &[u32] {
        match self {
            Node::Linear(words) => words,
            Node::TwoD(words) => words,
        }
    }

    pub(crate) fn words_mut(&mut self) -> &mut [u32] {
        match self {
            Node::Linear(words) => words,
            Node::TwoD(words) => words,
        }
    }

    /// The bus address that the controller fetches this node from
    pub fn address(&self) -> u32 {
        self.words().as_ptr() as usize as u32
    }

    /// The link word of a static node
    pub fn link(&self) -> u32 {
        self.words()[self.kind().link_index()]
    }

    pub(crate) fn set_link(&mut self, link: u32) {
        let idx = self.kind().link_index();
        self.words_mut()[idx] = link;
    }

    /// Build a node from a complete node description
    ///
    /// Block-level fields (`repeat_block`, apart from its event mode) are only
    /// encoded in 2D nodes. The link is cleared. Returns
    /// [`Error::InvalidParameter`] if a field is out of range.
    pub fn fill(kind: NodeKind, config: &NodeConfig) -> Result<Self> {
        config.check()?;
        let mut node = Node::new(kind);
        let words = node.words_mut();
        words[CTR1_IDX] = encode_ctr1(config);
        words[CTR2_IDX] = encode_ctr2(config);
        words[CBR1_IDX] = put!(CBR1::BNDT, config.size);
        words[CSAR_IDX] = config.src_address;
        words[CDAR_IDX] = config.dst_address;
        if kind == NodeKind::TwoD {
            words[CBR1_IDX] |= encode_cbr1_repeat(&config.repeat_block);
            words[CTR3_IDX] = encode_ctr3(&config.repeat_block);
            words[CBR2_IDX] = encode_cbr2(&config.repeat_block);
        }
        Ok(node)
    }

    /// Decode a static node
    ///
    /// Decoding never fails. Any bit pattern maps to *some* configuration.
    pub fn config(&self) -> NodeConfig {
        let words = self.words();
        let ctr1 = words[CTR1_IDX];
        let ctr2 = words[CTR2_IDX];
        let cbr1 = words[CBR1_IDX];

        let (request, direction) = decode_request(ctr2);
        let repeat_block = self.repeat_block().unwrap_or_default();

        NodeConfig {
            transfer: DirectConfig {
                request,
                direction,
                src_increment: Increment::from_raw(get!(ctr1, CTR1::SINC)),
                dst_increment: Increment::from_raw(get!(ctr1, CTR1::DINC)),
                src_width: DataWidth::from_raw(get!(ctr1, CTR1::SDW_LOG2)),
                dst_width: DataWidth::from_raw(get!(ctr1, CTR1::DDW_LOG2)),
                priority: Priority::LowWeightLow,
            },
            hardware_request_mode: HardwareRequestMode::from_raw(get!(ctr2, CTR2::BREQ)),
            src_port: Port::from_raw(get!(ctr1, CTR1::SAP)),
            dst_port: Port::from_raw(get!(ctr1, CTR1::DAP)),
            src_burst: get!(ctr1, CTR1::SBL_1) as u8 + 1,
            dst_burst: get!(ctr1, CTR1::DBL_1) as u8 + 1,
            event_mode: LinkedListEventMode::from_raw(get!(ctr2, CTR2::TCEM)),
            trigger: decode_trigger(ctr2),
            data_handling: decode_data_handling(ctr1),
            repeat_block,
            src_address: words[CSAR_IDX],
            dst_address: words[CDAR_IDX],
            size: get!(cbr1, CBR1::BNDT),
            src_security: SecurityAttribute::from_raw(get!(ctr1, CTR1::SSEC)),
            dst_security: SecurityAttribute::from_raw(get!(ctr1, CTR1::DSEC)),
        }
    }

    /// Build a node for a peripheral transfer from a direct configuration
    ///
    /// Everything the direct configuration doesn't cover takes a fixed
    /// value:
    /// - burst hardware requests;
    /// - source on port 0, destination on port 1;
    /// - single-byte bursts;
    /// - masked EXTI0 trigger in single-burst mode;
    /// - data preserved, one block, every address incremented;
    /// - zero addresses and size.
    pub fn fill_direct(
        kind: NodeKind,
        config: &DirectConfig,
        event_mode: LinkedListEventMode,
    ) -> Result<Self> {
        let node_config = NodeConfig {
            transfer: *config,
            hardware_request_mode: HardwareRequestMode::Burst,
            src_port: Port::Port0,
            dst_port: Port::Port1,
            src_burst: 1,
            dst_burst: 1,
            event_mode,
            trigger: TriggerConfig {
                source: TriggerSource::EXTI0,
                polarity: TriggerPolarity::Masked,
                mode: TriggerMode::SingleBurst,
            },
            data_handling: DataHandling::default(),
            repeat_block: RepeatBlock::default(),
            src_address: 0,
            dst_address: 0,
            size: 0,
            src_security: SecurityAttribute::NonSecure,
            dst_security: SecurityAttribute::NonSecure,
        };
        Node::fill(kind, &node_config)
    }

    /// The direct configuration part of this node
    pub fn direct_config(&self) -> DirectConfig {
        self.config().transfer
    }

    pub fn set_hardware_request_mode(&mut self, mode: HardwareRequestMode) {
        let ctr2 = &mut self.words_mut()[CTR2_IDX];
        *ctr2 = (*ctr2 & !CTR2::BREQ::mask) | put!(CTR2::BREQ, mode.raw());
    }

    pub fn hardware_request_mode(&self) -> HardwareRequestMode {
        HardwareRequestMode::from_raw(get!(self.words()[CTR2_IDX], CTR2::BREQ))
    }

    pub fn set_ports(&mut self, src: Port, dst: Port) {
        let ctr1 = &mut self.words_mut()[CTR1_IDX];
        *ctr1 = (*ctr1 & !(CTR1::SAP::mask | CTR1::DAP::mask))
            | put!(CTR1::SAP, src.raw())
            | put!(CTR1::DAP, dst.raw());
    }

    /// Returns the (source, destination) ports
    pub fn ports(&self) -> (Port, Port) {
        let ctr1 = self.words()[CTR1_IDX];
        (
            Port::from_raw(get!(ctr1, CTR1::SAP)),
            Port::from_raw(get!(ctr1, CTR1::DAP)),
        )
    }

    /// Set the burst lengths, in bytes
    pub fn set_burst(&mut self, src: u8, dst: u8) -> Result<()> {
        check_burst(src, dst)?;
        let ctr1 = &mut self.words_mut()[CTR1_IDX];
        *ctr1 = (*ctr1 & !(CTR1::SBL_1::mask | CTR1::DBL_1::mask))
            | put!(CTR1::SBL_1, src - 1)
            | put!(CTR1::DBL_1, dst - 1);
        Ok(())
    }

    /// Returns the (source, destination) burst lengths, in bytes
    pub fn burst(&self) -> (u8, u8) {
        let ctr1 = self.words()[CTR1_IDX];
        (
            get!(ctr1, CTR1::SBL_1) as u8 + 1,
            get!(ctr1, CTR1::DBL_1) as u8 + 1,
        )
    }

    pub fn set_event_mode(&mut self, mode: LinkedListEventMode) {
        let ctr2 = &mut self.words_mut()[CTR2_IDX];
        *ctr2 = (*ctr2 & !CTR2::TCEM::mask) | put!(CTR2::TCEM, mode.raw());
    }

    pub fn event_mode(&self) -> LinkedListEventMode {
        LinkedListEventMode::from_raw(get!(self.words()[CTR2_IDX], CTR2::TCEM))
    }

    pub fn set_trigger(&mut self, trigger: &TriggerConfig) -> Result<()> {
        trigger.check()?;
        let ctr2 = &mut self.words_mut()[CTR2_IDX];
        *ctr2 = (*ctr2 & !(CTR2::TRIGM::mask | CTR2::TRIGPOL::mask | CTR2::TRIGSEL::mask))
            | encode_trigger(trigger);
        Ok(())
    }

    pub fn trigger(&self) -> TriggerConfig {
        decode_trigger(self.words()[CTR2_IDX])
    }

    pub fn set_data_handling(&mut self, handling: &DataHandling) {
        let ctr1 = &mut self.words_mut()[CTR1_IDX];
        *ctr1 = (*ctr1 & !DATA_HANDLING_MASK) | encode_data_handling(handling);
    }

    pub fn data_handling(&self) -> DataHandling {
        decode_data_handling(self.words()[CTR1_IDX])
    }

    /// Set the 2D addressing parameters
    ///
    /// Returns [`Error::InvalidParameter`] for linear nodes.
    pub fn set_repeat_block(&mut self, repeat: &RepeatBlock) -> Result<()> {
        repeat.check()?;
        let Node::TwoD(words) = self else {
            return Err(Error::InvalidParameter);
        };
        words[CBR1_IDX] = (words[CBR1_IDX] & CBR1::BNDT::mask) | encode_cbr1_repeat(repeat);
        words[CTR3_IDX] = encode_ctr3(repeat);
        words[CBR2_IDX] = encode_cbr2(repeat);
        Ok(())
    }

    /// Returns the 2D addressing parameters, or `None` for linear nodes
    ///
    /// The event mode is always `Block`. A node's event mode is described by
    /// [`event_mode`](Node::event_mode).
    pub fn repeat_block(&self) -> Option<RepeatBlock> {
        let Node::TwoD(words) = self else {
            return None;
        };
        let cbr1 = words[CBR1_IDX];
        let ctr3 = words[CTR3_IDX];
        let cbr2 = words[CBR2_IDX];
        Some(RepeatBlock {
            block_count: get!(cbr1, CBR1::BRC) as u16 + 1,
            burst_src_offset: get!(ctr3, CTR3::SAO) as u16,
            burst_dst_offset: get!(ctr3, CTR3::DAO) as u16,
            block_src_offset: get!(cbr2, CBR2::BRSAO) as u16,
            block_dst_offset: get!(cbr2, CBR2::BRDAO) as u16,
            burst_src_step: Step::from_raw(get!(cbr1, CBR1::SDEC)),
            burst_dst_step: Step::from_raw(get!(cbr1, CBR1::DDEC)),
            block_src_step: Step::from_raw(get!(cbr1, CBR1::BRSDEC)),
            block_dst_step: Step::from_raw(get!(cbr1, CBR1::BRDDEC)),
            event_mode: DirectEventMode::Block,
        })
    }

    /// Set the source and destination security attributes
    #[cfg(feature = "trustzone")]
    pub fn set_access_attributes(&mut self, src: SecurityAttribute, dst: SecurityAttribute) {
        let ctr1 = &mut self.words_mut()[CTR1_IDX];
        *ctr1 = (*ctr1 & !(CTR1::SSEC::mask | CTR1::DSEC::mask))
            | put!(CTR1::SSEC, src.raw())
            | put!(CTR1::DSEC, dst.raw());
    }

    /// Returns the (source, destination) security attributes
    #[cfg(feature = "trustzone")]
    pub fn access_attributes(&self) -> (SecurityAttribute, SecurityAttribute) {
        let ctr1 = self.words()[CTR1_IDX];
        (
            SecurityAttribute::from_raw(get!(ctr1, CTR1::SSEC)),
            SecurityAttribute::from_raw(get!(ctr1, CTR1::DSEC)),
        )
    }

    /// Set the addresses and the block size
    ///
    /// `size` must be within `1..=0xFFFF` bytes.
    pub fn set_data(&mut self, src_address: u32, dst_address: u32, size: u32) -> Result<()> {
        if size == 0 || size > MAX_BLOCK_SIZE {
            return Err(Error::InvalidParameter);
        }
        self.update_data(src_address, dst_address, size);
        Ok(())
    }

    /// Overwrite addresses and size without touching any other CBR1 field
    pub(crate) fn update_data(&mut self, src_address: u32, dst_address: u32, size: u32) {
        let words = self.words_mut();
        words[CBR1_IDX] = (words[CBR1_IDX] & !CBR1::BNDT::mask) | put!(CBR1::BNDT, size);
        words[CSAR_IDX] = src_address;
        words[CDAR_IDX] = dst_address;
    }

    /// Returns (source address, destination address, size)
    pub fn data(&self) -> (u32, u32, u32) {
        let words = self.words();
        (
            words[CSAR_IDX],
            words[CDAR_IDX],
            get!(words[CBR1_IDX], CBR1::BNDT),
        )
    }
}

const DATA_HANDLING_MASK: u32 = CTR1::SBX::mask
    | CTR1::DBX::mask
    | CTR1::DHX::mask
    | CTR1::PAM_0::mask
    | CTR1::PAM_1::mask;

fn encode_ctr1(config: &NodeConfig) -> u32 {
    let transfer = &config.transfer;
    put!(CTR1::SDW_LOG2, transfer.src_width.raw())
        | put!(CTR1::SINC, transfer.src_increment.raw())
        | put!(CTR1::SBL_1, config.src_burst - 1)
        | put!(CTR1::SAP, config.src_port.raw())
        | put!(CTR1::SSEC, config.src_security.raw())
        | put!(CTR1::DDW_LOG2, transfer.dst_width.raw())
        | put!(CTR1::DINC, transfer.dst_increment.raw())
        | put!(CTR1::DBL_1, config.dst_burst - 1)
        | put!(CTR1::DAP, config.dst_port.raw())
        | put!(CTR1::DSEC, config.dst_security.raw())
        | encode_data_handling(&config.data_handling)
}

pub(crate) fn encode_data_handling(handling: &DataHandling) -> u32 {
    put!(CTR1::SBX, handling.src_byte_exchange)
        | put!(CTR1::DBX, handling.dst_byte_exchange)
        | put!(CTR1::DHX, handling.dst_halfword_exchange)
        | put!(CTR1::PAM_0, handling.trunc_pad.raw())
        | put!(CTR1::PAM_1, handling.pack)
}

pub(crate) fn decode_data_handling(ctr1: u32) -> DataHandling {
    DataHandling {
        src_byte_exchange: get!(ctr1, CTR1::SBX) != 0,
        dst_byte_exchange: get!(ctr1, CTR1::DBX) != 0,
        dst_halfword_exchange: get!(ctr1, CTR1::DHX) != 0,
        trunc_pad: TruncPad::from_raw(get!(ctr1, CTR1::PAM_0)),
        pack: get!(ctr1, CTR1::PAM_1) != 0,
    }
}

/// SWREQ and DREQ bits for a direction
pub(crate) fn encode_direction(direction: Direction) -> u32 {
    match direction {
        Direction::MemoryToMemory => CTR2::SWREQ::mask,
        Direction::PeripheralToMemory => 0,
        Direction::MemoryToPeripheral => CTR2::DREQ::mask,
    }
}

pub(crate) fn decode_request(ctr2: u32) -> (Request, Direction) {
    if get!(ctr2, CTR2::SWREQ) != 0 {
        (Request::Software, Direction::MemoryToMemory)
    } else {
        let request = Request::Peripheral(get!(ctr2, CTR2::REQSEL) as u8);
        if get!(ctr2, CTR2::DREQ) != 0 {
            (request, Direction::MemoryToPeripheral)
        } else {
            (request, Direction::PeripheralToMemory)
        }
    }
}

fn encode_ctr2(config: &NodeConfig) -> u32 {
    let request = match config.transfer.request {
        Request::Software => 0,
        Request::Peripheral(sel) => put!(CTR2::REQSEL, sel),
    };
    request
        | encode_direction(config.transfer.direction)
        | put!(CTR2::BREQ, config.hardware_request_mode.raw())
        | put!(CTR2::TCEM, config.event_mode.raw())
        | encode_trigger(&config.trigger)
}

pub(crate) fn encode_trigger(trigger: &TriggerConfig) -> u32 {
    put!(CTR2::TRIGM, trigger.mode.raw())
        | put!(CTR2::TRIGPOL, trigger.polarity.raw())
        | put!(CTR2::TRIGSEL, trigger.source.0)
}

pub(crate) fn decode_trigger(ctr2: u32) -> TriggerConfig {
    TriggerConfig {
        source: TriggerSource(get!(ctr2, CTR2::TRIGSEL) as u8),
        polarity: TriggerPolarity::from_raw(get!(ctr2, CTR2::TRIGPOL)),
        mode: TriggerMode::from_raw(get!(ctr2, CTR2::TRIGM)),
    }
}

/// CBR1 fields other than BNDT
pub(crate) fn encode_cbr1_repeat(repeat: &RepeatBlock) -> u32 {
    put!(CBR1::BRC, repeat.block_count - 1)
        | put!(CBR1::SDEC, repeat.burst_src_step.raw())
        | put!(CBR1::DDEC, repeat.burst_dst_step.raw())
        | put!(CBR1::BRSDEC, repeat.block_src_step.raw())
        | put!(CBR1::BRDDEC, repeat.block_dst_step.raw())
}

pub(crate) fn encode_ctr3(repeat: &RepeatBlock) -> u32 {
    put!(CTR3::SAO, repeat.burst_src_offset) | put!(CTR3::DAO, repeat.burst_dst_offset)
}

pub(crate) fn encode_cbr2(repeat: &RepeatBlock) -> u32 {
    put!(CBR2::BRSAO, repeat.block_src_offset) | put!(CBR2::BRDAO, repeat.block_dst_offset)
}
