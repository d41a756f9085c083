//! Transfer configuration values
//!
//! These are plain values. The channel copies them into its registers
//! for direct transfers, and [`Node`](crate::Node) copies them into a node
//! image for linked-list transfers. Every `Default` matches the setting that
//! the matching `reset_*` method restores.

use crate::{Error, Result};

/// Generates `raw()` and a total `from_raw()` for a field enum
///
/// `from_raw` never fails. Reserved encodings decode to the listed
/// fallback variant.
macro_rules! field_enum {
    ($name:ident, fallback = $fallback:ident, { $($variant:ident = $raw:literal),+ $(,)? }) => {
        impl $name {
            /// Returns the raw field value
            pub const fn raw(self) -> u32 {
                match self {
                    $($name::$variant => $raw,)+
                }
            }

            pub(crate) const fn from_raw(raw: u32) -> Self {
                match raw {
                    $($raw => $name::$variant,)+
                    _ => $name::$fallback,
                }
            }
        }
    };
}

/// The hardware request that paces a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Request {
    /// Software request, used for memory-to-memory transfers
    Software,
    /// A peripheral request line, `0..=127` (the `REQSEL` value)
    Peripheral(u8),
}

impl Request {
    pub(crate) fn check(self) -> Result<()> {
        match self {
            Request::Peripheral(sel) if sel > 0x7F => Err(Error::InvalidParameter),
            _ => Ok(()),
        }
    }
}

/// Transfer direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    MemoryToMemory,
    PeripheralToMemory,
    MemoryToPeripheral,
}

/// Per-beat address behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Increment {
    /// The address stays put. Use this for peripheral data registers.
    Fixed,
    /// The address advances by the data width after each beat.
    Incremented,
}

field_enum!(Increment, fallback = Fixed, { Fixed = 0, Incremented = 1 });

/// Width of a single data beat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataWidth {
    Byte,
    HalfWord,
    Word,
}

field_enum!(DataWidth, fallback = Word, { Byte = 0, HalfWord = 1, Word = 2 });

impl DataWidth {
    /// Returns the width in bytes
    pub const fn bytes(self) -> u32 {
        1 << self.raw()
    }
}

/// Channel arbitration priority
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Priority {
    LowWeightLow,
    LowWeightMid,
    LowWeightHigh,
    High,
}

field_enum!(Priority, fallback = High, {
    LowWeightLow = 0,
    LowWeightMid = 1,
    LowWeightHigh = 2,
    High = 3,
});

/// AHB master port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Port {
    Port0,
    Port1,
}

field_enum!(Port, fallback = Port1, { Port0 = 0, Port1 = 1 });

/// How a hardware request is served
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HardwareRequestMode {
    /// Each request moves one burst
    Burst,
    /// Each request moves one block
    Block,
}

field_enum!(HardwareRequestMode, fallback = Block, { Burst = 0, Block = 1 });

/// A trigger input, `0..=63` (the `TRIGSEL` value)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TriggerSource(pub u8);

impl TriggerSource {
    pub const EXTI0: Self = TriggerSource(0);
}

/// Trigger edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TriggerPolarity {
    /// Triggers are ignored
    Masked,
    Rising,
    Falling,
}

field_enum!(TriggerPolarity, fallback = Masked, { Masked = 0, Rising = 1, Falling = 2 });

/// The amount of work that one trigger hit unlocks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TriggerMode {
    Block,
    RepeatedBlock,
    Node,
    SingleBurst,
}

field_enum!(TriggerMode, fallback = SingleBurst, {
    Block = 0,
    RepeatedBlock = 1,
    Node = 2,
    SingleBurst = 3,
});

/// Trigger configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TriggerConfig {
    pub source: TriggerSource,
    pub polarity: TriggerPolarity,
    pub mode: TriggerMode,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        TriggerConfig {
            source: TriggerSource::EXTI0,
            polarity: TriggerPolarity::Masked,
            mode: TriggerMode::Block,
        }
    }
}

impl TriggerConfig {
    pub(crate) fn check(&self) -> Result<()> {
        if self.source.0 > 0x3F {
            return Err(Error::InvalidParameter);
        }
        Ok(())
    }
}

/// Destination truncation and padding when widths differ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TruncPad {
    /// Left-truncate wide data, zero-pad narrow data
    #[default]
    LeftTruncateZeroPad,
    /// Right-truncate wide data, sign-extend narrow data
    RightTruncateSignPad,
}

field_enum!(TruncPad, fallback = RightTruncateSignPad, {
    LeftTruncateZeroPad = 0,
    RightTruncateSignPad = 1,
});

/// Data handling transforms applied between source and destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DataHandling {
    /// Swap the bytes of each unaligned source half-word
    pub src_byte_exchange: bool,
    /// Swap the bytes of each destination half-word
    pub dst_byte_exchange: bool,
    /// Swap the half-words of each destination word
    pub dst_halfword_exchange: bool,
    pub trunc_pad: TruncPad,
    /// Pack or unpack to the destination width instead of padding
    pub pack: bool,
}

/// Address step direction for repeated blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Step {
    #[default]
    Increment,
    Decrement,
}

field_enum!(Step, fallback = Decrement, { Increment = 0, Decrement = 1 });

/// When the half-complete and complete events fire in a direct transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DirectEventMode {
    #[default]
    Block,
    RepeatedBlock,
}

field_enum!(DirectEventMode, fallback = RepeatedBlock, { Block = 0, RepeatedBlock = 1 });

/// Largest repeated block count
pub const MAX_BLOCK_COUNT: u16 = 2048;
/// Largest burst-level address offset, in bytes
pub const MAX_BURST_OFFSET: u16 = 0x1FFF;
/// Largest burst length, in bytes
pub const MAX_BURST_LENGTH: u8 = 64;
/// Largest block size, in bytes
pub const MAX_BLOCK_SIZE: u32 = 0xFFFF;

/// 2D addressing parameters
///
/// Only channels with 2D addressing, and 2D nodes, accept these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RepeatBlock {
    /// Number of blocks, `1..=2048`
    pub block_count: u16,
    /// Bytes added to (or subtracted from) the source address after each burst
    pub burst_src_offset: u16,
    /// Bytes added to (or subtracted from) the destination address after each burst
    pub burst_dst_offset: u16,
    /// Bytes added to (or subtracted from) the source address after each block
    pub block_src_offset: u16,
    /// Bytes added to (or subtracted from) the destination address after each block
    pub block_dst_offset: u16,
    pub burst_src_step: Step,
    pub burst_dst_step: Step,
    pub block_src_step: Step,
    pub block_dst_step: Step,
    pub event_mode: DirectEventMode,
}

impl Default for RepeatBlock {
    fn default() -> Self {
        RepeatBlock {
            block_count: 1,
            burst_src_offset: 0,
            burst_dst_offset: 0,
            block_src_offset: 0,
            block_dst_offset: 0,
            burst_src_step: Step::Increment,
            burst_dst_step: Step::Increment,
            block_src_step: Step::Increment,
            block_dst_step: Step::Increment,
            event_mode: DirectEventMode::Block,
        }
    }
}

impl RepeatBlock {
    pub(crate) fn check(&self) -> Result<()> {
        if self.block_count == 0
            || self.block_count > MAX_BLOCK_COUNT
            || self.burst_src_offset > MAX_BURST_OFFSET
            || self.burst_dst_offset > MAX_BURST_OFFSET
        {
            return Err(Error::InvalidParameter);
        }
        Ok(())
    }
}

/// Checks a pair of burst lengths
pub(crate) fn check_burst(src: u8, dst: u8) -> Result<()> {
    if (1..=MAX_BURST_LENGTH).contains(&src) && (1..=MAX_BURST_LENGTH).contains(&dst) {
        Ok(())
    } else {
        Err(Error::InvalidParameter)
    }
}

/// Memory security attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SecurityAttribute {
    #[default]
    NonSecure,
    Secure,
}

field_enum!(SecurityAttribute, fallback = Secure, { NonSecure = 0, Secure = 1 });

/// Direct transfer configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DirectConfig {
    pub request: Request,
    pub direction: Direction,
    pub src_increment: Increment,
    pub dst_increment: Increment,
    pub src_width: DataWidth,
    pub dst_width: DataWidth,
    pub priority: Priority,
}

impl Default for DirectConfig {
    fn default() -> Self {
        DirectConfig {
            request: Request::Software,
            direction: Direction::MemoryToMemory,
            src_increment: Increment::Incremented,
            dst_increment: Increment::Incremented,
            src_width: DataWidth::Byte,
            dst_width: DataWidth::Byte,
            priority: Priority::LowWeightLow,
        }
    }
}

impl DirectConfig {
    pub(crate) fn check(&self) -> Result<()> {
        self.request.check()?;
        match (self.direction, self.request) {
            // Memory to memory transfers are always software driven.
            (Direction::MemoryToMemory, Request::Peripheral(_)) => Err(Error::InvalidParameter),
            (Direction::PeripheralToMemory | Direction::MemoryToPeripheral, Request::Software) => {
                Err(Error::InvalidParameter)
            }
            _ => Ok(()),
        }
    }
}

/// When the half-complete and complete events fire in a linked-list transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkedListEventMode {
    /// At each block
    #[default]
    Block,
    /// At each repeated block
    RepeatedBlock,
    /// At each node
    Node,
    /// At the last node of the queue
    Queue,
}

field_enum!(LinkedListEventMode, fallback = Queue, {
    Block = 0,
    RepeatedBlock = 1,
    Node = 2,
    Queue = 3,
});

/// How far the channel runs through a queue before it stops
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ExecutionMode {
    /// Run the full queue
    #[default]
    Queue,
    /// Run the current node, then stop
    Node,
}

field_enum!(ExecutionMode, fallback = Node, { Queue = 0, Node = 1 });

/// Channel-level linked-list configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkedListConfig {
    pub priority: Priority,
    /// The port used to fetch nodes
    pub fetch_port: Port,
    pub event_mode: LinkedListEventMode,
}

impl Default for LinkedListConfig {
    fn default() -> Self {
        LinkedListConfig {
            priority: Priority::LowWeightLow,
            fetch_port: Port::Port0,
            event_mode: LinkedListEventMode::Block,
        }
    }
}

/// The complete description of one linked-list node
///
/// `transfer.priority` is a channel setting. Nodes don't carry it, so it
/// reads back as the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NodeConfig {
    pub transfer: DirectConfig,
    pub hardware_request_mode: HardwareRequestMode,
    pub src_port: Port,
    pub dst_port: Port,
    /// Source burst length in bytes, `1..=64`
    pub src_burst: u8,
    /// Destination burst length in bytes, `1..=64`
    pub dst_burst: u8,
    pub event_mode: LinkedListEventMode,
    pub trigger: TriggerConfig,
    pub data_handling: DataHandling,
    pub repeat_block: RepeatBlock,
    pub src_address: u32,
    pub dst_address: u32,
    /// Block size in bytes, `0..=0xFFFF`
    pub size: u32,
    pub src_security: SecurityAttribute,
    pub dst_security: SecurityAttribute,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            transfer: DirectConfig::default(),
            hardware_request_mode: HardwareRequestMode::Burst,
            src_port: Port::Port0,
            dst_port: Port::Port0,
            src_burst: 1,
            dst_burst: 1,
            event_mode: LinkedListEventMode::Block,
            trigger: TriggerConfig::default(),
            data_handling: DataHandling::default(),
            repeat_block: RepeatBlock::default(),
            src_address: 0,
            dst_address: 0,
            size: 0,
            src_security: SecurityAttribute::NonSecure,
            dst_security: SecurityAttribute::NonSecure,
        }
    }
}

impl NodeConfig {
    pub(crate) fn check(&self) -> Result<()> {
        self.transfer.check()?;
        check_burst(self.src_burst, self.dst_burst)?;
        self.trigger.check()?;
        self.repeat_block.check()?;
        if self.size > MAX_BLOCK_SIZE {
            return Err(Error::InvalidParameter);
        }
        Ok(())
    }
}

/// Completion level awaited by
/// [`poll_for_transfer`](crate::Channel::poll_for_transfer)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferLevel {
    /// Half of the block (or repeated block, or node) moved
    Half,
    /// The channel finished and went idle
    Full,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_encodings_decode() {
        assert_eq!(DataWidth::from_raw(3), DataWidth::Word);
        assert_eq!(TriggerPolarity::from_raw(3), TriggerPolarity::Masked);
        assert_eq!(Priority::from_raw(2), Priority::LowWeightHigh);
    }

    #[test]
    fn data_width_bytes() {
        assert_eq!(DataWidth::Byte.bytes(), 1);
        assert_eq!(DataWidth::HalfWord.bytes(), 2);
        assert_eq!(DataWidth::Word.bytes(), 4);
    }

    #[test]
    fn burst_limits() {
        assert!(check_burst(1, 64).is_ok());
        assert_eq!(check_burst(0, 1), Err(Error::InvalidParameter));
        assert_eq!(check_burst(1, 65), Err(Error::InvalidParameter));
    }

    #[test]
    fn repeat_block_limits() {
        let mut repeat = RepeatBlock::default();
        assert!(repeat.check().is_ok());
        repeat.block_count = 2048;
        assert!(repeat.check().is_ok());
        repeat.block_count = 2049;
        assert_eq!(repeat.check(), Err(Error::InvalidParameter));
        repeat.block_count = 0;
        assert_eq!(repeat.check(), Err(Error::InvalidParameter));
        repeat.block_count = 1;
        repeat.burst_dst_offset = 0x2000;
        assert_eq!(repeat.check(), Err(Error::InvalidParameter));
    }

    #[test]
    fn request_must_match_direction() {
        let mut config = DirectConfig::default();
        assert!(config.check().is_ok());
        config.request = Request::Peripheral(5);
        assert_eq!(config.check(), Err(Error::InvalidParameter));
        config.direction = Direction::PeripheralToMemory;
        assert!(config.check().is_ok());
        config.request = Request::Peripheral(0x80);
        assert_eq!(config.check(), Err(Error::InvalidParameter));
    }
}
