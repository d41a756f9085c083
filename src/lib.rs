//! Direct Memory Access (DMA) driver for STM32U5 processors
//!
//! `stm32u5-dma` drives the channels of the GPDMA controller. It provides
//!
//! - channel configuration for direct (single block) transfers and
//!   linked-list transfers, including 2D addressing on channels 12 through 15
//! - linked-list [`Node`]s and [`Queue`]s, with conversion between full
//!   (static) nodes and compacted (dynamic) nodes
//! - an unsafe API to start, suspend, resume, abort and poll transfers
//! - an interrupt handler that reports events through [`Callbacks`]
//!
//! This DMA driver may be re-exported from a HAL. If it is, you should consider
//! using the safer APIs provided by your HAL.
//!
//! # Example
//!
//! ```no_run
//! use stm32u5_dma::{
//!     config::{DataWidth, DirectConfig, TransferLevel},
//!     tick::{SysTickClock, Ticks},
//!     Channel,
//! };
//!
//! static TICKS: Ticks = Ticks::new();
//!
//! let cp = cortex_m::Peripherals::take().unwrap();
//! let clock = SysTickClock::new(cp.SYST, 160_000_000, &TICKS);
//!
//! // Safety: nothing else uses channel 0.
//! let mut channel = unsafe { Channel::new(0, clock) };
//! channel.init().unwrap();
//! channel
//!     .set_config_direct(&DirectConfig {
//!         src_width: DataWidth::Word,
//!         dst_width: DataWidth::Word,
//!         ..DirectConfig::default()
//!     })
//!     .unwrap();
//!
//! let src = [0xA5A5_A5A5u32; 64];
//! let mut dst = [0u32; 64];
//! // Safety: both buffers outlive the transfer.
//! unsafe {
//!     channel
//!         .start_direct(src.as_ptr() as u32, dst.as_mut_ptr() as u32, 256)
//!         .unwrap();
//! }
//! channel.poll_for_transfer(TransferLevel::Full, 10).unwrap();
//! ```
//!
//! ### License
//!
//! Licensed under either of
//!
//! - [Apache License, Version 2.0](http://www.apache.org/licenses/LICENSE-2.0) ([LICENSE-APACHE](./LICENSE-APACHE))
//! - [MIT License](http://opensource.org/licenses/MIT) ([LICENSE-MIT](./LICENSE-MIT))
//!
//! at your option.
//!
//! Unless you explicitly state otherwise, any contribution intentionally submitted
//! for inclusion in the work by you, as defined in the Apache-2.0 license, shall be
//! dual licensed as above, without any additional terms or conditions.

#![cfg_attr(not(test), no_std)]

mod channel;
pub mod config;
mod error;
mod interrupt;
mod node;
mod queue;
mod ral;
pub mod tick;
pub mod transfer;

pub use channel::{Channel, State, TransferMode};
pub use error::{Error, ErrorCode};
pub use interrupt::{on_interrupt, Callbacks};
pub use node::{Node, NodeKind, UPDATE_ALL, UPDATE_LINEAR};
pub use queue::{Queue, QueueFormat};
pub use ral::gpdma::{RegisterBlock as GpdmaRegisters, CHANNEL_COUNT, FIRST_2D_CHANNEL, GPDMA1};
pub use tick::Tick;
pub use transfer::{Interrupts, SUSPEND_TIMEOUT_MS};

/// A DMA result
pub type Result<T> = core::result::Result<T, Error>;
