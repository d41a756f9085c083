//! DMA errors

use core::fmt::{self, Display};

/// Errors returned by channel and queue operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Error {
    /// A parameter was out of range, or the channel was in the wrong
    /// state or transfer mode for the operation.
    InvalidParameter,
    /// A transfer start was requested while the channel was not idle.
    Busy,
    /// The transfer did not reach the requested level before the timeout.
    Timeout,
    /// The channel did not confirm a suspend request in time.
    SuspendTimeout,
    /// Abort was requested, but the channel had nothing to abort.
    AlreadyIdle,
    /// The hardware reported transfer errors.
    Transfer(ErrorCode),
    /// Node storage is misaligned, or it does not fit in one 64 KiB window.
    AddressWindow,
    /// The queue's node storage is full.
    QueueFull,
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidParameter => f.write_str("invalid parameter or channel state"),
            Error::Busy => f.write_str("channel busy"),
            Error::Timeout => f.write_str("transfer timeout"),
            Error::SuspendTimeout => f.write_str("suspend not confirmed"),
            Error::AlreadyIdle => f.write_str("channel already idle"),
            Error::Transfer(code) => write!(f, "transfer error: {code}"),
            Error::AddressWindow => f.write_str("node outside of the linked-list window"),
            Error::QueueFull => f.write_str("queue storage full"),
        }
    }
}

bitflags::bitflags! {
    /// Hardware error conditions accumulated by a channel
    ///
    /// The set is sticky. It's cleared when the next transfer starts.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ErrorCode: u32 {
        /// Data transfer error
        const DTE = 1 << 0;
        /// User setting error
        const USE = 1 << 1;
        /// Trigger overrun
        const TO = 1 << 2;
        /// Update link (node fetch) error
        const ULE = 1 << 3;
    }
}

impl Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DMA_ERR: DTE {dte} USE {use_} TO {to} ULE {ule}",
            dte = self.contains(ErrorCode::DTE) as u8,
            use_ = self.contains(ErrorCode::USE) as u8,
            to = self.contains(ErrorCode::TO) as u8,
            ule = self.contains(ErrorCode::ULE) as u8,
        )
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ErrorCode {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "DMA_ERR({=u32:#06x})", self.bits())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_display() {
        let code = ErrorCode::DTE | ErrorCode::ULE;
        assert_eq!(code.to_string(), "DMA_ERR: DTE 1 USE 0 TO 0 ULE 1");
        assert_eq!(
            Error::Transfer(code).to_string(),
            "transfer error: DMA_ERR: DTE 1 USE 0 TO 0 ULE 1"
        );
    }

    #[test]
    fn error_code_bits() {
        assert_eq!(ErrorCode::DTE.bits(), 1);
        assert_eq!(ErrorCode::USE.bits(), 2);
        assert_eq!(ErrorCode::TO.bits(), 4);
        assert_eq!(ErrorCode::ULE.bits(), 8);
    }
}
