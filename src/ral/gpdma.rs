//! GPDMA register blocks and fields

use super::{RORegister, RWRegister};

/// Number of channels in a GPDMA controller
pub const CHANNEL_COUNT: usize = 16;
/// The first channel that supports 2D addressing
pub const FIRST_2D_CHANNEL: usize = 12;

/// Byte offset of channel 0 within the controller
pub const CHANNEL_OFFSET: usize = 0x50;
/// Bytes between two channels
pub const CHANNEL_STRIDE: usize = 0x80;
/// Byte offset of CSR within a channel
pub const CSR_OFFSET: usize = 0x10;

/// Non-secure alias of GPDMA1
pub const GPDMA1: *const RegisterBlock = 0x4002_0000 as *const RegisterBlock;

/// GPDMA controller registers.
#[repr(C)]
pub struct RegisterBlock {
    /// Secure configuration register
    pub SECCFGR: RWRegister<u32>,
    /// Privileged configuration register
    pub PRIVCFGR: RWRegister<u32>,
    /// Configuration lock register
    pub RCFGLOCKR: RWRegister<u32>,
    /// Non-secure masked interrupt status register
    pub MISR: RORegister<u32>,
    /// Secure masked interrupt status register
    pub SMISR: RORegister<u32>,
    _reserved0: [u32; 15],
    /// Channel registers
    pub CH: [ch::RegisterBlock; CHANNEL_COUNT],
}

const _: () = assert!(core::mem::offset_of!(RegisterBlock, CH) == CHANNEL_OFFSET);

/// Registers of a single channel.
pub mod ch {
    use super::super::{RORegister, RWRegister, WORegister};

    #[repr(C)]
    pub struct RegisterBlock {
        /// Linked-list base address register
        pub CLBAR: RWRegister<u32>,
        _reserved0: [u32; 2],
        /// Flag clear register
        pub CFCR: WORegister<u32>,
        /// Status register
        pub CSR: RORegister<u32>,
        /// Control register
        pub CCR: RWRegister<u32>,
        _reserved1: [u32; 10],
        /// Transfer register 1
        pub CTR1: RWRegister<u32>,
        /// Transfer register 2
        pub CTR2: RWRegister<u32>,
        /// Block register 1
        pub CBR1: RWRegister<u32>,
        /// Source address register
        pub CSAR: RWRegister<u32>,
        /// Destination address register
        pub CDAR: RWRegister<u32>,
        /// Transfer register 3 (2D channels only)
        pub CTR3: RWRegister<u32>,
        /// Block register 2 (2D channels only)
        pub CBR2: RWRegister<u32>,
        _reserved2: [u32; 8],
        /// Linked-list address register
        pub CLLR: RWRegister<u32>,
    }

    const _: () = assert!(core::mem::size_of::<RegisterBlock>() == super::CHANNEL_STRIDE);
    const _: () = assert!(core::mem::offset_of!(RegisterBlock, CSR) == super::CSR_OFFSET);
    const _: () = assert!(core::mem::offset_of!(RegisterBlock, CTR1) == 0x40);
    const _: () = assert!(core::mem::offset_of!(RegisterBlock, CLLR) == 0x7C);

    fields! {
        CLBAR {
            LBA: 16, 16;
        }
        CFCR {
            TCF: 8, 1;
            HTF: 9, 1;
            DTEF: 10, 1;
            ULEF: 11, 1;
            USEF: 12, 1;
            SUSPF: 13, 1;
            TOF: 14, 1;
        }
        CSR {
            IDLEF: 0, 1;
            TCF: 8, 1;
            HTF: 9, 1;
            DTEF: 10, 1;
            ULEF: 11, 1;
            USEF: 12, 1;
            SUSPF: 13, 1;
            TOF: 14, 1;
            FIFOL: 16, 8;
        }
        CCR {
            EN: 0, 1;
            RESET: 1, 1;
            SUSP: 2, 1;
            TCIE: 8, 1;
            HTIE: 9, 1;
            DTEIE: 10, 1;
            ULEIE: 11, 1;
            USEIE: 12, 1;
            SUSPIE: 13, 1;
            TOIE: 14, 1;
            LSM: 16, 1;
            LAP: 17, 1;
            PRIO: 22, 2;
        }
        CTR1 {
            SDW_LOG2: 0, 2;
            SINC: 3, 1;
            SBL_1: 4, 6;
            PAM_0: 11, 1;
            PAM_1: 12, 1;
            SBX: 13, 1;
            SAP: 14, 1;
            SSEC: 15, 1;
            DDW_LOG2: 16, 2;
            DINC: 19, 1;
            DBL_1: 20, 6;
            DBX: 26, 1;
            DHX: 27, 1;
            DAP: 30, 1;
            DSEC: 31, 1;
        }
        CTR2 {
            REQSEL: 0, 7;
            SWREQ: 9, 1;
            DREQ: 10, 1;
            BREQ: 11, 1;
            TRIGM: 14, 2;
            TRIGSEL: 16, 6;
            TRIGPOL: 24, 2;
            TCEM: 30, 2;
        }
        CBR1 {
            BNDT: 0, 16;
            BRC: 16, 11;
            SDEC: 28, 1;
            DDEC: 29, 1;
            BRSDEC: 30, 1;
            BRDDEC: 31, 1;
        }
        CTR3 {
            SAO: 0, 13;
            DAO: 16, 13;
        }
        CBR2 {
            BRSAO: 0, 16;
            BRDAO: 16, 16;
        }
        CLLR {
            LA: 2, 14;
            ULL: 16, 1;
            UB2: 25, 1;
            UT3: 26, 1;
            UDA: 27, 1;
            USA: 28, 1;
            UB1: 29, 1;
            UT2: 30, 1;
            UT1: 31, 1;
        }
    }

    /// All CSR event flags that software can clear through CFCR
    pub const FLAGS_ALL: u32 = CFCR::TCF::mask
        | CFCR::HTF::mask
        | CFCR::DTEF::mask
        | CFCR::ULEF::mask
        | CFCR::USEF::mask
        | CFCR::SUSPF::mask
        | CFCR::TOF::mask;

    /// All CCR interrupt enables
    pub const IT_ALL: u32 = CCR::TCIE::mask
        | CCR::HTIE::mask
        | CCR::DTEIE::mask
        | CCR::ULEIE::mask
        | CCR::USEIE::mask
        | CCR::SUSPIE::mask
        | CCR::TOIE::mask;
}
