use modular_bitfield::prelude::*;
use zerocopy::byteorder::little_endian::U16;
use zerocopy::{FromBytes, Immutable, KnownLayout, Unaligned};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::PmdError;
use crate::frame::{DecodeContext, FrameHeader, PmdData, fixed_records};

#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct PpiSampleRaw {
    pub hr: u8,
    pub ppi_ms: U16,
    pub error_estimate_ms: U16,
    pub flags: u8,
}

#[bitfield(bytes = 1)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PpiFlags {
    pub blocker: bool,
    pub skin_contact: bool,
    pub skin_contact_supported: bool,
    #[skip]
    unused: B5,
}

/// Peak-to-peak interval reported by the optical sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PpiSample {
    pub hr: u8,
    pub ppi_ms: u16,
    pub error_estimate_ms: u16,
    pub blocker: bool,
    pub skin_contact: bool,
    pub skin_contact_supported: bool,
}

impl From<&PpiSampleRaw> for PpiSample {
    fn from(raw: &PpiSampleRaw) -> Self {
        let flags = PpiFlags::from_bytes([raw.flags]);
        PpiSample {
            hr: raw.hr,
            ppi_ms: raw.ppi_ms.get(),
            error_estimate_ms: raw.error_estimate_ms.get(),
            blocker: flags.blocker(),
            skin_contact: flags.skin_contact(),
            skin_contact_supported: flags.skin_contact_supported(),
        }
    }
}

pub(crate) fn decode_ppi(payload: &[u8], _header: &FrameHeader, _ctx: &DecodeContext) -> Result<PmdData, PmdError> {
    let samples = fixed_records::<PpiSampleRaw, _>(payload, |raw| PpiSample::from(raw))?;
    Ok(PmdData::Ppi(samples))
}
