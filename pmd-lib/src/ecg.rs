use modular_bitfield::prelude::*;
use zerocopy::byteorder::little_endian::U16;
use zerocopy::{FromBytes, Immutable, KnownLayout, Unaligned};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::bits::sign_extend;
use crate::error::PmdError;
use crate::frame::{DecodeContext, FrameHeader, PmdData, fixed_records, i24, timed, u24};

#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct EcgFlaggedRaw {
    pub value: U16,
    pub flags: u8,
}

#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct EcgTaggedRaw {
    pub value: [u8; 3],
    pub pace_data_tag: u8,
}

#[bitfield(bytes = 1)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EcgFlags {
    pub over_sampling: bool,
    pub skin_contact: B2,
    pub impedance: B2,
    #[skip]
    unused: B3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EcgSample {
    Voltage {
        microvolts: i32,
    },
    Flagged {
        microvolts: i32,
        over_sampling: bool,
        skin_contact: u8,
        impedance: u8,
    },
    Tagged {
        microvolts: i32,
        ecg_data_tag: u8,
        pace_data_tag: u8,
    },
}

impl EcgSample {
    pub fn microvolts(&self) -> i32 {
        match self {
            EcgSample::Voltage { microvolts }
            | EcgSample::Flagged { microvolts, .. }
            | EcgSample::Tagged { microvolts, .. } => *microvolts,
        }
    }
}

impl From<&EcgFlaggedRaw> for EcgSample {
    fn from(raw: &EcgFlaggedRaw) -> Self {
        let flags = EcgFlags::from_bytes([raw.flags]);
        EcgSample::Flagged {
            // 14-bit two's complement
            microvolts: sign_extend(u32::from(raw.value.get()), 14),
            over_sampling: flags.over_sampling(),
            skin_contact: flags.skin_contact(),
            impedance: flags.impedance(),
        }
    }
}

impl From<&EcgTaggedRaw> for EcgSample {
    fn from(raw: &EcgTaggedRaw) -> Self {
        let value = u24(raw.value);
        EcgSample::Tagged {
            microvolts: sign_extend(value, 22),
            ecg_data_tag: (value >> 22) as u8,
            pace_data_tag: raw.pace_data_tag,
        }
    }
}

pub(crate) fn decode_voltage(payload: &[u8], header: &FrameHeader, ctx: &DecodeContext) -> Result<PmdData, PmdError> {
    let samples = fixed_records::<[u8; 3], _>(payload, |raw| EcgSample::Voltage { microvolts: i24(*raw) })?;
    Ok(PmdData::Ecg(timed(samples, header, ctx)?))
}

pub(crate) fn decode_flagged(payload: &[u8], header: &FrameHeader, ctx: &DecodeContext) -> Result<PmdData, PmdError> {
    let samples = fixed_records::<EcgFlaggedRaw, _>(payload, |raw| EcgSample::from(raw))?;
    Ok(PmdData::Ecg(timed(samples, header, ctx)?))
}

pub(crate) fn decode_tagged(payload: &[u8], header: &FrameHeader, ctx: &DecodeContext) -> Result<PmdData, PmdError> {
    let samples = fixed_records::<EcgTaggedRaw, _>(payload, |raw| EcgSample::from(raw))?;
    Ok(PmdData::Ecg(timed(samples, header, ctx)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurement::PmdMeasurementType;

    fn header(frame_type: u8) -> FrameHeader {
        FrameHeader {
            measurement_type: PmdMeasurementType::Ecg,
            timestamp: 1_000_000_000,
            frame_type,
            compressed: false,
        }
    }

    fn samples(data: PmdData) -> Vec<EcgSample> {
        match data {
            PmdData::Ecg(samples) => samples.into_iter().map(|s| s.sample).collect(),
            other => panic!("unexpected data {other:?}"),
        }
    }

    #[test]
    fn test_voltage_frame() {
        let payload = [0x10, 0x00, 0x00, 0xF0, 0xFF, 0xFF];
        let data = decode_voltage(&payload, &header(0), &DecodeContext::new(130)).unwrap();
        let values: Vec<i32> = samples(data).iter().map(EcgSample::microvolts).collect();
        assert_eq!(values, vec![16, -16]);
    }

    #[test]
    fn test_flagged_frame() {
        // -1 in 14 bits, over sampling + skin contact 2 + impedance 1
        let payload = [0xFF, 0x3F, 0b0000_1101];
        let data = decode_flagged(&payload, &header(1), &DecodeContext::new(130)).unwrap();
        assert_eq!(
            samples(data),
            vec![EcgSample::Flagged {
                microvolts: -1,
                over_sampling: true,
                skin_contact: 2,
                impedance: 1,
            }]
        );
    }

    #[test]
    fn test_tagged_frame() {
        // 22-bit value 5 with ecg tag 3, pace tag 7
        let payload = [0x05, 0x00, 0xC0, 0x07];
        let data = decode_tagged(&payload, &header(2), &DecodeContext::new(130)).unwrap();
        assert_eq!(
            samples(data),
            vec![EcgSample::Tagged {
                microvolts: 5,
                ecg_data_tag: 3,
                pace_data_tag: 7,
            }]
        );
    }

    #[test]
    fn test_partial_sample_rejected() {
        assert!(matches!(
            decode_voltage(&[0x00; 4], &header(0), &DecodeContext::new(130)),
            Err(PmdError::PayloadLength { expected_multiple: 3, actual: 4 })
        ));
    }
}
