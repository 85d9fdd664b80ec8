use zerocopy::{FromBytes, Immutable, KnownLayout, Unaligned};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::PmdError;
use crate::frame::{DecodeContext, FrameHeader, PmdData, fixed_records, timed};

#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct OfflineHrQualityRaw {
    pub hr: u8,
    pub ppg_quality: u8,
    pub corrected_hr: u8,
}

/// Heart rate sample from an offline recording
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OfflineHrSample {
    pub hr: u8,
    pub ppg_quality: Option<u8>,
    pub corrected_hr: Option<u8>,
}

pub(crate) fn decode_heart_rate(payload: &[u8], header: &FrameHeader, ctx: &DecodeContext) -> Result<PmdData, PmdError> {
    let samples = fixed_records::<u8, _>(payload, |hr| OfflineHrSample {
        hr: *hr,
        ppg_quality: None,
        corrected_hr: None,
    })?;
    Ok(PmdData::OfflineHr(timed(samples, header, ctx)?))
}

pub(crate) fn decode_heart_rate_with_quality(
    payload: &[u8],
    header: &FrameHeader,
    ctx: &DecodeContext,
) -> Result<PmdData, PmdError> {
    let samples = fixed_records::<OfflineHrQualityRaw, _>(payload, |raw| OfflineHrSample {
        hr: raw.hr,
        ppg_quality: Some(raw.ppg_quality),
        corrected_hr: Some(raw.corrected_hr),
    })?;
    Ok(PmdData::OfflineHr(timed(samples, header, ctx)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurement::PmdMeasurementType;

    fn header(frame_type: u8) -> FrameHeader {
        FrameHeader {
            measurement_type: PmdMeasurementType::OfflineHr,
            timestamp: 4_000_000_000,
            frame_type,
            compressed: false,
        }
    }

    #[test]
    fn test_plain_heart_rate() {
        let data = decode_heart_rate(&[60, 61, 62, 63], &header(0), &DecodeContext::new(1)).unwrap();
        let PmdData::OfflineHr(samples) = data else {
            panic!("expected offline hr data");
        };
        let hrs: Vec<u8> = samples.iter().map(|s| s.sample.hr).collect();
        assert_eq!(hrs, vec![60, 61, 62, 63]);
        assert_eq!(samples[0].timestamp, 1_000_000_000);
    }

    #[test]
    fn test_heart_rate_with_quality() {
        let data = decode_heart_rate_with_quality(&[70, 90, 71], &header(1), &DecodeContext::new(1)).unwrap();
        let PmdData::OfflineHr(samples) = data else {
            panic!("expected offline hr data");
        };
        assert_eq!(
            samples[0].sample,
            OfflineHrSample {
                hr: 70,
                ppg_quality: Some(90),
                corrected_hr: Some(71),
            }
        );
        assert!(decode_heart_rate_with_quality(&[70, 90], &header(1), &DecodeContext::new(1)).is_err());
    }
}
