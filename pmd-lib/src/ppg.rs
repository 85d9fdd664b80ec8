//! Optical heart rate (PPG) frames.

use zerocopy::byteorder::little_endian::U32;
use zerocopy::{FromBytes, Immutable, KnownLayout, Unaligned};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::delta::{ChannelSpec, SampleEncoding, decode_delta_frame};
use crate::error::PmdError;
use crate::frame::{DecodeContext, FrameHeader, PmdData, at_frame_time, fixed_records, i24, single_record, timed};

const PPG_CHANNELS: ChannelSpec = ChannelSpec::new(4, 22, SampleEncoding::SignedInt);
const PPG_EXTENDED_CHANNELS: ChannelSpec = ChannelSpec::new(17, 24, SampleEncoding::SignedInt);

/// Integration time slots per gain record
pub const PPG_GAIN_SLOTS: usize = 12;
const PPG_GAIN_MASK: u8 = 0x07;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PpgSample {
    Channels {
        ppg: [i32; 3],
        ambient: i32,
    },
    Extended {
        ppg: [i32; 16],
        status: u32,
    },
    Gains {
        num_int_ts: [u8; PPG_GAIN_SLOTS],
        channel1_gain: [u8; PPG_GAIN_SLOTS],
        channel2_gain: [u8; PPG_GAIN_SLOTS],
    },
    OperationMode(u32),
}

#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct PpgChannelsRaw {
    pub ppg: [[u8; 3]; 3],
    pub ambient: [u8; 3],
}

#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct PpgGainsRaw {
    pub num_int_ts: [u8; PPG_GAIN_SLOTS],
    pub channel1_gain: [u8; PPG_GAIN_SLOTS],
    pub channel2_gain: [u8; PPG_GAIN_SLOTS],
}

fn channels(values: &[i32]) -> PpgSample {
    PpgSample::Channels {
        ppg: [values[0], values[1], values[2]],
        ambient: values[3],
    }
}

pub(crate) fn decode_raw_channels(
    payload: &[u8],
    header: &FrameHeader,
    ctx: &DecodeContext,
) -> Result<PmdData, PmdError> {
    let samples = fixed_records::<PpgChannelsRaw, _>(payload, |raw| PpgSample::Channels {
        ppg: raw.ppg.map(i24),
        ambient: i24(raw.ambient),
    })?;
    Ok(PmdData::Ppg(timed(samples, header, ctx)?))
}

pub(crate) fn decode_compressed_channels(
    payload: &[u8],
    header: &FrameHeader,
    ctx: &DecodeContext,
) -> Result<PmdData, PmdError> {
    let frame = decode_delta_frame(payload, PPG_CHANNELS)?;
    let samples = frame.raw_samples().iter().map(|sample| channels(sample)).collect();
    Ok(PmdData::Ppg(timed(samples, header, ctx)?))
}

/// Sixteen PPG channels followed by a status word.
pub(crate) fn decode_extended(payload: &[u8], header: &FrameHeader, ctx: &DecodeContext) -> Result<PmdData, PmdError> {
    let frame = decode_delta_frame(payload, PPG_EXTENDED_CHANNELS)?;
    let samples = frame
        .raw_samples()
        .iter()
        .map(|sample| {
            let mut ppg = [0i32; 16];
            ppg.copy_from_slice(&sample[..16]);
            PpgSample::Extended {
                ppg,
                status: sample[16] as u32,
            }
        })
        .collect();
    Ok(PmdData::Ppg(timed(samples, header, ctx)?))
}

pub(crate) fn decode_gains(payload: &[u8], header: &FrameHeader, _ctx: &DecodeContext) -> Result<PmdData, PmdError> {
    let raw = single_record::<PpgGainsRaw>(payload)?;
    let sample = PpgSample::Gains {
        num_int_ts: raw.num_int_ts,
        channel1_gain: raw.channel1_gain.map(|gain| gain & PPG_GAIN_MASK),
        channel2_gain: raw.channel2_gain.map(|gain| gain & PPG_GAIN_MASK),
    };
    Ok(PmdData::Ppg(at_frame_time(sample, header)))
}

pub(crate) fn decode_operation_mode(
    payload: &[u8],
    header: &FrameHeader,
    _ctx: &DecodeContext,
) -> Result<PmdData, PmdError> {
    let mode = single_record::<U32>(payload)?;
    Ok(PmdData::Ppg(at_frame_time(PpgSample::OperationMode(mode.get()), header)))
}
