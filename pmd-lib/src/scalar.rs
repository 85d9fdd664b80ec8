// Single-channel float sensors: barometric pressure, temperature and skin temperature

use zerocopy::byteorder::little_endian::F32;

use crate::delta::{ChannelSpec, SampleEncoding, decode_delta_frame};
use crate::error::PmdError;
use crate::frame::{DecodeContext, FrameHeader, PmdData, TimedSample, fixed_records, timed};

const SINGLE_FLOAT: ChannelSpec = ChannelSpec::new(1, 32, SampleEncoding::Float);

fn raw_floats(payload: &[u8], header: &FrameHeader, ctx: &DecodeContext) -> Result<Vec<TimedSample<f32>>, PmdError> {
    let samples = fixed_records::<F32, _>(payload, |value| value.get())?;
    timed(samples, header, ctx)
}

fn compressed_floats(
    payload: &[u8],
    header: &FrameHeader,
    ctx: &DecodeContext,
) -> Result<Vec<TimedSample<f32>>, PmdError> {
    let frame = decode_delta_frame(payload, SINGLE_FLOAT)?;
    let samples = frame.float_samples().into_iter().map(|sample| sample[0]).collect();
    timed(samples, header, ctx)
}

pub(crate) fn decode_pressure_raw(payload: &[u8], header: &FrameHeader, ctx: &DecodeContext) -> Result<PmdData, PmdError> {
    raw_floats(payload, header, ctx).map(PmdData::Pressure)
}

pub(crate) fn decode_pressure_compressed(
    payload: &[u8],
    header: &FrameHeader,
    ctx: &DecodeContext,
) -> Result<PmdData, PmdError> {
    compressed_floats(payload, header, ctx).map(PmdData::Pressure)
}

pub(crate) fn decode_temperature_raw(
    payload: &[u8],
    header: &FrameHeader,
    ctx: &DecodeContext,
) -> Result<PmdData, PmdError> {
    raw_floats(payload, header, ctx).map(PmdData::Temperature)
}

pub(crate) fn decode_temperature_compressed(
    payload: &[u8],
    header: &FrameHeader,
    ctx: &DecodeContext,
) -> Result<PmdData, PmdError> {
    compressed_floats(payload, header, ctx).map(PmdData::Temperature)
}

pub(crate) fn decode_skin_temperature_raw(
    payload: &[u8],
    header: &FrameHeader,
    ctx: &DecodeContext,
) -> Result<PmdData, PmdError> {
    raw_floats(payload, header, ctx).map(PmdData::SkinTemperature)
}

pub(crate) fn decode_skin_temperature_compressed(
    payload: &[u8],
    header: &FrameHeader,
    ctx: &DecodeContext,
) -> Result<PmdData, PmdError> {
    compressed_floats(payload, header, ctx).map(PmdData::SkinTemperature)
}
