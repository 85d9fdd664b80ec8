//! Three-axis motion sensors: accelerometer, gyroscope and magnetometer.

use std::fmt;

use zerocopy::byteorder::little_endian::I16;
use zerocopy::{FromBytes, Immutable, KnownLayout, Unaligned};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::delta::{ChannelSpec, SampleEncoding, decode_delta_frame};
use crate::error::PmdError;
use crate::frame::{DecodeContext, FrameHeader, PmdData, fixed_records, i24, timed};

const XYZ_INT16: ChannelSpec = ChannelSpec::new(3, 16, SampleEncoding::SignedInt);
const XYZ_FLOAT: ChannelSpec = ChannelSpec::new(3, 32, SampleEncoding::Float);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Xyz<T> {
    pub x: T,
    pub y: T,
    pub z: T,
}

impl<T> Xyz<T> {
    pub fn new(x: T, y: T, z: T) -> Self {
        Self { x, y, z }
    }

    pub fn map<U>(self, f: impl Fn(T) -> U) -> Xyz<U> {
        Xyz {
            x: f(self.x),
            y: f(self.y),
            z: f(self.z),
        }
    }
}

impl<T: fmt::Display> fmt::Display for Xyz<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x: {}, y: {}, z: {}", self.x, self.y, self.z)
    }
}

#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct AccI8Raw {
    pub x: i8,
    pub y: i8,
    pub z: i8,
}

#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct AccI16Raw {
    pub x: I16,
    pub y: I16,
    pub z: I16,
}

#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct AccI24Raw {
    pub x: [u8; 3],
    pub y: [u8; 3],
    pub z: [u8; 3],
}

fn xyz(values: &[i32]) -> Xyz<i32> {
    Xyz::new(values[0], values[1], values[2])
}

fn xyz_f32(values: &[f32]) -> Xyz<f32> {
    Xyz::new(values[0], values[1], values[2])
}

fn delta_xyz(payload: &[u8]) -> Result<Vec<Xyz<i32>>, PmdError> {
    let frame = decode_delta_frame(payload, XYZ_INT16)?;
    Ok(frame.raw_samples().iter().map(|sample| xyz(sample)).collect())
}

fn scaled(samples: Vec<Xyz<i32>>, factor: f32) -> Vec<Xyz<f32>> {
    samples
        .into_iter()
        .map(|sample| sample.map(|value| value as f32 * factor))
        .collect()
}

pub(crate) fn decode_acc_i8(payload: &[u8], header: &FrameHeader, ctx: &DecodeContext) -> Result<PmdData, PmdError> {
    let samples = fixed_records::<AccI8Raw, _>(payload, |raw| {
        Xyz::new(i32::from(raw.x), i32::from(raw.y), i32::from(raw.z))
    })?;
    Ok(PmdData::Acc(timed(samples, header, ctx)?))
}

pub(crate) fn decode_acc_i16(payload: &[u8], header: &FrameHeader, ctx: &DecodeContext) -> Result<PmdData, PmdError> {
    let samples = fixed_records::<AccI16Raw, _>(payload, |raw| {
        Xyz::new(i32::from(raw.x.get()), i32::from(raw.y.get()), i32::from(raw.z.get()))
    })?;
    Ok(PmdData::Acc(timed(samples, header, ctx)?))
}

pub(crate) fn decode_acc_i24(payload: &[u8], header: &FrameHeader, ctx: &DecodeContext) -> Result<PmdData, PmdError> {
    let samples = fixed_records::<AccI24Raw, _>(payload, |raw| Xyz::new(i24(raw.x), i24(raw.y), i24(raw.z)))?;
    Ok(PmdData::Acc(timed(samples, header, ctx)?))
}

/// Compressed accelerometer in mG; a non-unit factor is applied and rounded.
pub(crate) fn decode_acc_compressed(
    payload: &[u8],
    header: &FrameHeader,
    ctx: &DecodeContext,
) -> Result<PmdData, PmdError> {
    let mut samples = delta_xyz(payload)?;
    if ctx.factor != 1.0 {
        samples = samples
            .into_iter()
            .map(|sample| sample.map(|value| (value as f32 * ctx.factor).round() as i32))
            .collect();
    }
    Ok(PmdData::Acc(timed(samples, header, ctx)?))
}

pub(crate) fn decode_gyro_compressed(
    payload: &[u8],
    header: &FrameHeader,
    ctx: &DecodeContext,
) -> Result<PmdData, PmdError> {
    let samples = scaled(delta_xyz(payload)?, ctx.factor);
    Ok(PmdData::Gyro(timed(samples, header, ctx)?))
}

pub(crate) fn decode_gyro_float(payload: &[u8], header: &FrameHeader, ctx: &DecodeContext) -> Result<PmdData, PmdError> {
    let frame = decode_delta_frame(payload, XYZ_FLOAT)?;
    let samples = frame.float_samples().iter().map(|sample| xyz_f32(sample)).collect();
    Ok(PmdData::Gyro(timed(samples, header, ctx)?))
}

pub(crate) fn decode_magnetometer_compressed(
    payload: &[u8],
    header: &FrameHeader,
    ctx: &DecodeContext,
) -> Result<PmdData, PmdError> {
    let samples = scaled(delta_xyz(payload)?, ctx.factor);
    Ok(PmdData::Magnetometer(timed(samples, header, ctx)?))
}
