//! GNSS location frames.
//!
//! Frame type 0 carries coordinate fixes, type 1 satellite dilution records and
//! type 3 a single NMEA sentence block passed through from the receiver.

use zerocopy::byteorder::little_endian::{F64, I32, U16, U32};
use zerocopy::{FromBytes, Immutable, KnownLayout, Unaligned};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::PmdError;
use crate::frame::{DecodeContext, FrameHeader, PmdData, at_frame_time, fixed_records, timed};

#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct GnssCoordinatesRaw {
    pub latitude: F64,
    pub longitude: F64,
    pub time_ms: U32,
    pub cumulative_distance_dm: U32,
    pub speed: U16,
    pub used_acceleration_speed: U16,
    pub coordinate_speed: U16,
    pub acceleration_speed_factor: U16,
    pub course: U16,        // 1/100 degree
    pub gps_chip_speed: U16,
    pub fix: u8,
    pub speed_flag: u8,
    pub fusion_state: u8,
}

#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct GnssDilutionRaw {
    pub dilution: U16,     // 1/100
    pub altitude_dm: I32,
    pub satellites: u8,
    pub fix: u8,
}

#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct GnssNmeaPrefixRaw {
    pub measurement_period: U32,
    pub message_length: U16,
    pub status_flags: u8,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LocationSample {
    Coordinates {
        latitude: f64,
        longitude: f64,
        time_ms: u32,
        cumulative_distance_m: f64,
        speed: u16,
        used_acceleration_speed: u16,
        coordinate_speed: u16,
        acceleration_speed_factor: u16,
        course_deg: f64,
        gps_chip_speed: u16,
        fix: bool,
        speed_flag: u8,
        fusion_state: u8,
    },
    Dilution {
        dilution: f64,
        altitude_m: f64,
        satellites: u8,
        fix: bool,
    },
    Nmea {
        measurement_period: u32,
        status_flags: u8,
        message: String,
    },
}

impl From<&GnssCoordinatesRaw> for LocationSample {
    fn from(raw: &GnssCoordinatesRaw) -> Self {
        LocationSample::Coordinates {
            latitude: raw.latitude.get(),
            longitude: raw.longitude.get(),
            time_ms: raw.time_ms.get(),
            cumulative_distance_m: raw.cumulative_distance_dm.get() as f64 / 10.0,
            speed: raw.speed.get(),
            used_acceleration_speed: raw.used_acceleration_speed.get(),
            coordinate_speed: raw.coordinate_speed.get(),
            acceleration_speed_factor: raw.acceleration_speed_factor.get(),
            course_deg: raw.course.get() as f64 / 100.0,
            gps_chip_speed: raw.gps_chip_speed.get(),
            fix: raw.fix != 0,
            speed_flag: raw.speed_flag,
            fusion_state: raw.fusion_state,
        }
    }
}

impl From<&GnssDilutionRaw> for LocationSample {
    fn from(raw: &GnssDilutionRaw) -> Self {
        LocationSample::Dilution {
            dilution: raw.dilution.get() as f64 / 100.0,
            altitude_m: raw.altitude_dm.get() as f64 / 10.0,
            satellites: raw.satellites,
            fix: raw.fix != 0,
        }
    }
}

pub(crate) fn decode_coordinates(payload: &[u8], header: &FrameHeader, ctx: &DecodeContext) -> Result<PmdData, PmdError> {
    let samples = fixed_records::<GnssCoordinatesRaw, _>(payload, |raw| LocationSample::from(raw))?;
    Ok(PmdData::Location(timed(samples, header, ctx)?))
}

pub(crate) fn decode_dilution(payload: &[u8], header: &FrameHeader, ctx: &DecodeContext) -> Result<PmdData, PmdError> {
    let samples = fixed_records::<GnssDilutionRaw, _>(payload, |raw| LocationSample::from(raw))?;
    Ok(PmdData::Location(timed(samples, header, ctx)?))
}

pub(crate) fn decode_nmea(payload: &[u8], header: &FrameHeader, _ctx: &DecodeContext) -> Result<PmdData, PmdError> {
    let (prefix, text) = GnssNmeaPrefixRaw::ref_from_prefix(payload).map_err(|_| PmdError::InsufficientData {
        expected: size_of::<GnssNmeaPrefixRaw>(),
        actual: payload.len(),
    })?;

    let length = usize::from(prefix.message_length.get());
    if text.len() != length {
        return Err(PmdError::InvalidFrame(format!(
            "NMEA message length {length} does not match {} payload bytes",
            text.len()
        )));
    }

    let message = std::str::from_utf8(text)
        .map_err(|e| PmdError::InvalidFrame(format!("NMEA message is not valid text: {e}")))?;

    let sample = LocationSample::Nmea {
        measurement_period: prefix.measurement_period.get(),
        status_flags: prefix.status_flags,
        message: message.to_string(),
    };
    Ok(PmdData::Location(at_frame_time(sample, header)))
}
