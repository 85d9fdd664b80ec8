//! Measurement data frame header and per-type dispatch.
//!
//! Every notification on the PMD data characteristic is a 10-byte header
//! followed by a type-specific payload:
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0 | 1 | measurement type |
//! | 1 | 8 | timestamp of the last sample, ns since 2000-01-01 (LE) |
//! | 9 | 1 | bit 7 compressed, bits 0-6 frame type |
//! | 10 | .. | payload, encrypted when the stream negotiated a secret |

use bytes::Bytes;
use modular_bitfield::prelude::*;
use tracing::debug;
use zerocopy::byteorder::little_endian::U64;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::bits::sign_extend;
use crate::constants::{FRAME_HEADER_SIZE, FRAME_TYPE_MASK};
use crate::ecg::{self, EcgSample};
use crate::error::PmdError;
use crate::location::{self, LocationSample};
use crate::measurement::PmdMeasurementType;
use crate::motion::{self, Xyz};
use crate::offline_hr::{self, OfflineHrSample};
use crate::ppg::{self, PpgSample};
use crate::ppi::{self, PpiSample};
use crate::scalar;
use crate::secret::PmdSecret;
use crate::setting::PmdSetting;
use crate::timestamp::get_time_stamps;

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct FrameHeaderRaw {
    pub measurement_type: u8,
    pub timestamp: U64,
    pub frame_type: u8,
}

#[bitfield(bytes = 1)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTypeByte {
    pub frame_type: B7,
    pub compressed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FrameHeader {
    pub measurement_type: PmdMeasurementType,
    /// Device clock of the last sample in the frame, ns since 2000-01-01
    pub timestamp: u64,
    pub frame_type: u8,
    pub compressed: bool,
}

impl From<FrameHeaderRaw> for FrameHeader {
    fn from(raw: FrameHeaderRaw) -> Self {
        let type_byte = FrameTypeByte::from_bytes([raw.frame_type]);
        FrameHeader {
            measurement_type: PmdMeasurementType::from(raw.measurement_type),
            timestamp: raw.timestamp.get(),
            frame_type: type_byte.frame_type(),
            compressed: type_byte.compressed(),
        }
    }
}

impl From<FrameHeader> for FrameHeaderRaw {
    fn from(header: FrameHeader) -> Self {
        let type_byte = FrameTypeByte::new()
            .with_frame_type(header.frame_type & FRAME_TYPE_MASK)
            .with_compressed(header.compressed);
        FrameHeaderRaw {
            measurement_type: header.measurement_type.into(),
            timestamp: U64::new(header.timestamp),
            frame_type: type_byte.into_bytes()[0],
        }
    }
}

impl FrameHeader {
    /// Split a frame into its header and the (still encrypted) payload.
    pub fn parse(bytes: &[u8]) -> Result<(Self, &[u8]), PmdError> {
        let (raw, payload) = FrameHeaderRaw::ref_from_prefix(bytes).map_err(|_| PmdError::InsufficientData {
            expected: FRAME_HEADER_SIZE,
            actual: bytes.len(),
        })?;
        Ok((FrameHeader::from(*raw), payload))
    }

    pub fn to_bytes(&self) -> [u8; FRAME_HEADER_SIZE] {
        let mut out = [0u8; FRAME_HEADER_SIZE];
        out.copy_from_slice(FrameHeaderRaw::from(*self).as_bytes());
        out
    }

    pub fn format(&self) -> FrameFormat {
        FrameFormat {
            measurement_type: self.measurement_type,
            frame_type: self.frame_type,
            compressed: self.compressed,
        }
    }
}

/// Per-stream state the caller threads from one frame to the next.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeContext {
    /// Timestamp of the previous frame of this stream, 0 for the first frame
    pub previous_timestamp: u64,
    /// Nominal sample rate in Hz, 0 when unknown
    pub sample_rate: u32,
    /// Scale applied to integer motion samples
    pub factor: f32,
    pub secret: Option<PmdSecret>,
}

impl Default for DecodeContext {
    fn default() -> Self {
        Self {
            previous_timestamp: 0,
            sample_rate: 0,
            factor: 1.0,
            secret: None,
        }
    }
}

impl DecodeContext {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            ..Self::default()
        }
    }

    /// Take sample rate and factor from the negotiated stream settings.
    pub fn from_setting(setting: &PmdSetting) -> Self {
        Self {
            sample_rate: setting.sample_rate().unwrap_or(0),
            factor: setting.factor().unwrap_or(1.0),
            ..Self::default()
        }
    }

    pub fn with_secret(self, secret: PmdSecret) -> Self {
        Self {
            secret: Some(secret),
            ..self
        }
    }

    pub fn with_previous_timestamp(self, previous_timestamp: u64) -> Self {
        Self {
            previous_timestamp,
            ..self
        }
    }

    /// Context for the frame following `frame`.
    pub fn advance(&self, frame: &PmdDataFrame) -> Self {
        Self {
            previous_timestamp: frame.header.timestamp,
            ..self.clone()
        }
    }
}

/// A decoded sample with its reconstructed device timestamp.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TimedSample<T> {
    pub timestamp: u64,
    pub sample: T,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PmdData {
    Ecg(Vec<TimedSample<EcgSample>>),
    Ppg(Vec<TimedSample<PpgSample>>),
    Acc(Vec<TimedSample<Xyz<i32>>>),
    Gyro(Vec<TimedSample<Xyz<f32>>>),
    Magnetometer(Vec<TimedSample<Xyz<f32>>>),
    Pressure(Vec<TimedSample<f32>>),
    Temperature(Vec<TimedSample<f32>>),
    SkinTemperature(Vec<TimedSample<f32>>),
    /// PPI samples carry no timestamps of their own
    Ppi(Vec<PpiSample>),
    Location(Vec<TimedSample<LocationSample>>),
    OfflineHr(Vec<TimedSample<OfflineHrSample>>),
}

impl PmdData {
    pub fn len(&self) -> usize {
        match self {
            PmdData::Ecg(samples) => samples.len(),
            PmdData::Ppg(samples) => samples.len(),
            PmdData::Acc(samples) => samples.len(),
            PmdData::Gyro(samples) | PmdData::Magnetometer(samples) => samples.len(),
            PmdData::Pressure(samples) | PmdData::Temperature(samples) | PmdData::SkinTemperature(samples) => {
                samples.len()
            }
            PmdData::Ppi(samples) => samples.len(),
            PmdData::Location(samples) => samples.len(),
            PmdData::OfflineHr(samples) => samples.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A fully decoded data frame.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PmdDataFrame {
    pub header: FrameHeader,
    pub data: PmdData,
}

/// Header plus undecoded payload, split off a notification.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    pub header: FrameHeader,
    pub payload: Bytes,
}

impl TryFrom<Bytes> for RawFrame {
    type Error = PmdError;

    fn try_from(mut bytes: Bytes) -> Result<Self, Self::Error> {
        if bytes.len() < FRAME_HEADER_SIZE {
            return Err(PmdError::InsufficientData {
                expected: FRAME_HEADER_SIZE,
                actual: bytes.len(),
            });
        }
        let header_bytes = bytes.split_to(FRAME_HEADER_SIZE);
        let (header, _) = FrameHeader::parse(&header_bytes)?;
        Ok(RawFrame { header, payload: bytes })
    }
}

impl RawFrame {
    /// Decrypt the payload with the stream secret and decode it.
    pub fn decode(&self, ctx: &DecodeContext) -> Result<PmdDataFrame, PmdError> {
        let payload = match &ctx.secret {
            Some(secret) => secret.decrypt(&self.payload)?,
            None => self.payload.to_vec(),
        };

        let decoder = lookup_decoder(self.header.format())?;
        let data = decoder(&payload, &self.header, ctx)?;
        debug!(
            "Decoded {} frame type {} (compressed: {}): {} samples",
            self.header.measurement_type,
            self.header.frame_type,
            self.header.compressed,
            data.len()
        );

        Ok(PmdDataFrame {
            header: self.header,
            data,
        })
    }
}

/// Decode one data frame notification.
pub fn decode_frame(bytes: impl Into<Bytes>, ctx: &DecodeContext) -> Result<PmdDataFrame, PmdError> {
    RawFrame::try_from(bytes.into())?.decode(ctx)
}

/// Dispatch key of a frame layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameFormat {
    pub measurement_type: PmdMeasurementType,
    pub frame_type: u8,
    pub compressed: bool,
}

pub(crate) type FrameDecoder = fn(&[u8], &FrameHeader, &DecodeContext) -> Result<PmdData, PmdError>;

const fn raw(measurement_type: PmdMeasurementType, frame_type: u8) -> FrameFormat {
    FrameFormat {
        measurement_type,
        frame_type,
        compressed: false,
    }
}

const fn compressed(measurement_type: PmdMeasurementType, frame_type: u8) -> FrameFormat {
    FrameFormat {
        measurement_type,
        frame_type,
        compressed: true,
    }
}

static DECODERS: &[(FrameFormat, FrameDecoder)] = &[
    (raw(PmdMeasurementType::Ecg, 0), ecg::decode_voltage),
    (raw(PmdMeasurementType::Ecg, 1), ecg::decode_flagged),
    (raw(PmdMeasurementType::Ecg, 2), ecg::decode_tagged),
    (raw(PmdMeasurementType::Ppg, 0), ppg::decode_raw_channels),
    (compressed(PmdMeasurementType::Ppg, 0), ppg::decode_compressed_channels),
    (raw(PmdMeasurementType::Ppg, 4), ppg::decode_gains),
    (raw(PmdMeasurementType::Ppg, 5), ppg::decode_operation_mode),
    (compressed(PmdMeasurementType::Ppg, 7), ppg::decode_extended),
    (raw(PmdMeasurementType::Acc, 0), motion::decode_acc_i8),
    (raw(PmdMeasurementType::Acc, 1), motion::decode_acc_i16),
    (raw(PmdMeasurementType::Acc, 2), motion::decode_acc_i24),
    (compressed(PmdMeasurementType::Acc, 0), motion::decode_acc_compressed),
    (compressed(PmdMeasurementType::Acc, 1), motion::decode_acc_compressed),
    (compressed(PmdMeasurementType::Gyro, 0), motion::decode_gyro_compressed),
    (compressed(PmdMeasurementType::Gyro, 1), motion::decode_gyro_float),
    (compressed(PmdMeasurementType::Magnetometer, 0), motion::decode_magnetometer_compressed),
    (raw(PmdMeasurementType::Pressure, 0), scalar::decode_pressure_raw),
    (compressed(PmdMeasurementType::Pressure, 0), scalar::decode_pressure_compressed),
    (raw(PmdMeasurementType::Temperature, 0), scalar::decode_temperature_raw),
    (compressed(PmdMeasurementType::Temperature, 0), scalar::decode_temperature_compressed),
    (raw(PmdMeasurementType::SkinTemperature, 0), scalar::decode_skin_temperature_raw),
    (compressed(PmdMeasurementType::SkinTemperature, 0), scalar::decode_skin_temperature_compressed),
    (raw(PmdMeasurementType::Ppi, 0), ppi::decode_ppi),
    (raw(PmdMeasurementType::Location, 0), location::decode_coordinates),
    (raw(PmdMeasurementType::Location, 1), location::decode_dilution),
    (raw(PmdMeasurementType::Location, 3), location::decode_nmea),
    (raw(PmdMeasurementType::OfflineHr, 0), offline_hr::decode_heart_rate),
    (raw(PmdMeasurementType::OfflineHr, 1), offline_hr::decode_heart_rate_with_quality),
];

fn lookup_decoder(format: FrameFormat) -> Result<FrameDecoder, PmdError> {
    DECODERS
        .iter()
        .find(|(key, _)| *key == format)
        .map(|(_, decoder)| *decoder)
        .ok_or(PmdError::UnsupportedFrameFormat {
            measurement_type: format.measurement_type,
            frame_type: format.frame_type,
            compressed: format.compressed,
        })
}

/// Whether a decoder exists for this layout.
pub fn is_supported(format: FrameFormat) -> bool {
    lookup_decoder(format).is_ok()
}

/// Split a raw payload into fixed-size records.
pub(crate) fn fixed_records<R, T>(payload: &[u8], convert: impl Fn(&R) -> T) -> Result<Vec<T>, PmdError>
where
    R: FromBytes + KnownLayout + Immutable + Unaligned,
{
    let size = size_of::<R>();
    if payload.len() % size != 0 {
        return Err(PmdError::PayloadLength {
            expected_multiple: size,
            actual: payload.len(),
        });
    }
    payload
        .chunks_exact(size)
        .map(|chunk| {
            R::ref_from_bytes(chunk)
                .map(&convert)
                .map_err(|_| PmdError::InvalidFrame("Failed to parse sample record".to_string()))
        })
        .collect()
}

/// Parse a payload that holds exactly one record.
pub(crate) fn single_record<R>(payload: &[u8]) -> Result<&R, PmdError>
where
    R: FromBytes + KnownLayout + Immutable + Unaligned,
{
    R::ref_from_bytes(payload).map_err(|_| PmdError::PayloadLength {
        expected_multiple: size_of::<R>(),
        actual: payload.len(),
    })
}

/// Attach reconstructed timestamps to the samples of a frame.
pub(crate) fn timed<T>(
    samples: Vec<T>,
    header: &FrameHeader,
    ctx: &DecodeContext,
) -> Result<Vec<TimedSample<T>>, PmdError> {
    let timestamps = get_time_stamps(ctx.previous_timestamp, header.timestamp, samples.len(), ctx.sample_rate)?;
    Ok(samples
        .into_iter()
        .zip(timestamps)
        .map(|(sample, timestamp)| TimedSample { timestamp, sample })
        .collect())
}

/// Single-record frames are stamped with the frame timestamp.
pub(crate) fn at_frame_time<T>(sample: T, header: &FrameHeader) -> Vec<TimedSample<T>> {
    vec![TimedSample {
        timestamp: header.timestamp,
        sample,
    }]
}

pub(crate) fn i24(bytes: [u8; 3]) -> i32 {
    sign_extend(u24(bytes), 24)
}

pub(crate) fn u24(bytes: [u8; 3]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        assert_eq!(size_of::<FrameHeaderRaw>(), FRAME_HEADER_SIZE);
    }

    #[test]
    fn test_parse_header() {
        let bytes = [0x00, 0x38, 0x6C, 0x31, 0x72, 0xA4, 0xD3, 0x23, 0x0D, 0x03, 0xFF];
        let (header, payload) = FrameHeader::parse(&bytes).unwrap();
        assert_eq!(header.measurement_type, PmdMeasurementType::Ecg);
        assert_eq!(header.timestamp, 946_833_049_921_875_000);
        assert!(!header.compressed);
        assert_eq!(header.frame_type, 3);
        assert_eq!(payload, &[0xFF]);
    }

    #[test]
    fn test_header_to_bytes() {
        let header = FrameHeader {
            measurement_type: PmdMeasurementType::Acc,
            timestamp: 0x0102_0304_0506_0708,
            frame_type: 1,
            compressed: true,
        };
        assert_eq!(
            header.to_bytes(),
            [0x02, 0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01, 0x81]
        );
        let (parsed, _) = FrameHeader::parse(&header.to_bytes()).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn test_short_header() {
        assert_eq!(
            FrameHeader::parse(&[0x00; 9]),
            Err(PmdError::InsufficientData { expected: 10, actual: 9 })
        );
    }

    #[test]
    fn test_dispatch_table_has_unique_keys() {
        for (index, (format, _)) in DECODERS.iter().enumerate() {
            assert!(
                DECODERS[index + 1..].iter().all(|(other, _)| other != format),
                "duplicate decoder for {format:?}"
            );
        }
    }

    #[test]
    fn test_unknown_format() {
        let format = FrameFormat {
            measurement_type: PmdMeasurementType::Ecg,
            frame_type: 3,
            compressed: false,
        };
        assert!(!is_supported(format));
        assert!(is_supported(FrameFormat {
            frame_type: 0,
            ..format
        }));
    }

    #[test]
    fn test_fixed_records_length_check() {
        let result = fixed_records::<[u8; 3], _>(&[0; 7], |b| i24(*b));
        assert_eq!(
            result,
            Err(PmdError::PayloadLength {
                expected_multiple: 3,
                actual: 7
            })
        );
        assert_eq!(fixed_records::<[u8; 3], _>(&[0xFF, 0xFF, 0xFF], |b| i24(*b)), Ok(vec![-1]));
    }

    #[test]
    fn test_context_advance() {
        let ctx = DecodeContext::new(130);
        let frame = PmdDataFrame {
            header: FrameHeader {
                measurement_type: PmdMeasurementType::Ecg,
                timestamp: 42,
                frame_type: 0,
                compressed: false,
            },
            data: PmdData::Ecg(vec![]),
        };
        let next = ctx.advance(&frame);
        assert_eq!(next.previous_timestamp, 42);
        assert_eq!(next.sample_rate, 130);
        assert_eq!(ctx.previous_timestamp, 0);
    }
}
