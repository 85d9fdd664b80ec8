use std::collections::BTreeSet;

use num_enum::{FromPrimitive, IntoPrimitive};
use strum_macros::Display;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::constants::FEATURE_READ_MARKER;
use crate::error::PmdError;

/// Measurement types carried in byte 0 of data frames and in control point messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, IntoPrimitive, FromPrimitive)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum PmdMeasurementType {
    #[strum(to_string = "ECG")]
    Ecg = 0,
    #[strum(to_string = "PPG")]
    Ppg = 1,
    #[strum(to_string = "ACC")]
    Acc = 2,
    #[strum(to_string = "PPI")]
    Ppi = 3,
    #[strum(to_string = "GYRO")]
    Gyro = 5,
    #[strum(to_string = "MAGNETOMETER")]
    Magnetometer = 6,
    #[strum(to_string = "SDK_MODE")]
    SdkMode = 9,
    #[strum(to_string = "LOCATION")]
    Location = 10,
    #[strum(to_string = "PRESSURE")]
    Pressure = 11,
    #[strum(to_string = "TEMPERATURE")]
    Temperature = 12,
    #[strum(to_string = "OFFLINE_RECORDING")]
    OfflineRecording = 13,
    #[strum(to_string = "OFFLINE_HR")]
    OfflineHr = 14,
    #[strum(to_string = "SKIN_TEMPERATURE")]
    SkinTemperature = 15,

    #[num_enum(catch_all)]
    Unknown(u8),
}

impl PmdMeasurementType {
    /// Whether this type is a data stream that can be started and decoded
    pub fn is_data_type(&self) -> bool {
        !matches!(
            self,
            PmdMeasurementType::SdkMode | PmdMeasurementType::OfflineRecording | PmdMeasurementType::Unknown(_)
        )
    }
}

/// Recording target OR-ed into the measurement type byte of a start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Default, IntoPrimitive)]
#[repr(u8)]
pub enum PmdRecordingType {
    #[default]
    Online = 0x00,
    Offline = 0x80,
}

impl PmdRecordingType {
    /// Measurement type byte as sent in a start request
    pub fn type_byte(self, measurement_type: PmdMeasurementType) -> u8 {
        u8::from(measurement_type) | u8::from(self)
    }
}

/// Measurement types advertised by the PMD feature characteristic.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PmdFeature {
    pub supported: BTreeSet<PmdMeasurementType>,
}

impl PmdFeature {
    /// Parse a feature read: `0x0F` followed by a little-endian support bitmask.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PmdError> {
        let (&marker, mask) = bytes
            .split_first()
            .ok_or(PmdError::InsufficientData { expected: 2, actual: 0 })?;
        if marker != FEATURE_READ_MARKER {
            return Err(PmdError::InvalidFrame(format!(
                "feature read must start with {FEATURE_READ_MARKER:#04x}, got {marker:#04x}"
            )));
        }

        let supported = mask
            .iter()
            .take(32)
            .enumerate()
            .flat_map(|(byte_index, &byte)| {
                (0..8u8)
                    .filter(move |bit| byte & (1u8 << *bit) != 0)
                    .map(move |bit| PmdMeasurementType::from_primitive(byte_index as u8 * 8 + bit))
            })
            .filter(PmdMeasurementType::is_data_type)
            .collect();

        Ok(Self { supported })
    }

    pub fn is_supported(&self, measurement_type: PmdMeasurementType) -> bool {
        self.supported.contains(&measurement_type)
    }
}
