//! PMD control point: request builders and response parsers.
//!
//! Every response notification starts with the same prefix:
//!
//! | Offset | Field |
//! |--------|-------|
//! | 0 | response code, always `0xF0` |
//! | 1 | op code of the request being answered |
//! | 2 | measurement type |
//! | 3 | status |
//! | 4 | `more`, non-zero when further frames follow (optional) |
//! | 5.. | op-specific parameters |

use bytes::Buf;
use modular_bitfield::prelude::*;
use num_enum::{FromPrimitive, IntoPrimitive, TryFromPrimitive};
use strum_macros::Display;
use tracing::{debug, warn};
use zerocopy::{FromBytes, Immutable, KnownLayout, Unaligned};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::constants::{CONTROL_POINT_RESPONSE_CODE, CONTROL_POINT_RESPONSE_MIN_SIZE, CONTROL_POINT_RESPONSE_PREFIX_SIZE};
use crate::error::PmdError;
use crate::measurement::{PmdMeasurementType, PmdRecordingType};
use crate::secret::PmdSecret;
use crate::setting::PmdSetting;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoPrimitive, FromPrimitive)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum PmdControlPointCommand {
    #[strum(to_string = "GET_MEASUREMENT_SETTINGS")]
    GetMeasurementSettings = 1,
    #[strum(to_string = "REQUEST_MEASUREMENT_START")]
    RequestMeasurementStart = 2,
    #[strum(to_string = "STOP_MEASUREMENT")]
    StopMeasurement = 3,
    #[strum(to_string = "GET_SDK_MODE_SETTINGS")]
    GetSdkModeSettings = 4,
    #[strum(to_string = "GET_MEASUREMENT_STATUS")]
    GetMeasurementStatus = 5,
    #[strum(to_string = "GET_SDK_MODE_STATUS")]
    GetSdkModeStatus = 6,
    #[strum(to_string = "GET_OFFLINE_RECORDING_TRIGGER_STATUS")]
    GetOfflineRecordingTriggerStatus = 7,
    #[strum(to_string = "SET_OFFLINE_RECORDING_TRIGGER_MODE")]
    SetOfflineRecordingTriggerMode = 8,
    #[strum(to_string = "SET_OFFLINE_RECORDING_TRIGGER_SETTINGS")]
    SetOfflineRecordingTriggerSettings = 9,

    #[num_enum(catch_all)]
    Unknown(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum PmdResponseStatus {
    #[strum(to_string = "SUCCESS")]
    Success = 0,
    #[strum(to_string = "ERROR_INVALID_OP_CODE")]
    InvalidOpCode = 1,
    #[strum(to_string = "ERROR_INVALID_MEASUREMENT_TYPE")]
    InvalidMeasurementType = 2,
    #[strum(to_string = "ERROR_NOT_SUPPORTED")]
    NotSupported = 3,
    #[strum(to_string = "ERROR_INVALID_LENGTH")]
    InvalidLength = 4,
    #[strum(to_string = "ERROR_INVALID_PARAMETER")]
    InvalidParameter = 5,
    #[strum(to_string = "ERROR_ALREADY_IN_STATE")]
    AlreadyInState = 6,
    #[strum(to_string = "ERROR_INVALID_RESOLUTION")]
    InvalidResolution = 7,
    #[strum(to_string = "ERROR_INVALID_SAMPLE_RATE")]
    InvalidSampleRate = 8,
    #[strum(to_string = "ERROR_INVALID_RANGE")]
    InvalidRange = 9,
    #[strum(to_string = "ERROR_INVALID_MTU")]
    InvalidMtu = 10,
    #[strum(to_string = "ERROR_INVALID_NUMBER_OF_CHANNELS")]
    InvalidNumberOfChannels = 11,
    #[strum(to_string = "ERROR_INVALID_STATE")]
    InvalidState = 12,
    #[strum(to_string = "ERROR_DEVICE_IN_CHARGER")]
    DeviceInCharger = 13,
}

#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct ControlPointResponseRaw {
    pub response_code: u8,
    pub op_code: u8,
    pub measurement_type: u8,
    pub status: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PmdControlPointResponse {
    pub response_code: u8,
    pub op_code: PmdControlPointCommand,
    pub measurement_type: PmdMeasurementType,
    pub status: PmdResponseStatus,
    pub more: bool,
    pub parameters: Vec<u8>,
}

impl PmdControlPointResponse {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PmdError> {
        let (raw, _) = ControlPointResponseRaw::ref_from_prefix(bytes).map_err(|_| PmdError::InsufficientData {
            expected: CONTROL_POINT_RESPONSE_MIN_SIZE,
            actual: bytes.len(),
        })?;

        if raw.response_code != CONTROL_POINT_RESPONSE_CODE {
            return Err(PmdError::ControlPointResponse(format!(
                "unexpected response code {:#04x}",
                raw.response_code
            )));
        }
        let status = PmdResponseStatus::try_from(raw.status)
            .map_err(|_| PmdError::ControlPointResponse(format!("unknown status {:#04x}", raw.status)))?;

        // `more` is optional
        let more = bytes
            .get(CONTROL_POINT_RESPONSE_MIN_SIZE)
            .is_some_and(|more| *more != 0);
        let parameters = bytes
            .get(CONTROL_POINT_RESPONSE_PREFIX_SIZE..)
            .unwrap_or_default()
            .to_vec();

        Ok(Self {
            response_code: raw.response_code,
            op_code: PmdControlPointCommand::from(raw.op_code),
            measurement_type: PmdMeasurementType::from(raw.measurement_type),
            status,
            more,
            parameters,
        })
    }

    pub fn is_success(&self) -> bool {
        self.status == PmdResponseStatus::Success
    }

    /// Turn a non-success status into an error.
    pub fn into_result(self) -> Result<Self, PmdError> {
        if self.is_success() {
            return Ok(self);
        }
        warn!(
            "{} for {} failed with {}",
            self.op_code, self.measurement_type, self.status
        );
        Err(PmdError::ControlPointResponse(format!(
            "{} for {} failed with {}",
            self.op_code, self.measurement_type, self.status
        )))
    }

    /// Capabilities carried by a GET_MEASUREMENT_SETTINGS response.
    pub fn setting(&self) -> Result<PmdSetting, PmdError> {
        PmdSetting::from_bytes(&self.parameters)
    }
}

#[bitfield(bytes = 1)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasurementStatusByte {
    #[skip]
    unused: B6,
    pub online_active: bool,
    pub offline_active: bool,
}

/// Which recordings of a measurement type are running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PmdActiveMeasurement {
    #[strum(to_string = "NO_ACTIVE_MEASUREMENT")]
    NoActive,
    #[strum(to_string = "ONLINE_MEASUREMENT_ACTIVE")]
    OnlineActive,
    #[strum(to_string = "OFFLINE_MEASUREMENT_ACTIVE")]
    OfflineActive,
    #[strum(to_string = "ONLINE_AND_OFFLINE_MEASUREMENT_ACTIVE")]
    OnlineAndOfflineActive,
}

impl PmdActiveMeasurement {
    pub fn from_status_response(byte: u8) -> Self {
        let status = MeasurementStatusByte::from_bytes([byte]);
        match (status.online_active(), status.offline_active()) {
            (false, false) => PmdActiveMeasurement::NoActive,
            (true, false) => PmdActiveMeasurement::OnlineActive,
            (false, true) => PmdActiveMeasurement::OfflineActive,
            (true, true) => PmdActiveMeasurement::OnlineAndOfflineActive,
        }
    }

    /// Status from the parameters of a GET_MEASUREMENT_STATUS response.
    pub fn from_status_response_params(parameters: &[u8]) -> Result<Self, PmdError> {
        parameters
            .first()
            .map(|byte| Self::from_status_response(*byte))
            .ok_or(PmdError::ControlPointResponse("empty measurement status".to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Default, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum PmdOfflineTriggerMode {
    #[default]
    #[strum(to_string = "TRIGGER_DISABLE")]
    Disabled = 0,
    #[strum(to_string = "TRIGGER_SYSTEM_START")]
    SystemStart = 1,
    #[strum(to_string = "TRIGGER_EXERCISE_START")]
    ExerciseStart = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum PmdOfflineTriggerStatus {
    #[strum(to_string = "TRIGGER_DISABLED")]
    Disabled = 0,
    #[strum(to_string = "TRIGGER_ENABLED")]
    Enabled = 1,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PmdOfflineTriggerEntry {
    pub measurement_type: PmdMeasurementType,
    pub status: PmdOfflineTriggerStatus,
    pub setting: Option<PmdSetting>,
}

/// Offline recording trigger configuration, in device order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PmdOfflineTrigger {
    pub mode: PmdOfflineTriggerMode,
    pub triggers: Vec<PmdOfflineTriggerEntry>,
}

impl PmdOfflineTrigger {
    /// Parse the parameters of a GET_OFFLINE_RECORDING_TRIGGER_STATUS response.
    pub fn parse_from_response(parameters: &[u8]) -> Result<Self, PmdError> {
        let mut buf = parameters;
        if !buf.has_remaining() {
            return Err(PmdError::ControlPointResponse("empty offline trigger status".to_string()));
        }
        let mode_byte = buf.get_u8();
        let mode = PmdOfflineTriggerMode::try_from(mode_byte)
            .map_err(|_| PmdError::ControlPointResponse(format!("unknown trigger mode {mode_byte:#04x}")))?;

        let mut triggers = Vec::new();
        while buf.has_remaining() {
            if buf.remaining() < 2 {
                return Err(PmdError::ControlPointResponse("truncated trigger group".to_string()));
            }
            let status_byte = buf.get_u8();
            let status = PmdOfflineTriggerStatus::try_from(status_byte)
                .map_err(|_| PmdError::ControlPointResponse(format!("unknown trigger status {status_byte:#04x}")))?;
            let measurement_type = PmdMeasurementType::from(buf.get_u8());

            let setting = match status {
                PmdOfflineTriggerStatus::Disabled => None,
                PmdOfflineTriggerStatus::Enabled => {
                    if !buf.has_remaining() {
                        return Err(PmdError::ControlPointResponse(format!(
                            "missing settings length for {measurement_type}"
                        )));
                    }
                    let length = usize::from(buf.get_u8());
                    if buf.remaining() < length {
                        return Err(PmdError::ControlPointResponse(format!(
                            "{measurement_type} trigger settings need {length} bytes, {} left",
                            buf.remaining()
                        )));
                    }
                    let setting_bytes = buf.copy_to_bytes(length);
                    (length > 0).then(|| PmdSetting::from_bytes(&setting_bytes)).transpose()?
                }
            };

            debug!("Offline trigger {measurement_type}: {status}");
            triggers.push(PmdOfflineTriggerEntry {
                measurement_type,
                status,
                setting,
            });
        }

        Ok(Self { mode, triggers })
    }

    pub fn get(&self, measurement_type: PmdMeasurementType) -> Option<&PmdOfflineTriggerEntry> {
        self.triggers
            .iter()
            .find(|entry| entry.measurement_type == measurement_type)
    }
}

pub fn get_measurement_settings(measurement_type: PmdMeasurementType) -> Vec<u8> {
    vec![
        PmdControlPointCommand::GetMeasurementSettings.into(),
        measurement_type.into(),
    ]
}

/// Start request: selected settings followed by the optional security record.
pub fn start_measurement(
    measurement_type: PmdMeasurementType,
    recording: PmdRecordingType,
    setting: &PmdSetting,
    secret: Option<&PmdSecret>,
) -> Vec<u8> {
    let mut request = vec![
        PmdControlPointCommand::RequestMeasurementStart.into(),
        recording.type_byte(measurement_type),
    ];
    request.extend_from_slice(&setting.serialize_selected());
    if let Some(secret) = secret {
        request.extend_from_slice(&secret.serialize());
    }
    request
}

pub fn stop_measurement(measurement_type: PmdMeasurementType) -> Vec<u8> {
    vec![PmdControlPointCommand::StopMeasurement.into(), measurement_type.into()]
}

pub fn get_measurement_status() -> Vec<u8> {
    vec![PmdControlPointCommand::GetMeasurementStatus.into()]
}

pub fn get_offline_trigger_status() -> Vec<u8> {
    vec![PmdControlPointCommand::GetOfflineRecordingTriggerStatus.into()]
}

pub fn set_offline_trigger_mode(mode: PmdOfflineTriggerMode) -> Vec<u8> {
    vec![PmdControlPointCommand::SetOfflineRecordingTriggerMode.into(), mode.into()]
}

/// Enable or disable the offline trigger of one measurement type.
///
/// Settings and secret are only sent when enabling.
pub fn set_offline_trigger_settings(
    measurement_type: PmdMeasurementType,
    status: PmdOfflineTriggerStatus,
    setting: Option<&PmdSetting>,
    secret: Option<&PmdSecret>,
) -> Result<Vec<u8>, PmdError> {
    let mut request = vec![
        PmdControlPointCommand::SetOfflineRecordingTriggerSettings.into(),
        status.into(),
        measurement_type.into(),
    ];

    if status == PmdOfflineTriggerStatus::Enabled {
        let mut body = setting.map(PmdSetting::serialize_selected).unwrap_or_default();
        if let Some(secret) = secret {
            body.extend_from_slice(&secret.serialize());
        }
        let length = u8::try_from(body.len())
            .map_err(|_| PmdError::InvalidFrame(format!("trigger settings of {} bytes do not fit", body.len())))?;
        request.push(length);
        request.extend_from_slice(&body);
    }

    Ok(request)
}
