use thiserror::Error;

use crate::measurement::PmdMeasurementType;
use crate::secret::SecretStrategy;

/// The primary error type for the `pmd-lib` codec.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PmdError {
    #[error("Unsupported frame format: {measurement_type} frame type {frame_type} (compressed: {compressed})")]
    UnsupportedFrameFormat {
        measurement_type: PmdMeasurementType,
        frame_type: u8,
        compressed: bool,
    },

    #[error("Payload length {actual} is not a multiple of the {expected_multiple}-byte sample size")]
    PayloadLength { expected_multiple: usize, actual: usize },

    #[error("Insufficient data: expected at least {expected} bytes, got {actual}")]
    InsufficientData { expected: usize, actual: usize },

    #[error("Bit stream exhausted: requested {requested} bits, {available} available")]
    BitStreamExhausted { requested: usize, available: usize },

    #[error("Invalid delta width {0} (maximum is 32 bits)")]
    InvalidDeltaWidth(u8),

    #[error("Invalid sample resolution {0} (must be 1..=32 bits)")]
    InvalidResolution(u8),

    #[error("Invalid key length {length} for {strategy} secret")]
    InvalidKey { strategy: SecretStrategy, length: usize },

    #[error("Cipher payload length {0} is not a multiple of the 16-byte block size")]
    CipherBlockLength(usize),

    #[error("Unknown secret strategy {0:#04x}")]
    UnknownSecretStrategy(u8),

    #[error("Unknown setting type {0:#04x}")]
    UnknownSettingType(u8),

    #[error("Truncated {setting_type} setting: expected {expected} bytes, got {actual}")]
    TruncatedSetting {
        setting_type: u8,
        expected: usize,
        actual: usize,
    },

    #[error("Control point response error: {0}")]
    ControlPointResponse(String),

    #[error("Negative timestamp: frame timestamp {frame_timestamp} is smaller than the back-computed offset {offset}")]
    NegativeTimestamp { frame_timestamp: u64, offset: u64 },

    #[error("Cannot assign timestamps: sample rate is zero and there is no previous frame timestamp")]
    TimestampAnchorMissing,

    #[error("Frame timestamp {current} precedes previous frame timestamp {previous}")]
    NonMonotonicTimestamp { previous: u64, current: u64 },

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Empty frame")]
    EmptyFrame,
}
