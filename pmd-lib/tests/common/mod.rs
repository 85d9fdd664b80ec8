//! Common test utilities and shared imports

// Allow unused imports and dead code since this is a shared module
// used across multiple test files - not all items are used in every test file
#[allow(unused_imports)]
pub use bytes::Bytes;
#[allow(unused_imports)]
pub use hex;
#[allow(unused_imports)]
pub use pmd_lib::delta::{ChannelSpec, SampleEncoding, decode_delta_frame, encode_delta_frame};
#[allow(unused_imports)]
pub use pmd_lib::error::PmdError;
#[allow(unused_imports)]
pub use pmd_lib::frame::{DecodeContext, FrameHeader, PmdData, PmdDataFrame, RawFrame, decode_frame};
#[allow(unused_imports)]
pub use pmd_lib::measurement::PmdMeasurementType;
#[allow(unused_imports)]
pub use pmd_lib::secret::{PmdSecret, SecretStrategy};
#[allow(unused_imports)]
pub use pmd_lib::setting::{PmdSetting, PmdSettingType};

/// Route library logs to the test harness; set RUST_LOG=pmd_lib=trace to see them
#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Decode hex string (whitespace allowed) to bytes for testing
#[allow(dead_code)]
pub fn hex_to_bytes(hex_data: &str) -> Bytes {
    let compact: String = hex_data.split_whitespace().collect();
    Bytes::from(hex::decode(compact).expect("Failed to decode hex"))
}

/// Build a data frame notification from header fields and payload
#[allow(dead_code)]
pub fn build_frame(
    measurement_type: PmdMeasurementType,
    timestamp: u64,
    frame_type: u8,
    compressed: bool,
    payload: &[u8],
) -> Bytes {
    let header = FrameHeader {
        measurement_type,
        timestamp,
        frame_type,
        compressed,
    };
    let mut frame = header.to_bytes().to_vec();
    frame.extend_from_slice(payload);
    Bytes::from(frame)
}

/// ECG header vector: type ECG, timestamp 946833049921875000, frame type 3, payload FF
#[allow(dead_code)]
pub const ECG_HEADER_VECTOR: &str = "00 38 6C 31 72 A4 D3 23 0D 03 FF";

/// ACC capability advertisement: 52 Hz, 16 bit, four ranges, three channels
#[allow(dead_code)]
pub const ACC_SETTINGS_VECTOR: &str = "00 01 34 00 01 01 10 00 02 04 F5 00 F4 01 E8 03 D0 07 04 01 03";

/// AES-128 key from FIPS-197 appendix C.1
#[allow(dead_code)]
pub const AES128_KEY: &str = "000102030405060708090a0b0c0d0e0f";
