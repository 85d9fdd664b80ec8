pub mod bits;
pub mod constants;
pub mod control_point;
pub mod delta;
pub mod ecg;
pub mod error;
pub mod frame;
pub mod location;
pub mod measurement;
pub mod motion;
pub mod offline_hr;
pub mod ppg;
pub mod ppi;
pub mod scalar;
pub mod secret;
pub mod setting;
pub mod timestamp;

// Re-export the types needed to decode a stream
pub use error::PmdError;
pub use frame::{DecodeContext, FrameHeader, PmdData, PmdDataFrame, TimedSample, decode_frame};
pub use measurement::{PmdFeature, PmdMeasurementType, PmdRecordingType};
pub use secret::{PmdSecret, SecretStrategy};
pub use setting::{PmdSetting, PmdSettingType};
