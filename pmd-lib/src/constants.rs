// Protocol constants for the PMD service

/// Size of the measurement data frame header (10 bytes)
pub const FRAME_HEADER_SIZE: usize = 10;

/// Mask for the frame type enumerator in the frame type byte
pub const FRAME_TYPE_MASK: u8 = 0x7F;

/// Size of a TLV record header (type + value count)
pub const SETTING_RECORD_HEADER_SIZE: usize = 2;

/// Block size of the AES ciphers used for encrypted streams
pub const CIPHER_BLOCK_SIZE: usize = 16;

/// Response code leading every control point response
pub const CONTROL_POINT_RESPONSE_CODE: u8 = 0xF0;

/// Minimum size of a control point response (response code, op code, type, status)
pub const CONTROL_POINT_RESPONSE_MIN_SIZE: usize = 4;

/// Size of the full control point response prefix including the `more` byte
pub const CONTROL_POINT_RESPONSE_PREFIX_SIZE: usize = 5;

/// First byte of a PMD feature characteristic read
pub const FEATURE_READ_MARKER: u8 = 0x0F;

/// Nanoseconds per second, used for sample interval computation
pub const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// Device clock epoch (2000-01-01T00:00:00Z) in UNIX seconds
pub const DEVICE_EPOCH_UNIX_SECONDS: i64 = 946_684_800;

/// Widest delta or reference field supported by the delta codec
pub const MAX_FIELD_BITS: u8 = 32;

/// Maximum sample count of a single delta block (one byte on the wire)
pub const MAX_BLOCK_SAMPLES: usize = u8::MAX as usize;
