//! Tests for per-sample timestamp reconstruction

mod common;

use common::*;
use pmd_lib::timestamp::{device_time_to_utc, get_time_stamps};

#[test]
fn test_one_hertz_from_frame_timestamp() {
    let stamps = get_time_stamps(0, 10_000_000_000, 10, 1).unwrap();
    assert_eq!(
        stamps,
        vec![
            1_000_000_000,
            2_000_000_000,
            3_000_000_000,
            4_000_000_000,
            5_000_000_000,
            6_000_000_000,
            7_000_000_000,
            8_000_000_000,
            9_000_000_000,
            10_000_000_000,
        ]
    );
}

#[test]
fn test_interpolation_rounds_to_nearest() {
    assert_eq!(
        get_time_stamps(100, 2_000_000_000, 3, 1).unwrap(),
        vec![666_666_733, 1_333_333_367, 2_000_000_000]
    );
}

#[test]
fn test_no_rate_and_no_anchor() {
    assert_eq!(get_time_stamps(0, 100_000, 100, 0), Err(PmdError::TimestampAnchorMissing));
}

#[test]
fn test_rate_reaches_before_device_epoch() {
    assert!(matches!(
        get_time_stamps(0, 100_000, 100, 52),
        Err(PmdError::NegativeTimestamp { .. })
    ));
}

#[test]
fn test_interpolation_without_rate() {
    let stamps = get_time_stamps(1_000, 2_000, 4, 0).unwrap();
    assert_eq!(stamps, vec![1_250, 1_500, 1_750, 2_000]);
}

#[test]
fn test_last_timestamp_is_exact_for_large_values() {
    // device clock values are around 10^18 ns
    let previous = 946_833_049_921_875_000;
    let frame = previous + 1_000_000_007;
    let stamps = get_time_stamps(previous, frame, 73, 130).unwrap();
    assert_eq!(stamps.len(), 73);
    assert_eq!(*stamps.last().unwrap(), frame);
    assert!(stamps.windows(2).all(|pair| pair[0] <= pair[1]));
    assert!(stamps[0] > previous);
}

#[test]
fn test_sample_rate_steps_are_rounded() {
    // 3 Hz: offsets 666_666_667 and 333_333_333
    let stamps = get_time_stamps(0, 1_000_000_000, 3, 3).unwrap();
    assert_eq!(stamps, vec![333_333_333, 666_666_667, 1_000_000_000]);
}

#[test]
fn test_equal_anchors() {
    assert_eq!(get_time_stamps(5_000, 5_000, 3, 0).unwrap(), vec![5_000, 5_000, 5_000]);
}

#[test]
fn test_device_time_conversion() {
    let utc = device_time_to_utc(946_833_049_921_875_000).unwrap();
    assert_eq!(utc.to_rfc3339(), "2030-01-01T17:10:49.921875+00:00");
}
