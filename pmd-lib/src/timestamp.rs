//! Per-sample timestamp reconstruction.
//!
//! A data frame carries one timestamp, that of its last sample. Earlier
//! samples are placed either by interpolating from the previous frame's
//! timestamp or, for the first frame of a stream, by stepping back from the
//! frame timestamp at the nominal sample rate.

use chrono::{DateTime, TimeDelta, Utc};

use crate::constants::{DEVICE_EPOCH_UNIX_SECONDS, NANOS_PER_SECOND};
use crate::error::PmdError;

/// Timestamps for the `sample_count` samples of a frame, oldest first.
///
/// The last element always equals `frame_timestamp`. With a `previous_timestamp`
/// of 0 the frame is treated as the first of its stream and `sample_rate` must
/// be known.
pub fn get_time_stamps(
    previous_timestamp: u64,
    frame_timestamp: u64,
    sample_count: usize,
    sample_rate: u32,
) -> Result<Vec<u64>, PmdError> {
    if sample_count == 0 {
        return Ok(Vec::new());
    }

    if previous_timestamp == 0 {
        return first_frame_time_stamps(frame_timestamp, sample_count, sample_rate);
    }

    if frame_timestamp < previous_timestamp {
        return Err(PmdError::NonMonotonicTimestamp {
            previous: previous_timestamp,
            current: frame_timestamp,
        });
    }

    let span = u128::from(frame_timestamp - previous_timestamp);
    let count = sample_count as u128;
    Ok((1..=count)
        .map(|step| previous_timestamp + rounded_div(span * step, count) as u64)
        .collect())
}

fn first_frame_time_stamps(frame_timestamp: u64, sample_count: usize, sample_rate: u32) -> Result<Vec<u64>, PmdError> {
    if sample_rate == 0 {
        return Err(PmdError::TimestampAnchorMissing);
    }

    let rate = u128::from(sample_rate);
    (0..sample_count)
        .map(|index| {
            let samples_before_last = (sample_count - 1 - index) as u128;
            let offset = rounded_div(u128::from(NANOS_PER_SECOND) * samples_before_last, rate);
            u64::try_from(offset)
                .ok()
                .and_then(|offset| frame_timestamp.checked_sub(offset))
                .ok_or(PmdError::NegativeTimestamp {
                    frame_timestamp,
                    offset: offset.min(u128::from(u64::MAX)) as u64,
                })
        })
        .collect()
}

/// Round-half-up integer division
fn rounded_div(numerator: u128, denominator: u128) -> u128 {
    (numerator + denominator / 2) / denominator
}

/// Convert a device timestamp (nanoseconds since 2000-01-01T00:00:00Z) to UTC.
pub fn device_time_to_utc(device_nanos: u64) -> Option<DateTime<Utc>> {
    let epoch = DateTime::from_timestamp(DEVICE_EPOCH_UNIX_SECONDS, 0)?;
    let nanos = i64::try_from(device_nanos).ok()?;
    epoch.checked_add_signed(TimeDelta::nanoseconds(nanos))
}
