//! Delta-compressed sample codec.
//!
//! A compressed payload starts with one reference sample (every channel stored
//! in `ceil(resolution / 8)` little-endian bytes) followed by any number of
//! delta blocks:
//!
//! | Bytes | Field |
//! |-------|-------|
//! | 1 | `delta_bits`, width of every delta in the block |
//! | 1 | `sample_count`, samples encoded by the block |
//! | `ceil(delta_bits * sample_count * channels / 8)` | LSB-first packed deltas, channel-major per sample |
//!
//! Samples are rebuilt by adding each delta to the previous sample of the same
//! channel with wrapping 32-bit integer arithmetic. Float channels take part in
//! this as their raw IEEE-754 bit pattern, so the deltas move the bits, not the
//! floating-point value.

use strum_macros::Display;
use tracing::trace;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::bits::{BitReader, BitWriter, mask, sign_extend, signed_width};
use crate::constants::{MAX_BLOCK_SAMPLES, MAX_FIELD_BITS};
use crate::error::PmdError;

/// Numeric interpretation of a channel value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SampleEncoding {
    #[strum(to_string = "SIGNED_INT")]
    SignedInt,
    #[strum(to_string = "UNSIGNED_INT")]
    UnsignedInt,
    #[strum(to_string = "FLOAT_IEEE754")]
    Float,
}

/// Layout of one channel group, taken from the negotiated stream settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ChannelSpec {
    pub channels: usize,
    pub resolution: u8,
    pub encoding: SampleEncoding,
}

impl ChannelSpec {
    pub const fn new(channels: usize, resolution: u8, encoding: SampleEncoding) -> Self {
        Self {
            channels,
            resolution,
            encoding,
        }
    }

    /// Bytes used by one channel of the reference sample
    pub fn reference_bytes(&self) -> usize {
        usize::from(self.resolution).div_ceil(8)
    }

    fn validate(&self) -> Result<(), PmdError> {
        if self.resolution == 0 || self.resolution > MAX_FIELD_BITS {
            return Err(PmdError::InvalidResolution(self.resolution));
        }
        if self.channels == 0 {
            return Err(PmdError::InvalidFrame("channel count must be at least 1".to_string()));
        }
        Ok(())
    }

    fn read_reference(&self, bytes: &[u8]) -> i32 {
        let mut le = [0u8; 4];
        le[..bytes.len()].copy_from_slice(bytes);
        let value = mask(u32::from_le_bytes(le), self.resolution);
        match self.encoding {
            SampleEncoding::SignedInt => sign_extend(value, self.resolution),
            SampleEncoding::UnsignedInt | SampleEncoding::Float => value as i32,
        }
    }

    fn fits_reference(&self, value: i32) -> bool {
        let bits = mask(value as u32, self.resolution);
        match self.encoding {
            SampleEncoding::SignedInt => sign_extend(bits, self.resolution) == value,
            SampleEncoding::UnsignedInt | SampleEncoding::Float => bits == value as u32,
        }
    }
}

/// A run of samples sharing one delta width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaBlock {
    pub delta_bits: u8,
    pub sample_count: u8,
    /// `channels * sample_count` sign-extended deltas, channel-major per sample
    pub deltas: Vec<i32>,
}

/// Reference sample plus delta blocks of one compressed payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaFrame {
    pub spec: ChannelSpec,
    pub reference: Vec<i32>,
    pub blocks: Vec<DeltaBlock>,
}

impl DeltaFrame {
    /// Number of logical samples: the reference plus every block's samples
    pub fn sample_count(&self) -> usize {
        1 + self
            .blocks
            .iter()
            .map(|block| usize::from(block.sample_count))
            .sum::<usize>()
    }

    /// Accumulated raw 32-bit values of every sample, one `Vec` per sample.
    pub fn raw_samples(&self) -> Vec<Vec<i32>> {
        let deltas = self
            .blocks
            .iter()
            .flat_map(|block| block.deltas.chunks_exact(self.spec.channels));

        let accumulated = deltas.scan(self.reference.clone(), |current, delta| {
            for (value, delta) in current.iter_mut().zip(delta) {
                *value = value.wrapping_add(*delta);
            }
            Some(current.clone())
        });

        std::iter::once(self.reference.clone()).chain(accumulated).collect()
    }

    pub fn unsigned_samples(&self) -> Vec<Vec<u32>> {
        self.raw_samples()
            .into_iter()
            .map(|sample| sample.into_iter().map(|v| v as u32).collect())
            .collect()
    }

    /// Samples reinterpreted as IEEE-754 binary32 values.
    pub fn float_samples(&self) -> Vec<Vec<f32>> {
        self.raw_samples()
            .into_iter()
            .map(|sample| sample.into_iter().map(|v| f32::from_bits(v as u32)).collect())
            .collect()
    }
}

/// Decode one compressed payload.
pub fn decode_delta_frame(payload: &[u8], spec: ChannelSpec) -> Result<DeltaFrame, PmdError> {
    spec.validate()?;

    let reference_size = spec.channels * spec.reference_bytes();
    if payload.len() < reference_size {
        return Err(PmdError::InsufficientData {
            expected: reference_size,
            actual: payload.len(),
        });
    }
    let reference = payload[..reference_size]
        .chunks_exact(spec.reference_bytes())
        .map(|bytes| spec.read_reference(bytes))
        .collect();

    let mut blocks = Vec::new();
    let mut offset = reference_size;
    while offset < payload.len() {
        let available = (payload.len() - offset) * 8;
        let [delta_bits, sample_count] = payload
            .get(offset..offset + 2)
            .and_then(|header| <[u8; 2]>::try_from(header).ok())
            .ok_or(PmdError::BitStreamExhausted { requested: 16, available })?;
        offset += 2;

        if delta_bits > MAX_FIELD_BITS {
            return Err(PmdError::InvalidDeltaWidth(delta_bits));
        }

        let value_count = usize::from(sample_count) * spec.channels;
        let bit_length = usize::from(delta_bits) * value_count;
        let data = payload
            .get(offset..offset + bit_length.div_ceil(8))
            .ok_or(PmdError::BitStreamExhausted {
                requested: bit_length,
                available: (payload.len() - offset) * 8,
            })?;

        let mut reader = BitReader::new(data);
        let deltas = (0..value_count)
            .map(|_| reader.read_signed(delta_bits))
            .collect::<Result<Vec<_>, _>>()?;
        trace!(delta_bits, sample_count, "Decoded delta block");

        blocks.push(DeltaBlock {
            delta_bits,
            sample_count,
            deltas,
        });
        offset += data.len();
    }

    Ok(DeltaFrame {
        spec,
        reference,
        blocks,
    })
}

/// Encode raw 32-bit samples (one `Vec` per sample) into a compressed payload.
///
/// Blocks hold up to 255 samples and use the narrowest width covering their deltas.
pub fn encode_delta_frame(samples: &[Vec<i32>], spec: ChannelSpec) -> Result<Vec<u8>, PmdError> {
    spec.validate()?;

    let (reference, _) = samples.split_first().ok_or(PmdError::EmptyFrame)?;
    if let Some(bad) = samples.iter().find(|sample| sample.len() != spec.channels) {
        return Err(PmdError::InvalidFrame(format!(
            "sample has {} channels, expected {}",
            bad.len(),
            spec.channels
        )));
    }
    if let Some(value) = reference.iter().find(|value| !spec.fits_reference(**value)) {
        return Err(PmdError::InvalidFrame(format!(
            "reference value {value} does not fit {} bits",
            spec.resolution
        )));
    }

    let mut out = Vec::new();
    for value in reference {
        out.extend_from_slice(&(*value as u32).to_le_bytes()[..spec.reference_bytes()]);
    }

    let deltas: Vec<Vec<i32>> = samples
        .windows(2)
        .map(|pair| {
            pair[1]
                .iter()
                .zip(&pair[0])
                .map(|(next, prev)| next.wrapping_sub(*prev))
                .collect()
        })
        .collect();

    for block in deltas.chunks(MAX_BLOCK_SAMPLES) {
        let delta_bits = block
            .iter()
            .flatten()
            .map(|delta| signed_width(*delta))
            .max()
            .unwrap_or(1);

        let mut writer = BitWriter::new();
        for delta in block.iter().flatten() {
            writer.write_bits(*delta as u32, delta_bits)?;
        }

        out.push(delta_bits);
        out.push(block.len() as u8);
        out.extend_from_slice(&writer.into_bytes());
    }

    Ok(out)
}
