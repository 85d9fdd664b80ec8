//! Sensor configuration TLV codec.
//!
//! Every record is `[type, count, values...]`; the byte width of each value is
//! fixed by the type. The device advertises its capabilities as a sequence of
//! such records (several values per type) and the host requests a
//! configuration with exactly one value per type.
//!
//! SECURITY is the exception: with a count of one the record is a strategy
//! byte followed by the key, sized by the strategy. With any other count it
//! lists the strategies the device supports, one byte each.

use std::collections::{BTreeMap, BTreeSet};

use bytes::Buf;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use strum_macros::Display;
use tracing::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::constants::SETTING_RECORD_HEADER_SIZE;
use crate::error::PmdError;
use crate::secret::{PmdSecret, SecretStrategy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum PmdSettingType {
    #[strum(to_string = "SAMPLE_RATE")]
    SampleRate = 0,
    #[strum(to_string = "RESOLUTION")]
    Resolution = 1,
    #[strum(to_string = "RANGE")]
    Range = 2,
    #[strum(to_string = "RANGE_MILLIUNIT")]
    RangeMilliunit = 3,
    #[strum(to_string = "CHANNELS")]
    Channels = 4,
    #[strum(to_string = "FACTOR")]
    Factor = 5,
    #[strum(to_string = "SECURITY")]
    Security = 6,
}

impl PmdSettingType {
    /// Byte width of one value of this type
    pub fn field_size(&self) -> usize {
        match self {
            PmdSettingType::SampleRate | PmdSettingType::Resolution | PmdSettingType::Range => 2,
            PmdSettingType::RangeMilliunit | PmdSettingType::Factor => 4,
            PmdSettingType::Channels | PmdSettingType::Security => 1,
        }
    }

    /// Whether a host may request this type; FACTOR is computed by the device
    /// and SECURITY travels as its own record.
    pub fn is_settable(&self) -> bool {
        !matches!(self, PmdSettingType::Factor | PmdSettingType::Security)
    }
}

/// Advertised capabilities and the host's selection for one measurement type.
///
/// All values are kept as their raw 32-bit wire representation: RANGE_MILLIUNIT
/// holds the bits of an `i32`, FACTOR the bits of an `f32`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PmdSetting {
    pub settings: BTreeMap<PmdSettingType, BTreeSet<u32>>,
    pub selected: BTreeMap<PmdSettingType, u32>,
    /// Stream secret carried by a keyed SECURITY record.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub secret: Option<PmdSecret>,
}

enum SettingRecord {
    Values(PmdSettingType, Vec<u32>),
    Secret(PmdSecret),
}

impl PmdSetting {
    /// Parse a capability advertisement, merging repeated types.
    pub fn from_bytes(data: &[u8]) -> Result<Self, PmdError> {
        let mut settings: BTreeMap<PmdSettingType, BTreeSet<u32>> = BTreeMap::new();
        let mut secret = None;
        for record in parse_records(data)? {
            match record {
                SettingRecord::Values(setting_type, values) => {
                    settings.entry(setting_type).or_default().extend(values);
                }
                SettingRecord::Secret(record_secret) => {
                    let strategy: u8 = record_secret.strategy().into();
                    settings
                        .entry(PmdSettingType::Security)
                        .or_default()
                        .insert(u32::from(strategy));
                    secret = Some(record_secret);
                }
            }
        }
        debug!("Parsed {} setting types", settings.len());
        Ok(Self {
            settings,
            selected: BTreeMap::new(),
            secret,
        })
    }

    /// Parse a request-form blob where every record carries exactly one value.
    pub fn from_selected_bytes(data: &[u8]) -> Result<Self, PmdError> {
        let mut selected = BTreeMap::new();
        let mut secret = None;
        for record in parse_records(data)? {
            let (setting_type, values) = match record {
                SettingRecord::Values(setting_type, values) => (setting_type, values),
                SettingRecord::Secret(record_secret) => {
                    secret = Some(record_secret);
                    continue;
                }
            };
            match values.as_slice() {
                [value] => {
                    selected.insert(setting_type, *value);
                }
                _ => {
                    return Err(PmdError::InvalidFrame(format!(
                        "selected {setting_type} setting carries {} values",
                        values.len()
                    )));
                }
            }
        }
        Ok(Self {
            secret,
            ..Self::from_selected(selected)
        })
    }

    pub fn from_selected(selected: BTreeMap<PmdSettingType, u32>) -> Self {
        Self {
            settings: BTreeMap::new(),
            selected,
            secret: None,
        }
    }

    /// Select the largest advertised value of every type.
    pub fn max_settings(&self) -> Self {
        let selected = self
            .settings
            .iter()
            .filter(|(setting_type, _)| **setting_type != PmdSettingType::Security)
            .filter_map(|(setting_type, values)| values.last().map(|max| (*setting_type, *max)))
            .collect();
        Self {
            settings: self.settings.clone(),
            selected,
            secret: None,
        }
    }

    /// Serialize the selection, one record per settable type. The secret is
    /// not included; append [`PmdSecret::serialize`] where a request carries one.
    pub fn serialize_selected(&self) -> Vec<u8> {
        let mut out: Vec<u8> = Vec::new();
        for (setting_type, value) in self.selected.iter().filter(|(t, _)| t.is_settable()) {
            out.push((*setting_type).into());
            out.push(1);
            out.extend_from_slice(&value.to_le_bytes()[..setting_type.field_size()]);
        }
        out
    }

    /// The selected value, or the only advertised one.
    pub fn value(&self, setting_type: PmdSettingType) -> Option<u32> {
        self.selected.get(&setting_type).copied().or_else(|| {
            self.settings
                .get(&setting_type)
                .filter(|values| values.len() == 1)
                .and_then(|values| values.first().copied())
        })
    }

    pub fn sample_rate(&self) -> Option<u32> {
        self.value(PmdSettingType::SampleRate)
    }

    pub fn resolution(&self) -> Option<u32> {
        self.value(PmdSettingType::Resolution)
    }

    pub fn range(&self) -> Option<u32> {
        self.value(PmdSettingType::Range)
    }

    pub fn range_milliunit(&self) -> Option<i32> {
        self.value(PmdSettingType::RangeMilliunit).map(|bits| bits as i32)
    }

    pub fn channels(&self) -> Option<u32> {
        self.value(PmdSettingType::Channels)
    }

    pub fn factor(&self) -> Option<f32> {
        self.value(PmdSettingType::Factor).map(f32::from_bits)
    }
}

fn parse_records(data: &[u8]) -> Result<Vec<SettingRecord>, PmdError> {
    let mut buf = data;
    let mut records = Vec::new();

    while buf.has_remaining() {
        if buf.remaining() < SETTING_RECORD_HEADER_SIZE {
            return Err(PmdError::TruncatedSetting {
                setting_type: buf[0],
                expected: SETTING_RECORD_HEADER_SIZE,
                actual: buf.remaining(),
            });
        }
        let type_id = buf.get_u8();
        let count = usize::from(buf.get_u8());
        let setting_type = PmdSettingType::try_from(type_id).map_err(|_| PmdError::UnknownSettingType(type_id))?;

        if setting_type == PmdSettingType::Security && count == 1 {
            records.push(SettingRecord::Secret(read_secret(&mut buf)?));
            continue;
        }

        let width = setting_type.field_size();
        let expected = count * width;
        if buf.remaining() < expected {
            return Err(PmdError::TruncatedSetting {
                setting_type: type_id,
                expected,
                actual: buf.remaining(),
            });
        }

        let values: Vec<u32> = (0..count)
            .map(|_| match width {
                1 => u32::from(buf.get_u8()),
                2 => u32::from(buf.get_u16_le()),
                _ => buf.get_u32_le(),
            })
            .collect();
        if setting_type == PmdSettingType::Security {
            for value in &values {
                let strategy = *value as u8;
                SecretStrategy::try_from(strategy).map_err(|_| PmdError::UnknownSecretStrategy(strategy))?;
            }
        }
        records.push(SettingRecord::Values(setting_type, values));
    }

    Ok(records)
}

/// Strategy byte and key of a keyed SECURITY record.
fn read_secret(buf: &mut &[u8]) -> Result<PmdSecret, PmdError> {
    let security: u8 = PmdSettingType::Security.into();
    if !buf.has_remaining() {
        return Err(PmdError::TruncatedSetting {
            setting_type: security,
            expected: 1,
            actual: 0,
        });
    }
    let strategy_byte = buf.get_u8();
    let strategy =
        SecretStrategy::try_from(strategy_byte).map_err(|_| PmdError::UnknownSecretStrategy(strategy_byte))?;

    let length = strategy.wire_key_length();
    if buf.remaining() < length {
        return Err(PmdError::TruncatedSetting {
            setting_type: security,
            expected: length,
            actual: buf.remaining(),
        });
    }
    let key = buf[..length].to_vec();
    buf.advance(length);
    PmdSecret::new(strategy, key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_sizes() {
        assert_eq!(PmdSettingType::SampleRate.field_size(), 2);
        assert_eq!(PmdSettingType::RangeMilliunit.field_size(), 4);
        assert_eq!(PmdSettingType::Channels.field_size(), 1);
        assert_eq!(PmdSettingType::Factor.field_size(), 4);
    }

    #[test]
    fn test_factor_record() {
        let mut data = vec![0x05, 0x01];
        data.extend_from_slice(&0.5f32.to_le_bytes());
        let setting = PmdSetting::from_bytes(&data).unwrap();
        assert_eq!(setting.factor(), Some(0.5));
    }

    #[test]
    fn test_range_milliunit_is_signed() {
        let mut data = vec![0x03, 0x01];
        data.extend_from_slice(&(-2000i32).to_le_bytes());
        let setting = PmdSetting::from_bytes(&data).unwrap();
        assert_eq!(setting.range_milliunit(), Some(-2000));
    }

    #[test]
    fn test_keyed_security_record() {
        let data = [0x06, 0x01, 0x01, 0xAB, 0x04, 0x01, 0x03];
        let setting = PmdSetting::from_bytes(&data).unwrap();
        assert_eq!(setting.channels(), Some(3));
        assert_eq!(setting.secret.as_ref().map(PmdSecret::key), Some(&[0xAB][..]));
        assert_eq!(setting.settings[&PmdSettingType::Security], BTreeSet::from([1]));
    }

    #[test]
    fn test_security_record_errors() {
        assert_eq!(
            PmdSetting::from_bytes(&[0x06, 0x01, 0x09]),
            Err(PmdError::UnknownSecretStrategy(0x09))
        );
        assert_eq!(
            PmdSetting::from_bytes(&[0x06, 0x02, 0x00, 0x07]),
            Err(PmdError::UnknownSecretStrategy(0x07))
        );
        assert_eq!(
            PmdSetting::from_selected_bytes(&[0x06, 0x01, 0x02, 0x00, 0x01]),
            Err(PmdError::TruncatedSetting {
                setting_type: 0x06,
                expected: 16,
                actual: 2
            })
        );
        assert_eq!(
            PmdSetting::from_bytes(&[0x06, 0x01]),
            Err(PmdError::TruncatedSetting {
                setting_type: 0x06,
                expected: 1,
                actual: 0
            })
        );
    }

    #[test]
    fn test_value_prefers_selection() {
        let mut setting = PmdSetting::from_bytes(&[0x00, 0x02, 0x19, 0x00, 0x32, 0x00]).unwrap();
        assert_eq!(setting.sample_rate(), None);
        setting.selected.insert(PmdSettingType::SampleRate, 25);
        assert_eq!(setting.sample_rate(), Some(25));
    }
}
