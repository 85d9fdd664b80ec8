//! Payload cipher negotiated per measurement stream.
//!
//! The frame header is always sent in clear; only the payload that follows it
//! is transformed. AES strategies work on independent 16-byte blocks (ECB), so
//! every block can be decrypted without looking at its neighbours.

use std::fmt;

use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::{Aes128, Aes256};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use strum_macros::Display;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::constants::CIPHER_BLOCK_SIZE;
use crate::error::PmdError;
use crate::setting::PmdSettingType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Default, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum SecretStrategy {
    #[default]
    #[strum(to_string = "NONE")]
    None = 0,
    #[strum(to_string = "XOR")]
    Xor = 1,
    #[strum(to_string = "AES128")]
    Aes128 = 2,
    #[strum(to_string = "AES256")]
    Aes256 = 3,
}

impl SecretStrategy {
    /// Key bytes following the strategy byte in a SECURITY record
    pub fn wire_key_length(&self) -> usize {
        match self {
            SecretStrategy::None => 0,
            SecretStrategy::Xor => 1,
            SecretStrategy::Aes128 => 16,
            SecretStrategy::Aes256 => 32,
        }
    }

    fn accepts_key_length(&self, length: usize) -> bool {
        match self {
            SecretStrategy::None => length == 0,
            SecretStrategy::Xor => length >= 1,
            SecretStrategy::Aes128 => length == 16,
            SecretStrategy::Aes256 => length == 32,
        }
    }
}

/// Cipher strategy and key for one measurement stream.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct PmdSecret {
    strategy: SecretStrategy,
    key: Vec<u8>,
}

impl fmt::Debug for PmdSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PmdSecret")
            .field("strategy", &self.strategy)
            .field("key_len", &self.key.len())
            .finish()
    }
}

impl PmdSecret {
    /// Create a secret, validating the key length against the strategy
    pub fn new(strategy: SecretStrategy, key: impl Into<Vec<u8>>) -> Result<Self, PmdError> {
        let key = key.into();
        if !strategy.accepts_key_length(key.len()) {
            return Err(PmdError::InvalidKey {
                strategy,
                length: key.len(),
            });
        }
        Ok(Self { strategy, key })
    }

    /// Identity secret for unencrypted streams
    pub fn none() -> Self {
        Self::default()
    }

    pub fn strategy(&self) -> SecretStrategy {
        self.strategy
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// Decrypt a frame payload.
    pub fn decrypt(&self, payload: &[u8]) -> Result<Vec<u8>, PmdError> {
        match self.strategy {
            SecretStrategy::None => Ok(payload.to_vec()),
            SecretStrategy::Xor => Ok(self.xor(payload)),
            SecretStrategy::Aes128 => aes_ecb_decrypt::<Aes128>(payload, self),
            SecretStrategy::Aes256 => aes_ecb_decrypt::<Aes256>(payload, self),
        }
    }

    /// Encrypt a payload, inverse of [`PmdSecret::decrypt`].
    pub fn encrypt(&self, payload: &[u8]) -> Result<Vec<u8>, PmdError> {
        match self.strategy {
            SecretStrategy::None => Ok(payload.to_vec()),
            SecretStrategy::Xor => Ok(self.xor(payload)),
            SecretStrategy::Aes128 => aes_ecb_encrypt::<Aes128>(payload, self),
            SecretStrategy::Aes256 => aes_ecb_encrypt::<Aes256>(payload, self),
        }
    }

    /// Security TLV record: `[SECURITY, 1, strategy]` followed by the raw key.
    ///
    /// Readers size the key by the strategy, so only single-byte XOR keys
    /// survive the trip through a settings blob.
    pub fn serialize(&self) -> Vec<u8> {
        let mut record = Vec::with_capacity(3 + self.key.len());
        record.push(PmdSettingType::Security.into());
        record.push(1);
        record.push(self.strategy.into());
        record.extend_from_slice(&self.key);
        record
    }

    fn xor(&self, payload: &[u8]) -> Vec<u8> {
        payload
            .iter()
            .zip(self.key.iter().cycle())
            .map(|(byte, key)| byte ^ key)
            .collect()
    }
}

fn check_block_length(data: &[u8]) -> Result<(), PmdError> {
    if data.len() % CIPHER_BLOCK_SIZE != 0 {
        return Err(PmdError::CipherBlockLength(data.len()));
    }
    Ok(())
}

fn aes_ecb_decrypt<C: BlockDecrypt + KeyInit>(ciphertext: &[u8], secret: &PmdSecret) -> Result<Vec<u8>, PmdError> {
    check_block_length(ciphertext)?;
    let cipher = C::new_from_slice(&secret.key).map_err(|_| PmdError::InvalidKey {
        strategy: secret.strategy,
        length: secret.key.len(),
    })?;

    let mut output = ciphertext.to_vec();
    for chunk in output.chunks_exact_mut(CIPHER_BLOCK_SIZE) {
        cipher.decrypt_block(chunk.into());
    }
    Ok(output)
}

fn aes_ecb_encrypt<C: BlockEncrypt + KeyInit>(plaintext: &[u8], secret: &PmdSecret) -> Result<Vec<u8>, PmdError> {
    check_block_length(plaintext)?;
    let cipher = C::new_from_slice(&secret.key).map_err(|_| PmdError::InvalidKey {
        strategy: secret.strategy,
        length: secret.key.len(),
    })?;

    let mut output = plaintext.to_vec();
    for chunk in output.chunks_exact_mut(CIPHER_BLOCK_SIZE) {
        cipher.encrypt_block(chunk.into());
    }
    Ok(output)
}
