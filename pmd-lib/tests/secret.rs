//! Tests for the payload cipher layer

mod common;

use common::*;

fn aes128() -> PmdSecret {
    PmdSecret::new(SecretStrategy::Aes128, hex::decode(AES128_KEY).unwrap()).expect("Failed to build AES secret")
}

#[test]
fn test_aes_blocks_decrypt_independently() {
    let block = hex_to_bytes("69c4e0d86a7b0430d8cdb78070b4c55a");
    let other = hex_to_bytes("00000000000000000000000000000000");
    let ciphertext = [block.as_ref(), block.as_ref(), other.as_ref()].concat();

    let plaintext = aes128().decrypt(&ciphertext).expect("Failed to decrypt");
    assert_eq!(plaintext.len(), 48);
    assert_eq!(&plaintext[..16], hex_to_bytes("00112233445566778899aabbccddeeff").as_ref());
    assert_eq!(plaintext[..16], plaintext[16..32]);
    assert_ne!(plaintext[..16], plaintext[32..]);
}

#[test]
fn test_aes_encrypt_inverts_decrypt() {
    let secret = aes128();
    let plaintext: Vec<u8> = (0u8..64).collect();
    let ciphertext = secret.encrypt(&plaintext).unwrap();
    assert_ne!(ciphertext, plaintext);
    assert_eq!(secret.decrypt(&ciphertext).unwrap(), plaintext);
}

#[test]
fn test_aes256_vector() {
    let secret = PmdSecret::new(
        SecretStrategy::Aes256,
        hex::decode("000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f").unwrap(),
    )
    .unwrap();
    assert_eq!(
        secret.encrypt(&hex_to_bytes("00112233445566778899aabbccddeeff")).unwrap(),
        hex_to_bytes("8ea2b7ca516745bfeafc49904b496089").to_vec()
    );
}

#[test]
fn test_xor_vector() {
    let secret = PmdSecret::new(SecretStrategy::Xor, vec![0x55]).unwrap();
    assert_eq!(
        secret.decrypt(&hex_to_bytes("000102030405060708090a0b0c0d0eff")).unwrap(),
        hex_to_bytes("55545756515053525d5c5f5e59585baa").to_vec()
    );
}

#[test]
fn test_none_is_identity() {
    let payload = [0xDE, 0xAD, 0xBE, 0xEF, 0x01];
    assert_eq!(PmdSecret::none().decrypt(&payload).unwrap(), payload.to_vec());
}

#[test]
fn test_partial_block_is_rejected() {
    let secret = aes128();
    assert_eq!(secret.decrypt(&[0u8; 15]), Err(PmdError::CipherBlockLength(15)));
    assert_eq!(secret.encrypt(&[0u8; 33]), Err(PmdError::CipherBlockLength(33)));
    assert_eq!(secret.decrypt(&[]), Ok(Vec::new()));
}

#[test]
fn test_partial_block_fails_frame_decode() {
    let frame = build_frame(PmdMeasurementType::OfflineHr, 1_000, 0, false, &[0u8; 20]);
    let ctx = DecodeContext::new(1).with_secret(aes128());
    assert_eq!(decode_frame(frame, &ctx), Err(PmdError::CipherBlockLength(20)));
}

#[test]
fn test_key_lengths() {
    assert_eq!(
        PmdSecret::new(SecretStrategy::Aes128, vec![0u8; 32]),
        Err(PmdError::InvalidKey {
            strategy: SecretStrategy::Aes128,
            length: 32
        })
    );
    assert!(PmdSecret::new(SecretStrategy::Aes256, vec![0u8; 32]).is_ok());
    assert_eq!(SecretStrategy::try_from(3u8).ok(), Some(SecretStrategy::Aes256));
    assert!(SecretStrategy::try_from(4u8).is_err());
}
