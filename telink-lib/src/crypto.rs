//! Telink session crypto.
//!
//! The Telink scheme is built on AES-128-ECB single-block operations with a
//! historical quirk: both the key and the block are byte-reversed around the
//! cipher call, and the output is reversed again. [`aes_ecb`] hides that
//! convention so the session keying and packet cryptor read naturally.
//!
//! Packet protection is not standard AES-CCM. Outbound 20-byte frames get a
//! 2-byte MAC derived from an address-and-counter nonce, then bytes 5..20 are
//! XORed with a keystream block. Inbound frames are unmasked the same way
//! (the keystream is always produced with the cipher's encrypt direction) but
//! their MAC is not re-verified; callers gate on the vendor code instead.

use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::Aes128;

use crate::error::TelinkError;

pub const KEY_LEN: usize = 16;
pub const NONCE_LEN: usize = 8;

/// Direction of a single-block AES operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Encrypt,
    Decrypt,
}

/// AES-128-ECB on one block, with the Telink byte-reversal convention applied
/// to key, input and output.
pub fn aes_ecb(key: &[u8], block: &[u8; 16], direction: Direction) -> Result<[u8; 16], TelinkError> {
    let mut rev_key = [0u8; KEY_LEN];
    if key.len() != KEY_LEN {
        return Err(TelinkError::Crypto);
    }
    for (dst, src) in rev_key.iter_mut().zip(key.iter().rev()) {
        *dst = *src;
    }
    let cipher = Aes128::new_from_slice(&rev_key).map_err(|_| TelinkError::Crypto)?;

    let mut data = [0u8; 16];
    for (dst, src) in data.iter_mut().zip(block.iter().rev()) {
        *dst = *src;
    }
    let buf = &mut data[..];
    match direction {
        Direction::Encrypt => cipher.encrypt_block(buf.into()),
        Direction::Decrypt => cipher.decrypt_block(buf.into()),
    }
    data.reverse();
    Ok(data)
}

/// XOR of the zero-padded device name and password, used as the identity key
/// during pairing.
pub fn mix_credentials(name: &[u8; 16], password: &[u8; 16]) -> [u8; 16] {
    let mut out = [0u8; 16];
    for i in 0..16 {
        out[i] = name[i] ^ password[i];
    }
    out
}

/// Derives the 16-byte session key from the two pairing half-nonces.
///
/// Both sides compute `AES(name ⊕ password, local ‖ remote)`, so identical
/// credentials yield identical keys.
pub fn derive_session_key(
    identity: &[u8; 16],
    local: &[u8; NONCE_LEN],
    remote: &[u8; NONCE_LEN],
) -> Result<[u8; 16], TelinkError> {
    let mut block = [0u8; 16];
    block[..8].copy_from_slice(local);
    block[8..].copy_from_slice(remote);
    aes_ecb(identity, &block, Direction::Encrypt)
}

/// Encrypts the client's half-nonce under the identity key, producing the
/// authenticator the device validates during pairing.
pub fn seal_local_nonce(
    identity: &[u8; 16],
    local: &[u8; NONCE_LEN],
) -> Result<[u8; 16], TelinkError> {
    let mut block = [0u8; 16];
    block[..8].copy_from_slice(local);
    aes_ecb(identity, &block, Direction::Encrypt)
}

/// Encrypts and authenticates a 20-byte command frame in place.
///
/// The MAC lands in bytes 3..5, then bytes 5..20 are XORed with a keystream
/// block derived from the reversed address and the counter bytes.
pub fn encrypt_packet(
    key: &[u8; 16],
    rev_addr: &[u8; 6],
    packet: &mut [u8; 20],
) -> Result<(), TelinkError> {
    let mut auth_nonce = [0u8; 16];
    auth_nonce[..4].copy_from_slice(&rev_addr[..4]);
    auth_nonce[4] = 0x01;
    auth_nonce[5..8].copy_from_slice(&packet[..3]);
    auth_nonce[8] = 0x0F;

    let mut auth = aes_ecb(key, &auth_nonce, Direction::Encrypt)?;
    for i in 0..15 {
        auth[i] ^= packet[i + 5];
    }
    let mac = aes_ecb(key, &auth, Direction::Encrypt)?;
    packet[3..5].copy_from_slice(&mac[..2]);

    let mut iv = [0u8; 16];
    iv[1..5].copy_from_slice(&rev_addr[..4]);
    iv[5] = 0x01;
    iv[6..9].copy_from_slice(&packet[..3]);

    let stream = aes_ecb(key, &iv, Direction::Encrypt)?;
    for i in 0..15 {
        packet[i + 5] ^= stream[i];
    }
    Ok(())
}

/// Unmasks a received frame in place. Bytes 0..7 travel in the clear.
///
/// The MAC bytes are not re-verified here; inbound frames are trusted only
/// after the vendor-code check in the frame codec.
pub fn decrypt_packet(
    key: &[u8; 16],
    rev_addr: &[u8; 6],
    frame: &mut [u8],
) -> Result<(), TelinkError> {
    if frame.len() < 8 {
        return Err(TelinkError::ShortFrame { actual: frame.len() });
    }

    let mut iv = [0u8; 16];
    iv[1..4].copy_from_slice(&rev_addr[..3]);
    iv[4..9].copy_from_slice(&frame[..5]);

    let stream = aes_ecb(key, &iv, Direction::Encrypt)?;
    let len = (frame.len() - 7).min(stream.len());
    for i in 0..len {
        frame[i + 7] ^= stream[i];
    }
    Ok(())
}
