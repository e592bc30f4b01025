//! Initialization vectors and CTR counter arithmetic.
//!
//! Each asset gets one random 16-byte IV at import time, stored base64-encoded
//! in its metadata sidecar. Seeking within the CTR stream is counter
//! arithmetic: the keystream block covering byte offset `16 * i` is produced
//! by running the cipher with counter `iv + i` instead of `iv`.

use base64::{Engine as _, engine::general_purpose};
use rand::RngCore;
use thiserror::Error;

use super::cipher::BLOCK_SIZE;

/// Errors decoding a stored IV.
///
/// These indicate corrupt asset metadata; they cannot occur for records the
/// store itself wrote.
#[derive(Error, Debug)]
pub enum IvError {
    /// The stored string is not valid base64.
    #[error("stored IV is not valid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    /// The decoded IV is not exactly one cipher block.
    #[error("stored IV has invalid length: expected {BLOCK_SIZE} bytes, got {actual}")]
    InvalidLength { actual: usize },
}

/// A per-asset CTR initialization vector: one cipher block of 16 bytes.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct AssetIv([u8; BLOCK_SIZE]);

impl AssetIv {
    /// Generate a fresh random IV from the CSPRNG.
    ///
    /// Called once per asset at import time; the IV is immutable afterwards.
    pub fn generate() -> Self {
        let mut iv = [0u8; BLOCK_SIZE];
        rand::rng().fill_bytes(&mut iv);
        Self(iv)
    }

    pub fn from_bytes(bytes: [u8; BLOCK_SIZE]) -> Self {
        Self(bytes)
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; BLOCK_SIZE] {
        &self.0
    }

    /// Encode for storage in the metadata sidecar.
    pub fn to_base64(&self) -> String {
        general_purpose::STANDARD.encode(self.0)
    }

    /// Decode a stored IV, rejecting corrupt metadata.
    pub fn from_base64(encoded: &str) -> Result<Self, IvError> {
        let decoded = general_purpose::STANDARD.decode(encoded.as_bytes())?;
        let bytes: [u8; BLOCK_SIZE] = decoded
            .try_into()
            .map_err(|v: Vec<u8>| IvError::InvalidLength { actual: v.len() })?;
        Ok(Self(bytes))
    }

    /// Advance the counter by `block_index` blocks.
    ///
    /// The IV is a big-endian unsigned 128-bit counter; addition wraps modulo
    /// 2^128. Wrapping is the correct policy, not an accident: `Ctr128BE`
    /// wraps its running counter the same way during encryption, so a random
    /// IV near the top of the counter space must wrap here to reproduce the
    /// encrypt-time keystream.
    #[must_use]
    pub fn offset_by(&self, block_index: u64) -> Self {
        let counter = u128::from_be_bytes(self.0);
        Self(counter.wrapping_add(u128::from(block_index)).to_be_bytes())
    }
}

impl std::fmt::Debug for AssetIv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("AssetIv").field(&hex::encode(self.0)).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn offset_zero_is_identity() {
        let iv = AssetIv::generate();
        assert_eq!(iv.offset_by(0), iv);
    }

    #[test]
    fn offset_carries_across_bytes() {
        let iv = AssetIv::from_bytes(hex!("000000000000000000000000000000ff"));
        assert_eq!(
            iv.offset_by(1).as_bytes(),
            &hex!("00000000000000000000000000000100")
        );
    }

    #[test]
    fn offset_adds_block_index() {
        let iv = AssetIv::from_bytes(hex!("00000000000000000000000000000000"));
        assert_eq!(
            iv.offset_by(0x1_0000).as_bytes(),
            &hex!("00000000000000000000000000010000")
        );
    }

    #[test]
    fn offset_wraps_at_counter_max() {
        let iv = AssetIv::from_bytes([0xff; BLOCK_SIZE]);
        assert_eq!(
            iv.offset_by(1).as_bytes(),
            &hex!("00000000000000000000000000000000")
        );
    }

    #[test]
    fn base64_round_trip() {
        let iv = AssetIv::generate();
        let decoded = AssetIv::from_base64(&iv.to_base64()).unwrap();
        assert_eq!(decoded, iv);
    }

    #[test]
    fn rejects_wrong_length() {
        let short = general_purpose::STANDARD.encode([0u8; 12]);
        assert!(matches!(
            AssetIv::from_base64(&short),
            Err(IvError::InvalidLength { actual: 12 })
        ));
    }

    #[test]
    fn rejects_bad_base64() {
        assert!(matches!(
            AssetIv::from_base64("not base64!!"),
            Err(IvError::InvalidBase64(_))
        ));
    }
}
