//! AES-256-CTR cipher construction.
//!
//! CTR is a keystream XOR, so encryption and decryption are the same
//! operation; one constructor serves both directions. The cipher has no
//! padding and no internal state beyond the running keystream position:
//! `decrypt(encrypt(x, key, iv), key, iv) == x` at any byte alignment as long
//! as both sides start from the same counter.

use aes::cipher::KeyIvInit;

use super::iv::AssetIv;

/// AES block size, which is also the CTR counter granule.
pub const BLOCK_SIZE: usize = 16;

/// AES-256-CTR with a big-endian 128-bit counter.
pub type Aes256Ctr = ctr::Ctr128BE<aes::Aes256>;

/// Build a cipher keyed by `(key, iv)`.
///
/// Pass the asset's stored IV to process from the start of the stream, or an
/// IV advanced with [`AssetIv::offset_by`] to begin mid-stream at a block
/// boundary.
pub fn cipher(key: &[u8; 32], iv: &AssetIv) -> Aes256Ctr {
    Aes256Ctr::new(key.into(), iv.as_bytes().into())
}
