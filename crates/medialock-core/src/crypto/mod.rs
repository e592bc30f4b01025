//! Cryptographic primitives for encrypted asset storage.

pub mod cipher;
pub mod iv;
pub mod keys;

pub use cipher::{Aes256Ctr, BLOCK_SIZE, cipher};
pub use iv::{AssetIv, IvError};
pub use keys::{AssetKey, Identity, derive_asset_key};
