//! Core primitives for the medialock offline media store.
//!
//! Assets are kept on disk as AES-256-CTR ciphertext and decrypted on demand,
//! one block-aligned window at a time, so a seeking video player never forces
//! a full-file decrypt and plaintext never touches the disk.

pub mod crypto;
pub mod range;
pub mod reader;
pub mod store;

pub use crypto::keys::{AssetKey, Identity, derive_asset_key};
pub use range::CryptoRange;
pub use reader::AssetReader;
pub use store::{AssetRecord, AssetStore};
