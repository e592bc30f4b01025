//! Per-asset key derivation.
//!
//! Keys are never written to disk. Both the encrypt side (asset import) and
//! the decrypt side (range reads) recompute the same 32-byte key from the
//! asset's stored salt plus the caller's identity, so possession of the
//! ciphertext alone is not enough to play an asset back.

use std::fmt;

use ring::digest;
use zeroize::Zeroizing;

/// Identity inputs that feed key derivation.
///
/// Supplied by the embedding application (an authenticated session, or CLI
/// flags for the standalone server). A missing `user_id` derives the same key
/// as the `"anonymous"` sentinel, see [`derive_asset_key`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Stable identifier of the installing client/device.
    pub client_id: String,
    /// Identifier of the signed-in user, if any.
    pub user_id: Option<String>,
}

impl Identity {
    pub fn new(client_id: impl Into<String>, user_id: Option<String>) -> Self {
        Self {
            client_id: client_id.into(),
            user_id,
        }
    }
}

/// A derived per-asset key plus its diagnostic fingerprint.
///
/// Recomputed fresh for every encrypt/decrypt operation and never cached or
/// persisted. The key bytes are zeroed when the value is dropped.
pub struct AssetKey {
    key: Zeroizing<[u8; 32]>,
    key_id: String,
}

impl AssetKey {
    /// The raw 32-byte AES-256 key.
    #[inline]
    pub fn bytes(&self) -> &[u8; 32] {
        &self.key
    }

    /// Short hex fingerprint of the key, safe to log.
    ///
    /// Derived as `hex(SHA-256(key))[..12]`; never used as key material.
    #[inline]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }
}

impl fmt::Debug for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetKey")
            .field("key", &"[REDACTED]")
            .field("key_id", &self.key_id)
            .finish()
    }
}

/// Sentinel substituted for a missing user id in the derivation input.
const ANONYMOUS_USER: &str = "anonymous";

/// Derive the symmetric key for one asset.
///
/// The derivation input is `"<version>:<salt>:<client_id>:<user_id>"` with a
/// missing user replaced by `"anonymous"`; the key is the SHA-256 of that
/// string. Pure and total: identical inputs always produce the identical
/// `(key, key_id)` pair, which is what lets decryption recompute the
/// encrypt-time key without it ever being stored.
///
/// A real user id literally equal to `"anonymous"` is indistinguishable from
/// the signed-out case. The input format is part of the storage contract
/// (changing it would orphan existing ciphertext), so this stays as is.
pub fn derive_asset_key(
    salt: &str,
    client_id: &str,
    user_id: Option<&str>,
    key_version: u32,
) -> AssetKey {
    let input = format!(
        "{key_version}:{salt}:{client_id}:{}",
        user_id.unwrap_or(ANONYMOUS_USER)
    );

    let mut key = Zeroizing::new([0u8; 32]);
    key.copy_from_slice(digest::digest(&digest::SHA256, input.as_bytes()).as_ref());

    let fingerprint = digest::digest(&digest::SHA256, key.as_ref());
    let key_id = hex::encode(&fingerprint.as_ref()[..6]);

    AssetKey { key, key_id }
}
