//! Directory-backed offline asset store.
//!
//! One asset occupies two files under the store root: `<playback_id>.bin`
//! (the AES-CTR ciphertext, byte-for-byte the same length as the plaintext)
//! and `<playback_id>.json` (the metadata sidecar). Salt and IV are generated
//! once at import and are immutable afterwards; the derived key is never
//! written anywhere.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use aes::cipher::StreamCipher;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, instrument};

use crate::crypto::{self, AssetIv, Identity, derive_asset_key};

/// Context attached to store and reader errors for diagnostics.
#[derive(Debug, Clone, Default)]
pub struct AssetContext {
    /// The playback id involved, if known.
    pub playback_id: Option<String>,
    /// The cipher block being processed, for range-read errors.
    pub block_index: Option<u64>,
    /// The operation being performed.
    pub operation: Option<&'static str>,
}

impl AssetContext {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_playback_id(mut self, playback_id: impl Into<String>) -> Self {
        self.playback_id = Some(playback_id.into());
        self
    }

    #[must_use]
    pub fn with_block(mut self, block_index: u64) -> Self {
        self.block_index = Some(block_index);
        self
    }

    #[must_use]
    pub fn with_operation(mut self, operation: &'static str) -> Self {
        self.operation = Some(operation);
        self
    }
}

impl fmt::Display for AssetContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();

        if let Some(op) = self.operation {
            parts.push(op.to_string());
        }
        if let Some(ref id) = self.playback_id {
            parts.push(format!("asset '{id}'"));
        }
        if let Some(block) = self.block_index {
            parts.push(format!("block {block}"));
        }

        if parts.is_empty() {
            write!(f, "(no context)")
        } else {
            write!(f, "{}", parts.join(", "))
        }
    }
}

/// Errors from store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Reading or writing an asset's files failed.
    #[error("IO error during {context}: {source}")]
    Io {
        #[source]
        source: io::Error,
        context: AssetContext,
    },

    /// The metadata sidecar is not valid JSON for an asset record.
    #[error("invalid metadata for {context}: {source}")]
    Metadata {
        #[source]
        source: serde_json::Error,
        context: AssetContext,
    },

    /// The playback id cannot be used as a file stem.
    #[error("invalid playback id {0:?}")]
    InvalidPlaybackId(String),
}

impl StoreError {
    fn io(source: io::Error, context: AssetContext) -> Self {
        StoreError::Io { source, context }
    }
}

/// Persistent description of one encrypted asset.
///
/// Everything here is safe to store in the clear: the salt and IV are not
/// secrets, and the key they help derive is recomputed from identity inputs
/// on every read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetRecord {
    /// Stable external identifier for the asset.
    pub playback_id: String,
    /// MIME type served back to the player.
    pub content_type: String,
    /// Plaintext size in bytes. Equal to the ciphertext size: CTR adds no
    /// padding or expansion.
    pub size: u64,
    /// Random per-asset salt feeding key derivation.
    pub salt: String,
    /// Base64-encoded 16-byte CTR initialization vector.
    pub iv: String,
    /// Key derivation scheme version used at encrypt time.
    pub key_version: u32,
    /// Location of the ciphertext file; filled in by the store on load, not
    /// part of the sidecar.
    #[serde(skip)]
    pub ciphertext_path: PathBuf,
}

/// Key derivation scheme version written by this store.
const CURRENT_KEY_VERSION: u32 = 1;

/// Bytes of CSPRNG output behind each generated salt.
const SALT_LEN: usize = 16;

/// A directory of encrypted assets addressed by playback id.
#[derive(Debug, Clone)]
pub struct AssetStore {
    root: PathBuf,
}

impl AssetStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).await.map_err(|e| {
            StoreError::io(e, AssetContext::new().with_operation("open store"))
        })?;
        Ok(Self { root })
    }

    /// The store's root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Look up an asset by playback id.
    ///
    /// Unknown ids resolve to `Ok(None)`; only a present-but-unreadable asset
    /// is an error.
    #[instrument(level = "debug", skip(self))]
    pub async fn get(&self, playback_id: &str) -> Result<Option<AssetRecord>, StoreError> {
        if !valid_playback_id(playback_id) {
            return Err(StoreError::InvalidPlaybackId(playback_id.to_string()));
        }

        let context = AssetContext::new()
            .with_playback_id(playback_id)
            .with_operation("get");

        let raw = match fs::read(self.metadata_path(playback_id)).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Asset not found");
                return Ok(None);
            }
            Err(e) => return Err(StoreError::io(e, context)),
        };

        let mut record: AssetRecord = serde_json::from_slice(&raw)
            .map_err(|source| StoreError::Metadata { source, context })?;
        record.ciphertext_path = self.ciphertext_path(playback_id);

        Ok(Some(record))
    }

    /// Encrypt `plaintext` and persist it as a new asset.
    ///
    /// Generates the asset's salt and IV (once, immutable afterwards),
    /// derives the key the reader will later re-derive from the same identity
    /// inputs, and writes ciphertext plus sidecar. Overwrites any existing
    /// asset with the same id.
    #[instrument(level = "debug", skip(self, plaintext, identity), fields(size = plaintext.len()))]
    pub async fn import(
        &self,
        playback_id: &str,
        content_type: &str,
        plaintext: &[u8],
        identity: &Identity,
    ) -> Result<AssetRecord, StoreError> {
        if !valid_playback_id(playback_id) {
            return Err(StoreError::InvalidPlaybackId(playback_id.to_string()));
        }

        let context = AssetContext::new()
            .with_playback_id(playback_id)
            .with_operation("import");

        let mut salt_bytes = [0u8; SALT_LEN];
        rand::rng().fill_bytes(&mut salt_bytes);
        let salt = hex::encode(salt_bytes);
        let iv = AssetIv::generate();

        let key = derive_asset_key(
            &salt,
            &identity.client_id,
            identity.user_id.as_deref(),
            CURRENT_KEY_VERSION,
        );
        debug!(key_id = key.key_id(), "Derived import key");

        let mut ciphertext = plaintext.to_vec();
        crypto::cipher(key.bytes(), &iv).apply_keystream(&mut ciphertext);

        let record = AssetRecord {
            playback_id: playback_id.to_string(),
            content_type: content_type.to_string(),
            size: plaintext.len() as u64,
            salt,
            iv: iv.to_base64(),
            key_version: CURRENT_KEY_VERSION,
            ciphertext_path: self.ciphertext_path(playback_id),
        };

        fs::write(&record.ciphertext_path, &ciphertext)
            .await
            .map_err(|e| StoreError::io(e, context.clone()))?;

        let sidecar = serde_json::to_vec_pretty(&record)
            .map_err(|source| StoreError::Metadata {
                source,
                context: context.clone(),
            })?;
        fs::write(self.metadata_path(playback_id), sidecar)
            .await
            .map_err(|e| StoreError::io(e, context))?;

        debug!(size = record.size, "Asset imported");
        Ok(record)
    }

    /// Remove an asset's ciphertext and sidecar, if present.
    pub async fn remove(&self, playback_id: &str) -> Result<(), StoreError> {
        if !valid_playback_id(playback_id) {
            return Err(StoreError::InvalidPlaybackId(playback_id.to_string()));
        }
        let context = AssetContext::new()
            .with_playback_id(playback_id)
            .with_operation("remove");

        for path in [
            self.metadata_path(playback_id),
            self.ciphertext_path(playback_id),
        ] {
            match fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(StoreError::io(e, context)),
            }
        }
        Ok(())
    }

    fn metadata_path(&self, playback_id: &str) -> PathBuf {
        self.root.join(format!("{playback_id}.json"))
    }

    fn ciphertext_path(&self, playback_id: &str) -> PathBuf {
        self.root.join(format!("{playback_id}.bin"))
    }
}

/// Playback ids become file stems; reject anything that could escape the
/// store root or collide with the sidecar naming scheme.
fn valid_playback_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && !id.starts_with('.')
}
