//! Range-addressed decryption over stored ciphertext.
//!
//! The reader is the composition point: a requested plaintext byte range is
//! widened to its enclosing cipher blocks ([`CryptoRange`]), the matching
//! ciphertext window is read from disk, decrypted with the CTR counter seeked
//! to the window's first block, and trimmed back to exactly the bytes asked
//! for. Nothing outside the window is ever decrypted, and nothing decrypted
//! is ever written back.

use std::io::{self, SeekFrom};

use aes::cipher::StreamCipher;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, instrument, trace, warn};

use crate::crypto::{self, AssetIv, AssetKey, BLOCK_SIZE, Identity, IvError, derive_asset_key};
use crate::range::CryptoRange;
use crate::store::{AssetContext, AssetRecord};

/// Errors from opening or reading an encrypted asset.
#[derive(Error, Debug)]
pub enum ReadError {
    /// Ciphertext access failed (missing file, disk error, truncated asset).
    #[error("IO error during {context}: {source}")]
    Io {
        #[source]
        source: io::Error,
        context: AssetContext,
    },

    /// The record's stored IV is corrupt. Cannot occur for sidecars the
    /// store wrote itself.
    #[error("corrupt stored IV for {context}: {source}")]
    InvalidIv {
        #[source]
        source: IvError,
        context: AssetContext,
    },
}

impl ReadError {
    fn io(source: io::Error, context: AssetContext) -> Self {
        ReadError::Io { source, context }
    }
}

/// Decrypt one block-aligned ciphertext window and trim it to the requested
/// range.
///
/// `window` must start at `range.aligned_start` in the ciphertext stream; it
/// may be shorter than the full aligned window when the range covers the
/// asset's final, partial block. Pure: same inputs, same output, no I/O.
pub fn decrypt_window(
    key: &[u8; 32],
    iv: &AssetIv,
    range: &CryptoRange,
    mut window: Vec<u8>,
) -> Vec<u8> {
    let mut cipher = crypto::cipher(key, &iv.offset_by(range.block_index));
    cipher.apply_keystream(&mut window);

    window.drain(..range.skip.min(window.len()));
    window.truncate(range.take as usize);
    window
}

/// A per-request handle for decrypted reads of one asset.
///
/// Opening derives the key fresh from the caller's identity (nothing is
/// cached across requests) and keeps the ciphertext file open for subsequent
/// range reads. Concurrent readers of the same asset are independent: all
/// shared state is the read-only ciphertext file.
///
/// Dropping the reader releases the file handle, which is what ties an HTTP
/// response stream's cancellation to resource cleanup.
pub struct AssetReader {
    file: File,
    key: AssetKey,
    iv: AssetIv,
    size: u64,
    playback_id: String,
}

impl std::fmt::Debug for AssetReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetReader")
            .field("playback_id", &self.playback_id)
            .field("size", &self.size)
            .field("key_id", &self.key.key_id())
            .finish_non_exhaustive()
    }
}

impl AssetReader {
    /// Open an asset for range-addressed decrypted reads.
    ///
    /// Note that a wrong identity is not detectable here or anywhere
    /// downstream: CTR provides confidentiality only, so mismatched identity
    /// inputs decrypt to garbage without any error signal.
    #[instrument(level = "debug", skip(record, identity), fields(playback_id = %record.playback_id))]
    pub async fn open(record: &AssetRecord, identity: &Identity) -> Result<Self, ReadError> {
        let context = AssetContext::new()
            .with_playback_id(&record.playback_id)
            .with_operation("open");

        let iv = AssetIv::from_base64(&record.iv).map_err(|source| ReadError::InvalidIv {
            source,
            context: context.clone(),
        })?;

        let key = derive_asset_key(
            &record.salt,
            &identity.client_id,
            identity.user_id.as_deref(),
            record.key_version,
        );

        let file = File::open(&record.ciphertext_path)
            .await
            .map_err(|e| ReadError::io(e, context.clone()))?;

        let on_disk = file
            .metadata()
            .await
            .map_err(|e| ReadError::io(e, context))?
            .len();
        if on_disk != record.size {
            warn!(
                expected = record.size,
                actual = on_disk,
                "Ciphertext size does not match asset record"
            );
        }

        debug!(
            key_id = key.key_id(),
            size = record.size,
            "Opened asset for decrypted reads"
        );

        Ok(Self {
            file,
            key,
            iv,
            size: record.size,
            playback_id: record.playback_id.clone(),
        })
    }

    /// Total plaintext size of the asset.
    #[inline]
    pub fn plaintext_size(&self) -> u64 {
        self.size
    }

    /// Read and decrypt `len` plaintext bytes starting at `offset`.
    ///
    /// Returns fewer bytes than requested only when the range runs past the
    /// end of the asset; a request fully within bounds yields exactly `len`
    /// bytes. Only the enclosing cipher blocks are read and decrypted.
    #[instrument(level = "trace", skip(self), fields(playback_id = %self.playback_id))]
    pub async fn read_range(&mut self, offset: u64, len: usize) -> Result<Vec<u8>, ReadError> {
        if offset >= self.size || len == 0 {
            trace!(size = self.size, "Read past EOF");
            return Ok(Vec::new());
        }

        let take = (len as u64).min(self.size - offset);
        let end = offset + take - 1;
        let range = CryptoRange::for_request(offset, end, BLOCK_SIZE);

        // The final block's aligned_end may point past the asset; clamp the
        // ciphertext read, not the range arithmetic.
        let read_end = range.aligned_end.min(self.size - 1);
        let read_len = (read_end - range.aligned_start + 1) as usize;

        let context = AssetContext::new()
            .with_playback_id(&self.playback_id)
            .with_block(range.block_index)
            .with_operation("read_range");

        self.file
            .seek(SeekFrom::Start(range.aligned_start))
            .await
            .map_err(|e| ReadError::io(e, context.clone()))?;

        let mut window = vec![0u8; read_len];
        self.file
            .read_exact(&mut window)
            .await
            .map_err(|e| ReadError::io(e, context))?;

        let plaintext = decrypt_window(self.key.bytes(), &self.iv, &range, window);
        trace!(
            aligned_start = range.aligned_start,
            read_len,
            returned = plaintext.len(),
            "Decrypted range window"
        );
        Ok(plaintext)
    }

    /// Read and decrypt the entire asset.
    pub async fn read_to_end(&mut self) -> Result<Vec<u8>, ReadError> {
        if self.size == 0 {
            return Ok(Vec::new());
        }
        self.read_range(0, self.size as usize).await
    }
}
