//! HTTP byte-range serving for encrypted offline assets.
//!
//! A local player issues GET/HEAD requests (with optional `Range` headers)
//! against `/media/<playback_id>`; the responder negotiates 200/206/416 per
//! RFC 7233 and streams decrypted bytes pulled on demand from the store's
//! ciphertext, so seeking never decrypts more than the blocks it touches.

pub mod range;
pub mod responder;
pub mod server;

pub use range::{RangeOutcome, RangeSpec};
pub use server::{MediaServer, ServerConfig};
