//! Request handling: range negotiation and streaming decrypted responses.
//!
//! One request, one terminal response: no `Range` header streams the full
//! asset with 200, a valid single range streams exactly that slice with 206,
//! anything else gets 416 with `Content-Range: bytes */<size>`. Bodies are
//! lazy frame streams pulled by the connection, so decryption happens as the
//! player consumes and stops when it disconnects.

use std::io;
use std::sync::Arc;

use bytes::Bytes;
use futures::stream;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, StreamBody};
use hyper::body::{Frame, Incoming};
use hyper::header::{ACCEPT_RANGES, ALLOW, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, RANGE};
use hyper::http::response::Builder;
use hyper::{Method, Request, Response, StatusCode};
use tracing::{debug, warn};

use medialock_core::store::{AssetRecord, StoreError};
use medialock_core::{AssetReader, AssetStore, Identity};

use crate::range::{self, RangeOutcome};

/// Response body type: decrypted frames or an empty body.
pub type ResponseBody = UnsyncBoxBody<Bytes, io::Error>;

/// Path prefix under which assets are addressed.
pub const MEDIA_PREFIX: &str = "/media/";

/// Granule for pulling decrypted bytes into the response stream.
const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// Serve one GET/HEAD request against the asset store.
pub async fn handle(
    req: Request<Incoming>,
    store: Arc<AssetStore>,
    identity: Identity,
) -> Response<ResponseBody> {
    let head_only = match req.method() {
        &Method::GET => false,
        &Method::HEAD => true,
        _ => {
            let mut resp = status_response(StatusCode::METHOD_NOT_ALLOWED);
            resp.headers_mut()
                .insert(ALLOW, hyper::header::HeaderValue::from_static("GET, HEAD"));
            return resp;
        }
    };

    let Some(playback_id) = playback_id_from_path(req.uri().path()) else {
        return status_response(StatusCode::NOT_FOUND);
    };

    let record = match store.get(playback_id).await {
        Ok(Some(record)) => record,
        Ok(None) | Err(StoreError::InvalidPlaybackId(_)) => {
            debug!(playback_id, "Unknown asset");
            return status_response(StatusCode::NOT_FOUND);
        }
        Err(e) => {
            warn!(playback_id, error = %e, "Asset lookup failed");
            return status_response(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let outcome = match req.headers().get(RANGE) {
        None => RangeOutcome::Full,
        Some(value) => match value.to_str() {
            Ok(header) => range::negotiate(Some(header), record.size),
            Err(_) => RangeOutcome::Unsatisfiable,
        },
    };
    debug!(playback_id, ?outcome, head_only, "Negotiated range");

    match outcome {
        RangeOutcome::Full => {
            let body = if head_only || record.size == 0 {
                empty_body()
            } else {
                match open_reader(&record, &identity).await {
                    Ok(reader) => stream_range(reader, 0, record.size - 1),
                    Err(resp) => return resp,
                }
            };
            finish(
                base_response(StatusCode::OK, &record).header(CONTENT_LENGTH, record.size),
                body,
            )
        }
        RangeOutcome::Partial(spec) => {
            let body = if head_only {
                empty_body()
            } else {
                match open_reader(&record, &identity).await {
                    Ok(reader) => stream_range(reader, spec.start, spec.end),
                    Err(resp) => return resp,
                }
            };
            finish(
                base_response(StatusCode::PARTIAL_CONTENT, &record)
                    .header(CONTENT_RANGE, spec.content_range(record.size))
                    .header(CONTENT_LENGTH, spec.byte_count()),
                body,
            )
        }
        RangeOutcome::Unsatisfiable => {
            warn!(playback_id, size = record.size, "Unsatisfiable range request");
            finish(
                base_response(StatusCode::RANGE_NOT_SATISFIABLE, &record)
                    .header(CONTENT_RANGE, format!("bytes */{}", record.size)),
                empty_body(),
            )
        }
    }
}

/// Extract the playback id from a request path under [`MEDIA_PREFIX`].
fn playback_id_from_path(path: &str) -> Option<&str> {
    let id = path.strip_prefix(MEDIA_PREFIX)?;
    if id.is_empty() { None } else { Some(id) }
}

async fn open_reader(
    record: &AssetRecord,
    identity: &Identity,
) -> Result<AssetReader, Response<ResponseBody>> {
    AssetReader::open(record, identity).await.map_err(|e| {
        warn!(playback_id = %record.playback_id, error = %e, "Failed to open asset");
        status_response(StatusCode::INTERNAL_SERVER_ERROR)
    })
}

/// Stream decrypted bytes `[start, end]` as response frames.
///
/// The stream owns the reader; dropping the body (client disconnect) drops
/// the reader and with it the ciphertext file handle, so an abandoned request
/// stops decrypting immediately.
fn stream_range(reader: AssetReader, start: u64, end: u64) -> ResponseBody {
    let stream = stream::try_unfold((reader, start), move |(mut reader, pos)| async move {
        if pos > end {
            return Ok(None);
        }
        let len = (end - pos + 1).min(STREAM_CHUNK_SIZE as u64) as usize;
        let data = reader.read_range(pos, len).await.map_err(io::Error::other)?;
        if data.is_empty() {
            // Asset shorter than its record claims; end the body rather than spin.
            warn!(pos, "Ciphertext ended before the negotiated range");
            return Ok(None);
        }
        let next = pos + data.len() as u64;
        Ok(Some((Frame::data(Bytes::from(data)), (reader, next))))
    });
    StreamBody::new(stream).boxed_unsync()
}

fn empty_body() -> ResponseBody {
    Empty::<Bytes>::new().map_err(io::Error::other).boxed_unsync()
}

fn status_response(status: StatusCode) -> Response<ResponseBody> {
    let mut resp = Response::new(empty_body());
    *resp.status_mut() = status;
    resp
}

fn base_response(status: StatusCode, record: &AssetRecord) -> Builder {
    Response::builder()
        .status(status)
        .header(ACCEPT_RANGES, "bytes")
        .header(CONTENT_TYPE, record.content_type.as_str())
}

fn finish(builder: Builder, body: ResponseBody) -> Response<ResponseBody> {
    builder.body(body).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to assemble response");
        status_response(StatusCode::INTERNAL_SERVER_ERROR)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_playback_id_from_media_path() {
        assert_eq!(playback_id_from_path("/media/lesson-01"), Some("lesson-01"));
        assert_eq!(playback_id_from_path("/media/a.b_c"), Some("a.b_c"));
    }

    #[test]
    fn rejects_paths_outside_media_prefix() {
        assert_eq!(playback_id_from_path("/media/"), None);
        assert_eq!(playback_id_from_path("/media"), None);
        assert_eq!(playback_id_from_path("/other/lesson-01"), None);
        assert_eq!(playback_id_from_path("/"), None);
    }
}
