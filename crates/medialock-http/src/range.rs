//! `Range` header parsing and validation.
//!
//! The accepted grammar is deliberately narrow: exactly one `bytes=start-end`
//! or `bytes=start-` range. Multi-range requests, suffix ranges and anything
//! malformed are all answered 416 rather than silently served in full; a
//! local player under our control never sends them, so a lenient fallback
//! would only mask bugs.

/// One satisfiable byte range, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeSpec {
    pub start: u64,
    pub end: u64,
}

impl RangeSpec {
    /// Number of bytes covered.
    #[inline]
    pub fn byte_count(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `Content-Range` value for a 206 response.
    pub fn content_range(&self, size: u64) -> String {
        format!("bytes {}-{}/{size}", self.start, self.end)
    }
}

/// Outcome of range negotiation for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOutcome {
    /// No `Range` header: respond 200 with the full asset.
    Full,
    /// A valid single range: respond 206.
    Partial(RangeSpec),
    /// Malformed or out-of-bounds: respond 416 with `bytes */<size>`.
    Unsatisfiable,
}

/// Negotiate a request's `Range` header against an asset of `size` bytes.
///
/// An omitted `end` means "through the last byte". A range is unsatisfiable
/// if it does not match `bytes=<start>-<end>?`, names more than one range,
/// has `start > end`, or has `end >= size`. On an empty asset every range is
/// unsatisfiable.
pub fn negotiate(header: Option<&str>, size: u64) -> RangeOutcome {
    let Some(header) = header else {
        return RangeOutcome::Full;
    };

    match parse_single_range(header, size) {
        Some(spec) => RangeOutcome::Partial(spec),
        None => RangeOutcome::Unsatisfiable,
    }
}

fn parse_single_range(header: &str, size: u64) -> Option<RangeSpec> {
    let spec = header.strip_prefix("bytes=")?;
    if spec.contains(',') {
        return None; // multi-range is out of scope
    }

    let (start_str, end_str) = spec.split_once('-')?;
    let start: u64 = start_str.trim().parse().ok()?;

    let end = if end_str.trim().is_empty() {
        size.checked_sub(1)?
    } else {
        end_str.trim().parse().ok()?
    };

    if start > end || end >= size {
        return None;
    }
    Some(RangeSpec { start, end })
}
