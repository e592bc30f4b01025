//! Block alignment for range reads.
//!
//! AES-CTR can only begin decrypting at a counter-block boundary, but a
//! seeking player asks for arbitrary byte offsets. Any requested sub-range is
//! therefore widened outward to its enclosing block-aligned window, decrypted
//! from that boundary, then trimmed back to exactly the bytes asked for.

/// The block-aligned ciphertext window enclosing one requested plaintext
/// range, plus the trim offsets to recover the exact request.
///
/// Ephemeral: computed fresh per request, never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CryptoRange {
    /// First byte of the aligned window; a multiple of the block size.
    pub aligned_start: u64,
    /// Last byte (inclusive) of the aligned window. May point past the end of
    /// the asset for its final block; callers clamp the ciphertext *read* to
    /// `size - 1` without changing this value.
    pub aligned_end: u64,
    /// Bytes to drop from the front of the decrypted window.
    pub skip: usize,
    /// Exact requested length, independent of alignment.
    pub take: u64,
    /// Index of the first block in the window; the CTR counter offset.
    pub block_index: u64,
}

impl CryptoRange {
    /// Compute the aligned window for the inclusive request `[start, end]`.
    ///
    /// `block_size` is the cipher's counter granule
    /// ([`crate::crypto::BLOCK_SIZE`] for AES). Requires `start <= end`;
    /// callers validate the request against the asset size first.
    #[inline]
    pub fn for_request(start: u64, end: u64, block_size: usize) -> Self {
        debug_assert!(start <= end, "range start {start} past end {end}");
        let block_size = block_size as u64;

        let aligned_start = (start / block_size) * block_size;
        let aligned_end = (end / block_size) * block_size + (block_size - 1);

        Self {
            aligned_start,
            aligned_end,
            skip: (start - aligned_start) as usize,
            take: end - start + 1,
            block_index: aligned_start / block_size,
        }
    }

    /// Length in bytes of the full (unclamped) aligned window.
    #[inline]
    pub fn aligned_len(&self) -> u64 {
        self.aligned_end - self.aligned_start + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::BLOCK_SIZE;

    #[test]
    fn widens_unaligned_range_to_enclosing_blocks() {
        let range = CryptoRange::for_request(10, 25, BLOCK_SIZE);
        assert_eq!(
            range,
            CryptoRange {
                aligned_start: 0,
                aligned_end: 31,
                skip: 10,
                take: 16,
                block_index: 0,
            }
        );
    }

    #[test]
    fn aligned_range_passes_through() {
        let range = CryptoRange::for_request(16, 31, BLOCK_SIZE);
        assert_eq!(
            range,
            CryptoRange {
                aligned_start: 16,
                aligned_end: 31,
                skip: 0,
                take: 16,
                block_index: 1,
            }
        );
    }

    #[test]
    fn single_byte_request() {
        let range = CryptoRange::for_request(17, 17, BLOCK_SIZE);
        assert_eq!(range.aligned_start, 16);
        assert_eq!(range.aligned_end, 31);
        assert_eq!(range.skip, 1);
        assert_eq!(range.take, 1);
        assert_eq!(range.block_index, 1);
    }

    #[test]
    fn alignment_invariants_hold() {
        let block = BLOCK_SIZE as u64;
        for (start, end) in [(0, 0), (0, 15), (1, 14), (15, 16), (100, 1000), (4095, 4097)] {
            let r = CryptoRange::for_request(start, end, BLOCK_SIZE);
            assert!(r.aligned_start <= start);
            assert!(r.aligned_end >= end);
            assert_eq!(r.aligned_start % block, 0);
            assert_eq!((r.aligned_end + 1) % block, 0);
            assert!((r.skip as u64) < block);
            assert_eq!(r.skip as u64, start - r.aligned_start);
            assert_eq!(r.take, end - start + 1);
            assert_eq!(r.block_index, r.aligned_start / block);
        }
    }
}
