//! Round-trip tests for range-addressed decryption.
//!
//! The core contract: encrypting a plaintext and then reading any in-bounds
//! byte range back through the aligned-window path reproduces exactly that
//! slice of the plaintext, for every alignment.

use aes::cipher::StreamCipher;
use proptest::prelude::*;

use medialock_core::crypto::{self, AssetIv, BLOCK_SIZE, derive_asset_key};
use medialock_core::range::CryptoRange;
use medialock_core::reader::{AssetReader, decrypt_window};
use medialock_core::store::AssetStore;
use medialock_core::Identity;

fn identity() -> Identity {
    Identity::new("client-rt", Some("user-rt".to_string()))
}

// ============================================================================
// Pure window path
// ============================================================================

/// Plaintext of 1..4096 bytes with an arbitrary in-bounds inclusive range.
fn asset_and_range() -> impl Strategy<Value = (Vec<u8>, u64, u64)> {
    (1usize..4096)
        .prop_flat_map(|n| proptest::collection::vec(any::<u8>(), n))
        .prop_flat_map(|data| {
            let max = data.len() as u64 - 1;
            (Just(data), 0..=max)
        })
        .prop_flat_map(|(data, start)| {
            let max = data.len() as u64 - 1;
            (Just(data), Just(start), start..=max)
        })
}

proptest! {
    #[test]
    fn any_range_decrypts_to_exact_slice((data, start, end) in asset_and_range()) {
        let key = derive_asset_key("prop-salt", "prop-client", Some("prop-user"), 1);
        let iv = AssetIv::generate();

        let mut ciphertext = data.clone();
        crypto::cipher(key.bytes(), &iv).apply_keystream(&mut ciphertext);

        let range = CryptoRange::for_request(start, end, BLOCK_SIZE);
        let read_end = range.aligned_end.min(data.len() as u64 - 1);
        let window = ciphertext[range.aligned_start as usize..=read_end as usize].to_vec();

        let got = decrypt_window(key.bytes(), &iv, &range, window);
        prop_assert_eq!(&got[..], &data[start as usize..=end as usize]);
    }
}

// ============================================================================
// Store + reader path
// ============================================================================

fn patterned(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

#[tokio::test]
async fn reader_round_trips_across_block_boundaries() {
    let dir = tempfile::tempdir().unwrap();
    let store = AssetStore::open(dir.path()).await.unwrap();

    let plaintext = patterned(5 * BLOCK_SIZE + 7);
    let record = store
        .import("boundaries", "video/mp4", &plaintext, &identity())
        .await
        .unwrap();

    let cases = [
        (0u64, 0usize),                       // single leading byte
        (0, BLOCK_SIZE - 1),                  // exactly one block
        (BLOCK_SIZE as u64, BLOCK_SIZE - 1),  // aligned interior block
        (10, 25),                             // straddles block 0/1
        (BLOCK_SIZE as u64 - 1, BLOCK_SIZE),  // one byte each side of a boundary
        (17, 3 * BLOCK_SIZE + 4),             // multi-block interior
        (plaintext.len() as u64 - 7, 6),      // tail ending in the partial block
    ];

    for (offset, last) in cases {
        let len = last + 1;
        let mut reader = AssetReader::open(&record, &identity()).await.unwrap();
        let got = reader.read_range(offset, len).await.unwrap();
        let expected = &plaintext[offset as usize..offset as usize + len];
        assert_eq!(got, expected, "range offset={offset} len={len}");
    }
}

#[tokio::test]
async fn full_read_matches_imported_plaintext() {
    let dir = tempfile::tempdir().unwrap();
    let store = AssetStore::open(dir.path()).await.unwrap();

    let plaintext = patterned(100_000);
    let record = store
        .import("full", "video/mp4", &plaintext, &identity())
        .await
        .unwrap();

    let mut reader = AssetReader::open(&record, &identity()).await.unwrap();
    assert_eq!(reader.plaintext_size(), plaintext.len() as u64);
    assert_eq!(reader.read_to_end().await.unwrap(), plaintext);
}

#[tokio::test]
async fn read_past_eof_clamps_instead_of_failing() {
    let dir = tempfile::tempdir().unwrap();
    let store = AssetStore::open(dir.path()).await.unwrap();

    let plaintext = patterned(100);
    let record = store
        .import("clamp", "video/mp4", &plaintext, &identity())
        .await
        .unwrap();

    let mut reader = AssetReader::open(&record, &identity()).await.unwrap();

    let tail = reader.read_range(90, 1000).await.unwrap();
    assert_eq!(tail, &plaintext[90..]);

    assert!(reader.read_range(100, 10).await.unwrap().is_empty());
    assert!(reader.read_range(5000, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn wrong_identity_yields_garbage_without_error() {
    // CTR has no integrity: mismatched identity inputs must decrypt cleanly
    // to wrong bytes, with no error signal. Pinning this keeps the failure
    // mode a documented design decision rather than an accident.
    let dir = tempfile::tempdir().unwrap();
    let store = AssetStore::open(dir.path()).await.unwrap();

    let plaintext = patterned(1000);
    let record = store
        .import("mismatch", "video/mp4", &plaintext, &identity())
        .await
        .unwrap();

    let other = Identity::new("client-rt", Some("someone-else".to_string()));
    let mut reader = AssetReader::open(&record, &other).await.unwrap();
    let got = reader.read_range(0, plaintext.len()).await.unwrap();

    assert_eq!(got.len(), plaintext.len());
    assert_ne!(got, plaintext);
}

#[tokio::test]
async fn concurrent_readers_return_independent_plaintext() {
    let dir = tempfile::tempdir().unwrap();
    let store = AssetStore::open(dir.path()).await.unwrap();

    let plaintext = patterned(64 * 1024);
    let record = store
        .import("concurrent", "video/mp4", &plaintext, &identity())
        .await
        .unwrap();

    let mut tasks = tokio::task::JoinSet::new();
    for i in 0u64..50 {
        let record = record.clone();
        let plaintext = plaintext.clone();
        tasks.spawn(async move {
            // Overlapping and disjoint ranges across the asset.
            let offset = (i * 1013) % (plaintext.len() as u64 - 512);
            let len = 200 + (i as usize * 37) % 2048;
            let mut reader = AssetReader::open(&record, &identity()).await.unwrap();
            let got = reader.read_range(offset, len).await.unwrap();
            let expected =
                &plaintext[offset as usize..(offset as usize + len).min(plaintext.len())];
            assert_eq!(got, expected, "task {i} offset={offset} len={len}");
        });
    }

    while let Some(result) = tasks.join_next().await {
        result.unwrap();
    }
}
