//! Content reads through handles and the chunk store

mod support;

use common::testkit::patterned_bytes;
use diskfs_daemon::vfs::FsError;
use http::StatusCode;

#[tokio::test]
async fn test_open_allocates_distinct_handles() {
    let (store, fs, _temp) = support::setup(1024);
    store.add_file("/a.txt", b"a".to_vec());

    let first = fs.open("/a.txt").await.unwrap();
    let second = fs.open("/a.txt").await.unwrap();
    assert_ne!(first, second);
    assert!(second > first);
    assert_eq!(fs.handles().len(), 2);
}

#[tokio::test]
async fn test_open_rejects_directories_and_missing_files() {
    let (store, fs, _temp) = support::setup(1024);
    store.add_dir("/docs");

    assert!(matches!(fs.open("/docs").await, Err(FsError::NotFound(_))));
    assert!(matches!(fs.open("/").await, Err(FsError::NotFound(_))));
    assert!(matches!(fs.open("/missing").await, Err(FsError::NotFound(_))));
    assert!(fs.handles().is_empty());
}

#[tokio::test]
async fn test_whole_read_matches_chunk_reads() {
    let (store, fs, _temp) = support::setup(1024);
    let data = patterned_bytes(2500);
    store.add_file("/big.bin", data.clone());

    let fh = fs.open("/big.bin").await.unwrap();
    let whole = fs.read(fh, 0, 2500, None).await.unwrap();
    assert_eq!(&whole[..], &data[..]);

    let mut pieces = Vec::new();
    for offset in [0u64, 1024, 2048] {
        pieces.extend_from_slice(&fs.read(fh, offset, 1024, None).await.unwrap());
    }
    assert_eq!(pieces, data);
}

#[tokio::test]
async fn test_read_spanning_three_chunks() {
    let (store, fs, _temp) = support::setup(1024);
    let data = patterned_bytes(2500);
    store.add_file("/big.bin", data.clone());

    let fh = fs.open("/big.bin").await.unwrap();
    let bytes = fs.read(fh, 1000, 1100, None).await.unwrap();

    assert_eq!(bytes.len(), 1100);
    assert_eq!(&bytes[..], &data[1000..2100]);
    assert_eq!(store.range_calls(), 3);
    for index in 0..3 {
        assert!(fs.chunks().is_cached("/big.bin", index));
    }

    // Served locally the second time
    let again = fs.read(fh, 1000, 1100, None).await.unwrap();
    assert_eq!(again, bytes);
    assert_eq!(store.range_calls(), 3);
}

#[tokio::test]
async fn test_read_at_end_of_file() {
    let (store, fs, _temp) = support::setup(1024);
    let data = patterned_bytes(2500);
    store.add_file("/big.bin", data.clone());
    let fh = fs.open("/big.bin").await.unwrap();

    let tail = fs.read(fh, 2400, 500, None).await.unwrap();
    assert_eq!(&tail[..], &data[2400..]);

    assert!(fs.read(fh, 2500, 100, None).await.unwrap().is_empty());
    assert!(fs.read(fh, 9000, 100, None).await.unwrap().is_empty());

    // Only the last chunk was ever requested
    assert_eq!(store.range_calls(), 1);
}

#[tokio::test]
async fn test_empty_file_reads_nothing() {
    let (store, fs, _temp) = support::setup(1024);
    store.add_file("/empty", Vec::new());

    let fh = fs.open("/empty").await.unwrap();
    assert!(fs.read(fh, 0, 4096, None).await.unwrap().is_empty());
    assert_eq!(store.range_calls(), 0);
}

#[tokio::test]
async fn test_unknown_handle_falls_back_to_path() {
    let (store, fs, _temp) = support::setup(1024);
    store.add_file("/a.txt", b"fallback".to_vec());

    let bytes = fs.read(42, 0, 64, Some("/a.txt")).await.unwrap();
    assert_eq!(&bytes[..], b"fallback");

    assert!(matches!(
        fs.read(42, 0, 64, None).await,
        Err(FsError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_release_forgets_handle() {
    let (store, fs, _temp) = support::setup(1024);
    store.add_file("/a.txt", b"abc".to_vec());

    let fh = fs.open("/a.txt").await.unwrap();
    fs.release(fh);
    assert!(fs.handles().is_empty());
    assert!(matches!(
        fs.read(fh, 0, 3, None).await,
        Err(FsError::NotFound(_))
    ));

    // Releasing twice is harmless, and numbers are not reused
    fs.release(fh);
    assert!(fs.open("/a.txt").await.unwrap() > fh);
}

#[tokio::test]
async fn test_failed_chunk_fetch_is_io_error() {
    let (store, fs, _temp) = support::setup(1024);
    store.add_file("/a.txt", patterned_bytes(100));
    store.set_range_status(Some(StatusCode::OK));

    let fh = fs.open("/a.txt").await.unwrap();
    let err = fs.read(fh, 0, 100, None).await.unwrap_err();
    assert_eq!(err, FsError::Io("/a.txt".to_string()));
    assert!(!fs.chunks().is_cached("/a.txt", 0));

    store.set_range_status(None);
    assert_eq!(fs.read(fh, 0, 100, None).await.unwrap().len(), 100);
}

#[tokio::test(start_paused = true)]
async fn test_remote_change_replaces_cached_chunks() {
    let (store, fs, _temp) = support::setup(1024);
    store.add_file_at("/a.txt", b"version one".to_vec(), 100);

    let fh = fs.open("/a.txt").await.unwrap();
    assert_eq!(&fs.read(fh, 0, 64, None).await.unwrap()[..], b"version one");

    store.add_file_at("/a.txt", b"version two".to_vec(), 200);

    // Cached attributes still describe the old version
    assert_eq!(&fs.read(fh, 0, 64, None).await.unwrap()[..], b"version one");
    assert_eq!(store.range_calls(), 1);

    tokio::time::advance(support::TTL + std::time::Duration::from_secs(1)).await;
    assert_eq!(&fs.read(fh, 0, 64, None).await.unwrap()[..], b"version two");
    assert_eq!(store.range_calls(), 2);
}

#[tokio::test]
async fn test_same_basename_in_different_directories() {
    let (store, fs, _temp) = support::setup(1024);
    store.add_file("/one/data.bin", b"first".to_vec());
    store.add_file("/two/data.bin", b"second".to_vec());

    let a = fs.open("/one/data.bin").await.unwrap();
    let b = fs.open("/two/data.bin").await.unwrap();
    assert_eq!(&fs.read(a, 0, 16, None).await.unwrap()[..], b"first");
    assert_eq!(&fs.read(b, 0, 16, None).await.unwrap()[..], b"second");
}

#[tokio::test(start_paused = true)]
async fn test_cached_chunks_survive_failed_metadata_refresh() {
    let (store, fs, _temp) = support::setup(1024);
    let data = patterned_bytes(2048);
    store.add_file("/a.bin", data.clone());
    store.add_file("/b.bin", patterned_bytes(10));

    let fh = fs.open("/a.bin").await.unwrap();
    assert_eq!(&fs.read(fh, 0, 4096, None).await.unwrap()[..], &data[..]);
    assert_eq!(store.range_calls(), 2);

    tokio::time::advance(support::TTL + std::time::Duration::from_secs(1)).await;
    store.set_failing(true);

    assert_eq!(&fs.read(fh, 1000, 100, None).await.unwrap()[..], &data[1000..1100]);
    // The size is unknown, so the read stops where the next fetch fails
    assert_eq!(&fs.read(fh, 0, 4096, None).await.unwrap()[..], &data[..]);
    assert!(fs.chunks().is_cached("/a.bin", 0));
    assert!(fs.chunks().is_cached("/a.bin", 1));

    // Nothing cached to fall back on
    let err = fs.read(999, 0, 10, Some("/b.bin")).await.unwrap_err();
    assert_eq!(err, FsError::Io("/b.bin".to_string()));

    store.set_failing(false);
    assert_eq!(fs.read(999, 0, 10, Some("/b.bin")).await.unwrap().len(), 10);
}

#[tokio::test(start_paused = true)]
async fn test_large_listing_leaves_chunk_store_empty() {
    let (store, fs, _temp) = support::setup(1024);
    for i in 0..5000 {
        store.add_file_at(&format!("/d/f{}", i), b"xxxxxxxx".to_vec(), 100);
    }

    assert_eq!(fs.readdir("/d").await.unwrap().len(), 5000);
    assert_eq!(fs.chunks().cached_chunks(), 0);
    assert_eq!(std::fs::read_dir(fs.chunks().dir()).unwrap().count(), 0);
    assert_eq!(store.range_calls(), 0);

    let fh = fs.open("/d/f7").await.unwrap();
    assert_eq!(&fs.read(fh, 0, 64, None).await.unwrap()[..], b"xxxxxxxx");

    // A change seen through a fresh listing replaces the cached chunk
    store.add_file_at("/d/f7", b"yyyy".to_vec(), 200);
    tokio::time::advance(support::TTL + std::time::Duration::from_secs(1)).await;
    fs.readdir("/d").await.unwrap();

    let metadata_calls = store.metadata_calls();
    assert_eq!(&fs.read(fh, 0, 64, None).await.unwrap()[..], b"yyyy");
    assert_eq!(store.metadata_calls(), metadata_calls);
    assert_eq!(fs.chunks().cached_chunks(), 1);
}
