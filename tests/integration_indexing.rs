//! Integration tests for indexing and renditions.
//!
//! These tests drive the public `MediaLibrary` API end to end:
//! - Scanning and indexing a folder tree
//! - Re-indexing without duplicating assets
//! - Marking deleted files missing
//! - Rendering a real thumbnail

use assert_fs::prelude::*;
use assert_fs::TempDir;
use media_catalog::core::catalog::{asset_id, AssetStatus};
use media_catalog::core::rendition::RenditionKind;
use media_catalog::events::{Event, EventChannel, IndexEvent, RunStatus};
use media_catalog::{EngineConfig, MediaLibrary};
use predicates::prelude::*;
use std::path::Path;

fn config(temp_dir: &TempDir) -> EngineConfig {
    EngineConfig {
        ffprobe: "ffprobe-not-installed".to_string(),
        ffmpeg: "ffmpeg-not-installed".to_string(),
        exiftool: "exiftool-not-installed".to_string(),
        ..EngineConfig::rooted_at(&temp_dir.path().join("state"))
    }
}

fn write_png(path: &Path, width: u32, height: u32) {
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    img.save(path).unwrap();
}

#[test]
fn scan_finds_media_and_skips_the_rest() {
    let temp_dir = TempDir::new().unwrap();
    let photos = temp_dir.child("photos");
    photos.child("a.JPG").write_binary(b"jpeg").unwrap();
    photos.child("trip/b.mov").write_binary(b"mov").unwrap();
    photos.child("trip/c.CR2").write_binary(b"raw").unwrap();
    photos.child("notes.txt").write_str("not media").unwrap();
    photos.child(".hidden/d.jpg").write_binary(b"hidden").unwrap();

    let library = MediaLibrary::open(config(&temp_dir)).unwrap();
    let files = library.scan_directory(photos.path()).unwrap();

    assert_eq!(files.len(), 3);
    let is_media = predicate::str::ends_with(".JPG")
        .or(predicate::str::ends_with(".mov"))
        .or(predicate::str::ends_with(".CR2"));
    for file in &files {
        assert!(is_media.eval(&file.to_string_lossy()), "{}", file.display());
    }
}

#[test]
fn scan_of_missing_directory_fails() {
    let temp_dir = TempDir::new().unwrap();
    let library = MediaLibrary::open(config(&temp_dir)).unwrap();

    assert!(library
        .scan_directory(&temp_dir.path().join("nope"))
        .is_err());
}

#[test]
fn indexing_reports_progress_and_stores_assets() {
    let temp_dir = TempDir::new().unwrap();
    let photos = temp_dir.child("photos");
    photos.create_dir_all().unwrap();
    write_png(&photos.path().join("a.png"), 8, 8);
    photos.child("b.jpg").write_binary(b"not really a jpeg").unwrap();
    photos.child("clips/c.mp4").write_binary(b"not really a video").unwrap();

    let (sender, receiver) = EventChannel::new();
    let library = MediaLibrary::builder(config(&temp_dir))
        .events(sender)
        .build()
        .unwrap();

    let volume = library.start_indexing(photos.path()).unwrap();
    let summary = library.wait_for_indexing().unwrap();

    assert_eq!(summary.status, RunStatus::Completed);
    assert_eq!(summary.total, 3);
    assert_eq!(summary.indexed, 3);
    assert_eq!(library.catalog().count_assets().unwrap(), 3);

    let clip = library
        .catalog()
        .get_asset(&asset_id(&volume.uuid, "clips/c.mp4"))
        .unwrap()
        .unwrap();
    assert_eq!(clip.file_name, "c.mp4");
    assert_eq!(clip.status, AssetStatus::Online);

    let events = receiver.drain();
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::Index(IndexEvent::Started { .. }))));
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::Index(IndexEvent::Flushed { .. }))));
    assert!(matches!(
        events.last(),
        Some(Event::Index(IndexEvent::Finished { .. }))
    ));
}

#[test]
fn reindexing_updates_in_place() {
    let temp_dir = TempDir::new().unwrap();
    let photos = temp_dir.child("photos");
    photos.child("a.jpg").write_binary(b"first").unwrap();
    let library = MediaLibrary::open(config(&temp_dir)).unwrap();

    let volume = library.start_indexing(photos.path()).unwrap();
    library.wait_for_indexing().unwrap();
    let id = asset_id(&volume.uuid, "a.jpg");
    let before = library.catalog().get_asset(&id).unwrap().unwrap();

    photos.child("a.jpg").write_binary(b"second, longer").unwrap();
    library.start_indexing(photos.path()).unwrap();
    library.wait_for_indexing().unwrap();
    let after = library.catalog().get_asset(&id).unwrap().unwrap();

    assert_eq!(library.catalog().count_assets().unwrap(), 1);
    assert_ne!(before.fingerprint, after.fingerprint);
    assert_eq!(after.fingerprint.size, 14);
}

#[test]
fn deleted_files_are_marked_missing_not_removed() {
    let temp_dir = TempDir::new().unwrap();
    let photos = temp_dir.child("photos");
    photos.child("keep.jpg").write_binary(b"keep").unwrap();
    photos.child("gone.jpg").write_binary(b"gone").unwrap();
    let library = MediaLibrary::open(config(&temp_dir)).unwrap();

    let volume = library.start_indexing(photos.path()).unwrap();
    library.wait_for_indexing().unwrap();
    std::fs::remove_file(photos.path().join("gone.jpg")).unwrap();
    library.start_indexing(photos.path()).unwrap();
    let summary = library.wait_for_indexing().unwrap();

    assert_eq!(summary.missing, 1);
    assert_eq!(library.catalog().count_assets().unwrap(), 2);
    let gone = library
        .catalog()
        .get_asset(&asset_id(&volume.uuid, "gone.jpg"))
        .unwrap()
        .unwrap();
    assert_eq!(gone.status, AssetStatus::Missing);
}

#[test]
fn identical_files_are_duplicate_candidates() {
    let temp_dir = TempDir::new().unwrap();
    let photos = temp_dir.child("photos");
    photos.child("a.jpg").write_binary(b"same bytes").unwrap();
    photos.child("copy/a.jpg").write_binary(b"same bytes").unwrap();
    photos.child("other.jpg").write_binary(b"different!").unwrap();
    let library = MediaLibrary::open(config(&temp_dir)).unwrap();

    library.start_indexing(photos.path()).unwrap();
    library.wait_for_indexing().unwrap();
    let groups = library.duplicate_candidates().unwrap();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn thumbnails_are_rendered_once_and_served_by_uri() {
    let temp_dir = TempDir::new().unwrap();
    let photos = temp_dir.child("photos");
    photos.create_dir_all().unwrap();
    write_png(&photos.path().join("wide.png"), 800, 400);
    let library = MediaLibrary::open(config(&temp_dir)).unwrap();

    let volume = library.start_indexing(photos.path()).unwrap();
    library.wait_for_indexing().unwrap();
    let id = asset_id(&volume.uuid, "wide.png");

    let thumb = library
        .rendition(&id, RenditionKind::Thumbnail)
        .await
        .unwrap();
    assert!(predicate::path::is_file().eval(&thumb));
    assert!(thumb.to_string_lossy().ends_with("_thumb_v2.jpg"));

    let (width, height) = image::image_dimensions(&thumb).unwrap();
    assert_eq!((width, height), (320, 160));

    let bytes = library
        .read_uri(&format!("media://thumbnail/{}", id))
        .await
        .unwrap();
    assert_eq!(bytes, std::fs::read(&thumb).unwrap());

    let original = library
        .read_uri(&format!("media://original/{}", id))
        .await
        .unwrap();
    assert_eq!(original, std::fs::read(photos.path().join("wide.png")).unwrap());

    let stored = library.catalog().get_asset(&id).unwrap().unwrap();
    assert_eq!(stored.thumbnail_paths, vec![thumb]);
}

#[tokio::test(flavor = "multi_thread")]
async fn edited_photo_gets_a_fresh_thumbnail() {
    let temp_dir = TempDir::new().unwrap();
    let photos = temp_dir.child("photos");
    photos.create_dir_all().unwrap();
    let photo = photos.path().join("edit.png");
    write_png(&photo, 800, 400);
    let library = MediaLibrary::open(config(&temp_dir)).unwrap();

    let volume = library.start_indexing(photos.path()).unwrap();
    library.wait_for_indexing().unwrap();
    let id = asset_id(&volume.uuid, "edit.png");
    let thumb = library.rendition(&id, RenditionKind::Thumbnail).await.unwrap();
    assert_eq!(image::image_dimensions(&thumb).unwrap(), (320, 160));

    // Cropped to portrait in place: same path, new content.
    write_png(&photo, 400, 800);
    library.start_indexing(photos.path()).unwrap();
    library.wait_for_indexing().unwrap();
    let thumb = library.rendition(&id, RenditionKind::Thumbnail).await.unwrap();
    assert_eq!(image::image_dimensions(&thumb).unwrap(), (160, 320));

    // Single-file indexing drops the stale thumbnail too.
    write_png(&photo, 600, 600);
    library.index_file(&photo, &volume.uuid, photos.path()).unwrap();
    let thumb = library.rendition(&id, RenditionKind::Thumbnail).await.unwrap();
    assert_eq!(image::image_dimensions(&thumb).unwrap(), (320, 320));
}

#[tokio::test(flavor = "multi_thread")]
async fn path_like_uris_are_refused() {
    let temp_dir = TempDir::new().unwrap();
    let library = MediaLibrary::open(config(&temp_dir)).unwrap();

    assert!(library
        .read_uri("media://original/../../etc/passwd")
        .await
        .is_err());
}

#[test]
fn prune_removes_legacy_and_orphaned_files() {
    let temp_dir = TempDir::new().unwrap();
    let library = MediaLibrary::open(config(&temp_dir)).unwrap();
    let cache = temp_dir.child("state/renditions");
    cache.child("orphan_thumb_v2.jpg").write_binary(b"x").unwrap();
    cache.child("orphan_thumb.jpg").write_binary(b"xy").unwrap();

    let report = library.prune_cache().unwrap();

    assert_eq!(report.removed, 2);
    assert_eq!(report.bytes_freed, 3);
    cache
        .child("orphan_thumb_v2.jpg")
        .assert(predicate::path::missing());
    assert_eq!(library.cache_stats().unwrap().files, 0);
}
