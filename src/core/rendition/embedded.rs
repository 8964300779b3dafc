//! Embedded JPEG previews inside RAW files.

use std::path::Path;
use std::process::Command;

/// exiftool tags holding embedded previews, largest first
pub const PREVIEW_TAGS: [&str; 4] = ["JpgFromRaw", "PreviewImage", "OtherImage", "ThumbnailImage"];

const SOI: [u8; 3] = [0xFF, 0xD8, 0xFF];
const EOI: [u8; 2] = [0xFF, 0xD9];

fn looks_like_jpeg(bytes: &[u8]) -> bool {
    bytes.len() > SOI.len() + EOI.len() && bytes.starts_with(&SOI)
}

/// Ask exiftool for one binary tag; `None` when absent or unusable
fn exiftool_tag(exiftool: &str, path: &Path, tag: &str) -> Option<Vec<u8>> {
    let output = Command::new(exiftool)
        .arg("-b")
        .arg(format!("-{}", tag))
        .arg(path)
        .output()
        .ok()?;
    (output.status.success() && looks_like_jpeg(&output.stdout)).then_some(output.stdout)
}

/// End of the JPEG starting at `start`, matching nested SOI/EOI pairs
///
/// A preview often carries its own EXIF thumbnail, whose EOI must not
/// end the outer image.
fn matching_eoi(buffer: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut pos = start;

    while pos + EOI.len() <= buffer.len() {
        if buffer[pos..].starts_with(&SOI) {
            depth += 1;
            pos += SOI.len();
        } else if buffer[pos..].starts_with(&EOI) {
            depth -= 1;
            pos += EOI.len();
            if depth == 0 {
                return Some(pos);
            }
        } else {
            pos += 1;
        }
    }
    None
}

/// Largest complete JPEG found by scanning for SOI/EOI markers
pub fn scan_for_largest_jpeg(buffer: &[u8]) -> Option<&[u8]> {
    let mut largest: Option<&[u8]> = None;
    let mut pos = 0;

    while pos + SOI.len() <= buffer.len() {
        let Some(offset) = buffer[pos..].windows(SOI.len()).position(|w| w == SOI) else {
            break;
        };
        let start = pos + offset;

        let Some(end) = matching_eoi(buffer, start) else {
            break;
        };

        let candidate = &buffer[start..end];
        if largest.map_or(true, |l| candidate.len() > l.len()) {
            largest = Some(candidate);
        }
        pos = end;
    }

    largest.filter(|jpeg| looks_like_jpeg(jpeg))
}

/// The best embedded preview of a RAW file, if it carries one
///
/// Tries each exiftool tag in order, then scans the file itself.
pub fn extract_embedded_preview(exiftool: &str, path: &Path) -> std::io::Result<Option<Vec<u8>>> {
    for tag in PREVIEW_TAGS {
        if let Some(bytes) = exiftool_tag(exiftool, path, tag) {
            tracing::debug!(path = %path.display(), tag, bytes = bytes.len(), "embedded preview via exiftool");
            return Ok(Some(bytes));
        }
    }

    let buffer = std::fs::read(path)?;
    let found = scan_for_largest_jpeg(&buffer).map(|jpeg| jpeg.to_vec());
    if let Some(jpeg) = &found {
        tracing::debug!(path = %path.display(), bytes = jpeg.len(), "embedded preview via marker scan");
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_jpeg(body_len: usize) -> Vec<u8> {
        let mut bytes = SOI.to_vec();
        bytes.extend(std::iter::repeat(0x11).take(body_len));
        bytes.extend_from_slice(&EOI);
        bytes
    }

    #[test]
    fn picks_the_largest_embedded_jpeg() {
        let small = fake_jpeg(10);
        let large = fake_jpeg(200);
        let mut raw = b"II*\0 raw header".to_vec();
        raw.extend(&small);
        raw.extend(b"sensor data");
        raw.extend(&large);
        raw.extend(b"trailer");

        assert_eq!(scan_for_largest_jpeg(&raw), Some(large.as_slice()));
    }

    #[test]
    fn preview_with_its_own_thumbnail_is_kept_whole() {
        let thumbnail = fake_jpeg(16);
        let mut preview = SOI.to_vec();
        preview.extend(b"APP1 Exif header");
        preview.extend(&thumbnail);
        preview.extend(std::iter::repeat(0x22).take(300));
        preview.extend_from_slice(&EOI);

        let mut raw = b"II*\0 raw header".to_vec();
        raw.extend(&fake_jpeg(40));
        raw.extend(b"sensor data");
        raw.extend(&preview);
        raw.extend(b"trailer");

        assert_eq!(scan_for_largest_jpeg(&raw), Some(preview.as_slice()));
    }

    #[test]
    fn preview_missing_its_outer_end_marker_is_ignored() {
        let mut raw = b"header".to_vec();
        raw.extend_from_slice(&SOI);
        raw.extend(b"preview body");
        raw.extend(&fake_jpeg(16));
        raw.extend(b"cut short");

        assert_eq!(scan_for_largest_jpeg(&raw), None);
    }

    #[test]
    fn no_markers_means_no_preview() {
        assert_eq!(scan_for_largest_jpeg(b"II*\0 just sensor data"), None);
        assert_eq!(scan_for_largest_jpeg(&[]), None);
        assert_eq!(scan_for_largest_jpeg(&[0xFF, 0xD8]), None);
    }

    #[test]
    fn unterminated_jpeg_is_ignored() {
        let mut raw = b"header".to_vec();
        raw.extend_from_slice(&SOI);
        raw.extend(b"truncated");
        assert_eq!(scan_for_largest_jpeg(&raw), None);
    }

    #[test]
    fn falls_back_to_marker_scan_without_exiftool() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("IMG_0001.CR2");
        let jpeg = fake_jpeg(64);
        let mut raw = b"II*\0".to_vec();
        raw.extend(&jpeg);
        std::fs::write(&path, &raw).unwrap();

        let found = extract_embedded_preview("exiftool-not-installed", &path).unwrap();
        assert_eq!(found, Some(jpeg));
    }
}
