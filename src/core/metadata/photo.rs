//! EXIF extraction for still images.

use super::MediaMetadata;
use chrono::{DateTime, NaiveDateTime, Utc};
use exif::{Exif, In, Reader, Tag, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Read EXIF fields from a photo. Missing data stays `None`.
pub fn extract_photo_metadata(path: &Path) -> MediaMetadata {
    let mut metadata = MediaMetadata::default();

    if let Some(exif) = read_exif(path) {
        apply_exif(&exif, &mut metadata);
    }

    // PNG/GIF/BMP rarely carry EXIF dimensions; the header always has them.
    if metadata.width.is_none() || metadata.height.is_none() {
        if let Ok((w, h)) = image::image_dimensions(path) {
            metadata.width = Some(w);
            metadata.height = Some(h);
        }
    }

    normalize_orientation(&mut metadata);
    metadata
}

fn read_exif(path: &Path) -> Option<Exif> {
    let file = File::open(path).ok()?;
    let mut reader = BufReader::new(file);
    Reader::new().read_from_container(&mut reader).ok()
}

fn apply_exif(exif: &Exif, metadata: &mut MediaMetadata) {
    let field = |tag: Tag| exif.get_field(tag, In::PRIMARY).map(|f| &f.value);

    metadata.width = field(Tag::PixelXDimension)
        .and_then(get_u32_value)
        .or_else(|| field(Tag::ImageWidth).and_then(get_u32_value));
    metadata.height = field(Tag::PixelYDimension)
        .and_then(get_u32_value)
        .or_else(|| field(Tag::ImageLength).and_then(get_u32_value));

    metadata.camera_make = field(Tag::Make).and_then(get_string_value);
    metadata.camera_model = field(Tag::Model).and_then(get_string_value);
    metadata.lens_model = field(Tag::LensModel).and_then(get_string_value);

    metadata.iso = field(Tag::PhotographicSensitivity).and_then(get_u32_value);
    metadata.f_number = field(Tag::FNumber).and_then(get_rational_value);
    metadata.exposure_time = field(Tag::ExposureTime).and_then(get_rational_value);
    metadata.focal_length = field(Tag::FocalLength).and_then(get_rational_value);

    if let Some(Value::Short(values)) = field(Tag::Orientation) {
        metadata.orientation = values.first().copied();
    }

    metadata.date_taken = field(Tag::DateTimeOriginal)
        .or_else(|| field(Tag::DateTime))
        .and_then(get_string_value)
        .and_then(|s| parse_exif_date(&s));

    metadata.gps_latitude = gps_coordinate(exif, Tag::GPSLatitude, Tag::GPSLatitudeRef, "S");
    metadata.gps_longitude = gps_coordinate(exif, Tag::GPSLongitude, Tag::GPSLongitudeRef, "W");
}

/// Orientations 5-8 are rotated a quarter turn: store the displayed aspect ratio.
pub(crate) fn normalize_orientation(metadata: &mut MediaMetadata) {
    if matches!(metadata.orientation, Some(5..=8)) {
        std::mem::swap(&mut metadata.width, &mut metadata.height);
    }
}

/// EXIF date format: "YYYY:MM:DD HH:MM:SS"
fn parse_exif_date(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value.trim(), "%Y:%m:%d %H:%M:%S")
        .ok()
        .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
}

/// Degrees/minutes/seconds to signed decimal degrees
fn gps_coordinate(exif: &Exif, value_tag: Tag, ref_tag: Tag, negative_ref: &str) -> Option<f64> {
    let field = exif.get_field(value_tag, In::PRIMARY)?;
    let Value::Rational(parts) = &field.value else {
        return None;
    };
    if parts.len() < 3 || parts.iter().any(|r| r.denom == 0) {
        return None;
    }

    let degrees = parts[0].to_f64() + parts[1].to_f64() / 60.0 + parts[2].to_f64() / 3600.0;

    let negative = exif
        .get_field(ref_tag, In::PRIMARY)
        .and_then(|f| get_string_value(&f.value))
        .map(|r| r.eq_ignore_ascii_case(negative_ref))
        .unwrap_or(false);

    Some(if negative { -degrees } else { degrees })
}

fn get_u32_value(value: &Value) -> Option<u32> {
    match value {
        Value::Long(vec) => vec.first().copied(),
        Value::Short(vec) => vec.first().map(|v| *v as u32),
        _ => None,
    }
}

fn get_rational_value(value: &Value) -> Option<f64> {
    match value {
        Value::Rational(vec) => vec.first().filter(|r| r.denom != 0).map(|r| r.to_f64()),
        _ => None,
    }
}

fn get_string_value(value: &Value) -> Option<String> {
    let Value::Ascii(vec) = value else {
        return None;
    };
    let bytes = vec.first()?;
    let s = std::str::from_utf8(bytes).ok()?;
    let trimmed = s.trim_end_matches('\0').trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use tempfile::TempDir;

    #[test]
    fn portrait_orientation_swaps_dimensions() {
        let mut metadata = MediaMetadata {
            width: Some(6000),
            height: Some(4000),
            orientation: Some(6),
            ..Default::default()
        };
        normalize_orientation(&mut metadata);
        assert_eq!((metadata.width, metadata.height), (Some(4000), Some(6000)));
    }

    #[test]
    fn mirrored_orientation_keeps_dimensions() {
        let mut metadata = MediaMetadata {
            width: Some(6000),
            height: Some(4000),
            orientation: Some(3),
            ..Default::default()
        };
        normalize_orientation(&mut metadata);
        assert_eq!((metadata.width, metadata.height), (Some(6000), Some(4000)));
    }

    #[test]
    fn exif_date_parses() {
        let date = parse_exif_date("2023:07:14 18:30:05").unwrap();
        assert_eq!(date.to_rfc3339(), "2023-07-14T18:30:05+00:00");
        assert!(parse_exif_date("yesterday").is_none());
    }

    #[test]
    fn png_without_exif_still_reports_dimensions() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("plain.png");
        ImageBuffer::from_pixel(40, 30, Rgb([10u8, 20, 30]))
            .save(&path)
            .unwrap();

        let metadata = extract_photo_metadata(&path);
        assert_eq!(metadata.width, Some(40));
        assert_eq!(metadata.height, Some(30));
        assert!(metadata.camera_make.is_none());
    }

    #[test]
    fn unreadable_photo_yields_empty_metadata() {
        let metadata = extract_photo_metadata(Path::new("/nonexistent/file.jpg"));
        assert_eq!(metadata, MediaMetadata::default());
    }
}
