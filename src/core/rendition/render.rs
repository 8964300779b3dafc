//! Rendering originals into cache files.

use super::embedded::extract_embedded_preview;
use crate::core::scanner::MediaType;
use crate::error::RenditionError;
use fast_image_resize::{images::Image, PixelType, ResizeOptions, Resizer};
use image::codecs::jpeg::JpegEncoder;
use image::metadata::Orientation;
use image::{DynamicImage, ExtendedColorType, ImageReader};
use std::io::{BufWriter, Cursor, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::NamedTempFile;

const JPEG_QUALITY: u8 = 85;

/// An original file to render from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub media_type: MediaType,
    pub is_raw: bool,
    /// EXIF orientation, applied to photo thumbnails
    pub orientation: Option<u16>,
}

/// Produces rendition files
///
/// Calls are blocking and run on tokio's blocking pool. Implementations
/// must write `dest` atomically.
pub trait RenditionRenderer: Send + Sync {
    /// Write a JPEG thumbnail of `source` to `dest`
    fn thumbnail(&self, source: &SourceFile, dest: &Path) -> Result<(), RenditionError>;

    /// Write the full-resolution embedded preview of a RAW file to `dest`.
    ///
    /// Returns `Ok(false)` when the file carries no usable preview.
    fn raw_preview(&self, source: &SourceFile, dest: &Path) -> Result<bool, RenditionError>;
}

/// Renderer backed by the image crate, ffmpeg and exiftool
#[derive(Debug, Clone)]
pub struct ToolRenderer {
    ffmpeg: String,
    exiftool: String,
    edge: u32,
}

impl ToolRenderer {
    pub fn new(ffmpeg: impl Into<String>, exiftool: impl Into<String>, edge: u32) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            exiftool: exiftool.into(),
            edge: edge.max(1),
        }
    }

    fn render_failed(path: &Path, reason: impl ToString) -> RenditionError {
        RenditionError::RenderFailed {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    fn decode_photo(&self, source: &SourceFile) -> Result<DynamicImage, RenditionError> {
        if source.is_raw {
            let jpeg = extract_embedded_preview(&self.exiftool, &source.path)
                .map_err(|e| Self::render_failed(&source.path, e))?
                .ok_or_else(|| Self::render_failed(&source.path, "no embedded preview"))?;
            return ImageReader::new(Cursor::new(jpeg))
                .with_guessed_format()
                .map_err(|e| Self::render_failed(&source.path, e))?
                .decode()
                .map_err(|e| Self::render_failed(&source.path, e));
        }

        ImageReader::open(&source.path)
            .map_err(|e| Self::render_failed(&source.path, e))?
            .with_guessed_format()
            .map_err(|e| Self::render_failed(&source.path, e))?
            .decode()
            .map_err(|e| Self::render_failed(&source.path, e))
    }

    fn video_frame(&self, source: &SourceFile, dest: &Path) -> Result<(), RenditionError> {
        let dir = cache_dir_of(dest)?;
        let staged = tempfile::Builder::new()
            .suffix(".jpg")
            .tempfile_in(dir)
            .map_err(|e| Self::render_failed(dest, e))?;

        let scale = format!(
            "scale=w={0}:h={0}:force_original_aspect_ratio=decrease",
            self.edge
        );

        // Skip the first second to avoid black lead-in frames; very short
        // clips have no frame there, so retry from the start.
        let mut last_error = String::new();
        for seek in [Some("1"), None] {
            let mut command = Command::new(&self.ffmpeg);
            command.args(["-v", "error", "-y"]);
            if let Some(seek) = seek {
                command.args(["-ss", seek]);
            }
            let output = command
                .arg("-i")
                .arg(&source.path)
                .args(["-frames:v", "1", "-vf", &scale, "-q:v", "3"])
                .arg(staged.path())
                .output()
                .map_err(|e| Self::render_failed(&source.path, format!("could not run {}: {}", self.ffmpeg, e)))?;

            let written = std::fs::metadata(staged.path())
                .map(|m| m.len() > 0)
                .unwrap_or(false);
            if output.status.success() && written {
                staged
                    .persist(dest)
                    .map_err(|e| Self::render_failed(dest, e.error))?;
                return Ok(());
            }
            last_error = String::from_utf8_lossy(&output.stderr).trim().to_string();
        }

        Err(Self::render_failed(&source.path, format!("ffmpeg produced no frame: {}", last_error)))
    }
}

impl RenditionRenderer for ToolRenderer {
    fn thumbnail(&self, source: &SourceFile, dest: &Path) -> Result<(), RenditionError> {
        if source.media_type == MediaType::Video {
            return self.video_frame(source, dest);
        }

        let mut image = self.decode_photo(source)?;
        if let Some(orientation) = source
            .orientation
            .and_then(|o| u8::try_from(o).ok())
            .and_then(Orientation::from_exif)
        {
            image.apply_orientation(orientation);
        }

        let thumbnail = fit_within(&image, self.edge).map_err(|e| Self::render_failed(&source.path, e))?;
        write_jpeg(&thumbnail, dest)
    }

    fn raw_preview(&self, source: &SourceFile, dest: &Path) -> Result<bool, RenditionError> {
        let jpeg = extract_embedded_preview(&self.exiftool, &source.path)
            .map_err(|e| Self::render_failed(&source.path, e))?;

        match jpeg {
            Some(bytes) => {
                write_atomically(dest, &bytes)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

fn cache_dir_of(dest: &Path) -> Result<&Path, RenditionError> {
    dest.parent().ok_or_else(|| RenditionError::RenderFailed {
        path: dest.to_path_buf(),
        reason: "cache path has no directory".to_string(),
    })
}

/// Dimensions scaled to fit inside `edge`×`edge`, never upscaled
pub fn fit_dimensions(width: u32, height: u32, edge: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= edge || longest == 0 {
        return (width.max(1), height.max(1));
    }
    let scale = edge as f64 / longest as f64;
    let w = ((width as f64 * scale).round() as u32).max(1);
    let h = ((height as f64 * scale).round() as u32).max(1);
    (w, h)
}

/// Downscale to fit `edge` using SIMD resizing
pub fn fit_within(image: &DynamicImage, edge: u32) -> Result<DynamicImage, String> {
    let rgb = image.to_rgb8();
    let (src_width, src_height) = rgb.dimensions();
    if src_width == 0 || src_height == 0 {
        return Err("image has no pixels".to_string());
    }

    let (width, height) = fit_dimensions(src_width, src_height, edge);
    if (width, height) == (src_width, src_height) {
        return Ok(DynamicImage::ImageRgb8(rgb));
    }

    let src = Image::from_vec_u8(src_width, src_height, rgb.into_raw(), PixelType::U8x3)
        .map_err(|e| format!("Failed to create source image: {}", e))?;
    let mut dst = Image::new(width, height, PixelType::U8x3);

    let options = ResizeOptions::new().resize_alg(fast_image_resize::ResizeAlg::Convolution(
        fast_image_resize::FilterType::CatmullRom,
    ));
    Resizer::new()
        .resize(&src, &mut dst, &options)
        .map_err(|e| format!("Resize failed: {}", e))?;

    image::RgbImage::from_raw(width, height, dst.into_vec())
        .map(DynamicImage::ImageRgb8)
        .ok_or_else(|| "Failed to create result buffer".to_string())
}

/// Encode as JPEG into a temp file beside `dest`, then rename into place
fn write_jpeg(image: &DynamicImage, dest: &Path) -> Result<(), RenditionError> {
    let rgb = image.to_rgb8();
    let mut staged = NamedTempFile::new_in(cache_dir_of(dest)?).map_err(|e| RenditionError::Io {
        path: dest.to_path_buf(),
        source: e,
    })?;

    {
        let mut writer = BufWriter::new(staged.as_file_mut());
        JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY)
            .encode(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
            .map_err(|e| RenditionError::RenderFailed {
                path: dest.to_path_buf(),
                reason: e.to_string(),
            })?;
        writer.flush().map_err(|e| RenditionError::Io {
            path: dest.to_path_buf(),
            source: e,
        })?;
    }

    staged.persist(dest).map_err(|e| RenditionError::Io {
        path: dest.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}

fn write_atomically(dest: &Path, bytes: &[u8]) -> Result<(), RenditionError> {
    let io_error = |source| RenditionError::Io {
        path: dest.to_path_buf(),
        source,
    };
    let mut staged = NamedTempFile::new_in(cache_dir_of(dest)?).map_err(io_error)?;
    staged.write_all(bytes).map_err(io_error)?;
    staged.persist(dest).map_err(|e| io_error(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use tempfile::TempDir;

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        }))
    }

    #[test]
    fn fit_keeps_aspect_and_never_upscales() {
        assert_eq!(fit_dimensions(4000, 3000, 320), (320, 240));
        assert_eq!(fit_dimensions(3000, 4000, 320), (240, 320));
        assert_eq!(fit_dimensions(100, 50, 320), (100, 50));
        assert_eq!(fit_dimensions(10000, 1, 320), (320, 1));
    }

    #[test]
    fn photo_thumbnail_is_written_as_jpeg() {
        let temp_dir = TempDir::new().unwrap();
        let original = temp_dir.path().join("wide.png");
        gradient(640, 320).save(&original).unwrap();
        let dest = temp_dir.path().join("id_thumb_v2.jpg");

        let renderer = ToolRenderer::new("ffmpeg", "exiftool", 64);
        let source = SourceFile {
            path: original,
            media_type: MediaType::Photo,
            is_raw: false,
            orientation: None,
        };
        renderer.thumbnail(&source, &dest).unwrap();

        let (width, height) = image::image_dimensions(&dest).unwrap();
        assert_eq!((width, height), (64, 32));
    }

    #[test]
    fn orientation_rotates_thumbnail() {
        let temp_dir = TempDir::new().unwrap();
        let original = temp_dir.path().join("sideways.png");
        gradient(200, 100).save(&original).unwrap();
        let dest = temp_dir.path().join("id_thumb_v2.jpg");

        let renderer = ToolRenderer::new("ffmpeg", "exiftool", 100);
        let source = SourceFile {
            path: original,
            media_type: MediaType::Photo,
            is_raw: false,
            orientation: Some(6),
        };
        renderer.thumbnail(&source, &dest).unwrap();

        assert_eq!(image::image_dimensions(&dest).unwrap(), (50, 100));
    }

    #[test]
    fn undecodable_photo_fails_without_leaving_a_file() {
        let temp_dir = TempDir::new().unwrap();
        let original = temp_dir.path().join("broken.jpg");
        std::fs::write(&original, b"not an image").unwrap();
        let dest = temp_dir.path().join("id_thumb_v2.jpg");

        let renderer = ToolRenderer::new("ffmpeg", "exiftool", 64);
        let source = SourceFile {
            path: original,
            media_type: MediaType::Photo,
            is_raw: false,
            orientation: None,
        };

        assert!(matches!(
            renderer.thumbnail(&source, &dest),
            Err(RenditionError::RenderFailed { .. })
        ));
        assert!(!dest.exists());
    }

    #[test]
    fn raw_without_preview_reports_none() {
        let temp_dir = TempDir::new().unwrap();
        let original = temp_dir.path().join("IMG_0001.NEF");
        std::fs::write(&original, b"MM\0* sensor only").unwrap();
        let dest = temp_dir.path().join("id_preview_v1.jpg");

        let renderer = ToolRenderer::new("ffmpeg", "exiftool-not-installed", 64);
        let source = SourceFile {
            path: original,
            media_type: MediaType::Photo,
            is_raw: true,
            orientation: None,
        };

        assert!(!renderer.raw_preview(&source, &dest).unwrap());
        assert!(!dest.exists());
    }
}
