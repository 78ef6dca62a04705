//! Output path resolution and encoding.

use crate::{Error, Result};
use image::{DynamicImage, ImageFormat};
use std::path::{Path, PathBuf};

/// File format written by [`save`](crate::save)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Raster(ImageFormat),
    Pdf,
}

const DEFAULT_EXTENSION: &str = "png";

/// Resolve the final output path and its format.
///
/// A path without an extension gets `.png` appended. The format follows the
/// extension, case-insensitively.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use tablesnap::export::{resolve_output, OutputFormat};
///
/// let (path, format) = resolve_output(Path::new("report")).unwrap();
/// assert_eq!(path, Path::new("report.png"));
/// assert_eq!(format, OutputFormat::Raster(image::ImageFormat::Png));
/// ```
pub fn resolve_output(file: &Path) -> Result<(PathBuf, OutputFormat)> {
    let mut path = file.to_path_buf();
    if path.extension().is_none() {
        let mut name = path.into_os_string();
        name.push(".");
        name.push(DEFAULT_EXTENSION);
        path = PathBuf::from(name);
    }
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| Error::UnsupportedFormat(path.display().to_string()))?;
    let format = format_for_extension(&ext)?;
    Ok((path, format))
}

fn format_for_extension(ext: &str) -> Result<OutputFormat> {
    if ext == "pdf" {
        return Ok(OutputFormat::Pdf);
    }
    match ImageFormat::from_extension(ext) {
        // Encoders compiled into this crate
        Some(
            f @ (ImageFormat::Png
            | ImageFormat::Jpeg
            | ImageFormat::Bmp
            | ImageFormat::Gif
            | ImageFormat::Tiff
            | ImageFormat::WebP),
        ) => Ok(OutputFormat::Raster(f)),
        _ => Err(Error::UnsupportedFormat(ext.to_string())),
    }
}

impl OutputFormat {
    /// Fail early when the format needs a cargo feature that is not enabled
    pub fn ensure_available(self) -> Result<()> {
        match self {
            OutputFormat::Pdf if !cfg!(feature = "pdf") => Err(Error::missing(
                "PDF output",
                "rebuild tablesnap with the `pdf` feature enabled",
            )),
            _ => Ok(()),
        }
    }

    pub fn write(self, image: &DynamicImage, path: &Path) -> Result<()> {
        match self {
            // JPEG has no alpha channel
            OutputFormat::Raster(ImageFormat::Jpeg) => {
                DynamicImage::ImageRgb8(image.to_rgb8()).save_with_format(path, ImageFormat::Jpeg)?;
                Ok(())
            }
            OutputFormat::Raster(format) => {
                image.save_with_format(path, format)?;
                Ok(())
            }
            OutputFormat::Pdf => write_pdf(image, path),
        }
    }
}

#[cfg(feature = "pdf")]
fn write_pdf(image: &DynamicImage, path: &Path) -> Result<()> {
    super::pdf::write_pdf(image, path)
}

#[cfg(not(feature = "pdf"))]
fn write_pdf(_image: &DynamicImage, _path: &Path) -> Result<()> {
    OutputFormat::Pdf.ensure_available()
}
