//! Pure Rust image engine, statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP) | `image` crate (pure Rust decoders, format sniffed from content) |
//! | Resize | `resize_exact` / `resize_to_fill` with `Lanczos3` |
//! | Contain padding | `image::imageops::overlay` onto a transparent canvas |
//! | Rotate / flip / flop | `rotate90`, `rotate180`, `rotate270`, `flipv`, `fliph` |
//! | Blur / sharpen | `DynamicImage::blur`, `DynamicImage::unsharpen` |
//! | Extract | `DynamicImage::crop_imm` |
//! | Encode → AVIF | `image::codecs::avif::AvifEncoder` (rav1e) |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` |
//! | Encode → WebP | `image::codecs::webp::WebPEncoder` (lossless) |
//! | Encode → PNG, TIFF | `DynamicImage::write_to` |
//!
//! AVIF is output-only: the `image` crate's `"avif"` feature only enables
//! the rav1e encoder.

use super::backend::{EngineError, ImageEngine};
use super::calculations::{ResizePlan, center_offset, plan_resize, within_limits};
use super::params::{Encoding, OutputFormat, RenderParams, Step};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader, RgbaImage};
use std::io::BufWriter;
use std::path::Path;

/// Engine backed by the `image` crate.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustEngine;

impl RustEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Load and decode an image from disk.
fn load_image(path: &Path) -> Result<DynamicImage, EngineError> {
    ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
        .map_err(|e| {
            EngineError::ProcessingFailed(format!("Failed to decode {}: {}", path.display(), e))
        })
}

fn apply_step(img: DynamicImage, step: &Step) -> Result<DynamicImage, EngineError> {
    let img = match *step {
        Step::Resize { width, height, fit } => {
            let plan = plan_resize((img.width(), img.height()), width, height, fit).ok_or_else(
                || EngineError::InvalidArgument {
                    operation: "resize",
                    reason: "nothing to resize".into(),
                },
            )?;
            let (width, height) = plan.peak_size((img.width(), img.height()));
            if !within_limits((width, height)) {
                return Err(EngineError::InvalidArgument {
                    operation: "resize",
                    reason: format!("result would be {width}x{height}, which is too large"),
                });
            }
            resize(&img, plan)
        }
        Step::Rotate { degrees } => match degrees {
            0 => img,
            90 => img.rotate90(),
            180 => img.rotate180(),
            270 => img.rotate270(),
            other => {
                return Err(EngineError::InvalidArgument {
                    operation: "rotate",
                    reason: format!("unsupported angle {other}"),
                });
            }
        },
        Step::Flip => img.flipv(),
        Step::Flop => img.fliph(),
        Step::Grayscale => img.grayscale(),
        Step::Blur { sigma } => img.blur(sigma),
        Step::Sharpen { sigma, threshold } => img.unsharpen(sigma, threshold),
        Step::Extract {
            left,
            top,
            width,
            height,
        } => {
            let fits = left.checked_add(width).is_some_and(|r| r <= img.width())
                && top.checked_add(height).is_some_and(|b| b <= img.height());
            if !fits {
                return Err(EngineError::InvalidArgument {
                    operation: "extract",
                    reason: format!(
                        "region {width}x{height}+{left}+{top} is outside the {}x{} image",
                        img.width(),
                        img.height()
                    ),
                });
            }
            img.crop_imm(left, top, width, height)
        }
        Step::Negate => {
            let mut img = img;
            img.invert();
            img
        }
        Step::Encode(_) => img,
    };
    Ok(img)
}

fn resize(img: &DynamicImage, plan: ResizePlan) -> DynamicImage {
    match plan {
        ResizePlan::Exact { width, height } => img.resize_exact(width, height, FilterType::Lanczos3),
        ResizePlan::Crop { width, height } => img.resize_to_fill(width, height, FilterType::Lanczos3),
        ResizePlan::Pad { inner, canvas } => {
            let scaled = img
                .resize_exact(inner.0, inner.1, FilterType::Lanczos3)
                .to_rgba8();
            let mut background = RgbaImage::new(canvas.0, canvas.1);
            let (x, y) = center_offset(canvas, inner);
            image::imageops::overlay(&mut background, &scaled, x as i64, y as i64);
            DynamicImage::ImageRgba8(background)
        }
    }
}

/// Collapse to 8-bit RGB(A), the layouts every encoder here accepts.
fn to_rgb8_family(img: DynamicImage) -> DynamicImage {
    if img.color().has_alpha() {
        DynamicImage::ImageRgba8(img.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(img.to_rgb8())
    }
}

/// Encode and write `img` to `path`.
fn save_image(img: DynamicImage, path: &Path, encoding: Encoding) -> Result<(), EngineError> {
    let file = std::fs::File::create(path)?;
    let mut writer = BufWriter::new(file);
    let quality = encoding.quality.value() as u8;

    let result = match encoding.format {
        OutputFormat::Jpeg => {
            // JPEG has no alpha channel
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(writer, quality);
            rgb.write_with_encoder(encoder)
        }
        OutputFormat::WebP => {
            let encoder = image::codecs::webp::WebPEncoder::new_lossless(writer);
            to_rgb8_family(img).write_with_encoder(encoder)
        }
        OutputFormat::Avif => {
            let encoder = image::codecs::avif::AvifEncoder::new_with_speed_quality(
                writer,
                encoding.speed,
                quality,
            );
            to_rgb8_family(img).write_with_encoder(encoder)
        }
        OutputFormat::Png => img.write_to(&mut writer, ImageFormat::Png),
        OutputFormat::Tiff => img.write_to(&mut writer, ImageFormat::Tiff),
    };

    result.map_err(|e| {
        EngineError::ProcessingFailed(format!(
            "{:?} encode failed for {}: {}",
            encoding.format,
            path.display(),
            e
        ))
    })
}

impl ImageEngine for RustEngine {
    fn render(&self, params: &RenderParams) -> Result<(), EngineError> {
        let mut img = load_image(&params.source)?;
        for step in &params.steps {
            img = apply_step(img, step)?;
        }
        save_image(img, &params.output, params.encoding)
    }
}
