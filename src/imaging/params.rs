//! Parameter types for image operations.
//!
//! These types describe *what* to do, not *how* to do it. They sit between
//! the operation table in [`ops`](super::ops) (which turns named operations
//! with loose JSON arguments into typed steps) and the
//! [`backend`](super::backend) (which does the pixel work). Keeping them
//! separate lets tests swap in a mock engine without touching argument
//! parsing.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100, default 90). Clamped on construction.
//! - [`Fit`]: How `resize` reconciles a width + height box with the source aspect ratio.
//! - [`OutputFormat`]: The closed set of formats the engine can write.
//! - [`Encoding`]: Output format plus its encoder knobs.
//! - [`Step`]: One typed pixel operation.
//! - [`RenderParams`]: Full specification for a render: source, output, steps, encoding.

use std::path::PathBuf;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

/// Resize fit mode when both width and height are given.
///
/// - `Cover`: fill the box exactly, center-cropping the overflow (default)
/// - `Contain`: fit inside the box, padding the rest with transparency
/// - `Fill`: stretch to the box, ignoring aspect ratio
/// - `Inside`: fit inside the box, output may be smaller than the box
/// - `Outside`: cover the box, output may be larger than the box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fit {
    #[default]
    Cover,
    Contain,
    Fill,
    Inside,
    Outside,
}

impl Fit {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "cover" => Some(Self::Cover),
            "contain" => Some(Self::Contain),
            "fill" => Some(Self::Fill),
            "inside" => Some(Self::Inside),
            "outside" => Some(Self::Outside),
            _ => None,
        }
    }
}

/// Formats the engine can encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
    Avif,
    Tiff,
}

impl OutputFormat {
    /// Map a file extension (case-insensitive, no dot) to a format.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::WebP),
            "avif" => Some(Self::Avif),
            "tif" | "tiff" => Some(Self::Tiff),
            _ => None,
        }
    }
}

/// Output format and encoder settings.
///
/// `quality` only affects JPEG and AVIF; `speed` only affects AVIF (rav1e,
/// 1 = slowest/best, 10 = fastest).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Encoding {
    pub format: OutputFormat,
    pub quality: Quality,
    pub speed: u8,
}

/// Default AVIF encoder speed (rav1e: 1 slowest, 10 fastest).
pub const DEFAULT_AVIF_SPEED: u8 = 6;

/// Largest width or height a step may ask for or produce.
pub const MAX_DIMENSION: u32 = 16_384;

/// Largest pixel count of any image a step allocates.
pub const MAX_PIXELS: u64 = 100_000_000;

impl Encoding {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            quality: Quality::default(),
            speed: DEFAULT_AVIF_SPEED,
        }
    }
}

/// One typed pixel operation, applied in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Resize {
        width: Option<u32>,
        height: Option<u32>,
        fit: Fit,
    },
    /// Clockwise, normalized to 0, 90, 180 or 270.
    Rotate {
        degrees: u32,
    },
    /// Mirror top-to-bottom.
    Flip,
    /// Mirror left-to-right.
    Flop,
    Grayscale,
    Blur {
        sigma: f32,
    },
    Sharpen {
        sigma: f32,
        threshold: i32,
    },
    Extract {
        left: u32,
        top: u32,
        width: u32,
        height: u32,
    },
    Negate,
    /// Output encoding; the last one in a chain wins.
    Encode(Encoding),
}

/// Everything the engine needs for one artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub steps: Vec<Step>,
    pub encoding: Encoding,
}
