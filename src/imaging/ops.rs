//! The closed table of operations the engine understands.
//!
//! Each [`OperationKind`] has a stable name (the template filter name and
//! the `name` field of a serialized operation) and a parser that turns the
//! operation's positional JSON arguments into a typed [`Step`].
//!
//! | Name | Arguments | Effect |
//! |---|---|---|
//! | `resize` | `width?, height?, {fit}?` or `{width, height, fit}` | scale (fit: cover, contain, fill, inside, outside) |
//! | `rotate` | `degrees` (multiple of 90) | rotate clockwise |
//! | `flip` / `flop` | | mirror vertically / horizontally |
//! | `grayscale` | | drop color |
//! | `blur` | `sigma?` | gaussian blur (default sigma 1.0) |
//! | `sharpen` | `sigma?, threshold?` or `{sigma, threshold}` | unsharp mask |
//! | `extract` | `{left, top, width, height}` | crop a region |
//! | `negate` | | invert colors |
//! | `jpeg` `png` `webp` `avif` `tiff` | `{quality?, speed?}` | output format |
//!
//! The last five are the *format* operations: the last one in a chain
//! decides the artifact's extension.

use super::backend::EngineError;
use super::params::{Encoding, Fit, MAX_DIMENSION, MAX_PIXELS, OutputFormat, Quality, Step};
use serde_json::{Map, Value};

/// Every operation a descriptor may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Resize,
    Rotate,
    Flip,
    Flop,
    Grayscale,
    Blur,
    Sharpen,
    Extract,
    Negate,
    Jpeg,
    Png,
    Webp,
    Avif,
    Tiff,
}

impl OperationKind {
    pub const ALL: [OperationKind; 14] = [
        Self::Resize,
        Self::Rotate,
        Self::Flip,
        Self::Flop,
        Self::Grayscale,
        Self::Blur,
        Self::Sharpen,
        Self::Extract,
        Self::Negate,
        Self::Jpeg,
        Self::Png,
        Self::Webp,
        Self::Avif,
        Self::Tiff,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Resize => "resize",
            Self::Rotate => "rotate",
            Self::Flip => "flip",
            Self::Flop => "flop",
            Self::Grayscale => "grayscale",
            Self::Blur => "blur",
            Self::Sharpen => "sharpen",
            Self::Extract => "extract",
            Self::Negate => "negate",
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Avif => "avif",
            Self::Tiff => "tiff",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// The output format this operation converts to, if it is a format operation.
    pub fn output_format(self) -> Option<OutputFormat> {
        match self {
            Self::Jpeg => Some(OutputFormat::Jpeg),
            Self::Png => Some(OutputFormat::Png),
            Self::Webp => Some(OutputFormat::WebP),
            Self::Avif => Some(OutputFormat::Avif),
            Self::Tiff => Some(OutputFormat::Tiff),
            _ => None,
        }
    }

    /// Parse positional arguments into a typed step.
    pub fn parse_args(self, args: &[Value]) -> Result<Step, EngineError> {
        let args = Args { kind: self, args };
        match self {
            Self::Resize => args.resize(),
            Self::Rotate => {
                let degrees = args.require_i64(0, "degrees")?;
                if degrees % 90 != 0 {
                    return Err(args.invalid(format!(
                        "only multiples of 90 degrees are supported, got {degrees}"
                    )));
                }
                Ok(Step::Rotate {
                    degrees: degrees.rem_euclid(360) as u32,
                })
            }
            Self::Flip => args.none(Step::Flip),
            Self::Flop => args.none(Step::Flop),
            Self::Grayscale => args.none(Step::Grayscale),
            Self::Negate => args.none(Step::Negate),
            Self::Blur => Ok(Step::Blur {
                sigma: args.positive_f32(args.args.first(), "sigma")?.unwrap_or(1.0),
            }),
            Self::Sharpen => args.sharpen(),
            Self::Extract => args.extract(),
            Self::Jpeg | Self::Png | Self::Webp | Self::Avif | Self::Tiff => args.encode(),
        }
    }
}

/// Positional argument access with errors naming the operation.
struct Args<'a> {
    kind: OperationKind,
    args: &'a [Value],
}

impl Args<'_> {
    fn invalid(&self, reason: impl Into<String>) -> EngineError {
        EngineError::InvalidArgument {
            operation: self.kind.name(),
            reason: reason.into(),
        }
    }

    fn none(&self, step: Step) -> Result<Step, EngineError> {
        if self.args.iter().all(Value::is_null) {
            Ok(step)
        } else {
            Err(self.invalid("takes no arguments"))
        }
    }

    fn object_at(&self, index: usize) -> Result<Option<&Map<String, Value>>, EngineError> {
        match self.args.get(index) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Object(map)) => Ok(Some(map)),
            Some(other) => Err(self.invalid(format!(
                "argument {} must be an options object, got {other}",
                index + 1
            ))),
        }
    }

    fn require_i64(&self, index: usize, what: &str) -> Result<i64, EngineError> {
        self.args
            .get(index)
            .and_then(Value::as_i64)
            .ok_or_else(|| self.invalid(format!("{what} must be an integer")))
    }

    /// A non-negative integer dimension; `null`/absent is `None`.
    fn u32_value(&self, value: Option<&Value>, what: &str) -> Result<Option<u32>, EngineError> {
        match value {
            None | Some(Value::Null) => Ok(None),
            Some(v) => v
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .map(Some)
                .ok_or_else(|| self.invalid(format!("{what} must be a non-negative integer"))),
        }
    }

    fn dimension(&self, value: Option<&Value>, what: &str) -> Result<Option<u32>, EngineError> {
        match self.u32_value(value, what)? {
            Some(0) => Err(self.invalid(format!("{what} must be greater than zero"))),
            Some(n) if n > MAX_DIMENSION => Err(self.invalid(format!(
                "{what} {n} exceeds the maximum of {MAX_DIMENSION}"
            ))),
            other => Ok(other),
        }
    }

    fn positive_f32(&self, value: Option<&Value>, what: &str) -> Result<Option<f32>, EngineError> {
        match value {
            None | Some(Value::Null) => Ok(None),
            Some(v) => match v.as_f64() {
                Some(n) if n > 0.0 && n.is_finite() => Ok(Some(n as f32)),
                _ => Err(self.invalid(format!("{what} must be a positive number"))),
            },
        }
    }

    fn resize(&self) -> Result<Step, EngineError> {
        // resize({width, height, fit}) or resize(width, height, {fit})
        let (width, height, options) = match self.args.first() {
            Some(Value::Object(map)) => (map.get("width"), map.get("height"), Some(map)),
            _ => (self.args.first(), self.args.get(1), self.object_at(2)?),
        };
        let width = self.dimension(width, "width")?;
        let height = self.dimension(height, "height")?;
        if width.is_none() && height.is_none() {
            return Err(self.invalid("needs a width or a height"));
        }
        // Every two-sided fit allocates at least the full box
        if let (Some(w), Some(h)) = (width, height) {
            if u64::from(w) * u64::from(h) > MAX_PIXELS {
                return Err(self.invalid(format!(
                    "{w}x{h} exceeds the maximum of {MAX_PIXELS} pixels"
                )));
            }
        }
        let fit = match options.and_then(|o| o.get("fit")) {
            None | Some(Value::Null) => Fit::default(),
            Some(Value::String(name)) => Fit::from_name(name)
                .ok_or_else(|| self.invalid(format!("unknown fit '{name}'")))?,
            Some(other) => return Err(self.invalid(format!("fit must be a string, got {other}"))),
        };
        Ok(Step::Resize { width, height, fit })
    }

    fn sharpen(&self) -> Result<Step, EngineError> {
        let (sigma, threshold) = match self.args.first() {
            Some(Value::Object(map)) => (map.get("sigma"), map.get("threshold")),
            first => (first, self.args.get(1)),
        };
        let sigma = self.positive_f32(sigma, "sigma")?.unwrap_or(1.0);
        let threshold = match threshold {
            None | Some(Value::Null) => 0,
            Some(v) => v
                .as_i64()
                .and_then(|n| i32::try_from(n).ok())
                .ok_or_else(|| self.invalid("threshold must be an integer"))?,
        };
        Ok(Step::Sharpen { sigma, threshold })
    }

    fn extract(&self) -> Result<Step, EngineError> {
        let region = self
            .object_at(0)?
            .ok_or_else(|| self.invalid("needs a {left, top, width, height} region"))?;
        let field = |key: &str| -> Result<u32, EngineError> {
            self.u32_value(region.get(key), key)?
                .ok_or_else(|| self.invalid(format!("region is missing '{key}'")))
        };
        let (left, top) = (field("left")?, field("top")?);
        let width = self
            .dimension(region.get("width"), "width")?
            .ok_or_else(|| self.invalid("region is missing 'width'"))?;
        let height = self
            .dimension(region.get("height"), "height")?
            .ok_or_else(|| self.invalid("region is missing 'height'"))?;
        Ok(Step::Extract {
            left,
            top,
            width,
            height,
        })
    }

    fn encode(&self) -> Result<Step, EngineError> {
        let Some(format) = self.kind.output_format() else {
            return Err(self.invalid("not a format operation"));
        };
        let mut encoding = Encoding::new(format);
        if let Some(options) = self.object_at(0)? {
            if let Some(quality) = self.u32_value(options.get("quality"), "quality")? {
                if !(1..=100).contains(&quality) {
                    return Err(self.invalid("quality must be between 1 and 100"));
                }
                encoding.quality = Quality::new(quality);
            }
            if let Some(speed) = self.u32_value(options.get("speed"), "speed")? {
                if !(1..=10).contains(&speed) {
                    return Err(self.invalid("speed must be between 1 and 10"));
                }
                encoding.speed = speed as u8;
            }
        }
        Ok(Step::Encode(encoding))
    }
}
