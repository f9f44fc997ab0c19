//! Image descriptors: an input path plus an ordered list of operations.
//!
//! A [`Descriptor`] is what the template filters build up. Every filter
//! application returns a *new* descriptor with one more [`Operation`]
//! appended; nothing is validated beyond the operation name, and arguments
//! stay opaque JSON until the engine parses them at build time.
//!
//! ## Canonical form
//!
//! Descriptors serialize to compact JSON with camelCase keys:
//!
//! ```text
//! {"inputPath":"photo.jpg","operations":[{"name":"resize","args":[{"height":50,"width":50}]},{"name":"avif","args":[]}]}
//! ```
//!
//! Object keys inside arguments come out sorted (serde_json's default map),
//! so two descriptors with the same path, operations and argument values
//! always produce the same text. That text is what gets fingerprinted, and
//! it is what a descriptor renders to when interpolated into a template.

use crate::imaging::OperationKind;
use maud::{Markup, Render, html};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DescriptorError {
    #[error("failed to serialize descriptor for {input_path}: {source}")]
    Serialize {
        input_path: String,
        source: serde_json::Error,
    },
}

/// One named operation with positional arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub name: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

impl Operation {
    pub fn new(kind: OperationKind, args: Vec<Value>) -> Self {
        Self {
            name: kind.name().to_string(),
            args,
        }
    }

    /// The table entry for this operation, if the name is known.
    pub fn kind(&self) -> Option<OperationKind> {
        OperationKind::from_name(&self.name)
    }
}

/// Input path plus the operations to apply to it, left to right.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    pub input_path: String,
    #[serde(default)]
    pub operations: Vec<Operation>,
}

impl Descriptor {
    /// A descriptor with no operations.
    pub fn new(input_path: impl Into<String>) -> Self {
        Self {
            input_path: input_path.into(),
            operations: Vec::new(),
        }
    }

    /// A new descriptor with `operation` appended; `self` is left untouched.
    pub fn with(&self, operation: Operation) -> Descriptor {
        let mut next = self.clone();
        next.operations.push(operation);
        next
    }

    /// Chain helper: append `kind` with `args`.
    pub fn apply(mut self, kind: OperationKind, args: Vec<Value>) -> Self {
        self.operations.push(Operation::new(kind, args));
        self
    }

    /// `resize({width, height})`, omitting whichever side is `None`.
    pub fn resize(self, width: Option<u32>, height: Option<u32>) -> Self {
        let mut options = Map::new();
        if let Some(w) = width {
            options.insert("width".into(), json!(w));
        }
        if let Some(h) = height {
            options.insert("height".into(), json!(h));
        }
        self.apply(OperationKind::Resize, vec![Value::Object(options)])
    }

    pub fn rotate(self, degrees: i32) -> Self {
        self.apply(OperationKind::Rotate, vec![json!(degrees)])
    }

    pub fn flip(self) -> Self {
        self.apply(OperationKind::Flip, Vec::new())
    }

    pub fn flop(self) -> Self {
        self.apply(OperationKind::Flop, Vec::new())
    }

    pub fn grayscale(self) -> Self {
        self.apply(OperationKind::Grayscale, Vec::new())
    }

    pub fn negate(self) -> Self {
        self.apply(OperationKind::Negate, Vec::new())
    }

    pub fn blur(self, sigma: Option<f64>) -> Self {
        self.apply(OperationKind::Blur, sigma.map(|s| json!(s)).into_iter().collect())
    }

    pub fn sharpen(self, sigma: f64, threshold: i32) -> Self {
        self.apply(
            OperationKind::Sharpen,
            vec![json!({ "sigma": sigma, "threshold": threshold })],
        )
    }

    /// Crop the `width` x `height` region whose top-left corner is at (`left`, `top`).
    pub fn extract(self, left: u32, top: u32, width: u32, height: u32) -> Self {
        self.apply(
            OperationKind::Extract,
            vec![json!({ "left": left, "top": top, "width": width, "height": height })],
        )
    }

    pub fn avif(self) -> Self {
        self.apply(OperationKind::Avif, Vec::new())
    }

    pub fn webp(self) -> Self {
        self.apply(OperationKind::Webp, Vec::new())
    }

    pub fn jpeg(self, quality: Option<u32>) -> Self {
        let args = match quality {
            Some(q) => vec![json!({ "quality": q })],
            None => Vec::new(),
        };
        self.apply(OperationKind::Jpeg, args)
    }

    pub fn png(self) -> Self {
        self.apply(OperationKind::Png, Vec::new())
    }

    pub fn tiff(self) -> Self {
        self.apply(OperationKind::Tiff, Vec::new())
    }

    /// The last format operation in the chain, if any.
    pub fn output_kind(&self) -> Option<OperationKind> {
        self.operations
            .iter()
            .rev()
            .filter_map(Operation::kind)
            .find(|kind| kind.output_format().is_some())
    }

    /// Canonical JSON text.
    pub fn to_json(&self) -> Result<String, DescriptorError> {
        serde_json::to_string(self).map_err(|source| DescriptorError::Serialize {
            input_path: self.input_path.clone(),
            source,
        })
    }

    /// Resolve root-relative paths against `input_root`.
    ///
    /// Call once, when the descriptor is finalized for a placeholder.
    pub fn resolved(mut self, input_root: &str) -> Self {
        self.input_path = resolve_input_path(&self.input_path, input_root);
        self
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = self.to_json().map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

impl Render for Descriptor {
    fn render(&self) -> Markup {
        html! { (self.to_string()) }
    }
}

/// Either a bare path or a descriptor built by earlier filters.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageInput {
    Path(String),
    Descriptor(Descriptor),
}

impl ImageInput {
    pub fn into_descriptor(self) -> Descriptor {
        match self {
            ImageInput::Path(path) => Descriptor::new(path),
            ImageInput::Descriptor(descriptor) => descriptor,
        }
    }
}

impl From<&str> for ImageInput {
    fn from(path: &str) -> Self {
        ImageInput::Path(path.to_string())
    }
}

impl From<String> for ImageInput {
    fn from(path: String) -> Self {
        ImageInput::Path(path)
    }
}

impl From<Descriptor> for ImageInput {
    fn from(descriptor: Descriptor) -> Self {
        ImageInput::Descriptor(descriptor)
    }
}

impl From<&Descriptor> for ImageInput {
    fn from(descriptor: &Descriptor) -> Self {
        ImageInput::Descriptor(descriptor.clone())
    }
}

/// Join a root-relative path (`/assets/a.jpg`) onto `input_root`.
///
/// Relative paths, protocol-relative (`//cdn/...`) and URL forms
/// (`https://...`, `data:...`) pass through unchanged.
pub fn resolve_input_path(path: &str, input_root: &str) -> String {
    if !path.starts_with('/') || path.starts_with("//") {
        return path.to_string();
    }
    let root = input_root.trim_end_matches('/');
    if root.is_empty() {
        return path.to_string();
    }
    format!("{}/{}", root, path.trim_start_matches('/'))
}
