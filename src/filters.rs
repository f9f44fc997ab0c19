//! Template filter surface.
//!
//! A template engine registers one filter per entry of the table: the root
//! filter `image` turns a path into a [`Descriptor`], and every operation
//! name appends that operation. Filters chain left to right:
//!
//! ```text
//! {{ "/photos/dawn.jpg" | image | resize(800) | grayscale | avif | get_url }}
//! ```
//!
//! Filter names are checked against the closed operation table when the
//! filter is applied; argument values are only checked when the image is
//! built. `get_url` is the shortcode that ends a chain and emits the
//! placeholder (see [`crate::placeholder`]).
//!
//! Placeholder text contains markup characters and must be inserted
//! unescaped, e.g. `(PreEscaped(url))` in maud.

use crate::descriptor::{Descriptor, ImageInput};
use crate::imaging::{ImageEngine, OperationKind, RustEngine};
use crate::process::{ProcessError, Processor};
use serde_json::Value;
use thiserror::Error;

/// Name of the filter that starts a chain from a path.
pub const ROOT_FILTER: &str = "image";

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("unknown image filter '{0}'")]
    UnknownFilter(String),
}

/// One registered filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    /// `image`: normalize the input, add nothing.
    Root,
    Operation(OperationKind),
}

impl Filter {
    pub fn name(self) -> &'static str {
        match self {
            Filter::Root => ROOT_FILTER,
            Filter::Operation(kind) => kind.name(),
        }
    }

    pub fn from_name(name: &str) -> Result<Self, FilterError> {
        if name == ROOT_FILTER {
            return Ok(Filter::Root);
        }
        OperationKind::from_name(name)
            .map(Filter::Operation)
            .ok_or_else(|| FilterError::UnknownFilter(name.to_string()))
    }
}

/// Every filter a template engine should register, root filter first.
pub fn filter_names() -> impl Iterator<Item = &'static str> {
    std::iter::once(ROOT_FILTER).chain(OperationKind::ALL.into_iter().map(OperationKind::name))
}

/// Filters and the `get_url` shortcode bound to one processor.
pub struct FilterTable<'p, E: ImageEngine = RustEngine> {
    processor: &'p Processor<E>,
}

impl<'p, E: ImageEngine> FilterTable<'p, E> {
    pub fn new(processor: &'p Processor<E>) -> Self {
        Self { processor }
    }

    /// The root filter.
    pub fn image(&self, input: impl Into<ImageInput>) -> Descriptor {
        input.into().into_descriptor()
    }

    /// Apply the filter called `name`, returning a new descriptor.
    ///
    /// The root filter ignores `args`.
    pub fn apply(
        &self,
        name: &str,
        input: impl Into<ImageInput>,
        args: Vec<Value>,
    ) -> Result<Descriptor, FilterError> {
        let descriptor = self.image(input);
        Ok(match Filter::from_name(name)? {
            Filter::Root => descriptor,
            Filter::Operation(kind) => descriptor.apply(kind, args),
        })
    }

    /// The `get_url` shortcode: placeholder text for `input`.
    pub fn get_url(&self, input: impl Into<ImageInput>) -> Result<String, ProcessError> {
        self.processor.emit_placeholder(input)
    }
}
