//! # Deferred Images
//!
//! Image transformations for static site generators, deferred until after
//! HTML is rendered.
//!
//! Templates describe *what* an image should become; nothing is decoded or
//! encoded while pages render. Once a page is fully rendered, every image it
//! references is built once, written under a content-hashed filename, and
//! the page is rewritten to point at the result.
//!
//! # Architecture: Two Phases
//!
//! ```text
//! render time   filters → Descriptor → get_url → <!--SHARP_IMAGE {json}-->/img/a-<fp>.avif
//! post-render   page → scan → dedupe by fingerprint → build (parallel) → substitute URLs
//! ```
//!
//! - **Render time** is pure: a [`descriptor::Descriptor`] is an input path
//!   plus ordered operations, serialized into a placeholder together with the
//!   URL the build *will* produce.
//! - **Post-render** does all the work in [`process::Processor::build_all`].
//!   Equal descriptors share one [`fingerprint::Fingerprint`], so an image
//!   used on fifty pages is encoded once.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`descriptor`] | `Descriptor` / `Operation` data model and canonical JSON |
//! | [`filters`] | Template filter table and the `get_url` shortcode |
//! | [`fingerprint`] | SHA-256 of a descriptor's canonical JSON |
//! | [`placeholder`] | Placeholder wire format: emit, scan, substitute |
//! | [`process`] | The `Processor`: placeholder emission, deduplicated parallel builds, post-render hook |
//! | [`cache`] | In-memory fingerprint → URL cache and run statistics |
//! | [`site`] | Post-render pass over a rendered site directory |
//! | [`config`] | `deferred-images.toml` loading, validation, merging |
//! | [`imaging`] | Operation table and pure-Rust rendering on the `image` crate |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Content-Addressed Artifacts
//!
//! Artifact names are `<stem>-<fingerprint>.<ext>`. Because the name is a
//! function of the descriptor alone, a file that already exists is a valid
//! cache hit from an earlier run, and authoring tools can predict final URLs
//! without building anything.
//!
//! ## Pure-Rust Imaging
//!
//! The [`imaging`] module decodes and encodes with the `image` crate (AVIF
//! through `rav1e`). No system libraries, no subprocesses.
//!
//! ## Fail Loudly
//!
//! A placeholder that can't be parsed, or whose URL no longer matches its
//! descriptor, is an error rather than something to skip. Shipping a page
//! that still contains a marker would be a broken image reference.

pub mod cache;
pub mod config;
pub mod descriptor;
pub mod filters;
pub mod fingerprint;
pub mod imaging;
pub mod output;
pub mod placeholder;
pub mod process;
pub mod site;

#[cfg(test)]
pub(crate) mod test_helpers;
