//! Deferred image processing.
//!
//! The [`Processor`] owns the configuration, the image engine and the build
//! cache for one build process. It has two phases:
//!
//! ## Render time
//!
//! [`Processor::emit_placeholder`] finalizes a descriptor (resolving
//! root-relative paths exactly once), fingerprints it, and returns a
//! placeholder carrying the descriptor plus the *candidate* URL. No file is
//! read or written, so authoring tools can predict URLs before any build.
//!
//! ## Post-render
//!
//! [`Processor::build_all`] takes a fully rendered page:
//!
//! ```text
//! scan placeholders → fingerprint + dedupe → build missing (in parallel) → substitute
//! ```
//!
//! Each unique fingerprint not already in memory becomes one build task on
//! the rayon pool. A task first checks the output path (an existing file is
//! a hit from an earlier process), otherwise renders through the engine into
//! a uniquely named `.partial` file and renames it into place, so a failed
//! encode never leaves a file that a later run would mistake for a finished
//! artifact. Several processes (or processors) may build the same fingerprint
//! at once; each writes its own temp file and the last rename wins with
//! identical bytes.
//!
//! The call returns only after every task has settled. Successful builds are
//! cached even when a sibling fails; the first failure is returned and the
//! page is not substituted.
//!
//! ## Output Structure
//!
//! ```text
//! <output_dir>/
//! ├── photo-3f1c…e9.avif       # <stem>-<fingerprint>.<ext>
//! ├── photo-a07d…41.webp
//! └── logo-77b2…0c.png
//! ```

use crate::cache::{BuildCache, CacheStats};
use crate::config::PluginConfig;
use crate::descriptor::{Descriptor, DescriptorError, ImageInput};
use crate::fingerprint::Fingerprint;
use crate::imaging::{EngineError, ImageEngine, RustEngine, render_operations};
use crate::placeholder::{self, PlaceholderError};
use rayon::prelude::*;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
    #[error(transparent)]
    Placeholder(#[from] PlaceholderError),
    #[error("failed to build {descriptor}: {source}")]
    Build {
        /// Serialized descriptor of the failed build.
        descriptor: String,
        source: EngineError,
    },
    #[error("IO error on {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
}

/// Progress events, sent to an optional channel for display.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildEvent {
    /// The engine rendered a new artifact.
    Built {
        input_path: String,
        operations: Vec<String>,
        url: String,
    },
    /// The artifact was already in the output directory.
    DiskHit { input_path: String, url: String },
    Failed { descriptor: String, error: String },
    /// A page had its placeholders substituted and was rewritten.
    PageProcessed { page: String, placeholders: usize },
}

/// How a build task was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BuildStatus {
    Built,
    OnDisk,
}

/// Where one fingerprint's artifact lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTarget {
    pub fingerprint: Fingerprint,
    /// Artifact extension, lowercase, without the dot.
    pub extension: Option<String>,
    pub file_name: String,
    pub output_path: PathBuf,
    pub url: String,
}

static PARTIAL_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Split an input path into a filename-safe stem and a lowercase extension.
///
/// Query strings and fragments are dropped from URL inputs only; in a local
/// path `?` and `#` are ordinary filename characters. Characters that would
/// end the placeholder URL capture (whitespace, quotes, angle brackets) or
/// change the meaning of the artifact URL (`?`, `#`, `%`) become `-`.
fn split_input_name(input_path: &str) -> (String, Option<String>) {
    let is_url = input_path.contains("://") || input_path.starts_with("//");
    let path = if is_url {
        input_path.split(['?', '#']).next().unwrap_or(input_path)
    } else {
        input_path
    };
    let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    let (stem, extension) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => {
            (stem, Some(ext.to_ascii_lowercase()))
        }
        _ => (name, None),
    };
    let stem: String = stem
        .chars()
        .map(|c| {
            if c.is_whitespace() || matches!(c, '"' | '\'' | '<' | '>' | '?' | '#' | '%') {
                '-'
            } else {
                c
            }
        })
        .collect();
    if stem.is_empty() {
        ("image".to_string(), extension)
    } else {
        (stem, extension)
    }
}

/// Temporary path an artifact is rendered to before being renamed into place.
///
/// Unique per process and per call, so concurrent builds of one artifact
/// never share a temp file.
fn partial_path(output_path: &Path) -> PathBuf {
    let name = output_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let pid = std::process::id();
    let counter = PARTIAL_COUNTER.fetch_add(1, Ordering::Relaxed);
    output_path.with_file_name(format!(".{name}.{pid}.{counter}.partial"))
}

/// Remove a leftover temp file. One that is already gone is fine.
fn remove_partial(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Deferred processor: placeholder emission, builds, cache.
pub struct Processor<E: ImageEngine = RustEngine> {
    config: PluginConfig,
    engine: E,
    cache: BuildCache,
    stats: Mutex<CacheStats>,
    events: Option<Sender<BuildEvent>>,
}

impl Processor<RustEngine> {
    pub fn new(config: PluginConfig) -> Self {
        Self::with_engine(config, RustEngine::new())
    }
}

impl<E: ImageEngine> Processor<E> {
    /// Use a specific engine (allows testing with a mock).
    pub fn with_engine(config: PluginConfig, engine: E) -> Self {
        Self {
            config,
            engine,
            cache: BuildCache::new(),
            stats: Mutex::new(CacheStats::default()),
            events: None,
        }
    }

    /// Send [`BuildEvent`]s to `events` as builds settle.
    pub fn with_events(mut self, events: Sender<BuildEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn cache(&self) -> &BuildCache {
        &self.cache
    }

    pub fn stats(&self) -> CacheStats {
        *self.lock_stats()
    }

    fn lock_stats(&self) -> MutexGuard<'_, CacheStats> {
        self.stats.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn emit(&self, event: BuildEvent) {
        if let Some(tx) = &self.events {
            // A closed receiver only means nobody is listening
            let _ = tx.send(event);
        }
    }

    /// Normalize `input` and resolve its path against the input root.
    pub fn finalize(&self, input: impl Into<ImageInput>) -> Descriptor {
        input
            .into()
            .into_descriptor()
            .resolved(&self.config.input_root)
    }

    /// Output location for an already-finalized descriptor.
    ///
    /// The extension comes from the last format operation; without one the
    /// input's own extension is kept.
    pub fn target(&self, descriptor: &Descriptor) -> Result<BuildTarget, ProcessError> {
        let fingerprint = Fingerprint::of(descriptor)?;
        let (stem, input_extension) = split_input_name(&descriptor.input_path);
        let extension = descriptor
            .output_kind()
            .map(|kind| kind.name().to_string())
            .or(input_extension);
        let file_name = match &extension {
            Some(ext) => format!("{stem}-{fingerprint}.{ext}"),
            None => format!("{stem}-{fingerprint}"),
        };
        Ok(BuildTarget {
            output_path: self.config.output_dir.join(&file_name),
            url: self.config.public_url(&file_name),
            fingerprint,
            extension,
            file_name,
        })
    }

    /// Placeholder text for `input` (the `get_url` shortcode).
    ///
    /// Pure: touches neither the filesystem nor the engine.
    pub fn emit_placeholder(&self, input: impl Into<ImageInput>) -> Result<String, ProcessError> {
        let descriptor = self.finalize(input);
        let json = descriptor.to_json()?;
        let target = self.target(&descriptor)?;
        Ok(placeholder::format_placeholder(&json, &target.url))
    }

    /// Build every image referenced by placeholders in `content` and return
    /// the content with each placeholder replaced by its final URL.
    pub fn build_all(&self, content: &str) -> Result<String, ProcessError> {
        let mut placeholders = placeholder::scan(content)?;
        if placeholders.is_empty() {
            return Ok(content.to_string());
        }

        let mut targets = Vec::with_capacity(placeholders.len());
        for found in &mut placeholders {
            let target = self.target(&found.descriptor)?;
            found.match_url(&target.url)?;
            targets.push(target);
        }

        let mut pending = Vec::new();
        let mut seen = HashSet::new();
        for (found, target) in placeholders.iter().zip(&targets) {
            if seen.insert(&target.fingerprint) {
                if self.cache.contains(&target.fingerprint) {
                    self.lock_stats().hit();
                } else {
                    pending.push((&found.descriptor, target));
                }
            }
        }

        let failures: Vec<ProcessError> = pending
            .par_iter()
            .filter_map(|(descriptor, target)| self.build_one(descriptor, target).err())
            .collect();
        if let Some(first) = failures.into_iter().next() {
            return Err(first);
        }

        Ok(placeholder::substitute(content, &placeholders, |index, _| {
            let target = &targets[index];
            self.cache
                .get(&target.fingerprint)
                .unwrap_or_else(|| target.url.clone())
        }))
    }

    /// Post-render hook: only `.html` outputs are processed.
    pub fn transform(&self, content: &str, output_path: &Path) -> Result<String, ProcessError> {
        let is_html = output_path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("html"));
        if !is_html {
            return Ok(content.to_string());
        }
        self.build_all(content)
    }

    /// Forget every cached fingerprint and recreate an empty output directory.
    pub fn clear_output_dir(&self) -> Result<(), ProcessError> {
        self.cache.clear();
        let dir = &self.config.output_dir;
        match fs::remove_dir_all(dir) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(ProcessError::Io {
                    path: dir.clone(),
                    source,
                });
            }
        }
        fs::create_dir_all(dir).map_err(|source| ProcessError::Io {
            path: dir.clone(),
            source,
        })
    }

    fn build_one(&self, descriptor: &Descriptor, target: &BuildTarget) -> Result<(), ProcessError> {
        match self.execute(descriptor, target) {
            Ok(status) => {
                self.cache
                    .insert(target.fingerprint.clone(), target.url.clone());
                let input_path = descriptor.input_path.clone();
                let url = target.url.clone();
                match status {
                    BuildStatus::Built => {
                        self.lock_stats().build();
                        let operations = descriptor
                            .operations
                            .iter()
                            .map(|op| op.name.clone())
                            .collect();
                        self.emit(BuildEvent::Built {
                            input_path,
                            operations,
                            url,
                        });
                    }
                    BuildStatus::OnDisk => {
                        self.lock_stats().disk_hit();
                        self.emit(BuildEvent::DiskHit { input_path, url });
                    }
                }
                Ok(())
            }
            Err(source) => {
                self.lock_stats().fail();
                let serialized = descriptor.to_string();
                self.emit(BuildEvent::Failed {
                    descriptor: serialized.clone(),
                    error: source.to_string(),
                });
                Err(ProcessError::Build {
                    descriptor: serialized,
                    source,
                })
            }
        }
    }

    fn execute(
        &self,
        descriptor: &Descriptor,
        target: &BuildTarget,
    ) -> Result<BuildStatus, EngineError> {
        if target.output_path.exists() {
            return Ok(BuildStatus::OnDisk);
        }
        if let Some(parent) = target.output_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let partial = partial_path(&target.output_path);
        let status = render_operations(
            &self.engine,
            Path::new(&descriptor.input_path),
            &partial,
            target.extension.as_deref(),
            &descriptor.operations,
        )
        .and_then(|()| match fs::rename(&partial, &target.output_path) {
            Ok(()) => Ok(BuildStatus::Built),
            // Another writer finished the same artifact first
            Err(_) if target.output_path.exists() => Ok(BuildStatus::OnDisk),
            Err(e) => Err(EngineError::from(e)),
        });
        if matches!(status, Ok(BuildStatus::Built)) {
            return status;
        }

        match (status, remove_partial(&partial)) {
            (status, Ok(())) => status,
            (Ok(_), Err(cleanup)) => Err(EngineError::ProcessingFailed(format!(
                "failed to remove {}: {cleanup}",
                partial.display()
            ))),
            (Err(e), Err(cleanup)) => Err(EngineError::ProcessingFailed(format!(
                "{e}; also failed to remove {}: {cleanup}",
                partial.display()
            ))),
        }
    }
}
