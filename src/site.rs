//! Post-render pass over an already rendered site directory.
//!
//! Walks every `.html` file under the site directory in file-name order, runs
//! [`Processor::transform`] on it, and writes the page back when placeholders
//! were substituted. The first page that fails stops the pass; pages before
//! it have already been rewritten and their images stay cached.

use crate::imaging::ImageEngine;
use crate::placeholder;
use crate::process::{BuildEvent, ProcessError, Processor};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum SiteError {
    #[error("failed to walk {}: {source}", path.display())]
    Walk {
        path: PathBuf,
        source: walkdir::Error,
    },
    #[error("IO error on {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("{}: {source}", page.display())]
    Page { page: PathBuf, source: ProcessError },
}

/// Counts for one pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SiteReport {
    /// HTML pages read.
    pub pages: usize,
    /// Pages written back with substituted URLs.
    pub rewritten: usize,
    /// Placeholders substituted across all rewritten pages.
    pub placeholders: usize,
}

fn is_page(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("html"))
}

/// Substitute placeholders in every page under `site_dir`.
pub fn process_site<E: ImageEngine>(
    processor: &Processor<E>,
    site_dir: &Path,
) -> Result<SiteReport, SiteError> {
    let mut report = SiteReport::default();

    for entry in WalkDir::new(site_dir).sort_by_file_name() {
        let entry = entry.map_err(|source| SiteError::Walk {
            path: site_dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if !entry.file_type().is_file() || !is_page(path) {
            continue;
        }

        let content = fs::read_to_string(path).map_err(|source| SiteError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        report.pages += 1;
        if !placeholder::contains_placeholder(&content) {
            continue;
        }

        let rewritten = processor
            .transform(&content, path)
            .map_err(|source| SiteError::Page {
                page: path.to_path_buf(),
                source,
            })?;
        if rewritten == content {
            continue;
        }
        fs::write(path, &rewritten).map_err(|source| SiteError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let count = placeholder::count_placeholders(&content);
        report.rewritten += 1;
        report.placeholders += count;
        let page = path.strip_prefix(site_dir).unwrap_or(path);
        processor.emit(BuildEvent::PageProcessed {
            page: page.display().to_string(),
            placeholders: count,
        });
    }

    Ok(report)
}
