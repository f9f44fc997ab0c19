//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Process
//!
//! ```text
//! photos/dawn.jpg → /img/dawn-3f1c…e9.avif
//!     resize, grayscale, avif: built
//! photos/logo.png → /img/logo-77b2…0c.png
//!     on disk
//! posts/one.html: 2 images
//!
//! Processed 3 pages, rewrote 1 (2 images)
//! Cache: 1 cached, 1 on disk, 1 built (3 total)
//! ```
//!
//! ## Url
//!
//! ```text
//! Placeholder: <!--SHARP_IMAGE {...}-->/img/dawn-3f1c…e9.avif
//! URL: /img/dawn-3f1c…e9.avif
//! Output: _site/img/dawn-3f1c…e9.avif
//! ```
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::cache::CacheStats;
use crate::process::{BuildEvent, BuildTarget};
use crate::site::SiteReport;

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

// ============================================================================
// Build events
// ============================================================================

/// Format one progress event.
pub fn format_build_event(event: &BuildEvent) -> Vec<String> {
    match event {
        BuildEvent::Built {
            input_path,
            operations,
            url,
        } => {
            let ops = if operations.is_empty() {
                "copy".to_string()
            } else {
                operations.join(", ")
            };
            vec![
                format!("{input_path} \u{2192} {url}"),
                format!("{}{ops}: built", indent(1)),
            ]
        }
        BuildEvent::DiskHit { input_path, url } => vec![
            format!("{input_path} \u{2192} {url}"),
            format!("{}on disk", indent(1)),
        ],
        BuildEvent::Failed { descriptor, error } => vec![
            format!("FAILED {descriptor}"),
            format!("{}{error}", indent(1)),
        ],
        BuildEvent::PageProcessed { page, placeholders } => {
            vec![format!("{page}: {}", plural(*placeholders, "image", "images"))]
        }
    }
}

pub fn print_build_event(event: &BuildEvent) {
    for line in format_build_event(event) {
        println!("{}", line);
    }
}

// ============================================================================
// Summaries
// ============================================================================

/// Format the end-of-run summary for a site pass.
pub fn format_site_report(report: &SiteReport, stats: &CacheStats) -> Vec<String> {
    vec![
        String::new(),
        format!(
            "Processed {}, rewrote {} ({})",
            plural(report.pages, "page", "pages"),
            report.rewritten,
            plural(report.placeholders, "image", "images")
        ),
        format!("Cache: {}", stats),
    ]
}

pub fn print_site_report(report: &SiteReport, stats: &CacheStats) {
    for line in format_site_report(report, stats) {
        println!("{}", line);
    }
}

/// Format the result of the `url` command.
pub fn format_url_output(placeholder: &str, target: &BuildTarget) -> Vec<String> {
    vec![
        format!("Placeholder: {placeholder}"),
        format!("URL: {}", target.url),
        format!("Output: {}", target.output_path.display()),
    ]
}

pub fn print_url_output(placeholder: &str, target: &BuildTarget) {
    for line in format_url_output(placeholder, target) {
        println!("{}", line);
    }
}
