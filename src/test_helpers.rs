//! Shared test utilities for the deferred-images test suite.
//!
//! Provides fixture builders (synthetic JPEGs, pages on disk) and a
//! processor wired to the recording [`MockEngine`] with its output directory
//! inside a temp dir.
//!
//! # Usage
//!
//! ```text
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! let processor = mock_processor(tmp.path());
//! let page = write_page(tmp.path(), "_site/index.html", "<p>hi</p>");
//! ```

use image::{ImageEncoder, RgbImage};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::PluginConfig;
use crate::imaging::backend::tests::MockEngine;
use crate::process::Processor;

// =========================================================================
// Fixture setup
// =========================================================================

/// Write a small valid JPEG with the given dimensions.
pub fn write_test_jpeg(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let file = fs::File::create(path).unwrap();
    let writer = std::io::BufWriter::new(file);
    image::codecs::jpeg::JpegEncoder::new(writer)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
}

/// Write `content` to `root/relative`, creating parents.
pub fn write_page(root: &Path, relative: &str, content: &str) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

// =========================================================================
// Processors
// =========================================================================

/// Config rooted at `root`: inputs resolve against it, artifacts land in
/// `root/_site/img` and are served from `/img`.
pub fn test_config(root: &Path) -> PluginConfig {
    PluginConfig {
        input_root: root.to_string_lossy().into_owned(),
        output_dir: root.join("_site/img"),
        url_path: "/img".to_string(),
        ..Default::default()
    }
}

/// Processor over [`test_config`] with a fresh [`MockEngine`].
pub fn mock_processor(root: &Path) -> Processor<MockEngine> {
    Processor::with_engine(test_config(root), MockEngine::new())
}
