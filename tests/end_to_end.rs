//! End-to-end tests through the public API with the real `image`-crate engine.
//!
//! Each test lays out a tiny site in a temp dir: a source JPEG at the input
//! root, rendered pages under `_site/`, artifacts in `_site/img`.

use deferred_images::config::PluginConfig;
use deferred_images::descriptor::Descriptor;
use deferred_images::filters::FilterTable;
use deferred_images::placeholder;
use deferred_images::process::{ProcessError, Processor};
use deferred_images::site::process_site;
use image::{GenericImageView, ImageEncoder, RgbImage};
use serde_json::json;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_jpeg(path: &Path, width: u32, height: u32) {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let file = fs::File::create(path).unwrap();
    let writer = std::io::BufWriter::new(file);
    image::codecs::jpeg::JpegEncoder::new(writer)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
}

fn site(width: u32, height: u32) -> (TempDir, PluginConfig) {
    let tmp = TempDir::new().unwrap();
    write_jpeg(&tmp.path().join("photo.jpg"), width, height);
    let config = PluginConfig {
        input_root: tmp.path().to_string_lossy().into_owned(),
        output_dir: tmp.path().join("_site/img"),
        url_path: "/img".to_string(),
        ..Default::default()
    };
    (tmp, config)
}

fn artifact_path(config: &PluginConfig, url: &str) -> std::path::PathBuf {
    config.output_dir.join(url.trim_start_matches("/img/"))
}

#[test]
fn resize_to_avif_scenario() {
    let (tmp, config) = site(120, 80);
    let processor = Processor::new(config.clone());
    let filters = FilterTable::new(&processor);

    let d = filters
        .apply(
            "resize",
            "photo.jpg",
            vec![json!({"width": 50, "height": 50})],
        )
        .unwrap();
    let d = filters.apply("avif", d, Vec::new()).unwrap();
    assert_eq!(
        d.to_json().unwrap(),
        r#"{"inputPath":"photo.jpg","operations":[{"name":"resize","args":[{"height":50,"width":50}]},{"name":"avif","args":[]}]}"#
    );

    // Same chain, rooted at the site input dir so the build can find it
    let rooted = Descriptor {
        input_path: "/photo.jpg".to_string(),
        ..d
    };
    let page = format!(
        r#"<html><body><img src="{}"></body></html>"#,
        filters.get_url(&rooted).unwrap()
    );
    let out = processor
        .transform(&page, &tmp.path().join("_site/index.html"))
        .unwrap();

    let found = placeholder::scan(&page).unwrap();
    let url = &found[0].url;
    assert!(url.starts_with("/img/photo-"));
    assert!(url.ends_with(".avif"));
    assert_eq!(out, format!(r#"<html><body><img src="{url}"></body></html>"#));

    let artifact = artifact_path(&config, url);
    assert!(artifact.exists());
    assert!(fs::metadata(&artifact).unwrap().len() > 0);
}

#[test]
fn png_pipeline_applies_operations_in_order() {
    let (_tmp, config) = site(200, 100);
    let processor = Processor::new(config.clone());
    let d = Descriptor::new("/photo.jpg")
        .resize(Some(40), None)
        .rotate(90)
        .grayscale()
        .png();

    let page = processor.emit_placeholder(&d).unwrap();
    let url = processor.build_all(&page).unwrap();

    assert!(url.ends_with(".png"));
    let img = image::open(artifact_path(&config, &url)).unwrap();
    assert_eq!(img.dimensions(), (20, 40));
    assert_eq!(img.color(), image::ColorType::L8);
}

#[test]
fn input_extension_kept_without_format_operation() {
    let (_tmp, config) = site(64, 32);
    let processor = Processor::new(config.clone());
    let page = processor
        .emit_placeholder(Descriptor::new("/photo.jpg").resize(Some(32), None))
        .unwrap();

    let url = processor.build_all(&page).unwrap();

    assert!(url.ends_with(".jpg"));
    let img = image::open(artifact_path(&config, &url)).unwrap();
    assert_eq!(img.dimensions(), (32, 16));
}

#[test]
fn second_process_reuses_files_on_disk() {
    let (_tmp, config) = site(64, 64);
    let d = Descriptor::new("/photo.jpg").resize(Some(16), Some(16)).webp();

    let first = Processor::new(config.clone());
    let page = first.emit_placeholder(&d).unwrap();
    let url = first.build_all(&page).unwrap();
    let artifact = artifact_path(&config, &url);
    let modified = fs::metadata(&artifact).unwrap().modified().unwrap();

    let second = Processor::new(config.clone());
    assert_eq!(second.build_all(&page).unwrap(), url);
    assert_eq!(second.stats().on_disk, 1);
    assert_eq!(second.stats().built, 0);
    assert_eq!(fs::metadata(&artifact).unwrap().modified().unwrap(), modified);
}

#[test]
fn clear_output_dir_then_rebuild() {
    let (_tmp, config) = site(32, 32);
    let processor = Processor::new(config.clone());
    let page = processor
        .emit_placeholder(Descriptor::new("/photo.jpg").negate().png())
        .unwrap();
    let url = processor.build_all(&page).unwrap();

    processor.clear_output_dir().unwrap();
    assert!(!artifact_path(&config, &url).exists());

    processor.build_all(&page).unwrap();
    assert!(artifact_path(&config, &url).exists());
    assert_eq!(processor.stats().built, 2);
}

#[test]
fn missing_source_fails_without_leaving_artifacts() {
    let (_tmp, config) = site(8, 8);
    let processor = Processor::new(config.clone());
    let page = processor
        .emit_placeholder(Descriptor::new("/missing.jpg").avif())
        .unwrap();

    let err = processor.build_all(&page).unwrap_err();

    assert!(matches!(err, ProcessError::Build { .. }));
    assert!(err.to_string().contains("missing.jpg"));
    assert_eq!(fs::read_dir(&config.output_dir).unwrap().count(), 0);
    assert!(processor.cache().is_empty());
}

#[test]
fn invalid_arguments_fail_at_build_time() {
    let (_tmp, config) = site(8, 8);
    let processor = Processor::new(config);
    let filters = FilterTable::new(&processor);
    // Accepted by the filter, rejected by the engine
    let d = filters
        .apply("rotate", "/photo.jpg", vec![json!(45)])
        .unwrap();
    let page = filters.get_url(&d).unwrap();

    assert!(processor.build_all(&page).is_err());
}

#[test]
fn site_pass_rewrites_pages() {
    let (tmp, config) = site(48, 48);
    let processor = Processor::new(config.clone());
    let hero = processor
        .emit_placeholder(Descriptor::new("/photo.jpg").resize(Some(24), None).png())
        .unwrap();
    let thumb = processor
        .emit_placeholder(Descriptor::new("/photo.jpg").resize(Some(8), None).png())
        .unwrap();

    let site_dir = tmp.path().join("_site");
    fs::create_dir_all(site_dir.join("posts")).unwrap();
    fs::write(
        site_dir.join("index.html"),
        format!(r#"<img src="{hero}"><img src="{thumb}">"#),
    )
    .unwrap();
    fs::write(site_dir.join("posts/one.html"), format!(r#"<img src="{hero}">"#)).unwrap();

    let report = process_site(&processor, &site_dir).unwrap();

    assert_eq!(report.pages, 2);
    assert_eq!(report.rewritten, 2);
    assert_eq!(report.placeholders, 3);
    assert_eq!(processor.stats().built, 2);
    for page in ["index.html", "posts/one.html"] {
        let html = fs::read_to_string(site_dir.join(page)).unwrap();
        assert!(!placeholder::contains_placeholder(&html), "{page} kept a marker");
    }
}

#[test]
fn oversized_resize_fails_cleanly() {
    let (_tmp, config) = site(16, 16);
    let processor = Processor::new(config.clone());
    let page = processor
        .emit_placeholder(Descriptor::new("/photo.jpg").resize(Some(60000), Some(60000)))
        .unwrap();

    let err = processor.build_all(&page).unwrap_err();

    assert!(matches!(err, ProcessError::Build { .. }));
    assert!(err.to_string().contains("resize"));
    assert_eq!(fs::read_dir(&config.output_dir).unwrap().count(), 0);
}

#[test]
fn parallel_processes_share_output_dir() {
    let (_tmp, config) = site(320, 240);
    let d = Descriptor::new("/photo.jpg").resize(Some(160), None).webp();
    let page = Processor::new(config.clone()).emit_placeholder(&d).unwrap();

    let urls: Vec<String> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..6)
            .map(|_| {
                let (config, page) = (config.clone(), &page);
                scope.spawn(move || Processor::new(config).build_all(page))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect()
    });

    assert!(urls.iter().all(|url| url == &urls[0]));
    let names: Vec<String> = fs::read_dir(&config.output_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names.len(), 1, "leftover files: {names:?}");
    let img = image::open(artifact_path(&config, &urls[0])).unwrap();
    assert_eq!(img.dimensions(), (160, 120));
}

#[test]
fn background_image_in_inline_style() {
    let (tmp, config) = site(40, 40);
    let processor = Processor::new(config.clone());
    let d = Descriptor::new("/photo.jpg").resize(Some(20), None).png();
    let page = format!(
        r#"<section style="background-image: url({})"></section>"#,
        processor.emit_placeholder(&d).unwrap()
    );

    let out = processor
        .transform(&page, &tmp.path().join("_site/index.html"))
        .unwrap();

    let url = processor.target(&processor.finalize(&d)).unwrap().url;
    assert_eq!(
        out,
        format!(r#"<section style="background-image: url({url})"></section>"#)
    );
    assert!(artifact_path(&config, &url).exists());
}
