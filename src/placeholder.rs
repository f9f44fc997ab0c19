//! Placeholder markers embedded in rendered pages.
//!
//! At render time the `get_url` shortcode emits
//!
//! ```text
//! <!--SHARP_IMAGE {"inputPath":"photo.jpg","operations":[...]}-->/img/photo-<fingerprint>.avif
//! ```
//!
//! an HTML comment carrying the serialized descriptor, immediately followed
//! by the candidate URL the build will produce. The post-render pass finds
//! every marker, rebuilds the descriptor from the JSON, and replaces the
//! whole marker (comment and URL) with the final URL.
//!
//! The descriptor JSON is read with a streaming deserializer, so argument
//! strings may contain `-->` without confusing the scanner. The trailing URL
//! runs up to the next quote, whitespace or `<`; artifact URLs never contain
//! any of these. In unquoted contexts such as CSS `url(...)` the capture can
//! run into following text, so [`Placeholder::match_url`] narrows it to the
//! URL recomputed from the descriptor before anything is substituted.
//!
//! Anything that looks like a marker but doesn't parse is an error, never
//! skipped: a page that silently kept its marker would ship a broken image
//! reference.

use crate::descriptor::Descriptor;
use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;
use thiserror::Error;

/// Literal tag identifying placeholder comments.
pub const PLACEHOLDER_TAG: &str = "SHARP_IMAGE";

const OPEN: &str = "<!--SHARP_IMAGE ";

/// Comment terminator plus the candidate URL after it.
static TAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\A\s*-->([^"'\s<]*)"#).expect("placeholder tail pattern must compile")
});

#[derive(Error, Debug)]
pub enum PlaceholderError {
    #[error("malformed placeholder at byte {offset}: {source}")]
    Malformed {
        offset: usize,
        source: serde_json::Error,
    },
    #[error("placeholder at byte {offset} is not terminated by '-->'")]
    Unterminated { offset: usize },
    #[error("placeholder for {input_path} points at {found}, expected {expected}")]
    PathMismatch {
        input_path: String,
        expected: String,
        found: String,
    },
}

/// One marker found in a page.
#[derive(Debug, Clone, PartialEq)]
pub struct Placeholder {
    /// Byte range of the whole marker, URL included.
    pub span: Range<usize>,
    pub descriptor: Descriptor,
    /// Candidate URL written after the comment.
    pub url: String,
}

impl Placeholder {
    /// Narrow the captured URL to `expected` when the capture starts with it.
    ///
    /// Whatever followed the URL (a closing `)` for instance) is moved back
    /// out of the span and stays in the page. A capture that doesn't start
    /// with `expected` is a [`PlaceholderError::PathMismatch`].
    pub fn match_url(&mut self, expected: &str) -> Result<(), PlaceholderError> {
        if !self.url.starts_with(expected) {
            return Err(PlaceholderError::PathMismatch {
                input_path: self.descriptor.input_path.clone(),
                expected: expected.to_string(),
                found: self.url.clone(),
            });
        }
        self.span.end -= self.url.len() - expected.len();
        self.url.truncate(expected.len());
        Ok(())
    }
}

/// Build the marker text for a serialized descriptor and its candidate URL.
pub fn format_placeholder(descriptor_json: &str, url: &str) -> String {
    format!("{OPEN}{descriptor_json}-->{url}")
}

/// Cheap check used to skip pages without markers.
pub fn contains_placeholder(content: &str) -> bool {
    content.contains(OPEN)
}

/// Number of marker openings in `content`.
pub fn count_placeholders(content: &str) -> usize {
    content.matches(OPEN).count()
}

/// Find every marker in `content`, in order of appearance.
pub fn scan(content: &str) -> Result<Vec<Placeholder>, PlaceholderError> {
    let mut found = Vec::new();
    let mut cursor = 0;

    while let Some(relative) = content[cursor..].find(OPEN) {
        let start = cursor + relative;
        let json_start = start + OPEN.len();

        let mut stream =
            serde_json::Deserializer::from_str(&content[json_start..]).into_iter::<Descriptor>();
        let descriptor = match stream.next() {
            Some(Ok(descriptor)) => descriptor,
            Some(Err(source)) => {
                return Err(PlaceholderError::Malformed {
                    offset: start,
                    source,
                });
            }
            None => return Err(PlaceholderError::Unterminated { offset: start }),
        };
        let json_end = json_start + stream.byte_offset();

        let tail = TAIL
            .captures(&content[json_end..])
            .ok_or(PlaceholderError::Unterminated { offset: start })?;
        let end = json_end + tail.get(0).map_or(0, |m| m.end());
        let url = tail.get(1).map_or("", |m| m.as_str()).to_string();

        found.push(Placeholder {
            span: start..end,
            descriptor,
            url,
        });
        cursor = end;
    }

    Ok(found)
}

/// Replace each placeholder's span with the string `replacement` returns.
///
/// `placeholders` must come from [`scan`] on the same `content`.
pub fn substitute<S: AsRef<str>>(
    content: &str,
    placeholders: &[Placeholder],
    mut replacement: impl FnMut(usize, &Placeholder) -> S,
) -> String {
    let mut out = String::with_capacity(content.len());
    let mut last = 0;
    for (index, placeholder) in placeholders.iter().enumerate() {
        out.push_str(&content[last..placeholder.span.start]);
        out.push_str(replacement(index, placeholder).as_ref());
        last = placeholder.span.end;
    }
    out.push_str(&content[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marker(descriptor: &Descriptor, url: &str) -> String {
        format_placeholder(&descriptor.to_json().unwrap(), url)
    }

    #[test]
    fn format_embeds_tag_json_and_url() {
        let d = Descriptor::new("photo.jpg").avif();
        let text = marker(&d, "/img/photo-abc.avif");
        assert!(text.starts_with("<!--SHARP_IMAGE {\"inputPath\""));
        assert!(text.contains(PLACEHOLDER_TAG));
        assert!(text.ends_with("}-->/img/photo-abc.avif"));
    }

    #[test]
    fn scan_finds_marker_inside_attribute() {
        let d = Descriptor::new("photo.jpg").resize(Some(50), Some(50)).avif();
        let page = format!(
            r#"<img src="{}" alt="x">"#,
            marker(&d, "/img/photo-abc.avif")
        );

        let found = scan(&page).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].descriptor, d);
        assert_eq!(found[0].url, "/img/photo-abc.avif");
        assert_eq!(&page[found[0].span.end..], r#"" alt="x">"#);
        assert_eq!(&page[..found[0].span.start], r#"<img src=""#);
    }

    #[test]
    fn scan_stops_url_at_markup_in_text_context() {
        let d = Descriptor::new("a.png");
        let page = format!("<p>{}</p>", marker(&d, "/img/a-1.png"));
        let found = scan(&page).unwrap();
        assert_eq!(found[0].url, "/img/a-1.png");
        assert_eq!(&page[found[0].span.end..], "</p>");
    }

    #[test]
    fn scan_handles_comment_terminator_inside_arguments() {
        let d: Descriptor = serde_json::from_str(
            r#"{"inputPath":"a-->b.jpg","operations":[]}"#,
        )
        .unwrap();
        let page = marker(&d, "/img/x.jpg");
        let found = scan(&page).unwrap();
        assert_eq!(found[0].descriptor.input_path, "a-->b.jpg");
        assert_eq!(found[0].url, "/img/x.jpg");
    }

    #[test]
    fn scan_finds_every_occurrence() {
        let a = marker(&Descriptor::new("a.jpg"), "/a.jpg");
        let b = marker(&Descriptor::new("b.jpg"), "/b.jpg");
        let page = format!("{a} {b}\n{a}");
        let found = scan(&page).unwrap();
        assert_eq!(count_placeholders(&page), 3);
        let urls: Vec<&str> = found.iter().map(|p| p.url.as_str()).collect();
        assert_eq!(urls, vec!["/a.jpg", "/b.jpg", "/a.jpg"]);
    }

    #[test]
    fn scan_without_markers_is_empty() {
        assert!(scan("<html><!-- plain comment --></html>").unwrap().is_empty());
        assert!(!contains_placeholder("<p>hi</p>"));
        assert_eq!(count_placeholders("<p>hi</p>"), 0);
    }

    #[test]
    fn corrupted_json_fails_loudly() {
        let page = r#"<img src="<!--SHARP_IMAGE {"inputPath":"a.jpg","operat-->/a.jpg">"#;
        assert!(matches!(
            scan(page),
            Err(PlaceholderError::Malformed { offset: 10, .. })
        ));
    }

    #[test]
    fn stripped_terminator_fails_loudly() {
        let page = r#"<!--SHARP_IMAGE {"inputPath":"a.jpg","operations":[]}/a.jpg"#;
        assert!(matches!(
            scan(page),
            Err(PlaceholderError::Unterminated { offset: 0 })
        ));
    }

    #[test]
    fn truncated_marker_fails_loudly() {
        assert!(scan("<p><!--SHARP_IMAGE ").is_err());
    }

    #[test]
    fn match_url_leaves_css_punctuation_in_page() {
        let d = Descriptor::new("a.png");
        let page = format!(
            r#"<div style="background:url({})"></div>"#,
            marker(&d, "/img/a-1.png")
        );
        let mut found = scan(&page).unwrap();
        assert_eq!(found[0].url, "/img/a-1.png)");

        found[0].match_url("/img/a-1.png").unwrap();
        assert_eq!(found[0].url, "/img/a-1.png");
        assert_eq!(&page[found[0].span.end..], r#")"></div>"#);
    }

    #[test]
    fn match_url_keeps_exact_capture() {
        let mut found = scan(&marker(&Descriptor::new("a.png"), "/img/a-1.png")).unwrap();
        let span = found[0].span.clone();
        found[0].match_url("/img/a-1.png").unwrap();
        assert_eq!(found[0].span, span);
    }

    #[test]
    fn match_url_rejects_different_url() {
        let page = marker(&Descriptor::new("a.png"), "/elsewhere/a-1.png");
        let mut found = scan(&page).unwrap();
        assert!(matches!(
            found[0].match_url("/img/a-1.png"),
            Err(PlaceholderError::PathMismatch { .. })
        ));
        // A capture shorter than the expected URL is a mismatch too
        let page = marker(&Descriptor::new("a.png"), "/img/a-1");
        let mut found = scan(&page).unwrap();
        assert!(found[0].match_url("/img/a-1.png").is_err());
    }

    #[test]
    fn substitute_replaces_spans_only() {
        let a = marker(&Descriptor::new("a.jpg"), "/a.jpg");
        let page = format!("<img src=\"{a}\"><img src=\"{a}\">");
        let found = scan(&page).unwrap();
        let out = substitute(&page, &found, |_, _| "/img/final.jpg");
        assert_eq!(
            out,
            "<img src=\"/img/final.jpg\"><img src=\"/img/final.jpg\">"
        );
    }
}
