//! High-level image operations.
//!
//! These functions turn a descriptor's named operations into typed steps
//! through the [operation table](super::ops), pick the output encoding, and
//! call the engine.

use super::backend::{EngineError, ImageEngine};
use super::ops::OperationKind;
use super::params::{Encoding, OutputFormat, RenderParams, Step};
use crate::descriptor::Operation;
use std::path::Path;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Parse every operation into a step, in declaration order.
///
/// Fails on the first unknown operation name or malformed argument list.
pub fn plan_steps(operations: &[Operation]) -> Result<Vec<Step>> {
    operations
        .iter()
        .map(|op| {
            OperationKind::from_name(&op.name)
                .ok_or_else(|| EngineError::UnknownOperation(op.name.clone()))?
                .parse_args(&op.args)
        })
        .collect()
}

/// Pick the encoding: the last format step wins, otherwise the format named
/// by the artifact's extension.
pub fn resolve_encoding(steps: &[Step], extension: Option<&str>) -> Result<Encoding> {
    let last_format = steps.iter().rev().find_map(|step| match step {
        Step::Encode(encoding) => Some(*encoding),
        _ => None,
    });
    if let Some(encoding) = last_format {
        return Ok(encoding);
    }
    match extension {
        Some(ext) => OutputFormat::from_extension(ext)
            .map(Encoding::new)
            .ok_or_else(|| EngineError::UnsupportedFormat(ext.to_string())),
        None => Err(EngineError::UnsupportedFormat(
            "(input has no extension)".to_string(),
        )),
    }
}

/// Render `operations` applied to `source` into `output`.
///
/// `extension` is the artifact's extension, used when no format operation
/// is present; `output` itself may be a temporary path.
pub fn render_operations(
    engine: &impl ImageEngine,
    source: &Path,
    output: &Path,
    extension: Option<&str>,
    operations: &[Operation],
) -> Result<()> {
    let steps = plan_steps(operations)?;
    let encoding = resolve_encoding(&steps, extension)?;
    engine.render(&RenderParams {
        source: source.to_path_buf(),
        output: output.to_path_buf(),
        steps,
        encoding,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::MockEngine;
    use crate::imaging::params::Fit;
    use serde_json::json;

    fn op(name: &str, args: Vec<serde_json::Value>) -> Operation {
        Operation {
            name: name.to_string(),
            args,
        }
    }

    #[test]
    fn plan_steps_preserves_order() {
        let steps = plan_steps(&[
            op("grayscale", vec![]),
            op("resize", vec![json!({"width": 10})]),
            op("webp", vec![]),
        ])
        .unwrap();
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0], Step::Grayscale);
        assert_eq!(
            steps[1],
            Step::Resize {
                width: Some(10),
                height: None,
                fit: Fit::Cover
            }
        );
        assert!(matches!(steps[2], Step::Encode(_)));
    }

    #[test]
    fn plan_steps_rejects_unknown_operation() {
        let err = plan_steps(&[op("sepia", vec![])]).unwrap_err();
        assert!(matches!(err, EngineError::UnknownOperation(name) if name == "sepia"));
    }

    #[test]
    fn last_format_step_wins() {
        let steps = plan_steps(&[op("webp", vec![]), op("avif", vec![])]).unwrap();
        let encoding = resolve_encoding(&steps, Some("jpg")).unwrap();
        assert_eq!(encoding.format, OutputFormat::Avif);
    }

    #[test]
    fn extension_decides_without_format_step() {
        let encoding = resolve_encoding(&[Step::Grayscale], Some("JPG")).unwrap();
        assert_eq!(encoding.format, OutputFormat::Jpeg);
        assert!(resolve_encoding(&[], Some("gif")).is_err());
        assert!(resolve_encoding(&[], None).is_err());
    }

    #[test]
    fn render_operations_hands_typed_steps_to_engine() {
        let tmp = tempfile::TempDir::new().unwrap();
        let engine = MockEngine::new();
        let output = tmp.path().join("photo.partial");

        render_operations(
            &engine,
            Path::new("photo.jpg"),
            &output,
            Some("avif"),
            &[op("rotate", vec![json!(180)]), op("avif", vec![])],
        )
        .unwrap();

        let renders = engine.get_renders();
        assert_eq!(renders.len(), 1);
        assert_eq!(renders[0].steps[0], Step::Rotate { degrees: 180 });
        assert_eq!(renders[0].encoding.format, OutputFormat::Avif);
    }

    #[test]
    fn render_operations_skips_engine_on_bad_arguments() {
        let engine = MockEngine::new();
        let result = render_operations(
            &engine,
            Path::new("photo.jpg"),
            Path::new("out.png"),
            Some("png"),
            &[op("rotate", vec![json!("sideways")])],
        );
        assert!(result.is_err());
        assert_eq!(engine.render_count(), 0);
    }
}
