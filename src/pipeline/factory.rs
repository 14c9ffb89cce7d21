//! Stage factory: validate unchecked arguments, then build the stage.
//!
//! Every failure here is a construction-time failure. It is reported before
//! the pipeline sees its first file, so a misconfigured build stops while it
//! is being set up rather than halfway through writing output.

use super::file_stage::TransformStage;
use crate::config::{OptionsArg, TransformOptions};
use crate::error::StageError;
use crate::transform::{json_kind, TransformFn};
use std::fmt;
use std::sync::Arc;
use tracing::info;

const MSG_MISSING: &str = "transformFn must be defined.";
const MSG_NOT_CALLABLE: &str = "transformFn must be a function.";
const MSG_OPTIONS_NOT_OBJECT: &str = "options must be an object if defined.";

/// The transform argument of [`create_transform_stage`] before validation.
pub enum TransformArg {
    /// Nothing was supplied.
    Missing,
    /// A callable transform.
    Callable(Arc<dyn TransformFn>),
    /// A value that cannot be called (a number, a string, …).
    NotCallable { kind: &'static str },
}

impl TransformArg {
    pub fn callable<F: TransformFn + 'static>(transform: F) -> Self {
        TransformArg::Callable(Arc::new(transform))
    }
}

impl fmt::Debug for TransformArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformArg::Missing => f.write_str("Missing"),
            TransformArg::Callable(_) => f.write_str("Callable(<dyn TransformFn>)"),
            TransformArg::NotCallable { kind } => {
                f.debug_struct("NotCallable").field("kind", kind).finish()
            }
        }
    }
}

impl<F: TransformFn + 'static> From<Option<F>> for TransformArg {
    fn from(transform: Option<F>) -> Self {
        transform.map_or(TransformArg::Missing, TransformArg::callable)
    }
}

impl From<Arc<dyn TransformFn>> for TransformArg {
    fn from(transform: Arc<dyn TransformFn>) -> Self {
        TransformArg::Callable(transform)
    }
}

impl From<serde_json::Value> for TransformArg {
    /// JSON cannot carry code: `null` is missing, anything else is not callable.
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => TransformArg::Missing,
            other => TransformArg::NotCallable {
                kind: json_kind(&other),
            },
        }
    }
}

/// Validate the arguments and build a [`TransformStage`].
///
/// Checks, in order:
/// 1. the transform is present — "transformFn must be defined."
/// 2. the transform is callable — "transformFn must be a function."
/// 3. options, when given, are an object — "options must be an object if defined."
///
/// Any options object passes. Its contents are only acted on per file, so an
/// unsupported encoding name surfaces as [`StageError::UnknownEncoding`] on
/// the first file the stage decodes.
///
/// # Example
/// ```rust
/// use serde_json::json;
/// use transform_stage::{create_transform_stage, Content, FileMeta, TransformArg};
///
/// let stage = create_transform_stage(
///     TransformArg::callable(|c: Content, _: &FileMeta| c.into_text().trim().to_string()),
///     json!({ "encoding": "utf8" }),
/// )
/// .unwrap();
/// # let _ = stage;
///
/// let err = create_transform_stage(json!(42), ()).unwrap_err();
/// assert_eq!(err.message(), Some("transformFn must be a function."));
/// ```
pub fn create_transform_stage(
    transform_fn: impl Into<TransformArg>,
    options: impl Into<OptionsArg>,
) -> Result<TransformStage, StageError> {
    let transform = match transform_fn.into() {
        TransformArg::Missing => return Err(StageError::configuration(MSG_MISSING)),
        TransformArg::NotCallable { kind } => {
            info!("Rejected transform argument of kind {}", kind);
            return Err(StageError::configuration(MSG_NOT_CALLABLE));
        }
        TransformArg::Callable(transform) => transform,
    };

    let options = match options.into() {
        OptionsArg::Omitted => TransformOptions::default(),
        OptionsArg::Provided(options) => options,
        OptionsArg::NotAnObject { kind } => {
            info!("Rejected options argument of kind {}", kind);
            return Err(StageError::configuration(MSG_OPTIONS_NOT_OBJECT));
        }
    };

    info!(
        "Created transform stage (encoding: {})",
        options.encoding.map_or("none", |e| e.name())
    );
    Ok(TransformStage::from_arc(transform, options))
}
