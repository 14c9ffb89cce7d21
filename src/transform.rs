//! The user-facing transform function and the values it exchanges.
//!
//! A transform receives the fully-assembled contents of one file as a
//! [`Content`] and returns a [`Returned`]. The return type is a sum type
//! rather than a generic so that a misbehaving transform (one that returns a
//! number, a boolean, `null`, …) can be expressed and rejected at the
//! invocation boundary with a contract error instead of being silently
//! coerced.
//!
//! ```rust
//! use transform_stage::{Content, FileMeta, TransformOptions, TransformStage};
//!
//! let stage = TransformStage::new(
//!     |content: Content, _file: &FileMeta| content.into_text().to_uppercase(),
//!     TransformOptions::default(),
//! );
//! # let _ = stage;
//! ```
//!
//! Closure parameters must be annotated (`&FileMeta` in particular) so the
//! closure is general over the metadata borrow.

use crate::file::FileMeta;
use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// Invocation context handed to context-aware transforms.
///
/// Set through [`crate::TransformOptionsBuilder::this_arg`]; recover the
/// concrete type with `downcast_ref`.
pub type ThisArg = Arc<dyn Any + Send + Sync>;

/// File contents as seen by the transform.
///
/// `Text` when an encoding is configured, `Bytes` otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Text(String),
    Bytes(Vec<u8>),
}

impl Content {
    pub fn is_text(&self) -> bool {
        matches!(self, Content::Text(_))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text(s) => Some(s),
            Content::Bytes(_) => None,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Content::Text(s) => s.as_bytes(),
            Content::Bytes(b) => b,
        }
    }

    /// Take the contents as text; raw bytes are decoded as lossy UTF-8.
    pub fn into_text(self) -> String {
        match self {
            Content::Text(s) => s,
            Content::Bytes(b) => match String::from_utf8(b) {
                Ok(s) => s,
                Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
            },
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Content::Text(s) => s.into_bytes(),
            Content::Bytes(b) => b,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Content::Text(s) => f.write_str(s),
            Content::Bytes(b) => f.write_str(&String::from_utf8_lossy(b)),
        }
    }
}

/// What a transform handed back.
///
/// Only `Text` and `Bytes` are acceptable; `Invalid` records the kind of
/// value that was returned so the contract error can be logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Returned {
    Text(String),
    Bytes(Vec<u8>),
    Invalid(&'static str),
}

impl From<String> for Returned {
    fn from(s: String) -> Self {
        Returned::Text(s)
    }
}

impl From<&str> for Returned {
    fn from(s: &str) -> Self {
        Returned::Text(s.to_owned())
    }
}

impl From<Cow<'_, str>> for Returned {
    fn from(s: Cow<'_, str>) -> Self {
        Returned::Text(s.into_owned())
    }
}

impl From<Vec<u8>> for Returned {
    fn from(b: Vec<u8>) -> Self {
        Returned::Bytes(b)
    }
}

impl From<&[u8]> for Returned {
    fn from(b: &[u8]) -> Self {
        Returned::Bytes(b.to_vec())
    }
}

impl From<Content> for Returned {
    fn from(c: Content) -> Self {
        match c {
            Content::Text(s) => Returned::Text(s),
            Content::Bytes(b) => Returned::Bytes(b),
        }
    }
}

impl From<serde_json::Value> for Returned {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::String(s) => Returned::Text(s),
            other => Returned::Invalid(json_kind(&other)),
        }
    }
}

impl<T: Into<Returned>> From<Option<T>> for Returned {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Returned::Invalid("null"),
        }
    }
}

impl From<()> for Returned {
    fn from(_: ()) -> Self {
        Returned::Invalid("unit")
    }
}

macro_rules! invalid_returned {
    ($($ty:ty => $kind:literal),* $(,)?) => {
        $(
            impl From<$ty> for Returned {
                fn from(_: $ty) -> Self {
                    Returned::Invalid($kind)
                }
            }
        )*
    };
}

invalid_returned! {
    bool => "boolean",
    i32 => "number",
    i64 => "number",
    u32 => "number",
    u64 => "number",
    usize => "number",
    f64 => "number",
}

/// Human-readable kind of a JSON value, used in error and log messages.
pub(crate) fn json_kind(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// A content transformation applied once per file.
///
/// Implemented for every closure `Fn(Content, &FileMeta) -> R` where
/// `R: Into<Returned>`; such closures ignore the invocation context. Wrap a
/// closure with [`with_this`] to receive it.
pub trait TransformFn: Send + Sync {
    fn apply(&self, this_arg: Option<&ThisArg>, content: Content, file: &FileMeta) -> Returned;
}

impl<F, R> TransformFn for F
where
    F: Fn(Content, &FileMeta) -> R + Send + Sync,
    R: Into<Returned>,
{
    fn apply(&self, _this_arg: Option<&ThisArg>, content: Content, file: &FileMeta) -> Returned {
        self(content, file).into()
    }
}

/// A transform that also receives the configured invocation context.
///
/// Built by [`with_this`].
pub struct WithThis<F>(F);

impl<F, R> TransformFn for WithThis<F>
where
    F: Fn(Option<&ThisArg>, Content, &FileMeta) -> R + Send + Sync,
    R: Into<Returned>,
{
    fn apply(&self, this_arg: Option<&ThisArg>, content: Content, file: &FileMeta) -> Returned {
        (self.0)(this_arg, content, file).into()
    }
}

/// Wrap a closure so it is called with `options.this_arg` as first argument.
///
/// ```rust
/// use std::sync::Arc;
/// use transform_stage::{with_this, Content, FileMeta, ThisArg, TransformOptions, TransformStage};
///
/// let options = TransformOptions::builder()
///     .encoding_name("utf8")
///     .this_arg(Arc::new(String::from("// header\n")))
///     .build()
///     .unwrap();
///
/// let stage = TransformStage::new(
///     with_this(|this: Option<&ThisArg>, content: Content, _file: &FileMeta| {
///         let header = this
///             .and_then(|t| t.downcast_ref::<String>())
///             .cloned()
///             .unwrap_or_default();
///         header + &content.into_text()
///     }),
///     options,
/// );
/// # let _ = stage;
/// ```
pub fn with_this<F, R>(f: F) -> WithThis<F>
where
    F: Fn(Option<&ThisArg>, Content, &FileMeta) -> R + Send + Sync,
    R: Into<Returned>,
{
    WithThis(f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn returned_from_text_and_bytes() {
        assert_eq!(Returned::from("abc"), Returned::Text("abc".into()));
        assert_eq!(Returned::from(vec![1u8, 2]), Returned::Bytes(vec![1, 2]));
        assert_eq!(
            Returned::from(Content::Bytes(vec![9])),
            Returned::Bytes(vec![9])
        );
    }

    #[test]
    fn returned_from_non_content_is_invalid() {
        assert_eq!(Returned::from(5), Returned::Invalid("number"));
        assert_eq!(Returned::from(true), Returned::Invalid("boolean"));
        assert_eq!(Returned::from(()), Returned::Invalid("unit"));
        assert_eq!(Returned::from(None::<String>), Returned::Invalid("null"));
        assert_eq!(Returned::from(json!({"a": 1})), Returned::Invalid("object"));
        assert_eq!(Returned::from(json!("ok")), Returned::Text("ok".into()));
    }

    #[test]
    fn content_into_text_is_lossy_for_bytes() {
        let c = Content::Bytes(vec![b'h', b'i', 0xff]);
        assert_eq!(c.into_text(), "hi\u{FFFD}");
    }

    #[test]
    fn closure_ignores_this_arg() {
        let f = |c: Content, _f: &FileMeta| c.into_text() + "!";
        let this: ThisArg = Arc::new(1u8);
        let out = f.apply(Some(&this), Content::Text("x".into()), &FileMeta::new("a.txt"));
        assert_eq!(out, Returned::Text("x!".into()));
    }

    #[test]
    fn with_this_receives_context() {
        let f = with_this(|this: Option<&ThisArg>, _c: Content, _f: &FileMeta| {
            this.and_then(|t| t.downcast_ref::<u32>()).copied().unwrap_or(0).to_string()
        });
        let this: ThisArg = Arc::new(7u32);
        let meta = FileMeta::new("a.txt");
        assert_eq!(
            f.apply(Some(&this), Content::Text(String::new()), &meta),
            Returned::Text("7".into())
        );
        assert_eq!(
            f.apply(None, Content::Text(String::new()), &meta),
            Returned::Text("0".into())
        );
    }
}
