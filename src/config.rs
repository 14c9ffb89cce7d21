//! Configuration for a transform stage.
//!
//! All stage behaviour is controlled through [`TransformOptions`], built via
//! [`TransformOptionsBuilder`] or deserialized from JSON. Options are captured
//! once when the stage is created and shared read-only by every file the stage
//! handles.
//!
//! The factory also accepts options in *unchecked* form ([`OptionsArg`]) so
//! that a value coming from a loosely-typed source, such as a JSON build
//! manifest, can be handed over as-is. Only its shape is checked at stage
//! construction; an unsupported encoding name fails each file it would
//! decode.

use crate::error::StageError;
use crate::observer::ObserverHandle;
use crate::transform::{json_kind, ThisArg};
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Options for a [`crate::TransformStage`].
///
/// # Example
/// ```rust
/// use transform_stage::{Encoding, TransformOptions};
///
/// let options = TransformOptions::builder()
///     .encoding(Encoding::Utf8)
///     .build()
///     .unwrap();
/// assert_eq!(options.encoding, Some(Encoding::Utf8));
///
/// let from_json: TransformOptions =
///     serde_json::from_str(r#"{ "encoding": "latin1" }"#).unwrap();
/// assert_eq!(from_json.encoding, Some(Encoding::Latin1));
///
/// // Falsy values mean "no decoding".
/// let raw: TransformOptions = serde_json::from_str(r#"{ "encoding": false }"#).unwrap();
/// assert_eq!(raw.encoding, None);
/// ```
#[derive(Clone, Default, Deserialize)]
#[serde(from = "OptionsDocument")]
pub struct TransformOptions {
    /// Decode contents to text with this encoding before calling the
    /// transform. Default: `None`, the transform receives raw bytes.
    ///
    /// Text returned by the transform is always re-encoded as UTF-8,
    /// whatever this is set to.
    pub encoding: Option<Encoding>,

    /// An encoding name read from a JSON document that no [`Encoding`]
    /// matches. Every file with contents then fails with
    /// [`StageError::UnknownEncoding`] instead of being transformed.
    pub unsupported_encoding: Option<String>,

    /// Invocation context handed to transforms wrapped with
    /// [`crate::with_this`]. Code-only.
    pub this_arg: Option<ThisArg>,

    /// Per-file event hooks. Code-only.
    pub observer: Option<ObserverHandle>,
}

impl fmt::Debug for TransformOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformOptions")
            .field("encoding", &self.encoding)
            .field("unsupported_encoding", &self.unsupported_encoding)
            .field("this_arg", &self.this_arg.as_ref().map(|_| "<dyn Any>"))
            .field("observer", &self.observer.as_ref().map(|_| "<dyn StageObserver>"))
            .finish()
    }
}

impl TransformOptions {
    /// Create a new builder for `TransformOptions`.
    pub fn builder() -> TransformOptionsBuilder {
        TransformOptionsBuilder {
            options: Self::default(),
            encoding_error: None,
        }
    }
}

/// Builder for [`TransformOptions`].
pub struct TransformOptionsBuilder {
    options: TransformOptions,
    encoding_error: Option<String>,
}

impl TransformOptionsBuilder {
    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.options.encoding = Some(encoding);
        self.encoding_error = None;
        self
    }

    /// Set the encoding by name (`"utf8"`, `"latin1"`, …).
    ///
    /// An empty name clears the encoding. An unknown name is reported by
    /// [`build`](Self::build).
    pub fn encoding_name(mut self, name: &str) -> Self {
        match parse_encoding_name(name) {
            Ok(encoding) => {
                self.options.encoding = encoding;
                self.encoding_error = None;
            }
            Err(e) => self.encoding_error = Some(e),
        }
        self
    }

    pub fn this_arg(mut self, this_arg: ThisArg) -> Self {
        self.options.this_arg = Some(this_arg);
        self
    }

    pub fn observer(mut self, observer: ObserverHandle) -> Self {
        self.options.observer = Some(observer);
        self
    }

    /// Build the options, validating constraints.
    pub fn build(self) -> Result<TransformOptions, StageError> {
        if let Some(reason) = self.encoding_error {
            return Err(StageError::configuration(format!(
                "options are invalid: {reason}"
            )));
        }
        Ok(self.options)
    }
}

// ── Encoding ─────────────────────────────────────────────────────────────

/// Text encoding used to present file contents to the transform.
///
/// Decoding follows the usual build-tool semantics for turning a byte buffer
/// into a string: `Hex`, `Base64` and `Base64Url` *render* the bytes in that
/// notation rather than interpret them as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// UTF-8; invalid sequences become U+FFFD.
    Utf8,
    /// 7-bit ASCII; the high bit of every byte is dropped.
    Ascii,
    /// ISO-8859-1: every byte maps to the code point of the same value.
    Latin1,
    /// UTF-16 little endian; a trailing odd byte is ignored.
    Utf16Le,
    /// Lowercase hexadecimal.
    Hex,
    /// Standard padded base64.
    Base64,
    /// URL-safe base64 without padding.
    Base64Url,
}

impl Encoding {
    /// Canonical name of the encoding.
    pub fn name(&self) -> &'static str {
        match self {
            Encoding::Utf8 => "utf8",
            Encoding::Ascii => "ascii",
            Encoding::Latin1 => "latin1",
            Encoding::Utf16Le => "utf16le",
            Encoding::Hex => "hex",
            Encoding::Base64 => "base64",
            Encoding::Base64Url => "base64url",
        }
    }

    /// Decode `bytes` into text.
    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            Encoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Encoding::Ascii => bytes.iter().map(|&b| char::from(b & 0x7f)).collect(),
            Encoding::Latin1 => bytes.iter().map(|&b| char::from(b)).collect(),
            Encoding::Utf16Le => {
                let units: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                    .collect();
                String::from_utf16_lossy(&units)
            }
            Encoding::Hex => hex::encode(bytes),
            Encoding::Base64 => STANDARD.encode(bytes),
            Encoding::Base64Url => URL_SAFE_NO_PAD.encode(bytes),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" => Ok(Encoding::Utf8),
            "ascii" => Ok(Encoding::Ascii),
            "latin1" | "binary" => Ok(Encoding::Latin1),
            "utf16le" | "utf-16le" | "ucs2" | "ucs-2" => Ok(Encoding::Utf16Le),
            "hex" => Ok(Encoding::Hex),
            "base64" => Ok(Encoding::Base64),
            "base64url" => Ok(Encoding::Base64Url),
            _ => Err(format!("unknown encoding '{s}'")),
        }
    }
}

/// Parse an encoding name; an empty name means "no encoding".
fn parse_encoding_name(name: &str) -> Result<Option<Encoding>, String> {
    if name.is_empty() {
        Ok(None)
    } else {
        name.parse().map(Some)
    }
}

// ── JSON form ────────────────────────────────────────────────────────────

/// The JSON shape of [`TransformOptions`]. Unknown keys are ignored.
#[derive(Deserialize)]
struct OptionsDocument {
    #[serde(default)]
    encoding: Value,
}

impl From<OptionsDocument> for TransformOptions {
    fn from(doc: OptionsDocument) -> Self {
        let (encoding, unsupported_encoding) = resolve_encoding(&doc.encoding);
        TransformOptions {
            encoding,
            unsupported_encoding,
            ..Default::default()
        }
    }
}

/// Read a loosely-typed `encoding` value.
///
/// `null`, `false`, `0` and `""` disable decoding. Any other value names an
/// encoding; a name no [`Encoding`] matches is kept for the per-file error.
fn resolve_encoding(value: &Value) -> (Option<Encoding>, Option<String>) {
    let name = match value {
        Value::Null | Value::Bool(false) => return (None, None),
        Value::Number(n) if n.as_f64() == Some(0.0) => return (None, None),
        Value::String(s) if s.is_empty() => return (None, None),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    match name.parse::<Encoding>() {
        Ok(encoding) => (Some(encoding), None),
        Err(_) => (None, Some(name)),
    }
}

// ── Unchecked factory argument ───────────────────────────────────────────

/// The options argument of [`crate::create_transform_stage`] before
/// validation.
#[derive(Debug)]
pub enum OptionsArg {
    /// No options given; the stage uses [`TransformOptions::default`].
    Omitted,
    /// Well-formed options.
    Provided(TransformOptions),
    /// Something other than an options object (a string, a number, …).
    NotAnObject { kind: &'static str },
}

impl From<()> for OptionsArg {
    fn from(_: ()) -> Self {
        OptionsArg::Omitted
    }
}

impl From<TransformOptions> for OptionsArg {
    fn from(options: TransformOptions) -> Self {
        OptionsArg::Provided(options)
    }
}

impl From<Option<TransformOptions>> for OptionsArg {
    fn from(options: Option<TransformOptions>) -> Self {
        options.map_or(OptionsArg::Omitted, OptionsArg::Provided)
    }
}

impl From<serde_json::Value> for OptionsArg {
    /// `null` is "omitted"; objects are read as [`TransformOptions`], ignoring
    /// unknown keys; arrays carry no recognised keys and yield defaults.
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => OptionsArg::Omitted,
            serde_json::Value::Array(_) => OptionsArg::Provided(TransformOptions::default()),
            serde_json::Value::Object(mut map) => {
                let encoding = map.remove("encoding").unwrap_or(Value::Null);
                OptionsArg::Provided(OptionsDocument { encoding }.into())
            }
            other => OptionsArg::NotAnObject {
                kind: json_kind(&other),
            },
        }
    }
}
