//! Shared transform invocation: bytes in, bytes out, contract enforced.
//!
//! Both the buffered path ([`super::file_stage`]) and the streamed path
//! ([`super::collector`]) end up here with the complete contents of one
//! file, so decoding, the call itself and return-value checking exist in
//! exactly one place.

use crate::config::TransformOptions;
use crate::error::StageError;
use crate::file::FileMeta;
use crate::transform::{Content, Returned, TransformFn};
use tracing::{debug, warn};

pub(crate) const MSG_BAD_RETURN: &str = "transformFn must return a string or a buffer.";

/// Run `transform` once over the complete `contents` of `file`.
///
/// 1. Decode to text when `options.encoding` is set, else pass raw bytes.
///    An unsupported encoding name fails the file with
///    [`StageError::UnknownEncoding`] and the transform is not called.
/// 2. Call the transform with `options.this_arg` as context.
/// 3. Accept bytes as-is, encode text as UTF-8, reject anything else with
///    [`StageError::ContractViolation`].
pub fn invoke(
    transform: &dyn TransformFn,
    contents: Vec<u8>,
    file: &FileMeta,
    options: &TransformOptions,
) -> Result<Vec<u8>, StageError> {
    let input_len = contents.len();
    let result = decode(contents, file, options).and_then(|content| {
        check_returned(transform.apply(options.this_arg.as_ref(), content, file), file)
    });

    if let Some(ref observer) = options.observer {
        match &result {
            Ok(bytes) => observer.on_transformed(file, input_len, bytes.len()),
            Err(e) => observer.on_error(file, e),
        }
    }

    result
}

fn decode(contents: Vec<u8>, file: &FileMeta, options: &TransformOptions) -> Result<Content, StageError> {
    if let Some(ref name) = options.unsupported_encoding {
        warn!("Cannot decode {}: unknown encoding '{}'", file.path.display(), name);
        return Err(StageError::UnknownEncoding {
            name: name.clone(),
            path: file.path.clone(),
        });
    }

    debug!(
        "Transforming {} ({} bytes, encoding: {})",
        file.path.display(),
        contents.len(),
        options.encoding.map_or("none", |e| e.name())
    );

    Ok(match options.encoding {
        Some(encoding) => Content::Text(encoding.decode(&contents)),
        None => Content::Bytes(contents),
    })
}

fn check_returned(returned: Returned, file: &FileMeta) -> Result<Vec<u8>, StageError> {
    match returned {
        Returned::Bytes(bytes) => Ok(bytes),
        Returned::Text(text) => Ok(text.into_bytes()),
        Returned::Invalid(kind) => {
            warn!(
                "Transform returned a {} for {}; expected text or bytes",
                kind,
                file.path.display()
            );
            Err(StageError::ContractViolation {
                message: MSG_BAD_RETURN.to_string(),
                path: file.path.clone(),
            })
        }
    }
}
