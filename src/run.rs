//! Drivers that push a batch of files through a stage and collect the result.
//!
//! The stage itself is a lazy stream adapter; these helpers are for callers
//! that already hold every file and just want the transformed batch back.
//! Streamed contents stay streamed: drain them with
//! [`crate::Contents::read_all`] to run their transforms.

use crate::error::StageError;
use crate::file::File;
use crate::pipeline::TransformStage;
use futures::stream::{self, TryStreamExt};
use tracing::info;

/// Transform `files` in order.
///
/// Stops at the first buffered file whose transform fails and returns that
/// error; files after it are never processed.
pub async fn run(stage: TransformStage, files: Vec<File>) -> Result<Vec<File>, StageError> {
    let total = files.len();
    let out: Vec<File> = stage
        .pipe(stream::iter(files.into_iter().map(Ok)))
        .try_collect()
        .await?;
    info!("Processed {}/{} files", out.len(), total);
    Ok(out)
}

/// Synchronous wrapper around [`run`].
///
/// Creates a temporary tokio runtime internally.
pub fn run_sync(stage: TransformStage, files: Vec<File>) -> Result<Vec<File>, StageError> {
    tokio::runtime::Runtime::new()
        .map_err(|source| StageError::Runtime { source })?
        .block_on(run(stage, files))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransformOptions;
    use crate::file::FileMeta;
    use crate::transform::{Content, Returned};

    fn suffix(c: Content, _: &FileMeta) -> Content {
        let mut bytes = c.into_bytes();
        bytes.push(b'!');
        Content::Bytes(bytes)
    }

    #[test]
    fn run_sync_preserves_order() {
        let stage = TransformStage::new(suffix, TransformOptions::default());
        let files = (0..5)
            .map(|i| File::buffered(format!("{i}.txt"), i.to_string()))
            .collect();
        let out = run_sync(stage, files).unwrap();
        let names: Vec<_> = out.iter().filter_map(|f| f.meta.basename()).collect();
        assert_eq!(names, ["0.txt", "1.txt", "2.txt", "3.txt", "4.txt"]);
    }

    #[tokio::test]
    async fn run_stops_at_first_failure() {
        let stage = TransformStage::new(
            |c: Content, _: &FileMeta| -> Returned {
                if c.as_bytes() == b"bad" {
                    Returned::Invalid("number")
                } else {
                    c.into()
                }
            },
            TransformOptions::default(),
        );
        let files = vec![File::buffered("a", "ok"), File::buffered("b", "bad")];
        let err = run(stage, files).await.unwrap_err();
        assert!(err.is_contract_violation());
    }
}
