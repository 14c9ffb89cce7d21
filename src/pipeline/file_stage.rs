//! The file transform stage: one instance per pipeline run.

use super::collector::ContentCollector;
use super::invoke::invoke;
use crate::config::TransformOptions;
use crate::error::StageError;
use crate::file::{ChunkStream, Contents, File};
use crate::observer::ContentMode;
use crate::stage::{pipe, Emitter, Piped, Stage};
use crate::transform::TransformFn;
use futures::stream::TryStreamExt;
use std::fmt;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::debug;

/// Applies a transform to the contents of every file passed through it.
///
/// One output file per input file, in input order. Buffered contents are
/// transformed inline; streamed contents are re-routed through a fresh
/// [`ContentCollector`] and transformed when the consumer drains them; files
/// without contents pass through untouched.
///
/// Cloning is cheap: the transform and options are shared.
#[derive(Clone)]
pub struct TransformStage {
    transform: Arc<dyn TransformFn>,
    options: TransformOptions,
}

impl fmt::Debug for TransformStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformStage")
            .field("transform", &"<dyn TransformFn>")
            .field("options", &self.options)
            .finish()
    }
}

impl TransformStage {
    /// Build a stage from a statically-typed transform. Cannot fail; use
    /// [`crate::create_transform_stage`] for unchecked arguments.
    pub fn new<F>(transform: F, options: TransformOptions) -> Self
    where
        F: TransformFn + 'static,
    {
        Self::from_arc(Arc::new(transform), options)
    }

    pub(crate) fn from_arc(transform: Arc<dyn TransformFn>, options: TransformOptions) -> Self {
        Self { transform, options }
    }

    pub fn options(&self) -> &TransformOptions {
        &self.options
    }

    /// Handle one file.
    ///
    /// A configured observer hears about every failure of the file,
    /// including an error item from the upstream chunk source of a streamed
    /// file.
    ///
    /// For buffered contents a transform failure is returned here and the
    /// file is lost. For streamed contents this never fails: failures surface
    /// later as the error item of the file's contents stream.
    pub fn process(&self, mut file: File) -> Result<File, StageError> {
        let mode = match file.contents {
            Contents::Buffer(_) => ContentMode::Buffered,
            Contents::Stream(_) => ContentMode::Streamed,
            Contents::Null => ContentMode::Null,
        };
        debug!("{}: {:?}", file.meta.path.display(), mode);
        if let Some(ref observer) = self.options.observer {
            observer.on_file(&file.meta, mode);
        }

        file.contents = match std::mem::replace(&mut file.contents, Contents::Null) {
            Contents::Buffer(bytes) => Contents::Buffer(invoke(
                self.transform.as_ref(),
                bytes,
                &file.meta,
                &self.options,
            )?),
            Contents::Stream(chunks) => {
                let chunks: ChunkStream = match self.options.observer.clone() {
                    Some(observer) => {
                        let meta = file.meta.clone();
                        Box::pin(chunks.inspect_err(move |e| observer.on_error(&meta, e)))
                    }
                    None => chunks,
                };
                let collector = ContentCollector::new(
                    Arc::clone(&self.transform),
                    file.meta.clone(),
                    self.options.clone(),
                );
                Contents::Stream(Box::pin(pipe(chunks, collector)))
            }
            Contents::Null => Contents::Null,
        };

        Ok(file)
    }

    /// Feed a stream of files through this stage.
    ///
    /// The returned stream ends after the first error.
    pub fn pipe<S>(self, files: S) -> Piped<S, Self>
    where
        S: Stream<Item = Result<File, StageError>> + Unpin,
    {
        pipe(files, self)
    }
}

impl Stage for TransformStage {
    type Input = File;
    type Output = File;

    fn accept(&mut self, file: File, out: &mut Emitter<File>) -> Result<(), StageError> {
        out.emit(self.process(file)?);
        Ok(())
    }
}
