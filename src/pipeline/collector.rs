//! Content collector: the nested stage behind every streamed file.
//!
//! A transform must see a file's contents exactly once and in full, but a
//! streamed file delivers them in arbitrary pieces. The collector buffers
//! every chunk untouched and only runs the transform when the stream ends,
//! emitting the result as its single output chunk.

use super::invoke::invoke;
use crate::config::TransformOptions;
use crate::error::StageError;
use crate::file::FileMeta;
use crate::stage::{Emitter, Stage};
use crate::transform::TransformFn;
use std::sync::Arc;
use tracing::debug;

/// Buffers the chunks of one streamed file; transforms them on flush.
///
/// Created per file by [`super::TransformStage`] and dropped with the
/// contents stream. Dropping it before the stream ends discards the chunks
/// without calling the transform.
pub struct ContentCollector {
    transform: Arc<dyn TransformFn>,
    file: FileMeta,
    options: TransformOptions,
    chunks: Vec<Vec<u8>>,
}

impl ContentCollector {
    pub fn new(transform: Arc<dyn TransformFn>, file: FileMeta, options: TransformOptions) -> Self {
        Self {
            transform,
            file,
            options,
            chunks: Vec::new(),
        }
    }

    /// Number of chunks received so far.
    pub fn pending_chunks(&self) -> usize {
        self.chunks.len()
    }
}

impl Stage for ContentCollector {
    type Input = Vec<u8>;
    type Output = Vec<u8>;

    fn accept(&mut self, chunk: Vec<u8>, _out: &mut Emitter<Vec<u8>>) -> Result<(), StageError> {
        self.chunks.push(chunk);
        Ok(())
    }

    fn flush(&mut self, out: &mut Emitter<Vec<u8>>) -> Result<(), StageError> {
        let chunks = std::mem::take(&mut self.chunks);
        debug!(
            "Stream of {} ended after {} chunks",
            self.file.path.display(),
            chunks.len()
        );
        let contents = chunks.concat();
        out.emit(invoke(self.transform.as_ref(), contents, &self.file, &self.options)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Encoding;
    use crate::transform::Content;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn collector<F: TransformFn + 'static>(f: F, encoding: Option<Encoding>) -> ContentCollector {
        let options = TransformOptions {
            encoding,
            ..Default::default()
        };
        ContentCollector::new(Arc::new(f), FileMeta::new("a.txt"), options)
    }

    #[test]
    fn accept_buffers_without_emitting() {
        let mut c = collector(|c: Content, _: &FileMeta| c, None);
        let mut out = Emitter::new();
        c.accept(b"ab".to_vec(), &mut out).unwrap();
        c.accept(b"cd".to_vec(), &mut out).unwrap();
        assert!(out.is_empty());
        assert_eq!(c.pending_chunks(), 2);
    }

    #[test]
    fn flush_emits_exactly_one_chunk() {
        let mut c = collector(|c: Content, _: &FileMeta| c.into_text() + "!", Some(Encoding::Utf8));
        let mut out = Emitter::new();
        c.accept(b"ab".to_vec(), &mut out).unwrap();
        c.accept(b"cd".to_vec(), &mut out).unwrap();
        c.flush(&mut out).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(c.pending_chunks(), 0);
    }

    #[test]
    fn flush_with_no_chunks_transforms_empty_contents() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let mut c = collector(
            move |c: Content, _: &FileMeta| {
                seen.fetch_add(1, Ordering::SeqCst);
                assert!(c.is_empty());
                "empty"
            },
            None,
        );
        let mut out = Emitter::new();
        c.flush(&mut out).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn flush_propagates_contract_violation() {
        let mut c = collector(|_: Content, _: &FileMeta| false, None);
        let mut out = Emitter::new();
        c.accept(b"x".to_vec(), &mut out).unwrap();
        let err = c.flush(&mut out).unwrap_err();
        assert!(err.is_contract_violation());
        assert!(out.is_empty());
    }
}
