//! Observer trait for per-file stage events.
//!
//! Inject an [`Arc<dyn StageObserver>`] via
//! [`crate::config::TransformOptionsBuilder::observer`] to be told what the
//! stage does with each file: which path it took, how many bytes went in and
//! came out, and which files failed.
//!
//! # Example
//!
//! ```rust
//! use transform_stage::{StageObserver, FileMeta, TransformOptions};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct ByteCounter {
//!     written: AtomicUsize,
//! }
//!
//! impl StageObserver for ByteCounter {
//!     fn on_transformed(&self, _file: &FileMeta, _input_len: usize, output_len: usize) {
//!         self.written.fetch_add(output_len, Ordering::SeqCst);
//!     }
//! }
//!
//! let counter = Arc::new(ByteCounter { written: AtomicUsize::new(0) });
//!
//! let options = TransformOptions::builder()
//!     .observer(counter as Arc<dyn StageObserver>)
//!     .build()
//!     .unwrap();
//! ```

use crate::error::StageError;
use crate::file::FileMeta;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Which path a file took through the stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentMode {
    /// Contents were buffered and transformed inline.
    Buffered,
    /// Contents were re-routed through a content collector.
    Streamed,
    /// No contents; the file passed through untouched.
    Null,
}

/// Called by the stage as it handles each file.
///
/// All methods default to no-ops. For streamed files `on_transformed` and
/// `on_error` fire when the contents stream is drained, which may be after
/// later files have already entered the stage.
pub trait StageObserver: Send + Sync {
    /// Called when a file enters the stage.
    fn on_file(&self, file: &FileMeta, mode: ContentMode) {
        let _ = (file, mode);
    }

    /// Called after the transform produced valid output for a file.
    fn on_transformed(&self, file: &FileMeta, input_len: usize, output_len: usize) {
        let _ = (file, input_len, output_len);
    }

    /// Called once for every file that fails to produce output, including a
    /// streamed file whose chunk source failed.
    fn on_error(&self, file: &FileMeta, error: &StageError) {
        let _ = (file, error);
    }
}

/// An observer that ignores every event.
pub struct NoopObserver;

impl StageObserver for NoopObserver {}

/// Convenience alias matching the type stored in [`crate::config::TransformOptions`].
pub type ObserverHandle = Arc<dyn StageObserver>;
