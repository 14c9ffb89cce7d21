//! # transform-stage
//!
//! A build-pipeline stage that rewrites the contents of every file passing
//! through it with a user-supplied function.
//!
//! ## Why this crate?
//!
//! Most content tweaks in a build (stamping a header, minifying a snippet,
//! replacing a token) don't deserve a dedicated stage. This crate wraps any
//! `Fn(Content, &FileMeta) -> impl Into<Returned>` into a stage that accepts
//! buffered and streamed files alike, so the function is written once against
//! complete contents and never sees a chunk boundary.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Stream<File>
//!  │
//!  ├─ 1. Factory   validate the transform and options
//!  ├─ 2. Route     buffer → transform now; stream → collector; null → as-is
//!  ├─ 3. Collect   streamed chunks buffered until the stream ends
//!  ├─ 4. Invoke    decode (optional), call, check the return value
//!  └─ 5. Output    same file, same metadata, new contents
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use serde_json::json;
//! use transform_stage::{create_transform_stage, run, Content, File, FileMeta, LoadMode, TransformArg};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let stage = create_transform_stage(
//!         TransformArg::callable(|c: Content, file: &FileMeta| {
//!             format!("/* {} */\n{}", file.relative().display(), c)
//!         }),
//!         json!({ "encoding": "utf8" }),
//!     )?;
//!
//!     let files = vec![File::load("src/app.js", LoadMode::Stream).await?];
//!     for file in run(stage, files).await? {
//!         let bytes = file.contents.read_all().await?.unwrap_or_default();
//!         println!("{}", String::from_utf8_lossy(&bytes));
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Content Modes
//!
//! | Contents | Transform runs | Failure surfaces as |
//! |----------|----------------|---------------------|
//! | `Buffer` | while the file passes the stage | `Err` item of the file stream |
//! | `Stream` | when the contents stream ends | `Err` item of the contents stream |
//! | `Null`   | never | — |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod file;
pub mod observer;
pub mod pipeline;
pub mod run;
pub mod stage;
pub mod transform;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{Encoding, OptionsArg, TransformOptions, TransformOptionsBuilder};
pub use error::{StageError, PLUGIN_NAME};
pub use file::{ChunkStream, Contents, File, FileMeta, LoadMode};
pub use observer::{ContentMode, NoopObserver, ObserverHandle, StageObserver};
pub use pipeline::{create_transform_stage, ContentCollector, TransformArg, TransformStage};
pub use run::{run, run_sync};
pub use stage::{pipe, Emitter, Piped, Stage};
pub use transform::{with_this, Content, Returned, ThisArg, TransformFn, WithThis};
