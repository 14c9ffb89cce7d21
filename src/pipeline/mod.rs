//! The transform stage and the pieces it is built from.
//!
//! ## Data Flow
//!
//! ```text
//! factory ──▶ file_stage ──┬─ buffer ──▶ invoke
//! (validate)  (per file)   ├─ stream ──▶ collector ──▶ invoke  (on stream end)
//!                          └─ null   ──▶ passthrough
//! ```
//!
//! 1. [`factory`]    — validate unchecked arguments into a [`TransformStage`]
//! 2. [`file_stage`] — route each file by content mode, one output per input
//! 3. [`collector`]  — per-file nested stage buffering streamed chunks
//! 4. [`invoke`]     — decode, call the transform, enforce its return contract

pub mod collector;
pub mod factory;
pub mod file_stage;
pub mod invoke;

pub use collector::ContentCollector;
pub use factory::{create_transform_stage, TransformArg};
pub use file_stage::TransformStage;
pub use invoke::invoke;
