//! # Pillbox Core
//!
//! Core types, errors and the record codec shared by every Pillbox crate.
//!
//! A producer (usually an instrumented model run) emits [`EventRecord`]s, each
//! carrying a named tensor payload plus the metadata of the debug op that
//! produced it. Records are framed by [`codec`] for storage in append-only run
//! logs, and read back into [`ValueSummary`] / [`HealthPill`] values for the
//! query side.
//!
//! ## Key Types
//!
//! - [`EventRecord`]: A single timestamped, stepped record
//! - [`TensorPayload`]: Element type, shape and values of a tensor
//! - [`RecordMetadata`]: Device, output slot and plugin data of a record
//! - [`ValueSummary`]: The compact per-step summary stored in the index
//! - [`HealthPill`]: Typed view of a `DebugNumericSummary` tensor

pub mod codec;
pub mod debugger;
pub mod error;
pub mod record;
pub mod summary;

// Re-export main types
pub use codec::{DecodeOutcome, FRAME_HEADER_LEN, FRAME_TRAILER_LEN, MAX_FRAME_LEN};
pub use debugger::{
    DEBUG_NUMERIC_SUMMARY_OP, DEBUGGER_PLUGIN_NAME, DebugNodeName, DebuggerEventMetadata,
};
pub use error::CodecError;
pub use record::{DataType, EventRecord, RecordMetadata, TensorPayload};
pub use summary::{HealthPill, ValueSummary};
