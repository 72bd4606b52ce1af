//! # Pillbox Multiplexer
//!
//! Aggregates named run logs under one index.
//!
//! Runs are registered by name and path (or discovered under a log root),
//! then [`Multiplexer::reload`] incorporates whatever the producers have
//! flushed since the previous reload. Queries read an immutable
//! [`IndexSnapshot`] and may run concurrently with reloads.
//!
//! ## Example
//!
//! ```rust,ignore
//! use pillbox_multiplexer::Multiplexer;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mux = Multiplexer::default();
//!     mux.register(".", "/tmp/logdir");
//!     mux.register("run_foo", "/tmp/logdir/run_foo");
//!     mux.reload().await.unwrap();
//!
//!     for value in mux.get_values(".", "layers/Matmul").unwrap() {
//!         println!("step {} at {}", value.step, value.wall_time);
//!     }
//! }
//! ```

pub mod config;
pub mod discovery;
pub mod error;
pub mod index;
pub mod multiplexer;

// Re-exports
pub use config::MultiplexerConfig;
pub use discovery::discover_runs;
pub use error::MultiplexerError;
pub use index::{IndexSnapshot, IndexedValue, RunIndex, RunState, TagSeries};
pub use multiplexer::{Multiplexer, ReloadReport, RunReloadStats};
