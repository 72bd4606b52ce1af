//! # Pillbox Server
//!
//! Query facade over the run multiplexer.
//!
//! A [`LookupRequest`] names a run, a tag and optionally a step range; the
//! [`DataServer`] answers with the ordered values of that tag. A run that is
//! registered but not yet indexed answers empty and not ready instead of
//! failing, so callers can poll while producers start up.
//!
//! ## Key Types
//!
//! - [`DataServer`]: The query contract
//! - [`IndexDataServer`]: Answers from a live [`Multiplexer`](pillbox_multiplexer::Multiplexer)
//! - [`FakeDataServer`]: Programmable in-process stand-in for tests
//! - [`ServerConfig`]: TOML configuration for the server and the `pillbox` binary
//!
//! ## Example
//!
//! ```rust,ignore
//! use pillbox_server::{DataServer, IndexDataServer, LookupRequest, ServerConfig};
//!
//! let server = IndexDataServer::open(&ServerConfig::with_logdir("/tmp/logdir")).await?;
//! let request = LookupRequest::new(".", "layers/Matmul").with_step_range(Some(0), Some(10));
//! let response = server.refresh_and_lookup(&request, server.request_timeout()).await?;
//! println!("{}", response.to_json()?);
//! ```

pub mod cli;
pub mod config;
pub mod data_server;
pub mod error;
pub mod fake;
pub mod health;
pub mod lookup;
pub mod seed;

// Re-exports
pub use config::ServerConfig;
pub use data_server::{DataServer, IndexDataServer};
pub use error::QueryError;
pub use fake::{FakeCall, FakeDataServer};
pub use health::{HealthPillEvent, collect_health_pills};
pub use lookup::{LookupRequest, LookupResponse, StepRange};
