//! # Drop Limiter
//!
//! The operator side of the drop limiter: reads the configuration, wires the
//! drop table, history ledger, inventory store and report to the engine in
//! `droplimiter_core`, and persists the results.
//!
//! ## Modules
//!
//! - `config`: TOML configuration and path resolution
//! - `store`: the `file` inventory driver
//! - `app`: one complete run
//! - `logging`: stderr and log file sinks

pub mod app;
pub mod config;
pub mod error;
pub mod logging;
pub mod store;

// Re-export the engine
pub use droplimiter_core as limiter;

pub use app::{run_once, RunOptions, RunOutcome, Spawn};
pub use config::{Config, Driver, FilesConfig, PatchMode, StoreConfig, DEFAULT_CONFIG};
pub use error::{AppError, AppResult};
pub use store::FileStore;
