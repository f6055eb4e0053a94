//! Storage infrastructure: configuration file persistence.
//!
//! The `config` sub-module reads the TOML configuration from the
//! platform-appropriate directory and provides defaults when the file does
//! not exist yet (first run).  Topology state itself is never persisted.

pub mod config;
