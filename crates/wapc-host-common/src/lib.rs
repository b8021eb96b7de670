//! Common types for the waPC host runtime workspace.
//!
//! This crate provides the pieces shared by the engine façade and every
//! backend:
//! - [`WapcError`]: error types using `thiserror`
//! - [`ModuleConfig`]: per-module I/O configuration
//! - [`OutputSink`] and [`Logger`]: sink type aliases used by the config

pub mod config;
pub mod error;

pub use config::{Logger, ModuleConfig, OutputSink};
pub use error::WapcError;
