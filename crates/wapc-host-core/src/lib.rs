//! Engine-agnostic interface of the waPC host runtime.
//!
//! waPC (WebAssembly Procedure Calls) is a minimal, binary-framed
//! request/response protocol between a host process and an untrusted guest
//! module: either side can invoke a named operation carrying a byte payload
//! and receive a byte payload or an error back.
//!
//! This crate defines the portable surface:
//! - [`Engine`]: a pluggable WebAssembly backend
//! - [`Module`]: a compiled guest, factory for instances
//! - [`Instance`]: a live guest exposing `invoke` and `close`
//! - [`HostCallHandler`]: the caller's handler for outbound host calls
//!
//! Backend crates (e.g. `wapc-host-wasmtime`) implement the traits; the
//! protocol semantics are identical across backends.

pub mod engine;

pub use engine::{BoxedError, Engine, HostCallHandler, Instance, Module};
pub use wapc_host_common::{Logger, ModuleConfig, OutputSink, WapcError};
