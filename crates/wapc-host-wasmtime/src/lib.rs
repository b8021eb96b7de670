//! Wasmtime backend for the waPC host runtime.
//!
//! This crate implements the portable façade from `wapc-host-core` on top of
//! [Wasmtime](https://wasmtime.dev):
//! - [`WasmtimeEngine`]: the [`Engine`](wapc_host_core::Engine) adapter,
//!   plus [`engine`] for the process-wide shared default
//! - [`WasmtimeModule`]: a compiled guest owning its engine runtime
//! - [`WasmtimeInstance`]: a live guest exposing `invoke` and `close`
//! - [`GuestState`]: the store data carrying WASI state and the per-call
//!   invocation context
//!
//! # Architecture
//!
//! ```text
//! WasmtimeEngine ── NewRuntime factory ──▶ EngineRuntime (engine + linker,
//!        │                                 WASI + AssemblyScript imports)
//!        │ compile: register "wapc" host module, compile guest
//!        ▼
//! WasmtimeModule (owns runtime + artifact)
//!        │ instantiate: fresh Store<GuestState>, run _start / wapc_init,
//!        │              cache __guest_call
//!        ▼
//! WasmtimeInstance ── invoke: bind InvokeContext, call __guest_call,
//!                     collect guest response / error
//! ```
//!
//! # Example
//!
//! ```no_run
//! use wapc_host_core::ModuleConfig;
//!
//! # fn main() -> Result<(), wapc_host_core::WapcError> {
//! let guest = std::fs::read("guest.wasm").expect("guest module");
//!
//! let engine = wapc_host_wasmtime::engine();
//! let module = engine.compile(None, &guest, ModuleConfig::new())?;
//! let instance = module.instantiate()?;
//!
//! let response = instance.invoke("echo", b"hello")?;
//! # let _ = response;
//! # Ok(())
//! # }
//! ```

pub mod engine;
mod host;
pub mod instance;
mod memory;
pub mod module;
pub mod store;

pub use engine::{default_runtime, engine, EngineRuntime, NewRuntime, WasmtimeEngine};
pub use instance::WasmtimeInstance;
pub use module::WasmtimeModule;
pub use store::GuestState;
