//! Module lifecycle: a compiled guest and the runtime that owns it.

use std::fmt;
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::debug;
use wapc_host_common::{ModuleConfig, OutputSink, WapcError};
use wapc_host_core::{HostCallHandler, Instance, Module};
use wasi_common::pipe::WritePipe;
use wasi_common::sync::WasiCtxBuilder;
use wasi_common::WasiCtx;
use wasmtime::Store;

use crate::engine::EngineRuntime;
use crate::instance::WasmtimeInstance;
use crate::store::GuestState;

/// Nullary functions run automatically when a guest is instantiated, in
/// order: the WASI command entry point, then the waPC initializer. Each is
/// optional.
const START_FUNCTIONS: [&str; 2] = ["_start", "wapc_init"];

/// The entry point every waPC guest must export:
/// `(func (param $operation_len i32) (param $payload_len i32) (result i32))`.
const GUEST_CALL: &str = "__guest_call";

/// A compiled waPC guest, factory for [`WasmtimeInstance`]s.
///
/// The module exclusively owns its [`EngineRuntime`]; closing the module
/// drops the runtime together with the compiled artifact. Instances hold
/// their own handles into the engine, so the caller contract is to close
/// instances before their module.
pub struct WasmtimeModule {
    /// The runtime and compiled artifact, dropped on close.
    runtime: Mutex<Option<ModuleRuntime>>,

    host_call: Option<HostCallHandler>,
    config: ModuleConfig,

    /// Source of instance names: consecutive ordinals starting at 1.
    instance_counter: AtomicU64,

    /// One-shot close flag: the only permitted transition is 0 to 1.
    closed: AtomicBool,
}

struct ModuleRuntime {
    runtime: EngineRuntime,
    compiled: wasmtime::Module,
}

impl fmt::Debug for WasmtimeModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WasmtimeModule")
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl WasmtimeModule {
    pub(crate) fn new(
        runtime: EngineRuntime,
        compiled: wasmtime::Module,
        host_call: Option<HostCallHandler>,
        config: ModuleConfig,
    ) -> Self {
        Self {
            runtime: Mutex::new(Some(ModuleRuntime { runtime, compiled })),
            host_call,
            config,
            instance_counter: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Instantiate the compiled guest, returning the concrete instance type.
    ///
    /// This is what the [`Module`] trait method delegates to; use it
    /// directly when you need [`WasmtimeInstance`] accessors such as
    /// [`WasmtimeInstance::name`].
    pub fn instantiate(&self) -> Result<WasmtimeInstance, WapcError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(WapcError::closed("module"));
        }
        // The check above can race a concurrent close; the lock below is
        // what actually decides.
        let name = (self.instance_counter.fetch_add(1, Ordering::Relaxed) + 1).to_string();

        let guard = self.runtime.lock();
        let rt = guard.as_ref().ok_or_else(|| WapcError::closed("module"))?;

        let state = GuestState::new(
            self.wasi_ctx(),
            self.host_call.clone(),
            self.config.logger.clone(),
        );
        let mut store = Store::new(&rt.runtime.engine, state);

        let instance = rt
            .runtime
            .linker
            .instantiate(&mut store, &rt.compiled)
            .map_err(|e| WapcError::instantiation_failed(format!("{e:#}")))?;

        // No invocation context is bound yet, so the waPC imports are inert
        // while the start functions run.
        for start in START_FUNCTIONS {
            if let Some(func) = instance.get_func(&mut store, start) {
                func.typed::<(), ()>(&store)
                    .and_then(|f| f.call(&mut store, ()))
                    .map_err(|e| {
                        WapcError::instantiation_failed(format!("start function {start}: {e:#}"))
                    })?;
            }
        }

        let guest_call = instance
            .get_typed_func::<(u32, u32), u32>(&mut store, GUEST_CALL)
            .map_err(|_| WapcError::missing_export(&name, GUEST_CALL))?;

        debug!(instance = %name, "guest instantiated");
        Ok(WasmtimeInstance::new(name, store, instance, guest_call))
    }

    /// Close the module, dropping its runtime and compiled artifact.
    /// Idempotent.
    pub fn close(&self) -> Result<(), WapcError> {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(());
        }
        self.runtime.lock().take();
        debug!("module closed");
        Ok(())
    }

    /// Clone of the underlying Wasmtime engine, for backend-specific use.
    /// `None` once the module is closed.
    pub fn unwrap_engine(&self) -> Option<wasmtime::Engine> {
        self.runtime.lock().as_ref().map(|rt| rt.runtime.engine.clone())
    }

    /// Clone of the compiled Wasmtime module, for backend-specific use.
    /// `None` once the module is closed.
    pub fn unwrap_module(&self) -> Option<wasmtime::Module> {
        self.runtime.lock().as_ref().map(|rt| rt.compiled.clone())
    }

    /// Build a per-instance WASI context wired to the configured sinks.
    fn wasi_ctx(&self) -> WasiCtx {
        let mut builder = WasiCtxBuilder::new();
        if let Some(sink) = &self.config.stdout {
            builder.stdout(Box::new(WritePipe::new(SinkWriter(sink.clone()))));
        }
        if let Some(sink) = &self.config.stderr {
            builder.stderr(Box::new(WritePipe::new(SinkWriter(sink.clone()))));
        }
        builder.build()
    }
}

impl Module for WasmtimeModule {
    fn instantiate(&self) -> Result<Box<dyn Instance>, WapcError> {
        Ok(Box::new(WasmtimeModule::instantiate(self)?))
    }

    fn close(&self) -> Result<(), WapcError> {
        WasmtimeModule::close(self)
    }
}

/// `io::Write` adapter from a WASI file to a shared [`OutputSink`].
struct SinkWriter(OutputSink);

impl Write for SinkWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.0.lock().flush()
    }
}
