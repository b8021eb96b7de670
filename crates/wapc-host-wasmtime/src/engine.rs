//! Wasmtime engine adapter.
//!
//! [`WasmtimeEngine`] implements the portable [`Engine`] façade on top of
//! Wasmtime. Every module gets a fresh [`EngineRuntime`] (engine + linker)
//! from a [`NewRuntime`] factory; the default factory registers the WASI
//! `snapshot_preview1` import module and an AssemblyScript `env` module with
//! the abort message disabled, matching what guests compiled from the common
//! toolchains expect to import.

use std::sync::{Arc, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;
use wapc_host_common::{ModuleConfig, WapcError};
use wapc_host_core::{Engine, HostCallHandler, Module};
use wasmtime::Linker;

use crate::host::register_wapc_host;
use crate::module::WasmtimeModule;
use crate::store::GuestState;

/// Factory producing a fresh runtime for each module.
///
/// This is the customization seam: supply your own factory to
/// [`WasmtimeEngine::with_runtime`] to tune the Wasmtime [`Config`] or to
/// register additional host modules before the guest is compiled.
///
/// [`Config`]: wasmtime::Config
pub type NewRuntime = Arc<dyn Fn() -> Result<EngineRuntime, WapcError> + Send + Sync>;

/// An engine plus the linker that will instantiate guests on it.
///
/// Owned exclusively by the module it is built for and torn down when the
/// module is closed.
pub struct EngineRuntime {
    /// The Wasmtime engine compiling and running the guest.
    pub engine: wasmtime::Engine,

    /// Linker carrying every host module the guest may import.
    pub linker: Linker<GuestState>,
}

impl EngineRuntime {
    /// Wrap an engine with an empty linker.
    pub fn new(engine: wasmtime::Engine) -> Self {
        let linker = Linker::new(&engine);
        Self { engine, linker }
    }

    /// Register the WASI `snapshot_preview1` import module.
    pub fn with_wasi(mut self) -> Result<Self, WapcError> {
        wasi_common::sync::add_to_linker(&mut self.linker, |state: &mut GuestState| {
            &mut state.wasi
        })
        .map_err(|e| WapcError::runtime(format!("failed to register WASI imports: {e}")))?;
        Ok(self)
    }

    /// Register the AssemblyScript `env` import module.
    ///
    /// `abort` traps without reading the abort message, so that guests
    /// behave the same here as on backends that never surface it. `trace`
    /// is a no-op and `seed` derives from the wall clock.
    pub fn with_assemblyscript(mut self) -> Result<Self, WapcError> {
        self.linker
            .func_wrap(
                "env",
                "abort",
                |_msg: u32, _file: u32, _line: u32, _col: u32| -> Result<(), wasmtime::Error> {
                    Err(wasmtime::Error::msg("AssemblyScript guest aborted"))
                },
            )
            .and_then(|l| {
                l.func_wrap(
                    "env",
                    "trace",
                    |_msg: u32, _n: u32, _a0: f64, _a1: f64, _a2: f64, _a3: f64, _a4: f64| {},
                )
            })
            .and_then(|l| {
                l.func_wrap("env", "seed", || -> f64 {
                    SystemTime::now()
                        .duration_since(UNIX_EPOCH)
                        .map(|d| d.subsec_nanos() as f64)
                        .unwrap_or(0.0)
                })
            })
            .map_err(|e| {
                WapcError::runtime(format!("failed to register AssemblyScript imports: {e}"))
            })?;
        Ok(self)
    }
}

/// The default runtime: a default-configured engine with WASI and
/// AssemblyScript imports registered.
pub fn default_runtime() -> Result<EngineRuntime, WapcError> {
    EngineRuntime::new(wasmtime::Engine::default())
        .with_wasi()?
        .with_assemblyscript()
}

/// The Wasmtime implementation of the waPC [`Engine`] façade.
pub struct WasmtimeEngine {
    new_runtime: NewRuntime,
}

impl WasmtimeEngine {
    /// An engine using [`default_runtime`] for every module.
    pub fn new() -> Self {
        Self {
            new_runtime: Arc::new(default_runtime),
        }
    }

    /// An engine using a custom runtime factory.
    pub fn with_runtime(new_runtime: NewRuntime) -> Self {
        Self { new_runtime }
    }

    /// Compile `guest` into a [`WasmtimeModule`].
    ///
    /// Runs the runtime factory, registers the `wapc` host module on its
    /// linker, and compiles the guest bytes. Failures drop the fresh
    /// runtime before returning.
    ///
    /// # Errors
    ///
    /// Returns an error if the factory fails, the `wapc` module cannot be
    /// registered (e.g. the factory already claimed the name), or the guest
    /// bytes do not compile.
    pub fn compile(
        &self,
        host: Option<HostCallHandler>,
        guest: &[u8],
        config: ModuleConfig,
    ) -> Result<WasmtimeModule, WapcError> {
        let mut runtime = (self.new_runtime)()?;
        register_wapc_host(&mut runtime.linker)?;

        let compiled = wasmtime::Module::new(&runtime.engine, guest)
            .map_err(|e| WapcError::compilation_failed(format!("{e:#}")))?;

        debug!(guest_bytes = guest.len(), "guest module compiled");
        Ok(WasmtimeModule::new(runtime, compiled, host, config))
    }
}

impl Default for WasmtimeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for WasmtimeEngine {
    fn name(&self) -> &str {
        "wasmtime"
    }

    fn new_module(
        &self,
        host: Option<HostCallHandler>,
        guest: &[u8],
        config: ModuleConfig,
    ) -> Result<Box<dyn Module>, WapcError> {
        Ok(Box::new(self.compile(host, guest, config)?))
    }
}

/// The process-wide shared engine, using the default runtime factory.
pub fn engine() -> Arc<WasmtimeEngine> {
    static SHARED: OnceLock<Arc<WasmtimeEngine>> = OnceLock::new();
    SHARED.get_or_init(|| Arc::new(WasmtimeEngine::new())).clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_runtime_builds() {
        let runtime = default_runtime().unwrap();

        // WASI and AssemblyScript imports leave room for the wapc module.
        let mut linker = runtime.linker;
        register_wapc_host(&mut linker).unwrap();
    }

    #[test]
    fn test_engine_name() {
        assert_eq!(WasmtimeEngine::new().name(), "wasmtime");
    }

    #[test]
    fn test_shared_engine_is_shared() {
        let a = engine();
        let b = engine();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_compile_rejects_garbage() {
        let engine = WasmtimeEngine::new();
        let err = engine
            .compile(None, b"not a wasm module", ModuleConfig::new())
            .unwrap_err();
        assert!(matches!(err, WapcError::CompilationFailed { .. }));
    }

    #[test]
    fn test_factory_claiming_wapc_name_fails_compile() {
        let factory: NewRuntime = Arc::new(|| {
            let mut runtime = EngineRuntime::new(wasmtime::Engine::default());
            runtime
                .linker
                .func_wrap("wapc", "__host_response_len", || -> u32 { 0 })
                .map_err(|e| WapcError::runtime(format!("{e}")))?;
            Ok(runtime)
        });

        let engine = WasmtimeEngine::with_runtime(factory);
        let err = engine
            .compile(None, b"(module)", ModuleConfig::new())
            .unwrap_err();
        assert!(matches!(err, WapcError::HostModule { .. }));
    }
}
