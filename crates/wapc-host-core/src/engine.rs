//! The engine façade.
//!
//! waPC protocol semantics are identical across WebAssembly backends; what
//! varies is how a backend compiles, instantiates, and calls into a guest.
//! The three traits here are that seam: a backend implements [`Engine`],
//! returning [`Module`]s that spawn [`Instance`]s, and everything above the
//! traits is portable.
//!
//! Backends may additionally expose concrete types with backend-native
//! accessors; those are conveniences outside this contract.

use std::sync::Arc;

use wapc_host_common::{ModuleConfig, WapcError};

/// A boxed error returned by a [`HostCallHandler`].
pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// Caller-supplied handler for outbound host calls.
///
/// Invoked by the `__host_call` host import with the binding, namespace,
/// operation, and payload the guest placed in linear memory. The `Ok` bytes
/// become the host response the guest can fetch with `__host_response`; an
/// `Err` is signaled to the guest as a `0` return whose text it can fetch
/// with `__host_error`.
///
/// The handler is shared by every instance of a module and must be
/// reentrant-safe if instances are invoked concurrently.
pub type HostCallHandler =
    Arc<dyn Fn(&str, &str, &str, &[u8]) -> Result<Vec<u8>, BoxedError> + Send + Sync>;

/// A WebAssembly backend capable of hosting waPC guests.
pub trait Engine: Send + Sync {
    /// Short identifier of the backend, e.g. `"wasmtime"`.
    fn name(&self) -> &str;

    /// Compile `guest` into a reusable [`Module`].
    ///
    /// `host` handles the guest's outbound `__host_call`s; `None` makes
    /// every host call fail with a `0` status. `config` wires stdio and the
    /// console logger for all instances of the module.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend runtime cannot be constructed, the
    /// waPC host module cannot be registered, or the guest bytes do not
    /// compile.
    fn new_module(
        &self,
        host: Option<HostCallHandler>,
        guest: &[u8],
        config: ModuleConfig,
    ) -> Result<Box<dyn Module>, WapcError>;
}

/// A compiled guest, factory for [`Instance`]s.
///
/// Closing a module tears down its backend runtime. Callers should close
/// instances first or accept that the backend may invalidate them.
pub trait Module: Send + Sync {
    /// Instantiate the compiled guest.
    ///
    /// Instances are named with consecutive decimal ordinals starting at
    /// `"1"`; the name appears in instantiation errors.
    ///
    /// # Errors
    ///
    /// Fails if the module is closed, if the backend cannot instantiate the
    /// guest (including a trap in one of its start functions), or if the
    /// guest does not export `__guest_call`.
    fn instantiate(&self) -> Result<Box<dyn Instance>, WapcError>;

    /// Close the module and release its runtime. Idempotent.
    fn close(&self) -> Result<(), WapcError>;
}

/// A live guest with its own linear memory.
pub trait Instance: Send + Sync {
    /// Current size of the guest's linear memory, in bytes.
    fn memory_size(&self) -> u32;

    /// Invoke the named operation with the given payload and return the
    /// guest's response bytes.
    ///
    /// # Errors
    ///
    /// Fails if the instance is closed, the engine traps, the guest reports
    /// an error through `__guest_error` (returned verbatim), or the guest
    /// returns a non-success status without a message.
    fn invoke(&self, operation: &str, payload: &[u8]) -> Result<Vec<u8>, WapcError>;

    /// Close the instance. Idempotent.
    fn close(&self) -> Result<(), WapcError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // A do-nothing backend, enough to prove the façade is object-safe and
    // that handlers route through trait objects.
    struct NullEngine;
    struct NullModule {
        host: Option<HostCallHandler>,
    }
    struct NullInstance {
        host: Option<HostCallHandler>,
    }

    impl Engine for NullEngine {
        fn name(&self) -> &str {
            "null"
        }

        fn new_module(
            &self,
            host: Option<HostCallHandler>,
            _guest: &[u8],
            _config: ModuleConfig,
        ) -> Result<Box<dyn Module>, WapcError> {
            Ok(Box::new(NullModule { host }))
        }
    }

    impl Module for NullModule {
        fn instantiate(&self) -> Result<Box<dyn Instance>, WapcError> {
            Ok(Box::new(NullInstance {
                host: self.host.clone(),
            }))
        }

        fn close(&self) -> Result<(), WapcError> {
            Ok(())
        }
    }

    impl Instance for NullInstance {
        fn memory_size(&self) -> u32 {
            0
        }

        fn invoke(&self, operation: &str, payload: &[u8]) -> Result<Vec<u8>, WapcError> {
            match &self.host {
                Some(handler) => handler("", "", operation, payload)
                    .map_err(|e| WapcError::guest(e.to_string())),
                None => Err(WapcError::unsuccessful(operation)),
            }
        }

        fn close(&self) -> Result<(), WapcError> {
            Ok(())
        }
    }

    #[test]
    fn test_facade_is_object_safe() {
        let engine: Box<dyn Engine> = Box::new(NullEngine);
        assert_eq!(engine.name(), "null");

        let module = engine.new_module(None, b"", ModuleConfig::new()).unwrap();
        let instance = module.instantiate().unwrap();
        assert_eq!(instance.memory_size(), 0);
        assert!(instance.invoke("noop", b"").is_err());
    }

    #[test]
    fn test_handler_routes_through_facade() {
        let handler: HostCallHandler =
            Arc::new(|_bd: &str, _ns: &str, op: &str, payload: &[u8]| -> Result<Vec<u8>, BoxedError> {
                let mut out = op.as_bytes().to_vec();
                out.extend_from_slice(payload);
                Ok(out)
            });

        let engine: Box<dyn Engine> = Box::new(NullEngine);
        let module = engine
            .new_module(Some(handler), b"", ModuleConfig::new())
            .unwrap();
        let instance = module.instantiate().unwrap();

        let reply = instance.invoke("echo:", b"abc").unwrap();
        assert_eq!(reply, b"echo:abc");
    }
}
