//! Instance lifecycle: a live guest and the invocation bridge into it.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::debug;
use wapc_host_common::WapcError;
use wapc_host_core::Instance;
use wasmtime::{Store, TypedFunc};

use crate::store::{GuestState, InvokeContext};

/// A live waPC guest with its own store and linear memory.
///
/// Calls on one instance are serialized by an internal lock: the guest's
/// own memory management is not reentrancy-safe, so two concurrent
/// `invoke`s on the same instance queue rather than interleave. Closing is
/// safe concurrently with an in-flight call; the close drains it before
/// dropping the store.
pub struct WasmtimeInstance {
    name: String,

    /// The store, engine instance, and cached entry point; dropped on close.
    state: Mutex<Option<InstanceState>>,

    /// One-shot close flag: the only permitted transition is 0 to 1.
    closed: AtomicBool,
}

struct InstanceState {
    store: Store<GuestState>,
    instance: wasmtime::Instance,
    guest_call: TypedFunc<(u32, u32), u32>,
}

impl fmt::Debug for WasmtimeInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WasmtimeInstance")
            .field("name", &self.name)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl WasmtimeInstance {
    pub(crate) fn new(
        name: String,
        store: Store<GuestState>,
        instance: wasmtime::Instance,
        guest_call: TypedFunc<(u32, u32), u32>,
    ) -> Self {
        Self {
            name,
            state: Mutex::new(Some(InstanceState {
                store,
                instance,
                guest_call,
            })),
            closed: AtomicBool::new(false),
        }
    }

    /// The instance's name: the ordinal assigned by its module, as decimal
    /// text.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the named operation, returning the guest's response bytes.
    pub fn invoke(&self, operation: &str, payload: &[u8]) -> Result<Vec<u8>, WapcError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(WapcError::closed("instance"));
        }
        let mut guard = self.state.lock();
        let st = guard.as_mut().ok_or_else(|| WapcError::closed("instance"))?;

        // Bind a fresh context for exactly this call; the host imports
        // dispatched during __guest_call see it through the store data.
        st.store.data_mut().invocation = Some(InvokeContext::new(operation, payload));
        let result = st.guest_call.call(
            &mut st.store,
            (operation.len() as u32, payload.len() as u32),
        );
        // Unbind unconditionally: the context never outlives its call.
        let ic = st.store.data_mut().invocation.take().unwrap_or_default();

        // Alternate formatting keeps the root cause visible when the engine
        // wraps a trap in backtrace context.
        let status = result.map_err(|e| WapcError::guest_call(operation, format!("{e:#}")))?;

        // A guest-reported error wins over the numeric status.
        match ic.guest_error {
            Some(message) if !message.is_empty() => return Err(WapcError::guest(message)),
            _ => {}
        }
        if status == 1 {
            return Ok(ic.guest_response.unwrap_or_default());
        }
        Err(WapcError::unsuccessful(operation))
    }

    /// Current size of the guest's linear memory in bytes. Zero once the
    /// instance is closed.
    pub fn memory_size(&self) -> u32 {
        let mut guard = self.state.lock();
        match guard.as_mut() {
            Some(st) => st
                .instance
                .get_memory(&mut st.store, "memory")
                .map(|mem| mem.data_size(&st.store) as u32)
                .unwrap_or(0),
            None => 0,
        }
    }

    /// Close the instance, dropping its store. Idempotent.
    pub fn close(&self) -> Result<(), WapcError> {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(());
        }
        self.state.lock().take();
        debug!(instance = %self.name, "instance closed");
        Ok(())
    }
}

impl Instance for WasmtimeInstance {
    fn memory_size(&self) -> u32 {
        WasmtimeInstance::memory_size(self)
    }

    fn invoke(&self, operation: &str, payload: &[u8]) -> Result<Vec<u8>, WapcError> {
        WasmtimeInstance::invoke(self, operation, payload)
    }

    fn close(&self) -> Result<(), WapcError> {
        WasmtimeInstance::close(self)
    }
}
