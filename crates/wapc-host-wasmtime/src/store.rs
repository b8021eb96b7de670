//! Per-instance store data and the per-call invocation context.
//!
//! Wasmtime host imports have fixed, narrow `i32` signatures, so per-call
//! state cannot be passed to them as arguments. Instead it rides in the
//! store data: [`GuestState`] is the `T` of each instance's `Store<T>`,
//! reachable from every host import through `Caller`. The invocation
//! context is planted there by `invoke` before `__guest_call` is dispatched
//! and taken back out when it returns, so an import running during the
//! dispatch sees exactly that call's context. Outside of a call the slot is
//! `None` and the waPC imports are inert.

use wapc_host_common::Logger;
use wapc_host_core::HostCallHandler;
use wasi_common::WasiCtx;

/// Store data for one guest instance.
pub struct GuestState {
    /// WASI context serving the `wasi_snapshot_preview1` imports.
    pub(crate) wasi: WasiCtx,

    /// The current call's scratch state, or `None` between calls.
    pub(crate) invocation: Option<InvokeContext>,

    /// Handler for outbound `__host_call`s; `None` fails them with status 0.
    pub(crate) host_call: Option<HostCallHandler>,

    /// Sink for `__console_log` messages.
    pub(crate) logger: Option<Logger>,
}

impl GuestState {
    pub(crate) fn new(
        wasi: WasiCtx,
        host_call: Option<HostCallHandler>,
        logger: Option<Logger>,
    ) -> Self {
        Self {
            wasi,
            invocation: None,
            host_call,
            logger,
        }
    }
}

/// Scratch state of a single `invoke` call.
///
/// Single-writer: only the call that planted the context mutates it, either
/// directly or through the host imports it triggers.
#[derive(Debug, Default)]
pub(crate) struct InvokeContext {
    /// The operation name passed to `invoke`.
    pub(crate) operation: String,

    /// The request payload passed to `invoke`.
    pub(crate) guest_request: Vec<u8>,

    /// Response committed by the guest via `__guest_response`.
    pub(crate) guest_response: Option<Vec<u8>>,

    /// Error text committed by the guest via `__guest_error`.
    pub(crate) guest_error: Option<String>,

    /// Result of the most recent successful host call.
    pub(crate) host_response: Option<Vec<u8>>,

    /// Textualized error of the most recent failed host call.
    pub(crate) host_error: Option<String>,
}

impl InvokeContext {
    pub(crate) fn new(operation: &str, payload: &[u8]) -> Self {
        Self {
            operation: operation.to_string(),
            guest_request: payload.to_vec(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_context_has_only_the_request() {
        let ic = InvokeContext::new("echo", b"ping");

        assert_eq!(ic.operation, "echo");
        assert_eq!(ic.guest_request, b"ping");
        assert!(ic.guest_response.is_none());
        assert!(ic.guest_error.is_none());
        assert!(ic.host_response.is_none());
        assert!(ic.host_error.is_none());
    }
}
