//! The waPC host import module.
//!
//! Registers module `"wapc"` with the nine exports the protocol requires.
//! Each export is a stateless function: its only side effect is reading or
//! mutating the current invocation context through linear-memory transfers.
//! When no invocation context is bound (the guest is running a start
//! function, or probing the host module) every export is inert: writes are
//! skipped and the `i32`-returning exports yield 0.
//!
//! The exports are registered by explicit enumeration rather than any
//! reflective scheme, so the guest-visible signatures stay audit-visible in
//! one place.

use wapc_host_common::WapcError;
use wasmtime::{Caller, Error, Extern, Linker, Memory};

use crate::memory;
use crate::store::GuestState;

/// Name of the host import module the guest links against.
const HOST_MODULE: &str = "wapc";

/// Register the `wapc` host module on the linker.
pub(crate) fn register_wapc_host(linker: &mut Linker<GuestState>) -> Result<(), WapcError> {
    linker
        .func_wrap(HOST_MODULE, "__host_call", host_call)
        .and_then(|l| l.func_wrap(HOST_MODULE, "__console_log", console_log))
        .and_then(|l| l.func_wrap(HOST_MODULE, "__guest_request", guest_request))
        .and_then(|l| l.func_wrap(HOST_MODULE, "__host_response", host_response))
        .and_then(|l| l.func_wrap(HOST_MODULE, "__host_response_len", host_response_len))
        .and_then(|l| l.func_wrap(HOST_MODULE, "__guest_response", guest_response))
        .and_then(|l| l.func_wrap(HOST_MODULE, "__guest_error", guest_error))
        .and_then(|l| l.func_wrap(HOST_MODULE, "__host_error", host_error))
        .and_then(|l| l.func_wrap(HOST_MODULE, "__host_error_len", host_error_len))
        .map_err(|e| WapcError::host_module(format!("{e}")))?;
    Ok(())
}

/// `__host_call`: read the binding, namespace, operation, and payload from
/// guest memory and run the configured host call handler.
///
/// Returns 1 and stores the response on success; returns 0 and stores the
/// error on failure. Returns 0 without side effects when no invocation
/// context is bound or no handler is configured.
#[allow(clippy::too_many_arguments)]
fn host_call(
    mut caller: Caller<'_, GuestState>,
    bind_ptr: u32,
    bind_len: u32,
    ns_ptr: u32,
    ns_len: u32,
    cmd_ptr: u32,
    cmd_len: u32,
    payload_ptr: u32,
    payload_len: u32,
) -> Result<u32, Error> {
    let handler = match (&caller.data().invocation, &caller.data().host_call) {
        (Some(_), Some(handler)) => handler.clone(),
        _ => return Ok(0),
    };

    let mem = guest_memory(&mut caller)?;
    let data = mem.data(&caller);
    let binding = memory::read_string(data, "binding", bind_ptr, bind_len)?;
    let namespace = memory::read_string(data, "namespace", ns_ptr, ns_len)?;
    let operation = memory::read_string(data, "operation", cmd_ptr, cmd_len)?;
    let payload = memory::read(data, "payload", payload_ptr, payload_len)?;

    let result = handler(&binding, &namespace, &operation, &payload);

    if let Some(ic) = caller.data_mut().invocation.as_mut() {
        return match result {
            Ok(response) => {
                ic.host_response = Some(response);
                ic.host_error = None;
                Ok(1)
            }
            Err(e) => {
                ic.host_response = None;
                ic.host_error = Some(e.to_string());
                Ok(0)
            }
        };
    }
    Ok(0)
}

/// `__console_log`: deliver the guest's message to the configured logger.
/// Works with or without an invocation context.
fn console_log(mut caller: Caller<'_, GuestState>, ptr: u32, len: u32) -> Result<(), Error> {
    let logger = match &caller.data().logger {
        Some(logger) => logger.clone(),
        None => return Ok(()),
    };

    let mem = guest_memory(&mut caller)?;
    let msg = memory::read_string(mem.data(&caller), "msg", ptr, len)?;
    logger(&msg);
    Ok(())
}

/// `__guest_request`: write the current operation name at `op_ptr` and the
/// request payload at `ptr`. Empty fields are not written.
fn guest_request(mut caller: Caller<'_, GuestState>, op_ptr: u32, ptr: u32) -> Result<(), Error> {
    if caller.data().invocation.is_none() {
        return Ok(());
    }

    let mem = guest_memory(&mut caller)?;
    let (data, state) = mem.data_and_store_mut(&mut caller);
    let Some(ic) = state.invocation.as_ref() else {
        return Ok(());
    };

    if !ic.operation.is_empty() {
        memory::write(data, "operation", op_ptr, ic.operation.as_bytes())?;
    }
    if !ic.guest_request.is_empty() {
        memory::write(data, "guestReq", ptr, &ic.guest_request)?;
    }
    Ok(())
}

/// `__host_response`: write the stored host call response at `ptr`.
fn host_response(mut caller: Caller<'_, GuestState>, ptr: u32) -> Result<(), Error> {
    if caller.data().invocation.is_none() {
        return Ok(());
    }

    let mem = guest_memory(&mut caller)?;
    let (data, state) = mem.data_and_store_mut(&mut caller);

    if let Some(response) = state
        .invocation
        .as_ref()
        .and_then(|ic| ic.host_response.as_ref())
    {
        memory::write(data, "hostResp", ptr, response)?;
    }
    Ok(())
}

/// `__host_response_len`: length of the stored host call response, or 0.
fn host_response_len(caller: Caller<'_, GuestState>) -> u32 {
    caller
        .data()
        .invocation
        .as_ref()
        .and_then(|ic| ic.host_response.as_ref())
        .map(|response| response.len() as u32)
        .unwrap_or(0)
}

/// `__guest_response`: read `len` bytes at `ptr` and store them as the
/// call's response, replacing any prior value.
fn guest_response(mut caller: Caller<'_, GuestState>, ptr: u32, len: u32) -> Result<(), Error> {
    if caller.data().invocation.is_none() {
        return Ok(());
    }

    let mem = guest_memory(&mut caller)?;
    let bytes = memory::read(mem.data(&caller), "guestResp", ptr, len)?;
    if let Some(ic) = caller.data_mut().invocation.as_mut() {
        ic.guest_response = Some(bytes);
    }
    Ok(())
}

/// `__guest_error`: read `len` bytes at `ptr` and store them as the call's
/// error text.
fn guest_error(mut caller: Caller<'_, GuestState>, ptr: u32, len: u32) -> Result<(), Error> {
    if caller.data().invocation.is_none() {
        return Ok(());
    }

    let mem = guest_memory(&mut caller)?;
    let text = memory::read_string(mem.data(&caller), "guestErr", ptr, len)?;
    if let Some(ic) = caller.data_mut().invocation.as_mut() {
        ic.guest_error = Some(text);
    }
    Ok(())
}

/// `__host_error`: write the textualized host call error at `ptr`.
fn host_error(mut caller: Caller<'_, GuestState>, ptr: u32) -> Result<(), Error> {
    if caller.data().invocation.is_none() {
        return Ok(());
    }

    let mem = guest_memory(&mut caller)?;
    let (data, state) = mem.data_and_store_mut(&mut caller);

    if let Some(text) = state
        .invocation
        .as_ref()
        .and_then(|ic| ic.host_error.as_ref())
    {
        memory::write(data, "hostErr", ptr, text.as_bytes())?;
    }
    Ok(())
}

/// `__host_error_len`: byte length of the textualized host call error, or 0.
fn host_error_len(caller: Caller<'_, GuestState>) -> u32 {
    caller
        .data()
        .invocation
        .as_ref()
        .and_then(|ic| ic.host_error.as_ref())
        .map(|text| text.len() as u32)
        .unwrap_or(0)
}

fn guest_memory(caller: &mut Caller<'_, GuestState>) -> Result<Memory, Error> {
    caller
        .get_export("memory")
        .and_then(Extern::into_memory)
        .ok_or_else(|| Error::msg("guest does not export its linear memory"))
}
