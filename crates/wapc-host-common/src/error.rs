//! Error types for the waPC host runtime.
//!
//! All failures surfaced to callers are variants of [`WapcError`], built with
//! `thiserror`. Engine-level causes (compile errors, traps) are stringified
//! into the variant that identifies the phase they occurred in, so callers
//! can match on the phase without depending on a particular backend's error
//! type.

use thiserror::Error;

/// Errors surfaced by the waPC host runtime.
#[derive(Error, Debug)]
pub enum WapcError {
    /// The engine rejected the guest bytes at compile time.
    #[error("compilation failed: {reason}")]
    CompilationFailed {
        /// Description of the compile failure.
        reason: String,
    },

    /// Instantiating the compiled guest failed, including a failure while
    /// running one of the guest's start functions.
    #[error("instantiation failed: {reason}")]
    InstantiationFailed {
        /// Description of the instantiation failure.
        reason: String,
    },

    /// The guest does not export a function the protocol requires.
    #[error("instance {instance} did not export function {export}")]
    MissingExport {
        /// Name assigned to the instance that was being created.
        instance: String,
        /// The export that was not found.
        export: String,
    },

    /// An operation was attempted on a closed module or instance.
    #[error("{resource} is closed")]
    Closed {
        /// What was closed: `"module"` or `"instance"`.
        resource: String,
    },

    /// The engine failed while dispatching `__guest_call` (a trap, or a
    /// failed host import).
    #[error("error invoking guest operation {operation:?}: {reason}")]
    GuestCall {
        /// The operation that was being invoked.
        operation: String,
        /// Description of the engine failure.
        reason: String,
    },

    /// The guest reported a failure through `__guest_error`. The message is
    /// the guest's text, verbatim.
    #[error("{message}")]
    Guest {
        /// The guest-supplied error text.
        message: String,
    },

    /// `__guest_call` returned a non-success status without reporting an
    /// error message.
    #[error("call to {operation:?} was unsuccessful")]
    Unsuccessful {
        /// The operation that was invoked.
        operation: String,
    },

    /// Registering the waPC host import module failed.
    #[error("host module registration failed: {reason}")]
    HostModule {
        /// Description of the registration failure.
        reason: String,
    },

    /// The runtime factory could not produce a usable engine runtime.
    #[error("runtime construction failed: {reason}")]
    Runtime {
        /// Description of the construction failure.
        reason: String,
    },
}

impl WapcError {
    /// Create a new `CompilationFailed` error.
    pub fn compilation_failed(reason: impl Into<String>) -> Self {
        Self::CompilationFailed {
            reason: reason.into(),
        }
    }

    /// Create a new `InstantiationFailed` error.
    pub fn instantiation_failed(reason: impl Into<String>) -> Self {
        Self::InstantiationFailed {
            reason: reason.into(),
        }
    }

    /// Create a new `MissingExport` error.
    pub fn missing_export(instance: impl Into<String>, export: impl Into<String>) -> Self {
        Self::MissingExport {
            instance: instance.into(),
            export: export.into(),
        }
    }

    /// Create a new `Closed` error.
    pub fn closed(resource: impl Into<String>) -> Self {
        Self::Closed {
            resource: resource.into(),
        }
    }

    /// Create a new `GuestCall` error.
    pub fn guest_call(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::GuestCall {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Create a new `Guest` error carrying the guest's message verbatim.
    pub fn guest(message: impl Into<String>) -> Self {
        Self::Guest {
            message: message.into(),
        }
    }

    /// Create a new `Unsuccessful` error.
    pub fn unsuccessful(operation: impl Into<String>) -> Self {
        Self::Unsuccessful {
            operation: operation.into(),
        }
    }

    /// Create a new `HostModule` error.
    pub fn host_module(reason: impl Into<String>) -> Self {
        Self::HostModule {
            reason: reason.into(),
        }
    }

    /// Create a new `Runtime` error.
    pub fn runtime(reason: impl Into<String>) -> Self {
        Self::Runtime {
            reason: reason.into(),
        }
    }

    /// Returns `true` if the error came from using a closed module or
    /// instance.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed { .. })
    }

    /// Returns `true` if the error carries a message the guest reported
    /// through `__guest_error`.
    pub fn is_guest_error(&self) -> bool {
        matches!(self, Self::Guest { .. })
    }

    /// Returns `true` if the error indicates a missing guest export.
    pub fn is_missing_export(&self) -> bool {
        matches!(self, Self::MissingExport { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = WapcError::compilation_failed("bad magic number");
        assert_eq!(err.to_string(), "compilation failed: bad magic number");

        let err = WapcError::missing_export("1", "__guest_call");
        assert_eq!(
            err.to_string(),
            "instance 1 did not export function __guest_call"
        );

        let err = WapcError::unsuccessful("echo");
        assert_eq!(err.to_string(), "call to \"echo\" was unsuccessful");
    }

    #[test]
    fn test_guest_error_verbatim() {
        // The guest's text must round-trip without decoration.
        let err = WapcError::guest("bad input");
        assert_eq!(err.to_string(), "bad input");
        assert!(err.is_guest_error());
    }

    #[test]
    fn test_closed() {
        let err = WapcError::closed("module");
        assert_eq!(err.to_string(), "module is closed");
        assert!(err.is_closed());
        assert!(!WapcError::unsuccessful("x").is_closed());
    }

    #[test]
    fn test_is_missing_export() {
        assert!(WapcError::missing_export("2", "__guest_call").is_missing_export());
        assert!(!WapcError::closed("instance").is_missing_export());
    }
}
