//! Module configuration.
//!
//! [`ModuleConfig`] is supplied once when a module is created and controls the
//! I/O wiring of every instance spawned from it:
//! - `stdout` / `stderr`: byte sinks the engine's WASI plumbing writes to
//! - `logger`: text sink consulted by the `__console_log` host import
//!
//! All three are optional; an absent sink discards the output.

use std::fmt;
use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;

/// A shared byte sink for a guest's stdout or stderr stream.
///
/// The sink is shared because every instance of a module writes to the same
/// destination, potentially from different threads.
pub type OutputSink = Arc<Mutex<dyn Write + Send>>;

/// A text sink for messages the guest emits through `__console_log`.
pub type Logger = Arc<dyn Fn(&str) + Send + Sync>;

/// Configuration applied to every instance of a module.
#[derive(Clone, Default)]
pub struct ModuleConfig {
    /// Byte sink for the guest's stdout, or `None` to discard.
    pub stdout: Option<OutputSink>,

    /// Byte sink for the guest's stderr, or `None` to discard.
    pub stderr: Option<OutputSink>,

    /// Text sink for `__console_log` messages, or `None` to drop them.
    pub logger: Option<Logger>,
}

impl ModuleConfig {
    /// Create a configuration with no sinks: stdio is discarded and console
    /// logs are dropped.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wire the guest's stdout to the given sink.
    pub fn with_stdout(mut self, sink: OutputSink) -> Self {
        self.stdout = Some(sink);
        self
    }

    /// Wire the guest's stderr to the given sink.
    pub fn with_stderr(mut self, sink: OutputSink) -> Self {
        self.stderr = Some(sink);
        self
    }

    /// Deliver `__console_log` messages to the given callback.
    pub fn with_logger(mut self, logger: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.logger = Some(Arc::new(logger));
        self
    }
}

impl fmt::Debug for ModuleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleConfig")
            .field("stdout", &self.stdout.is_some())
            .field("stderr", &self.stderr.is_some())
            .field("logger", &self.logger.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_empty() {
        let config = ModuleConfig::new();

        assert!(config.stdout.is_none());
        assert!(config.stderr.is_none());
        assert!(config.logger.is_none());
    }

    #[test]
    fn test_builder() {
        let out: OutputSink = Arc::new(Mutex::new(Vec::<u8>::new()));
        let config = ModuleConfig::new()
            .with_stdout(out)
            .with_logger(|_msg| {});

        assert!(config.stdout.is_some());
        assert!(config.stderr.is_none());
        assert!(config.logger.is_some());
    }

    #[test]
    fn test_sink_is_shared() {
        let buf: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
        let sink: OutputSink = buf.clone();

        sink.lock().write_all(b"hi").unwrap();
        assert_eq!(&*buf.lock(), b"hi");
    }

    #[test]
    fn test_debug_hides_sinks() {
        let config = ModuleConfig::new().with_logger(|_| {});
        let debug_str = format!("{config:?}");

        assert!(debug_str.contains("ModuleConfig"));
        assert!(debug_str.contains("logger: true"));
        assert!(debug_str.contains("stdout: false"));
    }
}
