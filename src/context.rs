//! Explicit logging context for a run
//!
//! This module provides:
//! - `LogContext`: the warnings sink and verbosity level passed into every
//!   entry point of the core
//! - Scoped overrides (`scoped_verbosity`, `scoped_warnings`) whose guards
//!   restore the previous state on drop
//! - `SharedBuffer`: an in-memory writer for capturing warnings
//!
//! Two runs with separate contexts never share logging state.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, warn};

/// Output verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Verbosity {
    /// Only errors
    Quiet,
    /// Warnings and results
    #[default]
    Normal,
    /// Additional progress detail
    Verbose,
    /// Everything, including per-command traces
    Trace,
}

type Sink = Box<dyn Write + Send>;

struct Inner {
    warnings: Mutex<Sink>,
    verbosity: RwLock<Verbosity>,
}

/// Logging state shared by the workers of one run
#[derive(Clone)]
pub struct LogContext {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for LogContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogContext")
            .field("verbosity", &self.verbosity())
            .finish_non_exhaustive()
    }
}

impl LogContext {
    /// Create a context writing warnings to `writer`
    pub fn new(writer: impl Write + Send + 'static, verbosity: Verbosity) -> Self {
        Self {
            inner: Arc::new(Inner {
                warnings: Mutex::new(Box::new(writer)),
                verbosity: RwLock::new(verbosity),
            }),
        }
    }

    /// Context writing warnings to stderr
    pub fn stderr(verbosity: Verbosity) -> Self {
        Self::new(io::stderr(), verbosity)
    }

    /// Context that discards all warnings
    pub fn silent() -> Self {
        Self::new(io::sink(), Verbosity::Quiet)
    }

    /// Current verbosity level
    pub fn verbosity(&self) -> Verbosity {
        *self
            .inner
            .verbosity
            .read()
            .unwrap_or_else(|e| e.into_inner())
    }

    /// Returns true at verbose level or above
    pub fn is_verbose(&self) -> bool {
        self.verbosity() >= Verbosity::Verbose
    }

    /// Returns true at trace level
    pub fn is_trace(&self) -> bool {
        self.verbosity() >= Verbosity::Trace
    }

    /// Emit a user-facing warning
    pub fn warn(&self, message: &str) {
        warn!("{}", message);
        if self.verbosity() == Verbosity::Quiet {
            return;
        }
        self.write_line(&format!("Warning: {}", message));
    }

    /// Emit a message shown only in verbose mode
    pub fn verbose(&self, message: &str) {
        debug!("{}", message);
        if self.is_verbose() {
            self.write_line(message);
        }
    }

    fn write_line(&self, line: &str) {
        let mut sink = self
            .inner
            .warnings
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        // A broken sink must not fail the run
        let _ = writeln!(sink, "{}", line);
        let _ = sink.flush();
    }

    /// Temporarily change the verbosity level
    pub fn scoped_verbosity(&self, level: Verbosity) -> VerbosityGuard<'_> {
        let mut current = self
            .inner
            .verbosity
            .write()
            .unwrap_or_else(|e| e.into_inner());
        let previous = std::mem::replace(&mut *current, level);
        VerbosityGuard {
            context: self,
            previous,
        }
    }

    /// Temporarily redirect warnings to another writer
    pub fn scoped_warnings(&self, writer: impl Write + Send + 'static) -> WarningsGuard<'_> {
        let mut sink = self
            .inner
            .warnings
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        let previous = std::mem::replace(&mut *sink, Box::new(writer));
        WarningsGuard {
            context: self,
            previous: Some(previous),
        }
    }
}

impl Default for LogContext {
    fn default() -> Self {
        Self::stderr(Verbosity::Normal)
    }
}

/// Restores the previous verbosity on drop
#[must_use = "the previous verbosity is restored when the guard is dropped"]
pub struct VerbosityGuard<'a> {
    context: &'a LogContext,
    previous: Verbosity,
}

impl Drop for VerbosityGuard<'_> {
    fn drop(&mut self) {
        let mut current = self
            .context
            .inner
            .verbosity
            .write()
            .unwrap_or_else(|e| e.into_inner());
        *current = self.previous;
    }
}

/// Restores the previous warnings writer on drop
#[must_use = "the previous writer is restored when the guard is dropped"]
pub struct WarningsGuard<'a> {
    context: &'a LogContext,
    previous: Option<Sink>,
}

impl Drop for WarningsGuard<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            let mut sink = self
                .context
                .inner
                .warnings
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            let _ = sink.flush();
            *sink = previous;
        }
    }
}

/// Cloneable in-memory writer
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Captured text
    pub fn contents(&self) -> String {
        let bytes = self.bytes.lock().unwrap_or_else(|e| e.into_inner());
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut bytes = self.bytes.lock().unwrap_or_else(|e| e.into_inner());
        bytes.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warn_writes_to_sink() {
        let buffer = SharedBuffer::new();
        let ctx = LogContext::new(buffer.clone(), Verbosity::Normal);
        ctx.warn("invalid exclusion pattern");
        assert!(buffer
            .contents()
            .contains("Warning: invalid exclusion pattern"));
    }

    #[test]
    fn test_quiet_suppresses_warnings() {
        let buffer = SharedBuffer::new();
        let ctx = LogContext::new(buffer.clone(), Verbosity::Quiet);
        ctx.warn("hidden");
        assert!(buffer.contents().is_empty());
    }

    #[test]
    fn test_verbose_messages_need_verbose_level() {
        let buffer = SharedBuffer::new();
        let ctx = LogContext::new(buffer.clone(), Verbosity::Normal);
        ctx.verbose("detail");
        assert!(buffer.contents().is_empty());

        let _guard = ctx.scoped_verbosity(Verbosity::Verbose);
        ctx.verbose("detail");
        assert!(buffer.contents().contains("detail"));
    }

    #[test]
    fn test_scoped_verbosity_restores() {
        let ctx = LogContext::new(io::sink(), Verbosity::Normal);
        {
            let _guard = ctx.scoped_verbosity(Verbosity::Trace);
            assert!(ctx.is_trace());
        }
        assert_eq!(ctx.verbosity(), Verbosity::Normal);
    }

    #[test]
    fn test_scoped_verbosity_restores_on_panic() {
        let ctx = LogContext::new(io::sink(), Verbosity::Normal);
        let cloned = ctx.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = cloned.scoped_verbosity(Verbosity::Quiet);
            panic!("boom");
        }));
        assert!(result.is_err());
        assert_eq!(ctx.verbosity(), Verbosity::Normal);
    }

    #[test]
    fn test_scoped_warnings_redirects_and_restores() {
        let outer = SharedBuffer::new();
        let inner = SharedBuffer::new();
        let ctx = LogContext::new(outer.clone(), Verbosity::Normal);
        {
            let _guard = ctx.scoped_warnings(inner.clone());
            ctx.warn("inside");
        }
        ctx.warn("outside");
        assert!(inner.contents().contains("inside"));
        assert!(!inner.contents().contains("outside"));
        assert!(outer.contents().contains("outside"));
        assert!(!outer.contents().contains("inside"));
    }

    #[test]
    fn test_separate_contexts_do_not_interfere() {
        let a = LogContext::new(io::sink(), Verbosity::Normal);
        let b = LogContext::new(io::sink(), Verbosity::Normal);
        let _guard = a.scoped_verbosity(Verbosity::Trace);
        assert!(a.is_trace());
        assert_eq!(b.verbosity(), Verbosity::Normal);
    }
}
