//! Clipboard access for copy-on-click.

use std::cell::RefCell;
use std::rc::Rc;

use clipboard_rs::{Clipboard, ClipboardContext};
use thiserror::Error;
use tracing::trace;

/// Errors from clipboard writes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClipboardError {
    /// The clipboard could not be opened.
    #[error("clipboard access failed: {0}")]
    AccessFailed(String),

    /// The write was rejected.
    #[error("clipboard write failed: {0}")]
    WriteFailed(String),
}

/// Result type for clipboard operations.
pub type Result<T> = std::result::Result<T, ClipboardError>;

/// Destination for copied values.
///
/// `write_text` is the direct path. `exec_copy` is the legacy path: it
/// copies whatever text is currently selected in the document, which the
/// engine arranges through a temporary hidden textarea.
pub trait ClipboardWriter {
    /// Write text directly.
    ///
    /// # Errors
    ///
    /// Returns an error if the clipboard rejects the write.
    fn write_text(&mut self, text: &str) -> Result<()>;

    /// Copy the current selection.
    ///
    /// # Errors
    ///
    /// Returns an error if the copy command fails.
    fn exec_copy(&mut self, selected: &str) -> Result<()>;
}

/// The system clipboard.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClipboard;

impl SystemClipboard {
    /// Create a handle to the system clipboard.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn set(text: &str) -> Result<()> {
        let ctx =
            ClipboardContext::new().map_err(|e| ClipboardError::AccessFailed(e.to_string()))?;
        ctx.set_text(text.to_string())
            .map_err(|e| ClipboardError::WriteFailed(e.to_string()))?;
        trace!(len = text.len(), "Wrote to system clipboard");
        Ok(())
    }
}

impl ClipboardWriter for SystemClipboard {
    fn write_text(&mut self, text: &str) -> Result<()> {
        Self::set(text)
    }

    fn exec_copy(&mut self, selected: &str) -> Result<()> {
        Self::set(selected)
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    contents: Option<String>,
    fail_write: bool,
    fail_exec: bool,
    exec_calls: usize,
}

/// An in-memory clipboard.
///
/// Clones share contents, so a host can keep one handle while the engine
/// owns another. Either path can be made to fail.
#[derive(Debug, Default, Clone)]
pub struct MemoryClipboard {
    state: Rc<RefCell<MemoryState>>,
}

impl MemoryClipboard {
    /// Create an empty clipboard.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The last copied text.
    #[must_use]
    pub fn contents(&self) -> Option<String> {
        self.state.borrow().contents.clone()
    }

    /// Make direct writes fail.
    pub fn fail_writes(&self, fail: bool) {
        self.state.borrow_mut().fail_write = fail;
    }

    /// Make the legacy copy command fail.
    pub fn fail_exec_copy(&self, fail: bool) {
        self.state.borrow_mut().fail_exec = fail;
    }

    /// Number of times the legacy path was used.
    #[must_use]
    pub fn exec_copy_calls(&self) -> usize {
        self.state.borrow().exec_calls
    }
}

impl ClipboardWriter for MemoryClipboard {
    fn write_text(&mut self, text: &str) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.fail_write {
            return Err(ClipboardError::WriteFailed("write denied".to_string()));
        }
        state.contents = Some(text.to_string());
        Ok(())
    }

    fn exec_copy(&mut self, selected: &str) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.exec_calls += 1;
        if state.fail_exec {
            return Err(ClipboardError::WriteFailed("copy command failed".to_string()));
        }
        state.contents = Some(selected.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_clipboard_write() {
        let mut clipboard = MemoryClipboard::new();
        assert_eq!(clipboard.contents(), None);

        clipboard.write_text("secret").unwrap();
        assert_eq!(clipboard.contents(), Some("secret".to_string()));
    }

    #[test]
    fn test_memory_clipboard_clones_share_contents() {
        let host = MemoryClipboard::new();
        let mut engine_side = host.clone();

        engine_side.write_text("shared").unwrap();
        assert_eq!(host.contents(), Some("shared".to_string()));
    }

    #[test]
    fn test_memory_clipboard_failures() {
        let mut clipboard = MemoryClipboard::new();
        clipboard.fail_writes(true);
        assert!(matches!(
            clipboard.write_text("x"),
            Err(ClipboardError::WriteFailed(_))
        ));

        clipboard.exec_copy("x").unwrap();
        assert_eq!(clipboard.exec_copy_calls(), 1);
        assert_eq!(clipboard.contents(), Some("x".to_string()));

        clipboard.fail_exec_copy(true);
        assert!(clipboard.exec_copy("y").is_err());
        assert_eq!(clipboard.contents(), Some("x".to_string()));
    }
}
