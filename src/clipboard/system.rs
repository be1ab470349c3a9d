//! Portable clipboard text access through `arboard`.

use arboard::Clipboard;

use crate::clipboard::ClipboardAccess;
use crate::error::{ClipboardError, Result};

pub(crate) fn map_arboard_error(e: arboard::Error) -> ClipboardError {
    match e {
        arboard::Error::ContentNotAvailable => ClipboardError::UnsupportedContent,
        arboard::Error::ConversionFailure => ClipboardError::UnsupportedContent,
        other => ClipboardError::Access(other.to_string()),
    }
}

/// `arboard`-backed clipboard. The handle is opened lazily and reopened after
/// a failure, so a transient error does not poison later reads.
#[derive(Default)]
pub struct SystemClipboard {
    inner: Option<Clipboard>,
}

impl SystemClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&mut self) -> Result<&mut Clipboard> {
        if self.inner.is_none() {
            let clipboard = Clipboard::new().map_err(map_arboard_error)?;
            self.inner = Some(clipboard);
        }
        self.inner
            .as_mut()
            .ok_or_else(|| ClipboardError::Unavailable("clipboard handle missing".into()))
    }

    fn reset_on_access_error<T>(&mut self, result: Result<T>) -> Result<T> {
        if matches!(result, Err(ClipboardError::Access(_))) {
            self.inner = None;
        }
        result
    }
}

impl ClipboardAccess for SystemClipboard {
    fn read_text(&mut self) -> Result<String> {
        let result = self
            .handle()
            .and_then(|cb| cb.get_text().map_err(map_arboard_error));
        self.reset_on_access_error(result)
    }

    fn write_text(&mut self, text: &str) -> Result<()> {
        let result = self
            .handle()
            .and_then(|cb| cb.set_text(text).map_err(map_arboard_error));
        self.reset_on_access_error(result)
    }
}
