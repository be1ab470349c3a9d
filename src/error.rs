use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClipboardError {
    /// The OS refused access, or another process holds the clipboard open.
    #[error("clipboard access failed: {0}")]
    Access(String),

    /// The clipboard holds something other than text (or nothing at all).
    #[error("clipboard content is not text")]
    UnsupportedContent,

    #[cfg(target_os = "windows")]
    #[error("failed to lock global memory")]
    GlobalLockFailed,

    #[cfg(target_os = "windows")]
    #[error("failed to register clipboard listener: {0}")]
    ListenerRegistrationFailed(windows::core::Error),

    #[cfg(target_os = "windows")]
    #[error("failed to create hidden window: {0}")]
    WindowCreationFailed(windows::core::Error),

    #[cfg(target_os = "windows")]
    #[error("windows API error: {0}")]
    Windows(#[from] windows::core::Error),

    #[error("clipboard notifier stopped before it was ready")]
    NotifierStopped,

    #[error("clipboard backend unavailable: {0}")]
    Unavailable(String),
}

impl ClipboardError {
    /// Whether this error only means "nothing to transform" rather than a failure.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::UnsupportedContent)
    }
}

pub type Result<T> = std::result::Result<T, ClipboardError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("clipboard error: {0}")]
    Clipboard(#[from] ClipboardError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("startup failed: {0}")]
    Setup(String),
}
