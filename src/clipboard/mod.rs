#[cfg(target_os = "windows")]
pub mod native;
pub mod poll;
pub mod system;
#[cfg(target_os = "windows")]
mod window;

use std::fmt;
use std::sync::mpsc::Sender;
use std::thread::JoinHandle;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::Result;

/// Notification that the clipboard content changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeEvent {
    /// OS clipboard sequence number, where the platform exposes one.
    pub sequence: Option<u32>,
}

/// Messages consumed by the watcher loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEvent {
    Changed(ChangeEvent),
    Shutdown,
}

/// Read/write access to the clipboard text.
pub trait ClipboardAccess {
    /// Current clipboard text. Non-text content is `ClipboardError::UnsupportedContent`.
    fn read_text(&mut self) -> Result<String>;

    fn write_text(&mut self, text: &str) -> Result<()>;
}

impl<C: ClipboardAccess + ?Sized> ClipboardAccess for Box<C> {
    fn read_text(&mut self) -> Result<String> {
        (**self).read_text()
    }

    fn write_text(&mut self, text: &str) -> Result<()> {
        (**self).write_text(text)
    }
}

/// Source of clipboard change notifications.
pub trait ChangeNotifier {
    /// Start delivering one `WatchEvent::Changed` on `tx` per clipboard update.
    ///
    /// Events are produced on a background thread; the returned handle
    /// deregisters the hook when dropped.
    fn register(self: Box<Self>, tx: Sender<WatchEvent>) -> Result<Registration>;
}

/// Handle to a live notifier registration.
pub struct Registration {
    stop: Option<Box<dyn FnOnce() + Send>>,
    thread: Option<JoinHandle<()>>,
}

impl Registration {
    /// `stop` must make `thread` (if any) return promptly.
    pub fn new(stop: impl FnOnce() + Send + 'static, thread: Option<JoinHandle<()>>) -> Self {
        Self {
            stop: Some(Box::new(stop)),
            thread,
        }
    }

    pub fn is_active(&self) -> bool {
        self.stop.is_some()
    }

    /// Remove the OS hook and wait for the notifier thread. Safe to call twice.
    pub fn unregister(&mut self) {
        if let Some(stop) = self.stop.take() {
            stop();
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("clipboard notifier thread panicked");
            }
        }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.unregister();
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("active", &self.is_active())
            .finish()
    }
}

/// SHA-256 of the snapshot text, used to recognise repeat notifications.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"text:");
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// How clipboard changes are detected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Native push notifications where available, polling elsewhere.
    #[default]
    Auto,
    /// OS change notifications (Windows clipboard format listener).
    Native,
    /// Periodically compare the clipboard text.
    Poll,
}

impl Backend {
    /// The backend that will actually run on this platform.
    pub fn resolve(self) -> Backend {
        match self {
            Backend::Poll => Backend::Poll,
            Backend::Auto | Backend::Native if cfg!(target_os = "windows") => Backend::Native,
            Backend::Native => {
                tracing::warn!("native clipboard notifications unavailable here, polling instead");
                Backend::Poll
            }
            Backend::Auto => Backend::Poll,
        }
    }
}

/// Clipboard access plus the matching change notifier for `backend`.
pub fn open_backend(
    backend: Backend,
    poll_interval: Duration,
) -> (Box<dyn ClipboardAccess>, Box<dyn ChangeNotifier>) {
    match backend.resolve() {
        #[cfg(target_os = "windows")]
        Backend::Native => (
            Box::new(native::NativeClipboard),
            Box::new(native::NativeNotifier),
        ),
        _ => (
            Box::new(system::SystemClipboard::new()),
            Box::new(poll::PollNotifier::new(
                system::SystemClipboard::new,
                poll_interval,
            )),
        ),
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Backend::Auto => "auto",
            Backend::Native => "native",
            Backend::Poll => "poll",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn unregister_runs_stop_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut registration = Registration::new(
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
            },
            None,
        );
        assert!(registration.is_active());
        registration.unregister();
        registration.unregister();
        drop(registration);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn hash_distinguishes_content() {
        assert_eq!(content_hash("1\t2"), content_hash("1\t2"));
        assert_ne!(content_hash("1\t2"), content_hash("1\n2"));
    }

    #[test]
    fn poll_backend_resolves_to_itself() {
        assert_eq!(Backend::Poll.resolve(), Backend::Poll);
        assert_eq!(Backend::Poll.to_string(), "poll");
    }
}
