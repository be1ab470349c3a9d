//! The clipboard transform watcher.
//!
//! Change notifications arrive on a channel and are handled one at a time on
//! the thread that called [`Watcher::start`]. The only state carried between
//! notifications is the last text this watcher wrote and the digest of the
//! last snapshot it saw.

use std::sync::mpsc::{self, Receiver, Sender};

use crate::clipboard::{ChangeNotifier, ClipboardAccess, Registration, WatchEvent, content_hash};
use crate::error::{ClipboardError, Result};
use crate::transform::{self, TransformOptions};

/// What a single change notification led to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The clipboard was rewritten with this many values.
    Transformed { cells: usize },
    /// Nothing on the clipboard.
    Empty,
    /// The change was our own write.
    SelfWrite,
    /// Same snapshot as the previous notification.
    Duplicate,
    /// No tab delimiters, nothing to flatten.
    AlreadyColumnar,
    /// Transform produced the input unchanged or nothing at all.
    Unchanged,
    /// Clipboard held something other than text.
    Unsupported,
    /// Clipboard could not be read or written; the change was dropped.
    Dropped(String),
}

/// Cloneable handle that makes [`Watcher::start`] return.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Sender<WatchEvent>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        // The watcher is gone already if this fails
        let _ = self.tx.send(WatchEvent::Shutdown);
    }
}

type Observer = Box<dyn FnMut(&Outcome)>;

pub struct Watcher<C> {
    clipboard: C,
    observer: Option<Observer>,
    options: TransformOptions,
    last_written: Option<String>,
    last_seen: Option<String>,
    writes: u64,
    tx: Sender<WatchEvent>,
    rx: Receiver<WatchEvent>,
    registration: Option<Registration>,
}

impl<C: ClipboardAccess> Watcher<C> {
    pub fn new(clipboard: C, options: TransformOptions) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            clipboard,
            observer: None,
            options,
            last_written: None,
            last_seen: None,
            writes: 0,
            tx,
            rx,
            registration: None,
        }
    }

    /// Call `observer` with the outcome of every notification handled by `start`.
    pub fn with_observer(mut self, observer: impl FnMut(&Outcome) + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.tx.clone(),
        }
    }

    /// Number of clipboard writes performed so far.
    pub fn writes(&self) -> u64 {
        self.writes
    }

    pub fn is_registered(&self) -> bool {
        self.registration.is_some()
    }

    /// Register `notifier` and handle change events until shut down.
    pub fn start(&mut self, notifier: Box<dyn ChangeNotifier>) -> Result<()> {
        if self.registration.is_some() {
            tracing::warn!("watcher already started");
            return Ok(());
        }
        self.registration = Some(notifier.register(self.tx.clone())?);
        tracing::info!("clipboard watcher started");

        // The watcher holds a sender itself, so the channel stays open until shutdown.
        while let Ok(event) = self.rx.recv() {
            match event {
                WatchEvent::Changed(change) => {
                    tracing::debug!(sequence = ?change.sequence, "clipboard changed");
                    let outcome = self.handle_change();
                    if let Some(observer) = self.observer.as_mut() {
                        observer(&outcome);
                    }
                }
                WatchEvent::Shutdown => break,
            }
        }

        self.stop();
        tracing::info!(writes = self.writes, "clipboard watcher stopped");
        Ok(())
    }

    /// Deregister the notifier. Does nothing when not registered.
    pub fn stop(&mut self) {
        if let Some(mut registration) = self.registration.take() {
            registration.unregister();
        }
    }

    /// Process whatever is on the clipboard right now, once.
    pub fn run_once(&mut self) -> Outcome {
        self.handle_change()
    }

    /// Read the clipboard and feed it through [`Watcher::on_change`].
    pub fn handle_change(&mut self) -> Outcome {
        match self.clipboard.read_text() {
            Ok(content) => self.on_change(&content),
            Err(ClipboardError::UnsupportedContent) => {
                tracing::debug!("clipboard: skipping non-text content");
                // Whatever text comes next is a new snapshot
                self.last_seen = None;
                Outcome::Unsupported
            }
            Err(e) => {
                tracing::warn!("clipboard read failed, change dropped: {e}");
                Outcome::Dropped(e.to_string())
            }
        }
    }

    /// Decide what to do with one snapshot, writing back at most once.
    pub fn on_change(&mut self, content: &str) -> Outcome {
        if content.is_empty() {
            return Outcome::Empty;
        }

        if self.last_written.as_deref() == Some(content) {
            tracing::debug!("clipboard: skipping self-initiated write");
            return Outcome::SelfWrite;
        }

        let hash = content_hash(content);
        if self.last_seen.as_deref() == Some(hash.as_str()) {
            tracing::debug!("clipboard: skipping duplicate content (same hash)");
            return Outcome::Duplicate;
        }
        self.last_seen = Some(hash);

        if !transform::qualifies(content, self.options) {
            return Outcome::AlreadyColumnar;
        }

        let converted = transform::to_column(content, self.options);
        if converted.is_empty() || converted == content {
            return Outcome::Unchanged;
        }

        let cells = converted.split('\n').count();
        match self.clipboard.write_text(&converted) {
            Ok(()) => {
                // Our write fires the next notification; it must be recognised as ours.
                self.last_seen = Some(content_hash(&converted));
                self.last_written = Some(converted);
                self.writes += 1;
                tracing::info!(cells, "clipboard converted to one value per line");
                Outcome::Transformed { cells }
            }
            Err(e) => {
                tracing::warn!("clipboard write failed, change dropped: {e}");
                // Let a retry of the same copy through
                self.last_seen = None;
                Outcome::Dropped(e.to_string())
            }
        }
    }
}

impl<C> Drop for Watcher<C> {
    fn drop(&mut self) {
        if let Some(mut registration) = self.registration.take() {
            registration.unregister();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct MemoryClipboard {
        text: Option<String>,
        writes: Vec<String>,
        fail_writes: bool,
    }

    impl ClipboardAccess for MemoryClipboard {
        fn read_text(&mut self) -> Result<String> {
            self.text.clone().ok_or(ClipboardError::UnsupportedContent)
        }

        fn write_text(&mut self, text: &str) -> Result<()> {
            if self.fail_writes {
                return Err(ClipboardError::Access("locked".into()));
            }
            self.text = Some(text.to_string());
            self.writes.push(text.to_string());
            Ok(())
        }
    }

    fn watcher() -> Watcher<MemoryClipboard> {
        Watcher::new(MemoryClipboard::default(), TransformOptions::default())
    }

    #[test]
    fn converts_grid_and_writes_once() {
        let mut w = watcher();
        assert_eq!(
            w.on_change("1,000\t2,000\n3,000\t4,000"),
            Outcome::Transformed { cells: 4 }
        );
        assert_eq!(w.clipboard.writes, vec!["1000\n2000\n3000\n4000"]);
        assert_eq!(w.writes(), 1);
    }

    #[test]
    fn own_write_is_ignored() {
        let mut w = watcher();
        w.on_change("1\t2");
        assert_eq!(w.on_change("1\n2"), Outcome::SelfWrite);
        assert_eq!(w.on_change("1\n2"), Outcome::SelfWrite);
        assert_eq!(w.writes(), 1);
    }

    #[test]
    fn repeated_notification_is_a_duplicate() {
        let mut w = watcher();
        assert_eq!(w.on_change("plain"), Outcome::AlreadyColumnar);
        assert_eq!(w.on_change("plain"), Outcome::Duplicate);
    }

    #[test]
    fn recopying_the_same_grid_converts_again() {
        let mut w = watcher();
        w.on_change("1\t2");
        w.on_change("1\n2");
        assert_eq!(w.on_change("1\t2"), Outcome::Transformed { cells: 2 });
        assert_eq!(w.writes(), 2);
    }

    #[test]
    fn empty_content_is_a_no_op() {
        let mut w = watcher();
        assert_eq!(w.on_change(""), Outcome::Empty);
        assert!(w.clipboard.writes.is_empty());
    }

    #[test]
    fn failed_write_is_not_remembered() {
        let mut w = watcher();
        w.clipboard.fail_writes = true;
        assert!(matches!(w.on_change("1\t2"), Outcome::Dropped(_)));
        assert_eq!(w.writes(), 0);

        w.clipboard.fail_writes = false;
        assert_eq!(w.on_change("1\t2"), Outcome::Transformed { cells: 2 });
    }

    #[test]
    fn grid_without_numbers_is_unchanged_in_numeric_only_mode() {
        let mut w = Watcher::new(
            MemoryClipboard::default(),
            TransformOptions {
                numeric_only: true,
                ..Default::default()
            },
        );
        assert_eq!(w.on_change("a\tb"), Outcome::Unchanged);
        assert!(w.clipboard.writes.is_empty());
        assert_eq!(w.writes(), 0);
    }

    #[test]
    fn column_without_separators_is_unchanged() {
        let mut w = Watcher::new(
            MemoryClipboard::default(),
            TransformOptions {
                single_column: true,
                ..Default::default()
            },
        );
        assert_eq!(w.on_change("a\nb"), Outcome::Unchanged);
        assert!(w.clipboard.writes.is_empty());
    }

    #[test]
    fn non_text_is_skipped() {
        let mut w = watcher();
        assert_eq!(w.handle_change(), Outcome::Unsupported);
    }

    #[test]
    fn stop_is_idempotent_without_registration() {
        let mut w = watcher();
        w.stop();
        w.stop();
        assert!(!w.is_registered());
    }
}
