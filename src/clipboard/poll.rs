//! Polling change detection for platforms without clipboard notifications.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::thread;
use std::time::Duration;

use crate::clipboard::{
    ChangeEvent, ChangeNotifier, ClipboardAccess, Registration, WatchEvent, content_hash,
};
use crate::error::{ClipboardError, Result};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Reads the clipboard every `interval` on a background thread and reports
/// a change whenever the text digest differs from the previous read.
///
/// `open` builds the clipboard handle on the poll thread itself, since
/// platform handles are not always `Send`.
pub struct PollNotifier<F> {
    open: F,
    interval: Duration,
}

impl<F, C> PollNotifier<F>
where
    F: FnOnce() -> C + Send + 'static,
    C: ClipboardAccess,
{
    pub fn new(open: F, interval: Duration) -> Self {
        Self {
            open,
            interval: interval.max(Duration::from_millis(10)),
        }
    }
}

impl<F, C> ChangeNotifier for PollNotifier<F>
where
    F: FnOnce() -> C + Send + 'static,
    C: ClipboardAccess,
{
    fn register(self: Box<Self>, tx: Sender<WatchEvent>) -> Result<Registration> {
        let PollNotifier { open, interval } = *self;
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();

        let handle = thread::Builder::new()
            .name("clipboard-poll".into())
            .spawn(move || {
                let mut clipboard = open();
                // Whatever is on the clipboard at startup is not a change.
                let mut last_hash = clipboard.read_text().ok().map(|t| content_hash(&t));
                tracing::info!("clipboard poller started with {}ms interval", interval.as_millis());

                while !stop_flag.load(Ordering::Acquire) {
                    thread::park_timeout(interval);
                    if stop_flag.load(Ordering::Acquire) {
                        break;
                    }

                    match clipboard.read_text() {
                        Ok(text) => {
                            let hash = content_hash(&text);
                            if last_hash.as_deref() == Some(hash.as_str()) {
                                continue;
                            }
                            last_hash = Some(hash);
                            let event = WatchEvent::Changed(ChangeEvent { sequence: None });
                            if tx.send(event).is_err() {
                                tracing::warn!("clipboard event channel closed");
                                break;
                            }
                        }
                        Err(ClipboardError::UnsupportedContent) => {
                            // Non-text replaced the previous snapshot
                            last_hash = None;
                        }
                        Err(e) => {
                            tracing::debug!("clipboard poll failed: {e}");
                        }
                    }
                }

                tracing::info!("clipboard poller stopped");
            })
            .map_err(|e| ClipboardError::Unavailable(format!("spawn poll thread: {e}")))?;

        let thread_handle = handle.thread().clone();
        Ok(Registration::new(
            move || {
                stop.store(true, Ordering::Release);
                thread_handle.unpark();
            },
            Some(handle),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;
    use std::sync::mpsc;

    #[derive(Clone, Default)]
    struct SharedClipboard(Arc<Mutex<Option<String>>>);

    impl SharedClipboard {
        fn opener(self) -> impl FnOnce() -> SharedClipboard + Send + 'static {
            move || self
        }

        fn set(&self, text: Option<&str>) {
            *self.0.lock().unwrap() = text.map(str::to_string);
        }
    }

    impl ClipboardAccess for SharedClipboard {
        fn read_text(&mut self) -> Result<String> {
            self.0
                .lock()
                .unwrap()
                .clone()
                .ok_or(ClipboardError::UnsupportedContent)
        }

        fn write_text(&mut self, text: &str) -> Result<()> {
            self.set(Some(text));
            Ok(())
        }
    }

    const WAIT: Duration = Duration::from_secs(2);
    const QUIET: Duration = Duration::from_millis(100);

    #[test]
    fn reports_changes_but_not_initial_content() {
        let clipboard = SharedClipboard::default();
        clipboard.set(Some("already here"));

        let (tx, rx) = mpsc::channel();
        let notifier = Box::new(PollNotifier::new(
            clipboard.clone().opener(),
            Duration::from_millis(10),
        ));
        let mut registration = notifier.register(tx).unwrap();

        assert!(rx.recv_timeout(QUIET).is_err());

        clipboard.set(Some("1\t2"));
        assert_eq!(
            rx.recv_timeout(WAIT).unwrap(),
            WatchEvent::Changed(ChangeEvent { sequence: None })
        );
        // Same content again is not a second change
        assert!(rx.recv_timeout(QUIET).is_err());

        registration.unregister();
        assert!(!registration.is_active());
    }

    #[test]
    fn text_after_non_text_counts_as_change() {
        let clipboard = SharedClipboard::default();
        clipboard.set(Some("a"));

        let (tx, rx) = mpsc::channel();
        let notifier = Box::new(PollNotifier::new(
            clipboard.clone().opener(),
            Duration::from_millis(10),
        ));
        let _registration = notifier.register(tx).unwrap();

        clipboard.set(None);
        assert!(rx.recv_timeout(QUIET).is_err());

        clipboard.set(Some("a"));
        assert!(rx.recv_timeout(WAIT).is_ok());
    }

    #[test]
    fn unregister_stops_the_thread() {
        let (tx, rx) = mpsc::channel();
        let notifier = Box::new(PollNotifier::new(
            SharedClipboard::default().opener(),
            Duration::from_secs(60),
        ));
        let mut registration = notifier.register(tx).unwrap();
        // Unparks the sleeping poller instead of waiting out the interval
        registration.unregister();
        assert!(matches!(rx.recv_timeout(QUIET), Err(mpsc::RecvTimeoutError::Disconnected)));
    }
}
