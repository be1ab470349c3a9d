//! Clipboard watcher that flattens copied spreadsheet ranges into one value
//! per line, stripping thousands separators from numbers.
//!
//! - [`transform`]: the pure text rewrite.
//! - [`clipboard`]: clipboard access and change notification backends.
//! - [`watcher`]: the event loop tying the two together.

pub mod clipboard;
pub mod config;
pub mod error;
pub mod shutdown;
pub mod transform;
pub mod watcher;

pub use clipboard::{
    Backend, ChangeEvent, ChangeNotifier, ClipboardAccess, Registration, WatchEvent,
};
pub use error::{AppError, ClipboardError};
pub use transform::TransformOptions;
pub use watcher::{Outcome, ShutdownHandle, Watcher};
