//! Windows clipboard backend: push notifications through a message-only
//! window registered with `AddClipboardFormatListener`, plus direct
//! `CF_UNICODETEXT` reads and writes.

use std::sync::OnceLock;
use std::sync::mpsc::{self, Sender};
use std::thread;

use windows::Win32::Foundation::{GlobalFree, HANDLE, HGLOBAL, HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::DataExchange::{
    AddClipboardFormatListener, CloseClipboard, EmptyClipboard, GetClipboardData,
    GetClipboardSequenceNumber, IsClipboardFormatAvailable, OpenClipboard,
    RegisterClipboardFormatW, RemoveClipboardFormatListener, SetClipboardData,
};
use windows::Win32::System::Memory::{
    GMEM_MOVEABLE, GlobalAlloc, GlobalLock, GlobalSize, GlobalUnlock,
};
use windows::Win32::System::Ole::CF_UNICODETEXT;
use windows::Win32::UI::WindowsAndMessaging::{
    DestroyWindow, DispatchMessageW, GetMessageW, MSG, PostMessageW, PostQuitMessage,
    TranslateMessage, WM_CLIPBOARDUPDATE, WM_CLOSE, WM_DESTROY,
};
use windows::core::w;

use crate::clipboard::window;
use crate::clipboard::{ChangeEvent, ChangeNotifier, ClipboardAccess, Registration, WatchEvent};
use crate::error::{ClipboardError, Result};

/// Registered formats that password managers use to opt out of monitoring.
struct ExclusionFormats {
    exclude_from_monitor: u32,
    can_include_in_history: u32,
}

static EXCLUSION_FORMATS: OnceLock<ExclusionFormats> = OnceLock::new();

fn exclusion_formats() -> &'static ExclusionFormats {
    EXCLUSION_FORMATS.get_or_init(|| unsafe {
        ExclusionFormats {
            exclude_from_monitor: RegisterClipboardFormatW(w!(
                "ExcludeClipboardContentFromMonitorProcessing"
            )),
            can_include_in_history: RegisterClipboardFormatW(w!("CanIncludeInClipboardHistory")),
        }
    })
}

fn access_error(what: &str, e: windows::core::Error) -> ClipboardError {
    ClipboardError::Access(format!("{what}: {e}"))
}

/// RAII guard that opens the clipboard on creation and closes it on drop.
struct ClipboardGuard {
    _private: (),
}

impl ClipboardGuard {
    fn open() -> Result<Self> {
        unsafe {
            OpenClipboard(None).map_err(|e| access_error("open clipboard", e))?;
        }
        Ok(Self { _private: () })
    }

    /// Content flagged by password managers must not be read.
    fn is_excluded(&self) -> bool {
        let fmts = exclusion_formats();

        if fmts.exclude_from_monitor != 0
            && unsafe { IsClipboardFormatAvailable(fmts.exclude_from_monitor).is_ok() }
        {
            return true;
        }

        // CanIncludeInClipboardHistory with DWORD value 0 means "do not record".
        if fmts.can_include_in_history != 0
            && unsafe { IsClipboardFormatAvailable(fmts.can_include_in_history).is_ok() }
        {
            return self.read_dword_format(fmts.can_include_in_history) == Some(0);
        }

        false
    }

    fn read_dword_format(&self, format: u32) -> Option<u32> {
        unsafe {
            let handle = GetClipboardData(format).ok()?;
            let hglobal = HGLOBAL(handle.0);
            let ptr = GlobalLock(hglobal);
            if ptr.is_null() {
                return None;
            }
            let val = if GlobalSize(hglobal) >= 4 {
                Some(*(ptr as *const u32))
            } else {
                None
            };
            let _ = GlobalUnlock(hglobal);
            val
        }
    }

    fn read_text(&self) -> Result<String> {
        unsafe {
            if IsClipboardFormatAvailable(CF_UNICODETEXT.0 as u32).is_err() {
                return Err(ClipboardError::UnsupportedContent);
            }

            let handle: HANDLE = GetClipboardData(CF_UNICODETEXT.0 as u32)
                .map_err(|e| access_error("read CF_UNICODETEXT", e))?;

            let hglobal = HGLOBAL(handle.0);
            let ptr = GlobalLock(hglobal) as *const u16;
            if ptr.is_null() {
                return Err(ClipboardError::GlobalLockFailed);
            }

            // Bounded by the allocation size; the terminator is usually well before it.
            let capacity = GlobalSize(hglobal) / 2;
            let units = std::slice::from_raw_parts(ptr, capacity);
            let len = units.iter().position(|&u| u == 0).unwrap_or(capacity);
            let text = String::from_utf16_lossy(&units[..len]);

            let _ = GlobalUnlock(hglobal);
            Ok(text)
        }
    }

    fn write_text(&self, text: &str) -> Result<()> {
        unsafe {
            EmptyClipboard().map_err(|e| access_error("empty clipboard", e))?;

            // UTF-16 with null terminator
            let wide: Vec<u16> = text.encode_utf16().chain(std::iter::once(0)).collect();
            let byte_len = wide.len() * 2;

            let hmem = GlobalAlloc(GMEM_MOVEABLE, byte_len)
                .map_err(|e| access_error("allocate clipboard memory", e))?;

            let ptr = GlobalLock(hmem);
            if ptr.is_null() {
                let _ = GlobalFree(Some(hmem));
                return Err(ClipboardError::GlobalLockFailed);
            }
            std::ptr::copy_nonoverlapping(wide.as_ptr() as *const u8, ptr as *mut u8, byte_len);
            let _ = GlobalUnlock(hmem);

            // The clipboard owns the memory only once SetClipboardData succeeds
            if let Err(e) = SetClipboardData(CF_UNICODETEXT.0 as u32, Some(HANDLE(hmem.0))) {
                let _ = GlobalFree(Some(hmem));
                return Err(access_error("write CF_UNICODETEXT", e));
            }
        }
        Ok(())
    }
}

impl Drop for ClipboardGuard {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseClipboard();
        }
    }
}

/// Direct Win32 clipboard text access.
#[derive(Debug, Default)]
pub struct NativeClipboard;

impl ClipboardAccess for NativeClipboard {
    fn read_text(&mut self) -> Result<String> {
        let guard = ClipboardGuard::open()?;
        if guard.is_excluded() {
            tracing::debug!("clipboard: content excluded from monitoring (password manager, etc.)");
            return Err(ClipboardError::UnsupportedContent);
        }
        guard.read_text()
    }

    fn write_text(&mut self, text: &str) -> Result<()> {
        ClipboardGuard::open()?.write_text(text)
    }
}

/// Push notifications from `WM_CLIPBOARDUPDATE`, delivered from a
/// dedicated listener thread that owns the hidden window.
#[derive(Debug, Default)]
pub struct NativeNotifier;

impl ChangeNotifier for NativeNotifier {
    fn register(self: Box<Self>, tx: Sender<WatchEvent>) -> Result<Registration> {
        let (ready_tx, ready_rx) = mpsc::channel::<Result<isize>>();

        let thread = thread::Builder::new()
            .name("clipboard-listener".into())
            .spawn(move || run_listener(tx, ready_tx))
            .map_err(|e| ClipboardError::Unavailable(format!("spawn listener thread: {e}")))?;

        let hwnd = match ready_rx.recv() {
            Ok(Ok(hwnd)) => hwnd,
            Ok(Err(e)) => {
                let _ = thread.join();
                return Err(e);
            }
            Err(_) => {
                let _ = thread.join();
                return Err(ClipboardError::NotifierStopped);
            }
        };

        Ok(Registration::new(move || post_close(hwnd), Some(thread)))
    }
}

/// Owns the hidden window and its message loop. Blocks until `WM_CLOSE`.
fn run_listener(tx: Sender<WatchEvent>, ready: Sender<Result<isize>>) {
    let mut last_seq: u32 = 0;

    window::set_handler(Box::new(
        move |hwnd: HWND, msg: u32, _wparam: WPARAM, _lparam: LPARAM| -> Option<LRESULT> {
            match msg {
                WM_CLIPBOARDUPDATE => {
                    // The OS may fire more than once for a single change
                    let seq = unsafe { GetClipboardSequenceNumber() };
                    if seq != 0 && seq == last_seq {
                        tracing::debug!("clipboard: duplicate notification for sequence {seq}");
                        return Some(LRESULT(0));
                    }
                    last_seq = seq;

                    let event = ChangeEvent {
                        sequence: (seq != 0).then_some(seq),
                    };
                    if tx.send(WatchEvent::Changed(event)).is_err() {
                        tracing::warn!("clipboard event channel closed");
                    }
                    Some(LRESULT(0))
                }
                WM_DESTROY => {
                    unsafe {
                        let _ = RemoveClipboardFormatListener(hwnd);
                        PostQuitMessage(0);
                    }
                    Some(LRESULT(0))
                }
                _ => None, // let DefWindowProcW handle it
            }
        },
    ));

    let hwnd = match window::create_hidden_window() {
        Ok(hwnd) => hwnd,
        Err(e) => {
            window::clear_handler();
            let _ = ready.send(Err(e));
            return;
        }
    };

    if let Err(e) = unsafe { AddClipboardFormatListener(hwnd) } {
        unsafe {
            let _ = DestroyWindow(hwnd);
        }
        window::clear_handler();
        let _ = ready.send(Err(ClipboardError::ListenerRegistrationFailed(e)));
        return;
    }

    let _ = ready.send(Ok(hwnd.0 as isize));
    tracing::info!("clipboard listener registered, waiting for changes...");

    unsafe {
        let mut msg = MSG::default();
        while GetMessageW(&mut msg, None, 0, 0).as_bool() {
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }

    window::clear_handler();
    tracing::info!("clipboard listener stopped");
}

/// Ask the listener window to close; its `WM_DESTROY` removes the listener.
fn post_close(hwnd: isize) {
    let hwnd = HWND(hwnd as *mut core::ffi::c_void);
    unsafe {
        if let Err(e) = PostMessageW(Some(hwnd), WM_CLOSE, WPARAM(0), LPARAM(0)) {
            tracing::warn!("failed to signal clipboard listener: {e}");
        }
    }
}
