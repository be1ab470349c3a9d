use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};

use windows::Win32::Foundation::{HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, HMENU, HWND_MESSAGE, RegisterClassW, WINDOW_STYLE, WNDCLASSW,
    WS_EX_NOACTIVATE,
};
use windows::core::w;

use crate::error::{ClipboardError, Result};

const CLASS_NAME: windows::core::PCWSTR = w!("ClipColumnListener");

type WndProcHandler = dyn FnMut(HWND, u32, WPARAM, LPARAM) -> Option<LRESULT>;

thread_local! {
    // Messages for a window are dispatched on the thread that created it,
    // so the handler lives with the listener thread.
    static HANDLER: RefCell<Option<Box<WndProcHandler>>> = const { RefCell::new(None) };
}

/// Install the message handler for windows created on this thread.
pub fn set_handler(handler: Box<WndProcHandler>) {
    HANDLER.with(|slot| *slot.borrow_mut() = Some(handler));
}

/// Drop this thread's handler.
pub fn clear_handler() {
    HANDLER.with(|slot| {
        if let Ok(mut slot) = slot.try_borrow_mut() {
            *slot = None;
        }
    });
}

fn dispatch(hwnd: HWND, msg: u32, wparam: WPARAM, lparam: LPARAM) -> Option<LRESULT> {
    HANDLER.with(|slot| {
        // A re-entrant message (sent while the handler is running) goes to the default proc.
        let mut slot = slot.try_borrow_mut().ok()?;
        let handler = slot.as_mut()?;
        handler(hwnd, msg, wparam, lparam)
    })
}

unsafe extern "system" fn wnd_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    // Unwinding across the FFI boundary is UB
    let result = panic::catch_unwind(AssertUnwindSafe(|| dispatch(hwnd, msg, wparam, lparam)));

    match result {
        Ok(Some(lr)) => lr,
        Ok(None) => unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) },
        Err(payload) => {
            let msg_str = if let Some(s) = payload.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = payload.downcast_ref::<String>() {
                s.clone()
            } else {
                "unknown panic".to_string()
            };
            tracing::error!("panic caught in clipboard window procedure: {msg_str}");
            unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) }
        }
    }
}

/// Creates an invisible message-only window to receive `WM_CLIPBOARDUPDATE`.
pub fn create_hidden_window() -> Result<HWND> {
    unsafe {
        let hinstance = GetModuleHandleW(None).map_err(ClipboardError::WindowCreationFailed)?;

        let wc = WNDCLASSW {
            lpfnWndProc: Some(wnd_proc),
            hInstance: hinstance.into(),
            lpszClassName: CLASS_NAME,
            ..Default::default()
        };

        // Fails harmlessly when the class is already registered by an earlier listener.
        RegisterClassW(&wc);

        CreateWindowExW(
            WS_EX_NOACTIVATE,
            CLASS_NAME,
            w!("clip-column listener"),
            WINDOW_STYLE::default(),
            0,
            0,
            0,
            0,
            Some(HWND_MESSAGE),
            Some(HMENU::default()),
            Some(hinstance.into()),
            None,
        )
        .map_err(ClipboardError::WindowCreationFailed)
    }
}
