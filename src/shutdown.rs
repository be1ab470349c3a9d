//! Ctrl+C / termination hookup.

use crate::error::AppError;
use crate::watcher::ShutdownHandle;

/// Route Ctrl+C (and console close / SIGTERM) to `handle`.
///
/// On Unix this blocks the signals for the calling thread and every thread
/// it spawns afterwards, so call it before the watcher starts its notifier.
pub fn install(handle: ShutdownHandle) -> Result<(), AppError> {
    install_platform(handle)
}

#[cfg(target_os = "windows")]
fn install_platform(handle: ShutdownHandle) -> Result<(), AppError> {
    use std::sync::OnceLock;

    use windows::Win32::System::Console::{
        CTRL_BREAK_EVENT, CTRL_C_EVENT, CTRL_CLOSE_EVENT, SetConsoleCtrlHandler,
    };

    static HANDLE: OnceLock<ShutdownHandle> = OnceLock::new();
    if HANDLE.set(handle).is_err() {
        return Err(AppError::Setup("shutdown handler already installed".into()));
    }

    unsafe extern "system" fn handler(ctrl_type: u32) -> windows::core::BOOL {
        if ctrl_type == CTRL_C_EVENT
            || ctrl_type == CTRL_BREAK_EVENT
            || ctrl_type == CTRL_CLOSE_EVENT
        {
            if let Some(handle) = HANDLE.get() {
                handle.shutdown();
            }
            return true.into();
        }
        false.into()
    }

    unsafe {
        SetConsoleCtrlHandler(Some(handler), true).map_err(crate::error::ClipboardError::from)?;
    }
    Ok(())
}

#[cfg(unix)]
fn install_platform(handle: ShutdownHandle) -> Result<(), AppError> {
    // Signals are taken synchronously with sigwait on a dedicated thread,
    // which keeps the handling code out of async-signal context.
    let set = unsafe {
        let mut set: libc::sigset_t = std::mem::zeroed();
        libc::sigemptyset(&mut set);
        libc::sigaddset(&mut set, libc::SIGINT);
        libc::sigaddset(&mut set, libc::SIGTERM);
        let rc = libc::pthread_sigmask(libc::SIG_BLOCK, &set, std::ptr::null_mut());
        if rc != 0 {
            return Err(std::io::Error::from_raw_os_error(rc).into());
        }
        set
    };

    std::thread::Builder::new()
        .name("signal-wait".into())
        .spawn(move || {
            let mut sig: libc::c_int = 0;
            let rc = unsafe { libc::sigwait(&set, &mut sig) };
            if rc == 0 {
                tracing::debug!("received signal {sig}");
                handle.shutdown();
            } else {
                tracing::error!("sigwait failed: {}", std::io::Error::from_raw_os_error(rc));
            }
        })?;
    Ok(())
}

#[cfg(not(any(unix, target_os = "windows")))]
fn install_platform(_handle: ShutdownHandle) -> Result<(), AppError> {
    tracing::warn!("no shutdown signal support on this platform");
    Ok(())
}
