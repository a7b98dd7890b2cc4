//! Win32 window subclassing.
//!
//! The trampoline is a single `extern "system"` window procedure shared by
//! every hooked window.  It finds the window's route in a process-wide table
//! keyed by handle, snapshots the message, hands it to the route and returns
//! whatever the route returns.  If the route declines (or panics) the
//! trampoline calls the original procedure itself with `CallWindowProcW`.
//!
//! The generation tag lives in a window property so it disappears with the
//! window, which is what makes recycled handles detectable.
//!
//! # Safety
//!
//! This module uses `unsafe` code exclusively for Windows API FFI calls.
//! All `unsafe` blocks are annotated with `// SAFETY:` comments.

#![cfg(target_os = "windows")]

use std::collections::HashMap;
use std::ffi::c_void;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use tracing::error;
use windows::core::{w, BOOL, PCWSTR};
use windows::Win32::Foundation::{
    GetLastError, SetLastError, HANDLE, HWND, LPARAM, LRESULT, RECT, WIN32_ERROR, WPARAM,
};
use windows::Win32::System::Threading::GetCurrentProcessId;
use windows::Win32::UI::WindowsAndMessaging::{
    CallWindowProcW, DefWindowProcW, EnumWindows, GetMessageTime, GetPropW,
    GetWindowThreadProcessId, IsWindow, RemovePropW, SetPropW, GWLP_WNDPROC, WNDPROC,
};

use wndmsg_core::domain::codes::*;
use wndmsg_core::{ParamSnapshot, RawMessage, Rect, WindowHandle};

use super::{HookError, MessageRoute, OriginalProcedure, ProcAddress, WindowSystem};

/// Window property holding the generation tag.
const TAG_PROPERTY: PCWSTR = w!("WndMsgListener.Generation");

struct RouteEntry {
    route: Arc<dyn MessageRoute>,
    original: ProcAddress,
}

/// Routes of hooked windows.  Entries are cloned out before use, so a route
/// removed while a message is in flight stays alive until that call ends.
fn routes() -> &'static RwLock<HashMap<usize, RouteEntry>> {
    static ROUTES: OnceLock<RwLock<HashMap<usize, RouteEntry>>> = OnceLock::new();
    ROUTES.get_or_init(|| RwLock::new(HashMap::new()))
}

fn hwnd(window: WindowHandle) -> HWND {
    HWND(window.raw() as *mut c_void)
}

fn platform_error(call: &'static str) -> HookError {
    // SAFETY: GetLastError only reads thread-local state.
    let code = unsafe { GetLastError() };
    HookError::Platform {
        call,
        message: format!("Win32 error {}", code.0),
    }
}

#[cfg(target_pointer_width = "64")]
unsafe fn get_procedure(window: HWND) -> isize {
    windows::Win32::UI::WindowsAndMessaging::GetWindowLongPtrW(window, GWLP_WNDPROC)
}

#[cfg(target_pointer_width = "64")]
unsafe fn set_procedure(window: HWND, procedure: isize) -> isize {
    windows::Win32::UI::WindowsAndMessaging::SetWindowLongPtrW(window, GWLP_WNDPROC, procedure)
}

#[cfg(target_pointer_width = "32")]
unsafe fn get_procedure(window: HWND) -> isize {
    windows::Win32::UI::WindowsAndMessaging::GetWindowLongW(window, GWLP_WNDPROC) as isize
}

#[cfg(target_pointer_width = "32")]
unsafe fn set_procedure(window: HWND, procedure: isize) -> isize {
    windows::Win32::UI::WindowsAndMessaging::SetWindowLongW(window, GWLP_WNDPROC, procedure as i32) as isize
}

/// Replaces the window procedure, distinguishing a previous value of zero
/// from failure.
fn swap_procedure(window: HWND, procedure: ProcAddress, call: &'static str) -> Result<ProcAddress, HookError> {
    // SAFETY: SetLastError/SetWindowLongPtrW are called on a handle that the
    // caller checked with IsWindow; procedure is either our trampoline or a
    // value previously returned by the OS for this window.
    unsafe {
        SetLastError(WIN32_ERROR(0));
        let previous = set_procedure(window, procedure as isize);
        if previous == 0 && GetLastError().0 != 0 {
            return Err(platform_error(call));
        }
        Ok(previous as ProcAddress)
    }
}

fn call_original(original: ProcAddress, window: HWND, msg: u32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if original == 0 {
        // SAFETY: parameters are the unmodified values Windows passed in.
        return unsafe { DefWindowProcW(window, msg, wparam, lparam) };
    }
    // SAFETY: original was returned by GetWindowLongPtrW(GWLP_WNDPROC) for
    // this window, so it is a valid WNDPROC (or a handle CallWindowProcW
    // understands). The transmute from usize to the Option<fn> WNDPROC type
    // is sound for a non-zero value.
    unsafe {
        let procedure: WNDPROC = std::mem::transmute::<usize, WNDPROC>(original);
        CallWindowProcW(procedure, window, msg, wparam, lparam)
    }
}

/// `DEV_BROADCAST_HDR` prefix: enough to read the device type.
#[repr(C)]
#[allow(dead_code)]
struct BroadcastHeader {
    size: u32,
    device_type: u32,
    reserved: u32,
}

/// Copies out what `lparam` points to for the messages whose extractors need
/// it.  The memory is only valid for the duration of this call.
fn snapshot(msg: u32, wparam: usize, lparam: isize) -> Option<ParamSnapshot> {
    if lparam == 0 {
        return None;
    }
    match msg {
        WM_DEVICECHANGE
            if matches!(
                wparam,
                DBT_DEVICEARRIVAL
                    | DBT_DEVICEQUERYREMOVE
                    | DBT_DEVICEQUERYREMOVEFAILED
                    | DBT_DEVICEREMOVEPENDING
                    | DBT_DEVICEREMOVECOMPLETE
                    | DBT_CUSTOMEVENT
            ) =>
        {
            // SAFETY: for these wParam values lParam points to a
            // DEV_BROADCAST_HDR valid for the lifetime of the message.
            let header = unsafe { &*(lparam as *const BroadcastHeader) };
            Some(ParamSnapshot::DeviceBroadcast {
                device_type: header.device_type,
            })
        }
        WM_DPICHANGED => {
            // SAFETY: for WM_DPICHANGED lParam points to the suggested RECT,
            // valid for the lifetime of the message.
            let rect = unsafe { &*(lparam as *const RECT) };
            Some(ParamSnapshot::SuggestedRect(Rect {
                left: rect.left,
                top: rect.top,
                right: rect.right,
                bottom: rect.bottom,
            }))
        }
        _ => None,
    }
}

/// Window procedure installed on every hooked window.
///
/// # Safety
///
/// Called by Windows on the window's owning thread.  Never unwinds.
unsafe extern "system" fn trampoline_proc(window: HWND, msg: u32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    let key = window.0 as usize;
    let entry = routes()
        .read()
        .get(&key)
        .map(|entry| (Arc::clone(&entry.route), entry.original));

    let Some((route, original)) = entry else {
        return call_original(0, window, msg, wparam, lparam);
    };

    // SAFETY: GetMessageTime reads the calling thread's message state.
    let timestamp_ms = u64::from(unsafe { GetMessageTime() } as u32);
    let mut raw = RawMessage::new(WindowHandle(key), msg, wparam.0, lparam.0, timestamp_ms);
    raw.snapshot = snapshot(msg, wparam.0, lparam.0);

    let routed = panic::catch_unwind(AssertUnwindSafe(|| route.route(raw)));
    let result = match routed {
        Ok(Some(result)) => LRESULT(result),
        Ok(None) => call_original(original, window, msg, wparam, lparam),
        Err(_) => {
            error!(window = key, msg, "message route panicked; forwarding to original procedure");
            call_original(original, window, msg, wparam, lparam)
        }
    };

    if msg == WM_NCDESTROY {
        routes().write().remove(&key);
        // SAFETY: the window is still valid during WM_NCDESTROY.
        let _ = unsafe { RemovePropW(window, TAG_PROPERTY) };
    }
    result
}

/// `CallWindowProcW` wrapper for a saved procedure.
pub struct Win32Procedure {
    address: ProcAddress,
}

impl OriginalProcedure for Win32Procedure {
    fn address(&self) -> ProcAddress {
        self.address
    }

    fn invoke(&self, raw: &RawMessage) -> isize {
        call_original(
            self.address,
            hwnd(raw.window),
            raw.code,
            WPARAM(raw.wparam),
            LPARAM(raw.lparam),
        )
        .0
    }
}

/// [`WindowSystem`] backed by `user32`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Win32WindowSystem;

impl Win32WindowSystem {
    pub fn new() -> Self {
        Self
    }
}

unsafe extern "system" fn collect_process_windows(window: HWND, lparam: LPARAM) -> BOOL {
    // SAFETY: lparam is the address of the (pid, Vec) pair owned by
    // top_level_windows, alive for the whole EnumWindows call.
    let (pid, windows) = unsafe { &mut *(lparam.0 as *mut (u32, Vec<WindowHandle>)) };
    let mut owner = 0u32;
    // SAFETY: window is supplied by EnumWindows; owner is a valid out pointer.
    unsafe { GetWindowThreadProcessId(window, Some(&mut owner)) };
    if owner == *pid {
        windows.push(WindowHandle(window.0 as usize));
    }
    BOOL(1)
}

impl WindowSystem for Win32WindowSystem {
    fn is_window(&self, window: WindowHandle) -> bool {
        // SAFETY: IsWindow accepts any value and only reports validity.
        unsafe { IsWindow(Some(hwnd(window))) }.as_bool()
    }

    fn top_level_windows(&self) -> Result<Vec<WindowHandle>, HookError> {
        // SAFETY: GetCurrentProcessId has no preconditions.
        let pid = unsafe { GetCurrentProcessId() };
        let mut state: (u32, Vec<WindowHandle>) = (pid, Vec::new());
        // SAFETY: the callback only dereferences lparam as the tuple above,
        // which outlives the call.
        unsafe {
            EnumWindows(
                Some(collect_process_windows),
                LPARAM(std::ptr::addr_of_mut!(state) as isize),
            )
        }
        .map_err(|e| HookError::Platform {
            call: "EnumWindows",
            message: e.to_string(),
        })?;
        Ok(state.1)
    }

    fn current_procedure(&self, window: WindowHandle) -> Result<ProcAddress, HookError> {
        if !self.is_window(window) {
            return Err(HookError::InvalidWindow(window));
        }
        // SAFETY: the handle was just validated.
        Ok(unsafe { get_procedure(hwnd(window)) } as ProcAddress)
    }

    fn trampoline(&self) -> ProcAddress {
        trampoline_proc as usize
    }

    fn install_trampoline(
        &self,
        window: WindowHandle,
        route: Arc<dyn MessageRoute>,
    ) -> Result<Arc<dyn OriginalProcedure>, HookError> {
        let original = self.current_procedure(window)?;

        // Publish the route first: the first message can arrive as soon as
        // the procedure is swapped.
        routes().write().insert(window.raw(), RouteEntry { route, original });

        match swap_procedure(hwnd(window), self.trampoline(), "SetWindowLongPtrW") {
            Ok(previous) => {
                if previous != original {
                    // Subclassed between the read and the swap
                    if let Some(entry) = routes().write().get_mut(&window.raw()) {
                        entry.original = previous;
                    }
                }
                Ok(Arc::new(Win32Procedure { address: previous }))
            }
            Err(e) => {
                routes().write().remove(&window.raw());
                Err(e)
            }
        }
    }

    fn restore_procedure(&self, window: WindowHandle, original: ProcAddress) -> Result<(), HookError> {
        if !self.is_window(window) {
            return Err(HookError::InvalidWindow(window));
        }
        swap_procedure(hwnd(window), original, "SetWindowLongPtrW")?;
        routes().write().remove(&window.raw());
        Ok(())
    }

    fn window_tag(&self, window: WindowHandle) -> Option<u64> {
        // SAFETY: GetPropW returns a null handle for unknown windows/properties.
        let value = unsafe { GetPropW(hwnd(window), TAG_PROPERTY) };
        match value.0 as usize {
            0 => None,
            tag => Some(tag as u64),
        }
    }

    fn set_window_tag(&self, window: WindowHandle, tag: Option<u64>) -> Result<(), HookError> {
        match tag {
            Some(tag) => {
                // SAFETY: the property value is an integer smuggled in a
                // HANDLE; nothing ever dereferences it.
                unsafe { SetPropW(hwnd(window), TAG_PROPERTY, Some(HANDLE(tag as usize as *mut c_void))) }
                    .map_err(|_| platform_error("SetPropW"))
            }
            None => {
                // SAFETY: removing a missing property is harmless.
                let _ = unsafe { RemovePropW(hwnd(window), TAG_PROPERTY) };
                Ok(())
            }
        }
    }
}
