//! Win32 message codes and notification parameters.
//!
//! Only the values the built-in extractors and default rule table need are
//! listed here.  They mirror `WinUser.h`, `Dbt.h`, `WtsApi32.h` and the
//! power-broadcast constants, and are kept as raw integers so that
//! `wndmsg-core` has no dependency on the `windows` crate.

// ── Window messages ───────────────────────────────────────────────────────────

pub const WM_NULL: u32 = 0x0000;
pub const WM_CREATE: u32 = 0x0001;
pub const WM_DESTROY: u32 = 0x0002;
pub const WM_MOVE: u32 = 0x0003;
pub const WM_SIZE: u32 = 0x0005;
pub const WM_ACTIVATE: u32 = 0x0006;
pub const WM_SETFOCUS: u32 = 0x0007;
pub const WM_KILLFOCUS: u32 = 0x0008;
pub const WM_CLOSE: u32 = 0x0010;
pub const WM_QUERYENDSESSION: u32 = 0x0011;
pub const WM_QUIT: u32 = 0x0012;
pub const WM_ENDSESSION: u32 = 0x0016;
pub const WM_SETTINGCHANGE: u32 = 0x001A;
pub const WM_ACTIVATEAPP: u32 = 0x001C;
pub const WM_DISPLAYCHANGE: u32 = 0x007E;
pub const WM_NCDESTROY: u32 = 0x0082;
pub const WM_KEYDOWN: u32 = 0x0100;
pub const WM_KEYUP: u32 = 0x0101;
pub const WM_MOUSEMOVE: u32 = 0x0200;
pub const WM_POWERBROADCAST: u32 = 0x0218;
pub const WM_DEVICECHANGE: u32 = 0x0219;
pub const WM_WTSSESSION_CHANGE: u32 = 0x02B1;
pub const WM_DPICHANGED: u32 = 0x02E0;
pub const WM_THEMECHANGED: u32 = 0x031A;

/// First code of the `WM_USER` private range (inclusive).
pub const WM_USER: u32 = 0x0400;
/// First code of the `WM_APP` private range (inclusive); also the end of `WM_USER`.
pub const WM_APP: u32 = 0x8000;
/// End of the `WM_APP` range (exclusive); registered-message strings start here.
pub const WM_APP_END: u32 = 0xC000;

// ── WM_DEVICECHANGE wParam (Dbt.h) ────────────────────────────────────────────

pub const DBT_DEVNODES_CHANGED: usize = 0x0007;
pub const DBT_CONFIGCHANGED: usize = 0x0018;
pub const DBT_DEVICEARRIVAL: usize = 0x8000;
pub const DBT_DEVICEQUERYREMOVE: usize = 0x8001;
pub const DBT_DEVICEQUERYREMOVEFAILED: usize = 0x8002;
pub const DBT_DEVICEREMOVEPENDING: usize = 0x8003;
pub const DBT_DEVICEREMOVECOMPLETE: usize = 0x8004;
pub const DBT_CUSTOMEVENT: usize = 0x8006;

// ── DEV_BROADCAST_HDR::dbch_devicetype ────────────────────────────────────────

pub const DBT_DEVTYP_OEM: u32 = 0x0000;
pub const DBT_DEVTYP_VOLUME: u32 = 0x0002;
pub const DBT_DEVTYP_PORT: u32 = 0x0003;
pub const DBT_DEVTYP_DEVICEINTERFACE: u32 = 0x0005;
pub const DBT_DEVTYP_HANDLE: u32 = 0x0006;

// ── WM_POWERBROADCAST wParam ──────────────────────────────────────────────────

pub const PBT_APMSUSPEND: usize = 0x0004;
pub const PBT_APMRESUMESUSPEND: usize = 0x0007;
pub const PBT_APMPOWERSTATUSCHANGE: usize = 0x000A;
pub const PBT_APMRESUMEAUTOMATIC: usize = 0x0012;
pub const PBT_POWERSETTINGCHANGE: usize = 0x8013;

// ── WM_WTSSESSION_CHANGE wParam ───────────────────────────────────────────────

pub const WTS_CONSOLE_CONNECT: usize = 0x1;
pub const WTS_CONSOLE_DISCONNECT: usize = 0x2;
pub const WTS_REMOTE_CONNECT: usize = 0x3;
pub const WTS_REMOTE_DISCONNECT: usize = 0x4;
pub const WTS_SESSION_LOGON: usize = 0x5;
pub const WTS_SESSION_LOGOFF: usize = 0x6;
pub const WTS_SESSION_LOCK: usize = 0x7;
pub const WTS_SESSION_UNLOCK: usize = 0x8;
pub const WTS_SESSION_REMOTE_CONTROL: usize = 0x9;

// ── WM_ACTIVATE / WM_SIZE / WM_ENDSESSION parameters ──────────────────────────

pub const WA_INACTIVE: usize = 0;
pub const WA_ACTIVE: usize = 1;
pub const WA_CLICKACTIVE: usize = 2;

pub const SIZE_RESTORED: usize = 0;
pub const SIZE_MINIMIZED: usize = 1;
pub const SIZE_MAXIMIZED: usize = 2;

pub const ENDSESSION_LOGOFF: u32 = 0x8000_0000;

/// Low 16 bits of a message parameter (`LOWORD`).
#[inline]
pub fn lo_word(value: usize) -> u16 {
    (value & 0xFFFF) as u16
}

/// Bits 16..32 of a message parameter (`HIWORD`).
#[inline]
pub fn hi_word(value: usize) -> u16 {
    ((value >> 16) & 0xFFFF) as u16
}
