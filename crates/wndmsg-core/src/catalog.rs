//! Human-readable names and descriptions for window message codes.
//!
//! Used by verbose message logging and by the configuration loader, which lets
//! rules name a message (`"WM_DEVICECHANGE"`) instead of spelling the number.
//!
//! Codes in the private ranges are described relative to their base:
//! `0x0405` is reported as `WM_USER + 0x5`, `0x8010` as `WM_APP + 0x10`.

use crate::domain::codes::{WM_APP, WM_APP_END, WM_USER};

/// Name and description of one message code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageInfo {
    pub name: String,
    pub description: &'static str,
}

const UNKNOWN_NAME: &str = "Unknown";
const UNKNOWN_DESCRIPTION: &str = "No description available.";

/// Well-known codes, sorted by code so lookup can binary search.
static MESSAGE_TABLE: &[(u32, &str, &str)] = &[
    (0x0000, "WM_NULL", "No operation."),
    (0x0001, "WM_CREATE", "Sent when a window is being created."),
    (0x0002, "WM_DESTROY", "Sent when a window is being destroyed."),
    (0x0003, "WM_MOVE", "Sent after a window has been moved."),
    (0x0005, "WM_SIZE", "Sent when the size of a window has changed."),
    (0x0006, "WM_ACTIVATE", "Sent when a window is activated or deactivated."),
    (0x0007, "WM_SETFOCUS", "Sent when a window receives keyboard focus."),
    (0x0008, "WM_KILLFOCUS", "Sent when a window loses keyboard focus."),
    (0x000A, "WM_ENABLE", "Sent when a window is enabled or disabled."),
    (0x000B, "WM_SETREDRAW", "Sent to allow changes in a window to be redrawn or not."),
    (0x000C, "WM_SETTEXT", "Sent to set the text of a window."),
    (0x000D, "WM_GETTEXT", "Sent to retrieve the text of a window."),
    (0x000E, "WM_GETTEXTLENGTH", "Sent to retrieve the length of the text in a window."),
    (0x000F, "WM_PAINT", "Sent when the window's client area must be painted."),
    (0x0010, "WM_CLOSE", "Sent as a signal that a window or application should terminate."),
    (0x0011, "WM_QUERYENDSESSION", "Sent when the user chooses to end the session."),
    (0x0012, "WM_QUIT", "Indicates a request to terminate an application."),
    (0x0013, "WM_QUERYOPEN", "Sent to determine whether a minimized window can be restored."),
    (0x0014, "WM_ERASEBKGND", "Sent when the background of a window must be erased."),
    (0x0015, "WM_SYSCOLORCHANGE", "Sent when the system colors change."),
    (0x0016, "WM_ENDSESSION", "Sent when the user session is ending."),
    (0x0018, "WM_SHOWWINDOW", "Sent when a window is about to be hidden or shown."),
    (0x001A, "WM_SETTINGCHANGE", "Sent when a system-wide setting has changed."),
    (0x001C, "WM_ACTIVATEAPP", "Sent when a window of a different application is activated."),
    (0x0020, "WM_SETCURSOR", "Sent when the cursor moves within a window."),
    (0x0024, "WM_GETMINMAXINFO", "Sent when the size or position of a window is about to change."),
    (0x0046, "WM_WINDOWPOSCHANGING", "Sent when the window position is about to change."),
    (0x0047, "WM_WINDOWPOSCHANGED", "Sent after the window position has changed."),
    (0x007E, "WM_DISPLAYCHANGE", "Sent when the display resolution has changed."),
    (0x0081, "WM_NCCREATE", "Sent before WM_CREATE when a window is first created."),
    (0x0082, "WM_NCDESTROY", "Sent after WM_DESTROY; the last message a window receives."),
    (0x0084, "WM_NCHITTEST", "Sent to determine what part of the window is at a point."),
    (0x0100, "WM_KEYDOWN", "Sent when a key is pressed."),
    (0x0101, "WM_KEYUP", "Sent when a key is released."),
    (0x0102, "WM_CHAR", "Sent when a character is typed."),
    (0x0103, "WM_DEADCHAR", "Sent when a dead key is typed."),
    (0x0104, "WM_SYSKEYDOWN", "Sent when a system key is pressed."),
    (0x0105, "WM_SYSKEYUP", "Sent when a system key is released."),
    (0x0106, "WM_SYSCHAR", "Sent when a system character is typed."),
    (0x0107, "WM_SYSDEADCHAR", "Sent when a system dead key is typed."),
    (0x0112, "WM_SYSCOMMAND", "Sent when the user chooses a command from the window menu."),
    (0x0113, "WM_TIMER", "Posted when a timer expires."),
    (0x0200, "WM_MOUSEMOVE", "Sent when the mouse is moved."),
    (0x0201, "WM_LBUTTONDOWN", "Sent when the left mouse button is pressed."),
    (0x0202, "WM_LBUTTONUP", "Sent when the left mouse button is released."),
    (0x0203, "WM_LBUTTONDBLCLK", "Sent when the left mouse button is double-clicked."),
    (0x0204, "WM_RBUTTONDOWN", "Sent when the right mouse button is pressed."),
    (0x0205, "WM_RBUTTONUP", "Sent when the right mouse button is released."),
    (0x0206, "WM_RBUTTONDBLCLK", "Sent when the right mouse button is double-clicked."),
    (0x0207, "WM_MBUTTONDOWN", "Sent when the middle mouse button is pressed."),
    (0x0208, "WM_MBUTTONUP", "Sent when the middle mouse button is released."),
    (0x0209, "WM_MBUTTONDBLCLK", "Sent when the middle mouse button is double-clicked."),
    (0x020A, "WM_MOUSEWHEEL", "Sent when the mouse wheel is rotated."),
    (0x020B, "WM_XBUTTONDOWN", "Sent when an X button is pressed."),
    (0x020C, "WM_XBUTTONUP", "Sent when an X button is released."),
    (0x020D, "WM_XBUTTONDBLCLK", "Sent when an X button is double-clicked."),
    (0x0210, "WM_PARENTNOTIFY", "Sent to a parent window when a child window is created or destroyed."),
    (0x0211, "WM_ENTERMENULOOP", "Sent when a menu modal loop is entered."),
    (0x0212, "WM_EXITMENULOOP", "Sent when a menu modal loop is exited."),
    (0x0213, "WM_NEXTMENU", "Sent when the user navigates to the next menu."),
    (0x0214, "WM_SIZING", "Sent when the user is resizing a window."),
    (0x0215, "WM_CAPTURECHANGED", "Sent when the mouse capture changes."),
    (0x0216, "WM_MOVING", "Sent when the user is moving a window."),
    (0x0218, "WM_POWERBROADCAST", "Sent to notify applications of power management events."),
    (0x0219, "WM_DEVICECHANGE", "Sent when a device is added or removed."),
    (0x0231, "WM_ENTERSIZEMOVE", "Sent once when a window enters the moving or sizing loop."),
    (0x0232, "WM_EXITSIZEMOVE", "Sent once when a window exits the moving or sizing loop."),
    (0x02B1, "WM_WTSSESSION_CHANGE", "Sent when the session state changes (lock, unlock, logon)."),
    (0x02E0, "WM_DPICHANGED", "Sent when the effective DPI for a window has changed."),
    (0x0300, "WM_CUT", "Sent to cut the current selection to the clipboard."),
    (0x0301, "WM_COPY", "Sent to copy the current selection to the clipboard."),
    (0x0302, "WM_PASTE", "Sent to paste data from the clipboard."),
    (0x0303, "WM_CLEAR", "Sent to clear the current selection."),
    (0x0304, "WM_UNDO", "Sent to undo the last action."),
    (0x031A, "WM_THEMECHANGED", "Broadcast after a theme change event."),
    (0x0400, "WM_USER", "Base value for user-defined messages."),
    (0x8000, "WM_APP", "Base value for application-defined messages."),
];

/// Returns the name and description for `code`.
///
/// Codes strictly inside the `WM_USER` and `WM_APP` ranges are named by
/// offset from their base.  The bases themselves are regular table entries:
/// `0x0400` is `"WM_USER"` and `0x8000` is `"WM_APP"`, never `"WM_USER + 0x0"`,
/// so the names reported for the bases resolve back through [`code_by_name`].
pub fn message_info(code: u32) -> MessageInfo {
    if code > WM_USER && code < WM_APP {
        return offset_info(code, WM_USER, "WM_USER", "Custom application-defined message (WM_USER).");
    }
    if code > WM_APP && code < WM_APP_END {
        return offset_info(code, WM_APP, "WM_APP", "Custom application-defined message (WM_APP).");
    }

    match lookup(code) {
        Some(&(_, name, description)) => MessageInfo {
            name: name.to_string(),
            description,
        },
        None => MessageInfo {
            name: UNKNOWN_NAME.to_string(),
            description: UNKNOWN_DESCRIPTION,
        },
    }
}

/// Returns the name for `code`, e.g. `"WM_CLOSE"` or `"WM_USER + 0x5"`.
pub fn message_name(code: u32) -> String {
    message_info(code).name
}

/// Returns the description for `code`.
pub fn message_description(code: u32) -> &'static str {
    message_info(code).description
}

/// Static name for a well-known code, without allocating.
///
/// Returns `None` for private-range and unknown codes.
pub fn static_name(code: u32) -> Option<&'static str> {
    lookup(code).map(|(_, name, _)| *name)
}

/// Reverse lookup, case-insensitive: `"wm_devicechange"` → `0x0219`.
pub fn code_by_name(name: &str) -> Option<u32> {
    let name = name.trim();
    MESSAGE_TABLE
        .iter()
        .find(|(_, known, _)| known.eq_ignore_ascii_case(name))
        .map(|(code, _, _)| *code)
}

fn lookup(code: u32) -> Option<&'static (u32, &'static str, &'static str)> {
    MESSAGE_TABLE
        .binary_search_by_key(&code, |(c, _, _)| *c)
        .ok()
        .map(|idx| &MESSAGE_TABLE[idx])
}

fn offset_info(code: u32, base: u32, base_name: &str, description: &'static str) -> MessageInfo {
    MessageInfo {
        name: format!("{base_name} + {:#X}", code - base),
        description,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::codes::{WM_CLOSE, WM_DEVICECHANGE, WM_KEYDOWN, WM_NULL};

    #[test]
    fn test_table_is_sorted_for_binary_search() {
        for pair in MESSAGE_TABLE.windows(2) {
            assert!(pair[0].0 < pair[1].0, "table out of order at {:#06x}", pair[1].0);
        }
    }

    #[test]
    fn test_known_code_resolves_name_and_description() {
        // Arrange / Act
        let info = message_info(WM_DEVICECHANGE);

        // Assert
        assert_eq!(info.name, "WM_DEVICECHANGE");
        assert_eq!(info.description, "Sent when a device is added or removed.");
    }

    #[test]
    fn test_user_range_is_reported_as_offset() {
        assert_eq!(message_name(0x0405), "WM_USER + 0x5");
        assert_eq!(
            message_description(0x0405),
            "Custom application-defined message (WM_USER)."
        );
    }

    #[test]
    fn test_app_range_is_reported_as_offset() {
        assert_eq!(message_name(0x8010), "WM_APP + 0x10");
    }

    #[test]
    fn test_range_bases_keep_their_own_names() {
        assert_eq!(message_name(0x0400), "WM_USER");
        assert_eq!(message_name(0x8000), "WM_APP");
        assert_eq!(message_info(0x0400).description, "Base value for user-defined messages.");
        assert_eq!(code_by_name("WM_USER"), Some(0x0400));
        assert_eq!(code_by_name("WM_APP"), Some(0x8000));
    }

    #[test]
    fn test_unknown_code_reports_unknown() {
        let info = message_info(0xC123);
        assert_eq!(info.name, "Unknown");
        assert_eq!(info.description, "No description available.");
    }

    #[test]
    fn test_code_by_name_is_case_insensitive() {
        assert_eq!(code_by_name("wm_keydown"), Some(WM_KEYDOWN));
        assert_eq!(code_by_name("WM_CLOSE"), Some(WM_CLOSE));
        assert_eq!(code_by_name(" WM_NULL "), Some(WM_NULL));
    }

    #[test]
    fn test_code_by_name_unknown_is_none() {
        assert_eq!(code_by_name("WM_DOES_NOT_EXIST"), None);
    }

    #[test]
    fn test_static_name_skips_private_ranges() {
        assert_eq!(static_name(WM_CLOSE), Some("WM_CLOSE"));
        assert_eq!(static_name(0x0405), None);
    }
}
