//! Captured message types: what the hook trampoline hands to the pipeline.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// Opaque identifier of a native window.
///
/// On Windows this is the `HWND` value.  It is stable for the lifetime of the
/// window but may be reused by the OS after the window is destroyed, which is
/// why the hook installer pairs it with a generation tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowHandle(pub usize);

impl WindowHandle {
    /// Returns the raw handle value.
    pub fn raw(self) -> usize {
        self.0
    }
}

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Axis-aligned rectangle in screen coordinates (mirrors Win32 `RECT`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }
}

/// Data copied out of the memory `lParam` points to, taken while the OS
/// guarantees that memory is valid.
///
/// Translation must never dereference raw pointers, so the backend snapshots
/// the few structures the built-in extractors need at capture time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamSnapshot {
    /// `DEV_BROADCAST_HDR::dbch_devicetype` for WM_DEVICECHANGE.
    DeviceBroadcast { device_type: u32 },
    /// The suggested window rectangle carried by WM_DPICHANGED.
    SuggestedRect(Rect),
}

/// One OS callback invocation, captured verbatim.
///
/// Immutable once built; it lives only as long as classification and
/// translation take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub window: WindowHandle,
    pub code: u32,
    pub wparam: usize,
    pub lparam: isize,
    /// Milliseconds on the backend's clock (`GetMessageTime` on Windows).
    pub timestamp_ms: u64,
    pub snapshot: Option<ParamSnapshot>,
}

impl RawMessage {
    /// Builds a message without a parameter snapshot.
    pub fn new(window: WindowHandle, code: u32, wparam: usize, lparam: isize, timestamp_ms: u64) -> Self {
        Self {
            window,
            code,
            wparam,
            lparam,
            timestamp_ms,
            snapshot: None,
        }
    }

    /// Attaches a parameter snapshot.
    pub fn with_snapshot(mut self, snapshot: ParamSnapshot) -> Self {
        self.snapshot = Some(snapshot);
        self
    }
}

/// Semantic category tag assigned by a classification rule.
///
/// Categories are data, not code: rule tables loaded from configuration can
/// introduce new tags without touching the pipeline.  The well-known tags
/// used by the default rule table are exposed as associated constants.
///
/// Cloning is a reference-count bump, so it is cheap on the capture path.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Category(Arc<str>);

impl Category {
    pub const DEVICE_CHANGE: &'static str = "DeviceChange";
    pub const POWER_EVENT: &'static str = "PowerEvent";
    pub const DISPLAY_CHANGE: &'static str = "DisplayChange";
    pub const DPI_CHANGE: &'static str = "DpiChange";
    pub const SESSION_CHANGE: &'static str = "SessionChange";
    pub const ACTIVATION: &'static str = "Activation";
    pub const FOCUS: &'static str = "Focus";
    pub const CLOSE_REQUEST: &'static str = "CloseRequest";
    pub const QUIT_REQUEST: &'static str = "QuitRequest";
    pub const END_SESSION: &'static str = "EndSession";
    pub const WINDOW_SIZE: &'static str = "WindowSize";
    pub const SETTING_CHANGE: &'static str = "SettingChange";

    pub fn new(tag: &str) -> Self {
        Self(Arc::from(tag))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Category {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

impl From<String> for Category {
    fn from(tag: String) -> Self {
        Self(Arc::from(tag))
    }
}

impl Borrow<str> for Category {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for Category {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for Category {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

impl fmt::Debug for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Category({})", self.0)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_category_compares_with_str() {
        let category = Category::new(Category::DEVICE_CHANGE);
        assert_eq!(category, "DeviceChange");
        assert_eq!(category.as_str(), Category::DEVICE_CHANGE);
    }

    #[test]
    fn test_category_set_lookup_by_str() {
        // Arrange
        let set: HashSet<Category> = [Category::from("PowerEvent")].into_iter().collect();

        // Act / Assert – Borrow<str> lets sets be queried without allocating
        assert!(set.contains("PowerEvent"));
        assert!(!set.contains("DeviceChange"));
    }

    #[test]
    fn test_window_handle_displays_as_hex() {
        assert_eq!(WindowHandle(0x1a2b).to_string(), "0x1a2b");
    }

    #[test]
    fn test_raw_message_with_snapshot_keeps_parameters() {
        // Arrange / Act
        let msg = RawMessage::new(WindowHandle(1), 0x0219, 0x8000, 42, 7)
            .with_snapshot(ParamSnapshot::DeviceBroadcast { device_type: 2 });

        // Assert
        assert_eq!(msg.lparam, 42);
        assert_eq!(msg.snapshot, Some(ParamSnapshot::DeviceBroadcast { device_type: 2 }));
    }

    #[test]
    fn test_rect_dimensions() {
        let rect = Rect { left: 10, top: 20, right: 110, bottom: 70 };
        assert_eq!(rect.width(), 100);
        assert_eq!(rect.height(), 50);
    }
}
