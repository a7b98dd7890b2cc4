//! Translated events: the OS-independent form listeners consume.

use super::message::{Category, Rect, WindowHandle};

/// What happened to a device, from the WM_DEVICECHANGE `wParam`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceChangeKind {
    Arrival,
    QueryRemove,
    QueryRemoveFailed,
    RemovePending,
    RemoveComplete,
    /// A device was added to or removed from the system (no broadcast header).
    NodesChanged,
    ConfigChanged,
    Custom,
    Other(usize),
}

impl DeviceChangeKind {
    /// `true` for the two notifications a consumer usually reacts to.
    pub fn is_arrival_or_removal(self) -> bool {
        matches!(self, Self::Arrival | Self::RemoveComplete)
    }
}

/// Device class from `DEV_BROADCAST_HDR::dbch_devicetype`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    Oem,
    Volume,
    Port,
    DeviceInterface,
    Handle,
    Unknown(u32),
    /// The notification carries no broadcast header.
    NotApplicable,
}

/// Power-management notification from WM_POWERBROADCAST.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerEvent {
    Suspend,
    ResumeSuspend,
    ResumeAutomatic,
    PowerStatusChange,
    PowerSettingChange,
    Other(usize),
}

/// Session transition from WM_WTSSESSION_CHANGE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionChange {
    ConsoleConnect,
    ConsoleDisconnect,
    RemoteConnect,
    RemoteDisconnect,
    Logon,
    Logoff,
    Lock,
    Unlock,
    RemoteControl,
    Other(usize),
}

/// Activation state from WM_ACTIVATE / WM_ACTIVATEAPP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationState {
    Inactive,
    Active,
    ClickActive,
}

/// Resize reason from WM_SIZE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeKind {
    Restored,
    Minimized,
    Maximized,
    Other(usize),
}

/// Category-specific payload of a [`TranslatedEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPayload {
    DeviceChange {
        kind: DeviceChangeKind,
        class: DeviceClass,
    },
    Power(PowerEvent),
    DisplayChange {
        width: u32,
        height: u32,
        bits_per_pixel: u32,
    },
    DpiChange {
        dpi_x: u32,
        dpi_y: u32,
        suggested: Option<Rect>,
    },
    Session {
        change: SessionChange,
        session_id: u32,
    },
    Activation {
        state: ActivationState,
        minimized: bool,
    },
    Focus {
        gained: bool,
    },
    CloseRequest,
    QuitRequest {
        exit_code: i32,
    },
    EndSession {
        /// `true` for WM_QUERYENDSESSION, `false` for WM_ENDSESSION.
        query: bool,
        /// For WM_ENDSESSION: whether the session is actually ending.
        ending: bool,
        logoff: bool,
    },
    Size {
        kind: SizeKind,
        width: u32,
        height: u32,
    },
    /// Parameters passed through verbatim.
    Raw {
        code: u32,
        wparam: usize,
        lparam: isize,
    },
}

/// A classified, translated message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatedEvent {
    pub category: Category,
    pub payload: EventPayload,
    pub window: WindowHandle,
    pub timestamp_ms: u64,
    /// Strictly increasing per pipeline, starting at 1.
    pub sequence: u64,
}
