//! Event translation: classified [`RawMessage`] → [`TranslatedEvent`].
//!
//! Translation runs on the message-pump thread, so every extractor here is a
//! pure function of the message: no I/O, no locks, no pointer dereferences.
//! Data that lives behind `lParam` pointers has already been copied into
//! [`RawMessage::snapshot`] by the backend.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::domain::codes::*;
use crate::domain::event::{
    ActivationState, DeviceChangeKind, DeviceClass, EventPayload, PowerEvent, SessionChange,
    SizeKind, TranslatedEvent,
};
use crate::domain::message::{Category, ParamSnapshot, RawMessage};

use super::classify::RuleError;
use super::sequence::SequenceCounter;

/// User-supplied payload extraction.
pub type ExtractFn = dyn Fn(&RawMessage) -> EventPayload + Send + Sync;

/// Strategy that turns a raw message into a category-specific payload.
#[derive(Clone)]
pub enum Extractor {
    DeviceChange,
    Power,
    Display,
    Dpi,
    Session,
    Activation,
    Focus,
    Close,
    Quit,
    EndSession,
    Size,
    Raw,
    Custom(Arc<ExtractFn>),
}

impl Extractor {
    /// Configuration name of a built-in strategy; `None` for `Custom`.
    pub fn name(&self) -> Option<&'static str> {
        let name = match self {
            Self::DeviceChange => "device_change",
            Self::Power => "power",
            Self::Display => "display",
            Self::Dpi => "dpi",
            Self::Session => "session",
            Self::Activation => "activation",
            Self::Focus => "focus",
            Self::Close => "close",
            Self::Quit => "quit",
            Self::EndSession => "end_session",
            Self::Size => "size",
            Self::Raw => "raw",
            Self::Custom(_) => return None,
        };
        Some(name)
    }

    /// Produces the payload for `raw`.
    pub fn extract(&self, raw: &RawMessage) -> EventPayload {
        match self {
            Self::DeviceChange => extract_device_change(raw),
            Self::Power => EventPayload::Power(power_event(raw.wparam)),
            Self::Display => EventPayload::DisplayChange {
                width: u32::from(lo_word(raw.lparam as usize)),
                height: u32::from(hi_word(raw.lparam as usize)),
                bits_per_pixel: raw.wparam as u32,
            },
            Self::Dpi => EventPayload::DpiChange {
                dpi_x: u32::from(lo_word(raw.wparam)),
                dpi_y: u32::from(hi_word(raw.wparam)),
                suggested: match raw.snapshot {
                    Some(ParamSnapshot::SuggestedRect(rect)) => Some(rect),
                    _ => None,
                },
            },
            Self::Session => EventPayload::Session {
                change: session_change(raw.wparam),
                session_id: raw.lparam as u32,
            },
            Self::Activation => extract_activation(raw),
            Self::Focus => EventPayload::Focus {
                gained: raw.code != WM_KILLFOCUS,
            },
            Self::Close => EventPayload::CloseRequest,
            Self::Quit => EventPayload::QuitRequest {
                exit_code: raw.wparam as i32,
            },
            Self::EndSession => EventPayload::EndSession {
                query: raw.code == WM_QUERYENDSESSION,
                ending: raw.code == WM_ENDSESSION && raw.wparam != 0,
                logoff: (raw.lparam as u32) & ENDSESSION_LOGOFF != 0,
            },
            Self::Size => EventPayload::Size {
                kind: size_kind(raw.wparam),
                width: u32::from(lo_word(raw.lparam as usize)),
                height: u32::from(hi_word(raw.lparam as usize)),
            },
            Self::Raw => EventPayload::Raw {
                code: raw.code,
                wparam: raw.wparam,
                lparam: raw.lparam,
            },
            Self::Custom(f) => f(raw),
        }
    }
}

impl FromStr for Extractor {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let extractor = match s.trim().to_ascii_lowercase().as_str() {
            "device_change" => Self::DeviceChange,
            "power" => Self::Power,
            "display" => Self::Display,
            "dpi" => Self::Dpi,
            "session" => Self::Session,
            "activation" => Self::Activation,
            "focus" => Self::Focus,
            "close" => Self::Close,
            "quit" => Self::Quit,
            "end_session" => Self::EndSession,
            "size" => Self::Size,
            "raw" => Self::Raw,
            _ => return Err(RuleError::UnknownExtractor(s.to_string())),
        };
        Ok(extractor)
    }
}

impl fmt::Debug for Extractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "Extractor({name})"),
            None => f.write_str("Extractor(custom)"),
        }
    }
}

/// Builds [`TranslatedEvent`]s and stamps them with sequence numbers.
#[derive(Default)]
pub struct EventTranslator {
    sequence: SequenceCounter,
}

impl EventTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Translates `raw` into an event of `category`, consuming one sequence
    /// number.
    pub fn translate(&self, raw: &RawMessage, category: &Category, extractor: &Extractor) -> TranslatedEvent {
        TranslatedEvent {
            category: category.clone(),
            payload: extractor.extract(raw),
            window: raw.window,
            timestamp_ms: raw.timestamp_ms,
            sequence: self.sequence.next(),
        }
    }

    /// The sequence number the next translation will receive.
    pub fn next_sequence(&self) -> u64 {
        self.sequence.peek()
    }
}

fn extract_device_change(raw: &RawMessage) -> EventPayload {
    let kind = match raw.wparam {
        DBT_DEVICEARRIVAL => DeviceChangeKind::Arrival,
        DBT_DEVICEQUERYREMOVE => DeviceChangeKind::QueryRemove,
        DBT_DEVICEQUERYREMOVEFAILED => DeviceChangeKind::QueryRemoveFailed,
        DBT_DEVICEREMOVEPENDING => DeviceChangeKind::RemovePending,
        DBT_DEVICEREMOVECOMPLETE => DeviceChangeKind::RemoveComplete,
        DBT_DEVNODES_CHANGED => DeviceChangeKind::NodesChanged,
        DBT_CONFIGCHANGED => DeviceChangeKind::ConfigChanged,
        DBT_CUSTOMEVENT => DeviceChangeKind::Custom,
        other => DeviceChangeKind::Other(other),
    };

    let class = match raw.snapshot {
        Some(ParamSnapshot::DeviceBroadcast { device_type }) => match device_type {
            DBT_DEVTYP_OEM => DeviceClass::Oem,
            DBT_DEVTYP_VOLUME => DeviceClass::Volume,
            DBT_DEVTYP_PORT => DeviceClass::Port,
            DBT_DEVTYP_DEVICEINTERFACE => DeviceClass::DeviceInterface,
            DBT_DEVTYP_HANDLE => DeviceClass::Handle,
            other => DeviceClass::Unknown(other),
        },
        _ => DeviceClass::NotApplicable,
    };

    EventPayload::DeviceChange { kind, class }
}

fn power_event(wparam: usize) -> PowerEvent {
    match wparam {
        PBT_APMSUSPEND => PowerEvent::Suspend,
        PBT_APMRESUMESUSPEND => PowerEvent::ResumeSuspend,
        PBT_APMRESUMEAUTOMATIC => PowerEvent::ResumeAutomatic,
        PBT_APMPOWERSTATUSCHANGE => PowerEvent::PowerStatusChange,
        PBT_POWERSETTINGCHANGE => PowerEvent::PowerSettingChange,
        other => PowerEvent::Other(other),
    }
}

fn session_change(wparam: usize) -> SessionChange {
    match wparam {
        WTS_CONSOLE_CONNECT => SessionChange::ConsoleConnect,
        WTS_CONSOLE_DISCONNECT => SessionChange::ConsoleDisconnect,
        WTS_REMOTE_CONNECT => SessionChange::RemoteConnect,
        WTS_REMOTE_DISCONNECT => SessionChange::RemoteDisconnect,
        WTS_SESSION_LOGON => SessionChange::Logon,
        WTS_SESSION_LOGOFF => SessionChange::Logoff,
        WTS_SESSION_LOCK => SessionChange::Lock,
        WTS_SESSION_UNLOCK => SessionChange::Unlock,
        WTS_SESSION_REMOTE_CONTROL => SessionChange::RemoteControl,
        other => SessionChange::Other(other),
    }
}

fn extract_activation(raw: &RawMessage) -> EventPayload {
    // WM_ACTIVATEAPP carries a BOOL; WM_ACTIVATE packs WA_* and the
    // minimized flag into the two halves of wParam.
    if raw.code == WM_ACTIVATEAPP {
        let state = if raw.wparam != 0 {
            ActivationState::Active
        } else {
            ActivationState::Inactive
        };
        return EventPayload::Activation {
            state,
            minimized: false,
        };
    }

    let state = match usize::from(lo_word(raw.wparam)) {
        WA_ACTIVE => ActivationState::Active,
        WA_CLICKACTIVE => ActivationState::ClickActive,
        _ => ActivationState::Inactive,
    };
    EventPayload::Activation {
        state,
        minimized: hi_word(raw.wparam) != 0,
    }
}

fn size_kind(wparam: usize) -> SizeKind {
    match wparam {
        SIZE_RESTORED => SizeKind::Restored,
        SIZE_MINIMIZED => SizeKind::Minimized,
        SIZE_MAXIMIZED => SizeKind::Maximized,
        other => SizeKind::Other(other),
    }
}
