//! # wndmsg-core
//!
//! Platform-neutral half of the window message listener: the data model for
//! captured messages, the message code catalog, the classify → translate →
//! enqueue pipeline that runs on the message-pump thread, and the listener
//! registry that drains the queue on the host's update thread.
//!
//! This crate never calls an OS API.  The hook installer and the Win32
//! backend live in `wndmsg-host`; everything here can be exercised with
//! hand-built [`RawMessage`] values.
//!
//! # Architecture overview
//!
//! ```text
//!  pump thread                                     consumer thread
//!  ───────────                                     ───────────────
//!  RawMessage ─► Classifier ─► EventTranslator ─►  EventQueue ─► Dispatcher ─► listeners
//!                (first match)  (pure, seq no.)    (bounded,      (drain on tick,
//!                                                   drop oldest)   fault isolated)
//! ```
//!
//! - **`domain`**   – `WindowHandle`, `RawMessage`, `Category`, `EventPayload`,
//!   `TranslatedEvent` and the Win32 message constants the built-in
//!   extractors understand.
//! - **`catalog`**  – human-readable names and descriptions for message codes.
//! - **`pipeline`** – classifier, translator, sequence counter, queue and the
//!   [`Pipeline`] that ties them together for the capture path.
//! - **`dispatch`** – listener registry and the tick-driven [`Dispatcher`].

pub mod catalog;
pub mod dispatch;
pub mod domain;
pub mod pipeline;

pub use dispatch::{
    CategoryFilter, DispatchError, DispatchReport, Dispatcher, EventListener, ListenerFault,
    ListenerId,
};
pub use domain::event::{
    ActivationState, DeviceChangeKind, DeviceClass, EventPayload, PowerEvent, SessionChange,
    SizeKind, TranslatedEvent,
};
pub use domain::message::{Category, ParamSnapshot, RawMessage, Rect, WindowHandle};
pub use pipeline::classify::{ClassificationRule, Classifier, MessageMatcher, RuleError, RuleSpec};
pub use pipeline::metrics::{MetricsSnapshot, PipelineMetrics};
pub use pipeline::queue::{EventQueue, PushOutcome};
pub use pipeline::translate::{EventTranslator, Extractor};
pub use pipeline::{CaptureOutcome, Pipeline};
