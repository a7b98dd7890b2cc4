//! MessageListenerSubsystem: lifecycle, routing and the listener API.
//!
//! # State machine
//!
//! ```text
//! Uninitialized ──startup──► Installing ──► Active ──shutdown──► Uninstalling ──► Uninitialized
//! ```
//!
//! Only `Active` classifies.  In every other state, and for orphaned hooks,
//! the trampoline forwards messages to the original procedure untouched.
//!
//! # Routing
//!
//! The subsystem is the [`MessageRoute`] of every window it hooks.  For each
//! message it classifies (when active) under the hook table's read lock, then
//! calls the original procedure with no lock held and returns its result.
//! Uninstall and shutdown therefore never return while a capture for one of
//! their windows is still in flight.  On `WM_NCDESTROY` the record is
//! dropped after the original has run.
//!
//! The backend holds the route through a weak reference, so a dropped
//! subsystem degrades to pass-through instead of dangling.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use wndmsg_core::domain::codes::WM_NCDESTROY;
use wndmsg_core::{
    CaptureOutcome, Category, CategoryFilter, Classifier, DispatchError, DispatchReport, Dispatcher,
    EventListener, ListenerId, MetricsSnapshot, Pipeline, RawMessage, TranslatedEvent, WindowHandle,
};

use crate::infrastructure::hook::{
    ForeignHookPolicy, HookError, HookRegistry, HookState, InstallOutcome, MessageRoute,
    UninstallOutcome, WindowSystem,
};
use crate::infrastructure::storage::config::{ConfigError, ListenerConfig};

/// Lifecycle state of the subsystem.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubsystemState {
    Uninitialized = 0,
    Installing = 1,
    Active = 2,
    Uninstalling = 3,
}

impl SubsystemState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Installing,
            2 => Self::Active,
            3 => Self::Uninstalling,
            _ => Self::Uninitialized,
        }
    }
}

impl fmt::Display for SubsystemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Installing => "installing",
            Self::Active => "active",
            Self::Uninstalling => "uninstalling",
        };
        f.write_str(name)
    }
}

/// Error type for lifecycle operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("cannot move from {from} to {to}")]
    InvalidTransition { from: SubsystemState, to: SubsystemState },

    /// Hooks that could not be removed.  They keep forwarding to the original
    /// procedure but the host should treat this as a failed shutdown.
    #[error("failed to restore the original procedure of {count} window(s)", count = .windows.len())]
    RestoreFailed { windows: Vec<WindowHandle> },

    #[error("could not enumerate top-level windows: {0}")]
    Enumerate(#[source] HookError),

    #[error("subsystem is {0}, not active")]
    NotActive(SubsystemState),

    #[error(transparent)]
    Hook(#[from] HookError),
}

/// What `on_engine_startup` did.
#[derive(Debug, Default)]
pub struct StartupReport {
    pub installed: Vec<WindowHandle>,
    /// Windows left alone, with the reason.
    pub skipped: Vec<(WindowHandle, HookError)>,
}

/// What `on_engine_shutdown` did.
#[derive(Debug, Default)]
pub struct ShutdownReport {
    pub unhooked: usize,
    /// The final dispatch tick that flushed pending events.
    pub flushed: DispatchReport,
}

struct Shared {
    state: AtomicU8,
    hooks: HookRegistry,
    pipeline: Pipeline,
    dispatcher: Dispatcher,
}

impl Shared {
    fn state(&self) -> SubsystemState {
        SubsystemState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: SubsystemState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn transition(&self, from: SubsystemState, to: SubsystemState) -> Result<(), SubsystemState> {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(SubsystemState::from_u8)
    }

    fn route(&self, raw: RawMessage) -> Option<isize> {
        let original = self.hooks.enter(raw.window, |hook_state| {
            if hook_state == HookState::Installed && self.state() == SubsystemState::Active {
                if let CaptureOutcome::Enqueued(outcome) = self.pipeline.capture(&raw) {
                    debug!(window = %raw.window, code = raw.code, sequence = outcome.sequence(), "message captured");
                }
            }
        })?;

        let result = original.invoke(&raw);

        if raw.code == WM_NCDESTROY {
            self.hooks.forget(raw.window);
        }
        Some(result)
    }
}

/// The route handed to the window system.
struct SubsystemRoute {
    shared: Weak<Shared>,
}

impl MessageRoute for SubsystemRoute {
    fn route(&self, raw: RawMessage) -> Option<isize> {
        self.shared.upgrade()?.route(raw)
    }
}

/// Intercepts window messages of the host's windows and delivers them as
/// [`TranslatedEvent`]s on [`dispatch_tick`](Self::dispatch_tick).
pub struct MessageListenerSubsystem {
    shared: Arc<Shared>,
    route: Arc<dyn MessageRoute>,
}

impl MessageListenerSubsystem {
    /// Creates a subsystem configured from `config`.
    ///
    /// # Errors
    ///
    /// Returns the validation errors of [`ListenerConfig::validate`].
    pub fn new(system: Arc<dyn WindowSystem>, config: &ListenerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let subsystem = Self::with_classifier(
            system,
            config.classifier()?,
            config.queue.capacity,
            config.hooks.foreign_hook_policy,
        );
        subsystem
            .shared
            .pipeline
            .set_enabled_categories(config.enabled_category_set());
        subsystem.shared.pipeline.set_verbose(config.general.verbose_messages);
        Ok(subsystem)
    }

    /// Creates a subsystem with an explicit rule table.
    pub fn with_classifier(
        system: Arc<dyn WindowSystem>,
        classifier: Classifier,
        queue_capacity: usize,
        policy: ForeignHookPolicy,
    ) -> Self {
        let pipeline = Pipeline::new(classifier, queue_capacity);
        let dispatcher = Dispatcher::new(Arc::clone(pipeline.queue()), Arc::clone(pipeline.metrics()));
        let shared = Arc::new(Shared {
            state: AtomicU8::new(SubsystemState::Uninitialized as u8),
            hooks: HookRegistry::new(system, policy),
            pipeline,
            dispatcher,
        });
        let route: Arc<dyn MessageRoute> = Arc::new(SubsystemRoute {
            shared: Arc::downgrade(&shared),
        });
        Self { shared, route }
    }

    pub fn state(&self) -> SubsystemState {
        self.shared.state()
    }

    /// Hooks every top-level window of the process and starts classifying.
    ///
    /// Windows that cannot be hooked are logged and skipped.  Calling this
    /// while already active is a no-op.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::InvalidTransition`] while installing or uninstalling,
    /// [`LifecycleError::Enumerate`] if the window list is unavailable (the
    /// subsystem stays uninitialized).
    pub fn on_engine_startup(&self) -> Result<StartupReport, LifecycleError> {
        let shared = &self.shared;
        match shared.transition(SubsystemState::Uninitialized, SubsystemState::Installing) {
            Ok(()) => {}
            Err(SubsystemState::Active) => {
                debug!("startup requested while already active");
                return Ok(StartupReport::default());
            }
            Err(from) => {
                return Err(LifecycleError::InvalidTransition {
                    from,
                    to: SubsystemState::Installing,
                })
            }
        }
        info!("message listener installing hooks");

        let windows = match shared.hooks.system().top_level_windows() {
            Ok(windows) => windows,
            Err(e) => {
                shared.set_state(SubsystemState::Uninitialized);
                error!(error = %e, "window enumeration failed; listener not started");
                return Err(LifecycleError::Enumerate(e));
            }
        };

        let mut report = StartupReport::default();
        for window in windows {
            match shared.hooks.install(window, Arc::clone(&self.route)) {
                Ok(_) => report.installed.push(window),
                Err(e) => {
                    warn!(%window, error = %e, "window not hooked");
                    report.skipped.push((window, e));
                }
            }
        }

        shared.set_state(SubsystemState::Active);
        info!(
            installed = report.installed.len(),
            skipped = report.skipped.len(),
            "message listener active"
        );
        Ok(report)
    }

    /// Unhooks every window, flushes pending events through a final dispatch
    /// tick and returns to `Uninitialized`.  A no-op when not started.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::RestoreFailed`] lists windows whose original
    /// procedure could not be restored.  The flush and the state change
    /// still happen.
    pub fn on_engine_shutdown(&self) -> Result<ShutdownReport, LifecycleError> {
        let shared = &self.shared;
        match shared.transition(SubsystemState::Active, SubsystemState::Uninstalling) {
            Ok(()) => {}
            Err(SubsystemState::Uninitialized) => {
                debug!("shutdown requested while not started");
                return Ok(ShutdownReport::default());
            }
            Err(from) => {
                return Err(LifecycleError::InvalidTransition {
                    from,
                    to: SubsystemState::Uninstalling,
                })
            }
        }
        info!("message listener uninstalling hooks");

        let hooked = shared.hooks.len();
        let failed = shared.hooks.uninstall_all();

        let flushed = match shared.dispatcher.dispatch_tick() {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "final flush skipped");
                DispatchReport::default()
            }
        };

        shared.set_state(SubsystemState::Uninitialized);

        if !failed.is_empty() {
            error!(windows = ?failed, "shutdown left hooks that could not be removed");
            return Err(LifecycleError::RestoreFailed { windows: failed });
        }
        info!(unhooked = hooked, flushed = flushed.events, "message listener stopped");
        Ok(ShutdownReport {
            unhooked: hooked,
            flushed,
        })
    }

    /// Hooks a window created after startup.
    pub fn install_window(&self, window: WindowHandle) -> Result<InstallOutcome, LifecycleError> {
        let state = self.state();
        if state != SubsystemState::Active {
            return Err(LifecycleError::NotActive(state));
        }
        Ok(self.shared.hooks.install(window, Arc::clone(&self.route))?)
    }

    /// Unhooks one window.  Events it already produced stay queued.
    pub fn uninstall_window(&self, window: WindowHandle) -> Result<UninstallOutcome, HookError> {
        self.shared.hooks.uninstall(window)
    }

    pub fn is_hooked(&self, window: WindowHandle) -> bool {
        self.shared.hooks.is_installed(window)
    }

    pub fn hooked_windows(&self) -> Vec<WindowHandle> {
        self.shared.hooks.windows()
    }

    // ── Listener API ──────────────────────────────────────────────────────────

    pub fn subscribe<F>(&self, filter: CategoryFilter, callback: F) -> ListenerId
    where
        F: FnMut(&TranslatedEvent) -> anyhow::Result<()> + Send + 'static,
    {
        self.shared.dispatcher.subscribe(filter, callback)
    }

    pub fn subscribe_listener<L>(&self, filter: CategoryFilter, listener: L) -> ListenerId
    where
        L: EventListener + 'static,
    {
        self.shared.dispatcher.subscribe_listener(filter, listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.shared.dispatcher.unsubscribe(id)
    }

    pub fn is_subscribed(&self, id: ListenerId) -> bool {
        self.shared.dispatcher.is_subscribed(id)
    }

    /// Listener ids in call order.
    pub fn listener_ids(&self) -> Vec<ListenerId> {
        self.shared.dispatcher.listener_ids()
    }

    /// Delivers every pending event.  Call from the host's update loop.
    pub fn dispatch_tick(&self) -> Result<DispatchReport, DispatchError> {
        self.shared.dispatcher.dispatch_tick()
    }

    pub fn pending_events(&self) -> usize {
        self.shared.pipeline.queue().len()
    }

    // ── Runtime settings ──────────────────────────────────────────────────────

    pub fn set_verbose_messages(&self, verbose: bool) {
        self.shared.pipeline.set_verbose(verbose);
    }

    pub fn enable_category(&self, category: impl Into<Category>) {
        self.shared.pipeline.enable_category(category);
    }

    pub fn disable_category(&self, category: &str) {
        self.shared.pipeline.disable_category(category);
    }

    pub fn set_enabled_categories(&self, categories: Option<HashSet<Category>>) {
        self.shared.pipeline.set_enabled_categories(categories);
    }

    pub fn enabled_categories(&self) -> Option<HashSet<Category>> {
        self.shared.pipeline.enabled_categories()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.pipeline.metrics().snapshot()
    }
}

impl Drop for MessageListenerSubsystem {
    fn drop(&mut self) {
        if self.shared.hooks.is_empty() {
            return;
        }
        let failed = self.shared.hooks.uninstall_all();
        if !failed.is_empty() {
            warn!(windows = ?failed, "hooks left in place at drop; they forward only");
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::hook::mock::MockWindowSystem;
    use wndmsg_core::domain::codes::*;

    fn subsystem(system: &MockWindowSystem) -> MessageListenerSubsystem {
        MessageListenerSubsystem::new(Arc::new(system.clone()), &ListenerConfig::default())
            .expect("default config is valid")
    }

    #[test]
    fn test_new_subsystem_is_uninitialized() {
        let system = MockWindowSystem::new();
        assert_eq!(subsystem(&system).state(), SubsystemState::Uninitialized);
    }

    #[test]
    fn test_startup_hooks_all_windows_and_activates() {
        // Arrange
        let system = MockWindowSystem::new();
        let a = system.create_window();
        let b = system.create_window();
        let listener = subsystem(&system);

        // Act
        let report = listener.on_engine_startup().expect("startup");

        // Assert
        assert_eq!(report.installed, vec![a, b]);
        assert_eq!(listener.state(), SubsystemState::Active);
        assert!(listener.is_hooked(a));
        assert!(listener.is_hooked(b));
    }

    #[test]
    fn test_startup_twice_is_noop() {
        let system = MockWindowSystem::new();
        system.create_window();
        let listener = subsystem(&system);
        listener.on_engine_startup().expect("first");

        let second = listener.on_engine_startup().expect("second");

        assert!(second.installed.is_empty());
        assert_eq!(listener.hooked_windows().len(), 1);
    }

    #[test]
    fn test_startup_enumeration_failure_stays_uninitialized() {
        // Arrange
        let system = MockWindowSystem::new();
        system.set_enumeration_failure(true);
        let listener = subsystem(&system);

        // Act
        let result = listener.on_engine_startup();

        // Assert
        assert!(matches!(result, Err(LifecycleError::Enumerate(_))));
        assert_eq!(listener.state(), SubsystemState::Uninitialized);
    }

    #[test]
    fn test_messages_before_startup_are_not_hooked() {
        let system = MockWindowSystem::new();
        let window = system.create_window();
        let listener = subsystem(&system);

        system.send_message(window, WM_CLOSE, 0, 0);

        assert_eq!(listener.pending_events(), 0);
        assert_eq!(listener.metrics().captured, 0);
    }

    #[test]
    fn test_route_classifies_then_calls_original() {
        // Arrange
        let system = MockWindowSystem::new();
        let window = system.create_window();
        let listener = subsystem(&system);
        listener.on_engine_startup().expect("startup");

        // Act
        let result = system.send_message(window, WM_CLOSE, 0, 0);

        // Assert
        assert_eq!(result, Some(WM_CLOSE as isize));
        assert_eq!(system.delivered(window), vec![WM_CLOSE]);
        assert_eq!(listener.pending_events(), 1);
    }

    #[test]
    fn test_hooked_window_passes_through_while_installing_or_uninstalling() {
        // Arrange
        let system = MockWindowSystem::new();
        let window = system.create_window();
        let listener = subsystem(&system);
        listener.on_engine_startup().expect("startup");

        for transient in [SubsystemState::Installing, SubsystemState::Uninstalling] {
            listener.shared.set_state(transient);

            // Act
            let result = system.send_message(window, WM_CLOSE, 0, 0);

            // Assert
            assert_eq!(result, Some(WM_CLOSE as isize), "{transient}");
            assert!(listener.is_hooked(window), "{transient}");
            assert_eq!(listener.metrics().captured, 0, "{transient}");
            assert_eq!(listener.pending_events(), 0, "{transient}");
        }
        assert_eq!(system.delivered(window), vec![WM_CLOSE, WM_CLOSE]);

        // Back to Active: the same window classifies again.
        listener.shared.set_state(SubsystemState::Active);
        system.send_message(window, WM_CLOSE, 0, 0);
        assert_eq!(listener.pending_events(), 1);
    }

    #[test]
    fn test_install_window_requires_active_state() {
        let system = MockWindowSystem::new();
        let window = system.create_window();
        let listener = subsystem(&system);

        let result = listener.install_window(window);

        assert_eq!(
            result,
            Err(LifecycleError::NotActive(SubsystemState::Uninitialized))
        );
    }

    #[test]
    fn test_shutdown_without_startup_is_noop() {
        let system = MockWindowSystem::new();
        let listener = subsystem(&system);
        let report = listener.on_engine_shutdown().expect("shutdown");
        assert_eq!(report.unhooked, 0);
    }

    #[test]
    fn test_drop_unhooks_windows() {
        // Arrange
        let system = MockWindowSystem::new();
        let window = system.create_window();
        let host = system.host_procedure(window).expect("host");
        {
            let listener = subsystem(&system);
            listener.on_engine_startup().expect("startup");
            assert!(system.is_routed(window));
        }

        // Assert
        assert!(!system.is_routed(window));
        assert_eq!(system.current_procedure(window), Ok(host));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let system = MockWindowSystem::new();
        let mut config = ListenerConfig::default();
        config.queue.capacity = 0;

        let result = MessageListenerSubsystem::new(Arc::new(system), &config);

        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(SubsystemState::Active.to_string(), "active");
        assert_eq!(
            LifecycleError::InvalidTransition {
                from: SubsystemState::Installing,
                to: SubsystemState::Uninstalling,
            }
            .to_string(),
            "cannot move from installing to uninstalling"
        );
    }
}
