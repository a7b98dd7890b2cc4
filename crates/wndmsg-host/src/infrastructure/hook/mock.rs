//! In-memory window system for tests and non-Windows builds.
//!
//! Each window has a host procedure that records every message it receives
//! and returns the message code as its result, so tests can check that the
//! original procedure saw each message exactly once and that its result made
//! it back to the sender.  Third-party subclassing, destruction and handle
//! reuse can be simulated.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use wndmsg_core::domain::codes::{WM_DESTROY, WM_NCDESTROY};
use wndmsg_core::{RawMessage, WindowHandle};

use super::{HookError, MessageRoute, OriginalProcedure, ProcAddress, WindowSystem};

/// Address the mock reports for its trampoline.
pub const TRAMPOLINE: ProcAddress = 0x7FFE_0000;

const FIRST_HANDLE: usize = 0x1_0000;
const FIRST_PROCEDURE: ProcAddress = 0x40_0000;

/// One message as seen by a procedure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub window: WindowHandle,
    pub procedure: ProcAddress,
    pub code: u32,
    pub wparam: usize,
    pub lparam: isize,
}

struct RouteEntry {
    route: Arc<dyn MessageRoute>,
    original: ProcAddress,
}

struct MockWindow {
    alive: bool,
    host_procedure: ProcAddress,
    procedure: ProcAddress,
    tag: Option<u64>,
    /// Foreign procedure → the procedure it forwards to.
    foreign: HashMap<ProcAddress, ProcAddress>,
    route: Option<RouteEntry>,
}

#[derive(Default)]
struct State {
    windows: HashMap<WindowHandle, MockWindow>,
    next_handle: usize,
    next_procedure: ProcAddress,
    clock_ms: u64,
    delivered: Vec<Delivery>,
    foreign_seen: Vec<Delivery>,
    fail_restore: bool,
    fail_enumeration: bool,
}

impl State {
    fn allocate_procedure(&mut self) -> ProcAddress {
        if self.next_procedure == 0 {
            self.next_procedure = FIRST_PROCEDURE;
        }
        let address = self.next_procedure;
        self.next_procedure += 0x10;
        address
    }

    fn live(&mut self, window: WindowHandle) -> Result<&mut MockWindow, HookError> {
        self.windows
            .get_mut(&window)
            .filter(|w| w.alive)
            .ok_or(HookError::InvalidWindow(window))
    }
}

enum Step {
    Route(Arc<dyn MessageRoute>, ProcAddress),
    Forward(ProcAddress),
    Done(isize),
}

/// Shared so that [`MockProcedure`]s can deliver into the same table.
#[derive(Default)]
struct Shared {
    state: Mutex<State>,
}

impl Shared {
    /// Runs the procedure at `address` for `raw`, following the chain of
    /// foreign procedures and the trampoline.  No lock is held while a route
    /// runs.
    fn call(&self, address: ProcAddress, raw: &RawMessage) -> isize {
        let step = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let Some(window) = state.windows.get(&raw.window) else {
                return 0;
            };
            if address == TRAMPOLINE {
                match &window.route {
                    Some(entry) => Step::Route(Arc::clone(&entry.route), entry.original),
                    None => Step::Done(0),
                }
            } else if let Some(&next) = window.foreign.get(&address) {
                state.foreign_seen.push(delivery(raw, address));
                Step::Forward(next)
            } else if address == window.host_procedure {
                state.delivered.push(delivery(raw, address));
                Step::Done(raw.code as isize)
            } else {
                Step::Done(0)
            }
        };

        match step {
            Step::Route(route, original) => route
                .route(raw.clone())
                .unwrap_or_else(|| self.call(original, raw)),
            Step::Forward(next) => self.call(next, raw),
            Step::Done(result) => result,
        }
    }
}

fn delivery(raw: &RawMessage, procedure: ProcAddress) -> Delivery {
    Delivery {
        window: raw.window,
        procedure,
        code: raw.code,
        wparam: raw.wparam,
        lparam: raw.lparam,
    }
}

/// A procedure of a mock window, callable after the trampoline replaced it.
pub struct MockProcedure {
    shared: Arc<Shared>,
    address: ProcAddress,
}

impl OriginalProcedure for MockProcedure {
    fn address(&self) -> ProcAddress {
        self.address
    }

    fn invoke(&self, raw: &RawMessage) -> isize {
        self.shared.call(self.address, raw)
    }
}

/// In-memory [`WindowSystem`].
#[derive(Clone, Default)]
pub struct MockWindowSystem {
    shared: Arc<Shared>,
}

impl MockWindowSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a live top-level window with its own host procedure.
    pub fn create_window(&self) -> WindowHandle {
        let mut state = self.shared.state.lock();
        if state.next_handle == 0 {
            state.next_handle = FIRST_HANDLE;
        }
        let window = WindowHandle(state.next_handle);
        state.next_handle += 0x10;
        let host = state.allocate_procedure();
        state.windows.insert(window, fresh_window(host));
        window
    }

    /// Destroys `window`: sends `WM_DESTROY` and `WM_NCDESTROY` through its
    /// current procedure, then invalidates the handle.  Returns `false` if the
    /// window was not alive.
    pub fn destroy(&self, window: WindowHandle) -> bool {
        if !self.is_window(window) {
            return false;
        }
        self.send_message(window, WM_DESTROY, 0, 0);
        self.send_message(window, WM_NCDESTROY, 0, 0);

        let mut state = self.shared.state.lock();
        if let Some(w) = state.windows.get_mut(&window) {
            w.alive = false;
            w.route = None;
            w.tag = None;
            w.foreign.clear();
        }
        true
    }

    /// Creates a new window that reuses the handle of a destroyed one.
    pub fn recreate_with_same_handle(&self, window: WindowHandle) -> bool {
        let mut state = self.shared.state.lock();
        if state.windows.get(&window).map_or(true, |w| w.alive) {
            return false;
        }
        let host = state.allocate_procedure();
        state.windows.insert(window, fresh_window(host));
        true
    }

    /// Subclasses `window` with a foreign procedure that records and forwards.
    /// Returns the foreign procedure's address.
    pub fn subclass_foreign(&self, window: WindowHandle) -> Result<ProcAddress, HookError> {
        let mut state = self.shared.state.lock();
        let address = state.allocate_procedure();
        let w = state.live(window)?;
        let previous = w.procedure;
        w.foreign.insert(address, previous);
        w.procedure = address;
        Ok(address)
    }

    /// Removes a foreign procedure installed by [`Self::subclass_foreign`], as
    /// a well-behaved third party would when it is the top of the chain.
    pub fn unsubclass_foreign(&self, window: WindowHandle, foreign: ProcAddress) -> Result<(), HookError> {
        let mut state = self.shared.state.lock();
        let w = state.live(window)?;
        if w.procedure != foreign {
            return Err(HookError::Platform {
                call: "unsubclass_foreign",
                message: format!("{foreign:#x} is not the current procedure"),
            });
        }
        if let Some(previous) = w.foreign.remove(&foreign) {
            w.procedure = previous;
        }
        Ok(())
    }

    /// Delivers a message to the window's current procedure, as the OS would.
    /// Returns `None` if the window is not alive.
    pub fn send_message(&self, window: WindowHandle, code: u32, wparam: usize, lparam: isize) -> Option<isize> {
        let timestamp_ms = {
            let mut state = self.shared.state.lock();
            state.clock_ms += 1;
            state.clock_ms
        };
        self.send(RawMessage::new(window, code, wparam, lparam, timestamp_ms))
    }

    /// Delivers a prebuilt message (e.g. one carrying a parameter snapshot).
    pub fn send(&self, raw: RawMessage) -> Option<isize> {
        let procedure = {
            let state = self.shared.state.lock();
            let w = state.windows.get(&raw.window).filter(|w| w.alive)?;
            w.procedure
        };
        Some(self.shared.call(procedure, &raw))
    }

    /// Codes received by the host procedure of `window`, in order.
    pub fn delivered(&self, window: WindowHandle) -> Vec<u32> {
        self.shared
            .state
            .lock()
            .delivered
            .iter()
            .filter(|d| d.window == window)
            .map(|d| d.code)
            .collect()
    }

    /// Every delivery to any host procedure, in order.
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.shared.state.lock().delivered.clone()
    }

    /// Codes seen by foreign procedures of `window`.
    pub fn foreign_delivered(&self, window: WindowHandle) -> Vec<u32> {
        self.shared
            .state
            .lock()
            .foreign_seen
            .iter()
            .filter(|d| d.window == window)
            .map(|d| d.code)
            .collect()
    }

    pub fn host_procedure(&self, window: WindowHandle) -> Option<ProcAddress> {
        self.shared.state.lock().windows.get(&window).map(|w| w.host_procedure)
    }

    pub fn is_routed(&self, window: WindowHandle) -> bool {
        self.shared
            .state
            .lock()
            .windows
            .get(&window)
            .map_or(false, |w| w.route.is_some())
    }

    /// Makes every subsequent `restore_procedure` fail.
    pub fn set_restore_failure(&self, fail: bool) {
        self.shared.state.lock().fail_restore = fail;
    }

    /// Makes `top_level_windows` fail.
    pub fn set_enumeration_failure(&self, fail: bool) {
        self.shared.state.lock().fail_enumeration = fail;
    }
}

fn fresh_window(host: ProcAddress) -> MockWindow {
    MockWindow {
        alive: true,
        host_procedure: host,
        procedure: host,
        tag: None,
        foreign: HashMap::new(),
        route: None,
    }
}

impl WindowSystem for MockWindowSystem {
    fn is_window(&self, window: WindowHandle) -> bool {
        self.shared
            .state
            .lock()
            .windows
            .get(&window)
            .map_or(false, |w| w.alive)
    }

    fn top_level_windows(&self) -> Result<Vec<WindowHandle>, HookError> {
        let state = self.shared.state.lock();
        if state.fail_enumeration {
            return Err(HookError::Platform {
                call: "EnumWindows",
                message: "simulated failure".to_string(),
            });
        }
        let mut windows: Vec<_> = state
            .windows
            .iter()
            .filter(|(_, w)| w.alive)
            .map(|(&handle, _)| handle)
            .collect();
        windows.sort();
        Ok(windows)
    }

    fn current_procedure(&self, window: WindowHandle) -> Result<ProcAddress, HookError> {
        Ok(self.shared.state.lock().live(window)?.procedure)
    }

    fn trampoline(&self) -> ProcAddress {
        TRAMPOLINE
    }

    fn install_trampoline(
        &self,
        window: WindowHandle,
        route: Arc<dyn MessageRoute>,
    ) -> Result<Arc<dyn OriginalProcedure>, HookError> {
        let mut state = self.shared.state.lock();
        let w = state.live(window)?;
        let original = w.procedure;
        w.procedure = TRAMPOLINE;
        w.route = Some(RouteEntry { route, original });
        Ok(Arc::new(MockProcedure {
            shared: Arc::clone(&self.shared),
            address: original,
        }))
    }

    fn restore_procedure(&self, window: WindowHandle, original: ProcAddress) -> Result<(), HookError> {
        let mut state = self.shared.state.lock();
        if state.fail_restore {
            return Err(HookError::Platform {
                call: "restore_procedure",
                message: "simulated failure".to_string(),
            });
        }
        let w = state.live(window)?;
        w.procedure = original;
        w.route = None;
        Ok(())
    }

    fn window_tag(&self, window: WindowHandle) -> Option<u64> {
        self.shared
            .state
            .lock()
            .windows
            .get(&window)
            .filter(|w| w.alive)
            .and_then(|w| w.tag)
    }

    fn set_window_tag(&self, window: WindowHandle, tag: Option<u64>) -> Result<(), HookError> {
        self.shared.state.lock().live(window)?.tag = tag;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wndmsg_core::domain::codes::{WM_CLOSE, WM_SIZE};

    struct Counting(Mutex<u32>);

    impl MessageRoute for Counting {
        fn route(&self, _raw: RawMessage) -> Option<isize> {
            *self.0.lock() += 1;
            None
        }
    }

    #[test]
    fn test_unhooked_window_delivers_to_host_procedure() {
        // Arrange
        let system = MockWindowSystem::new();
        let window = system.create_window();

        // Act
        let result = system.send_message(window, WM_CLOSE, 0, 0);

        // Assert
        assert_eq!(result, Some(WM_CLOSE as isize));
        assert_eq!(system.delivered(window), vec![WM_CLOSE]);
    }

    #[test]
    fn test_trampoline_falls_back_to_original_when_route_declines() {
        // Arrange
        let system = MockWindowSystem::new();
        let window = system.create_window();
        let route = Arc::new(Counting(Mutex::new(0)));
        let original = system
            .install_trampoline(window, route.clone())
            .expect("install");

        // Act
        let result = system.send_message(window, WM_SIZE, 0, 0);

        // Assert
        assert_eq!(result, Some(WM_SIZE as isize));
        assert_eq!(*route.0.lock(), 1);
        assert_eq!(Some(original.address()), system.host_procedure(window));
        assert_eq!(system.current_procedure(window), Ok(TRAMPOLINE));
    }

    #[test]
    fn test_foreign_procedure_records_and_forwards() {
        // Arrange
        let system = MockWindowSystem::new();
        let window = system.create_window();
        let foreign = system.subclass_foreign(window).expect("subclass");

        // Act
        system.send_message(window, WM_CLOSE, 0, 0);

        // Assert
        assert_eq!(system.current_procedure(window), Ok(foreign));
        assert_eq!(system.foreign_delivered(window), vec![WM_CLOSE]);
        assert_eq!(system.delivered(window), vec![WM_CLOSE]);
    }

    #[test]
    fn test_destroy_sends_ncdestroy_and_invalidates_handle() {
        // Arrange
        let system = MockWindowSystem::new();
        let window = system.create_window();

        // Act
        assert!(system.destroy(window));

        // Assert
        assert!(!system.is_window(window));
        assert_eq!(system.delivered(window), vec![WM_DESTROY, WM_NCDESTROY]);
        assert_eq!(system.send_message(window, WM_CLOSE, 0, 0), None);
        assert!(!system.destroy(window));
    }

    #[test]
    fn test_recreate_reuses_handle_with_new_host_procedure() {
        // Arrange
        let system = MockWindowSystem::new();
        let window = system.create_window();
        let first_host = system.host_procedure(window);
        system.set_window_tag(window, Some(5)).expect("tag");
        system.destroy(window);

        // Act
        assert!(system.recreate_with_same_handle(window));

        // Assert
        assert!(system.is_window(window));
        assert_ne!(system.host_procedure(window), first_host);
        assert_eq!(system.window_tag(window), None);
    }

    #[test]
    fn test_enumeration_lists_live_windows_only() {
        let system = MockWindowSystem::new();
        let a = system.create_window();
        let b = system.create_window();
        system.destroy(a);
        assert_eq!(system.top_level_windows(), Ok(vec![b]));
    }
}
