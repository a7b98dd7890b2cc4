//! Window procedure hooks.
//!
//! A hooked window has its procedure replaced by a trampoline.  The
//! trampoline hands every message to a [`MessageRoute`] (the subsystem),
//! which classifies it when appropriate and then calls the window's original
//! procedure through the [`OriginalProcedure`] capability kept in the
//! window's [`HookRecord`].
//!
//! # Backends
//!
//! [`WindowSystem`] abstracts the OS.  On Windows, [`windows::Win32WindowSystem`]
//! subclasses with `SetWindowLongPtrW(GWLP_WNDPROC)`.  Tests and non-Windows
//! builds use [`mock::MockWindowSystem`], an in-memory window table.
//!
//! # Handle reuse
//!
//! Window handles are recycled by the OS.  Every install stamps the window
//! with a generation tag; a record whose tag no longer matches the window
//! belongs to a destroyed window and is discarded instead of trusted.
//!
//! # Locking
//!
//! Install and uninstall hold the table's write lock across the procedure
//! swap.  Routing holds the read lock while it checks the hook state and
//! classifies ([`HookRegistry::enter`]), so an uninstall waits for any capture
//! already in flight.  The lock is released before the original procedure is
//! invoked.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use wndmsg_core::{RawMessage, WindowHandle};

pub mod mock;

#[cfg(target_os = "windows")]
pub mod windows;

/// Address of a window procedure.  Zero means "none".
pub type ProcAddress = usize;

/// Error type for hook operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HookError {
    /// The handle does not name a live window.
    #[error("window {0} is not a valid window")]
    InvalidWindow(WindowHandle),

    /// Another component subclassed the window on top of the trampoline.
    #[error("window {0} was subclassed by another component after it was hooked")]
    AlreadyHookedByOther(WindowHandle),

    /// The original procedure could not be put back.  The window keeps the
    /// trampoline in its chain, forwarding only.
    #[error("failed to restore the original procedure of window {0}")]
    RestoreFailed(WindowHandle),

    #[error("{call} failed: {message}")]
    Platform { call: &'static str, message: String },
}

impl HookError {
    /// Only a failed restore leaves a window in a state the host must hear about.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::RestoreFailed(_))
    }
}

/// What to do when a third party has subclassed a hooked window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForeignHookPolicy {
    /// Log and leave the window alone.
    #[default]
    Skip,
    /// Accept the foreign procedure above the trampoline.  Messages still
    /// pass through the trampoline, so the existing record stays in use.
    Adopt,
}

/// The window's procedure as it was before the trampoline went in.
pub trait OriginalProcedure: Send + Sync {
    fn address(&self) -> ProcAddress;

    /// Calls the procedure with the message's exact parameters and returns
    /// its result.
    fn invoke(&self, raw: &RawMessage) -> isize;
}

/// Receiver of every message that reaches the trampoline.
pub trait MessageRoute: Send + Sync {
    /// Handles `raw` and returns the result the trampoline must hand back to
    /// the OS.  `None` means the route knows nothing about this window; the
    /// backend then calls the original procedure it saved at install time.
    fn route(&self, raw: RawMessage) -> Option<isize>;
}

/// OS window operations needed to subclass a window.
pub trait WindowSystem: Send + Sync {
    fn is_window(&self, window: WindowHandle) -> bool;

    /// Top-level windows owned by the current process.
    fn top_level_windows(&self) -> Result<Vec<WindowHandle>, HookError>;

    fn current_procedure(&self, window: WindowHandle) -> Result<ProcAddress, HookError>;

    /// Address of the backend's trampoline procedure.
    fn trampoline(&self) -> ProcAddress;

    /// Swaps the window's procedure for the trampoline, routing its messages
    /// to `route`, and returns the procedure that was replaced.
    fn install_trampoline(
        &self,
        window: WindowHandle,
        route: Arc<dyn MessageRoute>,
    ) -> Result<Arc<dyn OriginalProcedure>, HookError>;

    /// Puts `original` back as the window's procedure and stops routing.
    fn restore_procedure(&self, window: WindowHandle, original: ProcAddress) -> Result<(), HookError>;

    fn window_tag(&self, window: WindowHandle) -> Option<u64>;

    /// Sets (`Some`) or clears (`None`) the window's generation tag.
    fn set_window_tag(&self, window: WindowHandle, tag: Option<u64>) -> Result<(), HookError>;
}

/// Whether the trampoline of a record still classifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookState {
    Installed,
    /// Restore failed; the trampoline only forwards.
    Orphaned,
}

/// Bookkeeping for one hooked window.
#[derive(Clone)]
pub struct HookRecord {
    pub window: WindowHandle,
    pub original: Arc<dyn OriginalProcedure>,
    pub generation: u64,
    pub state: HookState,
}

impl fmt::Debug for HookRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRecord")
            .field("window", &self.window)
            .field("original", &format_args!("{:#x}", self.original.address()))
            .field("generation", &self.generation)
            .field("state", &self.state)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed,
    /// The window was already hooked by this registry.
    AlreadyInstalled,
    /// A stale record for a recycled handle was discarded first.
    Reinstalled,
    /// A foreign procedure sits above the trampoline and was accepted.
    Adopted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UninstallOutcome {
    Restored,
    NotInstalled,
    /// The window no longer exists (or its handle was recycled); the record
    /// was dropped without touching the OS.
    WindowGone,
}

/// Table of hooked windows, owned by one subsystem instance.
pub struct HookRegistry {
    system: Arc<dyn WindowSystem>,
    records: RwLock<HashMap<WindowHandle, HookRecord>>,
    next_generation: AtomicU64,
    policy: ForeignHookPolicy,
}

impl HookRegistry {
    pub fn new(system: Arc<dyn WindowSystem>, policy: ForeignHookPolicy) -> Self {
        Self {
            system,
            records: RwLock::new(HashMap::new()),
            next_generation: AtomicU64::new(1),
            policy,
        }
    }

    pub fn system(&self) -> &Arc<dyn WindowSystem> {
        &self.system
    }

    pub fn policy(&self) -> ForeignHookPolicy {
        self.policy
    }

    /// Hooks `window`, routing its messages to `route`.
    ///
    /// # Errors
    ///
    /// - [`HookError::InvalidWindow`] for a stale or unknown handle.
    /// - [`HookError::AlreadyHookedByOther`] when a third party subclassed the
    ///   window after we did and the policy is [`ForeignHookPolicy::Skip`].
    /// - [`HookError::Platform`] when the OS refuses the swap.
    pub fn install(&self, window: WindowHandle, route: Arc<dyn MessageRoute>) -> Result<InstallOutcome, HookError> {
        let mut records = self.records.write();

        if !self.system.is_window(window) {
            return Err(HookError::InvalidWindow(window));
        }
        let current = self.system.current_procedure(window)?;

        let mut recycled = false;
        if let Some(record) = records.get_mut(&window) {
            if self.system.window_tag(window) != Some(record.generation) {
                debug!(%window, generation = record.generation, "discarding record of recycled handle");
                records.remove(&window);
                recycled = true;
            } else if current == self.system.trampoline() {
                if record.state == HookState::Orphaned {
                    // The foreign procedure above us went away again
                    record.state = HookState::Installed;
                    info!(%window, "orphaned hook back in control");
                }
                return Ok(InstallOutcome::AlreadyInstalled);
            } else if current == record.original.address() {
                // Someone put the original back behind our back
                debug!(%window, "trampoline was unhooked externally; reinstalling");
                records.remove(&window);
                recycled = true;
            } else {
                return match self.policy {
                    ForeignHookPolicy::Skip => Err(HookError::AlreadyHookedByOther(window)),
                    ForeignHookPolicy::Adopt => {
                        record.state = HookState::Installed;
                        info!(%window, foreign = format_args!("{current:#x}"), "adopted foreign procedure above hook");
                        Ok(InstallOutcome::Adopted)
                    }
                };
            }
        }

        let original = self.system.install_trampoline(window, route)?;
        if original.address() == 0 {
            // Nothing to forward to; undo and refuse
            let _ = self.system.restore_procedure(window, 0);
            return Err(HookError::Platform {
                call: "install_trampoline",
                message: format!("window {window} had no procedure"),
            });
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        if let Err(e) = self.system.set_window_tag(window, Some(generation)) {
            let _ = self.system.restore_procedure(window, original.address());
            return Err(e);
        }

        info!(
            %window,
            original = format_args!("{:#x}", original.address()),
            generation,
            "window hooked"
        );
        records.insert(
            window,
            HookRecord {
                window,
                original,
                generation,
                state: HookState::Installed,
            },
        );

        Ok(if recycled {
            InstallOutcome::Reinstalled
        } else {
            InstallOutcome::Installed
        })
    }

    /// Restores the original procedure of `window`.  Calling it again is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// [`HookError::RestoreFailed`] when a third party sits above the
    /// trampoline.  The record is kept as [`HookState::Orphaned`] so the
    /// trampoline keeps forwarding to the original.
    pub fn uninstall(&self, window: WindowHandle) -> Result<UninstallOutcome, HookError> {
        let mut records = self.records.write();

        let Some(record) = records.get_mut(&window) else {
            return Ok(UninstallOutcome::NotInstalled);
        };

        if !self.system.is_window(window) || self.system.window_tag(window) != Some(record.generation) {
            debug!(%window, "hooked window is gone; dropping record");
            records.remove(&window);
            return Ok(UninstallOutcome::WindowGone);
        }

        let current = self.system.current_procedure(window)?;
        let original = record.original.address();

        if current == self.system.trampoline() {
            if let Err(e) = self.system.restore_procedure(window, original) {
                record.state = HookState::Orphaned;
                error!(%window, error = %e, "failed to restore original window procedure");
                return Err(HookError::RestoreFailed(window));
            }
            let _ = self.system.set_window_tag(window, None);
            records.remove(&window);
            info!(%window, "window unhooked");
            Ok(UninstallOutcome::Restored)
        } else if current == original {
            let _ = self.system.set_window_tag(window, None);
            records.remove(&window);
            debug!(%window, "original procedure already in place");
            Ok(UninstallOutcome::Restored)
        } else {
            record.state = HookState::Orphaned;
            error!(
                %window,
                foreign = format_args!("{current:#x}"),
                "cannot unhook: another procedure is chained above the trampoline"
            );
            Err(HookError::RestoreFailed(window))
        }
    }

    /// Uninstalls every record and returns the windows that could not be
    /// restored.
    pub fn uninstall_all(&self) -> Vec<WindowHandle> {
        let mut failed = Vec::new();
        for window in self.windows() {
            match self.uninstall(window) {
                Ok(_) => {}
                Err(HookError::RestoreFailed(window)) => failed.push(window),
                Err(e) => warn!(%window, error = %e, "uninstall failed"),
            }
        }
        failed
    }

    /// Original procedure and state of a hooked window, cloned out of the
    /// table so the caller can invoke it without holding the lock.
    pub fn lookup(&self, window: WindowHandle) -> Option<(Arc<dyn OriginalProcedure>, HookState)> {
        self.records
            .read()
            .get(&window)
            .map(|record| (Arc::clone(&record.original), record.state))
    }

    /// Runs `gate` with the window's hook state while the read lock is held,
    /// then hands back the original procedure for the caller to invoke
    /// unlocked.  Uninstall takes the write lock, so once it returns no `gate`
    /// for that window is still running.
    pub fn enter<F>(&self, window: WindowHandle, gate: F) -> Option<Arc<dyn OriginalProcedure>>
    where
        F: FnOnce(HookState),
    {
        let records = self.records.read();
        let record = records.get(&window)?;
        gate(record.state);
        Some(Arc::clone(&record.original))
    }

    /// Drops the record of a destroyed window without touching the OS.
    pub fn forget(&self, window: WindowHandle) -> bool {
        let removed = self.records.write().remove(&window).is_some();
        if removed {
            debug!(%window, "hook record dropped on window destruction");
        }
        removed
    }

    pub fn record(&self, window: WindowHandle) -> Option<HookRecord> {
        self.records.read().get(&window).cloned()
    }

    pub fn is_installed(&self, window: WindowHandle) -> bool {
        matches!(self.lookup(window), Some((_, HookState::Installed)))
    }

    /// Hooked windows, sorted by handle.
    pub fn windows(&self) -> Vec<WindowHandle> {
        let mut windows: Vec<_> = self.records.read().keys().copied().collect();
        windows.sort();
        windows
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
