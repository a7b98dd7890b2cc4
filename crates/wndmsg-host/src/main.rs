//! wndmsg-watch: runs the window message listener against a live process.
//!
//! Creates a hidden top-level window on its own message-loop thread, hooks
//! it, and logs every translated event until Ctrl+C.  Useful for watching
//! what the listener reports when devices are plugged in, the display is
//! reconfigured, or the session is locked.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config()                   -- TOML config, defaults if absent
//!  └─ watch window thread             -- RegisterClassW + message loop
//!  └─ MessageListenerSubsystem
//!       ├─ on_engine_startup()        -- hooks the watch window
//!       └─ dispatch_tick() every 16ms (Tokio interval)
//!  └─ Ctrl+C → on_engine_shutdown() → WM_CLOSE to the watch window
//! ```

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use wndmsg_host::infrastructure::storage::config::{load_config, ListenerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config().context("failed to load configuration")?;

    // `RUST_LOG` wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level)),
        )
        .init();

    tracing::info!("wndmsg-watch starting");
    run(config).await
}

#[cfg(target_os = "windows")]
async fn run(config: ListenerConfig) -> anyhow::Result<()> {
    use std::sync::Arc;
    use std::time::Duration;

    use tracing::{debug, info, warn};
    use wndmsg_core::{CategoryFilter, EventPayload};
    use wndmsg_host::application::lifecycle::MessageListenerSubsystem;
    use wndmsg_host::infrastructure::hook::windows::Win32WindowSystem;

    let window = watch_window::WatchWindow::spawn()?;
    info!(window = %window.handle(), "watch window created");

    let subsystem = Arc::new(MessageListenerSubsystem::new(
        Arc::new(Win32WindowSystem::new()),
        &config,
    )?);
    let report = subsystem.on_engine_startup()?;
    info!(
        hooked = report.installed.len(),
        skipped = report.skipped.len(),
        "listening; press Ctrl+C to stop"
    );

    subsystem.subscribe(CategoryFilter::all(), |event| {
        // Query/pending device notifications are noise at info level.
        if let EventPayload::DeviceChange { kind, .. } = &event.payload {
            if !kind.is_arrival_or_removal() {
                debug!(sequence = event.sequence, window = %event.window, ?kind, "device notification");
                return Ok(());
            }
        }
        info!(
            sequence = event.sequence,
            category = %event.category,
            window = %event.window,
            timestamp_ms = event.timestamp_ms,
            payload = ?event.payload,
            "event"
        );
        Ok(())
    });

    // ── Dispatch ticker ───────────────────────────────────────────────────────
    let ticker = {
        let subsystem = Arc::clone(&subsystem);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(16));
            loop {
                interval.tick().await;
                if let Err(e) = subsystem.dispatch_tick() {
                    warn!("dispatch tick skipped: {e}");
                }
            }
        })
    };

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;
    info!("shutdown requested");

    ticker.abort();
    let shutdown = subsystem.on_engine_shutdown();
    window.close();

    let report = shutdown?;
    let metrics = subsystem.metrics();
    info!(
        unhooked = report.unhooked,
        flushed = report.flushed.events,
        captured = metrics.captured,
        delivered = metrics.delivered,
        dropped = metrics.dropped,
        "wndmsg-watch stopped"
    );
    Ok(())
}

#[cfg(not(target_os = "windows"))]
async fn run(_config: ListenerConfig) -> anyhow::Result<()> {
    anyhow::bail!("wndmsg-watch hooks Win32 window procedures and only runs on Windows")
}

#[cfg(target_os = "windows")]
mod watch_window {
    //! A hidden top-level window with its own message loop.
    //!
    //! All `unsafe` blocks are Win32 FFI calls on handles owned by this module.

    use std::sync::mpsc;
    use std::thread::JoinHandle;

    use anyhow::Context;
    use tracing::warn;
    use windows::core::{w, PCWSTR};
    use windows::Win32::Foundation::{HINSTANCE, HWND, LPARAM, LRESULT, WPARAM};
    use windows::Win32::System::LibraryLoader::GetModuleHandleW;
    use windows::Win32::System::RemoteDesktop::{
        WTSRegisterSessionNotification, WTSUnRegisterSessionNotification, NOTIFY_FOR_THIS_SESSION,
    };
    use windows::Win32::UI::WindowsAndMessaging::{
        CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW, GetMessageW,
        PostMessageW, PostQuitMessage, RegisterClassW, TranslateMessage, CW_USEDEFAULT, MSG,
        WINDOW_EX_STYLE, WM_CLOSE, WM_DESTROY, WNDCLASSW, WS_OVERLAPPEDWINDOW,
    };

    use wndmsg_core::WindowHandle;

    pub struct WatchWindow {
        handle: WindowHandle,
        thread: JoinHandle<()>,
    }

    impl WatchWindow {
        /// Starts the message-loop thread and waits for its window.
        pub fn spawn() -> anyhow::Result<Self> {
            let (tx, rx) = mpsc::channel();
            let thread = std::thread::Builder::new()
                .name("wndmsg-watch-window".to_string())
                .spawn(move || message_loop(tx))
                .context("failed to start the watch window thread")?;

            let handle = rx
                .recv()
                .context("watch window thread exited early")?
                .map_err(|e| anyhow::anyhow!("failed to create the watch window: {e}"))?;
            Ok(Self { handle, thread })
        }

        pub fn handle(&self) -> WindowHandle {
            self.handle
        }

        /// Asks the window to close and waits for its thread.
        pub fn close(self) {
            // SAFETY: PostMessageW only queues a message; a stale handle fails
            // cleanly.
            let posted = unsafe {
                PostMessageW(
                    Some(HWND(self.handle.raw() as *mut _)),
                    WM_CLOSE,
                    WPARAM(0),
                    LPARAM(0),
                )
            };
            if let Err(e) = posted {
                warn!("could not post WM_CLOSE to the watch window: {e}");
                return;
            }
            if self.thread.join().is_err() {
                warn!("watch window thread panicked");
            }
        }
    }

    fn create_window() -> windows::core::Result<HWND> {
        // SAFETY: every pointer passed below is either null or a static wide
        // string; the class outlives the window.
        unsafe {
            let instance: HINSTANCE = GetModuleHandleW(PCWSTR::null())?.into();
            let class = WNDCLASSW {
                lpfnWndProc: Some(watch_proc),
                hInstance: instance,
                lpszClassName: w!("WndMsgWatchWindow"),
                ..Default::default()
            };
            RegisterClassW(&class);

            let window = CreateWindowExW(
                WINDOW_EX_STYLE(0),
                w!("WndMsgWatchWindow"),
                w!("wndmsg-watch"),
                WS_OVERLAPPEDWINDOW,
                CW_USEDEFAULT,
                CW_USEDEFAULT,
                CW_USEDEFAULT,
                CW_USEDEFAULT,
                None,
                None,
                Some(instance),
                None,
            )?;

            if let Err(e) = WTSRegisterSessionNotification(window, NOTIFY_FOR_THIS_SESSION) {
                warn!("session notifications unavailable: {e}");
            }
            Ok(window)
        }
    }

    fn message_loop(tx: mpsc::Sender<Result<WindowHandle, String>>) {
        let window = match create_window() {
            Ok(window) => window,
            Err(e) => {
                let _ = tx.send(Err(e.to_string()));
                return;
            }
        };
        let _ = tx.send(Ok(WindowHandle(window.0 as usize)));

        let mut msg = MSG::default();
        // SAFETY: standard Win32 message pump on the thread that owns the window.
        unsafe {
            while GetMessageW(&mut msg, None, 0, 0).0 > 0 {
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }
    }

    unsafe extern "system" fn watch_proc(window: HWND, msg: u32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
        match msg {
            WM_CLOSE => {
                let _ = DestroyWindow(window);
                LRESULT(0)
            }
            WM_DESTROY => {
                let _ = WTSUnRegisterSessionNotification(window);
                PostQuitMessage(0);
                LRESULT(0)
            }
            _ => DefWindowProcW(window, msg, wparam, lparam),
        }
    }
}
