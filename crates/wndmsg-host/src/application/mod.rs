//! Application layer of the window message listener.
//!
//! The application layer sits between the pure pipeline in `wndmsg-core`
//! and the OS-facing hook backends in `infrastructure`.  It depends on the
//! [`WindowSystem`](crate::infrastructure::hook::WindowSystem) trait rather
//! than on Win32 directly, so the whole lifecycle runs against the in-memory
//! backend in tests.
//!
//! # Sub-modules
//!
//! - **`lifecycle`** – The `MessageListenerSubsystem`: hooks the host's
//!   windows on startup, routes every intercepted message through the
//!   classification pipeline, and unhooks everything on shutdown.

pub mod lifecycle;
