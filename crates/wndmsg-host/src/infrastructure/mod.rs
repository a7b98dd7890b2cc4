//! Infrastructure layer: OS-facing adapters.
//!
//! - **`hook`**    – window procedure subclassing behind the `WindowSystem`
//!   trait, with a Win32 backend and an in-memory mock.
//! - **`storage`** – TOML configuration persistence.
//!
//! **Dependency rule**: this layer may depend on `wndmsg_core`, but MUST NOT
//! import the `application` layer.

pub mod hook;
pub mod storage;
