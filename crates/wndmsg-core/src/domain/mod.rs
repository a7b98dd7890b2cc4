//! Domain types shared by every stage of the pipeline.
//!
//! - **`message`** – what the pump thread captures (`RawMessage`) and the
//!   identifiers attached to it (`WindowHandle`, `Category`).
//! - **`event`**   – what listeners receive (`TranslatedEvent` and its
//!   category-specific `EventPayload`).
//! - **`codes`**   – numeric Win32 constants.  They are plain integers so the
//!   pipeline compiles and runs on every platform.

pub mod codes;
pub mod event;
pub mod message;
