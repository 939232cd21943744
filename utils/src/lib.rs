//! Shared infrastructure utilities for tern.
//!
//! - **`atomic_write`**: crash-safe file persistence (temp + rename)
//! - **`diff`**: removed/added line extraction for inline edit previews
//! - **`path`**: `~` expansion

pub mod atomic_write;
pub mod diff;
pub mod path;

pub use atomic_write::{AtomicWriteOptions, FileSyncPolicy, PersistMode, atomic_write, atomic_write_with_options};
pub use diff::{EditLine, edit_lines};
pub use path::{expand_tilde, expand_tilde_path};
