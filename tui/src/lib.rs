//! ratatui rendering for tern.
//!
//! Two surfaces: styled [`ScrollbackEntry`](tern_engine::ScrollbackEntry)
//! output inserted above the inline viewport, and the live region drawn
//! inside it. Also owns the crossterm input reader.

mod input;
pub mod markdown;
mod scrollback;
pub mod theme;
mod view;

pub use input::{InputPump, translate};
pub use markdown::render_markdown;
pub use scrollback::{ScrollbackWriter, entry_lines, wrapped_line_count};
pub use theme::{Palette, palette, styles};
pub use view::{CTRL_C_HINT, draw, live_height, live_lines};
