//! Summary output: text lines or JSON, to stdout or a file.
mod format;
mod writers;


pub use writers::{render_summary, write_summary};
