//! CLI argument types and parsing helpers.
mod cli;
pub(crate) mod parsers;
mod types;


pub use cli::RunArgs;
pub use types::{HttpMethod, OutputFormat};
