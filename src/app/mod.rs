//! One local run: setup, engine, signals, reporting, verdict.
mod runner;

pub use runner::{RunOutcome, run_local};
