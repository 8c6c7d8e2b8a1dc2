//! Core library for the `volley` load generator.
//!
//! A simulation is data: an ordered scenario of requests, pauses, and feeds,
//! plus an open-workload injection profile. The engine starts virtual users on
//! that schedule, each walking the scenario with its own session, and the
//! reporter folds every request outcome into latency and error statistics.
//! The `volley` binary is a thin wrapper over [`entry::run`].
pub mod app;
pub mod args;
pub mod config;
pub mod engine;
pub mod entry;
pub mod error;
pub mod exit_codes;
pub mod feeder;
pub mod http;
pub mod injector;
pub mod logger;
pub mod metrics;
pub mod scenario;
pub mod session;
pub mod shutdown;
pub mod shutdown_handlers;
pub mod sinks;
