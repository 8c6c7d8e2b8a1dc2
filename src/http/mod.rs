//! HTTP boundary: shared client, connection gate, and the request executor.
mod client;
mod executor;
mod gate;

#[cfg(test)]
pub(crate) mod test_support;

pub use client::{BaseUrl, ClientSettings, build_client, preflight};
pub use executor::RequestExecutor;
pub use gate::{ConnectionGate, GatePermit};
