//! Simulation file loading and mapping onto the run model.
mod apply;
mod loader;
mod parse;
mod run;
pub mod types;


pub use apply::{Simulation, build_simulation};
pub use loader::{DEFAULT_CONFIG_FILES, LoadedConfig, load_config};
pub use run::{
    DEFAULT_GRACE_PERIOD, DEFAULT_MAX_CONNECTIONS, DEFAULT_RAMP_DURATION,
    DEFAULT_REQUEST_TIMEOUT, DEFAULT_USERS, OutputConfig, RunConfig,
};

#[cfg(test)]
pub(crate) use loader::load_config_file;
