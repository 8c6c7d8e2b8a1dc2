use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult, ConfigError};

use super::types::SimulationFile;

/// Files looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILES: [&str; 2] = ["volley.toml", "volley.json"];

/// A parsed simulation file plus the directory its relative paths resolve against.
#[derive(Debug)]
pub struct LoadedConfig {
    pub file: SimulationFile,
    pub base_dir: PathBuf,
}

/// Loads the simulation from the provided path or the default locations.
///
/// # Errors
///
/// Returns an error when no file is found or it cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> AppResult<LoadedConfig> {
    let path = match path {
        Some(path) => PathBuf::from(path),
        None => DEFAULT_CONFIG_FILES
            .into_iter()
            .map(PathBuf::from)
            .find(|candidate| candidate.exists())
            .ok_or_else(|| AppError::config(ConfigError::MissingConfig))?,
    };

    let file = load_config_file(&path)?;
    let base_dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    Ok(LoadedConfig { file, base_dir })
}

pub(crate) fn load_config_file(path: &Path) -> AppResult<SimulationFile> {
    let content = std::fs::read_to_string(path).map_err(|err| {
        AppError::config(ConfigError::ReadConfig {
            path: path.to_path_buf(),
            source: err,
        })
    })?;
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => toml::from_str(&content).map_err(|err| {
            AppError::config(ConfigError::ParseToml {
                path: path.to_path_buf(),
                source: err,
            })
        }),
        Some("json") => serde_json::from_str(&content).map_err(|err| {
            AppError::config(ConfigError::ParseJson {
                path: path.to_path_buf(),
                source: err,
            })
        }),
        Some(ext) => Err(AppError::config(ConfigError::UnsupportedExtension {
            ext: ext.to_owned(),
        })),
        None => Err(AppError::config(ConfigError::MissingExtension)),
    }
}
