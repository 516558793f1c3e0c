//! Configuration file handling.
//!
//! The configuration is a JSON [`DeviceConfig`]:
//!
//! ```json
//! { "host": "10.0.0.5", "model": "cp950", "verbose": false }
//! ```
//!
//! It lives in `config.json` under the platform config directory unless
//! `--config` names another file. Command-line flags override the file.

use cinema_core::DeviceConfig;
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::Cli;

const CONFIG_FILE: &str = "config.json";

#[derive(Error, Debug)]
pub enum ConfigFileError {
    #[error("Cannot determine the user configuration directory")]
    NoProjectDirs,
    #[error("Cannot read configuration file '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Cannot parse configuration file '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

pub fn get_project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "cinema-control", "cinema-server")
}

/// Path of the configuration file used when `--config` is not given
pub fn default_config_path() -> Result<PathBuf, ConfigFileError> {
    let dirs = get_project_dirs().ok_or(ConfigFileError::NoProjectDirs)?;
    Ok(dirs.config_dir().join(CONFIG_FILE))
}

/// Read a configuration file
pub fn read_file(path: &Path) -> Result<DeviceConfig, ConfigFileError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigFileError::Read {
        path: path.to_owned(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ConfigFileError::Parse {
        path: path.to_owned(),
        source,
    })
}

/// Apply the command-line overrides on top of `config`
pub fn apply_overrides(mut config: DeviceConfig, args: &Cli) -> DeviceConfig {
    if let Some(host) = &args.host {
        config.host = Some(host.clone());
    }
    if let Some(port) = args.port {
        config.port = Some(port);
    }
    if let Some(model) = args.model {
        config.model = model;
    }
    if args.log_traffic {
        config.verbose = true;
    }
    config
}

/// Build the device configuration from the file and the command line.
///
/// An explicit `--config` file must exist. The default file is optional: when
/// it is missing, only the command line is used.
pub fn load(args: &Cli) -> Result<DeviceConfig, ConfigFileError> {
    let config = match &args.config {
        Some(path) => read_file(path)?,
        None => match default_config_path() {
            Ok(path) if path.exists() => {
                log::debug!("Loading configuration from {}", path.display());
                read_file(&path)?
            }
            Ok(_) => DeviceConfig::default(),
            Err(e) => {
                log::debug!("{}", e);
                DeviceConfig::default()
            }
        },
    };
    Ok(apply_overrides(config, args))
}
