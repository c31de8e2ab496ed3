//! Configuration for repoctx: TOML file, `REPOCTX_*` environment overrides, validation.

pub mod config;

pub use config::Config;

use std::path::PathBuf;

/// Priority: explicit path > `REPOCTX_CONFIG` env > `config/default.toml`.
#[must_use]
pub fn resolve_config_path(cli: Option<PathBuf>) -> PathBuf {
    if let Some(path) = cli {
        return path;
    }
    if let Ok(path) = std::env::var("REPOCTX_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from("config/default.toml")
}
