//! Configuration file support.
//!
//! # Configuration File Format
//!
//! ```toml
//! [search]
//! fiction_url = "https://libgen.is/fiction/"
//! scitech_url = "https://libgen.is/search.php"
//! language = "English"
//! format = "epub"
//! normalize_titles = true
//! timeout_seconds = 30
//!
//! [mirrors]
//! base_url = "https://library.lol"
//! connect_timeout_seconds = 10
//! read_timeout_seconds = 20
//! probe_timeout_seconds = 5
//!
//! [downloads]
//! destination = "./books"
//! staging = "./books/.staging"
//! verify_checksum = false
//!
//! [retry]
//! max_retries = 5
//! delay_seconds = 5
//!
//! [matching]
//! author_policy = "substring"
//!
//! [logging]
//! level = "info"
//! format = "pretty"
//! ```

use std::path::{Path, PathBuf};

use super::{Config, ENV_PREFIX};

/// Name of the per-directory config file
const LOCAL_CONFIG_FILE: &str = "autobook.toml";

/// Configuration file errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Per-user config file location, e.g. `~/.config/autobook/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("autobook").join("config.toml"))
}

/// Look for a config file in the working directory, then the user config dir
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if local.is_file() {
        return Some(local);
    }
    default_config_path().filter(|path| path.is_file())
}

/// Load configuration.
///
/// An explicit `path` must exist. Without one, the first file found by
/// [`find_config_file`] is used, if any. Environment variables override both.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    match path {
        Some(path) => {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        None => {
            if let Some(found) = find_config_file() {
                tracing::debug!("Using config file {}", found.display());
                builder = builder.add_source(config::File::from(found.as_path()).required(false));
            }
        }
    }

    let settings = builder
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}

impl Config {
    /// Save configuration to a TOML file, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }
}
