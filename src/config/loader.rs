//! Reading patch sets from TOML.
//!
//! Patch sets come from three places: a `--config` file, the project's
//! `native-patches/` directory, or a preset compiled into the binary. Every
//! load error names which one failed.

use crate::config::schema::{PatchConfig, ValidationError};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Where a patch set was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOrigin {
    /// Text handed to [`load_from_str`].
    Inline,
    File(PathBuf),
    /// A built-in preset, by name.
    Preset(&'static str),
}

impl fmt::Display for ConfigOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigOrigin::Inline => write!(f, "inline patch set"),
            ConfigOrigin::File(path) => write!(f, "{}", path.display()),
            ConfigOrigin::Preset(name) => write!(f, "preset {name}"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read patch set {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{origin}: malformed patch set TOML: {source}")]
    Toml {
        origin: ConfigOrigin,
        #[source]
        source: toml_edit::de::Error,
    },

    /// The TOML parsed but the patch set named `name` failed validation.
    /// Issues carry the offending insert ids.
    #[error("{origin}: patch set '{name}' is invalid:\n{source}")]
    Validation {
        origin: ConfigOrigin,
        name: String,
        #[source]
        source: ValidationError,
    },
}

impl ConfigError {
    pub fn origin(&self) -> ConfigOrigin {
        match self {
            ConfigError::Io { path, .. } => ConfigOrigin::File(path.clone()),
            ConfigError::Toml { origin, .. } | ConfigError::Validation { origin, .. } => {
                origin.clone()
            }
        }
    }
}

/// Parse and validate a patch set from TOML text.
pub fn load_from_str(input: &str) -> Result<PatchConfig, ConfigError> {
    parse(input, ConfigOrigin::Inline)
}

/// Read, parse and validate a patch set file.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<PatchConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&contents, ConfigOrigin::File(path.to_path_buf()))
}

/// Parse a preset embedded in the binary.
pub(crate) fn load_preset(name: &'static str, input: &str) -> Result<PatchConfig, ConfigError> {
    parse(input, ConfigOrigin::Preset(name))
}

fn parse(input: &str, origin: ConfigOrigin) -> Result<PatchConfig, ConfigError> {
    let config: PatchConfig = match toml_edit::de::from_str(input) {
        Ok(config) => config,
        Err(source) => return Err(ConfigError::Toml { origin, source }),
    };

    if let Err(source) = config.validate() {
        return Err(ConfigError::Validation {
            origin,
            name: config.meta.name.clone(),
            source,
        });
    }

    debug!(
        %origin,
        name = %config.meta.name,
        inserts = config.inserts.len(),
        "loaded patch set"
    );
    Ok(config)
}
