use crate::organize::ConflictPolicy;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

/// Settings loaded from `config.toml` and the environment.
///
/// Precedence (highest wins):
/// 1) Command-line flags (applied by the caller)
/// 2) Environment variables `TAGDROP_ROOT`, `TAGDROP_ON_CONFLICT`, `TAGDROP_RECURSIVE`
/// 3) Config file, if present
/// 4) Struct defaults
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Library root the `<year>/<month>/<artist>` tree is built under.
    pub root: Option<PathBuf>,
    pub on_conflict: ConflictPolicy,
    /// Descend into subdirectories of dropped folders.
    pub recursive: bool,
}

impl Settings {
    /// Load settings. An explicitly given file must exist; the default
    /// location is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ::config::ConfigError> {
        let mut builder = ::config::Config::builder();

        match explicit {
            Some(path) => {
                builder = builder.add_source(::config::File::from(path).required(true));
            }
            None => {
                if let Some(path) = resolve_config_path() {
                    builder =
                        builder.add_source(::config::File::from(path.as_path()).required(false));
                }
            }
        }

        builder = builder.add_source(::config::Environment::with_prefix("TAGDROP").try_parsing(true));

        builder.build()?.try_deserialize()
    }

    pub fn validate(&self) -> Result<(), String> {
        if let Some(root) = &self.root {
            if root.exists() && !root.is_dir() {
                return Err(format!("root {} is not a directory", root.display()));
            }
        }
        Ok(())
    }
}

/// The config path from `TAGDROP_CONFIG_PATH`, or the XDG default.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Some(p) = env::var_os("TAGDROP_CONFIG_PATH") {
        return Some(PathBuf::from(p));
    }
    default_config_path()
}

/// `$XDG_CONFIG_HOME/tagdrop/config.toml`, or `~/.config/tagdrop/config.toml`
/// when `XDG_CONFIG_HOME` is not set.
pub fn default_config_path() -> Option<PathBuf> {
    let config_home = if let Some(xdg) = env::var_os("XDG_CONFIG_HOME") {
        Some(PathBuf::from(xdg))
    } else {
        env::var_os("HOME").map(|home| PathBuf::from(home).join(".config"))
    };

    config_home.map(|d| d.join("tagdrop").join("config.toml"))
}
