//! Application-level configuration loading, including the participant color
//! palette and the identity cache location.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use rand::seq::IndexedRandom;
use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "SCRUM_POKER_CONFIG_PATH";
/// Default location of the cached participant identity.
const DEFAULT_IDENTITY_PATH: &str = "config/identity.json";
/// Fallback color returned when the palette is empty.
const DEFAULT_COLOR: &str = "#9E9E9E";

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    colors: Vec<String>,
    identity_path: PathBuf,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to the
    /// baked-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        colors = app_config.colors.len(),
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Pick a random color from the palette for a newly joined participant.
    /// Colors may repeat across participants.
    pub fn random_color(&self) -> String {
        self.colors
            .choose(&mut rand::rng())
            .cloned()
            .unwrap_or_else(|| DEFAULT_COLOR.to_owned())
    }

    /// Location of the cached participant identity file.
    pub fn identity_path(&self) -> &PathBuf {
        &self.identity_path
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            colors: default_colors(),
            identity_path: PathBuf::from(DEFAULT_IDENTITY_PATH),
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    colors: Option<Vec<String>>,
    identity_path: Option<PathBuf>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = AppConfig::default();
        Self {
            colors: value
                .colors
                .filter(|colors| !colors.is_empty())
                .unwrap_or(defaults.colors),
            identity_path: value.identity_path.unwrap_or(defaults.identity_path),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Built-in participant palette shipped with the binary.
fn default_colors() -> Vec<String> {
    [
        "#E57373", "#64B5F6", "#81C784", "#FFD54F", "#BA68C8", "#9575CD", "#4DB6AC", "#FF8A65",
    ]
    .into_iter()
    .map(str::to_owned)
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_color_comes_from_the_palette() {
        let config = AppConfig::default();
        let palette = default_colors();
        for _ in 0..32 {
            assert!(palette.contains(&config.random_color()));
        }
    }

    #[test]
    fn empty_palette_in_config_keeps_defaults() {
        let raw = RawConfig {
            colors: Some(Vec::new()),
            identity_path: None,
        };
        let config: AppConfig = raw.into();
        assert_eq!(config.colors, default_colors());
    }
}
