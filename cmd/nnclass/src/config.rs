//! Settings file handling.
//!
//! Settings are stored in ~/.giztoy/nnclass/config.yaml. Command-line flags
//! take precedence over the file.

use std::path::PathBuf;

use giztoy_nnclass::Settings;

use crate::Cli;

/// Default base configuration directory name.
pub const DEFAULT_BASE_DIR: &str = ".giztoy";
/// Application directory under the base directory.
pub const APP_NAME: &str = "nnclass";
/// Default configuration filename.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Default model directory under the app directory.
pub const DEFAULT_MODEL_DIR: &str = "models";

/// Returns ~/.giztoy/nnclass.
pub fn default_app_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(DEFAULT_BASE_DIR).join(APP_NAME))
}

/// Loads settings from `path`, or the default config path when `None`.
///
/// A missing file is created holding the default settings.
pub fn load_settings(path: Option<&str>) -> anyhow::Result<Settings> {
    let config_path = match path {
        Some(p) => PathBuf::from(p),
        None => default_app_dir()
            .map(|dir| dir.join(DEFAULT_CONFIG_FILE))
            .ok_or_else(|| anyhow::anyhow!("cannot determine config path"))?,
    };

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)?;
        if content.trim().is_empty() {
            return Ok(Settings::default());
        }
        return Ok(serde_yaml::from_str(&content)?);
    }

    let settings = Settings::default();
    std::fs::write(&config_path, serde_yaml::to_string(&settings)?)?;
    Ok(settings)
}

/// Applies command-line overrides and fills in the model directory.
pub fn resolve(cli: &Cli, mut settings: Settings) -> anyhow::Result<Settings> {
    if let Some(kind) = cli.classifier {
        settings.classifier = kind;
    }
    if let Some(order) = cli.order {
        settings.minkowski_order = Some(order);
    }
    if let Some(p) = cli.preprocessing {
        settings.pipeline.preprocessing = p;
    }
    if let Some(e) = cli.extraction {
        settings.pipeline.extraction = e;
    }
    if let Some(seed) = cli.seed {
        settings.seed = Some(seed);
    }
    if let Some(dir) = &cli.model_dir {
        settings.model_dir = Some(dir.clone());
    }
    if settings.model_dir.is_none() {
        let dir = default_app_dir()
            .ok_or_else(|| anyhow::anyhow!("cannot determine model directory"))?;
        settings.model_dir = Some(dir.join(DEFAULT_MODEL_DIR));
    }
    Ok(settings)
}
