// FILE: src/cli/config.rs

use crate::core::types::{Direction, LayoutMode, Size};
use crate::error::{LayoutError, Result};
use crate::LayoutOptions;
use serde::{Deserialize, Serialize};
use std::fs;

/// Optional settings read from `-c/--config`. Command-line flags win over
/// these, which win over [`LayoutOptions::default`].
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub layout_mode: Option<LayoutMode>,
    pub default_direction: Option<Direction>,
    pub debug_mode: Option<bool>,
    pub max_suggestions: Option<usize>,
    pub root_width: Option<f64>,
    pub root_height: Option<f64>,
}

impl ConfigFile {
    /// Defaults overlaid with the values this file sets
    pub fn options(&self) -> LayoutOptions {
        let defaults = LayoutOptions::default();
        LayoutOptions {
            layout_mode: self.layout_mode.unwrap_or(defaults.layout_mode),
            default_direction: self.default_direction.unwrap_or(defaults.default_direction),
            debug_mode: self.debug_mode.unwrap_or(defaults.debug_mode),
            max_suggestions: self.max_suggestions.unwrap_or(defaults.max_suggestions),
            root_container: Size::new(
                self.root_width.unwrap_or(defaults.root_container.width),
                self.root_height.unwrap_or(defaults.root_container.height),
            ),
        }
    }
}

pub fn load(config_path: &str) -> Result<ConfigFile> {
    let config_content = fs::read_to_string(config_path).map_err(|e| {
        LayoutError::Io(std::io::Error::new(
            e.kind(),
            format!("Config file {}: {}", config_path, e),
        ))
    })?;

    let config = if config_path.ends_with(".json") {
        serde_json::from_str(&config_content).map_err(|e| LayoutError::InvalidFormat {
            message: format!("Invalid JSON config: {}", e),
        })?
    } else if config_path.ends_with(".toml") {
        toml::from_str(&config_content).map_err(|e| LayoutError::InvalidFormat {
            message: format!("Invalid TOML config: {}", e),
        })?
    } else {
        return Err(LayoutError::InvalidFormat {
            message: "Config file must be .json or .toml format".to_string(),
        });
    };
    log::info!("Loaded configuration from {}", config_path);
    Ok(config)
}
