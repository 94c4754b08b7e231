use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fs;
use std::path::Path;

use crate::program::ProgramStep;

const CONFIG_FILE: &str = "laserbox.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Tick rate of the main loop.
    pub fps: u32,
    /// Scripted program hand-off order. Per-program knobs (cooldowns,
    /// debounce windows, sound names) ride in each step's params.
    pub script: Vec<ProgramStep>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            fps: 60,
            script: vec![
                ProgramStep::new("ClueFinder"),
                ProgramStep::new("TogglePattern"),
                ProgramStep::new("Flipper"),
                ProgramStep::new("TogglePattern")
                    .with_params(json!({"hold_pattern": [7, 0, 1, 0, 3, 0, 0, 0]})),
                ProgramStep::new("Golf"),
            ],
        }
    }
}

impl AppConfig {
    /// Loads config from the default config file.
    /// Returns default config if file doesn't exist.
    pub fn load() -> Result<Self> {
        Self::load_from(CONFIG_FILE)
    }

    /// Loads config from a specified path.
    /// Returns default config if file doesn't exist.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Saves config to the default config file.
    pub fn save(&self) -> Result<()> {
        self.save_to(CONFIG_FILE)
    }

    /// Saves config to a specified path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}
