use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Operating mode of the visualization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Only states on the highlighted path can be selected.
    Simple,
    /// Any state can be selected, expansion and top-level states are shown too.
    Advanced,
}

/// Settings of the visualization, merged from defaults, an optional
/// config file and the `initialize` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub simple_mode: bool,
    pub dark_graphs: bool,
    pub show_states: bool,
    /// Renderer command line, e.g. `/usr/bin/dot -Gdpi=96`.
    pub dot_executable: Option<String>,
    pub heap_directory: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            simple_mode: true,
            dark_graphs: true,
            show_states: false,
            dot_executable: None,
            heap_directory: std::env::temp_dir().join("state-debugger"),
        }
    }
}

impl Settings {
    pub fn mode(&self) -> Mode {
        if self.simple_mode {
            Mode::Simple
        } else {
            Mode::Advanced
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&contents)?;
        let mut settings = Self::default();
        settings.merge(&value)?;
        Ok(settings)
    }

    /// Overlay the keys present in `value` on top of the current settings.
    pub fn merge(&mut self, value: &Value) -> Result<()> {
        let Value::Object(overrides) = value else {
            return Err(Error::Protocol(format!("settings must be an object, got {value}")));
        };

        let mut current = serde_json::to_value(&*self)?;
        if let Value::Object(ref mut base) = current {
            for (key, val) in overrides {
                base.insert(key.clone(), val.clone());
            }
        }
        *self = serde_json::from_value(current)?;
        Ok(())
    }

    /// Split the renderer command line into program and leading arguments.
    pub fn renderer_command(&self) -> Option<(PathBuf, Vec<String>)> {
        let line = self.dot_executable.as_deref()?.trim();
        if line.is_empty() {
            return None;
        }
        let mut parts = shlex::split(line).unwrap_or_else(|| vec![line.to_string()]);
        if parts.is_empty() {
            return None;
        }
        let program = PathBuf::from(parts.remove(0));
        Some((program, parts))
    }
}
