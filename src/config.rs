use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::{Path, PathBuf};

use taskw_client::{ClientOptions, OverrideMap};

/// Settings file for the `taskw` binary. Every key is optional.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct Settings {
    #[serde(default)]
    pub(crate) task_bin: Option<String>,
    #[serde(default)]
    pub(crate) taskrc: Option<PathBuf>,
    #[serde(default)]
    pub(crate) log_path: Option<PathBuf>,
    #[serde(default)]
    pub(crate) overrides: OverrideMap,
}

impl Settings {
    pub(crate) fn into_client_options(self) -> ClientOptions {
        ClientOptions {
            config_filename: self.taskrc,
            config_overrides: self.overrides,
            task_bin: self.task_bin,
            log_path: self.log_path,
        }
    }
}

#[derive(Debug)]
pub(crate) struct LoadedSettings {
    pub(crate) settings: Settings,
    pub(crate) warnings: Vec<String>,
}

const ALLOWED_KEYS: &[&str] = &["task_bin", "taskrc", "log_path", "overrides"];

pub(crate) fn load_settings(path: &Path) -> Result<LoadedSettings, String> {
    let content = fs::read_to_string(path)
        .map_err(|err| format!("Failed to read config {}: {}", path.display(), err))?;
    let value: Value = serde_yaml::from_str(&content)
        .map_err(|err| format!("Failed to parse config {}: {}", path.display(), err))?;
    let mapping = match value {
        // An empty file is a valid "all defaults" config.
        Value::Null => Mapping::new(),
        Value::Mapping(mapping) => mapping,
        _ => {
            return Err(format!(
                "Config {} must be a YAML mapping",
                path.display()
            ))
        }
    };

    let warnings = unknown_top_level_keys(&mapping);
    emit_unknown_key_warnings(&warnings);

    let settings: Settings = serde_path_to_error::deserialize(Value::Mapping(mapping))
        .map_err(|err| {
            format!(
                "Invalid config {} at {}: {}",
                path.display(),
                err.path(),
                err.inner()
            )
        })?;

    Ok(LoadedSettings { settings, warnings })
}

fn emit_unknown_key_warnings(keys: &[String]) {
    for key in keys {
        eprintln!("Warning: unknown config key: {}", key);
    }
}

fn unknown_top_level_keys(mapping: &Mapping) -> Vec<String> {
    mapping
        .keys()
        .filter_map(|key| key.as_str().map(|value| value.to_string()))
        .filter(|key| !ALLOWED_KEYS.contains(&key.as_str()))
        .collect()
}
