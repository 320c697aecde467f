//! `rc.*` override arguments and the program's `key.path = value` config listing.

use serde_json::{Map, Value};

use crate::error::{ClientError, Result};

/// Nested configuration: leaves are scalars, branches are further mappings.
/// Iteration order is insertion order.
pub type OverrideMap = Map<String, Value>;

/// Flattens `config` into `rc.<path>=<value>` arguments.
///
/// Nested mappings extend the dotted path, scalar leaves terminate it. Strings
/// are used verbatim, numbers and booleans use their JSON text, and any value
/// containing whitespace is wrapped in double quotes. `null` and array leaves
/// are rejected because the program has no syntax for them.
pub fn convert_to_override_args(config: &OverrideMap, prefix: &str) -> Result<Vec<String>> {
    let mut args = Vec::new();
    collect_override_args(config, prefix, &mut args)?;
    Ok(args)
}

fn collect_override_args(config: &OverrideMap, prefix: &str, args: &mut Vec<String>) -> Result<()> {
    for (key, value) in config {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        let rendered = match value {
            Value::Object(nested) => {
                collect_override_args(nested, &path, args)?;
                continue;
            }
            Value::String(value) => value.clone(),
            Value::Number(value) => value.to_string(),
            Value::Bool(value) => value.to_string(),
            Value::Null => {
                return Err(ClientError::usage(format!(
                    "override rc.{} has no value",
                    path
                )))
            }
            Value::Array(_) => {
                return Err(ClientError::usage(format!(
                    "override rc.{} must be a scalar or a mapping, got a list",
                    path
                )))
            }
        };
        args.push(format!("rc.{}={}", path, quote_if_spaced(&rendered)));
    }
    Ok(())
}

fn quote_if_spaced(value: &str) -> String {
    if value.chars().any(char::is_whitespace) {
        format!("\"{}\"", value)
    } else {
        value.to_string()
    }
}

/// Deep-merges `overlay` into `base`. Mappings merge key by key, any other
/// value in `overlay` replaces what `base` had at that path.
pub fn merge_overrides(base: &mut OverrideMap, overlay: &OverrideMap) {
    for (key, value) in overlay {
        match (base.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                merge_overrides(existing, incoming);
            }
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Parses the `key.path = value` listing the program prints for `_show` into
/// a nested mapping. Text after `#` is ignored, as are blank lines and lines
/// without `=`.
pub fn parse_config_output(output: &str) -> OverrideMap {
    let mut config = OverrideMap::new();

    'lines: for raw_line in output.lines() {
        let line = match raw_line.find('#') {
            Some(position) => &raw_line[..position],
            None => raw_line,
        }
        .trim();
        if line.is_empty() {
            continue;
        }
        let Some((left, right)) = line.split_once('=') else {
            continue;
        };
        let parts: Vec<&str> = left.trim().split('.').collect();
        let value = Value::String(right.trim().to_string());
        let Some((leaf, branches)) = parts.split_last() else {
            continue;
        };

        let mut cursor = &mut config;
        for part in branches {
            let entry = cursor
                .entry(part.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                // A deeper key shadows an earlier scalar at this path.
                *entry = Value::Object(Map::new());
            }
            let Value::Object(map) = entry else {
                continue 'lines;
            };
            cursor = map;
        }
        cursor.insert(leaf.to_string(), value);
    }

    config
}
