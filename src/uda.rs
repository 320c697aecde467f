use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::{ClientError, Result};
use crate::overrides::OverrideMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UdaType {
    Numeric,
    Date,
    Duration,
    String,
}

impl UdaType {
    pub fn parse(token: &str) -> Option<Self> {
        Some(match token.trim() {
            "numeric" => Self::Numeric,
            "date" => Self::Date,
            "duration" => Self::Duration,
            "string" => Self::String,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Numeric => "numeric",
            Self::Date => "date",
            Self::Duration => "duration",
            Self::String => "string",
        }
    }
}

impl fmt::Display for UdaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user-defined attribute as declared under `uda.<name>.*` in the program's config.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UdaConfig {
    pub name: String,
    pub field_type: UdaType,
    pub label: String,
    /// Allowed values, when the attribute is restricted to a list.
    pub values: Option<Vec<String>>,
}

/// Reads the UDA declarations out of a parsed config listing, in declaration order.
/// A missing label falls back to the attribute name.
pub fn udas_from_config(config: &OverrideMap) -> Result<Vec<UdaConfig>> {
    let Some(Value::Object(udas)) = config.get("uda") else {
        return Ok(Vec::new());
    };

    let mut definitions = Vec::new();
    for (name, definition) in udas {
        let Value::Object(definition) = definition else {
            return Err(ClientError::parse(
                "config",
                format!("uda.{} must be a group of settings", name),
            ));
        };
        let raw_type = definition
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| ClientError::parse("config", format!("uda.{}.type is missing", name)))?;
        let field_type = UdaType::parse(raw_type).ok_or_else(|| {
            ClientError::parse(
                "config",
                format!("uda.{}.type has unknown value {:?}", name, raw_type),
            )
        })?;
        let label = definition
            .get("label")
            .and_then(Value::as_str)
            .filter(|label| !label.trim().is_empty())
            .unwrap_or(name.as_str())
            .to_string();
        let values = definition
            .get("values")
            .and_then(Value::as_str)
            .map(|values| values.split(',').map(|value| value.trim().to_string()).collect());

        definitions.push(UdaConfig {
            name: name.clone(),
            field_type,
            label,
            values,
        });
    }
    Ok(definitions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overrides::parse_config_output;

    #[test]
    fn reads_declarations_with_labels_and_values() {
        let config = parse_config_output(
            "uda.estimate.type=numeric\n\
             uda.estimate.label=Estimate\n\
             uda.size.type=string\n\
             uda.size.values=S,M,L,\n\
             report.next.filter=status:pending\n",
        );
        let udas = udas_from_config(&config).expect("udas");
        assert_eq!(
            udas,
            vec![
                UdaConfig {
                    name: "estimate".to_string(),
                    field_type: UdaType::Numeric,
                    label: "Estimate".to_string(),
                    values: None,
                },
                UdaConfig {
                    name: "size".to_string(),
                    field_type: UdaType::String,
                    label: "size".to_string(),
                    values: Some(vec![
                        "S".to_string(),
                        "M".to_string(),
                        "L".to_string(),
                        String::new(),
                    ]),
                },
            ]
        );
    }

    #[test]
    fn no_uda_section_means_no_udas() {
        let config = parse_config_output("weekstart=monday\n");
        assert!(udas_from_config(&config).expect("udas").is_empty());
    }

    #[test]
    fn unknown_or_missing_type_is_a_parse_error() {
        let config = parse_config_output("uda.mood.type=feeling\n");
        let err = udas_from_config(&config).expect_err("unknown type");
        assert!(err.to_string().contains("uda.mood.type"), "got: {err}");

        let config = parse_config_output("uda.mood.label=Mood\n");
        assert!(udas_from_config(&config).is_err());
    }
}
