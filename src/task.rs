use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

use crate::error::{ClientError, Result};

/// The program's canonical compact timestamp form.
pub const DATETIME_FORMAT: &str = "%Y%m%dT%H%M%SZ";

const OFFSET_FORMATS: &[&str] = &[
    "%Y%m%dT%H%M%S%z",
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%z",
];

const NAIVE_FORMATS: &[&str] = &[
    DATETIME_FORMAT,
    "%Y%m%dT%H%M%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y%m%d", "%Y/%m/%d"];

/// Parses the date-time shapes the program (and people) commonly produce.
///
/// Inputs carrying an offset are converted to UTC; inputs without one are taken
/// to already be UTC, and a bare date means midnight UTC. An all-digit string
/// that is not an 8-digit date is read as epoch seconds.
pub fn parse_datetime(input: &str) -> Result<DateTime<Utc>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ClientError::parse("date-time", "empty value"));
    }

    if trimmed.len() != 8 && trimmed.chars().all(|ch| ch.is_ascii_digit()) {
        let seconds: i64 = trimmed
            .parse()
            .map_err(|err| ClientError::parse("date-time", format!("{trimmed:?}: {err}")))?;
        return epoch_to_utc(seconds);
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }
    for format in OFFSET_FORMATS {
        if let Ok(parsed) = DateTime::parse_from_str(trimmed, format) {
            return Ok(parsed.with_timezone(&Utc));
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(Utc.from_utc_datetime(&parsed));
        }
    }
    for format in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(trimmed, format) {
            if let Some(midnight) = parsed.and_hms_opt(0, 0, 0) {
                return Ok(Utc.from_utc_datetime(&midnight));
            }
        }
    }

    Err(ClientError::parse(
        "date-time",
        format!("unrecognized value {trimmed:?}"),
    ))
}

fn epoch_to_utc(seconds: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_opt(seconds, 0)
        .single()
        .ok_or_else(|| ClientError::parse("date-time", format!("epoch {seconds} out of range")))
}

pub fn format_datetime(value: &DateTime<Utc>) -> String {
    value.format(DATETIME_FORMAT).to_string()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDateTime {
    Text(String),
    Epoch(i64),
}

impl RawDateTime {
    fn into_utc(self) -> Result<DateTime<Utc>> {
        match self {
            Self::Text(text) => parse_datetime(&text),
            Self::Epoch(seconds) => epoch_to_utc(seconds),
        }
    }
}

/// Serde adapter for `DateTime<Utc>` in the program's compact format.
mod compact_datetime {
    use chrono::{DateTime, Utc};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::{format_datetime, RawDateTime};

    pub(super) fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_datetime(value))
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        RawDateTime::deserialize(deserializer)?
            .into_utc()
            .map_err(D::Error::custom)
    }

    pub(super) mod option {
        use chrono::{DateTime, Utc};
        use serde::de::Error as _;
        use serde::{Deserialize, Deserializer, Serializer};

        use super::super::{format_datetime, RawDateTime};

        pub(crate) fn serialize<S>(
            value: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> std::result::Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match value {
                Some(value) => serializer.serialize_str(&format_datetime(value)),
                None => serializer.serialize_none(),
            }
        }

        pub(crate) fn deserialize<'de, D>(
            deserializer: D,
        ) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
        where
            D: Deserializer<'de>,
        {
            match Option::<RawDateTime>::deserialize(deserializer)? {
                Some(raw) => raw.into_utc().map(Some).map_err(D::Error::custom),
                None => Ok(None),
            }
        }
    }
}

/// `depends` arrives as a JSON array, or as a comma-separated string when the
/// program is not configured with `json.depends.array=on`.
fn deserialize_depends<'de, D>(deserializer: D) -> std::result::Result<Option<Vec<Uuid>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawDepends {
        List(Vec<Uuid>),
        Joined(String),
    }

    match Option::<RawDepends>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawDepends::List(uuids)) => Ok(Some(uuids)),
        Some(RawDepends::Joined(joined)) => joined
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| Uuid::parse_str(part).map_err(D::Error::custom))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map(Some),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Completed,
    Deleted,
    Waiting,
    Recurring,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Deleted => "deleted",
            Self::Waiting => "waiting",
            Self::Recurring => "recurring",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(with = "compact_datetime")]
    pub entry: DateTime<Utc>,
    pub description: String,
}

/// Field names with a typed home on [`Task`]; they can never be extras.
pub const KNOWN_FIELDS: &[&str] = &[
    "annotations",
    "depends",
    "description",
    "due",
    "end",
    "entry",
    "id",
    "imask",
    "mask",
    "modified",
    "parent",
    "project",
    "recur",
    "scheduled",
    "start",
    "status",
    "tags",
    "until",
    "urgency",
    "uuid",
    "wait",
];

/// One task as exported by the program.
///
/// Known fields are typed; every other attribute (user-defined attributes in
/// particular) is kept verbatim in a separate map and written back on import.
/// Fields left as `None` are never serialized, so importing a task does not
/// overwrite values the program maintains itself.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Vec<Annotation>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_depends"
    )]
    pub depends: Option<Vec<Uuid>>,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "compact_datetime::option")]
    pub due: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "compact_datetime::option")]
    pub end: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "compact_datetime::option")]
    pub entry: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imask: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "compact_datetime::option")]
    pub modified: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recur: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "compact_datetime::option")]
    pub scheduled: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "compact_datetime::option")]
    pub start: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "compact_datetime::option")]
    pub until: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgency: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "compact_datetime::option")]
    pub wait: Option<DateTime<Utc>>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl Task {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            annotations: None,
            depends: None,
            description: description.into(),
            due: None,
            end: None,
            entry: None,
            id: None,
            imask: None,
            mask: None,
            modified: None,
            parent: None,
            project: None,
            recur: None,
            scheduled: None,
            start: None,
            status: None,
            tags: None,
            until: None,
            urgency: None,
            uuid: None,
            wait: None,
            extra: Map::new(),
        }
    }

    /// True until the task has been given a uuid (by `add` or by the program).
    pub fn is_new(&self) -> bool {
        self.uuid.is_none()
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags
            .as_ref()
            .is_some_and(|tags| tags.iter().any(|candidate| candidate == tag))
    }

    /// Appends an annotation stamped with `entry`, or with the current instant.
    pub fn add_annotation(&mut self, description: impl Into<String>, entry: Option<DateTime<Utc>>) {
        let annotation = Annotation {
            entry: entry.unwrap_or_else(Utc::now),
            description: description.into(),
        };
        self.annotations.get_or_insert_with(Vec::new).push(annotation);
    }

    pub fn add_to_depends(&mut self, uuid: Uuid) -> Result<()> {
        let depends = self.depends.get_or_insert_with(Vec::new);
        if depends.contains(&uuid) {
            return Err(ClientError::usage(format!(
                "Task already depends on {}",
                uuid
            )));
        }
        depends.push(uuid);
        Ok(())
    }

    pub fn remove_from_depends(&mut self, uuid: Uuid) -> Result<()> {
        let position = self
            .depends
            .as_ref()
            .and_then(|depends| depends.iter().position(|candidate| *candidate == uuid));
        match (position, self.depends.as_mut()) {
            (Some(position), Some(depends)) => {
                depends.remove(position);
                Ok(())
            }
            _ => Err(ClientError::usage(format!(
                "Task does not depend on {}",
                uuid
            ))),
        }
    }

    pub fn extra(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    pub fn extras(&self) -> &Map<String, Value> {
        &self.extra
    }

    /// Sets a user-defined attribute. Known field names are refused so the
    /// serialized object never carries a key twice.
    pub fn set_extra(&mut self, key: impl Into<String>, value: Value) -> Result<()> {
        let key = key.into();
        if KNOWN_FIELDS.contains(&key.as_str()) {
            return Err(ClientError::usage(format!(
                "'{}' is a built-in task field; set it directly",
                key
            )));
        }
        self.extra.insert(key, value);
        Ok(())
    }

    pub fn remove_extra(&mut self, key: &str) -> Option<Value> {
        self.extra.shift_remove(key)
    }

    /// JSON object sent to `task import`.
    pub fn to_import_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|err| ClientError::parse("task", err))
    }
}

/// Decodes the JSON array printed by `task export`.
pub fn parse_export(stdout: &str) -> Result<Vec<Task>> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let deserializer = &mut serde_json::Deserializer::from_str(trimmed);
    serde_path_to_error::deserialize(deserializer).map_err(|err| {
        let path = err.path().to_string();
        ClientError::parse("task export", format!("{} at {}", err.inner(), path))
    })
}
