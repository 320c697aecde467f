use serde_json::{json, Value};
use std::env;
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use crate::error::{ClientError, Result};
use crate::filter::Expression;
use crate::logger::Logger;
use crate::overrides::{convert_to_override_args, merge_overrides, parse_config_output, OverrideMap};
use crate::shell::{run_command_capture, CommandEnv, CommandOutput};
use crate::task::{parse_export, Task};
use crate::uda::{udas_from_config, UdaConfig};

pub const DEFAULT_TASK_BIN: &str = "task";
const DEFAULT_TASKRC_REL: &str = ".taskrc";

/// Overrides every invocation starts from: no chatter, JSON arrays, no prompts.
pub fn default_overrides() -> OverrideMap {
    let value = json!({
        "verbose": "nothing",
        "json": {"array": "TRUE", "depends": {"array": "on"}},
        "confirmation": "no",
        "dependency": {"confirmation": "no"},
        "recurrence": {"confirmation": "no"},
    });
    match value {
        Value::Object(map) => map,
        _ => OverrideMap::new(),
    }
}

/// Explicit path, else `$TASKRC`, else `$HOME/.taskrc`.
pub fn resolve_config_path(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path);
    }
    if let Some(taskrc) = env::var_os("TASKRC").filter(|value| !value.is_empty()) {
        return Ok(PathBuf::from(taskrc));
    }
    let home = env::var_os("HOME")
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            ClientError::Environment(
                "Missing HOME environment variable and no TASKRC to fall back on".to_string(),
            )
        })?;
    Ok(PathBuf::from(home).join(DEFAULT_TASKRC_REL))
}

#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    /// Taskrc location; resolved with [`resolve_config_path`] when unset.
    pub config_filename: Option<PathBuf>,
    /// Merged over [`default_overrides`].
    pub config_overrides: OverrideMap,
    /// Executable to run; `task` from `PATH` when unset.
    pub task_bin: Option<String>,
    pub log_path: Option<PathBuf>,
}

/// Drives one `task` executable against one taskrc.
///
/// Every operation is a single blocking invocation; nothing is cached between
/// calls and nothing is retried.
#[derive(Debug, Clone)]
pub struct Client {
    task_bin: String,
    config_filename: PathBuf,
    config_overrides: OverrideMap,
    logger: Logger,
}

impl Client {
    pub fn new(options: ClientOptions) -> Result<Self> {
        let config_filename = resolve_config_path(options.config_filename)?;
        let mut config_overrides = default_overrides();
        merge_overrides(&mut config_overrides, &options.config_overrides);
        // Surface bad override leaves now instead of on the first invocation.
        convert_to_override_args(&config_overrides, "")?;

        Ok(Self {
            task_bin: options
                .task_bin
                .unwrap_or_else(|| DEFAULT_TASK_BIN.to_string()),
            config_filename,
            config_overrides,
            logger: Logger::new(options.log_path),
        })
    }

    pub fn task_bin(&self) -> &str {
        &self.task_bin
    }

    pub fn config_filename(&self) -> &PathBuf {
        &self.config_filename
    }

    pub fn config_overrides(&self) -> &OverrideMap {
        &self.config_overrides
    }

    /// Full argv for one invocation: binary, overrides, then the non-empty `args`.
    pub fn command_line(&self, args: &[&str]) -> Result<Vec<String>> {
        let mut argv = vec![self.task_bin.clone()];
        argv.extend(convert_to_override_args(&self.config_overrides, "")?);
        argv.extend(
            args.iter()
                .filter(|arg| !arg.is_empty())
                .map(|arg| arg.to_string()),
        );
        Ok(argv)
    }

    fn execute(&self, args: &[&str], stdin: &str) -> Result<CommandOutput> {
        let argv = self.command_line(args)?;
        let env = CommandEnv {
            taskrc: self.config_filename.display().to_string(),
        };
        run_command_capture(&argv, stdin, &env, &self.logger)
    }

    /// Sends the whole task to `task import`. Creates or replaces by uuid.
    pub fn import(&self, task: &Task) -> Result<CommandOutput> {
        let payload = task.to_import_json()?;
        self.execute(&["import"], &payload)
    }

    /// Assigns a fresh uuid and imports. The uuid is cleared again if the
    /// import fails, so the task can be retried with `add`.
    pub fn add(&self, task: &mut Task) -> Result<CommandOutput> {
        if task.uuid.is_some() {
            return Err(ClientError::usage(
                "Task already has a UUID set.  You may want to use `modify` instead.",
            ));
        }
        task.uuid = Some(Uuid::new_v4());
        let result = self.import(task);
        if result.is_err() {
            task.uuid = None;
        }
        result
    }

    pub fn modify(&self, task: &Task) -> Result<CommandOutput> {
        if task.uuid.is_none() {
            return Err(ClientError::usage(
                "Task has no UUID set.  You may want to use `add` instead.",
            ));
        }
        self.import(task)
    }

    pub fn delete(&self, task: &Task) -> Result<CommandOutput> {
        let Some(uuid) = task.uuid else {
            return Err(ClientError::usage("Task has no UUID set."));
        };
        let uuid = uuid.to_string();
        self.execute(&[uuid.as_str(), "delete"], "")
    }

    pub fn filter(&self, expression: &Expression) -> Result<Vec<Task>> {
        let filter = expression.serialize();
        let output = self.execute(&[filter.as_str(), "export"], "")?;
        parse_export(&output.stdout)
    }

    pub fn count(&self, expression: &Expression) -> Result<u64> {
        let filter = expression.serialize();
        let output = self.execute(&[filter.as_str(), "count"], "")?;
        let trimmed = output.stdout.trim();
        trimmed
            .parse()
            .map_err(|err| ClientError::parse("task count", format!("{trimmed:?}: {err}")))
    }

    /// Exactly one matching task, or `NotFound` / `MultipleObjectsFound`.
    pub fn get(&self, expression: &Expression) -> Result<Task> {
        let mut tasks = self.filter(expression)?;
        match tasks.len() {
            1 => Ok(tasks.remove(0)),
            0 => Err(ClientError::NotFound {
                filter: expression.serialize(),
            }),
            _ => Err(ClientError::MultipleObjectsFound {
                filter: expression.serialize(),
            }),
        }
    }

    /// The program's effective configuration, as printed by `task _show`.
    pub fn config(&self) -> Result<OverrideMap> {
        let output = self.execute(&["_show"], "")?;
        Ok(parse_config_output(&output.stdout))
    }

    pub fn udas(&self) -> Result<Vec<UdaConfig>> {
        udas_from_config(&self.config()?)
    }
}

impl fmt::Display for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Client({})", self.config_filename.display())
    }
}
