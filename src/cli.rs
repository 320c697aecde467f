use clap::{Parser, Subcommand};
use std::path::PathBuf;

use taskw_client::filter::{Expression, FieldMap};

#[derive(Debug, Parser)]
#[command(
    name = "taskw",
    about = "Query and update Taskwarrior tasks as JSON.",
    long_about = "taskw runs the Taskwarrior `task` binary with fixed, script-friendly settings and prints tasks as JSON.\n\nFilter arguments are either raw filter tokens (+tag, status:pending) or field filters written as key=value, where a double underscore separates the attribute from its modifier (description__contains=milk).",
    disable_help_subcommand = true
)]
pub(crate) struct Cli {
    /// Load settings from PATH instead of ~/.config/taskw.yml.
    #[arg(short = 'c', long = "config", global = true, value_name = "PATH")]
    pub(crate) config: Option<PathBuf>,

    /// Use this taskrc instead of $TASKRC or ~/.taskrc.
    #[arg(long = "taskrc", global = true, value_name = "PATH")]
    pub(crate) taskrc: Option<PathBuf>,

    /// Run this executable instead of `task`.
    #[arg(long = "task-bin", global = true, value_name = "PATH")]
    pub(crate) task_bin: Option<String>,

    #[command(subcommand)]
    pub(crate) command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub(crate) enum CliCommand {
    /// Print every matching task as a JSON array.
    List {
        #[arg(
            value_name = "FILTER",
            num_args = 0..,
            trailing_var_arg = true,
            allow_hyphen_values = true
        )]
        filter: Vec<String>,
    },
    /// Print the number of matching tasks.
    Count {
        #[arg(
            value_name = "FILTER",
            num_args = 0..,
            trailing_var_arg = true,
            allow_hyphen_values = true
        )]
        filter: Vec<String>,
    },
    /// Print the single matching task; fails when zero or several match.
    Get {
        #[arg(
            value_name = "FILTER",
            num_args = 0..,
            trailing_var_arg = true,
            allow_hyphen_values = true
        )]
        filter: Vec<String>,
    },
    /// Create a task and print its new uuid.
    Add {
        description: String,
        #[arg(long)]
        project: Option<String>,
        #[arg(long = "tag", action = clap::ArgAction::Append)]
        tags: Vec<String>,
        /// Due date, e.g. 2030-03-02 or 2030-03-02T06:00:00Z.
        #[arg(long)]
        due: Option<String>,
    },
    /// Append an annotation to a task.
    Annotate { uuid: String, text: String },
    /// Make a task depend on another one (or stop depending with --remove).
    Depend {
        uuid: String,
        depends_on: String,
        #[arg(long)]
        remove: bool,
    },
    /// Mark a task deleted.
    Delete { uuid: String },
    /// Print the user-defined attributes declared in the taskrc.
    Udas,
    /// Print the effective Taskwarrior configuration as JSON.
    ShowConfig,
}

/// Positional filter arguments: `key=value` pairs become one field map, every
/// other argument is a raw token. Tokens come first, as the program sees them.
pub(crate) fn parse_filter_args(raw_values: &[String]) -> Expression {
    let mut parts = Vec::new();
    let mut fields = FieldMap::new();
    for raw in raw_values {
        match split_field_arg(raw) {
            Some((key, value)) => fields.push(key, value),
            None => parts.push(Expression::Token(raw.clone())),
        }
    }
    parts.push(Expression::Fields(fields));
    Expression::All(parts)
}

fn split_field_arg(raw: &str) -> Option<(&str, &str)> {
    let (key, value) = raw.split_once('=')?;
    let is_field_name = !key.is_empty()
        && key
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '.');
    if is_field_name {
        Some((key, value))
    } else {
        None
    }
}
