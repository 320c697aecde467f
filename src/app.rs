use clap::Parser;
use serde::Serialize;
use std::env;
use std::ffi::OsString;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use taskw_client::filter::field;
use taskw_client::task::parse_datetime;
use taskw_client::{Client, ClientError, Task};
use uuid::Uuid;

use crate::cli::{parse_filter_args, Cli, CliCommand};
use crate::config::{load_settings, Settings};

const DEFAULT_CONFIG_REL: &str = ".config/taskw.yml";

#[derive(Debug)]
pub(crate) struct Quit {
    pub(crate) code: i32,
    #[allow(dead_code)]
    pub(crate) reason: String,
}

impl Quit {
    pub(crate) fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.code as u8)
    }

    fn usage(message: impl Into<String>) -> Self {
        let message = message.into();
        eprintln!("{}", message);
        Self {
            code: 2,
            reason: message,
        }
    }
}

impl From<ClientError> for Quit {
    fn from(err: ClientError) -> Self {
        eprintln!("{}", err);
        let code = match &err {
            ClientError::Command { return_code, .. } if *return_code > 0 => *return_code,
            ClientError::Usage(_) => 2,
            _ => 1,
        };
        Self {
            code,
            reason: err.to_string(),
        }
    }
}

fn load_settings_for(cli: &Cli) -> Result<Settings, Quit> {
    let explicit = cli.config.is_some();
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => match env::var_os("HOME") {
            Some(home) => PathBuf::from(home).join(DEFAULT_CONFIG_REL),
            None => return Ok(Settings::default()),
        },
    };

    if !path.is_file() {
        if explicit {
            let message = format!("Missing config file: {}", path.display());
            eprintln!("{}", message);
            return Err(Quit {
                code: 1,
                reason: message,
            });
        }
        return Ok(Settings::default());
    }

    load_settings(&path)
        .map(|loaded| loaded.settings)
        .map_err(|message| {
            eprintln!("{}", message);
            Quit {
                code: 1,
                reason: message,
            }
        })
}

fn build_client(cli: &Cli) -> Result<Client, Quit> {
    let mut options = load_settings_for(cli)?.into_client_options();
    if let Some(taskrc) = &cli.taskrc {
        options.config_filename = Some(taskrc.clone());
    }
    if let Some(task_bin) = &cli.task_bin {
        options.task_bin = Some(task_bin.clone());
    }
    Ok(Client::new(options)?)
}

fn parse_uuid(raw: &str) -> Result<Uuid, Quit> {
    Uuid::parse_str(raw.trim()).map_err(|err| Quit::usage(format!("Invalid uuid {:?}: {}", raw, err)))
}

fn get_by_uuid(client: &Client, uuid: Uuid) -> Result<Task, Quit> {
    Ok(client.get(&field("uuid", uuid))?)
}

fn write_json<W: Write, T: Serialize + ?Sized>(out: &mut W, value: &T) -> Result<(), Quit> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| Quit::usage(format!("Failed to render output: {}", err)))?;
    write_line(out, &rendered)
}

fn write_line<W: Write>(out: &mut W, line: &str) -> Result<(), Quit> {
    writeln!(out, "{}", line).map_err(|err| Quit {
        code: 1,
        reason: format!("Failed to write output: {}", err),
    })
}

fn run_with_cli_impl<W: Write>(cli: Cli, out: &mut W) -> Result<(), Quit> {
    let client = build_client(&cli)?;

    match cli.command {
        CliCommand::List { filter } => {
            let tasks = client.filter(&parse_filter_args(&filter))?;
            write_json(out, &tasks)
        }
        CliCommand::Count { filter } => {
            let count = client.count(&parse_filter_args(&filter))?;
            write_line(out, &count.to_string())
        }
        CliCommand::Get { filter } => {
            let task = client.get(&parse_filter_args(&filter))?;
            write_json(out, &task)
        }
        CliCommand::Add {
            description,
            project,
            tags,
            due,
        } => {
            let mut task = Task::new(description);
            task.project = project;
            if !tags.is_empty() {
                task.tags = Some(tags);
            }
            if let Some(due) = due {
                task.due = Some(parse_datetime(&due)?);
            }
            client.add(&mut task)?;
            let uuid = task.uuid.map(|uuid| uuid.to_string()).unwrap_or_default();
            write_line(out, &uuid)
        }
        CliCommand::Annotate { uuid, text } => {
            let mut task = get_by_uuid(&client, parse_uuid(&uuid)?)?;
            task.add_annotation(text, None);
            client.modify(&task)?;
            Ok(())
        }
        CliCommand::Depend {
            uuid,
            depends_on,
            remove,
        } => {
            let mut task = get_by_uuid(&client, parse_uuid(&uuid)?)?;
            let depends_on = parse_uuid(&depends_on)?;
            if remove {
                task.remove_from_depends(depends_on)?;
            } else {
                task.add_to_depends(depends_on)?;
            }
            client.modify(&task)?;
            Ok(())
        }
        CliCommand::Delete { uuid } => {
            let task = get_by_uuid(&client, parse_uuid(&uuid)?)?;
            client.delete(&task)?;
            Ok(())
        }
        CliCommand::Udas => {
            let udas = client.udas()?;
            write_json(out, &udas)
        }
        CliCommand::ShowConfig => {
            let config = client.config()?;
            write_json(out, &config)
        }
    }
}

pub(crate) fn run_with_cli(cli: Cli) -> Result<(), Quit> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    run_with_cli_impl(cli, &mut out)
}

pub(crate) fn run_with_args(args: Vec<OsString>) -> Result<(), Quit> {
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) => {
            // Render clap errors ourselves so they land on stderr like every other failure.
            eprintln!("{err}");
            return Err(Quit {
                code: err.exit_code(),
                reason: "cli_parse".to_string(),
            });
        }
    };
    run_with_cli(cli)
}

pub(crate) fn main_with_args(args: Vec<OsString>) -> ExitCode {
    match run_with_args(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(quit) => quit.exit_code(),
    }
}

pub(crate) fn main() -> ExitCode {
    main_with_args(env::args_os().collect())
}
