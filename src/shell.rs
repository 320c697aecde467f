use shell_escape::unix::escape;
use std::io::{self, Write};
use std::process::{Command, Stdio};
use std::thread;

use crate::error::{ClientError, Result};
use crate::logger::Logger;

/// Renders an argv as a single shell-quoted line for logs and error messages.
pub fn render_args(args: &[String]) -> String {
    args.iter()
        .map(|arg| escape(arg.as_str().into()).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Environment applied on top of the inherited one for a single invocation.
#[derive(Debug, Clone)]
pub struct CommandEnv {
    pub taskrc: String,
}

impl CommandEnv {
    pub(crate) fn apply(&self, cmd: &mut Command) {
        cmd.env("TASKRC", &self.taskrc);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs `argv[0]` with the rest of `argv`, feeding `stdin` and capturing both
/// output streams. A non-zero exit becomes [`ClientError::Command`].
pub fn run_command_capture(
    argv: &[String],
    stdin: &str,
    env: &CommandEnv,
    logger: &Logger,
) -> Result<CommandOutput> {
    let Some((program, args)) = argv.split_first() else {
        return Err(ClientError::usage("cannot run an empty command line"));
    };

    let rendered = render_args(argv);
    logger.log_line(&format!(
        "cmd start command={} stdin_bytes={}",
        rendered,
        stdin.len()
    ));

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    env.apply(&mut cmd);

    let mut child = cmd.spawn().map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => ClientError::BinaryNotFound {
            task_bin: program.clone(),
        },
        _ => ClientError::Environment(format!("Failed to run command '{}': {}", program, err)),
    })?;

    // Written from its own thread: the child may fill stdout before it drains stdin.
    let writer = child.stdin.take().map(|mut pipe| {
        let payload = stdin.as_bytes().to_vec();
        thread::spawn(move || -> io::Result<()> {
            if payload.is_empty() {
                return Ok(());
            }
            match pipe.write_all(&payload) {
                // The program may exit without reading; its exit code tells the story.
                Err(err) if err.kind() == io::ErrorKind::BrokenPipe => Ok(()),
                other => other,
            }
        })
    });

    let output = child.wait_with_output().map_err(|err| {
        ClientError::Environment(format!("Failed to wait for '{}': {}", program, err))
    })?;

    if let Some(writer) = writer {
        let written = writer.join().unwrap_or_else(|_| {
            Err(io::Error::other("stdin writer panicked"))
        });
        if let Err(err) = written {
            return Err(ClientError::Environment(format!(
                "Failed to write stdin for '{}': {}",
                program, err
            )));
        }
    }

    let return_code = output.status.code().unwrap_or(-1);
    logger.log_line(&format!("cmd exit command={} exit={}", program, return_code));

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if !output.status.success() {
        return Err(ClientError::Command {
            command: rendered,
            stdout,
            stderr,
            return_code,
        });
    }

    Ok(CommandOutput { stdout, stderr })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    fn test_env() -> CommandEnv {
        CommandEnv {
            taskrc: "/tmp/taskw-test-taskrc".to_string(),
        }
    }

    #[test]
    fn render_args_quotes_only_when_needed() {
        let rendered = render_args(&argv(&["task", "export", "with space", "(+a)"]));
        assert_eq!(rendered, "task export 'with space' '(+a)'");
    }

    #[test]
    fn render_args_of_nothing_is_empty() {
        assert_eq!(render_args(&[]), "");
    }

    #[test]
    fn empty_command_line_is_a_usage_error() {
        let err = run_command_capture(&[], "", &test_env(), &Logger::new(None))
            .expect_err("empty argv");
        assert!(err.is_usage_error());
    }

    #[test]
    fn missing_binary_is_reported_by_name() {
        let err = run_command_capture(
            &argv(&["/nonexistent/taskw-test-binary", "export"]),
            "",
            &test_env(),
            &Logger::new(None),
        )
        .expect_err("missing binary");
        match err {
            ClientError::BinaryNotFound { task_bin } => {
                assert_eq!(task_bin, "/nonexistent/taskw-test-binary")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn captures_stdin_round_trip_and_failures() {
        let output = run_command_capture(
            &argv(&["sh", "-c", "cat; echo err >&2"]),
            "payload",
            &test_env(),
            &Logger::new(None),
        )
        .expect("sh should run");
        assert_eq!(output.stdout, "payload");
        assert_eq!(output.stderr, "err\n");

        let err = run_command_capture(
            &argv(&["sh", "-c", "echo out; echo bad >&2; exit 3"]),
            "",
            &test_env(),
            &Logger::new(None),
        )
        .expect_err("non-zero exit");
        match err {
            ClientError::Command {
                command,
                stdout,
                stderr,
                return_code,
            } => {
                assert!(command.starts_with("sh -c "), "got: {command}");
                assert_eq!(stdout, "out\n");
                assert_eq!(stderr, "bad\n");
                assert_eq!(return_code, 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn taskrc_is_exported_to_the_child() {
        let env = CommandEnv {
            taskrc: "/tmp/custom-taskrc".to_string(),
        };
        let output = run_command_capture(
            &argv(&["sh", "-c", "printf '%s' \"$TASKRC\""]),
            "",
            &env,
            &Logger::new(None),
        )
        .expect("sh should run");
        assert_eq!(output.stdout, "/tmp/custom-taskrc");
    }

    #[cfg(unix)]
    #[test]
    fn large_stdin_with_early_output_does_not_block() {
        let payload = "x".repeat(300_000);
        let output = run_command_capture(
            &argv(&["sh", "-c", "head -c 200000 /dev/zero; cat >/dev/null"]),
            &payload,
            &test_env(),
            &Logger::new(None),
        )
        .expect("sh should run");
        assert_eq!(output.stdout.len(), 200_000);
        assert!(output.stderr.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn child_that_ignores_stdin_still_reports_its_exit() {
        let payload = "x".repeat(300_000);
        let err = run_command_capture(
            &argv(&["sh", "-c", "exit 4"]),
            &payload,
            &test_env(),
            &Logger::new(None),
        )
        .expect_err("non-zero exit");
        assert!(matches!(err, ClientError::Command { return_code: 4, .. }));
    }
}
