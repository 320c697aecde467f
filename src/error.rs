use thiserror::Error;

/// Everything that can go wrong while driving the `task` executable.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Environment or process-level failure that is not the program's fault.
    #[error("{0}")]
    Environment(String),

    #[error("Taskwarrior client at '{task_bin}' could not be found.")]
    BinaryNotFound { task_bin: String },

    /// The program ran and exited non-zero.
    #[error("command `{command}` failed with exit code {return_code}: {stderr}")]
    Command {
        command: String,
        stdout: String,
        stderr: String,
        return_code: i32,
    },

    /// The caller asked for something that cannot work; no process was started.
    #[error("{0}")]
    Usage(String),

    #[error("no task matched filter {filter:?}")]
    NotFound { filter: String },

    #[error("more than one task matched filter {filter:?}")]
    MultipleObjectsFound { filter: String },

    /// The program produced output that could not be decoded.
    #[error("failed to parse {context}: {message}")]
    Parse { context: String, message: String },
}

impl ClientError {
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }

    pub(crate) fn parse(context: &str, message: impl ToString) -> Self {
        Self::Parse {
            context: context.to_string(),
            message: message.to_string(),
        }
    }

    /// True for the "get exactly one" mismatches.
    pub fn is_filter_error(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::MultipleObjectsFound { .. })
    }

    pub fn is_usage_error(&self) -> bool {
        matches!(self, Self::Usage(_))
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_error_message_includes_stderr_and_code() {
        let err = ClientError::Command {
            command: "task export".to_string(),
            stdout: String::new(),
            stderr: "Unrecognized filter".to_string(),
            return_code: 2,
        };
        let message = err.to_string();
        assert!(message.contains("task export"), "got: {message}");
        assert!(message.contains("exit code 2"), "got: {message}");
        assert!(message.contains("Unrecognized filter"), "got: {message}");
    }

    #[test]
    fn filter_errors_are_grouped() {
        assert!(ClientError::NotFound {
            filter: "(+x)".to_string()
        }
        .is_filter_error());
        assert!(ClientError::MultipleObjectsFound {
            filter: String::new()
        }
        .is_filter_error());
        assert!(!ClientError::usage("nope").is_filter_error());
        assert!(ClientError::usage("nope").is_usage_error());
    }
}
