use std::time::Duration;

use tracing::warn;

use crate::app::adb::runner::{run_command_with_timeout, CommandOutput};

/// Runs one `adb` invocation. Failures to run at all (spawn errors, timeouts) come back
/// as a non-zero [`CommandOutput`] rather than an error, so callers only check exit codes.
pub trait AdbExecutor {
    fn execute(&self, args: &[String], timeout: Duration, trace_id: &str) -> CommandOutput;
}

#[derive(Debug, Clone)]
pub struct ProcessAdb {
    program: String,
}

impl ProcessAdb {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl AdbExecutor for ProcessAdb {
    fn execute(&self, args: &[String], timeout: Duration, trace_id: &str) -> CommandOutput {
        match run_command_with_timeout(&self.program, args, timeout, trace_id) {
            Ok(output) => output,
            Err(err) => {
                warn!(trace_id = %trace_id, code = %err.code, error = %err.error, "adb invocation failed");
                CommandOutput::failed(err.error)
            }
        }
    }
}

pub fn to_args(args: &[&str]) -> Vec<String> {
    args.iter().map(|arg| arg.to_string()).collect()
}
