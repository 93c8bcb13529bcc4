//! Build tool invocation
//!
//! The harness only ever issues two commands to the build tool, `new
//! <template>` and `publish /p:PublishProfile=<name>`, always in a test's
//! working directory. `BuildTool` is the seam; `ToolCommand` runs a real
//! program.

mod command;

pub use command::ToolCommand;

use std::path::Path;

use async_trait::async_trait;

use crate::common::{Error, Result};

/// Outcome of one build tool invocation
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    /// Command line as issued, for diagnostics
    pub command: String,
    /// Exit code, `None` when terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutcome {
    /// Whether the command exited with code zero
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Turn a non-success exit into `Error::CommandFailed`
    pub fn assert_success(&self) -> Result<()> {
        if self.success() {
            Ok(())
        } else {
            Err(Error::command_failed(
                &self.command,
                self.exit_code,
                &self.stderr,
            ))
        }
    }
}

/// A command-line build tool run against a working directory
#[async_trait]
pub trait BuildTool: Send + Sync {
    /// Run the tool with whitespace-separated `args` in `working_dir`
    async fn execute(&self, working_dir: &Path, args: &str) -> Result<CommandOutcome>;
}

/// `new <template>`
pub fn scaffold_args(template: &str) -> String {
    format!("new {}", template)
}

/// `publish /p:PublishProfile=<profile>`
pub fn publish_args(profile: &str) -> String {
    format!("publish /p:PublishProfile={}", profile)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(code: Option<i32>) -> CommandOutcome {
        CommandOutcome {
            command: "dotnet new web".to_string(),
            exit_code: code,
            stdout: String::new(),
            stderr: "error NU1101: Unable to find package".to_string(),
        }
    }

    #[test]
    fn test_assert_success() {
        assert!(outcome(Some(0)).assert_success().is_ok());
    }

    #[test]
    fn test_assert_success_rejects_nonzero() {
        let err = outcome(Some(1)).assert_success().unwrap_err();
        match err {
            Error::CommandFailed { code, stderr_tail, .. } => {
                assert_eq!(code, Some(1));
                assert!(stderr_tail.contains("NU1101"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_signal_is_not_success() {
        assert!(!outcome(None).success());
    }

    #[test]
    fn test_command_strings() {
        assert_eq!(scaffold_args("razor"), "new razor");
        assert_eq!(publish_args("Profile"), "publish /p:PublishProfile=Profile");
    }
}
