//! Process runner for the build tool

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

use super::{BuildTool, CommandOutcome};
use crate::common::{Error, Result};

/// Environment applied to every invocation
const TOOL_ENV: &[(&str, &str)] = &[
    ("DOTNET_CLI_TELEMETRY_OPTOUT", "1"),
    ("DOTNET_NOLOGO", "1"),
    ("DOTNET_SKIP_FIRST_TIME_EXPERIENCE", "1"),
];

/// A build tool executable resolved on PATH
#[derive(Debug, Clone)]
pub struct ToolCommand {
    name: String,
    program: PathBuf,
}

impl ToolCommand {
    /// Resolve `name` (a bare program name or a path) through PATH
    pub fn new(name: &str) -> Result<Self> {
        let program = which::which(name).map_err(|_| Error::ToolNotFound {
            name: name.to_string(),
        })?;
        Ok(Self {
            name: name.to_string(),
            program,
        })
    }

    /// Resolved executable path
    pub fn program(&self) -> &Path {
        &self.program
    }
}

#[async_trait]
impl BuildTool for ToolCommand {
    async fn execute(&self, working_dir: &Path, args: &str) -> Result<CommandOutcome> {
        let command_line = if args.is_empty() {
            self.name.clone()
        } else {
            format!("{} {}", self.name, args)
        };
        tracing::info!(command = %command_line, dir = %working_dir.display(), "Executing");

        let mut child = Command::new(&self.program)
            .args(args.split_whitespace())
            .current_dir(working_dir)
            .envs(TOOL_ENV.iter().copied())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::CommandSpawn {
                command: command_line.clone(),
                reason: e.to_string(),
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Internal("Failed to capture stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::Internal("Failed to capture stderr".to_string()))?;

        let (stdout, stderr, status) = tokio::join!(
            collect_lines(stdout, Stream::Stdout),
            collect_lines(stderr, Stream::Stderr),
            child.wait()
        );
        let status = status?;

        tracing::info!(command = %command_line, code = ?status.code(), "Finished");

        Ok(CommandOutcome {
            command: command_line,
            exit_code: status.code(),
            stdout: stdout?,
            stderr: stderr?,
        })
    }
}

#[derive(Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// Forward each line to tracing while accumulating the full output
async fn collect_lines<R: AsyncRead + Unpin>(reader: R, stream: Stream) -> Result<String> {
    let mut lines = BufReader::new(reader).lines();
    let mut out = String::new();
    while let Some(line) = lines.next_line().await? {
        match stream {
            Stream::Stdout => tracing::debug!(target: "webapp_smoke::build::stdout", "{}", line),
            Stream::Stderr => tracing::warn!(target: "webapp_smoke::build::stderr", "{}", line),
        }
        out.push_str(&line);
        out.push('\n');
    }
    Ok(out)
}
