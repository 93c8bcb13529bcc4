//! Error types for the smoke-test harness
//!
//! Every failure mode of a test case maps to one variant here. Nothing is
//! recovered locally: errors travel up to the runner, which records them
//! as a failed test result.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the harness
#[derive(Error, Debug)]
pub enum Error {
    // === Precondition Errors ===
    #[error("No provisioning client available. Set the token variable named in [azure].token_env and the subscription/resource group in config.toml")]
    ProvisionerUnavailable,

    // === Provisioning Errors ===
    #[error("Provisioning request failed: {0}")]
    Provisioning(String),

    #[error("Deployment '{name}' ended in state '{state}'")]
    DeploymentFailed { name: String, state: String },

    #[error("Deployment '{name}' did not finish within {secs} seconds")]
    DeploymentTimeout { name: String, secs: u64 },

    #[error("Invalid deployment template '{path}': {reason}")]
    InvalidTemplate { path: PathBuf, reason: String },

    // === Build Tool Errors ===
    #[error("Build tool '{name}' not found on PATH")]
    ToolNotFound { name: String },

    #[error("Failed to start '{command}': {reason}")]
    CommandSpawn { command: String, reason: String },

    #[error(
        "Command '{command}' exited with {code_text}{tail_text}",
        code_text = describe_code(.code),
        tail_text = describe_tail(.stderr_tail)
    )]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr_tail: String,
    },

    // === HTTP Errors ===
    #[error("GET {url} returned status {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid site address '{0}'")]
    InvalidUrl(String),

    // === Assertion Errors ===
    #[error("Response from {url} does not contain '{expected}'")]
    ContentMismatch { url: String, expected: String },

    #[error("Test assertion failed: {0}")]
    TestAssertion(String),

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

fn describe_tail(tail: &str) -> String {
    if tail.is_empty() {
        String::new()
    } else {
        format!(":\n{}", tail)
    }
}

impl Error {
    /// Create a command failed error, keeping only the last lines of stderr
    pub fn command_failed(command: &str, code: Option<i32>, stderr: &str) -> Self {
        const TAIL_LINES: usize = 20;
        let lines: Vec<&str> = stderr.lines().collect();
        let start = lines.len().saturating_sub(TAIL_LINES);
        Self::CommandFailed {
            command: command.to_string(),
            code,
            stderr_tail: lines[start..].join("\n"),
        }
    }

    /// Create an invalid template error
    pub fn invalid_template(path: &std::path::Path, reason: impl Into<String>) -> Self {
        Self::InvalidTemplate {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Create a file read error
    pub fn file_read(path: &std::path::Path, error: io::Error) -> Self {
        Self::FileRead {
            path: path.display().to_string(),
            error: error.to_string(),
        }
    }
}
