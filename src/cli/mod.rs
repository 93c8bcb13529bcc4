//! CLI command handling
//!
//! Dispatches CLI commands and formats their output.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use colored::Colorize;

use crate::build::ToolCommand;
use crate::commands::Commands;
use crate::common::config::Config;
use crate::common::{paths, Error, Result};
use crate::provision::Fixture;
use crate::testing::{print_summary, Harness, RunOptions, TestSuite};

/// Global flags shared by every command
pub struct GlobalOptions {
    pub config: Option<PathBuf>,
    pub verbose: bool,
}

/// Dispatch a CLI command
pub async fn dispatch(command: Commands, global: GlobalOptions) -> Result<()> {
    let config = load_config(global.config.as_deref())?;

    match command {
        Commands::Run {
            suite,
            template,
            expected,
            filter,
            keep_resources,
            deployment_template,
        } => {
            let mut suite = match (suite, template, expected) {
                (Some(path), _, _) => TestSuite::load(&path)?,
                (None, Some(template), Some(expected)) => {
                    let suite = TestSuite::single(&template, &expected);
                    suite.validate()?;
                    suite
                }
                _ => TestSuite::builtin(),
            };
            if let Some(pattern) = filter {
                suite = suite.filtered(&pattern);
                if suite.cases.is_empty() {
                    return Err(Error::Config(format!("No cases match '{}'", pattern)));
                }
            }

            let mut config = config;
            if keep_resources {
                config.fixture.keep_resources = true;
            }
            run(&config, suite, deployment_template, global.verbose).await
        }

        Commands::List { suite } => {
            let suite = match suite {
                Some(path) => TestSuite::load(&path)?,
                None => TestSuite::builtin(),
            };
            println!("{} {}", "Suite:".cyan().bold(), suite.name.white().bold());
            for case in &suite.cases {
                println!(
                    "  {:<36} {:<10} {}",
                    case.test_id(),
                    case.template,
                    case.expected.dimmed()
                );
            }
            Ok(())
        }

        Commands::Config { init } => {
            if init {
                init_config()?;
            }
            show_config(&config, global.config.as_deref())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

async fn run(
    config: &Config,
    suite: TestSuite,
    deployment_template: Option<PathBuf>,
    verbose: bool,
) -> Result<()> {
    let tool = ToolCommand::new(&config.tool.program)?;
    tracing::debug!(program = %tool.program().display(), "Using build tool");

    let fixture = Arc::new(Fixture::from_config(config)?);
    let options = RunOptions {
        work_root: config.paths.work_root.clone(),
        log_root: config.log_root(),
        deployment_template: deployment_template.or_else(|| suite.deployment_template.clone()),
        verbose,
    };
    let harness = Harness::new(fixture.clone(), Arc::new(tool), options);

    let results = harness.run_suite(&suite).await;
    let failures = print_summary(&results);

    if let Err(e) = fixture.dispose().await {
        eprintln!("{} {}", "Teardown failed:".yellow(), e);
    }

    if failures > 0 {
        return Err(Error::TestAssertion(format!(
            "{} of {} cases failed",
            failures,
            results.len()
        )));
    }
    Ok(())
}

fn init_config() -> Result<()> {
    let Some(dir) = paths::ensure_config_dir()? else {
        return Err(Error::Config("No configuration directory on this platform".to_string()));
    };
    let path = dir.join("config.toml");
    if path.exists() {
        println!("Config already exists: {}", path.display());
        return Ok(());
    }
    let content = toml::to_string_pretty(&Config::default())
        .map_err(|e| Error::Internal(format!("Failed to render config: {}", e)))?;
    std::fs::write(&path, content)?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn show_config(config: &Config, explicit: Option<&Path>) -> Result<()> {
    let source = explicit
        .map(Path::to_path_buf)
        .or_else(paths::config_path)
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(none)".to_string());
    println!("{} {}", "Config file:".cyan(), source);
    match config.log_root() {
        Some(dir) => println!("{} {}", "Log root:".cyan(), dir.display()),
        None => println!("{} (stderr only)", "Log root:".cyan()),
    }
    println!(
        "{} {}",
        "Token:".cyan(),
        if config.token().is_some() {
            format!("set (${})", config.azure.token_env)
        } else {
            format!("missing (${})", config.azure.token_env)
        }
    );
    println!();

    let rendered = toml::to_string_pretty(config)
        .map_err(|e| Error::Internal(format!("Failed to render config: {}", e)))?;
    print!("{}", rendered);
    Ok(())
}
