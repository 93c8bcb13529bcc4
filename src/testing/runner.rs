//! Test runner implementation
//!
//! Executes template cases as a strict chain: working directory,
//! provisioning, scaffold, publish profile, publish, verification. The
//! first failing step ends the case.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use colored::Colorize;

use crate::build::{self, BuildTool};
use crate::common::logging::TestLogger;
use crate::common::{Error, Result};
use crate::provision::Fixture;

use super::config::{TemplateCase, TestSuite};
use super::workspace;

/// Pipeline steps in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Step {
    Logger,
    Workspace,
    Provision,
    Scaffold,
    PublishProfile,
    Publish,
    Verify,
}

impl Step {
    pub const ALL: [Step; 7] = [
        Step::Logger,
        Step::Workspace,
        Step::Provision,
        Step::Scaffold,
        Step::PublishProfile,
        Step::Publish,
        Step::Verify,
    ];

    /// 1-based position in the pipeline
    pub fn number(self) -> usize {
        self as usize + 1
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Step::Logger => "start test log",
            Step::Workspace => "recreate working directory",
            Step::Provision => "provision site",
            Step::Scaffold => "scaffold template",
            Step::PublishProfile => "write publish profile",
            Step::Publish => "publish",
            Step::Verify => "verify site content",
        };
        f.write_str(label)
    }
}

/// Result of a test run
#[derive(Debug)]
pub struct TestResult {
    pub name: String,
    pub template: String,
    pub passed: bool,
    pub steps_run: usize,
    pub steps_total: usize,
    pub failed_step: Option<Step>,
    pub error: Option<String>,
    pub log_path: Option<PathBuf>,
}

/// Raw outcome of one case, before it is flattened into a `TestResult`
#[derive(Debug)]
pub struct CaseOutcome {
    /// Last step that was started
    pub step: Step,
    pub result: Result<()>,
    pub log_path: Option<PathBuf>,
}

/// Settings shared by every case of a run
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Parent of the per-test working directories
    pub work_root: PathBuf,
    /// Parent of the per-suite log directories; stderr only when `None`
    pub log_root: Option<PathBuf>,
    /// Template overriding the fixture's
    pub deployment_template: Option<PathBuf>,
    pub verbose: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            work_root: PathBuf::from("."),
            log_root: None,
            deployment_template: None,
            verbose: false,
        }
    }
}

/// Orchestrates cases against a fixture and a build tool
pub struct Harness {
    fixture: Arc<Fixture>,
    tool: Arc<dyn BuildTool>,
    options: RunOptions,
}

impl Harness {
    pub fn new(fixture: Arc<Fixture>, tool: Arc<dyn BuildTool>, options: RunOptions) -> Self {
        Self {
            fixture,
            tool,
            options,
        }
    }

    pub fn fixture(&self) -> &Fixture {
        &self.fixture
    }

    fn template_path(&self) -> &Path {
        self.options
            .deployment_template
            .as_deref()
            .unwrap_or_else(|| self.fixture.template_path())
    }

    /// Run one case under a logger scoped to `test_id`
    ///
    /// The logger is dropped, and its file flushed, on every exit path.
    pub async fn execute(&self, suite: &str, test_id: &str, case: &TemplateCase) -> CaseOutcome {
        let logger = match TestLogger::start(
            self.options.log_root.as_deref(),
            suite,
            test_id,
            self.options.verbose,
        ) {
            Ok(logger) => logger,
            Err(e) => {
                return CaseOutcome {
                    step: Step::Logger,
                    result: Err(e),
                    log_path: None,
                }
            }
        };

        let mut step = Step::Logger;
        let result = logger.scope(self.pipeline(test_id, case, &mut step)).await;
        if let Err(e) = &result {
            logger
                .scope(async { tracing::error!(step = %step, error = %e, "Test failed") })
                .await;
        } else {
            logger.scope(async { tracing::info!("Test passed") }).await;
        }

        CaseOutcome {
            step,
            result,
            log_path: logger.log_path().map(Path::to_path_buf),
        }
    }

    async fn pipeline(&self, test_id: &str, case: &TemplateCase, step: &mut Step) -> Result<()> {
        tracing::info!(template = %case.template, expected = %case.expected, "Starting test");

        *step = Step::Workspace;
        let dir = workspace::recreate(&self.options.work_root, test_id)?;

        *step = Step::Provision;
        if self.fixture.provisioner().is_none() {
            return Err(Error::ProvisionerUnavailable);
        }
        let site = self.fixture.deploy(self.template_path(), test_id).await?;

        *step = Step::Scaffold;
        self.tool
            .execute(&dir, &build::scaffold_args(&case.template))
            .await?
            .assert_success()?;

        *step = Step::PublishProfile;
        let profile = site.build_publish_profile(&dir).await?;

        *step = Step::Publish;
        self.tool
            .execute(&dir, &build::publish_args(&profile.name))
            .await?
            .assert_success()?;

        *step = Step::Verify;
        let client = site.create_client()?;
        tracing::info!(site = site.name(), url = %client.base_url(), "Requesting site root");
        let response = client.get("/").await?;
        response.ensure_success()?.assert_contains(&case.expected)?;

        Ok(())
    }

    /// Run a case and report it on stdout
    pub async fn run_case(&self, suite: &str, case: &TemplateCase) -> TestResult {
        let test_id = case.test_id();
        println!("\n{} {}", "Running Test:".blue().bold(), test_id.white().bold());
        println!(
            "  {} {}  {} {}",
            "template".dimmed(),
            case.template,
            "expects".dimmed(),
            case.expected.dimmed()
        );

        let outcome = self.execute(suite, &test_id, case).await;
        let steps_total = Step::ALL.len();

        match outcome.result {
            Ok(()) => {
                println!("  {} {}", "✓".green(), "Test Passed".green().bold());
                TestResult {
                    name: test_id,
                    template: case.template.clone(),
                    passed: true,
                    steps_run: steps_total,
                    steps_total,
                    failed_step: None,
                    error: None,
                    log_path: outcome.log_path,
                }
            }
            Err(e) => {
                println!(
                    "  {} Step {} ({}): {}",
                    "✗".red(),
                    outcome.step.number(),
                    outcome.step,
                    e
                );
                if let Some(path) = &outcome.log_path {
                    println!("  {} {}", "log:".dimmed(), path.display().to_string().dimmed());
                }
                TestResult {
                    name: test_id,
                    template: case.template.clone(),
                    passed: false,
                    steps_run: outcome.step.number(),
                    steps_total,
                    failed_step: Some(outcome.step),
                    error: Some(e.to_string()),
                    log_path: outcome.log_path,
                }
            }
        }
    }

    /// Run every case of a suite in order
    pub async fn run_suite(&self, suite: &TestSuite) -> Vec<TestResult> {
        println!("{} {}", "Suite:".cyan().bold(), suite.name.white().bold());
        if let Some(desc) = &suite.description {
            println!("  {}", desc.dimmed());
        }

        let mut results = Vec::with_capacity(suite.cases.len());
        for case in &suite.cases {
            results.push(self.run_case(&suite.name, case).await);
        }
        results
    }
}

/// Print a pass/fail summary; returns the number of failures
pub fn print_summary(results: &[TestResult]) -> usize {
    let failed: Vec<&TestResult> = results.iter().filter(|r| !r.passed).collect();
    let passed = results.len() - failed.len();

    println!("\n{}", "Summary:".cyan().bold());
    for result in results {
        if result.passed {
            println!("  {} {}", "✓".green(), result.name);
        } else {
            println!(
                "  {} {} ({}/{} steps)",
                "✗".red(),
                result.name,
                result.steps_run,
                result.steps_total
            );
        }
    }

    let line = format!("{} passed, {} failed", passed, failed.len());
    if failed.is_empty() {
        println!("\n{}\n", line.green().bold());
    } else {
        println!("\n{}\n", line.red().bold());
    }
    failed.len()
}
