//! Pipeline tests for the template harness
//!
//! These tests drive `Harness` with in-process collaborators:
//! 1. a provisioner whose sites point at a local HTTP listener
//! 2. a build tool that records commands and returns scripted exit codes
//! 3. the real working-directory, publish-profile and HTTP client code

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::Url;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

use webapp_smoke::build::{BuildTool, CommandOutcome};
use webapp_smoke::provision::{
    profile, DeployedSite, DeploymentTemplate, Fixture, Provisioner, PublishProfile,
    PublishSettings,
};
use webapp_smoke::testing::Step;
use webapp_smoke::{Error, Harness, Result, RunOptions, TemplateCase, TestSuite};

type CallLog = Arc<Mutex<Vec<String>>>;

fn calls(log: &CallLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// Serve every connection with the same status and body, logging the request line
async fn spawn_site(log: CallLog, status: u16, body: &'static str) -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                return;
            };
            let mut reader = BufReader::new(socket);
            let mut request_line = String::new();
            reader.read_line(&mut request_line).await.unwrap();
            loop {
                let mut header = String::new();
                reader.read_line(&mut header).await.unwrap();
                if header == "\r\n" || header.is_empty() {
                    break;
                }
            }
            let mut parts = request_line.split_whitespace();
            let method = parts.next().unwrap_or_default();
            let path = parts.next().unwrap_or_default();
            log.lock().unwrap().push(format!("{} {}", method, path));

            let reply = format!(
                "HTTP/1.1 {} Status\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            let mut socket = reader.into_inner();
            socket.write_all(reply.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        }
    });
    Url::parse(&format!("http://{}", addr)).unwrap()
}

struct FakeSite {
    name: String,
    url: Url,
    log: CallLog,
}

#[async_trait]
impl DeployedSite for FakeSite {
    fn name(&self) -> &str {
        &self.name
    }

    fn base_url(&self) -> &Url {
        &self.url
    }

    async fn build_publish_profile(&self, project_dir: &Path) -> Result<PublishProfile> {
        self.log.lock().unwrap().push("profile".to_string());
        profile::write(
            project_dir,
            profile::DEFAULT_PROFILE_NAME,
            &PublishSettings {
                site_name: self.name.clone(),
                scm_host: format!("{}.scm.example", self.name),
                user_name: format!("${}", self.name),
                password: "secret".to_string(),
                site_url: self.url.to_string(),
            },
        )
    }
}

struct FakeProvisioner {
    url: Url,
    log: CallLog,
}

#[async_trait]
impl Provisioner for FakeProvisioner {
    async fn deploy(
        &self,
        _template: &DeploymentTemplate,
        base_name: &str,
    ) -> Result<Box<dyn DeployedSite>> {
        self.log.lock().unwrap().push(format!("deploy {}", base_name));
        Ok(Box::new(FakeSite {
            name: base_name.to_lowercase(),
            url: self.url.clone(),
            log: self.log.clone(),
        }))
    }

    async fn teardown(&self, site_name: &str) -> Result<()> {
        self.log.lock().unwrap().push(format!("teardown {}", site_name));
        Ok(())
    }
}

/// Build tool double: scripted exit codes, and a marker file left by `new`
struct FakeTool {
    log: CallLog,
    scaffold_code: i32,
    publish_code: i32,
    /// Entries found in the working directory when `new` ran
    seen_on_scaffold: Mutex<Vec<usize>>,
}

impl FakeTool {
    fn new(log: CallLog) -> Self {
        Self {
            log,
            scaffold_code: 0,
            publish_code: 0,
            seen_on_scaffold: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl BuildTool for FakeTool {
    async fn execute(&self, working_dir: &Path, args: &str) -> Result<CommandOutcome> {
        self.log.lock().unwrap().push(format!("tool {}", args));
        let code = if args.starts_with("new ") {
            let entries = std::fs::read_dir(working_dir)?.count();
            self.seen_on_scaffold.lock().unwrap().push(entries);
            std::fs::write(working_dir.join("Program.cs"), "// scaffolded")?;
            self.scaffold_code
        } else {
            self.publish_code
        };
        Ok(CommandOutcome {
            command: format!("dotnet {}", args),
            exit_code: Some(code),
            stdout: String::new(),
            stderr: if code == 0 { String::new() } else { "build failed".to_string() },
        })
    }
}

struct Setup {
    _tmp: TempDir,
    work_root: PathBuf,
    log_root: PathBuf,
    template: PathBuf,
}

fn setup() -> Setup {
    let tmp = tempfile::tempdir().unwrap();
    let template = tmp.path().join("BasicAppServices.json");
    std::fs::write(
        &template,
        r#"{"parameters": {"siteName": {"type": "string"}}, "resources": []}"#,
    )
    .unwrap();
    Setup {
        work_root: tmp.path().join("work"),
        log_root: tmp.path().join("logs"),
        template,
        _tmp: tmp,
    }
}

fn harness(setup: &Setup, provisioner: Option<Arc<dyn Provisioner>>, tool: Arc<FakeTool>) -> Harness {
    let fixture = Arc::new(Fixture::new(provisioner, setup.template.clone(), false));
    Harness::new(
        fixture,
        tool,
        RunOptions {
            work_root: setup.work_root.clone(),
            log_root: Some(setup.log_root.clone()),
            deployment_template: None,
            verbose: false,
        },
    )
}

async fn provisioner(log: &CallLog, status: u16, body: &'static str) -> Arc<dyn Provisioner> {
    let url = spawn_site(log.clone(), status, body).await;
    Arc::new(FakeProvisioner {
        url,
        log: log.clone(),
    })
}

#[tokio::test]
async fn web_template_passes_in_order() {
    let setup = setup();
    let log = CallLog::default();
    let tool = Arc::new(FakeTool::new(log.clone()));
    let harness = harness(
        &setup,
        Some(provisioner(&log, 200, "<html><body>Hello World!</body></html>").await),
        tool,
    );

    let case = TemplateCase::new("web", "Hello World!");
    let outcome = harness
        .execute("TemplateFunctionalTests", &case.test_id(), &case)
        .await;

    assert!(outcome.result.is_ok(), "{:?}", outcome.result);
    assert_eq!(outcome.step, Step::Verify);
    assert_eq!(
        calls(&log),
        vec![
            "deploy DotnetNewWebRunsInWebAppweb",
            "tool new web",
            "profile",
            "tool publish /p:PublishProfile=Profile",
            "GET /",
        ]
    );

    let dir = setup.work_root.join("DotnetNewWebRunsInWebAppweb");
    assert!(dir.join("Properties/PublishProfiles/Profile.pubxml").is_file());
    assert_eq!(
        harness.fixture().deployed_sites(),
        vec!["dotnetnewwebrunsinwebappweb"]
    );

    let log_path = outcome.log_path.unwrap();
    assert_eq!(
        log_path,
        setup
            .log_root
            .join("TemplateFunctionalTests")
            .join("DotnetNewWebRunsInWebAppweb.log")
    );
    let content = std::fs::read_to_string(log_path).unwrap();
    assert!(content.contains("Test passed"));
}

#[tokio::test]
async fn mvc_template_checks_landing_text() {
    let setup = setup();
    let log = CallLog::default();
    let tool = Arc::new(FakeTool::new(log.clone()));
    let harness = harness(
        &setup,
        Some(
            provisioner(
                &log,
                200,
                "<p>Learn how to build ASP.NET apps that can run anywhere.</p>",
            )
            .await,
        ),
        tool,
    );

    let case = TemplateCase::new("mvc", "Learn how to build ASP.NET apps that can run anywhere.");
    let result = harness.run_case("TemplateFunctionalTests", &case).await;
    assert!(result.passed, "{:?}", result.error);
    assert_eq!(result.steps_run, result.steps_total);
}

#[tokio::test]
async fn scaffold_failure_stops_before_publish() {
    let setup = setup();
    let log = CallLog::default();
    let mut tool = FakeTool::new(log.clone());
    tool.scaffold_code = 1;
    let harness = harness(
        &setup,
        Some(provisioner(&log, 200, "Hello World!").await),
        Arc::new(tool),
    );

    let case = TemplateCase::new("web", "Hello World!");
    let outcome = harness.execute("suite", &case.test_id(), &case).await;

    assert_eq!(outcome.step, Step::Scaffold);
    match outcome.result {
        Err(Error::CommandFailed { code, stderr_tail, .. }) => {
            assert_eq!(code, Some(1));
            assert_eq!(stderr_tail, "build failed");
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(
        calls(&log),
        vec!["deploy DotnetNewWebRunsInWebAppweb", "tool new web"]
    );
}

#[tokio::test]
async fn publish_failure_stops_before_http() {
    let setup = setup();
    let log = CallLog::default();
    let mut tool = FakeTool::new(log.clone());
    tool.publish_code = 2;
    let harness = harness(
        &setup,
        Some(provisioner(&log, 200, "Hello World!").await),
        Arc::new(tool),
    );

    let case = TemplateCase::new("web", "Hello World!");
    let result = harness.run_case("suite", &case).await;

    assert!(!result.passed);
    assert_eq!(result.failed_step, Some(Step::Publish));
    assert_eq!(result.steps_run, 6);
    assert!(!calls(&log).iter().any(|c| c.starts_with("GET ")));
}

#[tokio::test]
async fn error_status_skips_content_check() {
    let setup = setup();
    let log = CallLog::default();
    let tool = Arc::new(FakeTool::new(log.clone()));
    let harness = harness(
        &setup,
        Some(provisioner(&log, 503, "Service Unavailable").await),
        tool,
    );

    let case = TemplateCase::new("web", "Hello World!");
    let outcome = harness.execute("suite", &case.test_id(), &case).await;

    // The body lacks the expected text, so checking content first would
    // surface ContentMismatch instead.
    assert_eq!(outcome.step, Step::Verify);
    match outcome.result {
        Err(Error::HttpStatus { status, .. }) => assert_eq!(status, 503),
        other => panic!("expected HttpStatus, got {:?}", other),
    }
}

#[tokio::test]
async fn path_like_suite_name_never_leaves_log_root() {
    let setup = setup();
    let log = CallLog::default();
    let tool = Arc::new(FakeTool::new(log.clone()));
    let harness = harness(
        &setup,
        Some(provisioner(&log, 200, "Hello World!").await),
        tool,
    );

    let case = TemplateCase::new("web", "Hello World!");
    let outcome = harness.execute("../escaped", &case.test_id(), &case).await;

    assert_eq!(outcome.step, Step::Logger);
    assert!(matches!(outcome.result, Err(Error::Config(_))));
    assert!(outcome.log_path.is_none());
    assert!(!setup.log_root.parent().unwrap().join("escaped").exists());
    assert!(calls(&log).is_empty());
}

#[tokio::test]
async fn missing_content_fails() {
    let setup = setup();
    let log = CallLog::default();
    let tool = Arc::new(FakeTool::new(log.clone()));
    let harness = harness(
        &setup,
        Some(provisioner(&log, 200, "Welcome to nginx").await),
        tool,
    );

    let case = TemplateCase::new("web", "Hello World!");
    let outcome = harness.execute("suite", &case.test_id(), &case).await;

    match outcome.result {
        Err(Error::ContentMismatch { expected, .. }) => assert_eq!(expected, "Hello World!"),
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[tokio::test]
async fn missing_provisioner_fails_precondition() {
    let setup = setup();
    let log = CallLog::default();
    let tool = Arc::new(FakeTool::new(log.clone()));
    let harness = harness(&setup, None, tool);

    let case = TemplateCase::new("razor", "Learn how to build ASP.NET apps that can run anywhere.");
    let outcome = harness.execute("suite", &case.test_id(), &case).await;

    assert_eq!(outcome.step, Step::Provision);
    assert!(matches!(outcome.result, Err(Error::ProvisionerUnavailable)));
    assert!(calls(&log).is_empty());
}

#[tokio::test]
async fn rerun_starts_from_clean_directory() {
    let setup = setup();
    let log = CallLog::default();
    let tool = Arc::new(FakeTool::new(log.clone()));
    let harness = harness(
        &setup,
        Some(provisioner(&log, 200, "Hello World!").await),
        tool.clone(),
    );

    let case = TemplateCase::new("web", "Hello World!");
    let first = harness.run_case("suite", &case).await;
    let second = harness.run_case("suite", &case).await;

    assert!(first.passed, "{:?}", first.error);
    assert!(second.passed, "{:?}", second.error);
    assert_eq!(*tool.seen_on_scaffold.lock().unwrap(), vec![0, 0]);
}

#[tokio::test]
async fn suite_runs_every_case_and_disposes_sites() {
    let setup = setup();
    let log = CallLog::default();
    let tool = Arc::new(FakeTool::new(log.clone()));
    let harness = harness(
        &setup,
        Some(provisioner(&log, 200, "Hello World! Learn how to build ASP.NET apps that can run anywhere.").await),
        tool,
    );

    let suite = TestSuite::builtin();
    let results = harness.run_suite(&suite).await;
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.passed));

    for case in &suite.cases {
        assert!(setup.work_root.join(case.test_id()).is_dir());
        assert!(setup
            .log_root
            .join(&suite.name)
            .join(format!("{}.log", case.test_id()))
            .is_file());
    }

    harness.fixture().dispose().await.unwrap();
    let teardowns: Vec<String> = calls(&log)
        .into_iter()
        .filter(|c| c.starts_with("teardown "))
        .collect();
    assert_eq!(teardowns.len(), 3);
}
