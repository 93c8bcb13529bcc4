//! Logging and tracing configuration
//!
//! The CLI installs one global stderr subscriber. Each test case
//! additionally gets its own `TestLogger`: a dispatcher that writes to a
//! per-test log file and to stderr, attached to the test's future so that
//! concurrently scheduled cases never interleave in each other's files.

use std::future::Future;
use std::path::{Path, PathBuf};

use tracing::instrument::{Instrument, WithSubscriber};
use tracing::Dispatch;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use super::paths::is_single_component;
use super::{Error, Result};

/// Default filter when `RUST_LOG` is unset
const DEFAULT_FILTER: &str = "webapp_smoke=info,warn";

/// Initialize tracing for the CLI (stderr logging)
///
/// Logs are controlled by the `RUST_LOG` environment variable.
/// Default level is INFO for this crate, WARN for dependencies.
pub fn init_cli(verbose: bool) {
    tracing_subscriber::registry()
        .with(filter(verbose))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .init();
}

fn filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("webapp_smoke=debug,info")
        } else {
            EnvFilter::new(DEFAULT_FILTER)
        }
    })
}

/// Logger scoped to a single test case
///
/// Dropping it flushes and closes the per-test log file. Holding it for the
/// duration of the test is what guarantees release on every exit path.
#[derive(Debug)]
pub struct TestLogger {
    test_id: String,
    log_path: Option<PathBuf>,
    dispatch: Dispatch,
    _guard: Option<WorkerGuard>,
}

impl TestLogger {
    /// Start a test log at `<log_root>/<suite>/<test_id>.log`
    ///
    /// With no log root the logger only writes to stderr. `suite` and
    /// `test_id` must each be a single path component.
    pub fn start(log_root: Option<&Path>, suite: &str, test_id: &str, verbose: bool) -> Result<Self> {
        for name in [suite, test_id] {
            if !is_single_component(name) {
                return Err(Error::Config(format!(
                    "Log name '{}' must be a plain directory name",
                    name
                )));
            }
        }

        let Some(root) = log_root else {
            let dispatch = Dispatch::new(
                tracing_subscriber::registry().with(filter(verbose)).with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(false)
                        .compact(),
                ),
            );
            return Ok(Self {
                test_id: test_id.to_string(),
                log_path: None,
                dispatch,
                _guard: None,
            });
        };

        let dir = root.join(suite);
        std::fs::create_dir_all(&dir)?;
        let log_path = dir.join(format!("{}.log", test_id));
        if log_path.exists() {
            std::fs::remove_file(&log_path)?;
        }

        let appender = RollingFileAppender::builder()
            .rotation(Rotation::NEVER)
            .filename_prefix(test_id)
            .filename_suffix("log")
            .build(&dir)
            .map_err(|e| Error::Internal(format!("Failed to open test log: {}", e)))?;
        let (writer, guard) = tracing_appender::non_blocking(appender);

        let file_layer = fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);

        let stderr_layer = verbose.then(|| {
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact()
        });

        let dispatch = Dispatch::new(
            tracing_subscriber::registry()
                .with(EnvFilter::new("webapp_smoke=trace,info"))
                .with(file_layer)
                .with(stderr_layer),
        );

        Ok(Self {
            test_id: test_id.to_string(),
            log_path: Some(log_path),
            dispatch,
            _guard: Some(guard),
        })
    }

    /// Path of the per-test log file, if one is written
    pub fn log_path(&self) -> Option<&Path> {
        self.log_path.as_deref()
    }

    /// Run a future with this logger as its default subscriber
    pub async fn scope<F: Future>(&self, fut: F) -> F::Output {
        // The span must belong to the test dispatcher, not the global one.
        let span = tracing::dispatcher::with_default(&self.dispatch, || {
            tracing::info_span!("test", id = %self.test_id)
        });
        fut.instrument(span)
            .with_subscriber(self.dispatch.clone())
            .await
    }
}
