//! Test suite configuration types
//!
//! Defines the data structures for deserializing YAML test suites.

use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::common::paths::is_single_component;
use crate::common::{naming, Error, Result};

/// Name of the suite used when no suite file is given
pub const BUILTIN_SUITE: &str = "TemplateFunctionalTests";

/// Expected content of the `razor` and `mvc` landing pages
const ASPNET_LANDING: &str = "Learn how to build ASP.NET apps that can run anywhere.";

/// A complete test suite loaded from a YAML file
#[derive(Deserialize, Debug, Clone)]
pub struct TestSuite {
    /// Name of the suite; also the log subdirectory
    pub name: String,
    /// Optional description of what the suite verifies
    pub description: Option<String>,
    /// Deployment template overriding the configured one
    pub deployment_template: Option<PathBuf>,
    /// Template cases, run in order
    pub cases: Vec<TemplateCase>,
}

/// One scaffold template and the content its landing page must contain
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TemplateCase {
    /// Scaffold identifier passed to `new`
    pub template: String,
    /// Case-sensitive substring expected in the body of `GET /`
    pub expected: String,
    /// Explicit test id; derived from the template when absent
    pub id: Option<String>,
}

impl TemplateCase {
    pub fn new(template: &str, expected: &str) -> Self {
        Self {
            template: template.to_string(),
            expected: expected.to_string(),
            id: None,
        }
    }

    /// Test id keying the working directory, log file and site name
    pub fn test_id(&self) -> String {
        self.id
            .clone()
            .unwrap_or_else(|| naming::test_id(&self.template))
    }
}

impl TestSuite {
    /// The web, razor and mvc template cases
    pub fn builtin() -> Self {
        Self {
            name: BUILTIN_SUITE.to_string(),
            description: Some("Scaffold, publish and browse the default web templates".to_string()),
            deployment_template: None,
            cases: vec![
                TemplateCase::new("web", "Hello World!"),
                TemplateCase::new("razor", ASPNET_LANDING),
                TemplateCase::new("mvc", ASPNET_LANDING),
            ],
        }
    }

    /// A suite holding a single ad-hoc case
    pub fn single(template: &str, expected: &str) -> Self {
        Self {
            name: BUILTIN_SUITE.to_string(),
            description: None,
            deployment_template: None,
            cases: vec![TemplateCase::new(template, expected)],
        }
    }

    /// Load a suite file; relative template paths resolve against its directory
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read test suite '{}': {}", path.display(), e))
        })?;
        let mut suite = Self::parse(&content)?;

        let suite_dir = path.parent().unwrap_or(Path::new("."));
        if let Some(template) = &suite.deployment_template {
            if template.is_relative() {
                suite.deployment_template = Some(suite_dir.join(template));
            }
        }
        Ok(suite)
    }

    /// Parse and validate suite YAML
    pub fn parse(content: &str) -> Result<Self> {
        let suite: Self = serde_yaml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse test suite: {}", e)))?;
        suite.validate()?;
        Ok(suite)
    }

    /// Reject empty fields, names that are not a single path component, and duplicate ids
    pub fn validate(&self) -> Result<()> {
        if !is_single_component(&self.name) {
            return Err(Error::Config(format!(
                "Suite name '{}' must be a plain directory name",
                self.name
            )));
        }
        if self.cases.is_empty() {
            return Err(Error::Config(format!("Suite '{}' has no cases", self.name)));
        }
        let mut seen = HashSet::new();
        for case in &self.cases {
            if case.template.trim().is_empty() {
                return Err(Error::Config("Case with empty template".to_string()));
            }
            if case.expected.is_empty() {
                return Err(Error::Config(format!(
                    "Case '{}' has an empty expected string",
                    case.template
                )));
            }
            let id = case.test_id();
            if !is_single_component(&id) {
                return Err(Error::Config(format!(
                    "Test id '{}' must be a plain directory name",
                    id
                )));
            }
            if !seen.insert(id.clone()) {
                return Err(Error::Config(format!("Duplicate test id '{}'", id)));
            }
        }
        Ok(())
    }

    /// Keep only cases whose id or template contains `pattern`
    pub fn filtered(mut self, pattern: &str) -> Self {
        self.cases
            .retain(|c| c.template.contains(pattern) || c.test_id().contains(pattern));
        self
    }
}
