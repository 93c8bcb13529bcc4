//! Hosting resource provisioning
//!
//! A `Provisioner` turns a deployment template into a running site and
//! hands back a `DeployedSite`. The `Fixture` owns the provisioner for a
//! whole run, remembers what it deployed and tears it down at the end.

pub mod arm;
pub mod profile;
pub mod template;

pub use arm::ArmProvisioner;
pub use profile::{PublishProfile, PublishSettings};
pub use template::DeploymentTemplate;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::Url;

use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::verify::SiteClient;

/// A site created by a provisioner
#[async_trait]
pub trait DeployedSite: Send + Sync {
    /// Provider-side name of the site
    fn name(&self) -> &str;

    /// Public base address
    fn base_url(&self) -> &Url;

    /// Materialize a publish profile inside `project_dir`
    async fn build_publish_profile(&self, project_dir: &Path) -> Result<PublishProfile>;

    /// Create a short-lived HTTP client bound to the base address
    fn create_client(&self) -> Result<SiteClient> {
        SiteClient::new(self.base_url().clone())
    }
}

/// Trait for hosting resource provisioners
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Deploy `template`, naming the site after `base_name`
    async fn deploy(
        &self,
        template: &DeploymentTemplate,
        base_name: &str,
    ) -> Result<Box<dyn DeployedSite>>;

    /// Delete a site previously returned by `deploy`
    async fn teardown(&self, site_name: &str) -> Result<()>;
}

/// Shared provisioning state for a test run
///
/// Test cases only read from it; the deployed-site registry is the one
/// piece of interior state and is only appended to.
pub struct Fixture {
    provisioner: Option<Arc<dyn Provisioner>>,
    template_path: PathBuf,
    keep_resources: bool,
    deployed: Mutex<Vec<String>>,
}

impl Fixture {
    pub fn new(
        provisioner: Option<Arc<dyn Provisioner>>,
        template_path: impl Into<PathBuf>,
        keep_resources: bool,
    ) -> Self {
        Self {
            provisioner,
            template_path: template_path.into(),
            keep_resources,
            deployed: Mutex::new(Vec::new()),
        }
    }

    /// Build a fixture from configuration
    ///
    /// The provisioner is absent when the resource manager settings or the
    /// token are missing; test cases then fail their precondition check.
    pub fn from_config(config: &Config) -> Result<Self> {
        let provisioner = ArmProvisioner::from_config(config)?
            .map(|p| Arc::new(p) as Arc<dyn Provisioner>);
        if provisioner.is_none() {
            tracing::warn!("Resource manager settings incomplete; no provisioning client available");
        }
        Ok(Self::new(
            provisioner,
            config.paths.deployment_template.clone(),
            config.fixture.keep_resources,
        ))
    }

    /// The provisioning client, if one is configured
    pub fn provisioner(&self) -> Option<&Arc<dyn Provisioner>> {
        self.provisioner.as_ref()
    }

    /// Template used for every deployment in this run
    pub fn template_path(&self) -> &Path {
        &self.template_path
    }

    /// Deploy a site from `template_path`
    pub async fn deploy(&self, template_path: &Path, base_name: &str) -> Result<Box<dyn DeployedSite>> {
        let provisioner = self.provisioner.as_ref().ok_or(Error::ProvisionerUnavailable)?;
        let template = DeploymentTemplate::load(template_path)?;

        tracing::info!(template = %template_path.display(), base_name, "Provisioning site");
        let site = provisioner.deploy(&template, base_name).await?;
        tracing::info!(site = site.name(), url = %site.base_url(), "Site provisioned");

        self.registry().push(site.name().to_string());
        Ok(site)
    }

    /// Names of every site deployed through this fixture
    pub fn deployed_sites(&self) -> Vec<String> {
        self.registry().clone()
    }

    /// Tear down every deployed site unless resources are kept
    ///
    /// All sites are attempted; the first failure is returned.
    pub async fn dispose(&self) -> Result<()> {
        let sites: Vec<String> = std::mem::take(&mut *self.registry());
        if sites.is_empty() {
            return Ok(());
        }
        if self.keep_resources {
            tracing::info!(count = sites.len(), "Keeping provisioned sites: {}", sites.join(", "));
            return Ok(());
        }
        let Some(provisioner) = self.provisioner.as_ref() else {
            return Ok(());
        };

        let mut first_error = None;
        for site in sites {
            tracing::info!(site = %site, "Tearing down site");
            if let Err(e) = provisioner.teardown(&site).await {
                tracing::error!(site = %site, error = %e, "Teardown failed");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn registry(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        self.deployed.lock().unwrap_or_else(|e| e.into_inner())
    }
}
