//! Resource manager REST provisioner
//!
//! Deploys the template as a resource-group deployment, waits for it to
//! reach a terminal state, then reads back the site's host names and
//! publishing credentials.

use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use super::profile::{self, PublishProfile, PublishSettings, DEFAULT_PROFILE_NAME};
use super::{DeployedSite, DeploymentTemplate, Provisioner};
use crate::common::config::Config;
use crate::common::{naming, Error, Result};
use crate::verify::SiteClient;

/// Resource manager envelope: everything interesting sits under `properties`
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    properties: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeploymentProperties {
    provisioning_state: String,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SiteProperties {
    default_host_name: String,
    #[serde(default)]
    enabled_host_names: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublishingCredentials {
    publishing_user_name: String,
    publishing_password: String,
}

/// Provisioner backed by the resource manager REST API
pub struct ArmProvisioner {
    http: reqwest::Client,
    endpoint: String,
    subscription_id: String,
    resource_group: String,
    location: String,
    token: String,
    deployments_api_version: String,
    web_api_version: String,
    deployment_timeout: Duration,
    poll_interval: Duration,
    request_timeout: Duration,
}

impl ArmProvisioner {
    /// Build a provisioner from configuration
    ///
    /// Returns `None` when the subscription, resource group or token is
    /// missing.
    pub fn from_config(config: &Config) -> Result<Option<Self>> {
        let azure = &config.azure;
        let (Some(subscription_id), Some(resource_group), Some(token)) = (
            azure.subscription_id.clone(),
            azure.resource_group.clone(),
            config.token(),
        ) else {
            return Ok(None);
        };

        let request_timeout = Duration::from_secs(config.timeouts.http_request_secs);
        let http = reqwest::Client::builder()
            .user_agent(concat!("webapp-smoke/", env!("CARGO_PKG_VERSION")))
            .timeout(request_timeout)
            .build()?;

        Ok(Some(Self {
            http,
            endpoint: azure.management_endpoint.trim_end_matches('/').to_string(),
            subscription_id,
            resource_group,
            location: azure.location.clone(),
            token,
            deployments_api_version: azure.deployments_api_version.clone(),
            web_api_version: azure.web_api_version.clone(),
            deployment_timeout: Duration::from_secs(config.timeouts.deployment_secs),
            poll_interval: Duration::from_secs(config.timeouts.poll_interval_secs.max(1)),
            request_timeout,
        }))
    }

    fn resource_group_url(&self, resource: &str, api_version: &str) -> Result<Url> {
        let raw = format!(
            "{}/subscriptions/{}/resourcegroups/{}/providers/{}?api-version={}",
            self.endpoint, self.subscription_id, self.resource_group, resource, api_version
        );
        Url::parse(&raw).map_err(|e| Error::InvalidUrl(format!("{}: {}", raw, e)))
    }

    fn deployment_url(&self, name: &str) -> Result<Url> {
        self.resource_group_url(
            &format!("Microsoft.Resources/deployments/{}", name),
            &self.deployments_api_version,
        )
    }

    fn site_url(&self, name: &str, suffix: &str) -> Result<Url> {
        self.resource_group_url(
            &format!("Microsoft.Web/sites/{}{}", name, suffix),
            &self.web_api_version,
        )
    }

    /// Send a request and return the raw response body
    async fn send(&self, method: Method, url: Url, body: Option<&Value>) -> Result<String> {
        tracing::debug!(method = %method, url = %url, "Resource manager request");
        let mut request = self
            .http
            .request(method.clone(), url.clone())
            .bearer_auth(&self.token);
        if let Some(body) = body {
            request = request.json(body);
        } else if method == Method::POST {
            request = request.header(reqwest::header::CONTENT_LENGTH, "0");
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(Error::Provisioning(format!(
                "{} {} returned {}: {}",
                method,
                url.path(),
                status,
                text
            )));
        }
        Ok(text)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
    ) -> Result<T> {
        let text = self.send(method, url, body).await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn start_deployment(&self, name: &str, template: &DeploymentTemplate) -> Result<()> {
        tracing::info!(
            deployment = name,
            template = %template.path().display(),
            "Starting deployment"
        );
        let body = json!({
            "properties": {
                "mode": "Incremental",
                "template": template.body(),
                "parameters": template.parameters(name, &self.location),
            }
        });
        self.send(Method::PUT, self.deployment_url(name)?, Some(&body))
            .await
            .map(|_| ())
    }

    async fn wait_for_deployment(&self, name: &str) -> Result<()> {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("  {spinner} {msg} [{elapsed}]") {
            spinner.set_style(style);
        }
        spinner.set_message(format!("Deploying {}", name));
        spinner.enable_steady_tick(Duration::from_millis(120));

        let result = self.poll_deployment(name).await;
        spinner.finish_and_clear();
        result
    }

    async fn poll_deployment(&self, name: &str) -> Result<()> {
        let deadline = Instant::now() + self.deployment_timeout;
        loop {
            let status: Envelope<DeploymentProperties> = self
                .send_json(Method::GET, self.deployment_url(name)?, None)
                .await?;
            let state = status.properties.provisioning_state;
            tracing::debug!(deployment = name, state = %state, "Deployment state");

            match state.as_str() {
                "Succeeded" => return Ok(()),
                "Failed" | "Canceled" => {
                    if let Some(error) = &status.properties.error {
                        tracing::error!(deployment = name, error = %error, "Deployment failed");
                    }
                    return Err(Error::DeploymentFailed {
                        name: name.to_string(),
                        state,
                    });
                }
                _ => {}
            }

            if Instant::now() >= deadline {
                return Err(Error::DeploymentTimeout {
                    name: name.to_string(),
                    secs: self.deployment_timeout.as_secs(),
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[async_trait]
impl Provisioner for ArmProvisioner {
    async fn deploy(
        &self,
        template: &DeploymentTemplate,
        base_name: &str,
    ) -> Result<Box<dyn DeployedSite>> {
        let name = naming::timestamped_site_name(base_name);

        self.start_deployment(&name, template).await?;
        self.wait_for_deployment(&name).await?;

        let site: Envelope<SiteProperties> = self
            .send_json(Method::GET, self.site_url(&name, "")?, None)
            .await?;
        let credentials: Envelope<PublishingCredentials> = self
            .send_json(
                Method::POST,
                self.site_url(&name, "/config/publishingcredentials/list")?,
                None,
            )
            .await?;

        let raw_url = format!("https://{}", site.properties.default_host_name);
        let base_url = Url::parse(&raw_url)
            .map_err(|e| Error::InvalidUrl(format!("{}: {}", raw_url, e)))?;
        let scm_host = scm_host_name(
            &site.properties.default_host_name,
            &site.properties.enabled_host_names,
        );

        Ok(Box::new(ArmSite {
            settings: PublishSettings {
                site_name: name.clone(),
                scm_host,
                user_name: credentials.properties.publishing_user_name,
                password: credentials.properties.publishing_password,
                site_url: base_url.to_string(),
            },
            name,
            base_url,
            request_timeout: self.request_timeout,
        }))
    }

    async fn teardown(&self, site_name: &str) -> Result<()> {
        let mut url = self.site_url(site_name, "")?;
        url.query_pairs_mut()
            .append_pair("deleteEmptyServerFarm", "true");
        self.send(Method::DELETE, url, None).await.map(|_| ())
    }
}

/// Pick the deployment endpoint host for a site
///
/// Prefers the `.scm.` entry the provider reports; otherwise inserts `scm`
/// after the first label of the default host name.
fn scm_host_name(default_host: &str, enabled_hosts: &[String]) -> String {
    if let Some(host) = enabled_hosts.iter().find(|h| h.contains(".scm.")) {
        return host.clone();
    }
    match default_host.split_once('.') {
        Some((label, rest)) => format!("{}.scm.{}", label, rest),
        None => format!("{}.scm", default_host),
    }
}

/// A site deployed through the resource manager
pub struct ArmSite {
    name: String,
    base_url: Url,
    settings: PublishSettings,
    request_timeout: Duration,
}

#[async_trait]
impl DeployedSite for ArmSite {
    fn name(&self) -> &str {
        &self.name
    }

    fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn build_publish_profile(&self, project_dir: &Path) -> Result<PublishProfile> {
        profile::write(project_dir, DEFAULT_PROFILE_NAME, &self.settings)
    }

    fn create_client(&self) -> Result<SiteClient> {
        SiteClient::with_timeout(self.base_url.clone(), self.request_timeout)
    }
}
