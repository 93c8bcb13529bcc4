//! Publish profile generation
//!
//! The build tool's `publish` command picks up
//! `Properties/PublishProfiles/<name>.pubxml` from the project directory.
//! The profile pushes the build output to the site's deployment endpoint
//! using the site's publishing credentials.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::common::Result;

/// Profile name used for every generated profile
pub const DEFAULT_PROFILE_NAME: &str = "Profile";

/// A publish profile that exists on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishProfile {
    /// Value for `/p:PublishProfile=`
    pub name: String,
    pub path: PathBuf,
}

/// Everything the profile needs to reach the deployment endpoint
#[derive(Debug, Clone)]
pub struct PublishSettings {
    pub site_name: String,
    /// Host name of the deployment (SCM) endpoint
    pub scm_host: String,
    pub user_name: String,
    pub password: String,
    /// Public URL opened after publishing
    pub site_url: String,
}

/// Location of a named profile inside a project directory
pub fn profile_path(project_dir: &Path, name: &str) -> PathBuf {
    project_dir
        .join("Properties")
        .join("PublishProfiles")
        .join(format!("{}.pubxml", name))
}

/// Render the profile document
pub fn render(settings: &PublishSettings) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<Project ToolsVersion="4.0" xmlns="http://schemas.microsoft.com/developer/msbuild/2003">
  <PropertyGroup>
    <WebPublishMethod>MSDeploy</WebPublishMethod>
    <LastUsedBuildConfiguration>Release</LastUsedBuildConfiguration>
    <LastUsedPlatform>Any CPU</LastUsedPlatform>
    <SiteUrlToLaunchAfterPublish>{site_url}</SiteUrlToLaunchAfterPublish>
    <LaunchSiteAfterPublish>False</LaunchSiteAfterPublish>
    <ExcludeApp_Data>False</ExcludeApp_Data>
    <MSDeployServiceURL>{scm_host}:443</MSDeployServiceURL>
    <DeployIisAppPath>{site_name}</DeployIisAppPath>
    <RemoteSitePhysicalPath />
    <SkipExtraFilesOnServer>True</SkipExtraFilesOnServer>
    <MSDeployPublishMethod>WMSVC</MSDeployPublishMethod>
    <EnableMSDeployBackup>False</EnableMSDeployBackup>
    <EnableMSDeployAppOffline>True</EnableMSDeployAppOffline>
    <AllowUntrustedCertificate>False</AllowUntrustedCertificate>
    <UserName>{user_name}</UserName>
    <Password>{password}</Password>
    <_SavePWD>True</_SavePWD>
  </PropertyGroup>
</Project>
"#,
        site_url = xml_escape(&settings.site_url),
        scm_host = xml_escape(&settings.scm_host),
        site_name = xml_escape(&settings.site_name),
        user_name = xml_escape(&settings.user_name),
        password = xml_escape(&settings.password),
    )
}

/// Write the profile into `project_dir`
///
/// The file is staged next to its destination and renamed into place, so a
/// reader never sees a half-written profile.
pub fn write(project_dir: &Path, name: &str, settings: &PublishSettings) -> Result<PublishProfile> {
    let path = profile_path(project_dir, name);
    let dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| project_dir.to_path_buf());
    std::fs::create_dir_all(&dir)?;

    let mut staged = tempfile::NamedTempFile::new_in(&dir)?;
    staged.write_all(render(settings).as_bytes())?;
    staged.persist(&path).map_err(|e| e.error)?;

    tracing::info!(profile = name, path = %path.display(), "Publish profile written");
    Ok(PublishProfile {
        name: name.to_string(),
        path,
    })
}

fn xml_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}
