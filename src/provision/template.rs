//! Declarative deployment templates
//!
//! The template's schema belongs to the resource manager. We only check
//! that it is a JSON object with a `resources` array and fill in the
//! parameters it declares out of the set we know how to supply.

use std::path::{Path, PathBuf};

use serde_json::{json, Map, Value};

use crate::common::{naming, Error, Result};

/// Parameter receiving the site name
pub const SITE_NAME_PARAM: &str = "siteName";
/// Parameter receiving the hosting plan name
pub const HOSTING_PLAN_PARAM: &str = "hostingPlanName";
/// Parameter receiving the region
pub const LOCATION_PARAM: &str = "location";

/// A loaded deployment template
#[derive(Debug, Clone)]
pub struct DeploymentTemplate {
    path: PathBuf,
    body: Value,
}

impl DeploymentTemplate {
    /// Load and validate a template file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, e))?;
        Self::parse(path, &content)
    }

    /// Validate template text; `path` is only used for diagnostics
    pub fn parse(path: &Path, content: &str) -> Result<Self> {
        let body: Value = serde_json::from_str(content)
            .map_err(|e| Error::invalid_template(path, e.to_string()))?;

        let object = body
            .as_object()
            .ok_or_else(|| Error::invalid_template(path, "top level is not an object"))?;
        match object.get("resources") {
            Some(Value::Array(_)) => {}
            _ => return Err(Error::invalid_template(path, "missing 'resources' array")),
        }
        if let Some(params) = object.get("parameters") {
            if !params.is_object() {
                return Err(Error::invalid_template(path, "'parameters' is not an object"));
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            body,
        })
    }

    /// File the template was loaded from
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    /// Whether the template declares a parameter called `name`
    pub fn declares(&self, name: &str) -> bool {
        self.body
            .get("parameters")
            .and_then(Value::as_object)
            .map(|params| params.contains_key(name))
            .unwrap_or(false)
    }

    /// Deployment parameter values for a site, restricted to declared parameters
    pub fn parameters(&self, site_name: &str, location: &str) -> Value {
        let candidates = [
            (SITE_NAME_PARAM, site_name.to_string()),
            (HOSTING_PLAN_PARAM, naming::hosting_plan_name(site_name)),
            (LOCATION_PARAM, location.to_string()),
        ];

        let mut values = Map::new();
        for (name, value) in candidates {
            if self.declares(name) {
                values.insert(name.to_string(), json!({ "value": value }));
            }
        }
        Value::Object(values)
    }
}
