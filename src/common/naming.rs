//! Test identifiers and hosting-site names
//!
//! A test id keys the working directory, the log file and the base name of
//! the provisioned site. Site names additionally have to satisfy the
//! hosting provider's naming rules and be unique per run.

use std::time::{SystemTime, UNIX_EPOCH};

/// Prefix for test ids of template cases without an explicit id
pub const DEFAULT_TEST_PREFIX: &str = "DotnetNewWebRunsInWebApp";

/// Maximum length of a site or hosting plan name accepted by the hosting provider
pub const MAX_SITE_NAME_LEN: usize = 60;

/// Suffix distinguishing a site's hosting plan from the site itself
const PLAN_SUFFIX: &str = "-plan";

/// Build the default test id for a template case
pub fn test_id(template: &str) -> String {
    format!("{}{}", DEFAULT_TEST_PREFIX, template)
}

/// Reduce a base name to the characters a site name may contain
///
/// Lowercases, maps every run of other characters to a single `-`, and
/// strips leading/trailing hyphens.
pub fn sanitize(base_name: &str) -> String {
    let mut out = String::with_capacity(base_name.len());
    let mut pending_dash = false;
    for c in base_name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    out
}

/// Derive a unique site name from a base name and a timestamp suffix
pub fn site_name(base_name: &str, timestamp: u64) -> String {
    let suffix = format!("-{}", timestamp);
    let mut base = sanitize(base_name);
    if base.is_empty() {
        base.push_str("site");
    }
    base.truncate(MAX_SITE_NAME_LEN - suffix.len());
    let base = base.trim_end_matches('-');
    format!("{}{}", base, suffix)
}

/// Hosting plan name for a site, within the same length limit
///
/// Trimming comes off the front so the timestamp that makes the site name
/// unique is kept.
pub fn hosting_plan_name(site_name: &str) -> String {
    let keep = MAX_SITE_NAME_LEN - PLAN_SUFFIX.len();
    let start = site_name.len().saturating_sub(keep);
    let base = site_name
        .get(start..)
        .unwrap_or(site_name)
        .trim_start_matches('-');
    format!("{}{}", base, PLAN_SUFFIX)
}

/// Derive a unique site name stamped with the current time
pub fn timestamped_site_name(base_name: &str) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    site_name(base_name, now)
}
