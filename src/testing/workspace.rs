//! Per-test working directories

use std::path::{Path, PathBuf};

use crate::common::paths::is_single_component;
use crate::common::{Error, Result};

/// Delete `<root>/<test_id>` if present, then create it empty
///
/// A test never observes artifacts from a prior run of the same id.
pub fn recreate(root: &Path, test_id: &str) -> Result<PathBuf> {
    if !is_single_component(test_id) {
        return Err(Error::Config(format!(
            "Test id '{}' must be a plain directory name",
            test_id
        )));
    }

    let dir = root.join(test_id);
    if dir.exists() {
        tracing::debug!(dir = %dir.display(), "Removing previous working directory");
        std::fs::remove_dir_all(&dir)?;
    }
    std::fs::create_dir_all(&dir)?;
    tracing::info!(dir = %dir.display(), "Working directory ready");
    Ok(dir)
}
