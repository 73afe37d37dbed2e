use crate::project::{Manifest, DEPS_DIR, PACKAGE_EXTENSION};
use anyhow::{bail, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// Everything a build needs to know about the project it is building
///
/// Passed explicitly to `build`; nothing is read from the working directory
/// or other process state.
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub project_dir: PathBuf,
    pub manifest: Manifest,
}

impl BuildContext {
    /// Open the project rooted at `dir`, which must hold a manifest and `deps/`
    pub fn open(dir: &Path) -> Result<Self> {
        let manifest = Manifest::load(dir)?;
        if !dir.join(DEPS_DIR).is_dir() {
            bail!("No {} directory found in {}", DEPS_DIR, dir.display());
        }

        info!("Using project {}", manifest.name);
        Ok(Self {
            project_dir: dir.to_path_buf(),
            manifest,
        })
    }

    pub fn deps_dir(&self) -> PathBuf {
        self.project_dir.join(DEPS_DIR)
    }

    /// Where the built package is written: `<project>/<name>.gravel`
    pub fn output_path(&self) -> PathBuf {
        self.project_dir
            .join(format!("{}.{}", self.manifest.name, PACKAGE_EXTENSION))
    }
}
