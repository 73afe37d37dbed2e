use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Project manifest file name
pub const MANIFEST_FILE: &str = "gravel.json";
/// Directory holding dependency packages
pub const DEPS_DIR: &str = "deps";
/// Build output directory, never scanned for sources
pub const TARGET_DIR: &str = "target";
pub const SOURCE_EXTENSION: &str = "grv";
pub const PACKAGE_EXTENSION: &str = "gravel";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,
    pub author: String,
}

impl Manifest {
    pub fn new(name: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            author: author.into(),
        }
    }

    /// Read `gravel.json` from a project directory
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(MANIFEST_FILE);
        let data = fs::read_to_string(&path)
            .with_context(|| format!("No {} found in {}", MANIFEST_FILE, dir.display()))?;
        serde_json::from_str(&data)
            .with_context(|| format!("Invalid manifest {}", path.display()))
    }

    /// Write `gravel.json` into a project directory
    pub fn save(&self, dir: &Path) -> Result<()> {
        let path = dir.join(MANIFEST_FILE);
        let data = serde_json::to_string_pretty(self)?;
        fs::write(&path, data).with_context(|| format!("Failed to write {}", path.display()))
    }
}

/// Login name of the current user, or `unknown`
fn current_user() -> String {
    env::var("USER")
        .or_else(|_| env::var("USERNAME"))
        .ok()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Create a new project directory `<parent>/<name>` with a manifest and an empty `deps/`
pub fn init_project(parent: &Path, name: &str) -> Result<PathBuf> {
    if name.is_empty() || name == "." || name == ".." || name.contains(|c: char| c == '/' || c == '\\') {
        bail!("Invalid project name '{}'", name);
    }

    let dir = parent.join(name);
    if dir.exists() {
        bail!("{} already exists", dir.display());
    }

    fs::create_dir_all(dir.join(DEPS_DIR))
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    Manifest::new(name, current_user()).save(&dir)?;

    info!("Created new project {}", name);
    Ok(dir)
}
