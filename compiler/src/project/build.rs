use crate::codegen::compile_module;
use crate::linker::Linker;
use crate::project::{BuildContext, Package, PACKAGE_EXTENSION, SOURCE_EXTENSION, TARGET_DIR};
use anyhow::{Context, Result};
use gravel_runtime::runtime::Runtime;
use std::ffi::OsStr;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension() == Some(OsStr::new(extension))
}

/// Files under `root` with the given extension, sorted and depth-first
fn discover(root: &Path, extension: &str, skip: impl Fn(&DirEntry) -> bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !skip(entry));

    for entry in walker {
        let entry = entry.with_context(|| format!("Failed to scan {}", root.display()))?;
        if entry.file_type().is_file() && has_extension(entry.path(), extension) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Dependency packages under `deps/`
pub fn discover_dependencies(ctx: &BuildContext) -> Result<Vec<PathBuf>> {
    discover(&ctx.deps_dir(), PACKAGE_EXTENSION, |_| false)
}

/// Source files of the project itself, leaving out `deps/` and `target/`
pub fn discover_sources(ctx: &BuildContext) -> Result<Vec<PathBuf>> {
    let deps_dir = ctx.deps_dir();
    let target_dir = ctx.project_dir.join(TARGET_DIR);
    discover(&ctx.project_dir, SOURCE_EXTENSION, |entry| {
        entry.file_type().is_dir() && (entry.path() == deps_dir || entry.path() == target_dir)
    })
}

/// Link dependencies and sources into `<project>/<name>.gravel`
///
/// Dependencies are linked first, then sources. The package is only written
/// once every module linked.
pub fn build(ctx: &BuildContext) -> Result<PathBuf> {
    let dependencies = discover_dependencies(ctx)?;
    let sources = discover_sources(ctx)?;
    if sources.is_empty() && dependencies.is_empty() {
        warn!("No .{} sources or dependencies found in {}", SOURCE_EXTENSION, ctx.project_dir.display());
    }

    let mut linker = Linker::new();

    for path in &dependencies {
        let package = Package::read(path)
            .with_context(|| format!("Failed to read dependency {}", path.display()))?;
        debug!(dependency = %package.manifest.name, path = %path.display(), "Linking dependency");
        linker
            .add_blob(&package.blob)
            .with_context(|| format!("Failed to link dependency {}", path.display()))?;
    }

    for path in &sources {
        let source = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        debug!(path = %path.display(), "Linking source");
        linker
            .add_source(&source)
            .with_context(|| format!("Failed to build {}", path.display()))?;
    }

    let blob = linker.finish()?;
    let output = ctx.output_path();
    Package::new(ctx.manifest.clone(), blob)
        .write(&output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    info!("Packaged {} => {}", ctx.manifest.name, output.display());
    Ok(output)
}

/// Run a package, printing to `out`
pub fn run_package_to<W: Write>(path: &Path, runtime: &Runtime, out: &mut W) -> Result<()> {
    if !has_extension(path, PACKAGE_EXTENSION) {
        warn!(
            "{} does not have the .{} extension, it might not be a package",
            path.display(),
            PACKAGE_EXTENSION
        );
    }

    let package = Package::read(path)
        .with_context(|| format!("Failed to read package {}", path.display()))?;
    info!("Running {} by {}", package.manifest.name, package.manifest.author);
    runtime.execute_bytes_to(&package.blob, out)?;
    Ok(())
}

/// Run a package on stdout
pub fn run_package(path: &Path, runtime: &Runtime) -> Result<()> {
    let stdout = io::stdout();
    run_package_to(path, runtime, &mut stdout.lock())
}

/// Compile one source file and run it without a project
pub fn run_source_to<W: Write>(path: &Path, runtime: &Runtime, out: &mut W) -> Result<()> {
    let source = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let blob = compile_module(&source)
        .with_context(|| format!("Failed to compile {}", path.display()))?;
    runtime.execute_bytes_to(&blob, out)?;
    Ok(())
}

pub fn run_source(path: &Path, runtime: &Runtime) -> Result<()> {
    let stdout = io::stdout();
    run_source_to(path, runtime, &mut stdout.lock())
}
