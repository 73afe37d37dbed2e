//! Project tooling around the core: manifest, package archive and builds

mod archive;
mod build;
mod context;
mod manifest;

pub use archive::{ArchiveError, Package};
pub use build::{
    build, discover_dependencies, discover_sources, run_package, run_package_to, run_source,
    run_source_to,
};
pub use context::BuildContext;
pub use manifest::{
    init_project, Manifest, DEPS_DIR, MANIFEST_FILE, PACKAGE_EXTENSION, SOURCE_EXTENSION,
    TARGET_DIR,
};
