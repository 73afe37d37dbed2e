use crate::codegen::compile_module;
use crate::project::{self, BuildContext, Package, PACKAGE_EXTENSION, SOURCE_EXTENSION};
use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use gravel_runtime::bytecode::{disassemble, BytecodeModule, Constant};
use gravel_runtime::runtime::{Runtime, RuntimeConfig};
use std::env;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(name = "gravel")]
#[command(about = "Compile, link and run gravel programs")]
#[command(version)]
pub struct Cli {
    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Trace every executed instruction
    #[arg(long, global = true)]
    pub trace: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new project in the current directory
    New {
        /// Project name
        name: String,
    },
    /// Build the project into <name>.gravel
    Build {
        /// Project directory
        #[arg(short, long, default_value = ".")]
        project: PathBuf,
    },
    /// Run a built package
    Run {
        /// Package file
        archive: PathBuf,
    },
    /// Compile and run a single source file
    Exec {
        /// Source file
        file: PathBuf,
    },
    /// Show the constants and disassembly of a package, source file or blob
    Inspect {
        file: PathBuf,
    },
}

impl Cli {
    /// Log filter for the requested verbosity
    pub fn log_level(&self) -> &'static str {
        if self.trace || self.verbose >= 2 {
            "trace"
        } else if self.verbose == 1 {
            "debug"
        } else {
            "info"
        }
    }
}

pub struct CliHandler {
    runtime: Runtime,
}

impl CliHandler {
    pub fn new(trace: bool) -> Self {
        let config = RuntimeConfig::new()
            .with_debug_mode(trace)
            .with_stack_trace(trace);
        Self {
            runtime: Runtime::with_config(config),
        }
    }

    pub fn handle(&self, cli: Cli) -> Result<()> {
        match cli.command {
            Commands::New { name } => {
                let cwd = env::current_dir().context("Cannot determine the current directory")?;
                project::init_project(&cwd, &name)?;
            }
            Commands::Build { project: dir } => {
                let ctx = BuildContext::open(&dir)?;
                project::build(&ctx)?;
            }
            Commands::Run { archive } => {
                project::run_package(&archive, &self.runtime)?;
            }
            Commands::Exec { file } => {
                project::run_source(&file, &self.runtime)?;
            }
            Commands::Inspect { file } => {
                print!("{}", inspect(&file)?);
            }
        }
        Ok(())
    }
}

/// Human readable dump of a package (`.gravel`), a source file (`.grv`, compiled
/// first) or a raw blob
pub fn inspect(path: &Path) -> Result<String> {
    let mut report = String::new();
    let extension = path.extension().and_then(|e| e.to_str());

    let blob = if extension == Some(PACKAGE_EXTENSION) {
        let package = Package::read(path)
            .with_context(|| format!("Failed to read package {}", path.display()))?;
        writeln!(report, "package {} by {}", package.manifest.name, package.manifest.author)?;
        package.blob
    } else if extension == Some(SOURCE_EXTENSION) {
        let source = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        compile_module(&source).with_context(|| format!("Failed to compile {}", path.display()))?
    } else {
        fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?
    };

    info!(bytes = blob.len(), "Inspecting {}", path.display());
    let module = BytecodeModule::from_bytes(&blob)?;
    describe_module(&module, &mut report)?;
    Ok(report)
}

fn describe_module(module: &BytecodeModule, report: &mut String) -> Result<()> {
    writeln!(report, "constants ({}):", module.constants.len())?;
    for (index, constant) in module.constants.iter().enumerate() {
        let shown = match constant {
            Constant::Integer(i) => i.to_string(),
            Constant::Float(f) => f.to_string(),
            Constant::String(s) => format!("{:?}", s),
        };
        writeln!(report, "  {:>5}  {}", index, shown)?;
    }

    writeln!(report, "code ({} bytes):", module.code.len())?;
    for (offset, instruction) in disassemble(&module.code)? {
        writeln!(report, "  {:04}  {}", offset, instruction)?;
    }
    Ok(())
}
