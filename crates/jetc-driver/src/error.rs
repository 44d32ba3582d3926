//! Driver error types.

use std::path::PathBuf;

use jetc_engine::{CodegenError, Diagnostic};

use crate::module_script::EvaluationError;

/// Fatal errors of a compilation run. No output produced before one of
/// these is usable.
#[derive(Debug, thiserror::Error)]
pub enum CompileEnvironmentError {
    /// Writing a class file or creating an output directory failed
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Assembling a jar failed
    #[error("failed to write jar {}: {source}", path.display())]
    Jar {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    /// Reading the runtime library to bundle failed
    #[error("failed to read runtime library {}: {source}", path.display())]
    Runtime {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Codegen(#[from] CodegenError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    ModuleScript(#[from] ModuleScriptError),

    /// Script mode needs exactly one entry point
    #[error("no main class found to run")]
    NoMainClass,

    /// The JVM could not be started
    #[error("failed to launch '{command}': {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors loading modules from a module script.
#[derive(Debug, thiserror::Error)]
pub enum ModuleScriptError {
    #[error("failed to read module script {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The script did not parse or analyze; the diagnostics say why
    #[error("module script {} has {} error(s)", path.display(), diagnostics.len())]
    Analysis { path: PathBuf, diagnostics: Vec<Diagnostic> },

    #[error("module script {} does not define `fun project()`", path.display())]
    MissingEntryPoint { path: PathBuf },

    /// `project()` failed while running
    #[error("invoking project() of {} failed", path.display())]
    Invocation {
        path: PathBuf,
        #[source]
        source: EvaluationError,
    },

    #[error("module script {} declares no modules", path.display())]
    NoModules { path: PathBuf },
}

/// Errors reading a `jetc.toml` file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
