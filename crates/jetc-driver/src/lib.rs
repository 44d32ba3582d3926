//! Jetc Compilation Driver
//!
//! Turns a configuration into class files on disk:
//! - **Configuration**: `jetc.toml` files and builder-style overrides (`config` module)
//! - **Environment**: source discovery, parsing and classpath indexing (`environment` module)
//! - **Sessions**: one binding trace and module descriptor per compilation (`session` module)
//! - **Pipeline**: analyze, run plugins, generate, write (`compiler` module)
//! - **Output**: class directories and jars (`output` module)
//! - **Script mode**: running the compiled main class (`script` module)
//! - **Module scripts**: `kotlin.modules` project definitions (`module_script` module)
//!
//! # Example
//!
//! ```rust,ignore
//! use jetc_driver::{compile_bunch_of_sources, CompilerConfiguration, ExitCode, OutputTarget};
//! use jetc_engine::DiagnosticCollector;
//!
//! let configuration = CompilerConfiguration::new().with_source("src");
//! let mut collector = DiagnosticCollector::new();
//! let target = OutputTarget::Jar { path: "app.jar".into(), include_runtime: false };
//! assert_eq!(compile_bunch_of_sources(&configuration, &target, &mut collector)?, ExitCode::Ok);
//! ```

#![warn(rust_2018_idioms)]

pub mod config;
pub mod environment;
pub mod error;
pub mod plugin;
pub mod session;

/// The compilation pipeline
pub mod compiler;

/// Jar and directory writers
pub mod output;

pub mod script;

pub mod module_script;

// ============================================================================
// Re-exports
// ============================================================================

pub use compiler::{
    compile_and_execute, compile_bunch_of_sources, compile_modules, compile_to_output, ExitCode,
    KotlinToJvmCompiler, OutputTarget, ScriptOutcome,
};
pub use config::{CompilerConfiguration, TraceMode, CONFIG_FILE_NAME};
pub use environment::CompileEnvironment;
pub use error::{CompileEnvironmentError, ConfigError, ModuleScriptError};
pub use module_script::{BuilderDslInterpreter, DynamicEntryPoint, EvaluationError, ModuleScriptLoader};
pub use plugin::{CompilerPlugin, PluginContext};
pub use script::{ClassRunner, JavaLauncher};
pub use session::CompilationSession;
