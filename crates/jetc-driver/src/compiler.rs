//! The Kotlin to JVM compilation pipeline
//!
//! configure → analyze → generate → write. Every entry point here builds a
//! fresh [`CompileEnvironment`] and a fresh [`CompilationSession`]; nothing
//! survives from one compilation to the next.

use std::path::{Path, PathBuf};

use jetc_engine::{
    analyze, generate, BindingTrace, Diagnostic, DiagnosticCode, FilteringTrace, GeneratedOutput, MessageCollector,
    ModuleChunk, SemanticTrace, SourceId,
};
use tracing::{debug, info};

use crate::config::{CompilerConfiguration, TraceMode};
use crate::environment::CompileEnvironment;
use crate::error::CompileEnvironmentError;
use crate::output::OutputTransaction;
use crate::plugin::PluginContext;
use crate::script::ClassRunner;
use crate::session::CompilationSession;

/// Process exit status of a compiler run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Ok,
    /// Sources or configuration had errors; nothing was written
    CompilationError,
    /// An I/O, jar or codegen failure
    InternalError,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        match self {
            ExitCode::Ok => 0,
            ExitCode::CompilationError => 1,
            ExitCode::InternalError => 2,
        }
    }
}

/// Where a compilation writes its classes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    Directory(PathBuf),
    Jar { path: PathBuf, include_runtime: bool },
}

/// Result of compiling and running a script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptOutcome {
    CompilationFailed,
    /// The program ran and exited with this status
    Finished(i32),
}

/// Analysis and code generation over one environment.
pub struct KotlinToJvmCompiler<'e, T: BindingTrace + Default> {
    environment: &'e CompileEnvironment,
    session: CompilationSession<T>,
}

impl<'e, T: BindingTrace + Default> KotlinToJvmCompiler<'e, T> {
    pub fn new(environment: &'e CompileEnvironment) -> Self {
        Self {
            environment,
            session: CompilationSession::new(environment.configuration().module_name.clone()),
        }
    }

    pub fn environment(&self) -> &'e CompileEnvironment {
        self.environment
    }

    pub fn session(&self) -> &CompilationSession<T> {
        &self.session
    }

    /// Run analysis and the configured plugins, forwarding every diagnostic.
    ///
    /// Returns `false` if the environment, analysis or a plugin reported an
    /// error; code generation must not run then.
    pub fn analyze(&mut self, collector: &mut dyn MessageCollector) -> bool {
        let environment = self.environment;
        {
            let (trace, module) = self.session.parts_mut();
            analyze(
                environment.sources(),
                environment.classpath(),
                environment.package_index(),
                trace,
                module,
            );
        }

        let context = self.session.binding_context();
        let mut failed = environment.has_errors();
        for diagnostic in context.diagnostics() {
            failed |= diagnostic.is_error();
            collector.report(diagnostic.clone());
        }

        let plugin_context = PluginContext {
            binding_context: context,
            module: self.session.module(),
            sources: environment.sources(),
        };
        for plugin in environment.configuration().plugins() {
            let diagnostics = plugin.process(plugin_context);
            debug!(plugin = plugin.name(), diagnostics = diagnostics.len(), "plugin finished");
            for diagnostic in diagnostics {
                failed |= diagnostic.is_error();
                collector.report(diagnostic);
            }
        }

        if failed {
            info!(module = self.session.module().name(), "compilation stopped after analysis");
        }
        !failed
    }

    /// Generate class files for `files`. Only valid after a successful [`Self::analyze`].
    pub fn generate(&self, files: &[SourceId]) -> Result<GeneratedOutput, CompileEnvironmentError> {
        let output = generate(
            self.session.binding_context(),
            self.session.module(),
            self.environment.sources(),
            files,
        )?;
        Ok(output)
    }
}

/// Compile the sources of `configuration` into one directory or jar.
pub fn compile_bunch_of_sources(
    configuration: &CompilerConfiguration,
    target: &OutputTarget,
    collector: &mut dyn MessageCollector,
) -> Result<ExitCode, CompileEnvironmentError> {
    match configuration.trace {
        TraceMode::Full => compile_sources_with::<SemanticTrace>(configuration, target, collector),
        TraceMode::Filtering => compile_sources_with::<FilteringTrace>(configuration, target, collector),
    }
}

fn compile_sources_with<T: BindingTrace + Default>(
    configuration: &CompilerConfiguration,
    target: &OutputTarget,
    collector: &mut dyn MessageCollector,
) -> Result<ExitCode, CompileEnvironmentError> {
    let environment = CompileEnvironment::create(configuration.clone(), collector);
    let mut compiler = KotlinToJvmCompiler::<T>::new(&environment);
    if !compiler.analyze(collector) {
        return Ok(ExitCode::CompilationError);
    }
    let output = compiler.generate(&environment.all_files())?;
    let mut transaction = OutputTransaction::new();
    if let Err(error) = write_output(&mut transaction, &output, target, configuration.runtime.as_deref(), collector) {
        transaction.rollback();
        return Err(error);
    }
    Ok(ExitCode::Ok)
}

/// Compile every module of `chunk` in one analysis session, writing each
/// module to its own output directory, or to `<jar_dir>/<module>.jar`.
pub fn compile_modules(
    chunk: &ModuleChunk,
    configuration: &CompilerConfiguration,
    jar_dir: Option<&Path>,
    include_runtime: bool,
    collector: &mut dyn MessageCollector,
) -> Result<ExitCode, CompileEnvironmentError> {
    for conflict in chunk.conflicts() {
        collector.report(
            Diagnostic::warning(
                DiagnosticCode::DuplicateModuleSource,
                format!(
                    "Sources are claimed by modules '{}' and '{}'; they are compiled with '{}'",
                    conflict.shadowed, conflict.owner, conflict.owner
                ),
            )
            .in_file(&conflict.path),
        );
    }

    let configuration = configuration.for_chunk(chunk);
    match configuration.trace {
        TraceMode::Full => {
            compile_modules_with::<SemanticTrace>(chunk, &configuration, jar_dir, include_runtime, collector)
        }
        TraceMode::Filtering => {
            compile_modules_with::<FilteringTrace>(chunk, &configuration, jar_dir, include_runtime, collector)
        }
    }
}

fn compile_modules_with<T: BindingTrace + Default>(
    chunk: &ModuleChunk,
    configuration: &CompilerConfiguration,
    jar_dir: Option<&Path>,
    include_runtime: bool,
    collector: &mut dyn MessageCollector,
) -> Result<ExitCode, CompileEnvironmentError> {
    let environment = CompileEnvironment::create(configuration.clone(), collector);
    let mut compiler = KotlinToJvmCompiler::<T>::new(&environment);
    if !compiler.analyze(collector) {
        return Ok(ExitCode::CompilationError);
    }

    // Generate everything before writing anything.
    let mut outputs = Vec::with_capacity(chunk.modules().len());
    for module in chunk.modules() {
        let files = environment.files_of(module, chunk);
        debug!(module = %module.name, files = files.len(), "generating module");
        let target = match jar_dir {
            Some(dir) => OutputTarget::Jar {
                path: dir.join(format!("{}.jar", module.name)),
                include_runtime,
            },
            None => OutputTarget::Directory(chunk.base_dir().join(&module.output_dir)),
        };
        outputs.push((compiler.generate(&files)?, target));
    }
    // A failed module takes the modules written before it down with it.
    let mut transaction = OutputTransaction::new();
    for (output, target) in &outputs {
        if let Err(error) = write_output(&mut transaction, output, target, configuration.runtime.as_deref(), collector) {
            transaction.rollback();
            return Err(error);
        }
    }
    info!(modules = outputs.len(), "compiled module chunk");
    Ok(ExitCode::Ok)
}

/// Compile the sources and run the detected main class with `args`.
pub fn compile_and_execute(
    configuration: &CompilerConfiguration,
    runner: &dyn ClassRunner,
    args: &[String],
    collector: &mut dyn MessageCollector,
) -> Result<ScriptOutcome, CompileEnvironmentError> {
    let output = match configuration.trace {
        TraceMode::Full => compile_to_output::<SemanticTrace>(configuration, collector)?,
        TraceMode::Filtering => compile_to_output::<FilteringTrace>(configuration, collector)?,
    };
    let Some(output) = output else {
        return Ok(ScriptOutcome::CompilationFailed);
    };
    let main_class = output.main_class().ok_or(CompileEnvironmentError::NoMainClass)?;

    let mut classpath: Vec<PathBuf> = configuration.runtime.iter().cloned().collect();
    classpath.extend(configuration.classpath.iter().cloned());
    let status = runner.run(&output, main_class, &classpath, args)?;
    Ok(ScriptOutcome::Finished(status))
}

/// Analyze and generate without writing; `None` if analysis failed.
pub fn compile_to_output<T: BindingTrace + Default>(
    configuration: &CompilerConfiguration,
    collector: &mut dyn MessageCollector,
) -> Result<Option<GeneratedOutput>, CompileEnvironmentError> {
    let environment = CompileEnvironment::create(configuration.clone(), collector);
    let mut compiler = KotlinToJvmCompiler::<T>::new(&environment);
    if !compiler.analyze(collector) {
        return Ok(None);
    }
    compiler.generate(&environment.all_files()).map(Some)
}

fn write_output(
    transaction: &mut OutputTransaction,
    output: &GeneratedOutput,
    target: &OutputTarget,
    runtime: Option<&Path>,
    collector: &mut dyn MessageCollector,
) -> Result<(), CompileEnvironmentError> {
    match target {
        OutputTarget::Directory(dir) => transaction.write_directory(output, dir),
        OutputTarget::Jar { path, include_runtime } => {
            let runtime = if *include_runtime {
                if runtime.is_none() {
                    collector.report(
                        Diagnostic::warning(
                            DiagnosticCode::Configuration,
                            "No runtime library configured; the jar will not include it",
                        )
                        .in_file(path),
                    );
                }
                runtime
            } else {
                None
            };
            transaction.write_jar(output, path, runtime)
        }
    }
}
