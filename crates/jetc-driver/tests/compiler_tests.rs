use std::cell::RefCell;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use jetc_driver::output::MANIFEST_PATH;
use jetc_driver::{
    compile_and_execute, compile_bunch_of_sources, compile_modules, ClassRunner, CompileEnvironment,
    CompileEnvironmentError, CompilerConfiguration, CompilerPlugin, ExitCode, KotlinToJvmCompiler, OutputTarget,
    PluginContext, ScriptOutcome, TraceMode,
};
use jetc_engine::resolve::slices::RESOLUTION_SCOPE;
use jetc_engine::{
    Diagnostic, DiagnosticCode, DiagnosticCollector, FilteringTrace, GeneratedOutput, Module, ModuleChunk,
    SemanticTrace,
};
use tempfile::TempDir;
use zip::ZipArchive;

// ============================================================================
// Helpers
// ============================================================================

fn write(dir: &Path, relative: &str, text: &str) -> PathBuf {
    let path = dir.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, text).unwrap();
    path
}

fn manifest_of(jar: &Path) -> String {
    let mut archive = ZipArchive::new(File::open(jar).unwrap()).unwrap();
    let mut entry = archive.by_name(MANIFEST_PATH).unwrap();
    let mut text = String::new();
    entry.read_to_string(&mut text).unwrap();
    text
}

fn jar_entries(jar: &Path) -> Vec<String> {
    let archive = ZipArchive::new(File::open(jar).unwrap()).unwrap();
    archive.file_names().map(str::to_string).collect()
}

fn main_in(package: &str) -> String {
    format!("package {}\n\nfun main(args: Array<String>) {{\n    println(\"{}\")\n}}\n", package, package)
}

// ============================================================================
// Single Compilation
// ============================================================================

#[test]
fn test_jar_with_single_main_has_main_class() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "src/app/Main.kt", &main_in("app"));
    write(temp.path(), "src/app/util/Util.kt", "package app.util\n\nfun twice(x: Int): Int = x\n");

    let jar = temp.path().join("out/app.jar");
    let config = CompilerConfiguration::new().with_source(temp.path().join("src"));
    let mut collector = DiagnosticCollector::new();
    let target = OutputTarget::Jar {
        path: jar.clone(),
        include_runtime: false,
    };
    let exit = compile_bunch_of_sources(&config, &target, &mut collector).unwrap();

    assert_eq!(exit, ExitCode::Ok, "{:?}", collector.diagnostics());
    let manifest = manifest_of(&jar);
    assert!(manifest.contains("Main-Class: app.AppPackage\r\n"), "{}", manifest);
    let entries = jar_entries(&jar);
    assert_eq!(entries[0], MANIFEST_PATH);
    assert!(entries.contains(&"app/AppPackage.class".to_string()));
    assert!(entries.contains(&"app/util/UtilPackage.class".to_string()));
}

#[test]
fn test_jar_with_two_mains_has_no_main_class() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "src/a/Main.kt", &main_in("a"));
    write(temp.path(), "src/b/Main.kt", &main_in("b"));

    let jar = temp.path().join("app.jar");
    let config = CompilerConfiguration::new().with_source(temp.path().join("src"));
    let mut collector = DiagnosticCollector::new();
    let target = OutputTarget::Jar {
        path: jar.clone(),
        include_runtime: false,
    };

    assert_eq!(compile_bunch_of_sources(&config, &target, &mut collector).unwrap(), ExitCode::Ok);
    assert!(!manifest_of(&jar).contains("Main-Class"));
    let entries = jar_entries(&jar);
    assert!(entries.contains(&"a/APackage.class".to_string()));
    assert!(entries.contains(&"b/BPackage.class".to_string()));
}

#[test]
fn test_errors_write_nothing() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "src/Main.kt", "fun main(args: Array<String>) {\n    undefined()\n}\n");

    let out = temp.path().join("classes");
    let config = CompilerConfiguration::new().with_source(temp.path().join("src"));
    let mut collector = DiagnosticCollector::new();
    let exit = compile_bunch_of_sources(&config, &OutputTarget::Directory(out.clone()), &mut collector).unwrap();

    assert_eq!(exit, ExitCode::CompilationError);
    assert_eq!(exit.code(), 1);
    assert!(!out.exists());
    assert_eq!(collector.errors().next().unwrap().code, DiagnosticCode::UnresolvedReference);
}

#[test]
fn test_syntax_error_stops_compilation() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "src/Bad.kt", "fun broken( {\n");
    let jar = temp.path().join("app.jar");
    let config = CompilerConfiguration::new().with_source(temp.path().join("src"));
    let mut collector = DiagnosticCollector::new();
    let target = OutputTarget::Jar {
        path: jar.clone(),
        include_runtime: false,
    };

    assert_eq!(
        compile_bunch_of_sources(&config, &target, &mut collector).unwrap(),
        ExitCode::CompilationError
    );
    assert!(!jar.exists());
    assert!(collector.errors().any(|d| d.code == DiagnosticCode::SyntaxError));
}

#[test]
fn test_directory_output_for_both_trace_modes() {
    for mode in [TraceMode::Full, TraceMode::Filtering] {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "src/foo/Shape.kt", "package foo\n\nopen class Shape\n\nclass Square : Shape()\n");

        let out = temp.path().join("classes");
        let config = CompilerConfiguration::new()
            .with_source(temp.path().join("src"))
            .with_trace_mode(mode);
        let mut collector = DiagnosticCollector::new();
        let exit = compile_bunch_of_sources(&config, &OutputTarget::Directory(out.clone()), &mut collector).unwrap();

        assert_eq!(exit, ExitCode::Ok);
        assert!(out.join("foo/Shape.class").is_file());
        assert!(out.join("foo/Square.class").is_file());
    }
}

#[test]
fn test_include_runtime_bundles_runtime_classes() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "src/Main.kt", &main_in("app"));
    let runtime = temp.path().join("runtime");
    write(&runtime, "kotlin/Unit.class", "unit");

    let jar = temp.path().join("app.jar");
    let config = CompilerConfiguration::new()
        .with_source(temp.path().join("src"))
        .with_runtime(&runtime);
    let mut collector = DiagnosticCollector::new();
    let target = OutputTarget::Jar {
        path: jar.clone(),
        include_runtime: true,
    };

    assert_eq!(compile_bunch_of_sources(&config, &target, &mut collector).unwrap(), ExitCode::Ok);
    assert!(jar_entries(&jar).contains(&"kotlin/Unit.class".to_string()));
}

#[test]
fn test_include_runtime_without_runtime_warns() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "src/Main.kt", &main_in("app"));
    let jar = temp.path().join("app.jar");
    let config = CompilerConfiguration::new().with_source(temp.path().join("src"));
    let mut collector = DiagnosticCollector::new();
    let target = OutputTarget::Jar {
        path: jar.clone(),
        include_runtime: true,
    };

    assert_eq!(compile_bunch_of_sources(&config, &target, &mut collector).unwrap(), ExitCode::Ok);
    assert_eq!(collector.warnings().count(), 1);
    assert!(jar.is_file());
}

#[test]
fn test_kotlin_class_visible_to_java_source() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "src/k/Base.kt", "package k\n\nopen class Base\n");
    write(temp.path(), "src/j/Derived.java", "package j;\n\npublic class Derived extends k.Base {}\n");

    let out = temp.path().join("classes");
    let config = CompilerConfiguration::new().with_source(temp.path().join("src"));
    let mut collector = DiagnosticCollector::new();
    let exit = compile_bunch_of_sources(&config, &OutputTarget::Directory(out.clone()), &mut collector).unwrap();

    assert_eq!(exit, ExitCode::Ok, "{:?}", collector.diagnostics());
    assert!(out.join("k/Base.class").is_file());
    assert!(!out.join("j/Derived.class").exists());
}

// ============================================================================
// Sessions
// ============================================================================

#[test]
fn test_full_trace_keeps_resolution_scopes() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "src/a.kt", "package a\n\nclass A\n");
    let config = CompilerConfiguration::new().with_source(temp.path().join("src"));
    let mut collector = DiagnosticCollector::new();
    let environment = CompileEnvironment::create(config, &mut collector);

    let mut full = KotlinToJvmCompiler::<SemanticTrace>::new(&environment);
    assert!(full.analyze(&mut collector));
    assert!(!full.session().binding_context().entries(&RESOLUTION_SCOPE).is_empty());

    let mut filtering = KotlinToJvmCompiler::<FilteringTrace>::new(&environment);
    assert!(filtering.analyze(&mut collector));
    assert!(filtering.session().binding_context().entries(&RESOLUTION_SCOPE).is_empty());
    assert!(filtering.session().trace().dropped() > 0);
}

#[test]
fn test_session_is_named_after_module() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "src/a.kt", "fun a() {}\n");
    let config = CompilerConfiguration::new()
        .with_module_name("library")
        .with_source(temp.path().join("src"));
    let mut collector = DiagnosticCollector::new();
    let environment = CompileEnvironment::create(config, &mut collector);
    let mut compiler = KotlinToJvmCompiler::<FilteringTrace>::new(&environment);

    assert!(!compiler.session().is_initialized());
    assert!(compiler.analyze(&mut collector));
    assert_eq!(compiler.session().module().name(), "library");
}

// ============================================================================
// Plugins
// ============================================================================

struct ForbidClassNamed(&'static str);

impl CompilerPlugin for ForbidClassNamed {
    fn name(&self) -> &str {
        "forbid-class"
    }

    fn process(&self, context: PluginContext<'_>) -> Vec<Diagnostic> {
        context
            .module
            .classes()
            .filter(|(_, class)| class.fq_name.short_name().as_str() == self.0)
            .map(|(_, class)| Diagnostic::error(DiagnosticCode::Plugin, format!("{} is forbidden", class.fq_name)))
            .collect()
    }
}

struct CountFiles(AtomicUsize);

impl CompilerPlugin for CountFiles {
    fn name(&self) -> &str {
        "count-files"
    }

    fn process(&self, context: PluginContext<'_>) -> Vec<Diagnostic> {
        self.0.store(context.sources.len(), Ordering::SeqCst);
        vec![Diagnostic::warning(DiagnosticCode::Plugin, "counted")]
    }
}

#[test]
fn test_plugin_error_stops_compilation() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "src/a.kt", "package a\n\nclass Legacy\n");

    let out = temp.path().join("classes");
    let config = CompilerConfiguration::new()
        .with_source(temp.path().join("src"))
        .with_plugin(Arc::new(ForbidClassNamed("Legacy")));
    let mut collector = DiagnosticCollector::new();
    let exit = compile_bunch_of_sources(&config, &OutputTarget::Directory(out.clone()), &mut collector).unwrap();

    assert_eq!(exit, ExitCode::CompilationError);
    assert!(!out.exists());
    assert_eq!(collector.errors().next().unwrap().message, "a.Legacy is forbidden");
}

#[test]
fn test_plugin_warnings_are_forwarded() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "src/a.kt", "fun a() {}\n");
    write(temp.path(), "src/b.kt", "fun b() {}\n");

    let plugin = Arc::new(CountFiles(AtomicUsize::new(0)));
    let config = CompilerConfiguration::new()
        .with_source(temp.path().join("src"))
        .with_plugin(plugin.clone());
    let mut collector = DiagnosticCollector::new();
    let exit = compile_bunch_of_sources(
        &config,
        &OutputTarget::Directory(temp.path().join("classes")),
        &mut collector,
    )
    .unwrap();

    assert_eq!(exit, ExitCode::Ok);
    assert_eq!(plugin.0.load(Ordering::SeqCst), 2);
    assert_eq!(collector.warnings().count(), 1);
}

// ============================================================================
// Module Chunks
// ============================================================================

#[test]
fn test_chunk_writes_each_module_to_its_output_dir() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "core/src/core/Core.kt", "package core\n\nfun greeting(): String = \"hi\"\n");
    write(
        temp.path(),
        "app/src/app/App.kt",
        "package app\n\nimport core.greeting\n\nfun main(args: Array<String>) {\n    println(greeting())\n}\n",
    );

    let chunk = ModuleChunk::with_base_dir(
        vec![
            Module::new("core", "out/core").with_source("core/src"),
            Module::new("app", "out/app").with_source("app/src"),
        ],
        temp.path(),
    );
    let mut collector = DiagnosticCollector::new();
    let exit = compile_modules(&chunk, &CompilerConfiguration::new(), None, false, &mut collector).unwrap();

    assert_eq!(exit, ExitCode::Ok, "{:?}", collector.diagnostics());
    assert!(temp.path().join("out/core/core/CorePackage.class").is_file());
    assert!(!temp.path().join("out/core/app").exists());
    assert!(temp.path().join("out/app/app/AppPackage.class").is_file());
    assert!(!temp.path().join("out/app/core").exists());
}

#[test]
fn test_chunk_writes_jar_per_module() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "a/A.kt", &main_in("a"));
    write(temp.path(), "b/B.kt", "package b\n\nclass B\n");

    let chunk = ModuleChunk::with_base_dir(
        vec![
            Module::new("first", "out/first").with_source("a/A.kt"),
            Module::new("second", "out/second").with_source("b/B.kt"),
        ],
        temp.path(),
    );
    let jars = temp.path().join("jars");
    let mut collector = DiagnosticCollector::new();
    let exit = compile_modules(&chunk, &CompilerConfiguration::new(), Some(&jars), false, &mut collector).unwrap();

    assert_eq!(exit, ExitCode::Ok);
    assert!(manifest_of(&jars.join("first.jar")).contains("Main-Class: a.APackage"));
    assert!(!manifest_of(&jars.join("second.jar")).contains("Main-Class"));
    assert!(jar_entries(&jars.join("second.jar")).contains(&"b/B.class".to_string()));
}

#[test]
fn test_chunk_duplicate_source_is_warning() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "shared/Shared.kt", "package shared\n\nclass Shared\n");

    let chunk = ModuleChunk::with_base_dir(
        vec![
            Module::new("first", "out/first").with_source("shared/Shared.kt"),
            Module::new("second", "out/second").with_source("shared/Shared.kt"),
        ],
        temp.path(),
    );
    let mut collector = DiagnosticCollector::new();
    let exit = compile_modules(&chunk, &CompilerConfiguration::new(), None, false, &mut collector).unwrap();

    assert_eq!(exit, ExitCode::Ok);
    let warnings: Vec<&Diagnostic> = collector.warnings().collect();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].code, DiagnosticCode::DuplicateModuleSource);
    assert!(temp.path().join("out/second/shared/Shared.class").is_file());
    assert!(!temp.path().join("out/first/shared/Shared.class").exists());
}

#[test]
fn test_chunk_nested_source_root_compiles_once() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "src/a/A.kt", "package a\n\nclass A\n");
    write(temp.path(), "src/sub/b/B.kt", "package b\n\nclass B\n");

    let chunk = ModuleChunk::with_base_dir(
        vec![
            Module::new("outer", "out/outer").with_source("src"),
            Module::new("inner", "out/inner").with_source("src/sub"),
        ],
        temp.path(),
    );
    let mut collector = DiagnosticCollector::new();
    let exit = compile_modules(&chunk, &CompilerConfiguration::new(), None, false, &mut collector).unwrap();

    assert_eq!(exit, ExitCode::Ok, "{:?}", collector.diagnostics());
    assert!(temp.path().join("out/outer/a/A.class").is_file());
    assert!(temp.path().join("out/inner/b/B.class").is_file());
    assert!(!temp.path().join("out/outer/b").exists());
    let warnings: Vec<&Diagnostic> = collector.warnings().collect();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].code, DiagnosticCode::DuplicateModuleSource);
}

#[test]
fn test_chunk_write_failure_removes_earlier_modules() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "a/A.kt", "package a\n\nclass A\n");
    write(temp.path(), "b/B.kt", "package b\n\nclass B\n");
    fs::write(temp.path().join("blocked"), b"").unwrap();

    let chunk = ModuleChunk::with_base_dir(
        vec![
            Module::new("a", "out/a").with_source("a"),
            Module::new("b", "blocked/b").with_source("b"),
        ],
        temp.path(),
    );
    let mut collector = DiagnosticCollector::new();
    let result = compile_modules(&chunk, &CompilerConfiguration::new(), None, false, &mut collector);

    assert!(matches!(result, Err(CompileEnvironmentError::Write { .. })));
    assert!(!temp.path().join("out").exists());
}

#[test]
fn test_chunk_error_writes_no_module() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "a/A.kt", "package a\n\nclass A\n");
    write(temp.path(), "b/B.kt", "package b\n\nfun f(): Int {\n}\n");

    let chunk = ModuleChunk::with_base_dir(
        vec![
            Module::new("a", "out/a").with_source("a"),
            Module::new("b", "out/b").with_source("b"),
        ],
        temp.path(),
    );
    let mut collector = DiagnosticCollector::new();
    let exit = compile_modules(&chunk, &CompilerConfiguration::new(), None, false, &mut collector).unwrap();

    assert_eq!(exit, ExitCode::CompilationError);
    assert!(!temp.path().join("out").exists());
}

// ============================================================================
// Script Mode
// ============================================================================

#[derive(Default)]
struct RecordingRunner {
    runs: RefCell<Vec<(String, Vec<String>, usize)>>,
}

impl ClassRunner for RecordingRunner {
    fn run(
        &self,
        output: &GeneratedOutput,
        main_class: &str,
        _classpath: &[PathBuf],
        args: &[String],
    ) -> Result<i32, CompileEnvironmentError> {
        self.runs
            .borrow_mut()
            .push((main_class.to_string(), args.to_vec(), output.len()));
        Ok(7)
    }
}

#[test]
fn test_script_mode_runs_main_class() {
    let temp = TempDir::new().unwrap();
    let script = write(
        temp.path(),
        "hello.kts",
        "fun greet(name: String) {\n    println(name)\n}\n\ngreet(\"world\")\n",
    );
    let config = CompilerConfiguration::new().with_source(script);
    let runner = RecordingRunner::default();
    let mut collector = DiagnosticCollector::new();
    let args = vec!["one".to_string()];

    let outcome = compile_and_execute(&config, &runner, &args, &mut collector).unwrap();

    assert_eq!(outcome, ScriptOutcome::Finished(7));
    let runs = runner.runs.borrow();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].0, "Hello");
    assert_eq!(runs[0].1, args);
}

#[test]
fn test_script_mode_compilation_failure_does_not_run() {
    let temp = TempDir::new().unwrap();
    let script = write(temp.path(), "bad.kts", "missing()\n");
    let runner = RecordingRunner::default();
    let mut collector = DiagnosticCollector::new();

    let outcome =
        compile_and_execute(&CompilerConfiguration::new().with_source(script), &runner, &[], &mut collector).unwrap();

    assert_eq!(outcome, ScriptOutcome::CompilationFailed);
    assert!(runner.runs.borrow().is_empty());
}

#[test]
fn test_script_mode_without_main_is_error() {
    let temp = TempDir::new().unwrap();
    let source = write(temp.path(), "lib.kt", "fun helper() {}\n");
    let runner = RecordingRunner::default();
    let mut collector = DiagnosticCollector::new();

    let result = compile_and_execute(&CompilerConfiguration::new().with_source(source), &runner, &[], &mut collector);

    assert!(matches!(result, Err(CompileEnvironmentError::NoMainClass)));
}
