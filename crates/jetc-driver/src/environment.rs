//! The compile environment: parsed sources plus indices
//!
//! Creating an environment reads and parses every source, indexes the
//! classpath and reports configuration problems to the message collector.
//! It never fails; problems are diagnostics, and an error among them stops
//! the compilation before code generation.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use jetc_engine::module::canonicalize;
use jetc_engine::{
    jdk_class_roots, parse_source, scan_java_source, ClasspathIndex, Diagnostic, DiagnosticCode, MessageCollector,
    Module, ModuleChunk, PackageIndex, ParseError, SourceFile, SourceId, SourceSet,
};
use once_cell::unsync::OnceCell;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::CompilerConfiguration;

const SOURCE_EXTENSIONS: &[&str] = &["kt", "kts", "java"];

pub struct CompileEnvironment {
    configuration: CompilerConfiguration,
    sources: SourceSet,
    classpath: ClasspathIndex,
    package_index: OnceCell<PackageIndex>,
    errors: usize,
}

impl CompileEnvironment {
    pub fn create(configuration: CompilerConfiguration, collector: &mut dyn MessageCollector) -> Self {
        let mut environment = Self {
            configuration,
            sources: SourceSet::new(),
            classpath: ClasspathIndex::new(),
            package_index: OnceCell::new(),
            errors: 0,
        };
        environment.index_classpath(collector);
        environment.load_sources(collector);
        info!(
            sources = environment.sources.len(),
            classes = environment.classpath.len(),
            errors = environment.errors,
            "compile environment ready"
        );
        environment
    }

    pub fn configuration(&self) -> &CompilerConfiguration {
        &self.configuration
    }

    pub fn sources(&self) -> &SourceSet {
        &self.sources
    }

    pub fn classpath(&self) -> &ClasspathIndex {
        &self.classpath
    }

    /// The package index over all Kotlin sources, built on first use.
    pub fn package_index(&self) -> &PackageIndex {
        self.package_index
            .get_or_init(|| PackageIndex::for_sources(&self.sources))
    }

    /// Whether configuration or parsing reported an error.
    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }

    /// Every source file of the environment.
    pub fn all_files(&self) -> Vec<SourceId> {
        self.sources.iter().map(|(id, _)| id).collect()
    }

    /// Source files `module` compiles. Every file has at most one owner in
    /// `chunk`, see [`ModuleChunk::owner_of`].
    pub fn files_of(&self, module: &Module, chunk: &ModuleChunk) -> Vec<SourceId> {
        self.sources
            .iter()
            .filter(|(_, file)| chunk.owner_of(file.path()).is_some_and(|owner| owner.name == module.name))
            .map(|(id, _)| id)
            .collect()
    }

    fn report_error(&mut self, collector: &mut dyn MessageCollector, diagnostic: Diagnostic) {
        self.errors += 1;
        collector.report(diagnostic);
    }

    fn index_classpath(&mut self, collector: &mut dyn MessageCollector) {
        let mut roots: Vec<PathBuf> = Vec::new();
        if let Some(jdk_home) = &self.configuration.jdk_home {
            let jdk_roots = jdk_class_roots(jdk_home);
            if jdk_roots.is_empty() {
                collector.report(
                    Diagnostic::warning(DiagnosticCode::Configuration, "No JDK class archives found")
                        .in_file(jdk_home),
                );
            }
            roots.extend(jdk_roots);
        }
        roots.extend(self.configuration.runtime.iter().cloned());
        roots.extend(self.configuration.classpath.iter().cloned());
        roots.extend(self.configuration.annotations.iter().cloned());

        for root in roots {
            if !root.exists() {
                collector.report(
                    Diagnostic::warning(
                        DiagnosticCode::Configuration,
                        "Classpath entry points to a non-existent location",
                    )
                    .in_file(&root),
                );
                continue;
            }
            if let Err(error) = self.classpath.add_root(&root) {
                warn!(root = %root.display(), %error, "skipping classpath entry");
                collector.report(
                    Diagnostic::warning(DiagnosticCode::Configuration, error.to_string()).in_file(&root),
                );
            }
        }
    }

    fn load_sources(&mut self, collector: &mut dyn MessageCollector) {
        let roots = self.configuration.sources.clone();
        for root in roots {
            let root = canonicalize(&root);
            if root.is_dir() {
                let files: Vec<PathBuf> = WalkDir::new(&root)
                    .follow_links(true)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_map(Result::ok)
                    .filter(|entry| entry.file_type().is_file() && is_source_file(entry.path()))
                    .map(|entry| entry.into_path())
                    .collect();
                debug!(root = %root.display(), files = files.len(), "walked source directory");
                for file in files {
                    self.load_file(&file, collector);
                }
            } else if root.is_file() {
                if is_source_file(&root) {
                    self.load_file(&root, collector);
                } else {
                    self.report_error(
                        collector,
                        Diagnostic::error(DiagnosticCode::Configuration, "Source entry is not a Kotlin or Java file")
                            .in_file(&root),
                    );
                }
            } else {
                self.report_error(
                    collector,
                    Diagnostic::error(DiagnosticCode::Configuration, "Source file or directory not found")
                        .in_file(&root),
                );
            }
        }
    }

    fn load_file(&mut self, path: &Path, collector: &mut dyn MessageCollector) {
        if self.sources.find_by_path(path).is_some() {
            return;
        }
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(error) => {
                self.report_error(
                    collector,
                    Diagnostic::error(DiagnosticCode::Configuration, format!("Cannot read source file: {}", error))
                        .in_file(path),
                );
                return;
            }
        };

        let parsed = if path.extension() == Some(OsStr::new("java")) {
            scan_java_source(&text, path).map(|file| SourceFile::Java(Arc::new(file)))
        } else {
            parse_source(&text, path).map(|unit| SourceFile::Kotlin(Arc::new(unit)))
        };
        match parsed {
            Ok(file) => {
                debug!(file = %path.display(), "parsed");
                self.sources.add(file);
            }
            Err(errors) => {
                for error in errors {
                    self.report_error(collector, syntax_error(path, error));
                }
            }
        }
    }
}

fn syntax_error(path: &Path, error: ParseError) -> Diagnostic {
    Diagnostic::error(DiagnosticCode::SyntaxError, error.message).at(path, error.span)
}

fn is_source_file(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext))
}
