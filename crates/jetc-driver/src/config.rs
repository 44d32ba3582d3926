//! Compiler configuration
//!
//! A [`CompilerConfiguration`] is assembled from a `jetc.toml` file, command
//! line flags and, for chunk builds, the modules of a [`ModuleChunk`]:
//!
//! ```toml
//! [compiler]
//! module-name = "main"
//! sources = ["src"]
//! classpath = ["lib/dep.jar"]
//! annotations = []
//! jdk-home = "/usr/lib/jvm/java-8"
//! runtime = "lib/kotlin-runtime.jar"
//! trace = "filtering"
//! ```
//!
//! Relative paths in a configuration file are relative to the file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use jetc_engine::ModuleChunk;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::plugin::CompilerPlugin;

/// Default file name looked up by the CLI.
pub const CONFIG_FILE_NAME: &str = "jetc.toml";

const DEFAULT_MODULE_NAME: &str = "main";

/// Which binding trace a compilation records into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceMode {
    /// Keep everything, resolution scopes included
    Full,
    /// Drop resolution scopes (batch compilation)
    #[default]
    Filtering,
}

/// Everything one compilation needs to know about its inputs.
#[derive(Debug, Clone)]
pub struct CompilerConfiguration {
    pub module_name: String,
    /// Source files and directories, in order
    pub sources: Vec<PathBuf>,
    pub classpath: Vec<PathBuf>,
    pub annotations: Vec<PathBuf>,
    pub jdk_home: Option<PathBuf>,
    /// Kotlin runtime library (jar or class directory)
    pub runtime: Option<PathBuf>,
    pub trace: TraceMode,
    plugins: Vec<Arc<dyn CompilerPlugin>>,
}

impl Default for CompilerConfiguration {
    fn default() -> Self {
        Self {
            module_name: DEFAULT_MODULE_NAME.to_string(),
            sources: Vec::new(),
            classpath: Vec::new(),
            annotations: Vec::new(),
            jdk_home: None,
            runtime: None,
            trace: TraceMode::default(),
            plugins: Vec::new(),
        }
    }
}

impl CompilerConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module_name(mut self, name: impl Into<String>) -> Self {
        self.module_name = name.into();
        self
    }

    pub fn with_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(path.into());
        self
    }

    pub fn with_sources<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.sources.extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn with_classpath(mut self, path: impl Into<PathBuf>) -> Self {
        self.classpath.push(path.into());
        self
    }

    pub fn with_annotations(mut self, path: impl Into<PathBuf>) -> Self {
        self.annotations.push(path.into());
        self
    }

    pub fn with_jdk_home(mut self, path: impl Into<PathBuf>) -> Self {
        self.jdk_home = Some(path.into());
        self
    }

    pub fn with_runtime(mut self, path: impl Into<PathBuf>) -> Self {
        self.runtime = Some(path.into());
        self
    }

    pub fn with_trace_mode(mut self, trace: TraceMode) -> Self {
        self.trace = trace;
        self
    }

    pub fn with_plugin(mut self, plugin: Arc<dyn CompilerPlugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    pub fn plugins(&self) -> &[Arc<dyn CompilerPlugin>] {
        &self.plugins
    }

    /// This configuration plus the sources, classpath and annotation roots of
    /// every module in `chunk`. Entries already present are not repeated.
    pub fn for_chunk(&self, chunk: &ModuleChunk) -> Self {
        let mut merged = self.clone();
        if let [only] = chunk.modules() {
            merged.module_name = only.name.clone();
        }
        for module in chunk.modules() {
            for source in &module.sources {
                push_unique(&mut merged.sources, chunk.resolve_source(source));
            }
            for entry in &module.classpath {
                push_unique(&mut merged.classpath, chunk.base_dir().join(entry));
            }
            for entry in &module.annotations {
                push_unique(&mut merged.annotations, chunk.base_dir().join(entry));
            }
        }
        merged
    }

    /// A configuration holding only the runtime and JDK settings of this one.
    pub fn bootstrap(&self) -> Self {
        Self {
            module_name: self.module_name.clone(),
            jdk_home: self.jdk_home.clone(),
            runtime: self.runtime.clone(),
            trace: self.trace,
            ..Self::default()
        }
    }

    /// Parse a configuration file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        Self::from_toml(&content, base)
    }

    /// Parse configuration text, resolving relative paths against `base_dir`
    pub fn from_toml(content: &str, base_dir: &Path) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(content)?;
        let section = file.compiler;
        let resolve = |path: PathBuf| if path.is_absolute() { path } else { base_dir.join(path) };

        let mut configuration = Self::default();
        if let Some(name) = section.module_name {
            if name.trim().is_empty() {
                return Err(ConfigError::Invalid("module-name cannot be empty".to_string()));
            }
            configuration.module_name = name;
        }
        configuration.sources = section.sources.into_iter().map(resolve).collect();
        configuration.classpath = section.classpath.into_iter().map(resolve).collect();
        configuration.annotations = section.annotations.into_iter().map(resolve).collect();
        configuration.jdk_home = section.jdk_home.map(resolve);
        configuration.runtime = section.runtime.map(resolve);
        configuration.trace = section.trace.unwrap_or_default();
        Ok(configuration)
    }
}

fn push_unique(paths: &mut Vec<PathBuf>, path: PathBuf) {
    if !paths.contains(&path) {
        paths.push(path);
    }
}

/// On-disk layout of `jetc.toml`
#[derive(Debug, Default, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    compiler: CompilerSection,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct CompilerSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    module_name: Option<String>,
    #[serde(default)]
    sources: Vec<PathBuf>,
    #[serde(default)]
    classpath: Vec<PathBuf>,
    #[serde(default)]
    annotations: Vec<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    jdk_home: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    runtime: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    trace: Option<TraceMode>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use jetc_engine::Module;

    #[test]
    fn test_parse_full_file() {
        let config = CompilerConfiguration::from_toml(
            r#"
[compiler]
module-name = "app"
sources = ["src", "/abs/Main.kt"]
classpath = ["lib/dep.jar"]
jdk-home = "/usr/lib/jvm/java-8"
runtime = "lib/kotlin-runtime.jar"
trace = "full"
"#,
            Path::new("/project"),
        )
        .unwrap();

        assert_eq!(config.module_name, "app");
        assert_eq!(
            config.sources,
            vec![PathBuf::from("/project/src"), PathBuf::from("/abs/Main.kt")]
        );
        assert_eq!(config.classpath, vec![PathBuf::from("/project/lib/dep.jar")]);
        assert_eq!(config.jdk_home, Some(PathBuf::from("/usr/lib/jvm/java-8")));
        assert_eq!(config.runtime, Some(PathBuf::from("/project/lib/kotlin-runtime.jar")));
        assert_eq!(config.trace, TraceMode::Full);
    }

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = CompilerConfiguration::from_toml("", Path::new("/p")).unwrap();
        assert_eq!(config.module_name, "main");
        assert!(config.sources.is_empty());
        assert_eq!(config.trace, TraceMode::Filtering);
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let result = CompilerConfiguration::from_toml("[compiler]\nsource = [\"src\"]\n", Path::new("/p"));
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_empty_module_name_is_invalid() {
        let result = CompilerConfiguration::from_toml("[compiler]\nmodule-name = \" \"\n", Path::new("/p"));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_for_chunk_merges_modules() {
        let chunk = ModuleChunk::with_base_dir(
            vec![
                Module::new("a", "out/a").with_source("a/A.kt").with_classpath("lib/x.jar"),
                Module::new("b", "out/b").with_source("b/B.kt").with_classpath("lib/x.jar"),
            ],
            "/work",
        );
        let config = CompilerConfiguration::new().with_classpath("/jdk/rt.jar").for_chunk(&chunk);

        assert_eq!(
            config.sources,
            vec![PathBuf::from("/work/a/A.kt"), PathBuf::from("/work/b/B.kt")]
        );
        assert_eq!(
            config.classpath,
            vec![PathBuf::from("/jdk/rt.jar"), PathBuf::from("/work/lib/x.jar")]
        );
        assert_eq!(config.module_name, "main");
    }

    #[test]
    fn test_single_module_chunk_names_the_module() {
        let chunk = ModuleChunk::with_base_dir(vec![Module::new("only", "out")], "/work");
        assert_eq!(CompilerConfiguration::new().for_chunk(&chunk).module_name, "only");
    }

    #[test]
    fn test_bootstrap_keeps_runtime_and_jdk_only() {
        let config = CompilerConfiguration::new()
            .with_source("src")
            .with_classpath("lib.jar")
            .with_jdk_home("/jdk")
            .with_runtime("/rt.jar");
        let bootstrap = config.bootstrap();

        assert!(bootstrap.sources.is_empty());
        assert!(bootstrap.classpath.is_empty());
        assert_eq!(bootstrap.jdk_home, Some(PathBuf::from("/jdk")));
        assert_eq!(bootstrap.runtime, Some(PathBuf::from("/rt.jar")));
    }
}
