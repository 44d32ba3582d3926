//! Builders behind the `kotlin.modules` script DSL

use std::path::PathBuf;

use super::chunk::Module;

/// Accumulates one `module(name) { … }` block.
#[derive(Debug, Clone)]
pub struct ModuleBuilder {
    name: String,
    sources: Vec<PathBuf>,
    classpath: Vec<PathBuf>,
    annotations: Vec<PathBuf>,
    output_dir: Option<PathBuf>,
}

impl ModuleBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sources: Vec::new(),
            classpath: Vec::new(),
            annotations: Vec::new(),
            output_dir: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_source(&mut self, path: impl Into<PathBuf>) {
        self.sources.push(path.into());
    }

    pub fn add_classpath_entry(&mut self, path: impl Into<PathBuf>) {
        self.classpath.push(path.into());
    }

    pub fn add_annotations_path_entry(&mut self, path: impl Into<PathBuf>) {
        self.annotations.push(path.into());
    }

    pub fn set_output_dir(&mut self, path: impl Into<PathBuf>) {
        self.output_dir = Some(path.into());
    }

    /// Finish the module. Without an explicit output directory it is `out/<name>`.
    pub fn build(self) -> Module {
        let output_dir = self
            .output_dir
            .unwrap_or_else(|| PathBuf::from("out").join(&self.name));
        Module {
            name: self.name,
            sources: self.sources,
            classpath: self.classpath,
            annotations: self.annotations,
            output_dir,
        }
    }
}

/// Collects the modules declared by one module-script invocation.
#[derive(Debug, Default)]
pub struct ProjectBuilder {
    modules: Vec<Module>,
}

impl ProjectBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_module(&mut self, module: ModuleBuilder) {
        self.modules.push(module.build());
    }

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    pub fn into_modules(self) -> Vec<Module> {
        self.modules
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_collects_modules_in_order() {
        let mut project = ProjectBuilder::new();
        let mut core = ModuleBuilder::new("core");
        core.add_source("src/core");
        core.add_classpath_entry("lib/a.jar");
        core.set_output_dir("build/core");
        project.add_module(core);
        project.add_module(ModuleBuilder::new("app"));

        let modules = project.into_modules();
        assert_eq!(modules.len(), 2);
        assert_eq!(modules[0].sources, vec![PathBuf::from("src/core")]);
        assert_eq!(modules[0].output_dir, PathBuf::from("build/core"));
        assert_eq!(modules[1].output_dir, PathBuf::from("out/app"));
    }
}
