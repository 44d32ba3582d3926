//! Build modules and the modules compiled together in one pass

use std::env;
use std::fs;
use std::path::{Component, Path, PathBuf};

use rustc_hash::FxHashMap;
use tracing::warn;

/// One build unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    pub name: String,
    /// Source files or directories, relative or absolute, in declaration order
    pub sources: Vec<PathBuf>,
    pub classpath: Vec<PathBuf>,
    pub annotations: Vec<PathBuf>,
    pub output_dir: PathBuf,
}

impl Module {
    pub fn new(name: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            sources: Vec::new(),
            classpath: Vec::new(),
            annotations: Vec::new(),
            output_dir: output_dir.into(),
        }
    }

    pub fn with_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(path.into());
        self
    }

    pub fn with_classpath(mut self, path: impl Into<PathBuf>) -> Self {
        self.classpath.push(path.into());
        self
    }
}

/// The same source path listed by two modules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConflict {
    pub path: PathBuf,
    /// Module that registered the path first and lost it
    pub shadowed: String,
    /// Module that owns the path in the chunk
    pub owner: String,
}

/// Modules analyzed together, with a source path → module index.
#[derive(Debug, Clone)]
pub struct ModuleChunk {
    modules: Vec<Module>,
    base_dir: PathBuf,
    by_source: FxHashMap<PathBuf, usize>,
    conflicts: Vec<SourceConflict>,
}

impl ModuleChunk {
    /// Build a chunk resolving relative source paths against the current directory.
    pub fn new(modules: Vec<Module>) -> Self {
        let base = env::current_dir().unwrap_or_default();
        Self::with_base_dir(modules, base)
    }

    /// Build a chunk resolving relative source paths against `base_dir`.
    ///
    /// When two modules list the same path, the later module owns it. When one
    /// module lists a path inside another module's source directory, the more
    /// specific entry owns everything under it. Both clashes are kept in
    /// [`ModuleChunk::conflicts`].
    pub fn with_base_dir(modules: Vec<Module>, base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        let mut by_source: FxHashMap<PathBuf, usize> = FxHashMap::default();
        let mut conflicts = Vec::new();

        for (index, module) in modules.iter().enumerate() {
            for source in &module.sources {
                let path = canonicalize(&base_dir.join(source));
                if let Some(previous) = by_source.insert(path.clone(), index) {
                    if previous != index {
                        conflicts.push(SourceConflict {
                            path,
                            shadowed: modules[previous].name.clone(),
                            owner: module.name.clone(),
                        });
                    }
                }
            }
        }

        let mut roots: Vec<(&PathBuf, usize)> = by_source.iter().map(|(path, &index)| (path, index)).collect();
        roots.sort();
        for &(inner, owner) in &roots {
            for &(outer, shadowed) in &roots {
                if shadowed != owner && inner != outer && inner.starts_with(outer) {
                    conflicts.push(SourceConflict {
                        path: inner.clone(),
                        shadowed: modules[shadowed].name.clone(),
                        owner: modules[owner].name.clone(),
                    });
                }
            }
        }

        for conflict in &conflicts {
            warn!(
                path = %conflict.path.display(),
                shadowed = %conflict.shadowed,
                owner = %conflict.owner,
                "source path claimed by two modules"
            );
        }

        Self { modules, base_dir, by_source, conflicts }
    }

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn conflicts(&self) -> &[SourceConflict] {
        &self.conflicts
    }

    /// The module owning `path`, after canonicalizing it.
    pub fn find_module_by_source_file(&self, path: &Path) -> Option<&Module> {
        let path = canonicalize(&self.base_dir.join(path));
        self.by_source.get(&path).map(|&index| &self.modules[index])
    }

    /// The module that compiles `path`: the one listing the file itself, else
    /// the one listing the deepest directory containing it.
    pub fn owner_of(&self, path: &Path) -> Option<&Module> {
        let path = canonicalize(&self.base_dir.join(path));
        path.ancestors()
            .find_map(|candidate| self.by_source.get(candidate))
            .map(|&index| &self.modules[index])
    }

    /// Absolute form of a module's source entry.
    pub fn resolve_source(&self, source: &Path) -> PathBuf {
        canonicalize(&self.base_dir.join(source))
    }
}

/// Filesystem canonicalization when the file exists, lexical otherwise.
pub fn canonicalize(path: &Path) -> PathBuf {
    if let Ok(canonical) = fs::canonicalize(path) {
        return canonical;
    }
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir().unwrap_or_default().join(path)
    };
    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, "").unwrap();
        path
    }

    #[test]
    fn test_find_module_round_trips() {
        let temp = TempDir::new().unwrap();
        let a = touch(temp.path(), "a.kt");
        let b = touch(temp.path(), "b.kt");
        let chunk = ModuleChunk::with_base_dir(
            vec![
                Module::new("first", "out/first").with_source("a.kt"),
                Module::new("second", "out/second").with_source(&b),
            ],
            temp.path(),
        );

        assert_eq!(chunk.find_module_by_source_file(&a).unwrap().name, "first");
        assert_eq!(chunk.find_module_by_source_file(&b).unwrap().name, "second");
        assert!(chunk.find_module_by_source_file(&temp.path().join("c.kt")).is_none());
        assert!(chunk.conflicts().is_empty());
    }

    #[test]
    fn test_disjoint_modules_never_cross() {
        let temp = TempDir::new().unwrap();
        let left: Vec<PathBuf> = (0..3).map(|i| touch(temp.path(), &format!("l{}.kt", i))).collect();
        let right: Vec<PathBuf> = (0..3).map(|i| touch(temp.path(), &format!("r{}.kt", i))).collect();
        let mut first = Module::new("left", "out/l");
        first.sources = left.clone();
        let mut second = Module::new("right", "out/r");
        second.sources = right.clone();
        let chunk = ModuleChunk::new(vec![first, second]);

        for path in &left {
            assert_eq!(chunk.find_module_by_source_file(path).unwrap().name, "left");
        }
        for path in &right {
            assert_eq!(chunk.find_module_by_source_file(path).unwrap().name, "right");
        }
    }

    #[test]
    fn test_lookup_canonicalizes_input() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("sub")).unwrap();
        let file = touch(temp.path(), "a.kt");
        let chunk = ModuleChunk::with_base_dir(vec![Module::new("m", "out").with_source(&file)], temp.path());
        let roundabout = temp.path().join("sub").join("..").join("a.kt");
        assert_eq!(chunk.find_module_by_source_file(&roundabout).unwrap().name, "m");
    }

    #[test]
    fn test_duplicate_source_is_last_write_wins_and_flagged() {
        let temp = TempDir::new().unwrap();
        let shared = touch(temp.path(), "shared.kt");
        let chunk = ModuleChunk::with_base_dir(
            vec![
                Module::new("early", "out/e").with_source(&shared),
                Module::new("late", "out/l").with_source("shared.kt"),
            ],
            temp.path(),
        );
        assert_eq!(chunk.find_module_by_source_file(&shared).unwrap().name, "late");
        assert_eq!(chunk.conflicts().len(), 1);
        assert_eq!(chunk.conflicts()[0].shadowed, "early");
        assert_eq!(chunk.conflicts()[0].owner, "late");
    }

    #[test]
    fn test_nested_source_root_has_single_owner() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("src/sub")).unwrap();
        let top = touch(temp.path(), "src/A.kt");
        let nested = touch(temp.path(), "src/sub/B.kt");
        let chunk = ModuleChunk::with_base_dir(
            vec![
                Module::new("outer", "out/outer").with_source("src"),
                Module::new("inner", "out/inner").with_source("src/sub"),
            ],
            temp.path(),
        );

        assert_eq!(chunk.owner_of(&top).unwrap().name, "outer");
        assert_eq!(chunk.owner_of(&nested).unwrap().name, "inner");
        assert!(chunk.find_module_by_source_file(&nested).is_none());
        assert_eq!(chunk.conflicts().len(), 1);
        assert_eq!(chunk.conflicts()[0].shadowed, "outer");
        assert_eq!(chunk.conflicts()[0].owner, "inner");
    }

    #[test]
    fn test_file_outside_every_root_has_no_owner() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("src")).unwrap();
        let stray = touch(temp.path(), "Stray.kt");
        let chunk = ModuleChunk::with_base_dir(vec![Module::new("m", "out").with_source("src")], temp.path());
        assert!(chunk.owner_of(&stray).is_none());
    }

    #[test]
    fn test_missing_file_uses_lexical_path() {
        let path = canonicalize(Path::new("/nonexistent/dir/../file.kt"));
        assert_eq!(path, PathBuf::from("/nonexistent/file.kt"));
    }
}
