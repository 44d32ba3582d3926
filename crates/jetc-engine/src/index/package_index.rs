//! Package name → source files / child packages
//!
//! Every file registers its declared package, then every ancestor of that
//! package up to the root is registered with a presence marker. A package
//! that only appears as an ancestor is therefore still known, and an empty
//! leaf package has a marker but no children.

use std::path::PathBuf;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::name::{FqName, Name};
use crate::parser::ast::SourceUnit;
use crate::source::SourceSet;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum SubPackageEntry {
    /// The package exists, regardless of children
    Marker,
    Child(Name),
}

/// Immutable index over a set of source units.
#[derive(Debug, Default)]
pub struct PackageIndex {
    package_to_sources: FxHashMap<FqName, Vec<Arc<SourceUnit>>>,
    sub_packages: FxHashMap<FqName, FxHashSet<SubPackageEntry>>,
}

impl PackageIndex {
    /// Build the index. Files appearing twice (same path) are registered once.
    pub fn new<'a>(units: impl IntoIterator<Item = &'a Arc<SourceUnit>>) -> Self {
        let mut index = PackageIndex::default();
        let mut seen: FxHashSet<PathBuf> = FxHashSet::default();

        for unit in units {
            if !seen.insert(unit.path.clone()) {
                continue;
            }
            index
                .package_to_sources
                .entry(unit.package.clone())
                .or_default()
                .push(Arc::clone(unit));
            index.register_package(&unit.package);
        }

        debug!(
            packages = index.sub_packages.len(),
            files = seen.len(),
            "package index built"
        );
        index
    }

    /// Index the Kotlin units of `sources`.
    pub fn for_sources(sources: &SourceSet) -> Self {
        Self::new(sources.kotlin_units().map(|(_, unit)| unit))
    }

    fn register_package(&mut self, package: &FqName) {
        let mut current = package.clone();
        loop {
            self.sub_packages
                .entry(current.clone())
                .or_default()
                .insert(SubPackageEntry::Marker);
            let Some(parent) = current.parent() else {
                break;
            };
            self.sub_packages
                .entry(parent.clone())
                .or_default()
                .insert(SubPackageEntry::Child(current.short_name()));
            current = parent;
        }
    }

    /// Files declaring exactly `package` (empty if unknown).
    pub fn get_package_sources(&self, package: &FqName) -> &[Arc<SourceUnit>] {
        self.package_to_sources
            .get(package)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether `package` was declared or is an ancestor of a declared package.
    pub fn package_exists(&self, package: &FqName) -> bool {
        self.sub_packages.contains_key(package)
    }

    /// Immediate child packages of `package`, sorted.
    pub fn get_subpackages_of(&self, package: &FqName) -> Vec<FqName> {
        let Some(entries) = self.sub_packages.get(package) else {
            return Vec::new();
        };
        let mut children: Vec<FqName> = entries
            .iter()
            .filter_map(|entry| match entry {
                SubPackageEntry::Marker => None,
                SubPackageEntry::Child(name) => Some(package.child(name)),
            })
            .collect();
        children.sort();
        children
    }

    /// All known packages, sorted.
    pub fn packages(&self) -> Vec<FqName> {
        let mut packages: Vec<FqName> = self.sub_packages.keys().cloned().collect();
        packages.sort();
        packages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;
    use crate::source::SourceFile;

    fn unit(path: &str, package: &str) -> Arc<SourceUnit> {
        let source = if package.is_empty() {
            String::new()
        } else {
            format!("package {}\n", package)
        };
        Arc::new(parse_source(&source, path).unwrap())
    }

    #[test]
    fn test_ancestors_exist() {
        let units = vec![unit("/src/c.kt", "a.b.c")];
        let index = PackageIndex::new(&units);
        assert!(index.package_exists(&FqName::new("a")));
        assert!(index.package_exists(&FqName::new("a.b")));
        assert!(index.package_exists(&FqName::new("a.b.c")));
        assert!(index.package_exists(&FqName::root()));
        assert_eq!(index.get_subpackages_of(&FqName::new("a")), vec![FqName::new("a.b")]);
        assert_eq!(index.get_subpackages_of(&FqName::root()), vec![FqName::new("a")]);
    }

    #[test]
    fn test_leaf_package_has_no_subpackages() {
        let units = vec![unit("/src/c.kt", "a.b.c")];
        let index = PackageIndex::new(&units);
        assert!(index.get_subpackages_of(&FqName::new("a.b.c")).is_empty());
        assert!(index.get_subpackages_of(&FqName::new("unknown")).is_empty());
        assert!(!index.package_exists(&FqName::new("unknown")));
    }

    #[test]
    fn test_foo_and_foo_bar() {
        let units = vec![unit("/src/a.kt", "foo"), unit("/src/b.kt", "foo.bar")];
        let index = PackageIndex::new(&units);
        assert!(index.package_exists(&FqName::new("foo")));
        assert!(index.package_exists(&FqName::new("foo.bar")));
        assert_eq!(index.get_subpackages_of(&FqName::new("foo")), vec![FqName::new("foo.bar")]);
        assert!(index.get_subpackages_of(&FqName::new("foo.bar")).is_empty());
        assert_eq!(index.get_package_sources(&FqName::new("foo")).len(), 1);
        assert_eq!(index.get_package_sources(&FqName::new("foo.bar")).len(), 1);
    }

    #[test]
    fn test_queries_are_idempotent() {
        let units = vec![unit("/src/a.kt", "x.y"), unit("/src/b.kt", "x.z")];
        let index = PackageIndex::new(&units);
        let x = FqName::new("x");
        assert_eq!(index.get_subpackages_of(&x), index.get_subpackages_of(&x));
        assert_eq!(index.package_exists(&x), index.package_exists(&x));
        assert_eq!(index.get_subpackages_of(&x).len(), 2);
    }

    #[test]
    fn test_duplicate_file_registered_once() {
        let a = unit("/src/a.kt", "p");
        let units = vec![Arc::clone(&a), a];
        let index = PackageIndex::new(&units);
        assert_eq!(index.get_package_sources(&FqName::new("p")).len(), 1);
    }

    #[test]
    fn test_root_package_file() {
        let units = vec![unit("/src/a.kt", "")];
        let index = PackageIndex::new(&units);
        assert!(index.package_exists(&FqName::root()));
        assert_eq!(index.get_package_sources(&FqName::root()).len(), 1);
        assert!(index.get_subpackages_of(&FqName::root()).is_empty());
    }

    #[test]
    fn test_for_sources_skips_java_files() {
        let mut sources = SourceSet::new();
        sources.add(SourceFile::Kotlin(unit("/src/a.kt", "k")));
        let java = crate::parser::scan_java_source("package j;\n\npublic class J {}\n", "/src/J.java").unwrap();
        sources.add(SourceFile::Java(Arc::new(java)));
        let index = PackageIndex::for_sources(&sources);
        assert!(index.package_exists(&FqName::new("k")));
        assert!(!index.package_exists(&FqName::new("j")));
    }
}
