//! Lexical scopes and per-file import scopes

use rustc_hash::FxHashMap;

use crate::name::{FqName, Name};
use crate::parser::ast::SourceUnit;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    File,
    Class,
    Function,
    Block,
}

/// Names visible at a declaration, as recorded for navigation.
#[derive(Debug, Clone, PartialEq)]
pub struct LexicalScope {
    pub kind: ScopeKind,
    /// Enclosing package
    pub package: FqName,
    /// Names declared directly in this scope, in declaration order
    pub names: Vec<Name>,
}

impl LexicalScope {
    pub fn new(kind: ScopeKind, package: FqName) -> Self {
        Self {
            kind,
            package,
            names: Vec::new(),
        }
    }

    pub fn declare(&mut self, name: Name) {
        self.names.push(name);
    }
}

/// Packages imported into every Kotlin file.
pub const DEFAULT_IMPORTS: &[&str] = &["kotlin", "kotlin.io", "kotlin.jvm", "java.lang"];

/// Imports of one file.
#[derive(Debug, Clone, Default)]
pub struct ImportScope {
    /// Imported short name (or alias) → full name
    pub explicit: FxHashMap<Name, FqName>,
    /// `import a.b.*` packages, in source order
    pub star: Vec<FqName>,
}

impl ImportScope {
    pub fn for_unit(unit: &SourceUnit) -> Self {
        let mut scope = ImportScope::default();
        for import in &unit.imports {
            if import.all_under {
                scope.star.push(import.path.clone());
            } else if let Some(name) = import.imported_name() {
                scope.explicit.insert(name, import.path.clone());
            }
        }
        scope
    }

    /// Candidate full names for `name`: explicit import, then star imports,
    /// then default imports.
    pub fn candidates(&self, name: &Name) -> Vec<FqName> {
        let mut candidates = Vec::new();
        if let Some(explicit) = self.explicit.get(name) {
            candidates.push(explicit.clone());
        }
        candidates.extend(self.star.iter().map(|package| package.child(name)));
        candidates.extend(DEFAULT_IMPORTS.iter().map(|package| FqName::new(package).child(name)));
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;

    #[test]
    fn test_candidate_order() {
        let unit = parse_source("import a.Foo\nimport b.*\nimport c.Bar as Foo2\n", "/src/x.kt").unwrap();
        let scope = ImportScope::for_unit(&unit);
        let candidates = scope.candidates(&Name::identifier("Foo"));
        assert_eq!(candidates[0], FqName::new("a.Foo"));
        assert_eq!(candidates[1], FqName::new("b.Foo"));
        assert_eq!(candidates[2], FqName::new("kotlin.Foo"));
        assert_eq!(scope.explicit[&Name::identifier("Foo2")], FqName::new("c.Bar"));
    }
}
