//! Class and package lookups for Java-side resolution
//!
//! The bridge answers "which Kotlin declaration is `a.b.C`?" from the binding
//! trace and module descriptor while analysis is still filling them. It does
//! no resolution of its own; every answer is a lookup plus a projection, so
//! it sees exactly what was recorded before the call.

use std::path::{Path, PathBuf};

use rustc_hash::FxHashSet;

use crate::name::{FqName, Name};
use crate::parser::ast::{ClassDecl, NodeId, SourceUnit};
use crate::resolve::descriptors::{ClassId, MemberDescriptor, ModuleDescriptor};
use crate::resolve::slices::{CLASS, CLASS_DECLARATION, PACKAGE_TO_FILES};
use crate::resolve::trace::BindingContext;
use crate::source::{ElementRef, SourceId, SourceSet};

/// Name of the class object member of a class (`Outer.object`, JVM `Outer$object`).
pub const CLASS_OBJECT_NAME: &str = "object";

/// Which files a lookup may return.
#[derive(Debug, Clone, Default)]
pub enum SearchScope {
    #[default]
    Everything,
    Files(FxHashSet<PathBuf>),
    Directories(Vec<PathBuf>),
}

impl SearchScope {
    pub fn files<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        SearchScope::Files(paths.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, path: &Path) -> bool {
        match self {
            SearchScope::Everything => true,
            SearchScope::Files(files) => files.contains(path),
            SearchScope::Directories(dirs) => dirs.iter().any(|dir| path.starts_with(dir)),
        }
    }
}

/// A Kotlin class or object declaration found by the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDeclaration {
    pub fq_name: FqName,
    pub class_id: ClassId,
    pub source: SourceId,
    pub node: NodeId,
}

impl ClassDeclaration {
    /// The syntax node of this declaration.
    pub fn declaration<'s>(&self, sources: &'s SourceSet) -> Option<&'s ClassDecl> {
        sources.kotlin(self.source)?.find_class(self.node)
    }
}

/// Read-only lookups over one trace and module descriptor.
pub struct LightClassBridge<'a> {
    context: BindingContext<'a>,
    module: &'a ModuleDescriptor,
    sources: &'a SourceSet,
}

impl<'a> LightClassBridge<'a> {
    pub fn new(context: BindingContext<'a>, module: &'a ModuleDescriptor, sources: &'a SourceSet) -> Self {
        Self { context, module, sources }
    }

    fn in_scope(&self, source: SourceId, scope: &SearchScope) -> bool {
        self.sources
            .get(source)
            .is_some_and(|file| scope.contains(file.path()))
    }

    fn declaration_of(&self, class_id: ClassId) -> ClassDeclaration {
        let descriptor = self.module.class(class_id);
        ClassDeclaration {
            fq_name: descriptor.fq_name.clone(),
            class_id,
            source: descriptor.source.source,
            node: descriptor.source.node,
        }
    }

    /// The class or object named `fq_name`, if declared in a file within `scope`.
    ///
    /// `Outer.object` resolves to the class object of each `Outer` found.
    pub fn find_class_or_object_declarations(&self, fq_name: &FqName, scope: &SearchScope) -> Vec<ClassDeclaration> {
        if let Some(&class_id) = self.context.get(&CLASS, fq_name) {
            let declaration = self.declaration_of(class_id);
            if self.in_scope(declaration.source, scope) {
                return vec![declaration];
            }
            return Vec::new();
        }

        if fq_name.last_segment_is(CLASS_OBJECT_NAME) {
            if let Some(parent) = fq_name.parent() {
                return self
                    .find_class_or_object_declarations(&parent, scope)
                    .into_iter()
                    .filter_map(|outer| self.module.class(outer.class_id).class_object)
                    .map(|object| self.declaration_of(object))
                    .collect();
            }
        }

        Vec::new()
    }

    /// Files declaring `fq_name`, filtered to `scope`.
    pub fn find_files_for_package(&self, fq_name: &FqName, scope: &SearchScope) -> Vec<SourceId> {
        self.context
            .get(&PACKAGE_TO_FILES, fq_name)
            .map(|files| {
                files
                    .iter()
                    .copied()
                    .filter(|&source| self.in_scope(source, scope))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Top-level classes and objects of every file declaring `fq_name`.
    pub fn find_class_or_object_declarations_in_package(
        &self,
        fq_name: &FqName,
        scope: &SearchScope,
    ) -> Vec<ClassDeclaration> {
        self.find_files_for_package(fq_name, scope)
            .into_iter()
            .filter_map(|source| self.sources.kotlin(source).map(|unit| (source, unit)))
            .flat_map(|(source, unit)| self.top_level_classes(source, unit))
            .collect()
    }

    fn top_level_classes(&self, source: SourceId, unit: &SourceUnit) -> Vec<ClassDeclaration> {
        unit.classes()
            .filter_map(|class| {
                self.context
                    .get(&CLASS_DECLARATION, &ElementRef::new(source, class.id))
                    .map(|&class_id| self.declaration_of(class_id))
            })
            .collect()
    }

    /// Whether the module descriptor has a package view for `fq_name`.
    pub fn package_exists(&self, fq_name: &FqName, _scope: &SearchScope) -> bool {
        self.module.package_view(fq_name).is_some()
    }

    /// Names of the package views nested in `fq_name`.
    pub fn get_sub_packages(&self, fq_name: &FqName, _scope: &SearchScope) -> Vec<Name> {
        let Some(view) = self.module.package_view(fq_name) else {
            return Vec::new();
        };
        view.members()
            .into_iter()
            .filter_map(|member| match member {
                MemberDescriptor::PackageView(package) => Some(package.short_name()),
                MemberDescriptor::Class(_) | MemberDescriptor::Function(_) | MemberDescriptor::Property(_) => None,
            })
            .collect()
    }
}
