//! Resolved declarations
//!
//! The [`ModuleDescriptor`] owns every class, function and property resolved
//! in one compilation and the package views that contain them. Descriptors
//! refer to each other through ids into its arenas.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::name::{FqName, Name};
use crate::parser::ast::Mutability;
use crate::source::ElementRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyId(pub u32);

/// Types built into the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinType {
    Unit,
    Nothing,
    Any,
    Boolean,
    Byte,
    Short,
    Char,
    Int,
    Long,
    Float,
    Double,
    String,
    Array,
}

impl BuiltinType {
    pub fn name(&self) -> &'static str {
        match self {
            BuiltinType::Unit => "Unit",
            BuiltinType::Nothing => "Nothing",
            BuiltinType::Any => "Any",
            BuiltinType::Boolean => "Boolean",
            BuiltinType::Byte => "Byte",
            BuiltinType::Short => "Short",
            BuiltinType::Char => "Char",
            BuiltinType::Int => "Int",
            BuiltinType::Long => "Long",
            BuiltinType::Float => "Float",
            BuiltinType::Double => "Double",
            BuiltinType::String => "String",
            BuiltinType::Array => "Array",
        }
    }

    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            BuiltinType::Boolean
                | BuiltinType::Byte
                | BuiltinType::Short
                | BuiltinType::Char
                | BuiltinType::Int
                | BuiltinType::Long
                | BuiltinType::Float
                | BuiltinType::Double
        )
    }
}

/// A class a type can refer to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ClassRef {
    /// Declared in a Kotlin source of this compilation
    Source(ClassId),
    /// A Java source or classpath class
    External { fq_name: FqName, internal_name: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeConstructor {
    Builtin(BuiltinType),
    Class(ClassRef),
    TypeParameter(Name),
    /// Unresolvable; suppresses follow-up diagnostics
    Error,
}

/// A resolved type: constructor, arguments and nullability.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedType {
    pub constructor: TypeConstructor,
    pub arguments: Vec<ResolvedType>,
    pub nullable: bool,
}

impl ResolvedType {
    pub fn builtin(builtin: BuiltinType) -> Self {
        Self {
            constructor: TypeConstructor::Builtin(builtin),
            arguments: Vec::new(),
            nullable: false,
        }
    }

    pub fn unit() -> Self {
        Self::builtin(BuiltinType::Unit)
    }

    pub fn string() -> Self {
        Self::builtin(BuiltinType::String)
    }

    pub fn int() -> Self {
        Self::builtin(BuiltinType::Int)
    }

    pub fn boolean() -> Self {
        Self::builtin(BuiltinType::Boolean)
    }

    pub fn nullable_any() -> Self {
        Self::builtin(BuiltinType::Any).with_nullable(true)
    }

    /// The type of `null`.
    pub fn nullable_nothing() -> Self {
        Self::builtin(BuiltinType::Nothing).with_nullable(true)
    }

    pub fn array_of(element: ResolvedType) -> Self {
        Self {
            constructor: TypeConstructor::Builtin(BuiltinType::Array),
            arguments: vec![element],
            nullable: false,
        }
    }

    pub fn class(class: ClassRef) -> Self {
        Self {
            constructor: TypeConstructor::Class(class),
            arguments: Vec::new(),
            nullable: false,
        }
    }

    pub fn error() -> Self {
        Self {
            constructor: TypeConstructor::Error,
            arguments: Vec::new(),
            nullable: false,
        }
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn is_error(&self) -> bool {
        self.constructor == TypeConstructor::Error || self.arguments.iter().any(ResolvedType::is_error)
    }

    pub fn is_builtin(&self, builtin: BuiltinType) -> bool {
        self.constructor == TypeConstructor::Builtin(builtin)
    }

    pub fn is_unit(&self) -> bool {
        self.is_builtin(BuiltinType::Unit) && !self.nullable
    }

    /// `Array<String>` (not nullable, no nullable element).
    pub fn is_string_array(&self) -> bool {
        self.is_builtin(BuiltinType::Array)
            && !self.nullable
            && self.arguments.len() == 1
            && self.arguments[0].is_builtin(BuiltinType::String)
            && !self.arguments[0].nullable
    }
}

impl fmt::Display for ResolvedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.constructor {
            TypeConstructor::Builtin(builtin) => write!(f, "{}", builtin.name())?,
            TypeConstructor::Class(ClassRef::Source(id)) => write!(f, "class#{}", id.0)?,
            TypeConstructor::Class(ClassRef::External { fq_name, .. }) => write!(f, "{}", fq_name)?,
            TypeConstructor::TypeParameter(name) => write!(f, "{}", name)?,
            TypeConstructor::Error => write!(f, "[ERROR]")?,
        }
        if !self.arguments.is_empty() {
            write!(f, "<")?;
            for (i, argument) in self.arguments.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", argument)?;
            }
            write!(f, ">")?;
        }
        if self.nullable {
            write!(f, "?")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassDescriptorKind {
    Class,
    Interface,
    Object,
    Enum,
    ClassObject,
    /// The class generated for a `.kts` file
    Script,
}

impl ClassDescriptorKind {
    pub fn is_singleton(&self) -> bool {
        matches!(self, ClassDescriptorKind::Object | ClassDescriptorKind::ClassObject)
    }
}

/// What a declaration is nested in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Container {
    Package(FqName),
    Class(ClassId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValueParameter {
    pub name: Name,
    pub ty: ResolvedType,
    pub is_vararg: bool,
    pub source: Option<ElementRef>,
}

#[derive(Debug, Clone)]
pub struct ClassDescriptor {
    pub fq_name: FqName,
    /// JVM internal name (`a/b/Outer$Inner`)
    pub internal_name: String,
    pub kind: ClassDescriptorKind,
    pub container: Container,
    pub source: ElementRef,
    pub is_abstract: bool,
    pub is_open: bool,
    pub type_parameters: Vec<Name>,
    pub supertypes: Vec<ResolvedType>,
    pub constructor_parameters: Vec<ValueParameter>,
    pub functions: Vec<FunctionId>,
    pub properties: Vec<PropertyId>,
    pub nested_classes: Vec<ClassId>,
    pub class_object: Option<ClassId>,
    pub enum_entries: Vec<Name>,
}

impl ClassDescriptor {
    pub fn name(&self) -> Name {
        self.fq_name.short_name()
    }
}

#[derive(Debug, Clone)]
pub struct FunctionDescriptor {
    pub name: Name,
    pub container: Container,
    pub type_parameters: Vec<Name>,
    pub receiver: Option<ResolvedType>,
    pub parameters: Vec<ValueParameter>,
    pub return_type: ResolvedType,
    pub is_abstract: bool,
    pub source: ElementRef,
}

impl FunctionDescriptor {
    pub fn is_top_level(&self) -> bool {
        matches!(self.container, Container::Package(_))
    }

    /// Whether `count` arguments fit this function's parameters.
    pub fn accepts_argument_count(&self, count: usize) -> bool {
        accepts_argument_count(&self.parameters, count)
    }
}

pub(crate) fn accepts_argument_count(parameters: &[ValueParameter], count: usize) -> bool {
    match parameters.iter().position(|p| p.is_vararg) {
        Some(vararg) => count >= parameters.len() - 1 && vararg == parameters.len() - 1,
        None => count == parameters.len(),
    }
}

#[derive(Debug, Clone)]
pub struct PropertyDescriptor {
    pub name: Name,
    pub container: Container,
    pub ty: ResolvedType,
    pub mutability: Mutability,
    /// Declared as a primary constructor parameter
    pub from_constructor: bool,
    pub source: ElementRef,
}

/// A member of a package view.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum MemberDescriptor {
    PackageView(FqName),
    Class(ClassId),
    Function(FunctionId),
    Property(PropertyId),
}

#[derive(Debug, Clone, Default)]
struct PackageFragment {
    classes: Vec<ClassId>,
    functions: Vec<FunctionId>,
    properties: Vec<PropertyId>,
    sub_packages: BTreeSet<Name>,
}

/// The resolved contents of one package.
#[derive(Debug, Clone, Copy)]
pub struct PackageView<'m> {
    fq_name: &'m FqName,
    fragment: &'m PackageFragment,
}

impl<'m> PackageView<'m> {
    pub fn fq_name(&self) -> &'m FqName {
        self.fq_name
    }

    /// Sub-package views first (by name), then classes, functions, properties.
    pub fn members(&self) -> Vec<MemberDescriptor> {
        let mut members: Vec<MemberDescriptor> = self
            .fragment
            .sub_packages
            .iter()
            .map(|name| MemberDescriptor::PackageView(self.fq_name.child(name)))
            .collect();
        members.extend(self.fragment.classes.iter().copied().map(MemberDescriptor::Class));
        members.extend(self.fragment.functions.iter().copied().map(MemberDescriptor::Function));
        members.extend(self.fragment.properties.iter().copied().map(MemberDescriptor::Property));
        members
    }

    pub fn classes(&self) -> &'m [ClassId] {
        &self.fragment.classes
    }

    pub fn functions(&self) -> &'m [FunctionId] {
        &self.fragment.functions
    }

    pub fn properties(&self) -> &'m [PropertyId] {
        &self.fragment.properties
    }
}

/// Root of everything resolved in one compilation.
#[derive(Debug, Clone)]
pub struct ModuleDescriptor {
    name: String,
    classes: Vec<ClassDescriptor>,
    functions: Vec<FunctionDescriptor>,
    properties: Vec<PropertyDescriptor>,
    packages: BTreeMap<FqName, PackageFragment>,
}

impl ModuleDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        let mut packages = BTreeMap::new();
        packages.insert(FqName::root(), PackageFragment::default());
        Self {
            name: name.into(),
            classes: Vec::new(),
            functions: Vec::new(),
            properties: Vec::new(),
            packages,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Make `package` and its ancestors visible as package views.
    pub fn declare_package(&mut self, package: &FqName) {
        let mut current = package.clone();
        while let Some(parent) = current.parent() {
            self.packages.entry(current.clone()).or_default();
            let fragment = self.packages.entry(parent.clone()).or_default();
            if !fragment.sub_packages.insert(current.short_name()) {
                break;
            }
            current = parent;
        }
    }

    pub fn package_view(&self, package: &FqName) -> Option<PackageView<'_>> {
        self.packages
            .get_key_value(package)
            .map(|(fq_name, fragment)| PackageView { fq_name, fragment })
    }

    pub fn add_class(&mut self, descriptor: ClassDescriptor) -> ClassId {
        let id = ClassId(self.classes.len() as u32);
        match &descriptor.container {
            Container::Package(package) => {
                self.declare_package(package);
                self.packages.entry(package.clone()).or_default().classes.push(id);
            }
            Container::Class(owner) => {
                let is_class_object = descriptor.kind == ClassDescriptorKind::ClassObject;
                if let Some(owner) = self.classes.get_mut(owner.0 as usize) {
                    if is_class_object {
                        owner.class_object = Some(id);
                    } else {
                        owner.nested_classes.push(id);
                    }
                }
            }
        }
        self.classes.push(descriptor);
        id
    }

    pub fn add_function(&mut self, descriptor: FunctionDescriptor) -> FunctionId {
        let id = FunctionId(self.functions.len() as u32);
        match &descriptor.container {
            Container::Package(package) => {
                self.declare_package(package);
                self.packages.entry(package.clone()).or_default().functions.push(id);
            }
            Container::Class(owner) => {
                if let Some(owner) = self.classes.get_mut(owner.0 as usize) {
                    owner.functions.push(id);
                }
            }
        }
        self.functions.push(descriptor);
        id
    }

    pub fn add_property(&mut self, descriptor: PropertyDescriptor) -> PropertyId {
        let id = PropertyId(self.properties.len() as u32);
        match &descriptor.container {
            Container::Package(package) => {
                self.declare_package(package);
                self.packages.entry(package.clone()).or_default().properties.push(id);
            }
            Container::Class(owner) => {
                if let Some(owner) = self.classes.get_mut(owner.0 as usize) {
                    owner.properties.push(id);
                }
            }
        }
        self.properties.push(descriptor);
        id
    }

    pub fn class(&self, id: ClassId) -> &ClassDescriptor {
        &self.classes[id.0 as usize]
    }

    pub fn class_mut(&mut self, id: ClassId) -> &mut ClassDescriptor {
        &mut self.classes[id.0 as usize]
    }

    pub fn function(&self, id: FunctionId) -> &FunctionDescriptor {
        &self.functions[id.0 as usize]
    }

    pub fn function_mut(&mut self, id: FunctionId) -> &mut FunctionDescriptor {
        &mut self.functions[id.0 as usize]
    }

    pub fn property(&self, id: PropertyId) -> &PropertyDescriptor {
        &self.properties[id.0 as usize]
    }

    pub fn property_mut(&mut self, id: PropertyId) -> &mut PropertyDescriptor {
        &mut self.properties[id.0 as usize]
    }

    pub fn classes(&self) -> impl Iterator<Item = (ClassId, &ClassDescriptor)> {
        self.classes.iter().enumerate().map(|(i, c)| (ClassId(i as u32), c))
    }

    pub fn functions(&self) -> impl Iterator<Item = (FunctionId, &FunctionDescriptor)> {
        self.functions.iter().enumerate().map(|(i, f)| (FunctionId(i as u32), f))
    }

    pub fn properties(&self) -> impl Iterator<Item = (PropertyId, &PropertyDescriptor)> {
        self.properties.iter().enumerate().map(|(i, p)| (PropertyId(i as u32), p))
    }

    /// Functions named `name` declared directly in `container`.
    pub fn functions_named<'m>(&'m self, container: &'m Container, name: &'m Name) -> impl Iterator<Item = FunctionId> + 'm {
        self.member_functions(container)
            .into_iter()
            .filter(move |&id| &self.function(id).name == name)
    }

    /// Property `name` declared directly in `container`.
    pub fn property_named(&self, container: &Container, name: &Name) -> Option<PropertyId> {
        self.member_properties(container)
            .into_iter()
            .find(|&id| &self.property(id).name == name)
    }

    pub fn member_functions(&self, container: &Container) -> Vec<FunctionId> {
        match container {
            Container::Package(package) => self
                .packages
                .get(package)
                .map(|fragment| fragment.functions.clone())
                .unwrap_or_default(),
            Container::Class(class) => self.class(*class).functions.clone(),
        }
    }

    pub fn member_properties(&self, container: &Container) -> Vec<PropertyId> {
        match container {
            Container::Package(package) => self
                .packages
                .get(package)
                .map(|fragment| fragment.properties.clone())
                .unwrap_or_default(),
            Container::Class(class) => self.class(*class).properties.clone(),
        }
    }

    /// Package of a declaration container.
    pub fn package_of(&self, container: &Container) -> FqName {
        match container {
            Container::Package(package) => package.clone(),
            Container::Class(class) => self.package_of(&self.class(*class).container),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ast::NodeId;
    use crate::source::SourceId;

    fn element(node: u32) -> ElementRef {
        ElementRef::new(SourceId(0), NodeId(node))
    }

    fn class(fq: &str, container: Container) -> ClassDescriptor {
        ClassDescriptor {
            fq_name: FqName::new(fq),
            internal_name: fq.replace('.', "/"),
            kind: ClassDescriptorKind::Class,
            container,
            source: element(0),
            is_abstract: false,
            is_open: false,
            type_parameters: Vec::new(),
            supertypes: Vec::new(),
            constructor_parameters: Vec::new(),
            functions: Vec::new(),
            properties: Vec::new(),
            nested_classes: Vec::new(),
            class_object: None,
            enum_entries: Vec::new(),
        }
    }

    #[test]
    fn test_package_views_include_ancestors() {
        let mut module = ModuleDescriptor::new("test");
        module.declare_package(&FqName::new("a.b.c"));
        assert!(module.package_view(&FqName::new("a")).is_some());
        assert!(module.package_view(&FqName::new("a.b.c")).is_some());
        let members = module.package_view(&FqName::new("a")).unwrap().members();
        assert_eq!(members, vec![MemberDescriptor::PackageView(FqName::new("a.b"))]);
    }

    #[test]
    fn test_members_are_tagged() {
        let mut module = ModuleDescriptor::new("test");
        let pkg = FqName::new("p");
        let id = module.add_class(class("p.A", Container::Package(pkg.clone())));
        module.add_function(FunctionDescriptor {
            name: Name::identifier("f"),
            container: Container::Package(pkg.clone()),
            type_parameters: Vec::new(),
            receiver: None,
            parameters: Vec::new(),
            return_type: ResolvedType::unit(),
            is_abstract: false,
            source: element(1),
        });
        let members = module.package_view(&pkg).unwrap().members();
        assert_eq!(members[0], MemberDescriptor::Class(id));
        assert!(matches!(members[1], MemberDescriptor::Function(_)));
        assert_eq!(module.functions_named(&Container::Package(pkg), &Name::identifier("f")).count(), 1);
    }

    #[test]
    fn test_class_object_is_attached_to_owner() {
        let mut module = ModuleDescriptor::new("test");
        let outer = module.add_class(class("p.A", Container::Package(FqName::new("p"))));
        let mut object = class("p.A.object", Container::Class(outer));
        object.kind = ClassDescriptorKind::ClassObject;
        let object = module.add_class(object);
        assert_eq!(module.class(outer).class_object, Some(object));
        assert!(module.class(outer).nested_classes.is_empty());
        assert_eq!(module.package_of(&Container::Class(object)), FqName::new("p"));
    }

    #[test]
    fn test_vararg_argument_counts() {
        let parameter = |vararg| ValueParameter {
            name: Name::identifier("x"),
            ty: ResolvedType::string(),
            is_vararg: vararg,
            source: None,
        };
        assert!(accepts_argument_count(&[parameter(false)], 1));
        assert!(!accepts_argument_count(&[parameter(false)], 2));
        assert!(accepts_argument_count(&[parameter(true)], 0));
        assert!(accepts_argument_count(&[parameter(false), parameter(true)], 4));
    }
}
