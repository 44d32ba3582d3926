//! Top-down analysis
//!
//! Three passes over every source file, all writing into one trace and one
//! module descriptor:
//!
//! 1. **declare**: classes, functions, properties and packages get
//!    descriptors; `CLASS`, `FUNCTION`, `PACKAGE_TO_FILES`, … are recorded.
//! 2. **headers**: imports, supertypes and signatures are resolved. Java
//!    source supertypes are resolved through the light-class bridge, so they
//!    see the Kotlin classes declared in pass 1.
//! 3. **bodies**: names and calls are resolved, types are checked.
//!
//! Every lookup of a Kotlin class goes through a [`LightClassBridge`] built
//! over the trace as it stands at that moment.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, info};

use crate::index::{ClasspathIndex, PackageIndex};
use crate::light_classes::{LightClassBridge, SearchScope};
use crate::name::{FqName, Name};
use crate::parser::ast::*;
use crate::parser::java::JavaSourceFile;
use crate::parser::Span;
use crate::source::{ElementRef, SourceId, SourceSet};
use super::builtins::{builtin_functions, builtin_type, is_builtin_package, BuiltinSignature};
use super::descriptors::*;
use super::diagnostics::{Diagnostic, DiagnosticCode};
use super::scope::{ImportScope, LexicalScope, ScopeKind};
use super::slices::*;
use super::trace::BindingTrace;

/// Result of looking up a type name.
#[derive(Debug, Clone, PartialEq)]
enum TypeLookup {
    Builtin(BuiltinType),
    Class(ClassRef),
}

/// Something a call can resolve to.
#[derive(Debug, Clone)]
enum Callable {
    Function(FunctionId),
    Builtin(&'static BuiltinSignature),
    Constructor(ClassId),
}

#[derive(Debug, Clone)]
struct Local {
    name: Name,
    element: ElementRef,
    ty: ResolvedType,
    mutability: Mutability,
    is_parameter: bool,
}

/// State while resolving one body.
struct BodyScope {
    source: SourceId,
    class: Option<ClassId>,
    /// Declared (or `Unit`) return type of the enclosing block body
    return_type: Option<ResolvedType>,
    type_parameters: Vec<Name>,
    blocks: Vec<Vec<Local>>,
    in_dsl: bool,
    in_lambda: bool,
}

impl BodyScope {
    fn new(source: SourceId, class: Option<ClassId>, type_parameters: Vec<Name>) -> Self {
        Self {
            source,
            class,
            return_type: None,
            type_parameters,
            blocks: vec![Vec::new()],
            in_dsl: false,
            in_lambda: false,
        }
    }

    fn lookup(&self, name: &Name) -> Option<&Local> {
        self.blocks.iter().rev().flat_map(|block| block.iter().rev()).find(|local| &local.name == name)
    }

    fn declared_in_current_block(&self, name: &Name) -> bool {
        self.blocks.last().is_some_and(|block| block.iter().any(|local| &local.name == name))
    }

    fn declare(&mut self, local: Local) {
        if let Some(block) = self.blocks.last_mut() {
            block.push(local);
        }
    }
}

/// Name of the class generated for a script file: the capitalized file stem.
pub fn script_class_name(unit: &SourceUnit) -> Name {
    let stem = unit
        .path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut name: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    let mut chars = name.chars();
    let capitalized = match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => name,
    };
    Name::identifier(capitalized)
}

/// Runs the three analysis passes.
pub struct TopDownAnalyzer<'a, T: BindingTrace> {
    sources: &'a SourceSet,
    classpath: &'a ClasspathIndex,
    packages: &'a PackageIndex,
    trace: &'a mut T,
    module: &'a mut ModuleDescriptor,
    imports: FxHashMap<SourceId, ImportScope>,
    signatures: FxHashSet<(Container, Name, Vec<ResolvedType>)>,
}

impl<'a, T: BindingTrace> TopDownAnalyzer<'a, T> {
    pub fn new(
        sources: &'a SourceSet,
        classpath: &'a ClasspathIndex,
        packages: &'a PackageIndex,
        trace: &'a mut T,
        module: &'a mut ModuleDescriptor,
    ) -> Self {
        Self {
            sources,
            classpath,
            packages,
            trace,
            module,
            imports: FxHashMap::default(),
            signatures: FxHashSet::default(),
        }
    }

    /// Analyze every file of the source set.
    pub fn analyze(mut self) {
        info!(files = self.sources.len(), module = self.module.name(), "analysis started");
        self.declare_all();
        self.resolve_headers();
        self.resolve_bodies();
        let errors = self
            .trace
            .binding_context()
            .diagnostics()
            .iter()
            .filter(|d| d.is_error())
            .count();
        info!(errors, "analysis finished");
    }

    // ── Diagnostics ─────────────────────────────────────────────────

    fn error(&mut self, source: SourceId, span: Span, code: DiagnosticCode, message: impl Into<String>) {
        let path = self.sources.get(source).map(|f| f.path().to_path_buf()).unwrap_or_default();
        self.trace.report(Diagnostic::error(code, message).at(path, span));
    }

    fn warning(&mut self, source: SourceId, span: Span, code: DiagnosticCode, message: impl Into<String>) {
        let path = self.sources.get(source).map(|f| f.path().to_path_buf()).unwrap_or_default();
        self.trace.report(Diagnostic::warning(code, message).at(path, span));
    }

    fn render_type(&self, ty: &ResolvedType) -> String {
        let mut rendered = match &ty.constructor {
            TypeConstructor::Class(ClassRef::Source(id)) => self.module.class(*id).fq_name.to_string(),
            _ => {
                let plain = ResolvedType {
                    arguments: Vec::new(),
                    nullable: false,
                    ..ty.clone()
                };
                plain.to_string()
            }
        };
        if !ty.arguments.is_empty() {
            let arguments: Vec<String> = ty.arguments.iter().map(|a| self.render_type(a)).collect();
            rendered = format!("{}<{}>", rendered, arguments.join(", "));
        }
        if ty.nullable {
            rendered.push('?');
        }
        rendered
    }

    // ── Pass 1: declare ─────────────────────────────────────────────

    fn declare_all(&mut self) {
        let sources = self.sources;
        for package in self.packages.packages() {
            let files: Vec<SourceId> = self
                .packages
                .get_package_sources(&package)
                .iter()
                .filter_map(|unit| sources.find_by_path(&unit.path))
                .collect();
            if !files.is_empty() {
                self.trace.record(&PACKAGE_TO_FILES, package, files);
            }
        }

        for (source, unit) in sources.kotlin_units() {
            debug!(file = %unit.path.display(), package = %unit.package, "declaring");
            self.trace.record(&FILE_TO_PACKAGE, source, unit.package.clone());
            self.module.declare_package(&unit.package);

            let container = if unit.is_script() {
                self.trace.record_flag(&IS_SCRIPT, source);
                match self.declare_script_class(source, unit) {
                    Some(script) => Container::Class(script),
                    None => continue,
                }
            } else {
                Container::Package(unit.package.clone())
            };
            self.declare_members(source, &unit.declarations, &container);
        }

        for (source, file) in sources.java_files() {
            debug!(file = %file.path.display(), classes = file.classes.len(), "declaring java stubs");
            self.module.declare_package(&file.package);
            for stub in &file.classes {
                if self.type_declared(&stub.fq_name) {
                    self.error(
                        source,
                        stub.span,
                        DiagnosticCode::Redeclaration,
                        format!("Redeclaration: {}", stub.fq_name),
                    );
                    continue;
                }
                self.trace.record(
                    &JAVA_CLASS,
                    stub.fq_name.clone(),
                    JavaClassEntry {
                        source,
                        stub: stub.clone(),
                        supertypes: Vec::new(),
                    },
                );
            }
        }
    }

    fn type_declared(&self, fq_name: &FqName) -> bool {
        self.trace.get(&CLASS, fq_name).is_some() || self.trace.get(&JAVA_CLASS, fq_name).is_some()
    }

    fn container_fq_name(&self, container: &Container) -> FqName {
        match container {
            Container::Package(package) => package.clone(),
            Container::Class(class) => self.module.class(*class).fq_name.clone(),
        }
    }

    fn internal_prefix(&self, container: &Container) -> String {
        match container {
            Container::Package(package) if package.is_root() => String::new(),
            Container::Package(package) => format!("{}/", package.internal_name()),
            Container::Class(class) => format!("{}$", self.module.class(*class).internal_name),
        }
    }

    fn declare_script_class(&mut self, source: SourceId, unit: &SourceUnit) -> Option<ClassId> {
        let name = script_class_name(unit);
        let fq_name = unit.package.child(&name);
        let span = unit.package_span.unwrap_or_default();
        if self.type_declared(&fq_name) {
            self.error(source, span, DiagnosticCode::Redeclaration, format!("Redeclaration: {}", fq_name));
            return None;
        }
        let container = Container::Package(unit.package.clone());
        let internal_name = format!("{}{}", self.internal_prefix(&container), name);
        let element = ElementRef::new(source, NodeId::FILE);
        let id = self.module.add_class(ClassDescriptor {
            fq_name: fq_name.clone(),
            internal_name,
            kind: ClassDescriptorKind::Script,
            container,
            source: element,
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
        });
        self.trace.record(&CLASS, fq_name, id);
        self.trace.record(&CLASS_DECLARATION, element, id);
        Some(id)
    }

    fn declare_members(&mut self, source: SourceId, declarations: &[Declaration], container: &Container) {
        for declaration in declarations {
            match declaration {
                Declaration::Class(class) => {
                    self.declare_class(source, class, container);
                }
                Declaration::Function(function) => self.declare_function(source, function, container),
                Declaration::Property(property) => self.declare_property(
                    source,
                    property.id,
                    &property.name,
                    property.mutability,
                    false,
                    property.span,
                    container,
                ),
            }
        }
    }

    fn declare_class(&mut self, source: SourceId, class: &ClassDecl, container: &Container) -> Option<ClassId> {
        let is_class_object = class.kind == ClassKind::ClassObject;
        if is_class_object && matches!(container, Container::Package(_)) {
            self.error(
                source,
                class.span,
                DiagnosticCode::Unsupported,
                "A class object must be declared inside a class",
            );
            return None;
        }

        let fq_name = self.container_fq_name(container).child(&class.name);
        if !is_class_object && self.type_declared(&fq_name) {
            self.error(source, class.span, DiagnosticCode::Redeclaration, format!("Redeclaration: {}", fq_name));
            return None;
        }

        let kind = match class.kind {
            ClassKind::Class => ClassDescriptorKind::Class,
            ClassKind::Interface => ClassDescriptorKind::Interface,
            ClassKind::Object => ClassDescriptorKind::Object,
            ClassKind::Enum => ClassDescriptorKind::Enum,
            ClassKind::ClassObject => ClassDescriptorKind::ClassObject,
        };
        let is_abstract = class.modifiers.is_abstract || kind == ClassDescriptorKind::Interface;
        let internal_name = format!("{}{}", self.internal_prefix(container), class.name);
        let element = ElementRef::new(source, class.id);

        let id = self.module.add_class(ClassDescriptor {
            fq_name: fq_name.clone(),
            internal_name,
            kind,
            container: container.clone(),
            source: element,
            is_abstract,
            is_open: class.modifiers.is_open || is_abstract,
            type_parameters: class.type_parameters.clone(),
            supertypes: Vec::new(),
            constructor_parameters: Vec::new(),
            functions: Vec::new(),
            properties: Vec::new(),
            nested_classes: Vec::new(),
            class_object: None,
            enum_entries: class.enum_entries.clone(),
        });
        if !is_class_object {
            self.trace.record(&CLASS, fq_name, id);
        }
        self.trace.record(&CLASS_DECLARATION, element, id);

        let own = Container::Class(id);
        for parameter in &class.constructor_parameters {
            if let Some(mutability) = parameter.property {
                self.declare_property(source, parameter.id, &parameter.name, mutability, true, parameter.span, &own);
            }
        }
        self.declare_members(source, &class.members, &own);
        if let Some(object) = &class.class_object {
            self.declare_class(source, object, &own);
        }
        Some(id)
    }

    fn declare_function(&mut self, source: SourceId, function: &FunctionDecl, container: &Container) {
        let element = ElementRef::new(source, function.id);
        let id = self.module.add_function(FunctionDescriptor {
            name: function.name.clone(),
            container: container.clone(),
            type_parameters: function.type_parameters.clone(),
            receiver: None,
            parameters: Vec::new(),
            return_type: ResolvedType::error(),
            is_abstract: function.body.is_none(),
            source: element,
        });
        self.trace.record(&FUNCTION, element, id);
    }

    #[allow(clippy::too_many_arguments)]
    fn declare_property(
        &mut self,
        source: SourceId,
        node: NodeId,
        name: &Name,
        mutability: Mutability,
        from_constructor: bool,
        span: Span,
        container: &Container,
    ) {
        if self.module.property_named(container, name).is_some() {
            self.error(source, span, DiagnosticCode::Redeclaration, format!("Redeclaration: {}", name));
            return;
        }
        let element = ElementRef::new(source, node);
        let id = self.module.add_property(PropertyDescriptor {
            name: name.clone(),
            container: container.clone(),
            ty: ResolvedType::error(),
            mutability,
            from_constructor,
            source: element,
        });
        self.trace.record(&PROPERTY, element, id);
    }

    // ── Pass 2: headers ─────────────────────────────────────────────

    fn resolve_headers(&mut self) {
        let sources = self.sources;
        for (source, unit) in sources.kotlin_units() {
            self.imports.insert(source, ImportScope::for_unit(unit));
            self.check_imports(source, unit);

            let mut scope = LexicalScope::new(ScopeKind::File, unit.package.clone());
            for declaration in &unit.declarations {
                scope.declare(declaration.name().clone());
            }
            self.trace.record(&RESOLUTION_SCOPE, ElementRef::new(source, NodeId::FILE), scope);

            let owner = self.script_class_of(source);
            self.resolve_member_headers(source, &unit.declarations, owner, &[]);
        }
        self.resolve_java_supertypes();
    }

    fn script_class_of(&self, source: SourceId) -> Option<ClassId> {
        if !self.trace.get_flag(&IS_SCRIPT, &source) {
            return None;
        }
        self.trace
            .get(&CLASS_DECLARATION, &ElementRef::new(source, NodeId::FILE))
            .copied()
    }

    fn package_of_source(&self, source: SourceId) -> FqName {
        self.trace.get(&FILE_TO_PACKAGE, &source).cloned().unwrap_or_default()
    }

    fn package_known(&self, package: &FqName) -> bool {
        self.packages.package_exists(package)
            || self.module.package_view(package).is_some()
            || self.classpath.package_exists(package)
            || is_builtin_package(package)
    }

    fn top_level_member_exists(&self, fq_name: &FqName) -> bool {
        let Some(package) = fq_name.parent() else {
            return false;
        };
        let name = fq_name.short_name();
        let container = Container::Package(package);
        self.module.functions_named(&container, &name).next().is_some()
            || self.module.property_named(&container, &name).is_some()
    }

    fn check_imports(&mut self, source: SourceId, unit: &SourceUnit) {
        for import in &unit.imports {
            let resolved = if import.all_under {
                self.package_known(&import.path) || self.lookup_class(&import.path).is_some()
            } else {
                self.lookup_type_fq(&import.path).is_some()
                    || !builtin_functions(&import.path).is_empty()
                    || self.top_level_member_exists(&import.path)
            };
            if !resolved {
                self.error(
                    source,
                    import.span,
                    DiagnosticCode::UnresolvedImport,
                    format!("Unresolved reference: {}", import.path),
                );
            }
        }
    }

    fn resolve_member_headers(
        &mut self,
        source: SourceId,
        declarations: &[Declaration],
        owner: Option<ClassId>,
        type_parameters: &[Name],
    ) {
        for declaration in declarations {
            match declaration {
                Declaration::Class(class) => self.resolve_class_header(source, class, type_parameters),
                Declaration::Function(function) => {
                    self.resolve_function_header(source, function, owner, type_parameters)
                }
                Declaration::Property(property) => {
                    self.resolve_property_header(source, property, owner, type_parameters)
                }
            }
        }
    }

    fn resolve_class_header(&mut self, source: SourceId, class: &ClassDecl, outer_type_parameters: &[Name]) {
        let element = ElementRef::new(source, class.id);
        let Some(&id) = self.trace.get(&CLASS_DECLARATION, &element) else {
            return;
        };

        let mut type_parameters = if class.modifiers.is_inner {
            outer_type_parameters.to_vec()
        } else {
            Vec::new()
        };
        type_parameters.extend(class.type_parameters.iter().cloned());

        let mut supertypes = Vec::new();
        let mut superclass_seen = false;
        for entry in &class.supertypes {
            let ty = self.resolve_type(source, &entry.type_ref, &type_parameters, Some(id));
            match &ty.constructor {
                TypeConstructor::Builtin(BuiltinType::Any) => continue,
                TypeConstructor::Builtin(_) | TypeConstructor::TypeParameter(_) => {
                    let message = format!("This type is final, so it cannot be inherited from: {}", self.render_type(&ty));
                    self.error(source, entry.type_ref.span, DiagnosticCode::FinalSupertype, message);
                    continue;
                }
                TypeConstructor::Class(ClassRef::Source(super_id)) => {
                    let supertype = self.module.class(*super_id);
                    let is_interface = supertype.kind == ClassDescriptorKind::Interface;
                    if !supertype.is_open && !is_interface {
                        let message = format!("This type is final, so it cannot be inherited from: {}", supertype.fq_name);
                        self.error(source, entry.type_ref.span, DiagnosticCode::FinalSupertype, message);
                        continue;
                    }
                    if !is_interface {
                        if superclass_seen {
                            self.error(
                                source,
                                entry.type_ref.span,
                                DiagnosticCode::Unsupported,
                                "Only one class may appear in a supertype list",
                            );
                            continue;
                        }
                        superclass_seen = true;
                    }
                }
                TypeConstructor::Class(ClassRef::External { .. }) | TypeConstructor::Error => {}
            }
            supertypes.push(ty);
        }

        let mut parameters = Vec::new();
        let mut scope = LexicalScope::new(ScopeKind::Class, self.package_of_source(source));
        for parameter in &class.constructor_parameters {
            let value = self.resolve_parameter(source, parameter, &type_parameters, Some(id));
            if parameter.property.is_some() {
                if let Some(&property) = self.trace.get(&PROPERTY, &ElementRef::new(source, parameter.id)) {
                    self.module.property_mut(property).ty = parameter_variable_type(&value);
                }
            }
            scope.declare(parameter.name.clone());
            parameters.push(value);
        }
        for member in &class.members {
            scope.declare(member.name().clone());
        }
        self.trace.record(&RESOLUTION_SCOPE, element, scope);

        let descriptor = self.module.class_mut(id);
        descriptor.supertypes = supertypes;
        descriptor.constructor_parameters = parameters;

        self.resolve_member_headers(source, &class.members, Some(id), &type_parameters);
        if let Some(object) = &class.class_object {
            self.resolve_class_header(source, object, &[]);
        }
    }

    fn resolve_parameter(
        &mut self,
        source: SourceId,
        parameter: &Parameter,
        type_parameters: &[Name],
        context: Option<ClassId>,
    ) -> ValueParameter {
        let ty = self.resolve_type(source, &parameter.type_ref, type_parameters, context);
        ValueParameter {
            name: parameter.name.clone(),
            ty,
            is_vararg: parameter.is_vararg,
            source: Some(ElementRef::new(source, parameter.id)),
        }
    }

    fn resolve_function_header(
        &mut self,
        source: SourceId,
        function: &FunctionDecl,
        owner: Option<ClassId>,
        outer_type_parameters: &[Name],
    ) {
        let element = ElementRef::new(source, function.id);
        let Some(&id) = self.trace.get(&FUNCTION, &element) else {
            return;
        };
        let mut type_parameters = outer_type_parameters.to_vec();
        type_parameters.extend(function.type_parameters.iter().cloned());

        let receiver = function
            .receiver
            .as_ref()
            .map(|receiver| self.resolve_type(source, receiver, &type_parameters, owner));
        let parameters: Vec<ValueParameter> = function
            .parameters
            .iter()
            .map(|parameter| self.resolve_parameter(source, parameter, &type_parameters, owner))
            .collect();
        let return_type = match (&function.return_type, &function.body) {
            (Some(type_ref), _) => self.resolve_type(source, type_ref, &type_parameters, owner),
            // Inferred together with the body
            (None, Some(FunctionBody::Expression(_))) => ResolvedType::error(),
            (None, _) => ResolvedType::unit(),
        };

        let mut scope = LexicalScope::new(ScopeKind::Function, self.package_of_source(source));
        for parameter in &function.parameters {
            scope.declare(parameter.name.clone());
        }
        self.trace.record(&RESOLUTION_SCOPE, element, scope);

        let descriptor = self.module.function(id);
        let mut signature: Vec<ResolvedType> = receiver.iter().cloned().collect();
        signature.extend(parameters.iter().map(|p| p.ty.clone()));
        let key = (descriptor.container.clone(), function.name.clone(), signature);
        if !self.signatures.insert(key) {
            self.error(
                source,
                function.span,
                DiagnosticCode::Redeclaration,
                format!("Conflicting overloads: {}", function.name),
            );
        }

        let descriptor = self.module.function_mut(id);
        descriptor.receiver = receiver;
        descriptor.parameters = parameters;
        descriptor.return_type = return_type;
    }

    fn resolve_property_header(
        &mut self,
        source: SourceId,
        property: &PropertyDecl,
        owner: Option<ClassId>,
        type_parameters: &[Name],
    ) {
        let element = ElementRef::new(source, property.id);
        let Some(&id) = self.trace.get(&PROPERTY, &element) else {
            return;
        };
        match &property.type_ref {
            Some(type_ref) => {
                let ty = self.resolve_type(source, type_ref, type_parameters, owner);
                self.module.property_mut(id).ty = ty;
            }
            None if property.initializer.is_none() => self.error(
                source,
                property.span,
                DiagnosticCode::PropertyWithNoTypeNoInitializer,
                "This property must either have a type annotation or be initialized",
            ),
            None => {}
        }
    }

    fn resolve_java_supertypes(&mut self) {
        let sources = self.sources;
        for (source, file) in sources.java_files() {
            for stub in &file.classes {
                let owned = self.trace.get(&JAVA_CLASS, &stub.fq_name).map(|entry| entry.source) == Some(source);
                if !owned {
                    continue;
                }
                let supertypes: Vec<ClassRef> = stub
                    .supertypes
                    .iter()
                    .filter_map(|name| self.resolve_java_type_name(file, name))
                    .collect();
                debug!(class = %stub.fq_name, supertypes = supertypes.len(), "resolved java supertypes");
                self.trace.record(
                    &JAVA_CLASS,
                    stub.fq_name.clone(),
                    JavaClassEntry {
                        source,
                        stub: stub.clone(),
                        supertypes,
                    },
                );
            }
        }
    }

    fn resolve_java_type_name(&self, file: &JavaSourceFile, name: &FqName) -> Option<ClassRef> {
        if name.segments().len() > 1 {
            return self.lookup_class(name);
        }
        let short = name.short_name();
        let mut candidates = Vec::new();
        candidates.extend(
            file.imports
                .iter()
                .filter(|(path, all_under)| !all_under && path.short_name() == short)
                .map(|(path, _)| path.clone()),
        );
        candidates.push(file.package.child(&short));
        candidates.extend(
            file.imports
                .iter()
                .filter(|(_, all_under)| *all_under)
                .map(|(package, _)| package.child(&short)),
        );
        candidates.push(FqName::new("java.lang").child(&short));
        candidates.iter().find_map(|candidate| self.lookup_class(candidate))
    }

    // ── Lookups ─────────────────────────────────────────────────────

    fn bridge(&self) -> LightClassBridge<'_> {
        LightClassBridge::new(self.trace.binding_context(), &*self.module, self.sources)
    }

    fn lookup_class(&self, fq_name: &FqName) -> Option<ClassRef> {
        if let Some(declaration) = self
            .bridge()
            .find_class_or_object_declarations(fq_name, &SearchScope::Everything)
            .into_iter()
            .next()
        {
            return Some(ClassRef::Source(declaration.class_id));
        }
        if let Some(entry) = self.trace.get(&JAVA_CLASS, fq_name) {
            return Some(ClassRef::External {
                fq_name: fq_name.clone(),
                internal_name: entry.internal_name(),
            });
        }
        self.classpath.find_class(fq_name).map(|origin| ClassRef::External {
            fq_name: fq_name.clone(),
            internal_name: origin.internal_name.clone(),
        })
    }

    fn lookup_type_fq(&self, fq_name: &FqName) -> Option<TypeLookup> {
        if let Some(builtin) = builtin_type(fq_name) {
            return Some(TypeLookup::Builtin(builtin));
        }
        self.lookup_class(fq_name).map(TypeLookup::Class)
    }

    fn lookup_simple_type(&self, source: SourceId, name: &Name, context: Option<ClassId>) -> Option<TypeLookup> {
        let mut current = context;
        while let Some(id) = current {
            let class = self.module.class(id);
            if let Some(found) = self.lookup_type_fq(&class.fq_name.child(name)) {
                return Some(found);
            }
            current = match class.container {
                Container::Class(outer) => Some(outer),
                Container::Package(_) => None,
            };
        }
        let package = self.package_of_source(source);
        if let Some(found) = self.lookup_type_fq(&package.child(name)) {
            return Some(found);
        }
        self.imports
            .get(&source)
            .map(|imports| imports.candidates(name))
            .unwrap_or_default()
            .iter()
            .find_map(|candidate| self.lookup_type_fq(candidate))
    }

    fn lookup_type_name(&self, source: SourceId, segments: &[Name], context: Option<ClassId>) -> Option<TypeLookup> {
        let head = self.lookup_simple_type(source, segments.first()?, context);
        if segments.len() == 1 {
            return head;
        }
        if let Some(found) = self.lookup_type_fq(&FqName::from_segments(segments)) {
            return Some(found);
        }
        // `Outer.Inner` through the first segment
        if let Some(TypeLookup::Class(ClassRef::Source(id))) = head {
            let mut fq_name = self.module.class(id).fq_name.clone();
            for segment in &segments[1..] {
                fq_name = fq_name.child(segment);
            }
            return self.lookup_type_fq(&fq_name);
        }
        None
    }

    fn resolve_type(
        &mut self,
        source: SourceId,
        type_ref: &TypeRef,
        type_parameters: &[Name],
        context: Option<ClassId>,
    ) -> ResolvedType {
        let arguments: Vec<ResolvedType> = type_ref
            .arguments
            .iter()
            .map(|argument| self.resolve_type(source, argument, type_parameters, context))
            .collect();

        let ty = if type_ref.segments.len() == 1 && type_parameters.contains(&type_ref.segments[0]) {
            ResolvedType {
                constructor: TypeConstructor::TypeParameter(type_ref.segments[0].clone()),
                arguments: Vec::new(),
                nullable: type_ref.nullable,
            }
        } else {
            match self.lookup_type_name(source, &type_ref.segments, context) {
                Some(TypeLookup::Builtin(BuiltinType::Array)) if arguments.len() != 1 => {
                    self.error(
                        source,
                        type_ref.span,
                        DiagnosticCode::Unsupported,
                        "Array requires exactly one type argument",
                    );
                    ResolvedType::error()
                }
                Some(found) => ResolvedType {
                    constructor: match found {
                        TypeLookup::Builtin(builtin) => TypeConstructor::Builtin(builtin),
                        TypeLookup::Class(class) => TypeConstructor::Class(class),
                    },
                    arguments,
                    nullable: type_ref.nullable,
                },
                None => {
                    self.error(
                        source,
                        type_ref.span,
                        DiagnosticCode::UnresolvedReference,
                        format!("Unresolved reference: {}", type_ref.qualified_name()),
                    );
                    ResolvedType::error()
                }
            }
        };
        self.trace.record(&TYPE, ElementRef::new(source, type_ref.id), ty.clone());
        ty
    }

    fn lookup_property(&self, scope: &BodyScope, name: &Name) -> Option<PropertyId> {
        for container in self.member_containers(scope.class) {
            if let Some(property) = self.module.property_named(&container, name) {
                return Some(property);
            }
        }
        let package = self.package_of_source(scope.source);
        if let Some(property) = self.module.property_named(&Container::Package(package), name) {
            return Some(property);
        }
        let candidates = self
            .imports
            .get(&scope.source)
            .map(|imports| imports.candidates(name))
            .unwrap_or_default();
        candidates.iter().find_map(|candidate| {
            let package = candidate.parent()?;
            self.module
                .property_named(&Container::Package(package), &candidate.short_name())
        })
    }

    /// The enclosing class and its class object.
    fn member_containers(&self, class: Option<ClassId>) -> Vec<Container> {
        let Some(class) = class else {
            return Vec::new();
        };
        let mut containers = vec![Container::Class(class)];
        if let Some(object) = self.module.class(class).class_object {
            containers.push(Container::Class(object));
        }
        containers
    }

    fn collect_callables(&self, scope: &BodyScope, name: &Name) -> Vec<Callable> {
        let mut found = Vec::new();
        for container in self.member_containers(scope.class) {
            found.extend(self.module.functions_named(&container, name).map(Callable::Function));
        }
        if !found.is_empty() {
            return found;
        }

        let package = self.package_of_source(scope.source);
        found.extend(
            self.module
                .functions_named(&Container::Package(package), name)
                .map(Callable::Function),
        );
        if !found.is_empty() {
            return found;
        }

        let candidates = self
            .imports
            .get(&scope.source)
            .map(|imports| imports.candidates(name))
            .unwrap_or_default();
        for candidate in &candidates {
            if let Some(package) = candidate.parent() {
                found.extend(
                    self.module
                        .functions_named(&Container::Package(package), &candidate.short_name())
                        .map(Callable::Function),
                );
            }
            found.extend(builtin_functions(candidate).into_iter().map(Callable::Builtin));
            if !found.is_empty() {
                return found;
            }
        }

        if let Some(TypeLookup::Class(ClassRef::Source(id))) = self.lookup_simple_type(scope.source, name, scope.class) {
            found.push(Callable::Constructor(id));
        }
        found
    }

    fn callable_parameters(&self, callable: &Callable) -> Vec<ValueParameter> {
        match callable {
            Callable::Function(id) => self.module.function(*id).parameters.clone(),
            Callable::Builtin(signature) => signature.parameters.clone(),
            Callable::Constructor(id) => self.module.class(*id).constructor_parameters.clone(),
        }
    }

    fn callable_return_type(&self, callable: &Callable) -> ResolvedType {
        let ty = match callable {
            Callable::Function(id) => self.module.function(*id).return_type.clone(),
            Callable::Builtin(signature) => signature.return_type.clone(),
            Callable::Constructor(id) => ResolvedType::class(ClassRef::Source(*id)),
        };
        // Generic results are not inferred
        if matches!(ty.constructor, TypeConstructor::TypeParameter(_)) {
            return ResolvedType::error();
        }
        ty
    }

    // ── Type checking ───────────────────────────────────────────────

    fn is_assignable(&self, expected: &ResolvedType, actual: &ResolvedType) -> bool {
        if expected.is_error() || actual.is_error() {
            return true;
        }
        if matches!(expected.constructor, TypeConstructor::TypeParameter(_))
            || matches!(actual.constructor, TypeConstructor::TypeParameter(_))
        {
            return true;
        }
        if actual.nullable && !expected.nullable {
            return false;
        }
        if actual.is_builtin(BuiltinType::Nothing) {
            return true;
        }
        match (&expected.constructor, &actual.constructor) {
            (TypeConstructor::Builtin(BuiltinType::Any), _) => true,
            (TypeConstructor::Builtin(BuiltinType::Array), TypeConstructor::Builtin(BuiltinType::Array)) => expected
                .arguments
                .iter()
                .zip(&actual.arguments)
                .all(|(e, a)| self.is_assignable(e, a) && self.is_assignable(a, e)),
            (TypeConstructor::Builtin(e), TypeConstructor::Builtin(a)) => e == a,
            (TypeConstructor::Class(ClassRef::External { .. }), TypeConstructor::Builtin(_)) => true,
            (TypeConstructor::Class(_), TypeConstructor::Builtin(_)) => false,
            (TypeConstructor::Builtin(_), TypeConstructor::Class(_)) => false,
            (TypeConstructor::Class(e), TypeConstructor::Class(a)) => self.is_subclass(a, e),
            _ => true,
        }
    }

    fn is_subclass(&self, actual: &ClassRef, expected: &ClassRef) -> bool {
        let mut queue = vec![actual.clone()];
        let mut seen = FxHashSet::default();
        while let Some(class) = queue.pop() {
            if &class == expected {
                return true;
            }
            if !seen.insert(class.clone()) {
                continue;
            }
            match &class {
                ClassRef::Source(id) => queue.extend(self.module.class(*id).supertypes.iter().filter_map(
                    |supertype| match &supertype.constructor {
                        TypeConstructor::Class(class) => Some(class.clone()),
                        _ => None,
                    },
                )),
                ClassRef::External { fq_name, .. } => match self.trace.get(&JAVA_CLASS, fq_name) {
                    Some(entry) => queue.extend(entry.supertypes.iter().cloned()),
                    // Classpath hierarchies are not indexed
                    None if matches!(expected, ClassRef::External { .. }) => return true,
                    None => {}
                },
            }
        }
        false
    }

    fn check_assignable(&mut self, source: SourceId, expected: &ResolvedType, actual: &ResolvedType, span: Span) {
        if !self.is_assignable(expected, actual) {
            let message = format!(
                "Type mismatch: inferred type is {} but {} was expected",
                self.render_type(actual),
                self.render_type(expected)
            );
            self.error(source, span, DiagnosticCode::TypeMismatch, message);
        }
    }

    // ── Pass 3: bodies ──────────────────────────────────────────────

    fn resolve_bodies(&mut self) {
        let sources = self.sources;
        for (source, unit) in sources.kotlin_units() {
            debug!(file = %unit.path.display(), "resolving bodies");
            let owner = self.script_class_of(source);
            self.resolve_member_bodies(source, &unit.declarations, owner);
            if let (Some(statements), Some(script)) = (&unit.script, owner) {
                let mut scope = BodyScope::new(source, Some(script), Vec::new());
                scope.return_type = Some(ResolvedType::unit());
                self.resolve_block(&mut scope, statements);
                self.trace.record_flag(&BODY_RESOLVED, ElementRef::new(source, NodeId::FILE));
            }
        }
    }

    fn resolve_member_bodies(&mut self, source: SourceId, declarations: &[Declaration], owner: Option<ClassId>) {
        for declaration in declarations {
            match declaration {
                Declaration::Class(class) => self.resolve_class_bodies(source, class),
                Declaration::Function(function) => self.resolve_function_body(source, function, owner),
                Declaration::Property(property) => self.resolve_property_initializer(source, property, owner),
            }
        }
    }

    fn resolve_class_bodies(&mut self, source: SourceId, class: &ClassDecl) {
        let Some(&id) = self.trace.get(&CLASS_DECLARATION, &ElementRef::new(source, class.id)) else {
            return;
        };
        self.resolve_member_bodies(source, &class.members, Some(id));
        if let Some(object) = &class.class_object {
            self.resolve_class_bodies(source, object);
        }
    }

    fn type_parameters_in(&self, owner: Option<ClassId>, own: &[Name]) -> Vec<Name> {
        let mut type_parameters: Vec<Name> = owner
            .map(|class| self.module.class(class).type_parameters.clone())
            .unwrap_or_default();
        type_parameters.extend(own.iter().cloned());
        type_parameters
    }

    fn resolve_function_body(&mut self, source: SourceId, function: &FunctionDecl, owner: Option<ClassId>) {
        let element = ElementRef::new(source, function.id);
        let Some(&id) = self.trace.get(&FUNCTION, &element) else {
            return;
        };
        let descriptor = self.module.function(id).clone();
        let owner_kind = owner.map(|class| self.module.class(class).kind);
        let owner_abstract = owner.is_some_and(|class| self.module.class(class).is_abstract);

        let Some(body) = &function.body else {
            if !owner_abstract {
                self.error(
                    source,
                    function.span,
                    DiagnosticCode::NonAbstractFunctionWithNoBody,
                    format!("Function '{}' without a body must be abstract", function.name),
                );
            }
            return;
        };
        if owner_kind == Some(ClassDescriptorKind::Interface) {
            self.error(
                source,
                function.span,
                DiagnosticCode::Unsupported,
                "Interface functions with bodies are not supported",
            );
            return;
        }

        let mut scope = BodyScope::new(source, owner, self.type_parameters_in(owner, &descriptor.type_parameters));
        for (parameter, value) in function.parameters.iter().zip(&descriptor.parameters) {
            scope.declare(Local {
                name: parameter.name.clone(),
                element: ElementRef::new(source, parameter.id),
                ty: parameter_variable_type(value),
                mutability: Mutability::Val,
                is_parameter: true,
            });
        }

        match body {
            FunctionBody::Block(statements) => {
                scope.return_type = Some(descriptor.return_type.clone());
                let returns = self.resolve_block(&mut scope, statements);
                let return_type = &descriptor.return_type;
                if !returns && !return_type.is_unit() && !return_type.is_error() {
                    self.error(
                        source,
                        function.span,
                        DiagnosticCode::NoReturnInFunctionWithBlockBody,
                        "A 'return' expression required in a function with a block body ('{...}')",
                    );
                }
            }
            FunctionBody::Expression(expr) => {
                if function.return_type.is_some() {
                    let expected = descriptor.return_type.clone();
                    let actual = self.resolve_expr(&mut scope, expr, Some(&expected));
                    self.check_assignable(source, &expected, &actual, expr.span());
                } else {
                    let actual = self.resolve_expr(&mut scope, expr, None);
                    self.module.function_mut(id).return_type = actual;
                }
            }
        }
        self.trace.record_flag(&BODY_RESOLVED, element);
    }

    fn resolve_property_initializer(&mut self, source: SourceId, property: &PropertyDecl, owner: Option<ClassId>) {
        let element = ElementRef::new(source, property.id);
        let Some(&id) = self.trace.get(&PROPERTY, &element) else {
            return;
        };
        let Some(initializer) = &property.initializer else {
            return;
        };
        let mut scope = BodyScope::new(source, owner, self.type_parameters_in(owner, &[]));
        if property.type_ref.is_some() {
            let expected = self.module.property(id).ty.clone();
            let actual = self.resolve_expr(&mut scope, initializer, Some(&expected));
            self.check_assignable(source, &expected, &actual, initializer.span());
        } else {
            let actual = self.resolve_expr(&mut scope, initializer, None);
            self.module.property_mut(id).ty = actual;
        }
    }

    /// Returns whether the block always reaches a `return`.
    fn resolve_block(&mut self, scope: &mut BodyScope, statements: &[Statement]) -> bool {
        scope.blocks.push(Vec::new());
        let mut returned = false;
        let mut unreachable_reported = false;
        for statement in statements {
            if returned && !unreachable_reported {
                self.warning(scope.source, statement.span(), DiagnosticCode::UnreachableCode, "Unreachable code");
                unreachable_reported = true;
            }
            if self.resolve_statement(scope, statement) {
                returned = true;
            }
        }
        scope.blocks.pop();
        returned
    }

    fn resolve_statement(&mut self, scope: &mut BodyScope, statement: &Statement) -> bool {
        let source = scope.source;
        match statement {
            Statement::Local {
                id,
                name,
                mutability,
                type_ref,
                value,
                span,
            } => {
                let type_parameters = scope.type_parameters.clone();
                let declared = type_ref
                    .as_ref()
                    .map(|type_ref| self.resolve_type(source, type_ref, &type_parameters, scope.class));
                let actual = self.resolve_expr(scope, value, declared.as_ref());
                if let Some(declared) = &declared {
                    self.check_assignable(source, declared, &actual, value.span());
                }
                if scope.declared_in_current_block(name) {
                    self.error(
                        source,
                        *span,
                        DiagnosticCode::Redeclaration,
                        format!("Conflicting declarations: {}", name),
                    );
                }
                let ty = declared.unwrap_or(actual);
                let element = ElementRef::new(source, *id);
                self.trace.record(&TYPE, element, ty.clone());
                scope.declare(Local {
                    name: name.clone(),
                    element,
                    ty,
                    mutability: *mutability,
                    is_parameter: false,
                });
                false
            }
            Statement::Assign {
                id,
                target,
                op,
                value,
                span,
            } => {
                self.resolve_assignment(scope, *id, target, *op, value, *span);
                false
            }
            Statement::Return { value, span, .. } => {
                if scope.in_lambda {
                    self.error(
                        source,
                        *span,
                        DiagnosticCode::Unsupported,
                        "'return' is not allowed in a lambda",
                    );
                    if let Some(value) = value {
                        self.resolve_expr(scope, value, None);
                    }
                    return false;
                }
                let expected = scope.return_type.clone().unwrap_or_else(ResolvedType::unit);
                match value {
                    Some(value) => {
                        let actual = self.resolve_expr(scope, value, Some(&expected));
                        self.check_assignable(source, &expected, &actual, value.span());
                    }
                    None if !expected.is_unit() && !expected.is_error() => {
                        let message = format!(
                            "This function must return a value of type {}",
                            self.render_type(&expected)
                        );
                        self.error(source, *span, DiagnosticCode::TypeMismatch, message);
                    }
                    None => {}
                }
                true
            }
            Statement::Expr(expr) => {
                self.resolve_expr(scope, expr, None);
                false
            }
        }
    }

    fn resolve_assignment(
        &mut self,
        scope: &mut BodyScope,
        id: NodeId,
        target: &Name,
        op: AssignOp,
        value: &Expr,
        span: Span,
    ) {
        let source = scope.source;
        let element = ElementRef::new(source, id);

        if let Some(local) = scope.lookup(target).cloned() {
            let reference = if local.is_parameter {
                ReferenceTarget::Parameter(local.element)
            } else {
                ReferenceTarget::Local(local.element)
            };
            self.trace.record(&REFERENCE_TARGET, element, reference);
            if local.mutability == Mutability::Val {
                self.error(source, span, DiagnosticCode::ValReassignment, "Val cannot be reassigned");
            }
            if op == AssignOp::Append {
                self.error(
                    source,
                    span,
                    DiagnosticCode::Unsupported,
                    "'+=' is only supported on module builder lists",
                );
            }
            let actual = self.resolve_expr(scope, value, Some(&local.ty));
            self.check_assignable(source, &local.ty, &actual, value.span());
            return;
        }

        if scope.in_dsl {
            if let Some(property) = DslProperty::from_name(target) {
                self.trace.record(&REFERENCE_TARGET, element, ReferenceTarget::Dsl(property));
                let expected = ResolvedType::string();
                let actual = self.resolve_expr(scope, value, Some(&expected));
                self.check_assignable(source, &expected, &actual, value.span());
                match (property.is_list(), op) {
                    (true, AssignOp::Set) => self.error(
                        source,
                        span,
                        DiagnosticCode::TypeMismatch,
                        format!("'{}' is a list of paths; use '+='", target),
                    ),
                    (false, AssignOp::Append) => self.error(
                        source,
                        span,
                        DiagnosticCode::TypeMismatch,
                        format!("'{}' is a single path; use '='", target),
                    ),
                    _ => {}
                }
                return;
            }
        }

        match self.lookup_property(scope, target) {
            Some(property) => {
                self.trace.record(&REFERENCE_TARGET, element, ReferenceTarget::Property(property));
                let descriptor = self.module.property(property).clone();
                if descriptor.mutability == Mutability::Val {
                    self.error(source, span, DiagnosticCode::ValReassignment, "Val cannot be reassigned");
                }
                if op == AssignOp::Append {
                    self.error(
                        source,
                        span,
                        DiagnosticCode::Unsupported,
                        "'+=' is only supported on module builder lists",
                    );
                }
                let actual = self.resolve_expr(scope, value, Some(&descriptor.ty));
                self.check_assignable(source, &descriptor.ty, &actual, value.span());
            }
            None => {
                self.error(
                    source,
                    span,
                    DiagnosticCode::UnresolvedReference,
                    format!("Unresolved reference: {}", target),
                );
                self.resolve_expr(scope, value, None);
            }
        }
    }

    fn resolve_expr(&mut self, scope: &mut BodyScope, expr: &Expr, expected: Option<&ResolvedType>) -> ResolvedType {
        let ty = match expr {
            Expr::StringLit { .. } => ResolvedType::string(),
            Expr::IntLit { value, .. } => integer_literal_type(*value, expected),
            Expr::BoolLit { .. } => ResolvedType::boolean(),
            Expr::Null { .. } => ResolvedType::nullable_nothing(),
            Expr::Name { id, name, span } => self.resolve_name(scope, *id, name, *span),
            Expr::Call {
                id,
                callee,
                arguments,
                lambda,
                span,
            } => self.resolve_call(scope, *id, callee, arguments, lambda.as_deref(), *span),
        };
        self.trace.record(&TYPE, ElementRef::new(scope.source, expr.id()), ty.clone());
        ty
    }

    fn resolve_name(&mut self, scope: &mut BodyScope, id: NodeId, name: &Name, span: Span) -> ResolvedType {
        let source = scope.source;
        let element = ElementRef::new(source, id);

        if name.as_str() == "this" {
            self.error(source, span, DiagnosticCode::Unsupported, "'this' expressions are not supported");
            return ResolvedType::error();
        }
        if let Some(local) = scope.lookup(name) {
            let reference = if local.is_parameter {
                ReferenceTarget::Parameter(local.element)
            } else {
                ReferenceTarget::Local(local.element)
            };
            let ty = local.ty.clone();
            self.trace.record(&REFERENCE_TARGET, element, reference);
            return ty;
        }
        if scope.in_dsl && DslProperty::from_name(name).is_some() {
            self.error(
                source,
                span,
                DiagnosticCode::Unsupported,
                format!("Module builder property '{}' can only be assigned", name),
            );
            return ResolvedType::error();
        }
        if let Some(property) = self.lookup_property(scope, name) {
            self.trace.record(&REFERENCE_TARGET, element, ReferenceTarget::Property(property));
            return self.module.property(property).ty.clone();
        }
        if let Some(TypeLookup::Class(class)) = self.lookup_simple_type(source, name, scope.class) {
            let singleton = match &class {
                ClassRef::Source(id) => self.module.class(*id).kind.is_singleton(),
                ClassRef::External { .. } => false,
            };
            if singleton {
                self.trace.record(&REFERENCE_TARGET, element, ReferenceTarget::Class(class.clone()));
                return ResolvedType::class(class);
            }
            self.error(
                source,
                span,
                DiagnosticCode::Unsupported,
                format!("Classifier '{}' does not have a class object", name),
            );
            return ResolvedType::error();
        }
        self.error(
            source,
            span,
            DiagnosticCode::UnresolvedReference,
            format!("Unresolved reference: {}", name),
        );
        ResolvedType::error()
    }

    fn resolve_arguments_unchecked(&mut self, scope: &mut BodyScope, arguments: &[Expr]) {
        for argument in arguments {
            self.resolve_expr(scope, argument, None);
        }
    }

    fn resolve_call(
        &mut self,
        scope: &mut BodyScope,
        id: NodeId,
        callee: &Name,
        arguments: &[Expr],
        lambda: Option<&[Statement]>,
        span: Span,
    ) -> ResolvedType {
        let source = scope.source;
        let element = ElementRef::new(source, id);

        if scope.lookup(callee).is_some() {
            self.error(
                source,
                span,
                DiagnosticCode::Unsupported,
                format!("Expression '{}' cannot be invoked as a function", callee),
            );
            self.resolve_arguments_unchecked(scope, arguments);
            return ResolvedType::error();
        }

        let candidates = self.collect_callables(scope, callee);
        if candidates.is_empty() {
            let message = match self.lookup_simple_type(source, callee, scope.class) {
                Some(TypeLookup::Class(ClassRef::External { fq_name, .. })) => {
                    (DiagnosticCode::Unsupported, format!("Constructors of Java class {} cannot be called", fq_name))
                }
                _ => (DiagnosticCode::UnresolvedReference, format!("Unresolved reference: {}", callee)),
            };
            self.error(source, span, message.0, message.1);
            self.resolve_arguments_unchecked(scope, arguments);
            return ResolvedType::error();
        }

        let matching: Vec<Callable> = candidates
            .iter()
            .filter(|callable| accepts_argument_count(&self.callable_parameters(callable), arguments.len()))
            .cloned()
            .collect();
        let chosen = matching
            .iter()
            .find(|callable| {
                let parameters = self.callable_parameters(callable);
                arguments.iter().enumerate().all(|(index, argument)| {
                    match (parameter_for(&parameters, index), literal_type(argument)) {
                        (Some(parameter), Some(actual)) => self.is_assignable(&parameter.ty, &actual),
                        _ => true,
                    }
                })
            })
            .or_else(|| matching.first())
            .cloned();

        let Some(chosen) = chosen else {
            self.resolve_arguments_unchecked(scope, arguments);
            self.error(
                source,
                span,
                DiagnosticCode::WrongNumberOfArguments,
                format!("No overload of '{}' accepts {} argument(s)", callee, arguments.len()),
            );
            return ResolvedType::error();
        };

        let parameters = self.callable_parameters(&chosen);
        for (index, argument) in arguments.iter().enumerate() {
            match parameter_for(&parameters, index) {
                Some(parameter) => {
                    let expected = parameter.ty.clone();
                    let actual = self.resolve_expr(scope, argument, Some(&expected));
                    self.check_assignable(source, &expected, &actual, argument.span());
                }
                None => {
                    self.resolve_expr(scope, argument, None);
                }
            }
        }

        let target = match &chosen {
            Callable::Function(function) => ReferenceTarget::Function(*function),
            Callable::Builtin(signature) => ReferenceTarget::Builtin(signature.function),
            Callable::Constructor(class) => {
                let descriptor = self.module.class(*class);
                let (kind, is_abstract) = (descriptor.kind, descriptor.is_abstract);
                let fq_name = descriptor.fq_name.clone();
                if kind.is_singleton() || kind == ClassDescriptorKind::Script {
                    self.error(
                        source,
                        span,
                        DiagnosticCode::Unsupported,
                        format!("Expression '{}' cannot be invoked as a function", callee),
                    );
                } else if is_abstract || kind == ClassDescriptorKind::Enum {
                    self.error(
                        source,
                        span,
                        DiagnosticCode::Unsupported,
                        format!("Cannot create an instance of {}", fq_name),
                    );
                }
                ReferenceTarget::Class(ClassRef::Source(*class))
            }
        };
        self.trace.record(&REFERENCE_TARGET, element, target);

        let takes_lambda = matches!(&chosen, Callable::Builtin(signature) if signature.takes_lambda);
        match (takes_lambda, lambda) {
            (true, Some(body)) => {
                let (was_dsl, was_lambda) = (scope.in_dsl, scope.in_lambda);
                scope.in_dsl = true;
                scope.in_lambda = true;
                self.resolve_block(scope, body);
                scope.in_dsl = was_dsl;
                scope.in_lambda = was_lambda;
            }
            (true, None) => self.error(
                source,
                span,
                DiagnosticCode::WrongNumberOfArguments,
                format!("'{}' requires a configuration block", callee),
            ),
            (false, Some(_)) => self.error(
                source,
                span,
                DiagnosticCode::Unsupported,
                "Lambdas are only supported as module builder blocks",
            ),
            (false, None) => {}
        }

        self.callable_return_type(&chosen)
    }
}

/// Type of a parameter when used as a variable (`vararg x: T` is `Array<T>`).
fn parameter_variable_type(parameter: &ValueParameter) -> ResolvedType {
    if parameter.is_vararg {
        ResolvedType::array_of(parameter.ty.clone())
    } else {
        parameter.ty.clone()
    }
}

/// The parameter receiving argument `index`, accounting for a trailing vararg.
fn parameter_for(parameters: &[ValueParameter], index: usize) -> Option<&ValueParameter> {
    match parameters.last() {
        Some(last) if last.is_vararg && index >= parameters.len() - 1 => Some(last),
        _ => parameters.get(index),
    }
}

fn integer_literal_type(value: i64, expected: Option<&ResolvedType>) -> ResolvedType {
    let fits = |min: i64, max: i64| value >= min && value <= max;
    match expected.map(|ty| &ty.constructor) {
        Some(TypeConstructor::Builtin(BuiltinType::Long)) => ResolvedType::builtin(BuiltinType::Long),
        Some(TypeConstructor::Builtin(BuiltinType::Short)) if fits(i16::MIN as i64, i16::MAX as i64) => {
            ResolvedType::builtin(BuiltinType::Short)
        }
        Some(TypeConstructor::Builtin(BuiltinType::Byte)) if fits(i8::MIN as i64, i8::MAX as i64) => {
            ResolvedType::builtin(BuiltinType::Byte)
        }
        _ if fits(i32::MIN as i64, i32::MAX as i64) => ResolvedType::int(),
        _ => ResolvedType::builtin(BuiltinType::Long),
    }
}

/// Type of a literal argument, used to pick between overloads.
fn literal_type(expr: &Expr) -> Option<ResolvedType> {
    match expr {
        Expr::StringLit { .. } => Some(ResolvedType::string()),
        Expr::IntLit { value, .. } => Some(integer_literal_type(*value, None)),
        Expr::BoolLit { .. } => Some(ResolvedType::boolean()),
        Expr::Null { .. } => Some(ResolvedType::nullable_nothing()),
        Expr::Name { .. } | Expr::Call { .. } => None,
    }
}

/// Analyze `sources` into `trace` and `module`.
///
/// `packages` must index the Kotlin units of `sources`; it supplies
/// `PACKAGE_TO_FILES` and the packages imports may name.
pub fn analyze<T: BindingTrace>(
    sources: &SourceSet,
    classpath: &ClasspathIndex,
    packages: &PackageIndex,
    trace: &mut T,
    module: &mut ModuleDescriptor,
) {
    TopDownAnalyzer::new(sources, classpath, packages, trace, module).analyze();
}
