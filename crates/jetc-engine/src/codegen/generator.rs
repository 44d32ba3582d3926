//! Class file generation from analyzed sources
//!
//! One class file per class, interface, object and class object, one package
//! facade per package with top-level members, one class per script.

use std::collections::BTreeMap;
use std::path::PathBuf;

use rustc_hash::FxHashMap;
use tracing::{debug, info};

use crate::name::FqName;
use crate::parser::ast::{ClassDecl, Declaration, Expr, FunctionBody, FunctionDecl, Mutability, NodeId, Statement};
use crate::parser::java::JavaClassKind;
use crate::resolve::descriptors::{
    BuiltinType, ClassDescriptorKind, ClassId, ClassRef, Container, FunctionId, ModuleDescriptor, PropertyId,
    TypeConstructor, ValueParameter,
};
use crate::resolve::slices::{
    BuiltinFunction, ReferenceTarget, CLASS_DECLARATION, FUNCTION, JAVA_CLASS, PROPERTY, REFERENCE_TARGET, TYPE,
};
use crate::resolve::trace::BindingContext;
use crate::source::{ElementRef, SourceId, SourceSet};
use super::classfile::{access, opcodes, ClassWriter, Code, ConstantPool};
use super::main_detector::find_main_class;
use super::type_mapper::{box_class, facade_internal_name, getter_name, method_descriptor, setter_name, JvmType, Sort, TypeMapper};
use super::CodegenError;

const OBJECT: &str = "java/lang/Object";
const INSTANCE_FIELD: &str = "$instance";

/// Class files produced by one generation, keyed by relative path.
#[derive(Debug, Clone, Default)]
pub struct GeneratedOutput {
    files: BTreeMap<String, Vec<u8>>,
    main_class: Option<String>,
}

impl GeneratedOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the class file of `internal_name` (`a/b/C` → `a/b/C.class`).
    pub fn insert_class(&mut self, internal_name: &str, bytes: Vec<u8>) {
        self.files.insert(format!("{}.class", internal_name), bytes);
    }

    /// Files in path order.
    pub fn files(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.files.iter().map(|(path, bytes)| (path.as_str(), bytes.as_slice()))
    }

    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Binary name of the class to launch (`demo.DemoPackage`).
    pub fn main_class(&self) -> Option<&str> {
        self.main_class.as_deref()
    }

    pub fn set_main_class(&mut self, main_class: Option<String>) {
        self.main_class = main_class;
    }

    /// Merge another output; its main class is dropped.
    pub fn extend(&mut self, other: GeneratedOutput) {
        self.files.extend(other.files);
    }
}

/// Read-only inputs shared by every generated method.
#[derive(Clone, Copy)]
struct Env<'a> {
    context: BindingContext<'a>,
    module: &'a ModuleDescriptor,
    sources: &'a SourceSet,
    types: TypeMapper<'a>,
}

impl<'a> Env<'a> {
    fn path(&self, source: SourceId) -> PathBuf {
        self.sources.get(source).map(|f| f.path().to_path_buf()).unwrap_or_default()
    }

    fn unsupported(&self, source: SourceId, what: impl Into<String>) -> CodegenError {
        CodegenError::Unsupported {
            what: what.into(),
            file: self.path(source),
        }
    }

    fn missing(&self, source: SourceId, what: impl Into<String>) -> CodegenError {
        CodegenError::MissingBinding {
            what: what.into(),
            file: self.path(source),
        }
    }

    /// JVM class holding the members of `container`.
    fn owner_of(&self, container: &Container) -> String {
        match container {
            Container::Package(package) => facade_internal_name(package),
            Container::Class(class) => self.module.class(*class).internal_name.clone(),
        }
    }

    /// Whether members of `container` are static.
    fn is_static_container(&self, container: &Container) -> bool {
        match container {
            Container::Package(_) => true,
            Container::Class(class) => self.module.class(*class).kind == ClassDescriptorKind::Script,
        }
    }

    fn is_interface(&self, container: &Container) -> bool {
        matches!(container, Container::Class(class) if self.module.class(*class).kind == ClassDescriptorKind::Interface)
    }
}

/// Generate class files for `files` (Kotlin sources of one module).
pub fn generate(
    context: BindingContext<'_>,
    module: &ModuleDescriptor,
    sources: &SourceSet,
    files: &[SourceId],
) -> Result<GeneratedOutput, CodegenError> {
    info!(files = files.len(), module = module.name(), "generating class files");
    let env = Env {
        context,
        module,
        sources,
        types: TypeMapper::new(module),
    };
    let mut output = GeneratedOutput::new();
    let mut facades: BTreeMap<FqName, Vec<SourceId>> = BTreeMap::new();

    for &source in files {
        let Some(unit) = sources.kotlin(source) else {
            debug!(?source, "skipping non-Kotlin source");
            continue;
        };
        debug!(file = %unit.path.display(), "generating");
        if unit.is_script() {
            generate_script(env, source, &mut output)?;
            continue;
        }
        if unit.functions().next().is_some() || unit.properties().next().is_some() {
            facades.entry(unit.package.clone()).or_default().push(source);
        }
        for class in unit.classes() {
            generate_class(env, source, class, &mut output)?;
        }
    }

    for (package, files) in &facades {
        generate_facade(env, package, files, &mut output)?;
    }

    output.set_main_class(find_main_class(context, module, sources, files));
    info!(classes = output.len(), main_class = ?output.main_class(), "generated class files");
    Ok(output)
}

fn file_name(env: Env<'_>, source: SourceId) -> String {
    env.sources
        .kotlin(source)
        .map(|unit| unit.file_name())
        .unwrap_or_default()
}

// ── Properties ──────────────────────────────────────────────────────

/// Field plus accessors of one property.
fn generate_property(env: Env<'_>, writer: &mut ClassWriter, property: PropertyId, is_static: bool, is_interface: bool) {
    let descriptor = env.module.property(property);
    let name = descriptor.name.as_str();
    let ty = env.types.map_type(&descriptor.ty);
    let is_var = descriptor.mutability == Mutability::Var;
    let getter_descriptor = method_descriptor([], &ty);
    let setter_descriptor = method_descriptor([&ty], &JvmType::VOID);

    if is_interface {
        writer.add_method(access::PUBLIC | access::ABSTRACT, getter_name(name), getter_descriptor, None);
        if is_var {
            writer.add_method(access::PUBLIC | access::ABSTRACT, setter_name(name), setter_descriptor, None);
        }
        return;
    }

    let static_flag = if is_static { access::STATIC } else { 0 };
    let final_flag = if is_var { 0 } else { access::FINAL };
    // Static finals are assigned in <clinit>, instance finals in <init>
    writer.add_field(access::PRIVATE | static_flag | final_flag, name, ty.descriptor());

    let owner = writer.this_class().to_string();
    let base = if is_static { 0 } else { 1 };

    let mut getter = Code::new();
    getter.reserve_locals(base);
    if is_static {
        getter.get_static(writer.pool(), &owner, name, &ty);
    } else {
        getter.load(&JvmType::OBJECT, 0);
        getter.get_field(writer.pool(), &owner, name, &ty);
    }
    getter.return_value(&ty);
    writer.add_method(access::PUBLIC | static_flag, getter_name(name), getter_descriptor, Some(getter));

    if is_var {
        let mut setter = Code::new();
        setter.reserve_locals(base + ty.size());
        if is_static {
            setter.load(&ty, 0);
            setter.put_static(writer.pool(), &owner, name, &ty);
        } else {
            setter.load(&JvmType::OBJECT, 0);
            setter.load(&ty, 1);
            setter.put_field(writer.pool(), &owner, name, &ty);
        }
        setter.return_value(&JvmType::VOID);
        writer.add_method(access::PUBLIC | static_flag, setter_name(name), setter_descriptor, Some(setter));
    }
}

// ── Functions ───────────────────────────────────────────────────────

fn generate_function(
    env: Env<'_>,
    writer: &mut ClassWriter,
    source: SourceId,
    function: &FunctionDecl,
    this_class: Option<ClassId>,
) -> Result<(), CodegenError> {
    let id = *env
        .context
        .get(&FUNCTION, &ElementRef::new(source, function.id))
        .ok_or_else(|| env.missing(source, format!("function {}", function.name)))?;
    let descriptor = env.module.function(id);
    let jvm_descriptor = env.types.function_descriptor(descriptor);
    let name = function.name.as_str();
    if writer.has_method(name, &jvm_descriptor) {
        return Err(CodegenError::DuplicateMethod {
            class: writer.this_class().to_string(),
            name: name.to_string(),
            descriptor: jvm_descriptor,
        });
    }
    let static_flag = if this_class.is_none() { access::STATIC } else { 0 };

    let Some(body) = &function.body else {
        writer.add_method(access::PUBLIC | access::ABSTRACT, name, jvm_descriptor, None);
        return Ok(());
    };

    let owner = writer.this_class().to_string();
    let mut codegen = BodyCodegen::new(env, writer.pool(), source, owner, this_class);
    if let Some(receiver) = &descriptor.receiver {
        codegen.skip_slots(env.types.map_type(receiver).size());
    }
    for (parameter, value) in function.parameters.iter().zip(&descriptor.parameters) {
        codegen.declare_local(ElementRef::new(source, parameter.id), env.types.parameter_type(value));
    }
    let return_type = env.types.return_type(descriptor);
    match body {
        FunctionBody::Block(statements) => {
            let returned = codegen.gen_block(statements, &return_type)?;
            if !returned {
                codegen.push_default(&return_type);
                codegen.code.return_value(&return_type);
            }
        }
        FunctionBody::Expression(expr) => {
            let actual = codegen.gen_expr(expr)?;
            codegen.coerce(&actual, &return_type);
            codegen.code.return_value(&return_type);
        }
    }
    let code = codegen.finish();
    writer.add_method(access::PUBLIC | static_flag, name, jvm_descriptor, Some(code));
    Ok(())
}

// ── Facades and scripts ─────────────────────────────────────────────

fn generate_facade(
    env: Env<'_>,
    package: &FqName,
    files: &[SourceId],
    output: &mut GeneratedOutput,
) -> Result<(), CodegenError> {
    let internal_name = facade_internal_name(package);
    debug!(facade = %internal_name, files = files.len(), "generating package facade");
    let mut writer = ClassWriter::new(access::PUBLIC | access::FINAL | access::SUPER, internal_name.clone(), OBJECT);
    if let [single] = files {
        writer.set_source_file(file_name(env, *single));
    }

    let mut initializers = Vec::new();
    for &source in files {
        let Some(unit) = env.sources.kotlin(source) else {
            continue;
        };
        for property in unit.properties() {
            let id = *env
                .context
                .get(&PROPERTY, &ElementRef::new(source, property.id))
                .ok_or_else(|| env.missing(source, format!("property {}", property.name)))?;
            generate_property(env, &mut writer, id, true, false);
            if let Some(initializer) = &property.initializer {
                initializers.push((source, id, initializer));
            }
        }
        for function in unit.functions() {
            generate_function(env, &mut writer, source, function, None)?;
        }
    }

    generate_static_initializer(env, &mut writer, &initializers, None)?;
    output.insert_class(&internal_name, writer.to_bytes()?);
    Ok(())
}

/// `<clinit>`: create the singleton instance, then run static initializers.
fn generate_static_initializer(
    env: Env<'_>,
    writer: &mut ClassWriter,
    initializers: &[(SourceId, PropertyId, &Expr)],
    singleton: Option<ClassId>,
) -> Result<(), CodegenError> {
    if initializers.is_empty() && singleton.is_none() {
        return Ok(());
    }
    let owner = writer.this_class().to_string();
    let source = initializers
        .first()
        .map(|(source, _, _)| *source)
        .or_else(|| singleton.map(|class| env.module.class(class).source.source))
        .unwrap_or(SourceId(0));
    let mut codegen = BodyCodegen::new(env, writer.pool(), source, owner.clone(), None);

    if singleton.is_some() {
        let ty = JvmType::object(&owner);
        codegen.code.new_object(codegen.pool, &owner);
        codegen.code.dup();
        codegen.code.invoke_special(codegen.pool, &owner, "<init>", "()V");
        codegen.code.put_static(codegen.pool, &owner, INSTANCE_FIELD, &ty);
    }
    for &(source, property, initializer) in initializers {
        codegen.source = source;
        let descriptor = env.module.property(property);
        let ty = env.types.map_type(&descriptor.ty);
        let actual = codegen.gen_expr(initializer)?;
        codegen.coerce(&actual, &ty);
        codegen.code.put_static(codegen.pool, &owner, descriptor.name.as_str(), &ty);
    }
    codegen.code.return_value(&JvmType::VOID);
    let code = codegen.finish();
    writer.add_method(access::STATIC, "<clinit>", "()V", Some(code));
    Ok(())
}

fn generate_script(env: Env<'_>, source: SourceId, output: &mut GeneratedOutput) -> Result<(), CodegenError> {
    let unit = env
        .sources
        .kotlin(source)
        .ok_or_else(|| env.missing(source, "script source"))?;
    let class_id = *env
        .context
        .get(&CLASS_DECLARATION, &ElementRef::new(source, NodeId::FILE))
        .ok_or_else(|| env.missing(source, "script class"))?;
    let internal_name = env.module.class(class_id).internal_name.clone();
    debug!(script = %internal_name, "generating script class");

    let mut writer = ClassWriter::new(access::PUBLIC | access::FINAL | access::SUPER, internal_name.clone(), OBJECT);
    writer.set_source_file(unit.file_name());

    let mut initializers = Vec::new();
    for declaration in &unit.declarations {
        match declaration {
            Declaration::Property(property) => {
                let id = *env
                    .context
                    .get(&PROPERTY, &ElementRef::new(source, property.id))
                    .ok_or_else(|| env.missing(source, format!("property {}", property.name)))?;
                generate_property(env, &mut writer, id, true, false);
                if let Some(initializer) = &property.initializer {
                    initializers.push((source, id, initializer));
                }
            }
            Declaration::Function(function) => generate_function(env, &mut writer, source, function, None)?,
            Declaration::Class(class) => generate_class(env, source, class, output)?,
        }
    }
    generate_static_initializer(env, &mut writer, &initializers, None)?;

    let main_descriptor = "([Ljava/lang/String;)V";
    if writer.has_method("main", main_descriptor) {
        return Err(CodegenError::DuplicateMethod {
            class: internal_name,
            name: "main".to_string(),
            descriptor: main_descriptor.to_string(),
        });
    }
    let statements = unit.script.as_deref().unwrap_or_default();
    let mut codegen = BodyCodegen::new(env, writer.pool(), source, internal_name.clone(), None);
    // args
    codegen.skip_slots(1);
    if !codegen.gen_block(statements, &JvmType::VOID)? {
        codegen.code.return_value(&JvmType::VOID);
    }
    let code = codegen.finish();
    writer.add_method(access::PUBLIC | access::STATIC, "main", main_descriptor, Some(code));

    output.insert_class(&internal_name, writer.to_bytes()?);
    Ok(())
}

// ── Classes ─────────────────────────────────────────────────────────

fn is_interface_ref(env: Env<'_>, class: &ClassRef, constructor_call: bool) -> bool {
    match class {
        ClassRef::Source(id) => env.module.class(*id).kind == ClassDescriptorKind::Interface,
        ClassRef::External { fq_name, .. } => match env.context.get(&JAVA_CLASS, fq_name) {
            Some(entry) => entry.stub.kind == JavaClassKind::Interface,
            // Classpath classes are only known by name
            None => !constructor_call,
        },
    }
}

fn generate_class(
    env: Env<'_>,
    source: SourceId,
    decl: &ClassDecl,
    output: &mut GeneratedOutput,
) -> Result<(), CodegenError> {
    let id = *env
        .context
        .get(&CLASS_DECLARATION, &ElementRef::new(source, decl.id))
        .ok_or_else(|| env.missing(source, format!("class {}", decl.name)))?;
    let class = env.module.class(id);
    let internal_name = class.internal_name.clone();
    let kind = class.kind;
    debug!(class = %internal_name, ?kind, "generating class");

    let is_interface = kind == ClassDescriptorKind::Interface;
    let mut super_class = if kind == ClassDescriptorKind::Enum {
        "java/lang/Enum".to_string()
    } else {
        OBJECT.to_string()
    };
    let mut super_id = None;
    let mut interfaces = Vec::new();
    for entry in &decl.supertypes {
        let Some(ty) = env.context.get(&TYPE, &ElementRef::new(source, entry.type_ref.id)) else {
            continue;
        };
        let TypeConstructor::Class(supertype) = &ty.constructor else {
            continue;
        };
        let name = env.types.class_internal_name(supertype);
        if is_interface || is_interface_ref(env, supertype, entry.constructor_call) {
            interfaces.push(name);
        } else {
            super_class = name;
            if let ClassRef::Source(super_source) = supertype {
                super_id = Some(*super_source);
            }
        }
    }

    let mut flags = access::PUBLIC;
    if is_interface {
        flags |= access::INTERFACE | access::ABSTRACT;
    } else {
        flags |= access::SUPER;
        if class.is_abstract {
            flags |= access::ABSTRACT;
        } else if !class.is_open {
            flags |= access::FINAL;
        }
        if kind == ClassDescriptorKind::Enum {
            flags |= access::ENUM;
        }
    }

    let mut writer = ClassWriter::new(flags, internal_name.clone(), super_class.clone());
    for interface in interfaces {
        writer.add_interface(interface);
    }
    writer.set_source_file(file_name(env, source));

    for &property in &class.properties {
        generate_property(env, &mut writer, property, false, is_interface);
    }

    if kind.is_singleton() {
        writer.add_field(
            access::PUBLIC | access::STATIC | access::FINAL,
            INSTANCE_FIELD,
            JvmType::object(&internal_name).descriptor(),
        );
        generate_static_initializer(env, &mut writer, &[], Some(id))?;
    }
    if kind == ClassDescriptorKind::Enum {
        generate_enum_entries(env, &mut writer, source, id)?;
    }
    if !is_interface {
        generate_constructor(env, &mut writer, source, decl, id, super_id)?;
    }

    for function in decl.functions() {
        generate_function(env, &mut writer, source, function, Some(id))?;
    }

    output.insert_class(&internal_name, writer.to_bytes()?);

    for nested in decl.nested_classes() {
        generate_class(env, source, nested, output)?;
    }
    if let Some(object) = &decl.class_object {
        generate_class(env, source, object, output)?;
    }
    Ok(())
}

fn generate_enum_entries(
    env: Env<'_>,
    writer: &mut ClassWriter,
    source: SourceId,
    id: ClassId,
) -> Result<(), CodegenError> {
    let class = env.module.class(id);
    if !class.constructor_parameters.is_empty() {
        return Err(env.unsupported(source, format!("enum class {} with constructor parameters", class.fq_name)));
    }
    let owner = class.internal_name.clone();
    let ty = JvmType::object(&owner);
    let mut code = Code::new();
    for (ordinal, entry) in class.enum_entries.iter().enumerate() {
        writer.add_field(
            access::PUBLIC | access::STATIC | access::FINAL | access::ENUM,
            entry.as_str(),
            ty.descriptor(),
        );
        code.new_object(writer.pool(), &owner);
        code.dup();
        code.push_string(writer.pool(), entry.as_str());
        code.push_int(writer.pool(), ordinal as i32);
        code.invoke_special(writer.pool(), &owner, "<init>", "(Ljava/lang/String;I)V");
        code.put_static(writer.pool(), &owner, entry.as_str(), &ty);
    }
    code.return_value(&JvmType::VOID);
    writer.add_method(access::STATIC, "<clinit>", "()V", Some(code));
    Ok(())
}

fn generate_constructor(
    env: Env<'_>,
    writer: &mut ClassWriter,
    source: SourceId,
    decl: &ClassDecl,
    id: ClassId,
    super_id: Option<ClassId>,
) -> Result<(), CodegenError> {
    let class = env.module.class(id);
    let owner = class.internal_name.clone();
    let super_class = writer.super_class().to_string();
    if let Some(super_id) = super_id {
        if !env.module.class(super_id).constructor_parameters.is_empty() {
            return Err(env.unsupported(
                source,
                format!("supertype constructor call with arguments in {}", class.fq_name),
            ));
        }
    }
    let is_enum = class.kind == ClassDescriptorKind::Enum;
    let (descriptor, flags) = if is_enum {
        ("(Ljava/lang/String;I)V".to_string(), access::PRIVATE)
    } else if class.kind.is_singleton() {
        (env.types.constructor_descriptor(class), access::PRIVATE)
    } else {
        (env.types.constructor_descriptor(class), access::PUBLIC)
    };

    let mut codegen = BodyCodegen::new(env, writer.pool(), source, owner.clone(), Some(id));
    codegen.code.load(&JvmType::OBJECT, 0);
    if is_enum {
        codegen.skip_slots(2);
        codegen.code.load(&JvmType::STRING, 1);
        codegen.code.load(&JvmType::INT, 2);
        codegen.code.invoke_special(codegen.pool, &super_class, "<init>", "(Ljava/lang/String;I)V");
    } else {
        codegen.code.invoke_special(codegen.pool, &super_class, "<init>", "()V");
    }

    for (parameter, value) in decl.constructor_parameters.iter().zip(&class.constructor_parameters) {
        let ty = env.types.parameter_type(value);
        let slot = codegen.declare_local(ElementRef::new(source, parameter.id), ty.clone());
        if parameter.property.is_some() {
            codegen.code.load(&JvmType::OBJECT, 0);
            codegen.code.load(&ty, slot);
            codegen.code.put_field(codegen.pool, &owner, parameter.name.as_str(), &ty);
        }
    }

    for property in decl.properties() {
        let Some(initializer) = &property.initializer else {
            continue;
        };
        let property_id = *env
            .context
            .get(&PROPERTY, &ElementRef::new(source, property.id))
            .ok_or_else(|| env.missing(source, format!("property {}", property.name)))?;
        let ty = env.types.map_type(&env.module.property(property_id).ty);
        codegen.code.load(&JvmType::OBJECT, 0);
        let actual = codegen.gen_expr(initializer)?;
        codegen.coerce(&actual, &ty);
        codegen.code.put_field(codegen.pool, &owner, property.name.as_str(), &ty);
    }
    codegen.code.return_value(&JvmType::VOID);
    let code = codegen.finish();
    writer.add_method(flags, "<init>", descriptor, Some(code));
    Ok(())
}

// ── Bodies ──────────────────────────────────────────────────────────

/// Generates the instructions of one method body.
struct BodyCodegen<'a, 'w> {
    env: Env<'a>,
    pool: &'w mut ConstantPool,
    code: Code,
    source: SourceId,
    /// Class the method is generated into
    owner: String,
    /// Class whose instance is in slot 0, for instance methods
    this_class: Option<ClassId>,
    locals: FxHashMap<ElementRef, (u16, JvmType)>,
    next_slot: u16,
}

impl<'a, 'w> BodyCodegen<'a, 'w> {
    fn new(
        env: Env<'a>,
        pool: &'w mut ConstantPool,
        source: SourceId,
        owner: String,
        this_class: Option<ClassId>,
    ) -> Self {
        let next_slot = u16::from(this_class.is_some());
        let mut code = Code::new();
        code.reserve_locals(next_slot);
        Self {
            env,
            pool,
            code,
            source,
            owner,
            this_class,
            locals: FxHashMap::default(),
            next_slot,
        }
    }

    fn finish(self) -> Code {
        self.code
    }

    fn skip_slots(&mut self, slots: u16) {
        self.next_slot += slots;
        self.code.reserve_locals(self.next_slot);
    }

    fn declare_local(&mut self, element: ElementRef, ty: JvmType) -> u16 {
        let slot = self.next_slot;
        self.skip_slots(ty.size());
        self.locals.insert(element, (slot, ty));
        slot
    }

    fn reference(&self, node: NodeId, what: &str) -> Result<&'a ReferenceTarget, CodegenError> {
        self.env
            .context
            .get(&REFERENCE_TARGET, &ElementRef::new(self.source, node))
            .ok_or_else(|| self.env.missing(self.source, what.to_string()))
    }

    fn local(&self, element: &ElementRef) -> Result<(u16, JvmType), CodegenError> {
        self.locals
            .get(element)
            .cloned()
            .ok_or_else(|| self.env.missing(self.source, "local variable slot"))
    }

    /// Returns whether the block ended in a `return`.
    fn gen_block(&mut self, statements: &[Statement], return_type: &JvmType) -> Result<bool, CodegenError> {
        for statement in statements {
            if self.gen_statement(statement, return_type)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn gen_statement(&mut self, statement: &Statement, return_type: &JvmType) -> Result<bool, CodegenError> {
        match statement {
            Statement::Local { id, name, value, .. } => {
                let element = ElementRef::new(self.source, *id);
                let ty = self
                    .env
                    .context
                    .get(&TYPE, &element)
                    .map(|ty| self.env.types.map_type(ty))
                    .ok_or_else(|| self.env.missing(self.source, format!("type of {}", name)))?;
                let actual = self.gen_expr(value)?;
                self.coerce(&actual, &ty);
                let slot = self.declare_local(element, ty.clone());
                self.code.store(&ty, slot);
                Ok(false)
            }
            Statement::Assign { id, target, value, .. } => {
                match self.reference(*id, target.as_str())? {
                    ReferenceTarget::Local(element) | ReferenceTarget::Parameter(element) => {
                        let (slot, ty) = self.local(element)?;
                        let actual = self.gen_expr(value)?;
                        self.coerce(&actual, &ty);
                        self.code.store(&ty, slot);
                    }
                    ReferenceTarget::Property(property) => self.gen_property_store(*property, value)?,
                    other => {
                        return Err(self.env.unsupported(self.source, format!("assignment to {:?}", other)));
                    }
                }
                Ok(false)
            }
            Statement::Return { value, .. } => {
                match value {
                    Some(value) => {
                        let actual = self.gen_expr(value)?;
                        self.coerce(&actual, return_type);
                    }
                    None => self.push_default(return_type),
                }
                self.code.return_value(return_type);
                Ok(true)
            }
            Statement::Expr(expr) => {
                let ty = self.gen_expr(expr)?;
                self.code.pop(&ty);
                Ok(false)
            }
        }
    }

    /// Push the value of `expr`; returns its JVM type (`VOID` if nothing was pushed).
    fn gen_expr(&mut self, expr: &Expr) -> Result<JvmType, CodegenError> {
        match expr {
            Expr::StringLit { value, .. } => {
                self.code.push_string(self.pool, value);
                Ok(JvmType::STRING)
            }
            Expr::IntLit { id, value, .. } => {
                let recorded = self.env.context.get(&TYPE, &ElementRef::new(self.source, *id));
                let builtin = match recorded.map(|ty| &ty.constructor) {
                    Some(TypeConstructor::Builtin(builtin)) => *builtin,
                    _ => BuiltinType::Int,
                };
                match builtin {
                    BuiltinType::Long => {
                        self.code.push_long(self.pool, *value);
                        Ok(JvmType::LONG)
                    }
                    BuiltinType::Short => {
                        self.code.push_int(self.pool, *value as i32);
                        Ok(JvmType::SHORT)
                    }
                    BuiltinType::Byte => {
                        self.code.push_int(self.pool, *value as i32);
                        Ok(JvmType::BYTE)
                    }
                    _ => {
                        self.code.push_int(self.pool, *value as i32);
                        Ok(JvmType::INT)
                    }
                }
            }
            Expr::BoolLit { value, .. } => {
                self.code.push_int(self.pool, i32::from(*value));
                Ok(JvmType::BOOLEAN)
            }
            Expr::Null { .. } => {
                self.code.push_null();
                Ok(JvmType::OBJECT)
            }
            Expr::Name { id, name, .. } => match self.reference(*id, name.as_str())? {
                ReferenceTarget::Local(element) | ReferenceTarget::Parameter(element) => {
                    let (slot, ty) = self.local(element)?;
                    self.code.load(&ty, slot);
                    Ok(ty)
                }
                ReferenceTarget::Property(property) => self.gen_property_load(*property),
                ReferenceTarget::Class(ClassRef::Source(class)) => {
                    let internal_name = self.env.module.class(*class).internal_name.clone();
                    let ty = JvmType::object(&internal_name);
                    self.code.get_static(self.pool, &internal_name, INSTANCE_FIELD, &ty);
                    Ok(ty)
                }
                other => Err(self.env.unsupported(self.source, format!("reference to {:?}", other))),
            },
            Expr::Call {
                id, callee, arguments, ..
            } => match self.reference(*id, callee.as_str())? {
                ReferenceTarget::Builtin(BuiltinFunction::Println) => self.gen_print("println", arguments),
                ReferenceTarget::Builtin(BuiltinFunction::Print) => self.gen_print("print", arguments),
                ReferenceTarget::Function(function) => self.gen_function_call(*function, arguments),
                ReferenceTarget::Class(ClassRef::Source(class)) => self.gen_constructor_call(*class, arguments),
                other => Err(self.env.unsupported(self.source, format!("call of {:?}", other))),
            },
        }
    }

    fn gen_print(&mut self, method: &str, arguments: &[Expr]) -> Result<JvmType, CodegenError> {
        let stream = JvmType::object("java/io/PrintStream");
        self.code.get_static(self.pool, "java/lang/System", "out", &stream);
        let descriptor = match arguments.first() {
            None => "()V",
            Some(argument) => {
                let ty = self.gen_expr(argument)?;
                match ty.sort() {
                    Sort::Boolean => "(Z)V",
                    Sort::Char => "(C)V",
                    Sort::Byte | Sort::Short | Sort::Int => "(I)V",
                    Sort::Long => "(J)V",
                    Sort::Float => "(F)V",
                    Sort::Double => "(D)V",
                    Sort::Void => {
                        self.code.push_null();
                        "(Ljava/lang/Object;)V"
                    }
                    Sort::Object if ty == JvmType::STRING => "(Ljava/lang/String;)V",
                    Sort::Object | Sort::Array => "(Ljava/lang/Object;)V",
                }
            }
        };
        self.code.invoke_virtual(self.pool, "java/io/PrintStream", method, descriptor);
        Ok(JvmType::VOID)
    }

    fn gen_arguments(&mut self, parameters: &[ValueParameter], arguments: &[Expr]) -> Result<(), CodegenError> {
        let vararg = parameters.last().filter(|p| p.is_vararg);
        let fixed = if vararg.is_some() { parameters.len() - 1 } else { parameters.len() };
        for (parameter, argument) in parameters.iter().take(fixed).zip(arguments) {
            let expected = self.env.types.parameter_type(parameter);
            let actual = self.gen_expr(argument)?;
            self.coerce(&actual, &expected);
        }
        if let Some(vararg) = vararg {
            let array = self.env.types.parameter_type(vararg);
            let element = array.element().unwrap_or(JvmType::OBJECT);
            let rest = arguments.get(fixed..).unwrap_or_default();
            self.code.push_int(self.pool, rest.len() as i32);
            self.code.new_array(self.pool, &element);
            for (index, argument) in rest.iter().enumerate() {
                self.code.dup();
                self.code.push_int(self.pool, index as i32);
                let actual = self.gen_expr(argument)?;
                self.coerce(&actual, &element);
                self.code.array_store(&element);
            }
        }
        Ok(())
    }

    /// Push the receiver for a member of `class`.
    fn push_instance(&mut self, class: ClassId) -> Result<(), CodegenError> {
        let env = self.env;
        if self.this_class == Some(class) {
            self.code.load(&JvmType::OBJECT, 0);
            return Ok(());
        }
        let descriptor = env.module.class(class);
        if descriptor.kind.is_singleton() {
            let ty = JvmType::object(&descriptor.internal_name);
            self.code.get_static(self.pool, &descriptor.internal_name, INSTANCE_FIELD, &ty);
            return Ok(());
        }
        Err(env.unsupported(
            self.source,
            format!("member of {} used without a receiver", descriptor.fq_name),
        ))
    }

    fn gen_function_call(&mut self, function: FunctionId, arguments: &[Expr]) -> Result<JvmType, CodegenError> {
        let env = self.env;
        let descriptor = env.module.function(function);
        if descriptor.receiver.is_some() {
            return Err(env.unsupported(
                self.source,
                format!("call of extension function {} without a receiver", descriptor.name),
            ));
        }
        let jvm_descriptor = env.types.function_descriptor(descriptor);
        let return_type = env.types.return_type(descriptor);
        let owner = env.owner_of(&descriptor.container);
        let name = descriptor.name.as_str();

        if env.is_static_container(&descriptor.container) {
            self.gen_arguments(&descriptor.parameters, arguments)?;
            self.code.invoke_static(self.pool, &owner, name, &jvm_descriptor);
            return Ok(return_type);
        }
        if let Container::Class(class) = descriptor.container {
            self.push_instance(class)?;
        }
        self.gen_arguments(&descriptor.parameters, arguments)?;
        if env.is_interface(&descriptor.container) {
            self.code.invoke_interface(self.pool, &owner, name, &jvm_descriptor);
        } else {
            self.code.invoke_virtual(self.pool, &owner, name, &jvm_descriptor);
        }
        Ok(return_type)
    }

    fn gen_constructor_call(&mut self, class: ClassId, arguments: &[Expr]) -> Result<JvmType, CodegenError> {
        let env = self.env;
        let descriptor = env.module.class(class);
        let internal_name = descriptor.internal_name.clone();
        self.code.new_object(self.pool, &internal_name);
        self.code.dup();
        self.gen_arguments(&descriptor.constructor_parameters, arguments)?;
        let constructor = env.types.constructor_descriptor(descriptor);
        self.code.invoke_special(self.pool, &internal_name, "<init>", &constructor);
        Ok(JvmType::object(&internal_name))
    }

    fn gen_property_load(&mut self, property: PropertyId) -> Result<JvmType, CodegenError> {
        let env = self.env;
        let descriptor = env.module.property(property);
        let ty = env.types.map_type(&descriptor.ty);
        let owner = env.owner_of(&descriptor.container);
        let name = descriptor.name.as_str();
        let getter = method_descriptor([], &ty);

        if env.is_static_container(&descriptor.container) {
            if owner == self.owner {
                self.code.get_static(self.pool, &owner, name, &ty);
            } else {
                self.code.invoke_static(self.pool, &owner, &getter_name(name), &getter);
            }
            return Ok(ty);
        }
        if let Container::Class(class) = descriptor.container {
            self.push_instance(class)?;
            if self.this_class == Some(class) {
                self.code.get_field(self.pool, &owner, name, &ty);
            } else if env.is_interface(&descriptor.container) {
                self.code.invoke_interface(self.pool, &owner, &getter_name(name), &getter);
            } else {
                self.code.invoke_virtual(self.pool, &owner, &getter_name(name), &getter);
            }
        }
        Ok(ty)
    }

    fn gen_property_store(&mut self, property: PropertyId, value: &Expr) -> Result<(), CodegenError> {
        let env = self.env;
        let descriptor = env.module.property(property);
        let ty = env.types.map_type(&descriptor.ty);
        let owner = env.owner_of(&descriptor.container);
        let name = descriptor.name.as_str();
        let setter = method_descriptor([&ty], &JvmType::VOID);

        if env.is_static_container(&descriptor.container) {
            let actual = self.gen_expr(value)?;
            self.coerce(&actual, &ty);
            if owner == self.owner {
                self.code.put_static(self.pool, &owner, name, &ty);
            } else {
                self.code.invoke_static(self.pool, &owner, &setter_name(name), &setter);
            }
            return Ok(());
        }
        if let Container::Class(class) = descriptor.container {
            self.push_instance(class)?;
            let actual = self.gen_expr(value)?;
            self.coerce(&actual, &ty);
            if self.this_class == Some(class) {
                self.code.put_field(self.pool, &owner, name, &ty);
            } else if env.is_interface(&descriptor.container) {
                self.code.invoke_interface(self.pool, &owner, &setter_name(name), &setter);
            } else {
                self.code.invoke_virtual(self.pool, &owner, &setter_name(name), &setter);
            }
        }
        Ok(())
    }

    /// Push the zero value of `ty`.
    fn push_default(&mut self, ty: &JvmType) {
        match ty.sort() {
            Sort::Void => {}
            Sort::Long => self.code.push_long(self.pool, 0),
            Sort::Float => self.code.simple(opcodes::FCONST_0, 1),
            Sort::Double => self.code.simple(opcodes::DCONST_0, 2),
            Sort::Object | Sort::Array => self.code.push_null(),
            _ => self.code.push_int(self.pool, 0),
        }
    }

    /// Convert the value on the stack from `from` to `to`.
    fn coerce(&mut self, from: &JvmType, to: &JvmType) {
        if from == to {
            return;
        }
        match (from.sort(), to.sort()) {
            (_, Sort::Void) => self.code.pop(from),
            (Sort::Void, _) => self.push_default(to),
            _ if from.is_primitive() && to.is_primitive() => {
                match (from.is_int_like(), to.sort()) {
                    (true, Sort::Long) => self.code.simple(opcodes::I2L, 1),
                    (true, Sort::Short) => self.code.simple(opcodes::I2S, 0),
                    (true, Sort::Byte) => self.code.simple(opcodes::I2B, 0),
                    _ => {}
                }
            }
            _ if from.is_primitive() => {
                if let Some((class, _)) = box_class(from.sort()) {
                    let descriptor = format!("({}){}", from.descriptor(), JvmType::object(class).descriptor());
                    self.code.invoke_static(self.pool, class, "valueOf", &descriptor);
                    let boxed = JvmType::object(class);
                    if boxed != *to && *to != JvmType::OBJECT && to.internal_name() != Some("java/lang/Number") {
                        self.code.checkcast(self.pool, &to.class_operand());
                    }
                }
            }
            _ if to.is_primitive() => {
                if let Some((class, method)) = box_class(to.sort()) {
                    if from.internal_name() != Some(class) {
                        self.code.checkcast(self.pool, class);
                    }
                    let descriptor = format!("(){}", to.descriptor());
                    self.code.invoke_virtual(self.pool, class, method, &descriptor);
                }
            }
            _ => {
                if *from == JvmType::OBJECT && *to != JvmType::OBJECT {
                    self.code.checkcast(self.pool, &to.class_operand());
                }
            }
        }
    }
}
