//! Mapping of resolved types and declarations to JVM names and descriptors

use std::borrow::Cow;

use crate::name::FqName;
use crate::resolve::descriptors::{
    BuiltinType, ClassDescriptor, ClassRef, FunctionDescriptor, ModuleDescriptor, ResolvedType, TypeConstructor,
    ValueParameter,
};

/// Shape of a JVM type, from the first character of its descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sort {
    Void,
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Object,
    Array,
}

/// A JVM field type or `void`, held as its descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JvmType {
    descriptor: Cow<'static, str>,
}

impl JvmType {
    pub const VOID: JvmType = JvmType::primitive("V");
    pub const BOOLEAN: JvmType = JvmType::primitive("Z");
    pub const BYTE: JvmType = JvmType::primitive("B");
    pub const CHAR: JvmType = JvmType::primitive("C");
    pub const SHORT: JvmType = JvmType::primitive("S");
    pub const INT: JvmType = JvmType::primitive("I");
    pub const LONG: JvmType = JvmType::primitive("J");
    pub const FLOAT: JvmType = JvmType::primitive("F");
    pub const DOUBLE: JvmType = JvmType::primitive("D");
    pub const OBJECT: JvmType = JvmType::primitive("Ljava/lang/Object;");
    pub const STRING: JvmType = JvmType::primitive("Ljava/lang/String;");

    const fn primitive(descriptor: &'static str) -> Self {
        Self {
            descriptor: Cow::Borrowed(descriptor),
        }
    }

    pub fn object(internal_name: &str) -> Self {
        Self {
            descriptor: Cow::Owned(format!("L{};", internal_name)),
        }
    }

    pub fn array_of(element: &JvmType) -> Self {
        Self {
            descriptor: Cow::Owned(format!("[{}", element.descriptor)),
        }
    }

    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    pub fn sort(&self) -> Sort {
        match self.descriptor.as_bytes().first() {
            Some(b'V') => Sort::Void,
            Some(b'Z') => Sort::Boolean,
            Some(b'B') => Sort::Byte,
            Some(b'C') => Sort::Char,
            Some(b'S') => Sort::Short,
            Some(b'I') => Sort::Int,
            Some(b'J') => Sort::Long,
            Some(b'F') => Sort::Float,
            Some(b'D') => Sort::Double,
            Some(b'[') => Sort::Array,
            _ => Sort::Object,
        }
    }

    /// Local variable and operand stack slots.
    pub fn size(&self) -> u16 {
        match self.sort() {
            Sort::Void => 0,
            Sort::Long | Sort::Double => 2,
            _ => 1,
        }
    }

    pub fn is_primitive(&self) -> bool {
        !matches!(self.sort(), Sort::Void | Sort::Object | Sort::Array)
    }

    pub fn is_reference(&self) -> bool {
        matches!(self.sort(), Sort::Object | Sort::Array)
    }

    /// Whether the value is held in an `int` on the operand stack.
    pub fn is_int_like(&self) -> bool {
        matches!(self.sort(), Sort::Boolean | Sort::Byte | Sort::Char | Sort::Short | Sort::Int)
    }

    /// Internal name of an object type (`java/lang/String`).
    pub fn internal_name(&self) -> Option<&str> {
        self.descriptor.strip_prefix('L')?.strip_suffix(';')
    }

    /// Operand of `checkcast`/`anewarray`: internal name, or the descriptor of an array.
    pub fn class_operand(&self) -> String {
        match self.internal_name() {
            Some(name) => name.to_string(),
            None => self.descriptor.to_string(),
        }
    }

    /// Element type of an array type.
    pub fn element(&self) -> Option<JvmType> {
        self.descriptor.strip_prefix('[').map(|element| JvmType {
            descriptor: Cow::Owned(element.to_string()),
        })
    }
}

/// Wrapper class and unboxing method of a primitive.
pub fn box_class(sort: Sort) -> Option<(&'static str, &'static str)> {
    match sort {
        Sort::Boolean => Some(("java/lang/Boolean", "booleanValue")),
        Sort::Byte => Some(("java/lang/Byte", "byteValue")),
        Sort::Char => Some(("java/lang/Character", "charValue")),
        Sort::Short => Some(("java/lang/Short", "shortValue")),
        Sort::Int => Some(("java/lang/Integer", "intValue")),
        Sort::Long => Some(("java/lang/Long", "longValue")),
        Sort::Float => Some(("java/lang/Float", "floatValue")),
        Sort::Double => Some(("java/lang/Double", "doubleValue")),
        Sort::Void | Sort::Object | Sort::Array => None,
    }
}

pub fn method_descriptor<'t>(parameters: impl IntoIterator<Item = &'t JvmType>, result: &JvmType) -> String {
    let mut descriptor = String::from("(");
    for parameter in parameters {
        descriptor.push_str(parameter.descriptor());
    }
    descriptor.push(')');
    descriptor.push_str(result.descriptor());
    descriptor
}

/// Internal name of the class holding a package's top-level members.
///
/// `a.b` maps to `a/b/BPackage`; the root package to `_DefaultPackage`.
pub fn facade_internal_name(package: &FqName) -> String {
    if package.is_root() {
        return "_DefaultPackage".to_string();
    }
    format!("{}/{}Package", package.internal_name(), capitalize(package.short_name().as_str()))
}

pub fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

pub fn getter_name(property: &str) -> String {
    format!("get{}", capitalize(property))
}

pub fn setter_name(property: &str) -> String {
    format!("set{}", capitalize(property))
}

/// Dotted binary name for manifests and launchers (`a/b/C$D` → `a.b.C$D`).
pub fn binary_name(internal_name: &str) -> String {
    internal_name.replace('/', ".")
}

#[derive(Debug, Clone, Copy)]
pub struct TypeMapper<'a> {
    module: &'a ModuleDescriptor,
}

impl<'a> TypeMapper<'a> {
    pub fn new(module: &'a ModuleDescriptor) -> Self {
        Self { module }
    }

    pub fn class_internal_name(&self, class: &ClassRef) -> String {
        match class {
            ClassRef::Source(id) => self.module.class(*id).internal_name.clone(),
            ClassRef::External { internal_name, .. } => internal_name.clone(),
        }
    }

    /// JVM type of a value of `ty`.
    pub fn map_type(&self, ty: &ResolvedType) -> JvmType {
        match &ty.constructor {
            TypeConstructor::Builtin(builtin) => self.map_builtin(*builtin, &ty.arguments, ty.nullable),
            TypeConstructor::Class(class) => JvmType::object(&self.class_internal_name(class)),
            TypeConstructor::TypeParameter(_) | TypeConstructor::Error => JvmType::OBJECT,
        }
    }

    fn map_builtin(&self, builtin: BuiltinType, arguments: &[ResolvedType], nullable: bool) -> JvmType {
        let primitive = match builtin {
            BuiltinType::Boolean => JvmType::BOOLEAN,
            BuiltinType::Byte => JvmType::BYTE,
            BuiltinType::Short => JvmType::SHORT,
            BuiltinType::Char => JvmType::CHAR,
            BuiltinType::Int => JvmType::INT,
            BuiltinType::Long => JvmType::LONG,
            BuiltinType::Float => JvmType::FLOAT,
            BuiltinType::Double => JvmType::DOUBLE,
            BuiltinType::String => return JvmType::STRING,
            BuiltinType::Nothing => return JvmType::object("java/lang/Void"),
            BuiltinType::Unit | BuiltinType::Any => return JvmType::OBJECT,
            BuiltinType::Array => {
                let element = arguments
                    .first()
                    .map(|argument| self.boxed(argument))
                    .unwrap_or(JvmType::OBJECT);
                return JvmType::array_of(&element);
            }
        };
        if nullable {
            self.box_of(&primitive)
        } else {
            primitive
        }
    }

    /// Like [`map_type`](Self::map_type), with primitives boxed (generic positions).
    pub fn boxed(&self, ty: &ResolvedType) -> JvmType {
        let mapped = self.map_type(ty);
        self.box_of(&mapped)
    }

    fn box_of(&self, ty: &JvmType) -> JvmType {
        match box_class(ty.sort()) {
            Some((class, _)) => JvmType::object(class),
            None => ty.clone(),
        }
    }

    /// Return type of a method: `Unit` is `void`.
    pub fn return_type(&self, function: &FunctionDescriptor) -> JvmType {
        if function.return_type.is_unit() {
            JvmType::VOID
        } else {
            self.map_type(&function.return_type)
        }
    }

    /// `vararg x: T` is passed as `Array<T>`.
    pub fn parameter_type(&self, parameter: &ValueParameter) -> JvmType {
        if parameter.is_vararg {
            self.map_type(&ResolvedType::array_of(parameter.ty.clone()))
        } else {
            self.map_type(&parameter.ty)
        }
    }

    /// Method descriptor; an extension receiver is the first parameter.
    pub fn function_descriptor(&self, function: &FunctionDescriptor) -> String {
        let mut parameters: Vec<JvmType> = function.receiver.iter().map(|r| self.map_type(r)).collect();
        parameters.extend(function.parameters.iter().map(|p| self.parameter_type(p)));
        method_descriptor(&parameters, &self.return_type(function))
    }

    pub fn constructor_descriptor(&self, class: &ClassDescriptor) -> String {
        let parameters: Vec<JvmType> = class
            .constructor_parameters
            .iter()
            .map(|p| self.parameter_type(p))
            .collect();
        method_descriptor(&parameters, &JvmType::VOID)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::Name;

    #[test]
    fn test_builtin_mapping() {
        let module = ModuleDescriptor::new("test");
        let mapper = TypeMapper::new(&module);
        assert_eq!(mapper.map_type(&ResolvedType::int()).descriptor(), "I");
        assert_eq!(mapper.map_type(&ResolvedType::int().with_nullable(true)).descriptor(), "Ljava/lang/Integer;");
        assert_eq!(mapper.map_type(&ResolvedType::string()).descriptor(), "Ljava/lang/String;");
        assert_eq!(
            mapper.map_type(&ResolvedType::array_of(ResolvedType::string())).descriptor(),
            "[Ljava/lang/String;"
        );
        assert_eq!(
            mapper.map_type(&ResolvedType::array_of(ResolvedType::int())).descriptor(),
            "[Ljava/lang/Integer;"
        );
        assert_eq!(mapper.map_type(&ResolvedType::error()), JvmType::OBJECT);
    }

    #[test]
    fn test_jvm_type_shape() {
        assert_eq!(JvmType::LONG.size(), 2);
        assert_eq!(JvmType::VOID.size(), 0);
        assert_eq!(JvmType::STRING.internal_name(), Some("java/lang/String"));
        let array = JvmType::array_of(&JvmType::STRING);
        assert_eq!(array.class_operand(), "[Ljava/lang/String;");
        assert_eq!(array.element(), Some(JvmType::STRING));
    }

    #[test]
    fn test_facade_names() {
        assert_eq!(facade_internal_name(&FqName::root()), "_DefaultPackage");
        assert_eq!(facade_internal_name(&FqName::new("foo.bar")), "foo/bar/BarPackage");
        assert_eq!(binary_name("foo/bar/BarPackage"), "foo.bar.BarPackage");
        assert_eq!(getter_name("count"), "getCount");
        assert_eq!(capitalize(Name::identifier("x").as_str()), "X");
    }

    #[test]
    fn test_method_descriptor() {
        let parameters = [JvmType::INT, JvmType::array_of(&JvmType::STRING)];
        assert_eq!(method_descriptor(&parameters, &JvmType::VOID), "(I[Ljava/lang/String;)V");
    }
}
