//! Typed slices of the binding trace
//!
//! A slice names one logical map inside the trace and fixes its key and
//! value types. Boolean slices store `bool` and miss as `false`.

use std::marker::PhantomData;

use crate::name::{FqName, Name};
use crate::parser::java::JavaClassStub;
use crate::source::{ElementRef, SourceId};
use super::descriptors::{ClassId, ClassRef, FunctionId, PropertyId, ResolvedType};
use super::scope::LexicalScope;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceKind {
    Regular,
    /// Lexical scopes; only navigation needs them
    ResolutionScope,
}

/// A typed trace slice.
pub struct Slice<K, V> {
    pub name: &'static str,
    pub kind: SliceKind,
    _marker: PhantomData<fn(K) -> V>,
}

impl<K, V> Slice<K, V> {
    pub const fn new(name: &'static str, kind: SliceKind) -> Self {
        Self {
            name,
            kind,
            _marker: PhantomData,
        }
    }
}

pub type BooleanSlice<K> = Slice<K, bool>;

/// What a name or call resolved to.
#[derive(Debug, Clone, PartialEq)]
pub enum ReferenceTarget {
    /// A local `val`/`var`, by its declaring statement
    Local(ElementRef),
    Parameter(ElementRef),
    Function(FunctionId),
    Property(PropertyId),
    /// Constructor call or object reference
    Class(ClassRef),
    Builtin(BuiltinFunction),
    /// A property of the `module { }` builder receiver
    Dsl(DslProperty),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinFunction {
    Print,
    Println,
    /// `kotlin.modules.module(name) { … }`
    Module,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DslProperty {
    Sources,
    Classpath,
    AnnotationsPath,
    OutputDir,
}

impl DslProperty {
    pub fn from_name(name: &Name) -> Option<Self> {
        match name.as_str() {
            "sources" => Some(DslProperty::Sources),
            "classpath" => Some(DslProperty::Classpath),
            "annotationsPath" => Some(DslProperty::AnnotationsPath),
            "outputDir" => Some(DslProperty::OutputDir),
            _ => None,
        }
    }

    /// List properties take `+=`; `outputDir` takes `=`.
    pub fn is_list(&self) -> bool {
        !matches!(self, DslProperty::OutputDir)
    }
}

/// A Java source class and its supertypes as resolved by analysis.
#[derive(Debug, Clone)]
pub struct JavaClassEntry {
    pub source: SourceId,
    pub stub: JavaClassStub,
    pub supertypes: Vec<ClassRef>,
}

impl JavaClassEntry {
    pub fn internal_name(&self) -> String {
        self.stub.fq_name.internal_name()
    }
}

pub const CLASS: Slice<FqName, ClassId> = Slice::new("CLASS", SliceKind::Regular);
pub const CLASS_DECLARATION: Slice<ElementRef, ClassId> = Slice::new("CLASS_DECLARATION", SliceKind::Regular);
pub const FUNCTION: Slice<ElementRef, FunctionId> = Slice::new("FUNCTION", SliceKind::Regular);
pub const PROPERTY: Slice<ElementRef, PropertyId> = Slice::new("PROPERTY", SliceKind::Regular);
pub const PACKAGE_TO_FILES: Slice<FqName, Vec<SourceId>> = Slice::new("PACKAGE_TO_FILES", SliceKind::Regular);
pub const FILE_TO_PACKAGE: Slice<SourceId, FqName> = Slice::new("FILE_TO_PACKAGE", SliceKind::Regular);
pub const TYPE: Slice<ElementRef, ResolvedType> = Slice::new("TYPE", SliceKind::Regular);
pub const REFERENCE_TARGET: Slice<ElementRef, ReferenceTarget> = Slice::new("REFERENCE_TARGET", SliceKind::Regular);
pub const RESOLUTION_SCOPE: Slice<ElementRef, LexicalScope> =
    Slice::new("RESOLUTION_SCOPE", SliceKind::ResolutionScope);
pub const JAVA_CLASS: Slice<FqName, JavaClassEntry> = Slice::new("JAVA_CLASS", SliceKind::Regular);
pub const BODY_RESOLVED: BooleanSlice<ElementRef> = Slice::new("BODY_RESOLVED", SliceKind::Regular);
pub const IS_SCRIPT: BooleanSlice<SourceId> = Slice::new("IS_SCRIPT", SliceKind::Regular);
