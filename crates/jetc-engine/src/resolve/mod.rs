//! Semantic analysis
//!
//! Analysis writes everything it learns into a [`BindingTrace`] keyed by
//! typed slices, and builds a [`ModuleDescriptor`] of the declarations it
//! resolved. Code generation and the light-class bridge read both.

pub mod diagnostics;
pub mod descriptors;
pub mod slices;
pub mod scope;
pub mod trace;
pub mod builtins;
pub mod analyzer;

pub use analyzer::{analyze, script_class_name, TopDownAnalyzer};
pub use descriptors::{
    BuiltinType, ClassDescriptor, ClassDescriptorKind, ClassId, ClassRef, Container, FunctionDescriptor, FunctionId,
    ModuleDescriptor, PropertyDescriptor, PropertyId, ResolvedType, TypeConstructor,
};
pub use diagnostics::{Diagnostic, DiagnosticCode, DiagnosticCollector, Location, MessageCollector, Severity};
pub use trace::{BindingContext, BindingTrace, FilteringTrace, SemanticTrace};
