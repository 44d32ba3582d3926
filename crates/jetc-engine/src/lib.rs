//! Jetc Compiler Engine
//!
//! This crate holds everything between source text and class files:
//! - **Frontend**: Lexer and parser for the Kotlin subset, Java header scanner (`parser` module)
//! - **Indices**: Package index over sources, classpath index over jars and directories (`index` module)
//! - **Modules**: Module and chunk model (`module` module)
//! - **Analysis**: Binding trace, descriptors and the top-down analyzer (`resolve` module)
//! - **Light classes**: Kotlin declarations as seen from Java resolution (`light_classes` module)
//! - **Codegen**: JVM class file generation (`codegen` module)
//!
//! # Example
//!
//! ```rust,ignore
//! use jetc_engine::{analyze, generate, parse_source, ClasspathIndex, FilteringTrace, ModuleDescriptor, PackageIndex, SourceFile, SourceSet};
//!
//! let unit = parse_source("fun main(args: Array<String>) { println(\"hi\") }\n", "/src/hello.kt")?;
//! let mut sources = SourceSet::new();
//! let file = sources.add(SourceFile::Kotlin(unit.into()));
//!
//! let mut trace = FilteringTrace::new();
//! let mut module = ModuleDescriptor::new("main");
//! analyze(&sources, &ClasspathIndex::default(), &PackageIndex::for_sources(&sources), &mut trace, &mut module);
//!
//! let output = generate(trace.binding_context(), &module, &sources, &[file])?;
//! assert_eq!(output.main_class(), Some("_DefaultPackage"));
//! ```

#![warn(rust_2018_idioms)]
#![allow(clippy::new_without_default)]

// ============================================================================
// Core Modules
// ============================================================================

/// Simple and fully-qualified names
pub mod name;

/// Frontend: lexer, parser, Java header scanner
pub mod parser;

/// Parsed files of one compilation
pub mod source;

/// Package index and classpath index
pub mod index;

/// Module and chunk model
pub mod module;

/// Binding trace, descriptors and analysis
pub mod resolve;

/// Class lookups for Java-side resolution
pub mod light_classes;

/// JVM code generation
pub mod codegen;

// ============================================================================
// Re-exports
// ============================================================================

pub use name::{FqName, Name};
pub use parser::{parse_source, scan_java_source, JavaSourceFile, ParseError, SourceUnit, Span};
pub use source::{ElementRef, SourceFile, SourceId, SourceSet};
pub use index::{jdk_class_roots, ClasspathError, ClasspathIndex, PackageIndex};
pub use module::{Module, ModuleBuilder, ModuleChunk, ProjectBuilder};
pub use resolve::{
    analyze, BindingContext, BindingTrace, Diagnostic, DiagnosticCode, DiagnosticCollector, FilteringTrace,
    MessageCollector, ModuleDescriptor, SemanticTrace, Severity,
};
pub use light_classes::{LightClassBridge, SearchScope};
pub use codegen::{generate, CodegenError, GeneratedOutput};
