//! Frontend for the Kotlin subset and Java headers.
//!
//! # Example
//!
//! ```ignore
//! use jetc_engine::parser::parse_source;
//!
//! let unit = parse_source("package demo\n\nfun main(args: Array<String>) {}\n", "/src/main.kt")?;
//! assert_eq!(unit.package.as_str(), "demo");
//! ```

pub mod token;
pub mod lexer;
pub mod ast;
pub mod parser;
pub mod java;

// Re-exports for convenience
pub use token::{Token, Span};
pub use lexer::{Lexer, LexError};
pub use parser::{parse_source, Parser, ParseError};
pub use java::{scan_java_source, JavaClassKind, JavaClassStub, JavaSourceFile};
pub use ast::SourceUnit;
