//! JVM code generation
//!
//! Reads the binding trace and module descriptor produced by analysis and
//! writes class files. Generation only runs on error-free analysis results;
//! anything it cannot express is a [`CodegenError`].

use std::path::PathBuf;

use thiserror::Error;

pub mod classfile;
pub mod type_mapper;
pub mod main_detector;
pub mod generator;

pub use generator::{generate, GeneratedOutput};
pub use main_detector::{find_main_class, is_main_function};
pub use type_mapper::{facade_internal_name, JvmType, TypeMapper};

#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("{}: cannot generate code for {what}", file.display())]
    Unsupported { what: String, file: PathBuf },

    /// Analysis left no record for a node codegen needs
    #[error("{}: no binding for {what}", file.display())]
    MissingBinding { what: String, file: PathBuf },

    #[error("constant pool of {class} exceeds 65535 entries")]
    ConstantPoolOverflow { class: String },

    /// A string or name whose modified UTF-8 form does not fit a `u16` length
    #[error("constant of {length} bytes in {class} exceeds the 65535 byte limit")]
    ConstantTooLong { class: String, length: usize },

    #[error("method {class}.{method} exceeds 65535 bytes of code")]
    MethodTooLarge { class: String, method: String },

    #[error("duplicate method {class}.{name}{descriptor}")]
    DuplicateMethod {
        class: String,
        name: String,
        descriptor: String,
    },
}
