//! Module and chunk model

pub mod chunk;
pub mod builder;

pub use chunk::{canonicalize, Module, ModuleChunk, SourceConflict};
pub use builder::{ModuleBuilder, ProjectBuilder};
