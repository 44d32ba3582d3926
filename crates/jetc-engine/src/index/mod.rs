//! Name indices over sources and the classpath

pub mod package_index;
pub mod classpath;

pub use package_index::PackageIndex;
pub use classpath::{jdk_class_roots, ClassOrigin, ClasspathError, ClasspathIndex};
