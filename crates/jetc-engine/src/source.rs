//! The set of source files taking part in one compilation

use std::path::Path;
use std::sync::Arc;

use crate::parser::ast::{NodeId, SourceUnit};
use crate::parser::java::JavaSourceFile;

/// Index of a file within a [`SourceSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(pub u32);

/// A syntax node in some source file. Keys most trace slices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementRef {
    pub source: SourceId,
    pub node: NodeId,
}

impl ElementRef {
    pub fn new(source: SourceId, node: NodeId) -> Self {
        Self { source, node }
    }
}

/// A parsed source file.
#[derive(Debug, Clone)]
pub enum SourceFile {
    Kotlin(Arc<SourceUnit>),
    Java(Arc<JavaSourceFile>),
}

impl SourceFile {
    pub fn path(&self) -> &Path {
        match self {
            SourceFile::Kotlin(unit) => &unit.path,
            SourceFile::Java(file) => &file.path,
        }
    }

    pub fn as_kotlin(&self) -> Option<&Arc<SourceUnit>> {
        match self {
            SourceFile::Kotlin(unit) => Some(unit),
            SourceFile::Java(_) => None,
        }
    }

    pub fn as_java(&self) -> Option<&Arc<JavaSourceFile>> {
        match self {
            SourceFile::Java(file) => Some(file),
            SourceFile::Kotlin(_) => None,
        }
    }
}

/// All parsed files of a compilation, addressed by [`SourceId`].
#[derive(Debug, Clone, Default)]
pub struct SourceSet {
    files: Vec<SourceFile>,
}

impl SourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file, returning its id. A path already present keeps its first id.
    pub fn add(&mut self, file: SourceFile) -> SourceId {
        if let Some(id) = self.find_by_path(file.path()) {
            return id;
        }
        let id = SourceId(self.files.len() as u32);
        self.files.push(file);
        id
    }

    pub fn get(&self, id: SourceId) -> Option<&SourceFile> {
        self.files.get(id.0 as usize)
    }

    pub fn kotlin(&self, id: SourceId) -> Option<&Arc<SourceUnit>> {
        self.get(id).and_then(SourceFile::as_kotlin)
    }

    pub fn find_by_path(&self, path: &Path) -> Option<SourceId> {
        self.files
            .iter()
            .position(|file| file.path() == path)
            .map(|index| SourceId(index as u32))
    }

    pub fn iter(&self) -> impl Iterator<Item = (SourceId, &SourceFile)> {
        self.files
            .iter()
            .enumerate()
            .map(|(index, file)| (SourceId(index as u32), file))
    }

    /// Kotlin units in insertion order.
    pub fn kotlin_units(&self) -> impl Iterator<Item = (SourceId, &Arc<SourceUnit>)> {
        self.iter().filter_map(|(id, file)| file.as_kotlin().map(|unit| (id, unit)))
    }

    /// Java headers in insertion order.
    pub fn java_files(&self) -> impl Iterator<Item = (SourceId, &Arc<JavaSourceFile>)> {
        self.iter().filter_map(|(id, file)| file.as_java().map(|java| (id, java)))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
