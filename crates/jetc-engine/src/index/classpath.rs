//! Classes available on the compilation classpath
//!
//! Only class names are indexed: analysis of the subset needs to know that
//! `java.util.List` exists, not what it contains.

use std::ffi::OsStr;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::name::{FqName, Name};

/// Errors while reading a classpath root.
#[derive(Debug, Error)]
pub enum ClasspathError {
    #[error("classpath entry {path} does not exist")]
    Missing { path: PathBuf },

    #[error("I/O error while scanning {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("ZIP error while scanning {path}: {source}")]
    Zip {
        path: PathBuf,
        #[source]
        source: ZipError,
    },
}

/// Where a classpath class was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassOrigin {
    /// Directory or archive root
    pub root: PathBuf,
    /// Internal name (`java/lang/String`)
    pub internal_name: String,
}

/// Index of class names across classpath directories and archives.
#[derive(Debug, Default)]
pub struct ClasspathIndex {
    classes: FxHashMap<FqName, ClassOrigin>,
    packages: FxHashSet<FqName>,
    roots: Vec<PathBuf>,
}

impl ClasspathIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every root, collecting per-root failures instead of aborting.
    pub fn build<'a>(roots: impl IntoIterator<Item = &'a PathBuf>) -> (Self, Vec<ClasspathError>) {
        let mut index = ClasspathIndex::new();
        let mut errors = Vec::new();
        for root in roots {
            if let Err(error) = index.add_root(root) {
                warn!(root = %root.display(), %error, "skipping classpath entry");
                errors.push(error);
            }
        }
        (index, errors)
    }

    /// Add a directory, `.jar`/`.zip` archive or `.jmod`.
    pub fn add_root(&mut self, root: &Path) -> Result<(), ClasspathError> {
        if !root.exists() {
            return Err(ClasspathError::Missing { path: root.to_path_buf() });
        }
        let before = self.classes.len();
        if root.is_dir() {
            self.scan_directory(root)?;
        } else if is_archive(root) {
            self.scan_archive(root)?;
        }
        self.roots.push(root.to_path_buf());
        debug!(root = %root.display(), classes = self.classes.len() - before, "indexed classpath root");
        Ok(())
    }

    fn scan_directory(&mut self, root: &Path) -> Result<(), ClasspathError> {
        for entry in WalkDir::new(root).follow_links(true) {
            let entry = entry.map_err(|error| ClasspathError::Io {
                path: root.to_path_buf(),
                source: error.into(),
            })?;
            let path = entry.path();
            if !entry.file_type().is_file() || path.extension().and_then(OsStr::to_str) != Some("class") {
                continue;
            }
            let Ok(relative) = path.strip_prefix(root) else {
                continue;
            };
            let relative = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            self.register_entry(root, &relative);
        }
        Ok(())
    }

    fn scan_archive(&mut self, path: &Path) -> Result<(), ClasspathError> {
        let file = File::open(path).map_err(|source| ClasspathError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut archive = ZipArchive::new(BufReader::new(file)).map_err(|source| ClasspathError::Zip {
            path: path.to_path_buf(),
            source,
        })?;

        for idx in 0..archive.len() {
            let entry = archive.by_index(idx).map_err(|source| ClasspathError::Zip {
                path: path.to_path_buf(),
                source,
            })?;
            if !entry.is_file() {
                continue;
            }
            let name = entry.name().to_string();
            // jmod class entries live under `classes/`
            let name = name.strip_prefix("classes/").unwrap_or(&name);
            if name.starts_with("META-INF/") {
                continue;
            }
            self.register_entry(path, name);
        }
        Ok(())
    }

    fn register_entry(&mut self, root: &Path, entry: &str) {
        let Some(internal_name) = entry.strip_suffix(".class") else {
            return;
        };
        if internal_name.ends_with("module-info") || internal_name.ends_with("package-info") {
            return;
        }
        let fq_name = FqName::new(&internal_name.replace(['/', '$'], "."));
        if fq_name.is_root() {
            return;
        }
        let mut package = FqName::new(&internal_name.rsplit_once('/').map(|(p, _)| p.replace('/', ".")).unwrap_or_default());
        loop {
            if !self.packages.insert(package.clone()) {
                break;
            }
            match package.parent() {
                Some(parent) => package = parent,
                None => break,
            }
        }
        // First root wins, as on a JVM classpath
        self.classes.entry(fq_name).or_insert_with(|| ClassOrigin {
            root: root.to_path_buf(),
            internal_name: internal_name.to_string(),
        });
    }

    pub fn contains_class(&self, fq_name: &FqName) -> bool {
        self.classes.contains_key(fq_name)
    }

    pub fn find_class(&self, fq_name: &FqName) -> Option<&ClassOrigin> {
        self.classes.get(fq_name)
    }

    pub fn package_exists(&self, package: &FqName) -> bool {
        self.packages.contains(package)
    }

    /// Class `short_name` in `package`, if indexed.
    pub fn find_in_package(&self, package: &FqName, short_name: &Name) -> Option<FqName> {
        let candidate = package.child(short_name);
        self.contains_class(&candidate).then_some(candidate)
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

/// Class roots of a JDK installation: `jmods/*.jmod` on modular JDKs,
/// otherwise `rt.jar`.
pub fn jdk_class_roots(jdk_home: &Path) -> Vec<PathBuf> {
    let jmods = jdk_home.join("jmods");
    if jmods.is_dir() {
        let mut roots: Vec<PathBuf> = WalkDir::new(&jmods)
            .max_depth(1)
            .into_iter()
            .filter_map(Result::ok)
            .map(|entry| entry.into_path())
            .filter(|path| path.extension().and_then(OsStr::to_str) == Some("jmod"))
            .collect();
        roots.sort();
        return roots;
    }
    ["jre/lib/rt.jar", "lib/rt.jar"]
        .iter()
        .map(|relative| jdk_home.join(relative))
        .filter(|path| path.is_file())
        .take(1)
        .collect()
}

fn is_archive(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .map(|ext| ["jar", "zip", "jmod"].iter().any(|v| ext.eq_ignore_ascii_case(v)))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    #[test]
    fn test_directory_root() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("com/example")).unwrap();
        fs::write(temp.path().join("com/example/Widget.class"), b"\xCA\xFE\xBA\xBE").unwrap();
        fs::write(temp.path().join("com/example/Widget$Part.class"), b"\xCA\xFE\xBA\xBE").unwrap();

        let mut index = ClasspathIndex::new();
        index.add_root(temp.path()).unwrap();
        assert!(index.contains_class(&FqName::new("com.example.Widget")));
        assert!(index.contains_class(&FqName::new("com.example.Widget.Part")));
        assert!(index.package_exists(&FqName::new("com")));
        assert_eq!(
            index.find_in_package(&FqName::new("com.example"), &Name::identifier("Widget")),
            Some(FqName::new("com.example.Widget"))
        );
    }

    #[test]
    fn test_jar_and_jmod_roots() {
        let temp = TempDir::new().unwrap();
        let jar = temp.path().join("lib.jar");
        let mut writer = ZipWriter::new(fs::File::create(&jar).unwrap());
        writer.start_file("META-INF/MANIFEST.MF", SimpleFileOptions::default()).unwrap();
        writer.write_all(b"Manifest-Version: 1.0\n").unwrap();
        writer.start_file("org/lib/Thing.class", SimpleFileOptions::default()).unwrap();
        writer.write_all(b"\xCA\xFE\xBA\xBE").unwrap();
        writer.finish().unwrap();

        let jmod = temp.path().join("java.base.jmod");
        let mut writer = ZipWriter::new(fs::File::create(&jmod).unwrap());
        writer.start_file("classes/java/lang/String.class", SimpleFileOptions::default()).unwrap();
        writer.write_all(b"\xCA\xFE\xBA\xBE").unwrap();
        writer.start_file("classes/module-info.class", SimpleFileOptions::default()).unwrap();
        writer.write_all(b"\xCA\xFE\xBA\xBE").unwrap();
        writer.finish().unwrap();

        let (index, errors) = ClasspathIndex::build(&[jar, jmod]);
        assert!(errors.is_empty());
        assert!(index.contains_class(&FqName::new("org.lib.Thing")));
        assert!(index.contains_class(&FqName::new("java.lang.String")));
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_missing_root_is_reported() {
        let (index, errors) = ClasspathIndex::build(&[PathBuf::from("/definitely/not/here.jar")]);
        assert!(index.is_empty());
        assert!(matches!(errors[0], ClasspathError::Missing { .. }));
    }

    #[test]
    fn test_jdk_roots_prefer_jmods() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("jmods")).unwrap();
        fs::write(temp.path().join("jmods/java.base.jmod"), b"").unwrap();
        fs::create_dir_all(temp.path().join("lib")).unwrap();
        fs::write(temp.path().join("lib/rt.jar"), b"").unwrap();
        assert_eq!(jdk_class_roots(temp.path()), vec![temp.path().join("jmods/java.base.jmod")]);
    }
}
