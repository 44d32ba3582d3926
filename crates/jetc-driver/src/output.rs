//! Writing generated class files to a directory or a jar

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use jetc_engine::GeneratedOutput;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::CompileEnvironmentError;

pub const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

/// Manifest text for a jar with an optional entry point.
pub fn manifest(main_class: Option<&str>) -> String {
    let mut text = String::from("Manifest-Version: 1.0\r\nCreated-By: JetBrains Kotlin\r\n");
    if let Some(main_class) = main_class {
        text.push_str(&format!("Main-Class: {}\r\n", main_class));
    }
    text.push_str("\r\n");
    text
}

/// Write every generated file under `dir`, creating directories as needed.
///
/// On failure the files and directories created so far are removed again.
pub fn write_to_directory(output: &GeneratedOutput, dir: &Path) -> Result<(), CompileEnvironmentError> {
    let mut transaction = OutputTransaction::new();
    match transaction.write_directory(output, dir) {
        Ok(()) => Ok(()),
        Err(error) => {
            transaction.rollback();
            Err(error)
        }
    }
}

/// Write a jar: manifest, generated entries, then the runtime's classes if given.
///
/// The jar only appears at `jar` once it is complete.
pub fn write_to_jar(
    output: &GeneratedOutput,
    jar: &Path,
    runtime: Option<&Path>,
) -> Result<(), CompileEnvironmentError> {
    let mut transaction = OutputTransaction::new();
    match transaction.write_jar(output, jar, runtime) {
        Ok(()) => Ok(()),
        Err(error) => {
            transaction.rollback();
            Err(error)
        }
    }
}

/// Everything one compilation has put on disk, so a failed run can take it
/// back. Pre-existing files that were overwritten are not restored.
#[derive(Debug, Default)]
pub struct OutputTransaction {
    files: Vec<PathBuf>,
    /// Directories this transaction created, outermost first
    dirs: Vec<PathBuf>,
}

impl OutputTransaction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every file and directory written so far.
    pub fn rollback(self) {
        for file in self.files.iter().rev() {
            if let Err(error) = fs::remove_file(file) {
                warn!(file = %file.display(), %error, "could not remove partial output");
            }
        }
        for dir in self.dirs.iter().rev() {
            let _ = fs::remove_dir(dir);
        }
        debug!(files = self.files.len(), dirs = self.dirs.len(), "rolled back output");
    }

    fn create_dir_all(&mut self, dir: &Path) -> io::Result<()> {
        let missing: Vec<PathBuf> = dir
            .ancestors()
            .take_while(|path| !path.as_os_str().is_empty() && !path.exists())
            .map(Path::to_path_buf)
            .collect();
        fs::create_dir_all(dir)?;
        self.dirs.extend(missing.into_iter().rev());
        Ok(())
    }

    pub fn write_directory(&mut self, output: &GeneratedOutput, dir: &Path) -> Result<(), CompileEnvironmentError> {
        for (relative, bytes) in output.files() {
            let path = dir.join(relative);
            if let Some(parent) = path.parent() {
                self.create_dir_all(parent).map_err(|source| CompileEnvironmentError::Write {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            fs::write(&path, bytes).map_err(|source| CompileEnvironmentError::Write {
                path: path.clone(),
                source,
            })?;
            debug!(file = %path.display(), "wrote class file");
            self.files.push(path);
        }
        info!(dir = %dir.display(), classes = output.len(), "wrote output directory");
        Ok(())
    }

    pub fn write_jar(
        &mut self,
        output: &GeneratedOutput,
        jar: &Path,
        runtime: Option<&Path>,
    ) -> Result<(), CompileEnvironmentError> {
        let jar_error = |source: zip::result::ZipError| CompileEnvironmentError::Jar {
            path: jar.to_path_buf(),
            source,
        };
        let write_error = |source: io::Error| CompileEnvironmentError::Write {
            path: jar.to_path_buf(),
            source,
        };

        let parent = jar
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        self.create_dir_all(parent).map_err(write_error)?;
        // Dropping the temp file on an early return deletes it
        let staging = NamedTempFile::new_in(parent).map_err(write_error)?;
        let mut zip = ZipWriter::new(BufWriter::new(staging));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        zip.start_file(MANIFEST_PATH, options).map_err(jar_error)?;
        zip.write_all(manifest(output.main_class()).as_bytes()).map_err(write_error)?;

        for (relative, bytes) in output.files() {
            zip.start_file(relative, options).map_err(jar_error)?;
            zip.write_all(bytes).map_err(write_error)?;
        }

        let mut bundled = 0;
        if let Some(runtime) = runtime {
            bundled = if runtime.is_dir() {
                bundle_directory(&mut zip, runtime, options, output)?
            } else {
                bundle_jar(&mut zip, runtime, output).map_err(|error| match error {
                    BundleError::Io(source) => CompileEnvironmentError::Runtime {
                        path: runtime.to_path_buf(),
                        source,
                    },
                    BundleError::Zip(source) => jar_error(source),
                })?
            };
        }

        let staging = zip
            .finish()
            .map_err(jar_error)?
            .into_inner()
            .map_err(|error| write_error(error.into_error()))?;
        staging.persist(jar).map_err(|error| write_error(error.error))?;
        self.files.push(jar.to_path_buf());
        info!(
            jar = %jar.display(),
            classes = output.len(),
            runtime_classes = bundled,
            main_class = ?output.main_class(),
            "wrote jar"
        );
        Ok(())
    }
}

enum BundleError {
    Io(io::Error),
    Zip(zip::result::ZipError),
}

/// Copy every `.class` file under an unpacked runtime directory.
fn bundle_directory<W: Write + io::Seek>(
    zip: &mut ZipWriter<W>,
    runtime: &Path,
    options: SimpleFileOptions,
    output: &GeneratedOutput,
) -> Result<usize, CompileEnvironmentError> {
    let runtime_error = |source: io::Error| CompileEnvironmentError::Runtime {
        path: runtime.to_path_buf(),
        source,
    };
    let mut count = 0;
    for entry in WalkDir::new(runtime).sort_by_file_name() {
        let entry = entry.map_err(|error| runtime_error(error.into()))?;
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().and_then(|ext| ext.to_str()) != Some("class") {
            continue;
        }
        let Ok(relative) = path.strip_prefix(runtime) else {
            continue;
        };
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        if output.contains(&name) {
            continue;
        }
        zip.start_file(name.as_str(), options)
            .map_err(|source| CompileEnvironmentError::Jar {
                path: runtime.to_path_buf(),
                source,
            })?;
        let mut file = File::open(path).map_err(runtime_error)?;
        io::copy(&mut file, zip).map_err(runtime_error)?;
        count += 1;
    }
    Ok(count)
}

/// Re-stream every `.class` entry of a runtime jar.
fn bundle_jar<W: Write + io::Seek>(
    zip: &mut ZipWriter<W>,
    runtime: &Path,
    output: &GeneratedOutput,
) -> Result<usize, BundleError> {
    let file = File::open(runtime).map_err(BundleError::Io)?;
    let mut archive = ZipArchive::new(BufReader::new(file)).map_err(BundleError::Zip)?;
    let mut count = 0;
    for index in 0..archive.len() {
        let entry = archive.by_index_raw(index).map_err(BundleError::Zip)?;
        if !entry.is_file() || !entry.name().ends_with(".class") || output.contains(entry.name()) {
            continue;
        }
        zip.raw_copy_file(entry).map_err(BundleError::Zip)?;
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    fn sample_output(main_class: Option<&str>) -> GeneratedOutput {
        let mut output = GeneratedOutput::new();
        output.insert_class("a/b/C", vec![0xCA, 0xFE, 0xBA, 0xBE]);
        output.insert_class("_DefaultPackage", vec![0xCA, 0xFE, 0xBA, 0xBE, 1]);
        output.set_main_class(main_class.map(str::to_string));
        output
    }

    fn read_entry(jar: &Path, name: &str) -> Option<Vec<u8>> {
        let mut archive = ZipArchive::new(File::open(jar).unwrap()).unwrap();
        let mut entry = archive.by_name(name).ok()?;
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes).unwrap();
        Some(bytes)
    }

    #[test]
    fn test_manifest_text() {
        assert_eq!(
            manifest(Some("app.AppPackage")),
            "Manifest-Version: 1.0\r\nCreated-By: JetBrains Kotlin\r\nMain-Class: app.AppPackage\r\n\r\n"
        );
        assert!(!manifest(None).contains("Main-Class"));
    }

    #[test]
    fn test_directory_output() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("out");
        write_to_directory(&sample_output(None), &out).unwrap();

        assert_eq!(fs::read(out.join("a/b/C.class")).unwrap(), vec![0xCA, 0xFE, 0xBA, 0xBE]);
        assert!(out.join("_DefaultPackage.class").is_file());
    }

    #[test]
    fn test_jar_output_with_main_class() {
        let temp = TempDir::new().unwrap();
        let jar = temp.path().join("dist/app.jar");
        write_to_jar(&sample_output(Some("_DefaultPackage")), &jar, None).unwrap();

        let manifest = String::from_utf8(read_entry(&jar, MANIFEST_PATH).unwrap()).unwrap();
        assert!(manifest.contains("Main-Class: _DefaultPackage"));
        assert!(manifest.contains("Created-By: JetBrains Kotlin"));
        assert!(read_entry(&jar, "a/b/C.class").is_some());

        let archive = ZipArchive::new(File::open(&jar).unwrap()).unwrap();
        assert_eq!(archive.file_names().next(), Some(MANIFEST_PATH));
    }

    #[test]
    fn test_bundles_runtime_directory() {
        let temp = TempDir::new().unwrap();
        let runtime = temp.path().join("runtime");
        fs::create_dir_all(runtime.join("kotlin")).unwrap();
        fs::write(runtime.join("kotlin/Unit.class"), b"unit").unwrap();
        fs::write(runtime.join("kotlin/readme.txt"), b"skip").unwrap();

        let jar = temp.path().join("app.jar");
        write_to_jar(&sample_output(None), &jar, Some(&runtime)).unwrap();

        assert_eq!(read_entry(&jar, "kotlin/Unit.class"), Some(b"unit".to_vec()));
        assert!(read_entry(&jar, "kotlin/readme.txt").is_none());
    }

    #[test]
    fn test_bundles_runtime_jar() {
        let temp = TempDir::new().unwrap();
        let runtime = temp.path().join("kotlin-runtime.jar");
        {
            let mut zip = ZipWriter::new(File::create(&runtime).unwrap());
            let options = SimpleFileOptions::default();
            zip.start_file("META-INF/MANIFEST.MF", options).unwrap();
            zip.write_all(b"Manifest-Version: 1.0\n").unwrap();
            zip.start_file("kotlin/Unit.class", options).unwrap();
            zip.write_all(b"unit").unwrap();
            zip.finish().unwrap();
        }

        let jar = temp.path().join("app.jar");
        write_to_jar(&sample_output(None), &jar, Some(&runtime)).unwrap();

        assert_eq!(read_entry(&jar, "kotlin/Unit.class"), Some(b"unit".to_vec()));
        let manifest = String::from_utf8(read_entry(&jar, MANIFEST_PATH).unwrap()).unwrap();
        assert!(manifest.contains("JetBrains Kotlin"));
    }

    #[test]
    fn test_failed_runtime_bundle_leaves_no_jar() {
        let temp = TempDir::new().unwrap();
        let runtime = temp.path().join("runtime.jar");
        fs::write(&runtime, b"not a zip archive").unwrap();
        let jar = temp.path().join("dist/app.jar");

        let result = write_to_jar(&sample_output(None), &jar, Some(&runtime));

        assert!(matches!(result, Err(CompileEnvironmentError::Jar { .. })));
        assert!(!jar.exists());
        assert!(!temp.path().join("dist").exists());
    }

    #[test]
    fn test_failed_jar_keeps_previous_jar() {
        let temp = TempDir::new().unwrap();
        let jar = temp.path().join("app.jar");
        fs::write(&jar, b"previous").unwrap();
        let runtime = temp.path().join("runtime.jar");
        fs::write(&runtime, b"garbage").unwrap();

        assert!(write_to_jar(&sample_output(None), &jar, Some(&runtime)).is_err());
        assert_eq!(fs::read(&jar).unwrap(), b"previous");
        let leftovers: Vec<_> = fs::read_dir(temp.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 2);
    }

    #[test]
    fn test_rollback_removes_written_directories() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("out");
        let mut transaction = OutputTransaction::new();
        transaction.write_directory(&sample_output(None), &out).unwrap();
        assert!(out.join("a/b/C.class").is_file());

        transaction.rollback();
        assert!(!out.exists());
    }

    #[test]
    fn test_unwritable_destination_is_fatal() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("file");
        fs::write(&blocker, b"").unwrap();

        let result = write_to_directory(&sample_output(None), &blocker.join("out"));
        assert!(matches!(result, Err(CompileEnvironmentError::Write { .. })));
    }
}
