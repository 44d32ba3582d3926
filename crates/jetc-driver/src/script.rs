//! Running compiled classes in script mode
//!
//! Each run gets its own temporary class directory, so classes from one
//! compilation never shadow those of another.

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

use jetc_engine::GeneratedOutput;
use tracing::{debug, info};

use crate::error::CompileEnvironmentError;
use crate::output::write_to_directory;

/// Runs the main class of a generated output.
pub trait ClassRunner {
    /// Run `main_class` with `args`; returns the program's exit status.
    fn run(
        &self,
        output: &GeneratedOutput,
        main_class: &str,
        classpath: &[PathBuf],
        args: &[String],
    ) -> Result<i32, CompileEnvironmentError>;
}

/// Starts `java -cp <classes>:<classpath> <MainClass> args…`.
#[derive(Debug, Clone)]
pub struct JavaLauncher {
    java: PathBuf,
}

impl Default for JavaLauncher {
    fn default() -> Self {
        let java = env::var_os("JAVA_HOME")
            .map(|home| Path::new(&home).join("bin").join("java"))
            .filter(|java| java.is_file())
            .unwrap_or_else(|| PathBuf::from("java"));
        Self { java }
    }
}

impl JavaLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the `java` executable of a JDK installation.
    pub fn from_jdk_home(jdk_home: &Path) -> Self {
        Self {
            java: jdk_home.join("bin").join("java"),
        }
    }

    pub fn java(&self) -> &Path {
        &self.java
    }
}

impl ClassRunner for JavaLauncher {
    fn run(
        &self,
        output: &GeneratedOutput,
        main_class: &str,
        classpath: &[PathBuf],
        args: &[String],
    ) -> Result<i32, CompileEnvironmentError> {
        let classes = tempfile::Builder::new()
            .prefix("jetc-run")
            .tempdir()
            .map_err(|source| CompileEnvironmentError::Write {
                path: env::temp_dir(),
                source,
            })?;
        write_to_directory(output, classes.path())?;

        let entries = std::iter::once(classes.path().to_path_buf()).chain(classpath.iter().cloned());
        let joined = env::join_paths(entries).map_err(|error| CompileEnvironmentError::Launch {
            command: self.java.display().to_string(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, error),
        })?;

        info!(main_class, java = %self.java.display(), "running script");
        let status = Command::new(&self.java)
            .arg("-cp")
            .arg(&joined)
            .arg(main_class)
            .args(args)
            .status()
            .map_err(|source| CompileEnvironmentError::Launch {
                command: self.java.display().to_string(),
                source,
            })?;
        debug!(?status, "script finished");
        Ok(status.code().unwrap_or(1))
    }
}
