//! Integration tests for the `jetc` binary.
//!
//! Runs the compiled executable against sources in temp directories.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

fn jetc(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_jetc"))
        .current_dir(dir)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .args(args)
        .output()
        .expect("failed to spawn jetc")
}

fn write(dir: &Path, relative: &str, text: &str) -> PathBuf {
    let path = dir.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, text).unwrap();
    path
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

// ────────────────────────────────────────────────────────────────────────────
// Directory and jar output
// ────────────────────────────────────────────────────────────────────────────

#[test]
fn test_compile_to_directory() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "src/app/Main.kt", "package app\n\nfun main(args: Array<String>) {\n    println(\"hi\")\n}\n");

    let output = jetc(temp.path(), &["src", "-d", "classes"]);

    assert_eq!(output.status.code(), Some(0), "{}", stderr(&output));
    assert!(temp.path().join("classes/app/AppPackage.class").is_file());
}

#[test]
fn test_compile_to_jar_writes_manifest() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "src/app/Main.kt", "package app\n\nfun main(args: Array<String>) {\n}\n");

    let output = jetc(temp.path(), &["src", "--jar", "app.jar"]);
    assert_eq!(output.status.code(), Some(0), "{}", stderr(&output));

    let file = fs::File::open(temp.path().join("app.jar")).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    let mut manifest = String::new();
    archive
        .by_name("META-INF/MANIFEST.MF")
        .unwrap()
        .read_to_string(&mut manifest)
        .unwrap();
    assert!(manifest.contains("Main-Class: app.AppPackage"), "{}", manifest);
}

// ────────────────────────────────────────────────────────────────────────────
// Failures
// ────────────────────────────────────────────────────────────────────────────

#[test]
fn test_compilation_error_exits_one() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "src/Broken.kt", "fun main(args: Array<String>) {\n    nope()\n}\n");

    let output = jetc(temp.path(), &["src", "-d", "classes"]);

    assert_eq!(output.status.code(), Some(1));
    let text = stderr(&output);
    assert!(text.contains("UNRESOLVED_REFERENCE"), "{}", text);
    assert!(text.contains("1 error(s)"), "{}", text);
    assert!(!temp.path().join("classes").exists());
}

#[test]
fn test_no_sources_is_usage_error() {
    let temp = TempDir::new().unwrap();
    let output = jetc(temp.path(), &["-d", "classes"]);

    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("no source files given"));
}

#[test]
fn test_missing_module_script_exits_two() {
    let temp = TempDir::new().unwrap();
    let output = jetc(temp.path(), &["--module", "missing.kts"]);

    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("cannot load module script"));
}

// ────────────────────────────────────────────────────────────────────────────
// Module scripts and configuration files
// ────────────────────────────────────────────────────────────────────────────

#[test]
fn test_module_script_build() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "core/src/core/Core.kt", "package core\n\nfun answer(): Int = 42\n");
    write(
        temp.path(),
        "modules.kts",
        "import kotlin.modules.*\n\nfun project() {\n    module(\"core\") {\n        sources += \"core/src\"\n    }\n}\n",
    );

    let output = jetc(temp.path(), &["--module", "modules.kts"]);

    assert_eq!(output.status.code(), Some(0), "{}", stderr(&output));
    assert!(temp.path().join("out/core/core/CorePackage.class").is_file());
}

#[test]
fn test_module_script_analysis_error_is_reported() {
    let temp = TempDir::new().unwrap();
    write(
        temp.path(),
        "modules.kts",
        "import kotlin.modules.*\n\nfun project() {\n    module(\"m\") {\n        sources = \"src\"\n    }\n}\n",
    );

    let output = jetc(temp.path(), &["--module", "modules.kts"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("TYPE_MISMATCH"), "{}", stderr(&output));
}

#[test]
fn test_config_file_supplies_sources() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "src/lib/Util.kt", "package lib\n\nclass Util\n");
    write(temp.path(), "jetc.toml", "[compiler]\nsources = [\"src\"]\nmodule-name = \"lib\"\n");

    let output = jetc(temp.path(), &["-d", "classes"]);

    assert_eq!(output.status.code(), Some(0), "{}", stderr(&output));
    assert!(temp.path().join("classes/lib/Util.class").is_file());
}
