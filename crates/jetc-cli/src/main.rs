//! Jetc command-line compiler
//!
//! Compiles Kotlin sources to JVM class files, jars, or runs them directly:
//!
//! ```text
//! jetc src -d classes
//! jetc src --jar app.jar --include-runtime --runtime lib/kotlin-runtime.jar
//! jetc --module modules.kts
//! jetc --script hello.kts -- arg1 arg2
//! ```

mod messages;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use jetc_driver::{
    compile_and_execute, compile_bunch_of_sources, compile_modules, CompilerConfiguration, JavaLauncher,
    ModuleScriptError, ModuleScriptLoader, OutputTarget, ScriptOutcome, TraceMode, CONFIG_FILE_NAME,
};
use jetc_engine::MessageCollector;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use messages::{resolve_color_choice, TerminalCollector};

const EXIT_COMPILATION_ERROR: i32 = 1;
const EXIT_INTERNAL_ERROR: i32 = 2;

#[derive(Parser, Debug)]
#[command(name = "jetc")]
#[command(about = "Kotlin to JVM compiler", long_about = None)]
#[command(version)]
struct Cli {
    /// Source files and directories
    sources: Vec<PathBuf>,

    /// Directory to write class files to
    #[arg(short = 'd', long, value_name = "DIR", conflicts_with = "jar")]
    destination: Option<PathBuf>,

    /// Jar to write (with --module: directory of per-module jars)
    #[arg(long, value_name = "PATH")]
    jar: Option<PathBuf>,

    /// Bundle the runtime library into the jar
    #[arg(long, requires = "jar")]
    include_runtime: bool,

    /// Kotlin runtime library (jar or class directory)
    #[arg(long, value_name = "PATH")]
    runtime: Option<PathBuf>,

    /// Classpath entries; repeat the flag or join paths with the platform separator
    #[arg(long, visible_alias = "cp", value_name = "PATHS")]
    classpath: Vec<String>,

    /// External annotation roots
    #[arg(long, value_name = "PATHS")]
    annotations: Vec<String>,

    /// JDK installation whose classes are on the classpath
    #[arg(long, value_name = "DIR")]
    jdk_home: Option<PathBuf>,

    /// Module script declaring the modules to compile
    #[arg(long, value_name = "SCRIPT", conflicts_with_all = ["sources", "script"])]
    module: Option<PathBuf>,

    /// Compile and run the main class
    #[arg(long, conflicts_with_all = ["destination", "jar"])]
    script: bool,

    /// Configuration file (defaults to ./jetc.toml when present)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Module name for single-module compilation
    #[arg(long, value_name = "NAME")]
    module_name: Option<String>,

    /// Binding trace kept during analysis
    #[arg(long, value_enum)]
    trace: Option<TraceArg>,

    /// When to color diagnostics
    #[arg(long, value_enum, default_value_t = ColorArg::Auto)]
    color: ColorArg,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Arguments for the program run by --script
    #[arg(last = true, value_name = "ARGS")]
    args: Vec<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum TraceArg {
    Full,
    Filtering,
}

impl From<TraceArg> for TraceMode {
    fn from(trace: TraceArg) -> Self {
        match trace {
            TraceArg::Full => TraceMode::Full,
            TraceArg::Filtering => TraceMode::Filtering,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ColorArg {
    Auto,
    Always,
    Never,
}

impl ColorArg {
    fn as_str(self) -> &'static str {
        match self {
            ColorArg::Auto => "auto",
            ColorArg::Always => "always",
            ColorArg::Never => "never",
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            EXIT_INTERNAL_ERROR
        }
    };
    std::process::exit(code);
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    let configuration = load_configuration(&cli)?;
    debug!(?configuration, "configuration loaded");
    let mut collector = TerminalCollector::stderr(resolve_color_choice(cli.color.as_str()));

    let code = if let Some(script) = &cli.module {
        let chunk = match ModuleScriptLoader::new(&configuration).load_chunk(script) {
            Ok(chunk) => chunk,
            Err(ModuleScriptError::Analysis { diagnostics, .. }) => {
                for diagnostic in diagnostics {
                    collector.report(diagnostic);
                }
                collector.summary();
                return Ok(EXIT_COMPILATION_ERROR);
            }
            Err(e) => return Err(anyhow::Error::new(e).context("cannot load module script")),
        };
        compile_modules(&chunk, &configuration, cli.jar.as_deref(), cli.include_runtime, &mut collector)?.code()
    } else if cli.script {
        let launcher = configuration
            .jdk_home
            .as_deref()
            .map(JavaLauncher::from_jdk_home)
            .unwrap_or_default();
        match compile_and_execute(&configuration, &launcher, &cli.args, &mut collector)? {
            ScriptOutcome::CompilationFailed => EXIT_COMPILATION_ERROR,
            ScriptOutcome::Finished(status) => status,
        }
    } else {
        if configuration.sources.is_empty() {
            bail!("no source files given");
        }
        let target = output_target(&cli);
        compile_bunch_of_sources(&configuration, &target, &mut collector)?.code()
    };

    collector.summary();
    Ok(code)
}

fn output_target(cli: &Cli) -> OutputTarget {
    match (&cli.jar, &cli.destination) {
        (Some(jar), _) => OutputTarget::Jar {
            path: jar.clone(),
            include_runtime: cli.include_runtime,
        },
        (None, Some(dir)) => OutputTarget::Directory(dir.clone()),
        (None, None) => OutputTarget::Directory(PathBuf::from(".")),
    }
}

/// The configuration file (if any) overridden by command-line flags.
fn load_configuration(cli: &Cli) -> anyhow::Result<CompilerConfiguration> {
    let mut configuration = match &cli.config {
        Some(path) => CompilerConfiguration::from_file(path)
            .with_context(|| format!("cannot load {}", path.display()))?,
        None => {
            let default = Path::new(CONFIG_FILE_NAME);
            if default.is_file() {
                CompilerConfiguration::from_file(default)
                    .with_context(|| format!("cannot load {}", CONFIG_FILE_NAME))?
            } else {
                CompilerConfiguration::new()
            }
        }
    };

    if !cli.sources.is_empty() {
        configuration.sources = cli.sources.clone();
    }
    configuration.classpath.extend(split_path_lists(&cli.classpath));
    configuration.annotations.extend(split_path_lists(&cli.annotations));
    if let Some(name) = &cli.module_name {
        configuration.module_name = name.clone();
    }
    if let Some(jdk_home) = &cli.jdk_home {
        configuration.jdk_home = Some(jdk_home.clone());
    }
    if let Some(runtime) = &cli.runtime {
        configuration.runtime = Some(runtime.clone());
    }
    if let Some(trace) = cli.trace {
        configuration.trace = trace.into();
    }
    Ok(configuration)
}

fn split_path_lists(values: &[String]) -> Vec<PathBuf> {
    values
        .iter()
        .flat_map(|value| std::env::split_paths(value).collect::<Vec<_>>())
        .filter(|path| !path.as_os_str().is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("jetc").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_parse_jar_build() {
        let cli = parse(&["src", "--jar", "app.jar", "--include-runtime", "--trace", "full"]);
        assert_eq!(cli.sources, vec![PathBuf::from("src")]);
        assert_eq!(
            output_target(&cli),
            OutputTarget::Jar {
                path: PathBuf::from("app.jar"),
                include_runtime: true
            }
        );
        assert_eq!(cli.trace, Some(TraceArg::Full));
    }

    #[test]
    fn test_parse_script_arguments() {
        let cli = parse(&["--script", "hello.kts", "--", "a", "--b"]);
        assert!(cli.script);
        assert_eq!(cli.args, vec!["a".to_string(), "--b".to_string()]);
    }

    #[test]
    fn test_destination_conflicts_with_jar() {
        let result = Cli::try_parse_from(["jetc", "src", "-d", "out", "--jar", "app.jar"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_flags_override_configuration() {
        let temp = tempfile::TempDir::new().unwrap();
        let file = temp.path().join("jetc.toml");
        std::fs::write(&file, "[compiler]\nsources = [\"src\"]\nclasspath = [\"lib/a.jar\"]\ntrace = \"full\"\n").unwrap();

        let joined = std::env::join_paths(["/x.jar", "/y.jar"]).unwrap();
        let joined = joined.to_str().unwrap();
        let config_arg = file.to_str().unwrap();
        let cli = parse(&["--config", config_arg, "--classpath", joined, "--trace", "filtering", "Main.kt"]);
        let configuration = load_configuration(&cli).unwrap();

        assert_eq!(configuration.sources, vec![PathBuf::from("Main.kt")]);
        assert_eq!(
            configuration.classpath,
            vec![temp.path().join("lib/a.jar"), PathBuf::from("/x.jar"), PathBuf::from("/y.jar")]
        );
        assert_eq!(configuration.trace, TraceMode::Filtering);
    }
}
