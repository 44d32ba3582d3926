//! Rendering compiler diagnostics on the terminal.
//!
//! Uses `codespan-reporting` for source snippets and `termcolor` for color.
//! Respects `NO_COLOR` and the `--color` flag.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use codespan_reporting::diagnostic::{Diagnostic as CsDiagnostic, Label};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use jetc_engine::{Diagnostic, MessageCollector, Severity};
use termcolor::{ColorChoice, StandardStream, WriteColor};

/// Resolve `ColorChoice` from the `--color` flag and the environment.
pub fn resolve_color_choice(flag: &str) -> ColorChoice {
    if std::env::var_os("NO_COLOR").is_some() {
        return ColorChoice::Never;
    }
    match flag {
        "always" => ColorChoice::Always,
        "never" => ColorChoice::Never,
        _ => ColorChoice::Auto,
    }
}

/// Prints every reported diagnostic as it arrives.
pub struct TerminalCollector<W: WriteColor> {
    writer: W,
    config: term::Config,
    files: SimpleFiles<String, String>,
    /// Path → file id; `None` when the file could not be read
    file_ids: HashMap<PathBuf, Option<usize>>,
    errors: usize,
    warnings: usize,
}

impl TerminalCollector<StandardStream> {
    pub fn stderr(choice: ColorChoice) -> Self {
        Self::new(StandardStream::stderr(choice))
    }
}

impl<W: WriteColor> TerminalCollector<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            config: term::Config::default(),
            files: SimpleFiles::new(),
            file_ids: HashMap::new(),
            errors: 0,
            warnings: 0,
        }
    }

    pub fn errors(&self) -> usize {
        self.errors
    }

    pub fn warnings(&self) -> usize {
        self.warnings
    }

    pub fn into_writer(self) -> W {
        self.writer
    }

    /// Print the error and warning counts, if there were any.
    pub fn summary(&mut self) {
        if self.errors == 0 && self.warnings == 0 {
            return;
        }
        let _ = writeln!(
            self.writer,
            "{} error(s), {} warning(s)",
            self.errors, self.warnings
        );
    }

    fn file_id(&mut self, path: &Path) -> Option<usize> {
        if let Some(id) = self.file_ids.get(path) {
            return *id;
        }
        let id = std::fs::read_to_string(path)
            .ok()
            .map(|text| self.files.add(path.display().to_string(), text));
        self.file_ids.insert(path.to_path_buf(), id);
        id
    }

    fn render(&mut self, diagnostic: &Diagnostic) -> CsDiagnostic<usize> {
        let rendered = match diagnostic.severity {
            Severity::Error => CsDiagnostic::error(),
            Severity::Warning => CsDiagnostic::warning(),
            Severity::Info => CsDiagnostic::note(),
        }
        .with_code(diagnostic.code.as_str())
        .with_message(diagnostic.message.clone());

        let Some(location) = &diagnostic.location else {
            return rendered;
        };
        match location.span {
            Some(span) => match self.file_id(&location.path) {
                Some(file) => rendered.with_labels(vec![Label::primary(file, span.start as usize..span.end as usize)]),
                None => rendered.with_notes(vec![format!(
                    "at {}:{}:{}",
                    location.path.display(),
                    span.line,
                    span.column
                )]),
            },
            None => rendered.with_notes(vec![format!("in {}", location.path.display())]),
        }
    }
}

impl<W: WriteColor> MessageCollector for TerminalCollector<W> {
    fn report(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Error => self.errors += 1,
            Severity::Warning => self.warnings += 1,
            Severity::Info => {}
        }
        let rendered = self.render(&diagnostic);
        if term::emit(&mut self.writer, &self.config, &self.files, &rendered).is_err() {
            let _ = writeln!(self.writer, "{}", diagnostic);
        }
    }

    fn has_errors(&self) -> bool {
        self.errors > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jetc_engine::{DiagnosticCode, Span};
    use termcolor::NoColor;

    fn output(collector: TerminalCollector<NoColor<Vec<u8>>>) -> String {
        String::from_utf8(collector.into_writer().into_inner()).unwrap()
    }

    #[test]
    fn test_renders_source_snippet() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("main.kt");
        std::fs::write(&path, "fun main() {\n    nope()\n}\n").unwrap();

        let mut collector = TerminalCollector::new(NoColor::new(Vec::new()));
        collector.report(
            Diagnostic::error(DiagnosticCode::UnresolvedReference, "Unresolved reference: nope")
                .at(&path, Span::new(17, 23, 2, 5)),
        );

        assert!(collector.has_errors());
        let text = output(collector);
        assert!(text.contains("error[UNRESOLVED_REFERENCE]: Unresolved reference: nope"), "{}", text);
        assert!(text.contains("nope()"));
        assert!(text.contains("main.kt:2:5"));
    }

    #[test]
    fn test_unreadable_file_falls_back_to_note() {
        let mut collector = TerminalCollector::new(NoColor::new(Vec::new()));
        collector.report(
            Diagnostic::warning(DiagnosticCode::Configuration, "missing").at("/no/such/file.kt", Span::new(0, 1, 3, 7)),
        );

        assert!(!collector.has_errors());
        assert_eq!(collector.warnings(), 1);
        assert!(output(collector).contains("at /no/such/file.kt:3:7"));
    }

    #[test]
    fn test_summary_counts() {
        let mut collector = TerminalCollector::new(NoColor::new(Vec::new()));
        collector.report(Diagnostic::error(DiagnosticCode::Configuration, "a"));
        collector.report(Diagnostic::warning(DiagnosticCode::Configuration, "b"));
        collector.summary();

        assert!(output(collector).ends_with("1 error(s), 1 warning(s)\n"));
    }

    #[test]
    fn test_color_flag() {
        if std::env::var_os("NO_COLOR").is_none() {
            assert_eq!(resolve_color_choice("never"), ColorChoice::Never);
            assert_eq!(resolve_color_choice("always"), ColorChoice::Always);
        }
    }
}
