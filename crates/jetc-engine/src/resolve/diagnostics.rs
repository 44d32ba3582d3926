//! Compiler diagnostics and the collectors that receive them

use std::fmt;
use std::path::{Path, PathBuf};

use crate::parser::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

/// Diagnostic factory codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticCode {
    SyntaxError,
    UnresolvedReference,
    UnresolvedImport,
    Redeclaration,
    WrongNumberOfArguments,
    TypeMismatch,
    NoReturnInFunctionWithBlockBody,
    PropertyWithNoTypeNoInitializer,
    ValReassignment,
    FinalSupertype,
    NonAbstractFunctionWithNoBody,
    UnreachableCode,
    Unsupported,
    /// Problems with paths and options before analysis
    Configuration,
    /// A source file owned by more than one module
    DuplicateModuleSource,
    /// Reported by a compiler plugin
    Plugin,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticCode::SyntaxError => "SYNTAX",
            DiagnosticCode::UnresolvedReference => "UNRESOLVED_REFERENCE",
            DiagnosticCode::UnresolvedImport => "UNRESOLVED_IMPORT",
            DiagnosticCode::Redeclaration => "REDECLARATION",
            DiagnosticCode::WrongNumberOfArguments => "WRONG_NUMBER_OF_ARGUMENTS",
            DiagnosticCode::TypeMismatch => "TYPE_MISMATCH",
            DiagnosticCode::NoReturnInFunctionWithBlockBody => "NO_RETURN_IN_FUNCTION_WITH_BLOCK_BODY",
            DiagnosticCode::PropertyWithNoTypeNoInitializer => "PROPERTY_WITH_NO_TYPE_NO_INITIALIZER",
            DiagnosticCode::ValReassignment => "VAL_REASSIGNMENT",
            DiagnosticCode::FinalSupertype => "FINAL_SUPERTYPE",
            DiagnosticCode::NonAbstractFunctionWithNoBody => "NON_ABSTRACT_FUNCTION_WITH_NO_BODY",
            DiagnosticCode::UnreachableCode => "UNREACHABLE_CODE",
            DiagnosticCode::Unsupported => "UNSUPPORTED",
            DiagnosticCode::Configuration => "CONFIGURATION",
            DiagnosticCode::DuplicateModuleSource => "DUPLICATE_MODULE_SOURCE",
            DiagnosticCode::Plugin => "PLUGIN",
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a diagnostic points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub path: PathBuf,
    pub span: Option<Span>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: DiagnosticCode,
    pub message: String,
    pub location: Option<Location>,
}

impl Diagnostic {
    pub fn error(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
            location: None,
        }
    }

    pub fn warning(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(code, message)
        }
    }

    pub fn info(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            ..Self::error(code, message)
        }
    }

    /// Point at a file.
    pub fn in_file(mut self, path: impl AsRef<Path>) -> Self {
        self.location = Some(Location {
            path: path.as_ref().to_path_buf(),
            span: None,
        });
        self
    }

    /// Point at a span within a file.
    pub fn at(mut self, path: impl AsRef<Path>, span: Span) -> Self {
        self.location = Some(Location {
            path: path.as_ref().to_path_buf(),
            span: Some(span),
        });
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(Location { path, span: Some(span) }) => write!(
                f,
                "{}: {}:{}:{}: {}",
                self.severity,
                path.display(),
                span.line,
                span.column,
                self.message
            ),
            Some(Location { path, span: None }) => {
                write!(f, "{}: {}: {}", self.severity, path.display(), self.message)
            }
            None => write!(f, "{}: {}", self.severity, self.message),
        }
    }
}

/// Receives diagnostics as the compiler produces them.
pub trait MessageCollector {
    fn report(&mut self, diagnostic: Diagnostic);

    /// Whether any error-severity diagnostic was reported.
    fn has_errors(&self) -> bool;
}

/// Keeps every diagnostic in memory.
#[derive(Debug, Default)]
pub struct DiagnosticCollector {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.severity == Severity::Warning)
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

impl MessageCollector for DiagnosticCollector {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

impl<C: MessageCollector + ?Sized> MessageCollector for &mut C {
    fn report(&mut self, diagnostic: Diagnostic) {
        (**self).report(diagnostic)
    }

    fn has_errors(&self) -> bool {
        (**self).has_errors()
    }
}
