//! Header scanner for Java sources compiled together with Kotlin
//!
//! Only the shape visible to Kotlin is extracted: the package, imports, and
//! each top-level type with its `extends`/`implements` lists. Member bodies
//! are skipped.

use std::path::PathBuf;

use crate::name::{FqName, Name};
use super::lexer::Lexer;
use super::parser::ParseError;
use super::token::{Span, Token};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JavaClassKind {
    Class,
    Interface,
    Enum,
}

/// A top-level Java type declaration.
#[derive(Debug, Clone)]
pub struct JavaClassStub {
    pub fq_name: FqName,
    pub kind: JavaClassKind,
    /// Supertype names as written (simple or qualified)
    pub supertypes: Vec<FqName>,
    pub span: Span,
}

/// The header of one Java file.
#[derive(Debug, Clone)]
pub struct JavaSourceFile {
    pub path: PathBuf,
    pub package: FqName,
    /// Single-type imports; star imports are kept with `all_under` set
    pub imports: Vec<(FqName, bool)>,
    pub classes: Vec<JavaClassStub>,
}

/// Scan the header of a Java source file.
pub fn scan_java_source(source: &str, path: impl Into<PathBuf>) -> Result<JavaSourceFile, Vec<ParseError>> {
    let tokens = Lexer::new(source).tokenize().map_err(|errors| {
        errors
            .into_iter()
            .map(|e| ParseError { message: e.to_string(), span: e.span() })
            .collect::<Vec<_>>()
    })?;
    let tokens: Vec<(Token, Span)> = tokens.into_iter().filter(|(t, _)| *t != Token::Newline).collect();

    let mut scanner = Scanner { tokens: &tokens, pos: 0 };
    let mut file = JavaSourceFile {
        path: path.into(),
        package: FqName::root(),
        imports: Vec::new(),
        classes: Vec::new(),
    };

    while let Some(token) = scanner.peek() {
        match token {
            Token::Package => {
                scanner.pos += 1;
                file.package = scanner.qualified_name(false).0;
                scanner.skip_past(&Token::Semicolon);
            }
            Token::Import => {
                scanner.pos += 1;
                // `import static a.B.c;`
                if scanner.peek().is_some_and(|t| t.is_soft_keyword("static")) {
                    scanner.pos += 1;
                }
                let (name, all_under) = scanner.qualified_name(true);
                file.imports.push((name, all_under));
                scanner.skip_past(&Token::Semicolon);
            }
            Token::Class | Token::Interface => {
                let kind = if *token == Token::Class { JavaClassKind::Class } else { JavaClassKind::Interface };
                let stub = scanner.type_declaration(kind, &file.package)?;
                file.classes.push(stub);
            }
            Token::Identifier(text) if text == "enum" => {
                let stub = scanner.type_declaration(JavaClassKind::Enum, &file.package)?;
                file.classes.push(stub);
            }
            Token::At if scanner.peek_at(1) == Some(&Token::Interface) => {
                // Annotation type declarations are not visible to the subset
                scanner.pos += 2;
                scanner.skip_until_body_end();
            }
            _ => scanner.pos += 1,
        }
    }

    Ok(file)
}

struct Scanner<'t> {
    tokens: &'t [(Token, Span)],
    pos: usize,
}

impl<'t> Scanner<'t> {
    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_at(&self, offset: usize) -> Option<&'t Token> {
        self.tokens.get(self.pos + offset).map(|(t, _)| t)
    }

    fn span(&self) -> Span {
        self.tokens.get(self.pos).map(|(_, s)| *s).unwrap_or_default()
    }

    fn qualified_name(&mut self, allow_star: bool) -> (FqName, bool) {
        let mut segments = Vec::new();
        loop {
            match self.peek() {
                Some(Token::Identifier(text)) => {
                    segments.push(Name::identifier(text.as_str()));
                    self.pos += 1;
                }
                Some(Token::Star) if allow_star => {
                    self.pos += 1;
                    return (FqName::from_segments(&segments), true);
                }
                _ => break,
            }
            if self.peek() != Some(&Token::Dot) {
                break;
            }
            self.pos += 1;
        }
        (FqName::from_segments(&segments), false)
    }

    fn skip_past(&mut self, token: &Token) {
        while let Some(current) = self.peek() {
            self.pos += 1;
            if current == token {
                break;
            }
        }
    }

    fn skip_type_arguments(&mut self) {
        if self.peek() != Some(&Token::Lt) {
            return;
        }
        let mut depth = 0usize;
        while let Some(token) = self.peek() {
            self.pos += 1;
            match token {
                Token::Lt => depth += 1,
                Token::Gt => {
                    depth -= 1;
                    if depth == 0 {
                        return;
                    }
                }
                _ => {}
            }
        }
    }

    fn skip_until_body_end(&mut self) {
        while let Some(token) = self.peek() {
            if *token == Token::LBrace {
                break;
            }
            self.pos += 1;
        }
        let mut depth = 0usize;
        while let Some(token) = self.peek() {
            self.pos += 1;
            match token {
                Token::LBrace => depth += 1,
                Token::RBrace => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return;
                    }
                }
                _ => {}
            }
        }
    }

    fn type_declaration(&mut self, kind: JavaClassKind, package: &FqName) -> Result<JavaClassStub, Vec<ParseError>> {
        let span = self.span();
        self.pos += 1;
        let name = match self.peek() {
            Some(Token::Identifier(text)) => Name::identifier(text.as_str()),
            _ => {
                return Err(vec![ParseError {
                    message: "expecting a type name".to_string(),
                    span: self.span(),
                }])
            }
        };
        self.pos += 1;
        self.skip_type_arguments();

        let mut supertypes = Vec::new();
        while let Some(token) = self.peek() {
            match token {
                Token::LBrace => break,
                Token::Identifier(text) if text == "extends" || text == "implements" => {
                    self.pos += 1;
                    loop {
                        let (supertype, _) = self.qualified_name(false);
                        if !supertype.is_root() {
                            supertypes.push(supertype);
                        }
                        self.skip_type_arguments();
                        if self.peek() != Some(&Token::Comma) {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                _ => self.pos += 1,
            }
        }
        self.skip_until_body_end();

        Ok(JavaClassStub {
            fq_name: package.child(&name),
            kind,
            supertypes,
            span,
        })
    }
}
