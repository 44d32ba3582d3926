//! Recursive-descent parser for the Kotlin subset
//!
//! Produces a [`SourceUnit`] from a token stream. Newlines terminate
//! statements; everywhere else they are skipped.

use std::path::PathBuf;

use thiserror::Error;

use crate::name::{FqName, Name};
use super::ast::*;
use super::lexer::Lexer;
use super::token::{Span, Token};

/// A syntax error.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl ParseError {
    fn new(message: impl Into<String>, span: Span) -> Self {
        Self { message: message.into(), span }
    }
}

type ParseResult<T> = Result<T, ParseError>;

const MODIFIERS: &[&str] = &[
    "public", "private", "protected", "internal", "abstract", "open", "final", "override",
    "data", "inner", "sealed", "inline", "external", "lateinit", "const", "tailrec",
    "operator", "infix", "annotation",
];

/// Parser for one source file.
pub struct Parser {
    tokens: Vec<(Token, Span)>,
    pos: usize,
    next_id: u32,
    path: PathBuf,
    is_script: bool,
    eof_span: Span,
}

impl Parser {
    /// Lex `source` and prepare to parse it. `path` decides script mode (`.kts`).
    pub fn new(source: &str, path: impl Into<PathBuf>) -> Result<Self, Vec<ParseError>> {
        let path = path.into();
        let tokens = Lexer::new(source).tokenize().map_err(|errors| {
            errors
                .into_iter()
                .map(|e| ParseError::new(e.to_string(), e.span()))
                .collect::<Vec<_>>()
        })?;
        let end = source.len() as u32;
        let line = source.lines().count().max(1) as u32;
        let is_script = path.extension().is_some_and(|ext| ext == "kts");
        Ok(Self {
            tokens,
            pos: 0,
            next_id: 0,
            path,
            is_script,
            eof_span: Span::new(end, end, line, 1),
        })
    }

    /// Parse the whole file, collecting one error per malformed declaration.
    pub fn parse(mut self) -> Result<SourceUnit, Vec<ParseError>> {
        let mut errors = Vec::new();

        self.skip_separators();
        if let Err(error) = self.skip_file_annotations() {
            errors.push(error);
        }

        let (package, package_span) = match self.parse_package_directive() {
            Ok(result) => result,
            Err(error) => {
                errors.push(error);
                (FqName::root(), None)
            }
        };

        let mut imports = Vec::new();
        loop {
            self.skip_separators();
            if !self.check(&Token::Import) {
                break;
            }
            match self.parse_import() {
                Ok(import) => imports.push(import),
                Err(error) => {
                    errors.push(error);
                    self.synchronize();
                }
            }
        }

        let mut declarations = Vec::new();
        let mut script = if self.is_script { Some(Vec::new()) } else { None };
        loop {
            self.skip_separators();
            if self.at_end() {
                break;
            }
            let result = if self.at_declaration_start() {
                self.parse_declaration().map(|decl| declarations.push(decl))
            } else if let Some(statements) = script.as_mut() {
                self.parse_statement().map(|stmt| statements.push(stmt))
            } else {
                Err(self.error_here("expecting a top level declaration"))
            };
            if let Err(error) = result {
                errors.push(error);
                self.synchronize();
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(SourceUnit {
            path: self.path,
            package,
            package_span,
            imports,
            declarations,
            script,
        })
    }

    // ── Header ──────────────────────────────────────────────────────

    fn skip_file_annotations(&mut self) -> ParseResult<()> {
        while self.check(&Token::At) {
            self.skip_annotation()?;
            self.skip_separators();
        }
        Ok(())
    }

    fn parse_package_directive(&mut self) -> ParseResult<(FqName, Option<Span>)> {
        if !self.check(&Token::Package) {
            return Ok((FqName::root(), None));
        }
        let start = self.advance_span();
        let (name, end) = self.parse_qualified_name()?;
        self.expect_terminator()?;
        Ok((name, Some(start.to(end))))
    }

    fn parse_import(&mut self) -> ParseResult<ImportDirective> {
        let start = self.advance_span();
        let id = self.fresh_id();
        let first = self.expect_identifier()?;
        let mut segments = vec![first];
        let mut end = self.previous_span();
        let mut all_under = false;
        while self.eat(&Token::Dot) {
            if self.eat(&Token::Star) {
                all_under = true;
                end = self.previous_span();
                break;
            }
            segments.push(self.expect_identifier()?);
            end = self.previous_span();
        }
        let alias = if !all_under && self.eat(&Token::As) {
            end = self.current_span();
            Some(self.expect_identifier()?)
        } else {
            None
        };
        self.expect_terminator()?;
        Ok(ImportDirective {
            id,
            path: FqName::from_segments(&segments),
            all_under,
            alias,
            span: start.to(end),
        })
    }

    // ── Declarations ────────────────────────────────────────────────

    fn at_declaration_start(&self) -> bool {
        let mut offset = 0;
        loop {
            match self.peek_at(offset) {
                Some(Token::Fun | Token::Class | Token::Interface | Token::Object | Token::Val | Token::Var) => {
                    return true
                }
                Some(Token::At) => return true,
                Some(Token::Identifier(text)) if text == "enum" || text == "companion" || MODIFIERS.contains(&text.as_str()) => {
                    offset += 1;
                }
                _ => return false,
            }
        }
    }

    fn parse_declaration(&mut self) -> ParseResult<Declaration> {
        let start = self.current_span();
        let (modifiers, is_enum, is_companion) = self.parse_modifiers()?;
        match self.peek() {
            Some(Token::Fun) if !is_enum && !is_companion => {
                Ok(Declaration::Function(self.parse_function(modifiers, start)?))
            }
            Some(Token::Val | Token::Var) if !is_enum && !is_companion => {
                Ok(Declaration::Property(self.parse_property(modifiers, start)?))
            }
            Some(Token::Class) => {
                self.advance();
                if self.check(&Token::Object) {
                    self.advance();
                    return Ok(Declaration::Class(self.parse_class_object(modifiers, start, false)?));
                }
                let kind = if is_enum { ClassKind::Enum } else { ClassKind::Class };
                Ok(Declaration::Class(self.parse_class(kind, modifiers, start)?))
            }
            Some(Token::Interface) if !is_enum => {
                self.advance();
                Ok(Declaration::Class(self.parse_class(ClassKind::Interface, modifiers, start)?))
            }
            Some(Token::Object) if !is_enum => {
                self.advance();
                if is_companion {
                    return Ok(Declaration::Class(self.parse_class_object(modifiers, start, true)?));
                }
                Ok(Declaration::Class(self.parse_class(ClassKind::Object, modifiers, start)?))
            }
            _ => Err(self.error_here("expecting a declaration")),
        }
    }

    /// Returns the modifiers plus whether `enum` / `companion` were seen.
    fn parse_modifiers(&mut self) -> ParseResult<(Modifiers, bool, bool)> {
        let mut modifiers = Modifiers::default();
        let mut is_enum = false;
        let mut is_companion = false;
        loop {
            self.skip_newlines();
            if self.check(&Token::At) {
                self.skip_annotation()?;
                continue;
            }
            let text = match self.peek() {
                Some(Token::Identifier(text)) => text.clone(),
                _ => break,
            };
            // `data: String` is a parameter named `data`, not a modifier
            let followed_by_declaration = matches!(
                self.peek_at(1),
                Some(
                    Token::Identifier(_) | Token::Fun | Token::Class | Token::Interface | Token::Object
                        | Token::Val | Token::Var | Token::At | Token::Newline
                )
            );
            if !followed_by_declaration {
                break;
            }
            match text.as_str() {
                "enum" => is_enum = true,
                "companion" => is_companion = true,
                "abstract" => modifiers.is_abstract = true,
                "open" => modifiers.is_open = true,
                "override" => modifiers.is_override = true,
                "private" => modifiers.is_private = true,
                "data" => modifiers.is_data = true,
                "inner" => modifiers.is_inner = true,
                other if MODIFIERS.contains(&other) => {}
                _ => break,
            }
            self.advance();
        }
        Ok((modifiers, is_enum, is_companion))
    }

    fn skip_annotation(&mut self) -> ParseResult<()> {
        self.expect(&Token::At)?;
        // `@file:Name`
        if self.peek().is_some_and(|t| t.is_soft_keyword("file")) && self.peek_at(1) == Some(&Token::Colon) {
            self.advance();
            self.advance();
        }
        self.parse_qualified_name()?;
        if self.check(&Token::LParen) {
            self.skip_balanced(&Token::LParen, &Token::RParen)?;
        }
        Ok(())
    }

    fn parse_class(&mut self, kind: ClassKind, modifiers: Modifiers, start: Span) -> ParseResult<ClassDecl> {
        let id = self.fresh_id();
        let name = self.expect_identifier()?;
        let type_parameters = self.parse_type_parameters()?;

        let mut constructor_parameters = Vec::new();
        if self.peek().is_some_and(|t| t.is_soft_keyword("constructor")) {
            self.advance();
        }
        if self.check(&Token::LParen) {
            if kind == ClassKind::Interface || kind == ClassKind::Object {
                return Err(self.error_here("constructors are not allowed here"));
            }
            constructor_parameters = self.parse_parameters(true)?;
        }

        let supertypes = self.parse_supertypes()?;

        let mut members = Vec::new();
        let mut enum_entries = Vec::new();
        let mut class_object = None;
        if self.check_same_line(&Token::LBrace) {
            self.advance();
            if kind == ClassKind::Enum {
                enum_entries = self.parse_enum_entries()?;
            }
            loop {
                self.skip_separators();
                if self.eat(&Token::RBrace) {
                    break;
                }
                if self.at_end() {
                    return Err(self.error_here("missing '}'"));
                }
                if self.peek().is_some_and(|t| t.is_soft_keyword("init")) {
                    return Err(self.error_here("initializer blocks are not supported"));
                }
                match self.parse_declaration()? {
                    Declaration::Class(object) if object.kind == ClassKind::ClassObject => {
                        if class_object.is_some() {
                            return Err(ParseError::new("only one class object is allowed per class", object.span));
                        }
                        if kind == ClassKind::Object {
                            return Err(ParseError::new("a class object is not allowed in an object", object.span));
                        }
                        class_object = Some(Box::new(object));
                    }
                    member => members.push(member),
                }
            }
        }

        Ok(ClassDecl {
            id,
            name,
            kind,
            modifiers,
            type_parameters,
            constructor_parameters,
            supertypes,
            members,
            enum_entries,
            class_object,
            span: start.to(self.previous_span()),
        })
    }

    fn parse_class_object(&mut self, modifiers: Modifiers, start: Span, companion: bool) -> ParseResult<ClassDecl> {
        // `companion object Named`
        if companion && matches!(self.peek(), Some(Token::Identifier(_))) {
            self.advance();
        }
        self.parse_class_body_only(ClassKind::ClassObject, modifiers, start)
    }

    fn parse_class_body_only(&mut self, kind: ClassKind, modifiers: Modifiers, start: Span) -> ParseResult<ClassDecl> {
        let id = self.fresh_id();
        let supertypes = self.parse_supertypes()?;
        let mut members = Vec::new();
        if self.check_same_line(&Token::LBrace) {
            self.advance();
            loop {
                self.skip_separators();
                if self.eat(&Token::RBrace) {
                    break;
                }
                if self.at_end() {
                    return Err(self.error_here("missing '}'"));
                }
                let member = self.parse_declaration()?;
                if let Declaration::Class(nested) = &member {
                    if nested.kind == ClassKind::ClassObject {
                        return Err(ParseError::new("a class object is not allowed here", nested.span));
                    }
                }
                members.push(member);
            }
        }
        Ok(ClassDecl {
            id,
            name: Name::identifier("object"),
            kind,
            modifiers,
            type_parameters: Vec::new(),
            constructor_parameters: Vec::new(),
            supertypes,
            members,
            enum_entries: Vec::new(),
            class_object: None,
            span: start.to(self.previous_span()),
        })
    }

    fn parse_enum_entries(&mut self) -> ParseResult<Vec<Name>> {
        let mut entries = Vec::new();
        loop {
            self.skip_newlines();
            match self.peek() {
                Some(Token::Identifier(_)) if !self.at_declaration_start() => {
                    entries.push(self.expect_identifier()?);
                    if self.check(&Token::LParen) || self.check(&Token::LBrace) {
                        return Err(self.error_here("enum entries with arguments or bodies are not supported"));
                    }
                    self.skip_newlines();
                    if !self.eat(&Token::Comma) {
                        self.eat(&Token::Semicolon);
                        break;
                    }
                }
                Some(Token::Semicolon) => {
                    self.advance();
                    break;
                }
                _ => break,
            }
        }
        Ok(entries)
    }

    fn parse_supertypes(&mut self) -> ParseResult<Vec<SupertypeEntry>> {
        let mut supertypes = Vec::new();
        if !self.eat(&Token::Colon) {
            return Ok(supertypes);
        }
        loop {
            self.skip_newlines();
            let type_ref = self.parse_type_ref()?;
            let constructor_call = if self.check(&Token::LParen) {
                let arguments = self.parse_arguments()?;
                if !arguments.is_empty() {
                    return Err(ParseError::new(
                        "superclass constructor arguments are not supported",
                        type_ref.span,
                    ));
                }
                true
            } else {
                false
            };
            if self.peek().is_some_and(|t| t.is_soft_keyword("by")) {
                return Err(self.error_here("delegation is not supported"));
            }
            supertypes.push(SupertypeEntry { type_ref, constructor_call });
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        Ok(supertypes)
    }

    fn parse_type_parameters(&mut self) -> ParseResult<Vec<Name>> {
        let mut names = Vec::new();
        if !self.eat(&Token::Lt) {
            return Ok(names);
        }
        loop {
            self.skip_newlines();
            if self.peek().is_some_and(|t| t.is_soft_keyword("out") || t.is_soft_keyword("in") || t.is_soft_keyword("reified"))
                && matches!(self.peek_at(1), Some(Token::Identifier(_)))
            {
                self.advance();
            }
            names.push(self.expect_identifier()?);
            if self.eat(&Token::Colon) {
                // Upper bounds do not affect the JVM erasure the subset emits
                self.parse_type_ref()?;
            }
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::Gt)?;
        Ok(names)
    }

    fn parse_function(&mut self, modifiers: Modifiers, start: Span) -> ParseResult<FunctionDecl> {
        self.expect(&Token::Fun)?;
        let id = self.fresh_id();
        let type_parameters = self.parse_type_parameters()?;

        // `fun name(` or `fun Receiver.name(` / `fun a.b.Receiver<T>.name(`
        let (mut segments, mut seg_span) = (vec![self.expect_identifier()?], self.previous_span());
        let mut receiver_arguments = Vec::new();
        let mut receiver_nullable = false;
        loop {
            if self.check(&Token::Lt) {
                receiver_arguments = self.parse_type_arguments()?;
            }
            if self.check(&Token::Question) && self.peek_at(1) == Some(&Token::Dot) {
                self.advance();
                receiver_nullable = true;
            }
            if !self.eat(&Token::Dot) {
                break;
            }
            segments.push(self.expect_identifier()?);
            seg_span = seg_span.to(self.previous_span());
        }
        let name = segments.pop().ok_or_else(|| self.error_here("expecting a function name"))?;
        let receiver = if segments.is_empty() {
            None
        } else {
            Some(TypeRef {
                id: self.fresh_id(),
                segments,
                arguments: receiver_arguments,
                nullable: receiver_nullable,
                span: seg_span,
            })
        };

        let parameters = self.parse_parameters(false)?;
        let return_type = if self.eat(&Token::Colon) {
            Some(self.parse_type_ref()?)
        } else {
            None
        };

        let body = if self.check_same_line(&Token::LBrace) {
            Some(FunctionBody::Block(self.parse_block()?))
        } else if self.eat(&Token::Eq) {
            self.skip_newlines();
            Some(FunctionBody::Expression(self.parse_expression()?))
        } else {
            None
        };

        Ok(FunctionDecl {
            id,
            name,
            modifiers,
            type_parameters,
            receiver,
            parameters,
            return_type,
            body,
            span: start.to(self.previous_span()),
        })
    }

    fn parse_parameters(&mut self, constructor: bool) -> ParseResult<Vec<Parameter>> {
        self.expect(&Token::LParen)?;
        let mut parameters = Vec::new();
        loop {
            self.skip_newlines();
            if self.eat(&Token::RParen) {
                break;
            }
            let start = self.current_span();
            let (_, _, _) = self.parse_modifiers()?;
            let is_vararg = if self.peek().is_some_and(|t| t.is_soft_keyword("vararg")) {
                self.advance();
                true
            } else {
                false
            };
            let property = match self.peek() {
                Some(Token::Val) if constructor => {
                    self.advance();
                    Some(Mutability::Val)
                }
                Some(Token::Var) if constructor => {
                    self.advance();
                    Some(Mutability::Var)
                }
                _ => None,
            };
            let id = self.fresh_id();
            let name = self.expect_identifier()?;
            self.expect(&Token::Colon)?;
            let type_ref = self.parse_type_ref()?;
            if self.check(&Token::Eq) {
                return Err(self.error_here("default parameter values are not supported"));
            }
            parameters.push(Parameter {
                id,
                name,
                type_ref,
                is_vararg,
                property,
                span: start.to(self.previous_span()),
            });
            self.skip_newlines();
            if !self.eat(&Token::Comma) {
                self.skip_newlines();
                self.expect(&Token::RParen)?;
                break;
            }
        }
        Ok(parameters)
    }

    fn parse_property(&mut self, modifiers: Modifiers, start: Span) -> ParseResult<PropertyDecl> {
        let mutability = if self.eat(&Token::Val) {
            Mutability::Val
        } else {
            self.expect(&Token::Var)?;
            Mutability::Var
        };
        let id = self.fresh_id();
        let name = self.expect_identifier()?;
        if self.check(&Token::Dot) {
            return Err(self.error_here("extension properties are not supported"));
        }
        let type_ref = if self.eat(&Token::Colon) {
            Some(self.parse_type_ref()?)
        } else {
            None
        };
        let initializer = if self.eat(&Token::Eq) {
            self.skip_newlines();
            Some(self.parse_expression()?)
        } else {
            None
        };
        Ok(PropertyDecl {
            id,
            name,
            mutability,
            modifiers,
            type_ref,
            initializer,
            span: start.to(self.previous_span()),
        })
    }

    // ── Types ───────────────────────────────────────────────────────

    fn parse_type_ref(&mut self) -> ParseResult<TypeRef> {
        self.skip_newlines();
        if self.check(&Token::LParen) {
            return Err(self.error_here("function types are not supported"));
        }
        let start = self.current_span();
        let id = self.fresh_id();
        let mut segments = vec![self.expect_identifier()?];
        while self.check(&Token::Dot) && matches!(self.peek_at(1), Some(Token::Identifier(_))) {
            self.advance();
            segments.push(self.expect_identifier()?);
        }
        let arguments = if self.check(&Token::Lt) {
            self.parse_type_arguments()?
        } else {
            Vec::new()
        };
        let nullable = self.eat(&Token::Question);
        Ok(TypeRef {
            id,
            segments,
            arguments,
            nullable,
            span: start.to(self.previous_span()),
        })
    }

    fn parse_type_arguments(&mut self) -> ParseResult<Vec<TypeRef>> {
        self.expect(&Token::Lt)?;
        let mut arguments = Vec::new();
        loop {
            self.skip_newlines();
            if self.check(&Token::Star) {
                // Star projections erase to `Any?`
                let span = self.advance_span();
                arguments.push(TypeRef {
                    id: self.fresh_id(),
                    segments: vec![Name::identifier("Any")],
                    arguments: Vec::new(),
                    nullable: true,
                    span,
                });
            } else {
                if self.peek().is_some_and(|t| t.is_soft_keyword("out") || t.is_soft_keyword("in"))
                    && matches!(self.peek_at(1), Some(Token::Identifier(_)))
                {
                    self.advance();
                }
                arguments.push(self.parse_type_ref()?);
            }
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::Gt)?;
        Ok(arguments)
    }

    // ── Statements and expressions ──────────────────────────────────

    fn parse_block(&mut self) -> ParseResult<Vec<Statement>> {
        self.expect(&Token::LBrace)?;
        let mut statements = Vec::new();
        loop {
            self.skip_separators();
            if self.eat(&Token::RBrace) {
                break;
            }
            if self.at_end() {
                return Err(self.error_here("missing '}'"));
            }
            statements.push(self.parse_statement()?);
            if !self.check(&Token::RBrace) {
                self.expect_terminator()?;
            }
        }
        Ok(statements)
    }

    fn parse_statement(&mut self) -> ParseResult<Statement> {
        let start = self.current_span();
        match self.peek() {
            Some(Token::Val | Token::Var) => {
                let mutability = if self.advance() == Token::Val { Mutability::Val } else { Mutability::Var };
                let id = self.fresh_id();
                let name = self.expect_identifier()?;
                let type_ref = if self.eat(&Token::Colon) {
                    Some(self.parse_type_ref()?)
                } else {
                    None
                };
                if !self.eat(&Token::Eq) {
                    return Err(self.error_here("local variables must be initialized"));
                }
                self.skip_newlines();
                let value = self.parse_expression()?;
                Ok(Statement::Local {
                    id,
                    name,
                    mutability,
                    type_ref,
                    value,
                    span: start.to(self.previous_span()),
                })
            }
            Some(Token::Return) => {
                self.advance();
                let id = self.fresh_id();
                let value = if self.at_statement_end() {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                Ok(Statement::Return {
                    id,
                    value,
                    span: start.to(self.previous_span()),
                })
            }
            Some(Token::Fun | Token::Class | Token::Interface | Token::Object) => {
                Err(self.error_here("local declarations are not supported"))
            }
            Some(Token::Identifier(_)) if matches!(self.peek_at(1), Some(Token::Eq | Token::PlusEq)) => {
                let id = self.fresh_id();
                let target = self.expect_identifier()?;
                let op = if self.advance() == Token::Eq { AssignOp::Set } else { AssignOp::Append };
                self.skip_newlines();
                let value = self.parse_expression()?;
                Ok(Statement::Assign {
                    id,
                    target,
                    op,
                    value,
                    span: start.to(self.previous_span()),
                })
            }
            _ => Ok(Statement::Expr(self.parse_expression()?)),
        }
    }

    fn parse_expression(&mut self) -> ParseResult<Expr> {
        let expr = self.parse_primary()?;
        match self.peek() {
            Some(Token::Dot) | Some(Token::Operator) if !self.at_statement_end() => {
                Err(self.error_here("only literals, names and calls are supported in expressions"))
            }
            Some(Token::Star | Token::Lt | Token::Gt | Token::Question | Token::As) => {
                Err(self.error_here("only literals, names and calls are supported in expressions"))
            }
            _ => Ok(expr),
        }
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let span = self.current_span();
        let id = self.fresh_id();
        match self.peek().cloned() {
            Some(Token::StringLiteral(value)) => {
                self.advance();
                Ok(Expr::StringLit { id, value, span })
            }
            Some(Token::IntLiteral(value)) => {
                self.advance();
                Ok(Expr::IntLit { id, value, span })
            }
            Some(Token::True) => {
                self.advance();
                Ok(Expr::BoolLit { id, value: true, span })
            }
            Some(Token::False) => {
                self.advance();
                Ok(Expr::BoolLit { id, value: false, span })
            }
            Some(Token::Null) => {
                self.advance();
                Ok(Expr::Null { id, span })
            }
            Some(Token::Identifier(text)) => {
                self.advance();
                let name = Name::identifier(text);
                let has_arguments = self.check(&Token::LParen);
                let arguments = if has_arguments { self.parse_arguments()? } else { Vec::new() };
                let lambda = if self.check_same_line(&Token::LBrace) {
                    Some(self.parse_lambda()?)
                } else {
                    None
                };
                if !has_arguments && lambda.is_none() {
                    return Ok(Expr::Name { id, name, span });
                }
                Ok(Expr::Call {
                    id,
                    callee: name,
                    arguments,
                    lambda,
                    span: span.to(self.previous_span()),
                })
            }
            Some(Token::FloatLiteral(_)) | Some(Token::CharLiteral(_)) => {
                Err(self.error_here("floating point and character literals are not supported"))
            }
            Some(Token::LParen) => Err(self.error_here("parenthesized expressions are not supported")),
            _ => Err(self.error_here("expecting an expression")),
        }
    }

    fn parse_arguments(&mut self) -> ParseResult<Vec<Expr>> {
        self.expect(&Token::LParen)?;
        let mut arguments = Vec::new();
        loop {
            self.skip_newlines();
            if self.eat(&Token::RParen) {
                break;
            }
            if matches!(self.peek(), Some(Token::Identifier(_))) && self.peek_at(1) == Some(&Token::Eq) {
                return Err(self.error_here("named arguments are not supported"));
            }
            arguments.push(self.parse_expression()?);
            self.skip_newlines();
            if !self.eat(&Token::Comma) {
                self.skip_newlines();
                self.expect(&Token::RParen)?;
                break;
            }
        }
        Ok(arguments)
    }

    fn parse_lambda(&mut self) -> ParseResult<Vec<Statement>> {
        // Lambda parameters (`x ->`) are not part of the subset
        let mut offset = 1;
        while let Some(token) = self.peek_at(offset) {
            match token {
                Token::Arrow => return Err(self.error_here("lambda parameters are not supported")),
                Token::Identifier(_) | Token::Comma | Token::Colon | Token::Newline => offset += 1,
                _ => break,
            }
        }
        self.parse_block()
    }

    // ── Token helpers ───────────────────────────────────────────────

    fn fresh_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|(t, _)| t)
    }

    fn check(&self, token: &Token) -> bool {
        self.peek() == Some(token)
    }

    /// `token` is next without an intervening newline.
    fn check_same_line(&self, token: &Token) -> bool {
        self.check(token)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn at_statement_end(&self) -> bool {
        matches!(self.peek(), None | Some(Token::Newline | Token::Semicolon | Token::RBrace | Token::RParen | Token::Comma))
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens.get(self.pos).map(|(t, _)| t.clone()).unwrap_or(Token::Newline);
        self.pos += 1;
        token
    }

    fn advance_span(&mut self) -> Span {
        let span = self.current_span();
        self.pos += 1;
        span
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> ParseResult<()> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error_here(format!("expecting {}", token)))
        }
    }

    fn expect_identifier(&mut self) -> ParseResult<Name> {
        match self.peek() {
            Some(Token::Identifier(text)) => {
                let name = Name::identifier(text.as_str());
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.error_here("expecting an identifier")),
        }
    }

    fn parse_qualified_name(&mut self) -> ParseResult<(FqName, Span)> {
        let start = self.current_span();
        let mut segments = vec![self.expect_identifier()?];
        while self.check(&Token::Dot) && matches!(self.peek_at(1), Some(Token::Identifier(_))) {
            self.advance();
            segments.push(self.expect_identifier()?);
        }
        Ok((FqName::from_segments(&segments), start.to(self.previous_span())))
    }

    fn expect_terminator(&mut self) -> ParseResult<()> {
        match self.peek() {
            None | Some(Token::RBrace) => Ok(()),
            Some(Token::Newline | Token::Semicolon) => {
                self.advance();
                Ok(())
            }
            Some(_) => Err(self.error_here("expecting a new line or ';'")),
        }
    }

    fn skip_newlines(&mut self) {
        while self.check(&Token::Newline) {
            self.pos += 1;
        }
    }

    fn skip_separators(&mut self) {
        while matches!(self.peek(), Some(Token::Newline | Token::Semicolon)) {
            self.pos += 1;
        }
    }

    fn skip_balanced(&mut self, open: &Token, close: &Token) -> ParseResult<()> {
        self.expect(open)?;
        let mut depth = 1usize;
        while depth > 0 {
            match self.peek() {
                None => return Err(self.error_here(format!("expecting {}", close))),
                Some(t) if t == open => depth += 1,
                Some(t) if t == close => depth -= 1,
                _ => {}
            }
            self.pos += 1;
        }
        Ok(())
    }

    /// Skip to the next top-level declaration after an error.
    fn synchronize(&mut self) {
        let mut depth = 0i32;
        while let Some(token) = self.peek() {
            match token {
                Token::LBrace => depth += 1,
                Token::RBrace => depth -= 1,
                Token::Newline if depth <= 0 => {
                    self.pos += 1;
                    self.skip_separators();
                    if self.at_end() || self.at_declaration_start() {
                        return;
                    }
                    continue;
                }
                _ => {}
            }
            self.pos += 1;
        }
    }

    fn current_span(&self) -> Span {
        self.tokens.get(self.pos).map(|(_, s)| *s).unwrap_or(self.eof_span)
    }

    fn previous_span(&self) -> Span {
        if self.pos == 0 {
            return self.current_span();
        }
        self.tokens.get(self.pos - 1).map(|(_, s)| *s).unwrap_or(self.eof_span)
    }

    fn error_here(&self, message: impl Into<String>) -> ParseError {
        let message = message.into();
        match self.peek() {
            Some(token) => ParseError::new(format!("{}, found {}", message, token), self.current_span()),
            None => ParseError::new(format!("{}, found end of file", message), self.eof_span),
        }
    }
}

/// Parse `source` as the file at `path`.
pub fn parse_source(source: &str, path: impl Into<PathBuf>) -> Result<SourceUnit, Vec<ParseError>> {
    Parser::new(source, path)?.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> SourceUnit {
        parse_source(source, "/src/test.kt").expect("source should parse")
    }

    #[test]
    fn test_package_and_imports() {
        let unit = parse("package foo.bar\n\nimport a.b.C\nimport a.d.*\nimport x.Y as Z\n");
        assert_eq!(unit.package, FqName::new("foo.bar"));
        assert_eq!(unit.imports.len(), 3);
        assert!(unit.imports[1].all_under);
        assert_eq!(unit.imports[2].imported_name().unwrap().as_str(), "Z");
    }

    #[test]
    fn test_missing_package_is_root() {
        let unit = parse("fun main(args: Array<String>) {}");
        assert!(unit.package.is_root());
    }

    #[test]
    fn test_main_function() {
        let unit = parse("fun main(args: Array<String>) {\n    println(\"Hello\")\n}\n");
        let main = unit.functions().next().unwrap();
        assert_eq!(main.name.as_str(), "main");
        assert_eq!(main.parameters.len(), 1);
        assert!(main.parameters[0].type_ref.is_simple("Array"));
        assert_eq!(main.parameters[0].type_ref.arguments.len(), 1);
        match &main.body {
            Some(FunctionBody::Block(statements)) => assert_eq!(statements.len(), 1),
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn test_class_with_members_and_class_object() {
        let unit = parse(
            "open class Foo<T>(val x: Int, y: String) : Base(), Iface {\n\
             fun bar(): Int = 1\n\
             val z = \"s\"\n\
             class Nested\n\
             class object {\n\
               fun create() {}\n\
             }\n\
             }\n",
        );
        let class = unit.classes().next().unwrap();
        assert_eq!(class.name.as_str(), "Foo");
        assert!(class.modifiers.is_open);
        assert_eq!(class.type_parameters.len(), 1);
        assert_eq!(class.constructor_parameters.len(), 2);
        assert_eq!(class.constructor_parameters[0].property, Some(Mutability::Val));
        assert_eq!(class.supertypes.len(), 2);
        assert!(class.supertypes[0].constructor_call);
        assert_eq!(class.functions().count(), 1);
        assert_eq!(class.properties().count(), 1);
        assert_eq!(class.nested_classes().count(), 1);
        let object = class.class_object.as_ref().unwrap();
        assert_eq!(object.kind, ClassKind::ClassObject);
        assert_eq!(object.functions().count(), 1);
    }

    #[test]
    fn test_companion_object_is_class_object() {
        let unit = parse("class A {\n companion object Factory {\n }\n}\n");
        let class = unit.classes().next().unwrap();
        assert_eq!(class.class_object.as_ref().unwrap().name.as_str(), "object");
    }

    #[test]
    fn test_enum_class_entries() {
        let unit = parse("enum class Color { RED, GREEN, BLUE }");
        let class = unit.classes().next().unwrap();
        assert_eq!(class.kind, ClassKind::Enum);
        assert_eq!(class.enum_entries.len(), 3);
    }

    #[test]
    fn test_extension_function_receiver() {
        let unit = parse("fun String.shout(): String = this_is_unsupported_anyway\n");
        let function = unit.functions().next().unwrap();
        assert_eq!(function.name.as_str(), "shout");
        assert!(function.receiver.as_ref().unwrap().is_simple("String"));
    }

    #[test]
    fn test_statements() {
        let unit = parse(
            "fun f(): Int {\n val a = 1\n var b = \"x\"\n b = \"y\"\n g(a, b) { sources += \"k\" }\n return a\n}\n",
        );
        let function = unit.functions().next().unwrap();
        let Some(FunctionBody::Block(statements)) = &function.body else {
            panic!("expected a block body");
        };
        assert_eq!(statements.len(), 5);
        assert!(matches!(statements[0], Statement::Local { mutability: Mutability::Val, .. }));
        assert!(matches!(statements[2], Statement::Assign { op: AssignOp::Set, .. }));
        match &statements[3] {
            Statement::Expr(Expr::Call { arguments, lambda: Some(body), .. }) => {
                assert_eq!(arguments.len(), 2);
                assert!(matches!(body[0], Statement::Assign { op: AssignOp::Append, .. }));
            }
            other => panic!("unexpected statement {:?}", other),
        }
        assert!(matches!(statements[4], Statement::Return { value: Some(_), .. }));
    }

    #[test]
    fn test_script_statements() {
        let unit = parse_source("println(\"hi\")\nfun helper() {}\n", "/src/build.kts").unwrap();
        assert!(unit.is_script());
        assert_eq!(unit.script.as_ref().unwrap().len(), 1);
        assert_eq!(unit.functions().count(), 1);
    }

    #[test]
    fn test_top_level_statement_is_error_outside_scripts() {
        let errors = parse_source("println(\"hi\")\n", "/src/a.kt").unwrap_err();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_operator_expression_is_rejected() {
        let errors = parse_source("fun f() = 1 + 2\n", "/src/a.kt").unwrap_err();
        assert!(errors[0].message.contains("only literals"));
    }

    #[test]
    fn test_recovers_after_error() {
        let errors = parse_source("fun f() = 1 + 2\nfun g() = (3)\nfun h() {}\n", "/src/a.kt").unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_file_annotation_is_skipped() {
        let unit = parse("@file:JvmName(\"Utils\")\npackage p\n");
        assert_eq!(unit.package, FqName::new("p"));
    }

    #[test]
    fn test_node_ids_are_unique() {
        let unit = parse("class A\nclass B\nfun c() {}\n");
        let a = unit.classes().next().unwrap().id;
        let b = unit.classes().nth(1).unwrap().id;
        let c = unit.functions().next().unwrap().id;
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert!(unit.find_class(b).is_some());
    }
}
