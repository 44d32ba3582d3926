//! Token definitions for the Kotlin subset understood by the frontend.

use logos::Logos;
use std::fmt;

/// Source location of a token or syntax node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    /// Byte offset of the first character
    pub start: u32,
    /// Byte offset one past the last character
    pub end: u32,
    /// 1-based line
    pub line: u32,
    /// 1-based column
    pub column: u32,
}

impl Span {
    pub fn new(start: u32, end: u32, line: u32, column: u32) -> Self {
        Self { start, end, line, column }
    }

    /// A span covering `self` through `other`.
    pub fn to(self, other: Span) -> Span {
        Span {
            start: self.start,
            end: other.end.max(self.end),
            line: self.line,
            column: self.column,
        }
    }
}

/// A lexical token.
///
/// Soft keywords (`companion`, `enum`, modifiers, …) are plain identifiers and
/// are recognized by the parser from their text.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\f]+")]
#[logos(skip r"//[^\n]*")]
pub enum Token {
    #[regex(r"/\*", skip_block_comment)]
    BlockComment,

    #[token("\n")]
    Newline,

    // Hard keywords
    #[token("package")]
    Package,
    #[token("import")]
    Import,
    #[token("class")]
    Class,
    #[token("interface")]
    Interface,
    #[token("object")]
    Object,
    #[token("fun")]
    Fun,
    #[token("val")]
    Val,
    #[token("var")]
    Var,
    #[token("return")]
    Return,
    #[token("as")]
    As,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("null")]
    Null,

    // Literals
    #[regex(r"[0-9][0-9_]*[lL]?", parse_int, priority = 3)]
    #[regex(r"0[xX][0-9a-fA-F_]+[lL]?", parse_hex)]
    IntLiteral(i64),

    #[regex(r"[0-9][0-9_]*\.[0-9][0-9_]*([eE][+-]?[0-9]+)?[fF]?", |lex| lex.slice().to_string())]
    FloatLiteral(String),

    #[token("\"", quoted_string)]
    #[token(r#"""""#, raw_string)]
    StringLiteral(String),

    #[regex(r"'([^'\\\n]|\\.)+'", |lex| lex.slice().to_string())]
    CharLiteral(String),

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    #[regex(r"`[^`\n]+`", |lex| lex.slice().trim_matches('`').to_string())]
    Identifier(String),

    // Punctuation
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token(":")]
    Colon,
    #[token(";")]
    Semicolon,
    #[token("=")]
    Eq,
    #[token("+=")]
    PlusEq,
    #[token("?")]
    Question,
    #[token("@")]
    At,
    #[token("->")]
    Arrow,
    #[token("*")]
    Star,

    /// Operators the subset does not give meaning to
    #[token("==")]
    #[token("!=")]
    #[token("===")]
    #[token("!==")]
    #[token("<=")]
    #[token(">=")]
    #[token("&&")]
    #[token("||")]
    #[token("!")]
    #[token("!!")]
    #[token("+")]
    #[token("-")]
    #[token("/")]
    #[token("%")]
    #[token("++")]
    #[token("--")]
    #[token("-=")]
    #[token("*=")]
    #[token("/=")]
    #[token("%=")]
    #[token("..")]
    #[token("::")]
    #[token("?.")]
    #[token("?:")]
    #[token("&")]
    #[token("|")]
    #[token("^")]
    #[token("~")]
    #[token("#")]
    #[token("$")]
    Operator,
}

impl Token {
    /// Identifier text, if this is an identifier.
    pub fn identifier(&self) -> Option<&str> {
        match self {
            Token::Identifier(text) => Some(text),
            _ => None,
        }
    }

    /// Whether this is the identifier `text` (used for soft keywords).
    pub fn is_soft_keyword(&self, text: &str) -> bool {
        self.identifier() == Some(text)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::BlockComment => write!(f, "comment"),
            Token::Newline => write!(f, "newline"),
            Token::Package => write!(f, "'package'"),
            Token::Import => write!(f, "'import'"),
            Token::Class => write!(f, "'class'"),
            Token::Interface => write!(f, "'interface'"),
            Token::Object => write!(f, "'object'"),
            Token::Fun => write!(f, "'fun'"),
            Token::Val => write!(f, "'val'"),
            Token::Var => write!(f, "'var'"),
            Token::Return => write!(f, "'return'"),
            Token::As => write!(f, "'as'"),
            Token::True => write!(f, "'true'"),
            Token::False => write!(f, "'false'"),
            Token::Null => write!(f, "'null'"),
            Token::IntLiteral(value) => write!(f, "integer literal {}", value),
            Token::FloatLiteral(text) => write!(f, "floating point literal {}", text),
            Token::StringLiteral(_) => write!(f, "string literal"),
            Token::CharLiteral(text) => write!(f, "character literal {}", text),
            Token::Identifier(text) => write!(f, "identifier '{}'", text),
            Token::LBrace => write!(f, "'{{'"),
            Token::RBrace => write!(f, "'}}'"),
            Token::LParen => write!(f, "'('"),
            Token::RParen => write!(f, "')'"),
            Token::LBracket => write!(f, "'['"),
            Token::RBracket => write!(f, "']'"),
            Token::Lt => write!(f, "'<'"),
            Token::Gt => write!(f, "'>'"),
            Token::Comma => write!(f, "','"),
            Token::Dot => write!(f, "'.'"),
            Token::Colon => write!(f, "':'"),
            Token::Semicolon => write!(f, "';'"),
            Token::Eq => write!(f, "'='"),
            Token::PlusEq => write!(f, "'+='"),
            Token::Question => write!(f, "'?'"),
            Token::At => write!(f, "'@'"),
            Token::Arrow => write!(f, "'->'"),
            Token::Star => write!(f, "'*'"),
            Token::Operator => write!(f, "operator"),
        }
    }
}

/// Skip a block comment. Kotlin block comments nest.
fn skip_block_comment(lex: &mut logos::Lexer<Token>) -> logos::Skip {
    let remainder = lex.remainder();
    let bytes = remainder.as_bytes();
    let mut depth = 1usize;
    let mut i = 0usize;
    while i < bytes.len() && depth > 0 {
        if bytes[i] == b'/' && bytes.get(i + 1) == Some(&b'*') {
            depth += 1;
            i += 2;
        } else if bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/') {
            depth -= 1;
            i += 2;
        } else {
            i += 1;
        }
    }
    // Unterminated comments run to end of input
    lex.bump(i);
    logos::Skip
}

fn parse_int(lex: &mut logos::Lexer<Token>) -> Option<i64> {
    let text = lex.slice().trim_end_matches(['l', 'L']).replace('_', "");
    text.parse().ok()
}

fn parse_hex(lex: &mut logos::Lexer<Token>) -> Option<i64> {
    let text = lex.slice()[2..].trim_end_matches(['l', 'L']).replace('_', "");
    i64::from_str_radix(&text, 16).ok()
}

/// Scan a `"…"` literal after its opening quote. An unterminated literal or
/// one broken by a newline is a lexing error.
fn quoted_string(lex: &mut logos::Lexer<Token>) -> Option<String> {
    let remainder = lex.remainder();
    let mut chars = remainder.char_indices();
    let mut end = None;
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => {
                end = Some(i);
                break;
            }
            '\\' => {
                chars.next();
            }
            '\n' => return None,
            _ => {}
        }
    }
    let end = end?;
    let content = unescape(&remainder[..end]);
    lex.bump(end + 1);
    content
}

fn unescape(inner: &str) -> Option<String> {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{8}'),
            '\\' => out.push('\\'),
            '"' => out.push('"'),
            '\'' => out.push('\''),
            '$' => out.push('$'),
            'u' => {
                let hex: String = chars.by_ref().take(4).collect();
                let code = u32::from_str_radix(&hex, 16).ok()?;
                out.push(char::from_u32(code)?);
            }
            _ => return None,
        }
    }
    Some(out)
}

fn raw_string(lex: &mut logos::Lexer<Token>) -> Option<String> {
    let remainder = lex.remainder();
    let end = remainder.find(r#"""""#)?;
    let content = remainder[..end].to_string();
    lex.bump(end + 3);
    Some(content)
}
