//! Lexer for Kotlin sources.
//!
//! Wraps the logos-generated `Token` lexer and attaches line/column
//! information to every token.

use logos::Logos;
use thiserror::Error;

use super::token::{Span, Token};

/// Lexer error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexError {
    #[error("unexpected character '{text}' at {}:{}", span.line, span.column)]
    UnexpectedCharacter { text: String, span: Span },
}

impl LexError {
    pub fn span(&self) -> Span {
        match self {
            LexError::UnexpectedCharacter { span, .. } => *span,
        }
    }
}

/// Converts source text into a token stream.
pub struct Lexer<'a> {
    source: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            source
                .bytes()
                .enumerate()
                .filter(|&(_, b)| b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self { source, line_starts }
    }

    /// Tokenize the whole source.
    ///
    /// All errors are collected; on failure no tokens are returned.
    pub fn tokenize(self) -> Result<Vec<(Token, Span)>, Vec<LexError>> {
        let mut tokens = Vec::new();
        let mut errors = Vec::new();
        let mut lexer = Token::lexer(self.source);

        while let Some(result) = lexer.next() {
            let range = lexer.span();
            let span = self.span_for(range.start, range.end);
            match result {
                Ok(token) => tokens.push((token, span)),
                Err(()) => errors.push(LexError::UnexpectedCharacter {
                    text: self.source[range].to_string(),
                    span,
                }),
            }
        }

        if errors.is_empty() {
            Ok(tokens)
        } else {
            Err(errors)
        }
    }

    fn span_for(&self, start: usize, end: usize) -> Span {
        let line_index = match self.line_starts.binary_search(&start) {
            Ok(index) => index,
            Err(index) => index - 1,
        };
        let column = start - self.line_starts[line_index] + 1;
        Span::new(start as u32, end as u32, line_index as u32 + 1, column as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        Lexer::new(source)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|(token, _)| token)
            .collect()
    }

    #[test]
    fn test_keywords_and_identifiers() {
        let tokens = kinds("package foo.bar");
        assert_eq!(
            tokens,
            vec![
                Token::Package,
                Token::Identifier("foo".to_string()),
                Token::Dot,
                Token::Identifier("bar".to_string()),
            ]
        );
    }

    #[test]
    fn test_newlines_are_tokens() {
        let tokens = kinds("val a\nval b");
        assert_eq!(tokens[2], Token::Newline);
    }

    #[test]
    fn test_nested_block_comment_is_skipped() {
        let tokens = kinds("/* outer /* inner */ still comment */ fun");
        assert_eq!(tokens, vec![Token::Fun]);
    }

    #[test]
    fn test_line_comment_is_skipped() {
        let tokens = kinds("fun // trailing words\n");
        assert_eq!(tokens, vec![Token::Fun, Token::Newline]);
    }

    #[test]
    fn test_string_escapes() {
        let tokens = kinds(r#""a\tb\"c""#);
        assert_eq!(tokens, vec![Token::StringLiteral("a\tb\"c".to_string())]);
    }

    #[test]
    fn test_empty_string_and_escaped_backslash() {
        let tokens = kinds(r#"("", "a\\")"#);
        assert_eq!(tokens[1], Token::StringLiteral(String::new()));
        assert_eq!(tokens[3], Token::StringLiteral("a\\".to_string()));
    }

    #[test]
    fn test_long_string_literal() {
        let text = "x".repeat(70_000);
        let tokens = kinds(&format!("println(\"{}\")", text));
        assert_eq!(tokens[2], Token::StringLiteral(text));
        assert_eq!(tokens[3], Token::RParen);
    }

    #[test]
    fn test_unterminated_string_is_error() {
        assert!(Lexer::new("val s = \"open\nval t = 1").tokenize().is_err());
        assert!(Lexer::new("val s = \"open").tokenize().is_err());
    }

    #[test]
    fn test_raw_string() {
        let tokens = kinds("\"\"\"raw \\n text\"\"\"");
        assert_eq!(tokens, vec![Token::StringLiteral("raw \\n text".to_string())]);
    }

    #[test]
    fn test_generic_closing_angles_are_separate() {
        let tokens = kinds("Array<List<String>>");
        assert_eq!(tokens.iter().filter(|t| **t == Token::Gt).count(), 2);
    }

    #[test]
    fn test_int_literals() {
        assert_eq!(kinds("1_000"), vec![Token::IntLiteral(1000)]);
        assert_eq!(kinds("0xFF"), vec![Token::IntLiteral(255)]);
        assert_eq!(kinds("42L"), vec![Token::IntLiteral(42)]);
    }

    #[test]
    fn test_span_line_and_column() {
        let tokens = Lexer::new("fun\n  main").tokenize().unwrap();
        let (_, span) = &tokens[2];
        assert_eq!(span.line, 2);
        assert_eq!(span.column, 3);
    }

    #[test]
    fn test_unexpected_character() {
        let errors = Lexer::new("fun \u{00a7}").tokenize().unwrap_err();
        assert_eq!(errors.len(), 1);
    }
}
