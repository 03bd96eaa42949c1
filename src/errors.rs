use thiserror::Error;

use crate::lexer::{Token, TokenKind};

/// Tokenization failure. Aborts the run before the parser ever starts.
#[derive(Debug, Clone, Error)]
pub enum LexError {
    #[error("lexical error: unexpected character '{ch}' at line {line}, column {column}")]
    UnexpectedChar { ch: char, line: usize, column: usize },
    #[error("lexical error: unterminated string starting at line {line}, column {column}")]
    UnterminatedString { line: usize, column: usize },
    #[error("lexical error: malformed real literal at line {line}, column {column}")]
    MalformedReal { line: usize, column: usize },
}

/// The single syntax failure surface: the set of token kinds that would have
/// been acceptable at the point of failure, and the token actually found.
/// Non-recoverable; unwinds to the top-level parse entry point.
#[derive(Debug, Clone, Error)]
#[error("syntax error: expected one of ({}) but found {found}", kind_list(.expected))]
pub struct SyntaxError {
    pub expected: Vec<TokenKind>,
    pub found: Token,
}

impl SyntaxError {
    pub fn new(expected: Vec<TokenKind>, found: Token) -> Self {
        SyntaxError { expected, found }
    }
}

fn kind_list(kinds: &[TokenKind]) -> String {
    kinds
        .iter()
        .map(|k| k.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
