use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

use crate::errors::LexError;

/// The closed set of token kinds the parser dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // Structural delimiters
    Colon, OpenParen, CloseParen,

    // Section keywords
    Declaracoes, Algoritmo,

    // Type keywords
    Inteiro, Real,

    // Statement keywords
    Atribuir, A, Ler, Imprimir, Se, Entao, Senao, Enquanto, Inicio, Fim,

    // Arithmetic operators
    Plus, Minus, Star, Slash,

    // Relational operators
    NotEqual, Equal, Greater, GreaterEqual, Less, LessEqual,

    // Boolean connectives
    E, Ou,

    // Literals
    IntLiteral, RealLiteral, StringLiteral,

    // Identifiers
    Ident,

    // End of the token stream
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenKind::Colon => ":",
            TokenKind::OpenParen => "(",
            TokenKind::CloseParen => ")",
            TokenKind::Declaracoes => "DECLARACOES",
            TokenKind::Algoritmo => "ALGORITMO",
            TokenKind::Inteiro => "INTEIRO",
            TokenKind::Real => "REAL",
            TokenKind::Atribuir => "ATRIBUIR",
            TokenKind::A => "A",
            TokenKind::Ler => "LER",
            TokenKind::Imprimir => "IMPRIMIR",
            TokenKind::Se => "SE",
            TokenKind::Entao => "ENTAO",
            TokenKind::Senao => "SENAO",
            TokenKind::Enquanto => "ENQUANTO",
            TokenKind::Inicio => "INICIO",
            TokenKind::Fim => "FIM",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::NotEqual => "<>",
            TokenKind::Equal => "=",
            TokenKind::Greater => ">",
            TokenKind::GreaterEqual => ">=",
            TokenKind::Less => "<",
            TokenKind::LessEqual => "<=",
            TokenKind::E => "E",
            TokenKind::Ou => "OU",
            TokenKind::IntLiteral => "integer literal",
            TokenKind::RealLiteral => "real literal",
            TokenKind::StringLiteral => "string literal",
            TokenKind::Ident => "identifier",
            TokenKind::Eof => "end of input",
        };
        f.write_str(s)
    }
}

/// A classified lexical unit. The lexeme and position are carried for
/// diagnostics only; grammar decisions look at the kind alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: &str, line: usize, column: usize) -> Self {
        Token { kind, lexeme: lexeme.to_string(), line, column }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kind == TokenKind::Eof {
            write!(f, "end of input")
        } else {
            write!(f, "'{}' ({})", self.lexeme, self.kind)
        }
    }
}

/// Map a word to its keyword kind, if it is one. Keywords are the exact
/// uppercase forms; anything else is an identifier.
fn keyword_kind(word: &str) -> Option<TokenKind> {
    match word {
        "DECLARACOES" => Some(TokenKind::Declaracoes),
        "ALGORITMO" => Some(TokenKind::Algoritmo),
        "INTEIRO" => Some(TokenKind::Inteiro),
        "REAL" => Some(TokenKind::Real),
        "ATRIBUIR" => Some(TokenKind::Atribuir),
        "A" => Some(TokenKind::A),
        "LER" => Some(TokenKind::Ler),
        "IMPRIMIR" => Some(TokenKind::Imprimir),
        "SE" => Some(TokenKind::Se),
        "ENTAO" => Some(TokenKind::Entao),
        "SENAO" => Some(TokenKind::Senao),
        "ENQUANTO" => Some(TokenKind::Enquanto),
        "INICIO" => Some(TokenKind::Inicio),
        "FIM" => Some(TokenKind::Fim),
        "E" => Some(TokenKind::E),
        "OU" => Some(TokenKind::Ou),
        _ => None,
    }
}

pub struct Lexer<'a> {
    input: Peekable<Chars<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer {
            input: input.chars().peekable(),
            line: 1,
            column: 1,
        }
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.input.next();
        if let Some(c) = ch {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        ch
    }

    fn peek(&mut self) -> Option<&char> {
        self.input.peek()
    }

    fn skip_whitespace(&mut self) {
        while let Some(&ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// NUMINT is a digit run; NUMREAL is digits '.' digits. A dot with no
    /// digit after it is malformed rather than two tokens, since the
    /// language has no standalone dot.
    fn read_number(&mut self, first: char, line: usize, column: usize) -> Result<Token, LexError> {
        let mut num = String::from(first);
        while let Some(&ch) = self.peek() {
            if ch.is_ascii_digit() {
                num.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        if let Some(&'.') = self.peek() {
            num.push('.');
            self.advance();
            let mut saw_digit = false;
            while let Some(&ch) = self.peek() {
                if ch.is_ascii_digit() {
                    num.push(ch);
                    self.advance();
                    saw_digit = true;
                } else {
                    break;
                }
            }
            if !saw_digit {
                return Err(LexError::MalformedReal { line, column });
            }
            return Ok(Token::new(TokenKind::RealLiteral, &num, line, column));
        }

        Ok(Token::new(TokenKind::IntLiteral, &num, line, column))
    }

    fn read_word(&mut self, first: char, line: usize, column: usize) -> Token {
        let mut word = String::from(first);
        while let Some(&ch) = self.peek() {
            if ch.is_alphanumeric() || ch == '_' {
                word.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        match keyword_kind(&word) {
            Some(kind) => Token::new(kind, &word, line, column),
            None => Token::new(TokenKind::Ident, &word, line, column),
        }
    }

    fn read_string(&mut self, line: usize, column: usize) -> Result<Token, LexError> {
        let mut text = String::new();
        loop {
            match self.advance() {
                Some('"') => break,
                Some(ch) => text.push(ch),
                None => return Err(LexError::UnterminatedString { line, column }),
            }
        }
        Ok(Token::new(TokenKind::StringLiteral, &text, line, column))
    }

    /// Tokenize the whole input. The returned vector always ends with an
    /// `Eof` token.
    pub fn tokenize(&mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace();
            let line = self.line;
            let column = self.column;

            let token = match self.advance() {
                None => {
                    tokens.push(Token::new(TokenKind::Eof, "", line, column));
                    break;
                }
                Some(ch) => match ch {
                    ':' => Token::new(TokenKind::Colon, ":", line, column),
                    '(' => Token::new(TokenKind::OpenParen, "(", line, column),
                    ')' => Token::new(TokenKind::CloseParen, ")", line, column),
                    '+' => Token::new(TokenKind::Plus, "+", line, column),
                    '-' => Token::new(TokenKind::Minus, "-", line, column),
                    '*' => Token::new(TokenKind::Star, "*", line, column),
                    '/' => Token::new(TokenKind::Slash, "/", line, column),
                    '=' => Token::new(TokenKind::Equal, "=", line, column),
                    '<' => match self.peek() {
                        Some('>') => {
                            self.advance();
                            Token::new(TokenKind::NotEqual, "<>", line, column)
                        }
                        Some('=') => {
                            self.advance();
                            Token::new(TokenKind::LessEqual, "<=", line, column)
                        }
                        _ => Token::new(TokenKind::Less, "<", line, column),
                    },
                    '>' => match self.peek() {
                        Some('=') => {
                            self.advance();
                            Token::new(TokenKind::GreaterEqual, ">=", line, column)
                        }
                        _ => Token::new(TokenKind::Greater, ">", line, column),
                    },
                    '"' => self.read_string(line, column)?,
                    c if c.is_ascii_digit() => self.read_number(c, line, column)?,
                    c if c.is_alphabetic() => self.read_word(c, line, column),
                    c => return Err(LexError::UnexpectedChar { ch: c, line, column }),
                },
            };

            tokens.push(token);
        }

        Ok(tokens)
    }
}
