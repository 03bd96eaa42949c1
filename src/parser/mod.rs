use std::collections::VecDeque;

use crate::errors::SyntaxError;
use crate::lexer::{Token, TokenKind};

/// How many upcoming tokens the parser keeps buffered.
pub const LOOKAHEAD_CAPACITY: usize = 10;

/// Producer of classified tokens. Must eventually yield an `Eof` token;
/// the buffer stops querying once it has one.
pub trait TokenSource {
    fn next_token(&mut self) -> Token;
}

/// Adapter over an already-lexed token vector.
pub struct TokenList {
    tokens: VecDeque<Token>,
}

impl TokenList {
    pub fn new(tokens: Vec<Token>) -> Self {
        TokenList { tokens: tokens.into() }
    }
}

impl TokenSource for TokenList {
    fn next_token(&mut self) -> Token {
        self.tokens
            .pop_front()
            .unwrap_or_else(|| Token::new(TokenKind::Eof, "", 0, 0))
    }
}

/// Observer for the two instrumentation points of the engine: a token
/// becoming the front of the buffer, and a token being consumed by a
/// successful match. Never affects control flow.
pub trait TraceHook {
    fn token_revealed(&mut self, _token: &Token) {}
    fn token_consumed(&mut self, _token: &Token) {}
}

/// Trace hook that prints one line per event, for `--trace`.
pub struct StdoutTrace;

impl TraceHook for StdoutTrace {
    fn token_revealed(&mut self, token: &Token) {
        println!("read:  {token}");
    }

    fn token_consumed(&mut self, token: &Token) {
        println!("match: {token}");
    }
}

/// Fixed-capacity sliding window over the token source.
///
/// Holds at most `LOOKAHEAD_CAPACITY` upcoming tokens. The source is never
/// queried again once the `Eof` token has been buffered, and the terminal
/// token stays visible after being consumed, so the buffer is never empty
/// after construction.
struct Lookahead<S: TokenSource> {
    source: S,
    buf: VecDeque<Token>,
    reached_end: bool,
}

impl<S: TokenSource> Lookahead<S> {
    fn new(source: S) -> Self {
        let mut la = Lookahead {
            source,
            buf: VecDeque::with_capacity(LOOKAHEAD_CAPACITY),
            reached_end: false,
        };
        la.refill();
        la
    }

    fn refill(&mut self) {
        while self.buf.len() < LOOKAHEAD_CAPACITY && !self.reached_end {
            let token = self.source.next_token();
            if token.kind == TokenKind::Eof {
                self.reached_end = true;
            }
            self.buf.push_back(token);
        }
    }

    /// Drop the front token and top the buffer back up. Called exactly once
    /// per successful match.
    fn advance(&mut self) {
        let front = self.buf.pop_front();
        self.refill();
        if self.buf.is_empty() {
            // The only token that can be consumed last is the terminal;
            // keep it visible so peek stays total.
            if let Some(end) = front {
                self.buf.push_back(end);
            }
        }
    }

    /// Token at position `k` (1-indexed) without consuming. Peeking past
    /// the held tokens clamps to the last one, which is the terminal token
    /// once the stream is exhausted.
    fn peek(&self, k: usize) -> &Token {
        debug_assert!(k >= 1, "lookahead offsets are 1-indexed");
        self.buf
            .get(k - 1)
            .or_else(|| self.buf.back())
            .expect("lookahead buffer is filled at construction")
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.buf.len()
    }
}

/// First set of `comando`, also the expected set reported when no
/// alternative matches.
const COMMAND_FIRST: [TokenKind; 6] = [
    TokenKind::Atribuir,
    TokenKind::Ler,
    TokenKind::Imprimir,
    TokenKind::Se,
    TokenKind::Enquanto,
    TokenKind::Inicio,
];

/// First set of `fatorAritmetico`, shared with the `termoRelacional` guard.
const FACTOR_FIRST: [TokenKind; 4] = [
    TokenKind::IntLiteral,
    TokenKind::RealLiteral,
    TokenKind::Ident,
    TokenKind::OpenParen,
];

const REL_OP: [TokenKind; 6] = [
    TokenKind::NotEqual,
    TokenKind::Equal,
    TokenKind::Greater,
    TokenKind::GreaterEqual,
    TokenKind::Less,
    TokenKind::LessEqual,
];

/// Recursive-descent recognizer for the Alguma grammar, one method per
/// nonterminal. A successful parse returns `Ok(())`; the first violation
/// aborts with a `SyntaxError` and no recovery is attempted.
pub struct Parser<S: TokenSource> {
    lookahead: Lookahead<S>,
    trace: Option<Box<dyn TraceHook>>,
}

impl<S: TokenSource> Parser<S> {
    pub fn new(source: S) -> Self {
        Parser {
            lookahead: Lookahead::new(source),
            trace: None,
        }
    }

    pub fn with_trace(mut self, hook: Box<dyn TraceHook>) -> Self {
        self.trace = Some(hook);
        self
    }

    /// Parse one program. Accepts by returning normally after consuming
    /// the terminal token.
    pub fn parse(&mut self) -> Result<(), SyntaxError> {
        if let Some(hook) = self.trace.as_deref_mut() {
            hook.token_revealed(self.lookahead.peek(1));
        }
        self.parse_program()
    }

    fn peek(&self, k: usize) -> &Token {
        self.lookahead.peek(k)
    }

    /// The match primitive: assert the next token's kind and consume it.
    fn expect(&mut self, kind: TokenKind) -> Result<(), SyntaxError> {
        if self.peek(1).kind != kind {
            return Err(self.error(&[kind]));
        }
        if let Some(hook) = self.trace.as_deref_mut() {
            hook.token_consumed(self.lookahead.peek(1));
        }
        self.lookahead.advance();
        if let Some(hook) = self.trace.as_deref_mut() {
            hook.token_revealed(self.lookahead.peek(1));
        }
        Ok(())
    }

    fn error(&self, expected: &[TokenKind]) -> SyntaxError {
        SyntaxError::new(expected.to_vec(), self.peek(1).clone())
    }

    // programa : ':' 'DECLARACOES' listaDeclaracoes ':' 'ALGORITMO' listaComandos <eof>
    fn parse_program(&mut self) -> Result<(), SyntaxError> {
        self.expect(TokenKind::Colon)?;
        self.expect(TokenKind::Declaracoes)?;
        self.parse_declaration_list()?;
        self.expect(TokenKind::Colon)?;
        self.expect(TokenKind::Algoritmo)?;
        self.parse_command_list()?;
        self.expect(TokenKind::Eof)
    }

    // listaDeclaracoes : declaracao listaDeclaracoes | declaracao
    //
    // Not decidable at offset 1: both alternatives start with an identifier.
    // A declaration is exactly three tokens, so the token at offset 4 tells
    // the list shape: the section delimiter closes the list, another
    // identifier means one more declaration follows.
    fn parse_declaration_list(&mut self) -> Result<(), SyntaxError> {
        match self.peek(4).kind {
            TokenKind::Colon => self.parse_declaration(),
            TokenKind::Ident => {
                self.parse_declaration()?;
                self.parse_declaration_list()
            }
            _ => Err(self.error(&[TokenKind::Colon, TokenKind::Ident])),
        }
    }

    // declaracao : VAR ':' tipoVar
    fn parse_declaration(&mut self) -> Result<(), SyntaxError> {
        self.expect(TokenKind::Ident)?;
        self.expect(TokenKind::Colon)?;
        self.parse_var_type()
    }

    // tipoVar : 'INTEIRO' | 'REAL'
    fn parse_var_type(&mut self) -> Result<(), SyntaxError> {
        match self.peek(1).kind {
            TokenKind::Inteiro => self.expect(TokenKind::Inteiro),
            TokenKind::Real => self.expect(TokenKind::Real),
            _ => Err(self.error(&[TokenKind::Inteiro, TokenKind::Real])),
        }
    }

    // expressaoAritmetica : termoAritmetico (('+'|'-') termoAritmetico)*
    //
    // The grammar is left-recursive; after the standard removal the
    // repetition becomes a loop on the continuation operators.
    fn parse_arith_expr(&mut self) -> Result<(), SyntaxError> {
        self.parse_arith_term()?;
        while matches!(self.peek(1).kind, TokenKind::Plus | TokenKind::Minus) {
            let op = self.peek(1).kind;
            self.expect(op)?;
            self.parse_arith_term()?;
        }
        Ok(())
    }

    // termoAritmetico : fatorAritmetico (('*'|'/') fatorAritmetico)*
    fn parse_arith_term(&mut self) -> Result<(), SyntaxError> {
        self.parse_arith_factor()?;
        while matches!(self.peek(1).kind, TokenKind::Star | TokenKind::Slash) {
            let op = self.peek(1).kind;
            self.expect(op)?;
            self.parse_arith_factor()?;
        }
        Ok(())
    }

    // fatorAritmetico : NUMINT | NUMREAL | VAR | '(' expressaoAritmetica ')'
    fn parse_arith_factor(&mut self) -> Result<(), SyntaxError> {
        match self.peek(1).kind {
            TokenKind::IntLiteral => self.expect(TokenKind::IntLiteral),
            TokenKind::RealLiteral => self.expect(TokenKind::RealLiteral),
            TokenKind::Ident => self.expect(TokenKind::Ident),
            TokenKind::OpenParen => {
                self.expect(TokenKind::OpenParen)?;
                self.parse_arith_expr()?;
                self.expect(TokenKind::CloseParen)
            }
            _ => Err(self.error(&FACTOR_FIRST)),
        }
    }

    // expressaoRelacional : termoRelacional (operadorBooleano termoRelacional)*
    fn parse_rel_expr(&mut self) -> Result<(), SyntaxError> {
        self.parse_rel_term()?;
        while matches!(self.peek(1).kind, TokenKind::E | TokenKind::Ou) {
            self.parse_bool_op()?;
            self.parse_rel_term()?;
        }
        Ok(())
    }

    // termoRelacional : expressaoAritmetica opRel expressaoAritmetica
    //
    // Only arithmetic expressions may be parenthesized: an opening paren
    // here starts an arithmetic operand, never a grouped relational
    // expression. That restriction is part of the language.
    fn parse_rel_term(&mut self) -> Result<(), SyntaxError> {
        if !FACTOR_FIRST.contains(&self.peek(1).kind) {
            return Err(self.error(&FACTOR_FIRST));
        }
        self.parse_arith_expr()?;
        self.parse_rel_op()?;
        self.parse_arith_expr()
    }

    // opRel : '<>' | '=' | '>' | '>=' | '<' | '<='
    fn parse_rel_op(&mut self) -> Result<(), SyntaxError> {
        let kind = self.peek(1).kind;
        if REL_OP.contains(&kind) {
            self.expect(kind)
        } else {
            Err(self.error(&REL_OP))
        }
    }

    // operadorBooleano : 'E' | 'OU'
    fn parse_bool_op(&mut self) -> Result<(), SyntaxError> {
        match self.peek(1).kind {
            TokenKind::E => self.expect(TokenKind::E),
            TokenKind::Ou => self.expect(TokenKind::Ou),
            _ => Err(self.error(&[TokenKind::E, TokenKind::Ou])),
        }
    }

    // listaComandos : comando+
    fn parse_command_list(&mut self) -> Result<(), SyntaxError> {
        self.parse_command()?;
        while COMMAND_FIRST.contains(&self.peek(1).kind) {
            self.parse_command()?;
        }
        Ok(())
    }

    // comando : comandoAtribuicao | comandoEntrada | comandoSaida
    //         | comandoCondicao | comandoRepeticao | subAlgoritmo
    fn parse_command(&mut self) -> Result<(), SyntaxError> {
        match self.peek(1).kind {
            TokenKind::Atribuir => self.parse_assignment(),
            TokenKind::Ler => self.parse_input(),
            TokenKind::Imprimir => self.parse_output(),
            TokenKind::Se => self.parse_conditional(),
            TokenKind::Enquanto => self.parse_while(),
            TokenKind::Inicio => self.parse_block(),
            _ => Err(self.error(&COMMAND_FIRST)),
        }
    }

    // comandoAtribuicao : 'ATRIBUIR' expressaoAritmetica 'A' VAR
    fn parse_assignment(&mut self) -> Result<(), SyntaxError> {
        self.expect(TokenKind::Atribuir)?;
        self.parse_arith_expr()?;
        self.expect(TokenKind::A)?;
        self.expect(TokenKind::Ident)
    }

    // comandoEntrada : 'LER' VAR
    fn parse_input(&mut self) -> Result<(), SyntaxError> {
        self.expect(TokenKind::Ler)?;
        self.expect(TokenKind::Ident)
    }

    // comandoSaida : 'IMPRIMIR' (VAR | STRING)
    fn parse_output(&mut self) -> Result<(), SyntaxError> {
        self.expect(TokenKind::Imprimir)?;
        match self.peek(1).kind {
            TokenKind::Ident => self.expect(TokenKind::Ident),
            TokenKind::StringLiteral => self.expect(TokenKind::StringLiteral),
            _ => Err(self.error(&[TokenKind::Ident, TokenKind::StringLiteral])),
        }
    }

    // comandoCondicao : 'SE' expressaoRelacional 'ENTAO' comando ('SENAO' comando)?
    fn parse_conditional(&mut self) -> Result<(), SyntaxError> {
        self.expect(TokenKind::Se)?;
        self.parse_rel_expr()?;
        self.expect(TokenKind::Entao)?;
        self.parse_command()?;
        if self.peek(1).kind == TokenKind::Senao {
            self.expect(TokenKind::Senao)?;
            self.parse_command()?;
        }
        Ok(())
    }

    // comandoRepeticao : 'ENQUANTO' expressaoRelacional comando
    fn parse_while(&mut self) -> Result<(), SyntaxError> {
        self.expect(TokenKind::Enquanto)?;
        self.parse_rel_expr()?;
        self.parse_command()
    }

    // subAlgoritmo : 'INICIO' listaComandos 'FIM'
    fn parse_block(&mut self) -> Result<(), SyntaxError> {
        self.expect(TokenKind::Inicio)?;
        self.parse_command_list()?;
        self.expect(TokenKind::Fim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn tokens_of(kinds: &[TokenKind]) -> Vec<Token> {
        let mut tokens: Vec<Token> = kinds
            .iter()
            .map(|&k| Token::new(k, &k.to_string(), 0, 0))
            .collect();
        tokens.push(Token::new(TokenKind::Eof, "", 0, 0));
        tokens
    }

    fn parser_for(input: &str) -> Parser<TokenList> {
        let tokens = Lexer::new(input).tokenize().unwrap();
        Parser::new(TokenList::new(tokens))
    }

    fn parse_source(input: &str) -> Result<(), SyntaxError> {
        parser_for(input).parse()
    }

    const ACCEPTED: &str = ": DECLARACOES x : INTEIRO : ALGORITMO ATRIBUIR 1 A x IMPRIMIR x";

    // ------------------------------------------------------------------
    // Lookahead buffer
    // ------------------------------------------------------------------

    #[test]
    fn buffer_fills_to_capacity() {
        let kinds = vec![TokenKind::Ident; 25];
        let la = Lookahead::new(TokenList::new(tokens_of(&kinds)));
        assert_eq!(la.len(), LOOKAHEAD_CAPACITY);
    }

    #[test]
    fn buffer_never_exceeds_capacity_while_consuming() {
        let kinds = vec![TokenKind::Ident; 25];
        let mut la = Lookahead::new(TokenList::new(tokens_of(&kinds)));
        for _ in 0..20 {
            la.advance();
            assert!(la.len() <= LOOKAHEAD_CAPACITY);
        }
    }

    #[test]
    fn short_stream_buffers_only_what_exists() {
        // three tokens plus the terminal
        let la = Lookahead::new(TokenList::new(tokens_of(&[
            TokenKind::Ident,
            TokenKind::Colon,
            TokenKind::Inteiro,
        ])));
        assert_eq!(la.len(), 4);
    }

    #[test]
    fn buffer_shrinks_as_short_stream_is_consumed() {
        let mut la = Lookahead::new(TokenList::new(tokens_of(&[
            TokenKind::Ident,
            TokenKind::Colon,
            TokenKind::Inteiro,
        ])));
        la.advance();
        assert_eq!(la.len(), 3);
        la.advance();
        assert_eq!(la.len(), 2);
        la.advance();
        assert_eq!(la.len(), 1);
        assert_eq!(la.peek(1).kind, TokenKind::Eof);
    }

    #[test]
    fn peek_clamps_to_last_held_token() {
        let la = Lookahead::new(TokenList::new(tokens_of(&[
            TokenKind::Ident,
            TokenKind::Colon,
            TokenKind::Inteiro,
        ])));
        // four tokens held, so every deeper offset clamps to the fourth
        assert_eq!(la.peek(5), la.peek(4));
        assert_eq!(la.peek(LOOKAHEAD_CAPACITY), la.peek(4));
        assert_eq!(la.peek(LOOKAHEAD_CAPACITY).kind, TokenKind::Eof);
    }

    #[test]
    fn terminal_token_stays_visible_after_consumption() {
        let mut la = Lookahead::new(TokenList::new(tokens_of(&[TokenKind::Ident])));
        la.advance(); // identifier
        la.advance(); // terminal
        assert_eq!(la.peek(1).kind, TokenKind::Eof);
    }

    // ------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------

    #[test]
    fn single_declaration_then_delimiter() {
        let mut p = parser_for("x : INTEIRO : ALGORITMO");
        assert!(p.parse_declaration_list().is_ok());
        // list stopped right before the section delimiter
        assert_eq!(p.peek(1).kind, TokenKind::Colon);
        assert_eq!(p.peek(2).kind, TokenKind::Algoritmo);
    }

    #[test]
    fn two_declarations_back_to_back() {
        let mut p = parser_for("x : INTEIRO y : REAL : ALGORITMO");
        assert!(p.parse_declaration_list().is_ok());
        assert_eq!(p.peek(1).kind, TokenKind::Colon);
    }

    #[test]
    fn bad_token_at_offset_four_names_delimiter_and_identifier() {
        let mut p = parser_for("x : INTEIRO + y");
        let err = p.parse_declaration_list().unwrap_err();
        assert_eq!(err.expected, vec![TokenKind::Colon, TokenKind::Ident]);
        // the reported token is the current front of the stream
        assert_eq!(err.found.kind, TokenKind::Ident);
        assert_eq!(err.found.lexeme, "x");
    }

    #[test]
    fn declaration_with_bad_type_names_both_types() {
        let mut p = parser_for("x : ATRIBUIR");
        let err = p.parse_declaration().unwrap_err();
        assert_eq!(err.expected, vec![TokenKind::Inteiro, TokenKind::Real]);
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    #[test]
    fn additive_chain_is_flat() {
        assert!(parser_for("1 + 2 - 3").parse_arith_expr().is_ok());
    }

    #[test]
    fn term_before_expression_and_after() {
        // precedence is structural only; both orders are accepted
        assert!(parser_for("2 * 3 + 4").parse_arith_expr().is_ok());
        assert!(parser_for("2 + 3 * 4").parse_arith_expr().is_ok());
    }

    #[test]
    fn parenthesized_arithmetic_operand() {
        assert!(parser_for("( 1 + 2 ) * 3").parse_arith_expr().is_ok());
    }

    #[test]
    fn factor_error_names_its_first_set() {
        let err = parser_for("+ 1").parse_arith_expr().unwrap_err();
        assert_eq!(err.expected, FACTOR_FIRST.to_vec());
    }

    #[test]
    fn relational_term_with_real_operands() {
        assert!(parser_for("x <= 3.5").parse_rel_expr().is_ok());
    }

    #[test]
    fn boolean_connectives_chain_relational_terms() {
        assert!(parser_for("1 < 2 E x > 0 OU y = 1").parse_rel_expr().is_ok());
    }

    #[test]
    fn parenthesized_relational_expression_is_rejected() {
        // only arithmetic expressions may be parenthesized
        let err = parser_for("( 1 > 2 )").parse_rel_expr().unwrap_err();
        assert_eq!(err.found.kind, TokenKind::Greater);
        assert_eq!(err.expected, vec![TokenKind::CloseParen]);
    }

    #[test]
    fn missing_relational_operator_names_all_six() {
        let err = parser_for("1 2").parse_rel_expr().unwrap_err();
        assert_eq!(err.expected, REL_OP.to_vec());
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    #[test]
    fn conditional_without_senao() {
        assert!(parser_for("SE 1 < 2 ENTAO LER x").parse_command().is_ok());
    }

    #[test]
    fn conditional_with_senao() {
        assert!(parser_for("SE 1 < 2 ENTAO LER x SENAO IMPRIMIR x")
            .parse_command()
            .is_ok());
    }

    #[test]
    fn while_body_can_be_a_nested_block() {
        assert!(
            parser_for("ENQUANTO x > 0 INICIO ATRIBUIR x - 1 A x IMPRIMIR x FIM")
                .parse_command()
                .is_ok()
        );
    }

    #[test]
    fn output_accepts_string_literal() {
        assert!(parser_for("IMPRIMIR \"ola\"").parse_command().is_ok());
    }

    #[test]
    fn output_with_number_names_identifier_and_string() {
        let err = parser_for("IMPRIMIR 5").parse_command().unwrap_err();
        assert_eq!(err.expected, vec![TokenKind::Ident, TokenKind::StringLiteral]);
    }

    #[test]
    fn unknown_command_names_all_six_starters() {
        let err = parser_for("FIM").parse_command().unwrap_err();
        assert_eq!(err.expected, COMMAND_FIRST.to_vec());
    }

    // ------------------------------------------------------------------
    // Whole programs
    // ------------------------------------------------------------------

    #[test]
    fn accepts_reference_program() {
        assert!(parse_source(ACCEPTED).is_ok());
    }

    #[test]
    fn accepts_same_stream_twice_with_fresh_parsers() {
        assert!(parse_source(ACCEPTED).is_ok());
        assert!(parse_source(ACCEPTED).is_ok());
    }

    #[test]
    fn mutated_section_keyword_is_rejected() {
        let err =
            parse_source(": DECLARACOES x : INTEIRO : ALGORITM ATRIBUIR 1 A x IMPRIMIR x")
                .unwrap_err();
        assert_eq!(err.expected, vec![TokenKind::Algoritmo]);
        assert_eq!(err.found.kind, TokenKind::Ident);
        assert_eq!(err.found.lexeme, "ALGORITM");
    }

    #[test]
    fn trailing_tokens_after_algorithm_are_rejected() {
        let err = parse_source(&format!("{ACCEPTED} )")).unwrap_err();
        assert_eq!(err.found.kind, TokenKind::CloseParen);
    }

    #[test]
    fn accepts_larger_program_with_all_command_forms() {
        let program = "\
: DECLARACOES
  n : INTEIRO
  soma : REAL
: ALGORITMO
  LER n
  ATRIBUIR 0 A soma
  ENQUANTO n > 0 E soma < 100
  INICIO
    ATRIBUIR soma + n * 2 A soma
    ATRIBUIR n - 1 A n
  FIM
  SE soma >= 50 ENTAO IMPRIMIR \"grande\" SENAO IMPRIMIR soma";
        assert!(parse_source(program).is_ok());
    }

    // ------------------------------------------------------------------
    // Trace hook
    // ------------------------------------------------------------------

    struct Recorder(Rc<RefCell<Vec<String>>>);

    impl TraceHook for Recorder {
        fn token_revealed(&mut self, token: &Token) {
            self.0.borrow_mut().push(format!("read {token}"));
        }

        fn token_consumed(&mut self, token: &Token) {
            self.0.borrow_mut().push(format!("match {token}"));
        }
    }

    #[test]
    fn trace_hook_sees_reveals_and_matches() {
        let events = Rc::new(RefCell::new(Vec::new()));
        let tokens = Lexer::new(ACCEPTED).tokenize().unwrap();
        let token_count = tokens.len();
        let mut parser = Parser::new(TokenList::new(tokens))
            .with_trace(Box::new(Recorder(Rc::clone(&events))));
        parser.parse().unwrap();

        let events = events.borrow();
        assert!(events[0].starts_with("read "));
        let matches = events.iter().filter(|e| e.starts_with("match ")).count();
        // every token, terminal included, is matched exactly once
        assert_eq!(matches, token_count);
    }
}
