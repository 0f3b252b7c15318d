use serde::Serialize;
use thiserror::Error;
use tracing::trace;

/// Token kinds for the hashlit language.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TokenKind {
    // Keywords
    Let,
    Fun,
    If,
    Else,
    While,
    For,
    In,
    Return,
    Throw,
    Try,
    Catch,
    True,
    False,
    Nil,

    // Literals
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
    Bang,
    Eq,
    Dot,
    /// `#` directly between an expression and `[` or `{`.
    Marker,

    // Delimiters
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semi,
    Colon,

    // Special
    Eof,
}

impl TokenKind {
    /// Whether a token of this kind can be the last token of an expression,
    /// which is what allows a following `#` to act as a literal marker.
    pub fn ends_expression(&self) -> bool {
        matches!(
            self,
            TokenKind::Ident(_)
                | TokenKind::Int(_)
                | TokenKind::Float(_)
                | TokenKind::Str(_)
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Nil
                | TokenKind::RParen
                | TokenKind::RBracket
        )
    }

    /// Human-readable description used in diagnostics.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Int(n) => format!("integer `{}`", n),
            TokenKind::Float(f) => format!("float `{}`", f),
            TokenKind::Str(s) => format!("string {:?}", s),
            TokenKind::Ident(name) => format!("identifier `{}`", name),
            TokenKind::Eof => "end of input".to_string(),
            other => format!("`{}`", other.lexeme()),
        }
    }

    fn lexeme(&self) -> &'static str {
        match self {
            TokenKind::Let => "let",
            TokenKind::Fun => "fun",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::While => "while",
            TokenKind::For => "for",
            TokenKind::In => "in",
            TokenKind::Return => "return",
            TokenKind::Throw => "throw",
            TokenKind::Try => "try",
            TokenKind::Catch => "catch",
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::Nil => "nil",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::EqEq => "==",
            TokenKind::NotEq => "!=",
            TokenKind::Lt => "<",
            TokenKind::Le => "<=",
            TokenKind::Gt => ">",
            TokenKind::Ge => ">=",
            TokenKind::AndAnd => "&&",
            TokenKind::OrOr => "||",
            TokenKind::Bang => "!",
            TokenKind::Eq => "=",
            TokenKind::Dot => ".",
            TokenKind::Marker => "#",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::Comma => ",",
            TokenKind::Semi => ";",
            TokenKind::Colon => ":",
            TokenKind::Int(_)
            | TokenKind::Float(_)
            | TokenKind::Str(_)
            | TokenKind::Ident(_)
            | TokenKind::Eof => "",
        }
    }
}

/// Source location information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Span {
    pub line: usize,
    pub column: usize,
}

impl Span {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// A token with its kind and location.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// Errors raised while scanning source text.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexError {
    #[error("unexpected character '{ch}'")]
    UnexpectedChar { ch: char, span: Span },
    #[error("unterminated string")]
    UnterminatedString { span: Span },
    #[error("invalid escape sequence '\\{ch}'")]
    InvalidEscape { ch: char, span: Span },
    #[error("invalid number '{text}'")]
    InvalidNumber { text: String, span: Span },
}

impl LexError {
    pub fn span(&self) -> Span {
        match self {
            LexError::UnexpectedChar { span, .. }
            | LexError::UnterminatedString { span }
            | LexError::InvalidEscape { span, .. }
            | LexError::InvalidNumber { span, .. } => *span,
        }
    }
}

/// The lexer for hashlit source code.
pub struct Lexer<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    line: usize,
    column: usize,
    /// Byte offset just past the previously emitted token, and its kind.
    previous: Option<(usize, TokenKind)>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            line: 1,
            column: 1,
            previous: None,
        }
    }

    pub fn scan_tokens(&mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace_and_comments();

            let span = Span::new(self.line, self.column);

            let Some((_, ch)) = self.peek() else {
                tokens.push(Token::new(TokenKind::Eof, span));
                break;
            };

            let kind = match ch {
                '(' => {
                    self.advance();
                    TokenKind::LParen
                }
                ')' => {
                    self.advance();
                    TokenKind::RParen
                }
                '{' => {
                    self.advance();
                    TokenKind::LBrace
                }
                '}' => {
                    self.advance();
                    TokenKind::RBrace
                }
                '[' => {
                    self.advance();
                    TokenKind::LBracket
                }
                ']' => {
                    self.advance();
                    TokenKind::RBracket
                }
                ',' => {
                    self.advance();
                    TokenKind::Comma
                }
                ';' => {
                    self.advance();
                    TokenKind::Semi
                }
                ':' => {
                    self.advance();
                    TokenKind::Colon
                }
                '.' => {
                    self.advance();
                    TokenKind::Dot
                }
                '#' => {
                    // skip_whitespace_and_comments only stops here for markers
                    self.advance();
                    trace!(line = span.line, column = span.column, "literal marker");
                    TokenKind::Marker
                }
                '+' => {
                    self.advance();
                    TokenKind::Plus
                }
                '-' => {
                    self.advance();
                    TokenKind::Minus
                }
                '*' => {
                    self.advance();
                    TokenKind::Star
                }
                '/' => {
                    self.advance();
                    TokenKind::Slash
                }
                '%' => {
                    self.advance();
                    TokenKind::Percent
                }
                '!' => {
                    self.advance();
                    if self.match_char('=') {
                        TokenKind::NotEq
                    } else {
                        TokenKind::Bang
                    }
                }
                '=' => {
                    self.advance();
                    if self.match_char('=') {
                        TokenKind::EqEq
                    } else {
                        TokenKind::Eq
                    }
                }
                '<' => {
                    self.advance();
                    if self.match_char('=') {
                        TokenKind::Le
                    } else {
                        TokenKind::Lt
                    }
                }
                '>' => {
                    self.advance();
                    if self.match_char('=') {
                        TokenKind::Ge
                    } else {
                        TokenKind::Gt
                    }
                }
                '&' => {
                    self.advance();
                    if self.match_char('&') {
                        TokenKind::AndAnd
                    } else {
                        return Err(LexError::UnexpectedChar { ch: '&', span });
                    }
                }
                '|' => {
                    self.advance();
                    if self.match_char('|') {
                        TokenKind::OrOr
                    } else {
                        return Err(LexError::UnexpectedChar { ch: '|', span });
                    }
                }
                '"' => self.scan_string(span)?,
                '0'..='9' => self.scan_number(span)?,
                'a'..='z' | 'A'..='Z' | '_' => self.scan_identifier(),
                _ => return Err(LexError::UnexpectedChar { ch, span }),
            };

            self.previous = Some((self.offset(), kind.clone()));
            tokens.push(Token::new(kind, span));
        }

        Ok(tokens)
    }

    fn peek(&mut self) -> Option<(usize, char)> {
        self.chars.peek().copied()
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.chars.clone();
        chars.next();
        chars.next().map(|(_, c)| c)
    }

    fn offset(&mut self) -> usize {
        self.peek().map(|(i, _)| i).unwrap_or(self.source.len())
    }

    fn advance(&mut self) -> Option<(usize, char)> {
        let result = self.chars.next();
        if let Some((_, ch)) = result {
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        result
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek().map(|(_, c)| c) == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// A `#` at the current position is a marker when it touches the end of
    /// an expression token and is immediately followed by `[` or `{`.
    fn at_marker(&mut self) -> bool {
        let here = self.offset();
        let touches_expression = matches!(
            &self.previous,
            Some((end, kind)) if *end == here && kind.ends_expression()
        );
        touches_expression && matches!(self.peek_second(), Some('[' | '{'))
    }

    fn skip_line(&mut self) {
        while let Some((_, ch)) = self.peek() {
            if ch == '\n' {
                break;
            }
            self.advance();
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some((_, ' ' | '\t' | '\r' | '\n')) => {
                    self.advance();
                }
                Some((_, '#')) => {
                    if self.at_marker() {
                        break;
                    }
                    self.skip_line();
                }
                Some((_, '/')) => {
                    if self.peek_second() == Some('/') {
                        self.skip_line();
                    } else {
                        break;
                    }
                }
                _ => break,
            }
        }
    }

    fn scan_number(&mut self, span: Span) -> Result<TokenKind, LexError> {
        let start = self.offset();
        let mut is_float = false;

        while let Some((_, ch)) = self.peek() {
            if ch.is_ascii_digit() {
                self.advance();
            } else {
                break;
            }
        }

        // A '.' is part of the number only when a digit follows; `1.foo` stays a member access
        if let Some((_, '.')) = self.peek()
            && self.peek_second().is_some_and(|c| c.is_ascii_digit())
        {
            is_float = true;
            self.advance();
            while let Some((_, ch)) = self.peek() {
                if ch.is_ascii_digit() {
                    self.advance();
                } else {
                    break;
                }
            }
        }

        let end = self.offset();
        let text = &self.source[start..end];
        let invalid = || LexError::InvalidNumber {
            text: text.to_string(),
            span,
        };

        if is_float {
            text.parse().map(TokenKind::Float).map_err(|_| invalid())
        } else {
            text.parse().map(TokenKind::Int).map_err(|_| invalid())
        }
    }

    fn scan_string(&mut self, span: Span) -> Result<TokenKind, LexError> {
        self.advance(); // opening quote

        let mut value = String::new();

        loop {
            match self.peek() {
                None | Some((_, '\n')) => return Err(LexError::UnterminatedString { span }),
                Some((_, '"')) => {
                    self.advance();
                    break;
                }
                Some((_, '\\')) => {
                    self.advance();
                    let escaped = match self.peek() {
                        Some((_, 'n')) => '\n',
                        Some((_, 't')) => '\t',
                        Some((_, 'r')) => '\r',
                        Some((_, '\\')) => '\\',
                        Some((_, '"')) => '"',
                        Some((_, ch)) => {
                            return Err(LexError::InvalidEscape {
                                ch,
                                span: Span::new(self.line, self.column),
                            });
                        }
                        None => return Err(LexError::UnterminatedString { span }),
                    };
                    self.advance();
                    value.push(escaped);
                }
                Some((_, ch)) => {
                    self.advance();
                    value.push(ch);
                }
            }
        }

        Ok(TokenKind::Str(value))
    }

    fn scan_identifier(&mut self) -> TokenKind {
        let start = self.offset();

        while let Some((_, ch)) = self.peek() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                self.advance();
            } else {
                break;
            }
        }

        let end = self.offset();
        match &self.source[start..end] {
            "let" => TokenKind::Let,
            "fun" => TokenKind::Fun,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "for" => TokenKind::For,
            "in" => TokenKind::In,
            "return" => TokenKind::Return,
            "throw" => TokenKind::Throw,
            "try" => TokenKind::Try,
            "catch" => TokenKind::Catch,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "nil" => TokenKind::Nil,
            ident => TokenKind::Ident(ident.to_string()),
        }
    }
}

/// Scan `source` into tokens.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(source).scan_tokens()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    fn ident(name: &str) -> TokenKind {
        TokenKind::Ident(name.to_string())
    }

    #[test]
    fn test_simple_tokens() {
        assert_eq!(
            kinds("let x = 42;"),
            vec![
                TokenKind::Let,
                ident("x"),
                TokenKind::Eq,
                TokenKind::Int(42),
                TokenKind::Semi,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_operators() {
        let expected = vec![
            TokenKind::Plus,
            TokenKind::Minus,
            TokenKind::Star,
            TokenKind::Slash,
            TokenKind::Percent,
            TokenKind::EqEq,
            TokenKind::NotEq,
            TokenKind::Lt,
            TokenKind::Le,
            TokenKind::Gt,
            TokenKind::Ge,
            TokenKind::AndAnd,
            TokenKind::OrOr,
            TokenKind::Bang,
            TokenKind::Eof,
        ];
        assert_eq!(kinds("+ - * / % == != < <= > >= && || !"), expected);
    }

    #[test]
    fn test_sequence_marker() {
        assert_eq!(
            kinds("Array#[1]"),
            vec![
                ident("Array"),
                TokenKind::Marker,
                TokenKind::LBracket,
                TokenKind::Int(1),
                TokenKind::RBracket,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_mapping_marker_after_call_and_member() {
        let tokens = kinds("make()#{} a.b#{}");
        assert_eq!(tokens[3], TokenKind::Marker);
        assert_eq!(tokens[4], TokenKind::LBrace);
        assert_eq!(tokens[9], TokenKind::Marker);
    }

    #[test]
    fn test_hash_at_statement_start_is_comment() {
        assert_eq!(
            kinds("#[not a literal]\nlet"),
            vec![TokenKind::Let, TokenKind::Eof]
        );
    }

    #[test]
    fn test_hash_after_whitespace_is_comment() {
        assert_eq!(
            kinds("x #[note]\ny"),
            vec![ident("x"), ident("y"), TokenKind::Eof]
        );
    }

    #[test]
    fn test_hash_not_before_bracket_is_comment() {
        assert_eq!(kinds("x#y\nz"), vec![ident("x"), ident("z"), TokenKind::Eof]);
    }

    #[test]
    fn test_hash_after_operator_is_comment() {
        assert_eq!(
            kinds("x =#[1]\n"),
            vec![ident("x"), TokenKind::Eq, TokenKind::Eof]
        );
    }

    #[test]
    fn test_line_comment() {
        let tokens = kinds("let x = 1; // this is a comment\nlet y = 2;");
        assert_eq!(tokens[5], TokenKind::Let);
        assert_eq!(tokens[6], ident("y"));
    }

    #[test]
    fn test_float_and_member_access() {
        assert_eq!(
            kinds("3.25 1.size"),
            vec![
                TokenKind::Float(3.25),
                TokenKind::Int(1),
                TokenKind::Dot,
                ident("size"),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            kinds(r#""line1\nline2" "q\"""#)[..2],
            [
                TokenKind::Str("line1\nline2".to_string()),
                TokenKind::Str("q\"".to_string()),
            ]
        );
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize("\"abc").unwrap_err();
        assert_eq!(err, LexError::UnterminatedString { span: Span::new(1, 1) });
    }

    #[test]
    fn test_unexpected_char_span() {
        let err = tokenize("let x = 1;\n  $").unwrap_err();
        assert_eq!(err.span(), Span::new(2, 3));
    }

    #[test]
    fn test_marker_span() {
        let tokens = tokenize("Map#{}").unwrap();
        assert_eq!(tokens[1].span, Span::new(1, 4));
    }
}
