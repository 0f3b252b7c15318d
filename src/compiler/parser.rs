use std::rc::Rc;

use thiserror::Error;

use crate::compiler::ast::*;
use crate::compiler::lexer::{Span, Token, TokenKind};

/// Errors raised while parsing a token stream.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("expected {expected}, found {found}")]
    UnexpectedToken {
        expected: String,
        found: String,
        span: Span,
    },
    /// Only reachable from hand-built token streams; the lexer never emits
    /// a marker that is not followed by `[` or `{`.
    #[error("expected `[` or `{{` after `#`, found {found}")]
    UnexpectedTokenAfterMarker { found: String, span: Span },
    #[error("malformed element {} in sequence literal: {}", .index + 1, .reason)]
    MalformedElement {
        index: usize,
        reason: String,
        span: Span,
    },
    #[error("malformed entry {} in mapping literal: {}", .index + 1, .reason)]
    MalformedEntry {
        index: usize,
        reason: String,
        span: Span,
    },
    #[error("invalid assignment target")]
    InvalidAssignmentTarget { span: Span },
}

impl ParseError {
    pub fn span(&self) -> Span {
        match self {
            ParseError::UnexpectedToken { span, .. }
            | ParseError::UnexpectedTokenAfterMarker { span, .. }
            | ParseError::MalformedElement { span, .. }
            | ParseError::MalformedEntry { span, .. }
            | ParseError::InvalidAssignmentTarget { span } => *span,
        }
    }
}

/// A recursive descent parser for hashlit.
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, current: 0 }
    }

    pub fn parse(&mut self) -> Result<Program, ParseError> {
        let mut statements = Vec::new();

        while !self.is_at_end() {
            statements.push(self.statement()?);
        }

        Ok(Program { statements })
    }

    fn block(&mut self) -> Result<Block, ParseError> {
        let span = self.current_span();
        self.expect(&TokenKind::LBrace)?;

        let mut statements = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            statements.push(self.statement()?);
        }

        self.expect(&TokenKind::RBrace)?;

        Ok(Block { statements, span })
    }

    fn statement(&mut self) -> Result<Statement, ParseError> {
        match self.peek_kind() {
            Some(TokenKind::Let) => self.let_stmt(),
            Some(TokenKind::Fun) if self.check_ident_ahead(1) => {
                Ok(Statement::FnDecl(self.fn_def()?))
            }
            Some(TokenKind::If) => self.if_stmt(),
            Some(TokenKind::While) => self.while_stmt(),
            Some(TokenKind::For) => self.for_stmt(),
            Some(TokenKind::Return) => self.return_stmt(),
            Some(TokenKind::Throw) => self.throw_stmt(),
            Some(TokenKind::Try) => self.try_stmt(),
            _ => self.expr_or_assign_stmt(),
        }
    }

    fn let_stmt(&mut self) -> Result<Statement, ParseError> {
        let span = self.current_span();
        self.expect(&TokenKind::Let)?;

        let name = self.expect_ident()?;
        self.expect(&TokenKind::Eq)?;
        let init = self.expression()?;
        self.expect(&TokenKind::Semi)?;

        Ok(Statement::Let { name, init, span })
    }

    /// `fun name(a, b) { ... }` or, without a name, a lambda.
    fn fn_def(&mut self) -> Result<FnDef, ParseError> {
        let span = self.current_span();
        self.expect(&TokenKind::Fun)?;

        let name = if self.check_ident() {
            Some(self.expect_ident()?)
        } else {
            None
        };

        self.expect(&TokenKind::LParen)?;
        let mut params = Vec::new();
        while !self.check(&TokenKind::RParen) {
            params.push(self.expect_ident()?);
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen)?;

        let body = self.block()?;

        Ok(FnDef {
            name,
            params,
            body: Rc::new(body),
            span,
        })
    }

    fn if_stmt(&mut self) -> Result<Statement, ParseError> {
        let span = self.current_span();
        self.expect(&TokenKind::If)?;

        let condition = self.expression()?;
        let then_block = self.block()?;

        let else_block = if self.match_token(&TokenKind::Else) {
            if self.check(&TokenKind::If) {
                // else if -> else { if ... }
                let else_span = self.current_span();
                let inner_if = self.if_stmt()?;
                Some(Block {
                    statements: vec![inner_if],
                    span: else_span,
                })
            } else {
                Some(self.block()?)
            }
        } else {
            None
        };

        Ok(Statement::If {
            condition,
            then_block,
            else_block,
            span,
        })
    }

    fn while_stmt(&mut self) -> Result<Statement, ParseError> {
        let span = self.current_span();
        self.expect(&TokenKind::While)?;

        let condition = self.expression()?;
        let body = self.block()?;

        Ok(Statement::While {
            condition,
            body,
            span,
        })
    }

    fn for_stmt(&mut self) -> Result<Statement, ParseError> {
        let span = self.current_span();
        self.expect(&TokenKind::For)?;

        let var = self.expect_ident()?;
        self.expect(&TokenKind::In)?;
        let iterable = self.expression()?;
        let body = self.block()?;

        Ok(Statement::ForIn {
            var,
            iterable,
            body,
            span,
        })
    }

    fn return_stmt(&mut self) -> Result<Statement, ParseError> {
        let span = self.current_span();
        self.expect(&TokenKind::Return)?;

        let value = if self.check(&TokenKind::Semi) {
            None
        } else {
            Some(self.expression()?)
        };

        self.expect(&TokenKind::Semi)?;

        Ok(Statement::Return { value, span })
    }

    fn throw_stmt(&mut self) -> Result<Statement, ParseError> {
        let span = self.current_span();
        self.expect(&TokenKind::Throw)?;
        let value = self.expression()?;
        self.expect(&TokenKind::Semi)?;

        Ok(Statement::Throw { value, span })
    }

    fn try_stmt(&mut self) -> Result<Statement, ParseError> {
        let span = self.current_span();
        self.expect(&TokenKind::Try)?;
        let try_block = self.block()?;
        self.expect(&TokenKind::Catch)?;
        let catch_var = self.expect_ident()?;
        let catch_block = self.block()?;

        Ok(Statement::Try {
            try_block,
            catch_var,
            catch_block,
            span,
        })
    }

    fn expr_or_assign_stmt(&mut self) -> Result<Statement, ParseError> {
        let span = self.current_span();
        let expr = self.expression()?;

        if self.match_token(&TokenKind::Eq) {
            let target = match expr {
                Expr::Ident { name, .. } => AssignTarget::Ident(name),
                Expr::Field { object, field, .. } => AssignTarget::Field {
                    object: *object,
                    field,
                },
                Expr::Index { object, index, .. } => AssignTarget::Index {
                    object: *object,
                    index: *index,
                },
                _ => return Err(ParseError::InvalidAssignmentTarget { span }),
            };
            let value = self.expression()?;
            self.expect(&TokenKind::Semi)?;
            return Ok(Statement::Assign {
                target,
                value,
                span,
            });
        }

        self.expect(&TokenKind::Semi)?;
        Ok(Statement::Expr { expr, span })
    }

    // Expression parsing with precedence climbing

    fn expression(&mut self) -> Result<Expr, ParseError> {
        self.or_expr()
    }

    fn binary_level(
        &mut self,
        ops: &[(TokenKind, BinaryOp)],
        next: fn(&mut Self) -> Result<Expr, ParseError>,
    ) -> Result<Expr, ParseError> {
        let mut left = next(self)?;

        'outer: loop {
            for (kind, op) in ops {
                if self.match_token(kind) {
                    let span = left.span();
                    let right = next(self)?;
                    left = Expr::Binary {
                        op: *op,
                        left: Box::new(left),
                        right: Box::new(right),
                        span,
                    };
                    continue 'outer;
                }
            }
            break;
        }

        Ok(left)
    }

    fn or_expr(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(&[(TokenKind::OrOr, BinaryOp::Or)], Self::and_expr)
    }

    fn and_expr(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(&[(TokenKind::AndAnd, BinaryOp::And)], Self::eq_expr)
    }

    fn eq_expr(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(
            &[
                (TokenKind::EqEq, BinaryOp::Eq),
                (TokenKind::NotEq, BinaryOp::Ne),
            ],
            Self::cmp_expr,
        )
    }

    fn cmp_expr(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(
            &[
                (TokenKind::Lt, BinaryOp::Lt),
                (TokenKind::Le, BinaryOp::Le),
                (TokenKind::Gt, BinaryOp::Gt),
                (TokenKind::Ge, BinaryOp::Ge),
            ],
            Self::add_expr,
        )
    }

    fn add_expr(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(
            &[
                (TokenKind::Plus, BinaryOp::Add),
                (TokenKind::Minus, BinaryOp::Sub),
            ],
            Self::mul_expr,
        )
    }

    fn mul_expr(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(
            &[
                (TokenKind::Star, BinaryOp::Mul),
                (TokenKind::Slash, BinaryOp::Div),
                (TokenKind::Percent, BinaryOp::Mod),
            ],
            Self::unary_expr,
        )
    }

    fn unary_expr(&mut self) -> Result<Expr, ParseError> {
        let op = if self.match_token(&TokenKind::Bang) {
            UnaryOp::Not
        } else if self.match_token(&TokenKind::Minus) {
            UnaryOp::Neg
        } else {
            return self.postfix_expr();
        };

        let span = self.previous_span();
        let operand = self.unary_expr()?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
            span,
        })
    }

    /// Calls, member access, indexing and collection literals all bind at the
    /// same level, left to right: `a.b#[1].c` is `((a.b)#[1]).c`.
    fn postfix_expr(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.primary()?;

        loop {
            if self.match_token(&TokenKind::LParen) {
                let span = expr.span();
                let args = self.comma_list(&TokenKind::RParen)?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                    span,
                };
            } else if self.match_token(&TokenKind::Dot) {
                let span = self.previous_span();
                let field = self.expect_ident()?;
                expr = Expr::Field {
                    object: Box::new(expr),
                    field,
                    span,
                };
            } else if self.match_token(&TokenKind::LBracket) {
                let span = self.previous_span();
                let index = self.expression()?;
                self.expect(&TokenKind::RBracket)?;
                expr = Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                    span,
                };
            } else if self.match_token(&TokenKind::Marker) {
                let span = self.previous_span();
                expr = Expr::Literal(self.literal(expr, span)?);
            } else {
                break;
            }
        }

        Ok(expr)
    }

    /// The token right after `#` alone decides the literal's kind.
    fn literal(&mut self, constructor: Expr, span: Span) -> Result<LiteralNode, ParseError> {
        let body = if self.match_token(&TokenKind::LBracket) {
            LiteralBody::Sequence(self.sequence_elements()?)
        } else if self.match_token(&TokenKind::LBrace) {
            LiteralBody::Mapping(self.mapping_entries()?)
        } else {
            return Err(ParseError::UnexpectedTokenAfterMarker {
                found: self.found(),
                span: self.current_span(),
            });
        };

        Ok(LiteralNode {
            constructor: Box::new(constructor),
            body,
            span,
        })
    }

    fn sequence_elements(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut elements = Vec::new();

        loop {
            if self.match_token(&TokenKind::RBracket) {
                break;
            }

            let index = elements.len();
            if !self.starts_expression() {
                return Err(self.malformed_element(
                    index,
                    format!("expected an element, found {}", self.found()),
                ));
            }
            let element = self.expression().map_err(|err| within_element(err, index))?;
            elements.push(element);

            if self.match_token(&TokenKind::Comma) {
                continue;
            }
            if self.match_token(&TokenKind::RBracket) {
                break;
            }

            let reason = if self.check(&TokenKind::Colon) {
                "`key: value` entries need a mapping literal `#{...}`".to_string()
            } else {
                format!("expected `,` or `]` after element, found {}", self.found())
            };
            return Err(self.malformed_element(index, reason));
        }

        Ok(elements)
    }

    fn mapping_entries(&mut self) -> Result<Vec<Entry>, ParseError> {
        let mut entries = Vec::new();

        loop {
            if self.match_token(&TokenKind::RBrace) {
                break;
            }

            let index = entries.len();
            if !self.starts_expression() {
                return Err(self.malformed_entry(
                    index,
                    format!("expected an entry key, found {}", self.found()),
                ));
            }
            let key = self.expression().map_err(|err| within_entry(err, index))?;

            if !self.match_token(&TokenKind::Colon) {
                return Err(self.malformed_entry(
                    index,
                    format!("entry is missing `: value`, found {}", self.found()),
                ));
            }
            if !self.starts_expression() {
                return Err(self.malformed_entry(
                    index,
                    format!("entry is missing a value after `:`, found {}", self.found()),
                ));
            }
            let value = self.expression().map_err(|err| within_entry(err, index))?;
            entries.push(Entry { key, value });

            if self.match_token(&TokenKind::Comma) {
                continue;
            }
            if self.match_token(&TokenKind::RBrace) {
                break;
            }
            return Err(self.malformed_entry(
                index,
                format!("expected `,` or `}}` after entry, found {}", self.found()),
            ));
        }

        Ok(entries)
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        let span = self.current_span();

        let Some(kind) = self.peek_kind().cloned() else {
            return Err(self.unexpected("expression"));
        };

        let expr = match kind {
            TokenKind::Int(value) => {
                self.advance();
                Expr::Int { value, span }
            }
            TokenKind::Float(value) => {
                self.advance();
                Expr::Float { value, span }
            }
            TokenKind::Str(value) => {
                self.advance();
                Expr::Str { value, span }
            }
            TokenKind::True | TokenKind::False => {
                self.advance();
                Expr::Bool {
                    value: kind == TokenKind::True,
                    span,
                }
            }
            TokenKind::Nil => {
                self.advance();
                Expr::Nil { span }
            }
            TokenKind::Ident(name) => {
                self.advance();
                Expr::Ident { name, span }
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.expression()?;
                self.expect(&TokenKind::RParen)?;
                expr
            }
            TokenKind::LBracket => {
                self.advance();
                let elements = self.comma_list(&TokenKind::RBracket)?;
                Expr::Array { elements, span }
            }
            TokenKind::LBrace => {
                self.advance();
                self.object_literal(span)?
            }
            TokenKind::Fun => Expr::Lambda(self.fn_def()?),
            _ => return Err(self.unexpected("expression")),
        };

        Ok(expr)
    }

    fn object_literal(&mut self, span: Span) -> Result<Expr, ParseError> {
        let mut properties = Vec::new();

        while !self.check(&TokenKind::RBrace) {
            let key = match self.peek_kind().cloned() {
                Some(TokenKind::Ident(name) | TokenKind::Str(name)) => {
                    self.advance();
                    PropertyKey::Named(name)
                }
                Some(TokenKind::LBracket) => {
                    self.advance();
                    let key = self.expression()?;
                    self.expect(&TokenKind::RBracket)?;
                    PropertyKey::Computed(key)
                }
                _ => return Err(self.unexpected("property name")),
            };
            self.expect(&TokenKind::Colon)?;
            let value = self.expression()?;
            properties.push((key, value));

            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RBrace)?;

        Ok(Expr::Object { properties, span })
    }

    /// Comma-separated expressions up to `close`, trailing comma allowed.
    fn comma_list(&mut self, close: &TokenKind) -> Result<Vec<Expr>, ParseError> {
        let mut items = Vec::new();

        while !self.check(close) {
            items.push(self.expression()?);
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(close)?;

        Ok(items)
    }

    // Helper methods

    fn starts_expression(&self) -> bool {
        matches!(
            self.peek_kind(),
            Some(
                TokenKind::Int(_)
                    | TokenKind::Float(_)
                    | TokenKind::Str(_)
                    | TokenKind::Ident(_)
                    | TokenKind::True
                    | TokenKind::False
                    | TokenKind::Nil
                    | TokenKind::LParen
                    | TokenKind::LBracket
                    | TokenKind::LBrace
                    | TokenKind::Fun
                    | TokenKind::Minus
                    | TokenKind::Bang
            )
        )
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.current)
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.peek().map(|t| &t.kind)
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek_kind(), Some(TokenKind::Eof) | None)
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == Some(kind)
    }

    fn check_ident(&self) -> bool {
        matches!(self.peek_kind(), Some(TokenKind::Ident(_)))
    }

    fn check_ident_ahead(&self, offset: usize) -> bool {
        matches!(
            self.tokens.get(self.current + offset).map(|t| &t.kind),
            Some(TokenKind::Ident(_))
        )
    }

    fn advance(&mut self) -> Option<&Token> {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.tokens.get(self.current - 1)
    }

    fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<(), ParseError> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(&kind.describe()))
        }
    }

    fn expect_ident(&mut self) -> Result<String, ParseError> {
        if let Some(TokenKind::Ident(name)) = self.peek_kind() {
            let name = name.clone();
            self.advance();
            Ok(name)
        } else {
            Err(self.unexpected("identifier"))
        }
    }

    fn current_span(&self) -> Span {
        self.peek()
            .or_else(|| self.tokens.last())
            .map(|t| t.span)
            .unwrap_or(Span::new(1, 1))
    }

    fn previous_span(&self) -> Span {
        self.tokens
            .get(self.current.saturating_sub(1))
            .map(|t| t.span)
            .unwrap_or(Span::new(1, 1))
    }

    fn found(&self) -> String {
        self.peek_kind()
            .map(TokenKind::describe)
            .unwrap_or_else(|| TokenKind::Eof.describe())
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        ParseError::UnexpectedToken {
            expected: expected.to_string(),
            found: self.found(),
            span: self.current_span(),
        }
    }

    fn malformed_element(&self, index: usize, reason: String) -> ParseError {
        ParseError::MalformedElement {
            index,
            reason,
            span: self.current_span(),
        }
    }

    fn malformed_entry(&self, index: usize, reason: String) -> ParseError {
        ParseError::MalformedEntry {
            index,
            reason,
            span: self.current_span(),
        }
    }
}

/// An incomplete element is reported against the element. Errors that
/// already name a nested element or entry are kept as they are.
fn within_element(err: ParseError, index: usize) -> ParseError {
    match err {
        ParseError::MalformedElement { .. } | ParseError::MalformedEntry { .. } => err,
        other => ParseError::MalformedElement {
            index,
            span: other.span(),
            reason: other.to_string(),
        },
    }
}

fn within_entry(err: ParseError, index: usize) -> ParseError {
    match err {
        ParseError::MalformedElement { .. } | ParseError::MalformedEntry { .. } => err,
        other => ParseError::MalformedEntry {
            index,
            span: other.span(),
            reason: other.to_string(),
        },
    }
}

/// Parse a token stream into a program.
pub fn parse_tokens(tokens: Vec<Token>) -> Result<Program, ParseError> {
    Parser::new(tokens).parse()
}
