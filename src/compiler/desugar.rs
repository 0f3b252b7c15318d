//! Desugar phase: rewrites collection literals into plain calls.
//!
//! This phase runs after parsing and before evaluation. It handles:
//! - `Ctor#[e1, ..., en]` → `Ctor[Symbol.sequenceLiteral](producer(e1, ..., en))`
//! - `Ctor#{k1: v1, ...}` → `Ctor[Symbol.mappingLiteral](producer(producer(k1, v1), ...))`
//!
//! The constructor is evaluated once by passing it as the argument of an
//! immediately-applied lambda:
//!
//! ```text
//! (fun(__lit_receiver) {
//!     return __lit_receiver[Symbol.sequenceLiteral](<producer>);
//! })(Ctor)
//! ```
//!
//! A producer is an object whose `next()` yields `{done, value}` records,
//! evaluating one element per call:
//!
//! ```text
//! (fun() {
//!     let __lit_step = 0;
//!     return {next: fun() {
//!         __lit_step = __lit_step + 1;
//!         if __lit_step == 1 { return {done: false, value: e1}; }
//!         ...
//!         return {done: true, value: nil};
//!     }};
//! })()
//! ```
//!
//! Everything produced here is ordinary surface syntax, so the output can be
//! printed and parsed again.

use std::rc::Rc;

use tracing::debug;

use crate::compiler::ast::{
    AssignTarget, BinaryOp, Block, Entry, Expr, FnDef, LiteralBody, LiteralNode, Program,
    PropertyKey, Statement,
};
use crate::compiler::lexer::Span;

/// Parameter that receives the evaluated constructor.
pub const RECEIVER_VAR: &str = "__lit_receiver";
/// Per-producer cursor counting how many `next()` calls have happened.
pub const STEP_VAR: &str = "__lit_step";
/// Global object holding the well-known protocol symbols.
pub const SYMBOL_GLOBAL: &str = "Symbol";

struct Desugar {
    literals: usize,
}

impl Desugar {
    fn new() -> Self {
        Self { literals: 0 }
    }

    fn desugar_program(&mut self, program: Program) -> Program {
        Program {
            statements: program
                .statements
                .into_iter()
                .map(|stmt| self.desugar_statement(stmt))
                .collect(),
        }
    }

    fn desugar_block(&mut self, block: Block) -> Block {
        Block {
            statements: block
                .statements
                .into_iter()
                .map(|stmt| self.desugar_statement(stmt))
                .collect(),
            span: block.span,
        }
    }

    fn desugar_fn_def(&mut self, fn_def: FnDef) -> FnDef {
        let body = Rc::unwrap_or_clone(fn_def.body);
        FnDef {
            name: fn_def.name,
            params: fn_def.params,
            body: Rc::new(self.desugar_block(body)),
            span: fn_def.span,
        }
    }

    fn desugar_statement(&mut self, stmt: Statement) -> Statement {
        match stmt {
            Statement::Let { name, init, span } => Statement::Let {
                name,
                init: self.desugar_expr(init),
                span,
            },
            Statement::FnDecl(fn_def) => Statement::FnDecl(self.desugar_fn_def(fn_def)),
            Statement::Assign {
                target,
                value,
                span,
            } => {
                let target = match target {
                    AssignTarget::Ident(name) => AssignTarget::Ident(name),
                    AssignTarget::Field { object, field } => AssignTarget::Field {
                        object: self.desugar_expr(object),
                        field,
                    },
                    AssignTarget::Index { object, index } => AssignTarget::Index {
                        object: self.desugar_expr(object),
                        index: self.desugar_expr(index),
                    },
                };
                Statement::Assign {
                    target,
                    value: self.desugar_expr(value),
                    span,
                }
            }
            Statement::If {
                condition,
                then_block,
                else_block,
                span,
            } => Statement::If {
                condition: self.desugar_expr(condition),
                then_block: self.desugar_block(then_block),
                else_block: else_block.map(|b| self.desugar_block(b)),
                span,
            },
            Statement::While {
                condition,
                body,
                span,
            } => Statement::While {
                condition: self.desugar_expr(condition),
                body: self.desugar_block(body),
                span,
            },
            Statement::ForIn {
                var,
                iterable,
                body,
                span,
            } => Statement::ForIn {
                var,
                iterable: self.desugar_expr(iterable),
                body: self.desugar_block(body),
                span,
            },
            Statement::Return { value, span } => Statement::Return {
                value: value.map(|e| self.desugar_expr(e)),
                span,
            },
            Statement::Throw { value, span } => Statement::Throw {
                value: self.desugar_expr(value),
                span,
            },
            Statement::Try {
                try_block,
                catch_var,
                catch_block,
                span,
            } => Statement::Try {
                try_block: self.desugar_block(try_block),
                catch_var,
                catch_block: self.desugar_block(catch_block),
                span,
            },
            Statement::Expr { expr, span } => Statement::Expr {
                expr: self.desugar_expr(expr),
                span,
            },
        }
    }

    fn desugar_expr(&mut self, expr: Expr) -> Expr {
        match expr {
            Expr::Int { .. }
            | Expr::Float { .. }
            | Expr::Bool { .. }
            | Expr::Str { .. }
            | Expr::Nil { .. }
            | Expr::Ident { .. } => expr,
            Expr::Array { elements, span } => Expr::Array {
                elements: self.desugar_exprs(elements),
                span,
            },
            Expr::Object { properties, span } => Expr::Object {
                properties: properties
                    .into_iter()
                    .map(|(key, value)| {
                        let key = match key {
                            PropertyKey::Named(name) => PropertyKey::Named(name),
                            PropertyKey::Computed(e) => PropertyKey::Computed(self.desugar_expr(e)),
                        };
                        (key, self.desugar_expr(value))
                    })
                    .collect(),
                span,
            },
            Expr::Index {
                object,
                index,
                span,
            } => Expr::Index {
                object: Box::new(self.desugar_expr(*object)),
                index: Box::new(self.desugar_expr(*index)),
                span,
            },
            Expr::Field {
                object,
                field,
                span,
            } => Expr::Field {
                object: Box::new(self.desugar_expr(*object)),
                field,
                span,
            },
            Expr::Unary { op, operand, span } => Expr::Unary {
                op,
                operand: Box::new(self.desugar_expr(*operand)),
                span,
            },
            Expr::Binary {
                op,
                left,
                right,
                span,
            } => Expr::Binary {
                op,
                left: Box::new(self.desugar_expr(*left)),
                right: Box::new(self.desugar_expr(*right)),
                span,
            },
            Expr::Call { callee, args, span } => Expr::Call {
                callee: Box::new(self.desugar_expr(*callee)),
                args: self.desugar_exprs(args),
                span,
            },
            Expr::Lambda(fn_def) => Expr::Lambda(self.desugar_fn_def(fn_def)),
            Expr::Literal(node) => self.desugar_literal(node),
        }
    }

    fn desugar_exprs(&mut self, exprs: Vec<Expr>) -> Vec<Expr> {
        exprs.into_iter().map(|e| self.desugar_expr(e)).collect()
    }

    fn desugar_literal(&mut self, node: LiteralNode) -> Expr {
        let span = node.span;
        let kind = node.kind();
        let protocol = kind.protocol();

        debug!(
            ?kind,
            elements = node.len(),
            line = span.line,
            column = span.column,
            "desugaring collection literal"
        );
        self.literals += 1;

        let constructor = self.desugar_expr(*node.constructor);
        let producer = match node.body {
            LiteralBody::Sequence(elements) => {
                let elements = self.desugar_exprs(elements);
                producer(elements, span)
            }
            LiteralBody::Mapping(entries) => {
                let entries = entries
                    .into_iter()
                    .map(|Entry { key, value }| {
                        let key = self.desugar_expr(key);
                        let value = self.desugar_expr(value);
                        producer(vec![key, value], span)
                    })
                    .collect();
                producer(entries, span)
            }
        };

        // __lit_receiver[Symbol.<protocol>](producer)
        let method = Expr::Index {
            object: Box::new(ident(RECEIVER_VAR, span)),
            index: Box::new(Expr::Field {
                object: Box::new(ident(SYMBOL_GLOBAL, span)),
                field: protocol.name().to_string(),
                span,
            }),
            span,
        };
        let dispatch = call(method, vec![producer], span);

        call(
            lambda(vec![RECEIVER_VAR], vec![ret(dispatch, span)], span),
            vec![constructor],
            span,
        )
    }
}

/// A lazy, single-pass producer over `items`, in order.
fn producer(items: Vec<Expr>, span: Span) -> Expr {
    let step = || ident(STEP_VAR, span);

    let mut next_body = vec![Statement::Assign {
        target: AssignTarget::Ident(STEP_VAR.to_string()),
        value: binary(BinaryOp::Add, step(), int(1, span), span),
        span,
    }];
    for (position, item) in items.into_iter().enumerate() {
        next_body.push(Statement::If {
            condition: binary(BinaryOp::Eq, step(), int(position as i64 + 1, span), span),
            then_block: Block {
                statements: vec![ret(step_result(false, item, span), span)],
                span,
            },
            else_block: None,
            span,
        });
    }
    next_body.push(ret(step_result(true, Expr::Nil { span }, span), span));

    let next = Expr::Object {
        properties: vec![(
            PropertyKey::Named("next".to_string()),
            lambda(vec![], next_body, span),
        )],
        span,
    };
    let setup = vec![
        Statement::Let {
            name: STEP_VAR.to_string(),
            init: int(0, span),
            span,
        },
        ret(next, span),
    ];

    call(lambda(vec![], setup, span), vec![], span)
}

/// `{done: <done>, value: <value>}`
fn step_result(done: bool, value: Expr, span: Span) -> Expr {
    Expr::Object {
        properties: vec![
            (
                PropertyKey::Named("done".to_string()),
                Expr::Bool { value: done, span },
            ),
            (PropertyKey::Named("value".to_string()), value),
        ],
        span,
    }
}

fn ident(name: &str, span: Span) -> Expr {
    Expr::Ident {
        name: name.to_string(),
        span,
    }
}

fn int(value: i64, span: Span) -> Expr {
    Expr::Int { value, span }
}

fn binary(op: BinaryOp, left: Expr, right: Expr, span: Span) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
        span,
    }
}

fn call(callee: Expr, args: Vec<Expr>, span: Span) -> Expr {
    Expr::Call {
        callee: Box::new(callee),
        args,
        span,
    }
}

fn ret(value: Expr, span: Span) -> Statement {
    Statement::Return {
        value: Some(value),
        span,
    }
}

fn lambda(params: Vec<&str>, statements: Vec<Statement>, span: Span) -> Expr {
    Expr::Lambda(FnDef {
        name: None,
        params: params.into_iter().map(str::to_string).collect(),
        body: Rc::new(Block { statements, span }),
        span,
    })
}

/// Desugar a program, replacing every collection literal with a protocol call.
pub fn desugar_program(program: Program) -> Program {
    let mut desugar = Desugar::new();
    let program = desugar.desugar_program(program);
    debug!(literals = desugar.literals, "desugar finished");
    program
}

/// Desugar a single literal node into its protocol call expression.
pub fn desugar_literal(node: LiteralNode) -> Expr {
    Desugar::new().desugar_literal(node)
}

/// Whether any collection literal is left in `program`.
pub fn contains_literal(program: &Program) -> bool {
    program.statements.iter().any(stmt_contains_literal)
}

fn block_contains_literal(block: &Block) -> bool {
    block.statements.iter().any(stmt_contains_literal)
}

fn stmt_contains_literal(stmt: &Statement) -> bool {
    match stmt {
        Statement::Let { init: expr, .. }
        | Statement::Throw { value: expr, .. }
        | Statement::Expr { expr, .. } => expr_contains_literal(expr),
        Statement::FnDecl(fn_def) => block_contains_literal(&fn_def.body),
        Statement::Assign { target, value, .. } => {
            let target_has = match target {
                AssignTarget::Ident(_) => false,
                AssignTarget::Field { object, .. } => expr_contains_literal(object),
                AssignTarget::Index { object, index } => {
                    expr_contains_literal(object) || expr_contains_literal(index)
                }
            };
            target_has || expr_contains_literal(value)
        }
        Statement::If {
            condition,
            then_block,
            else_block,
            ..
        } => {
            expr_contains_literal(condition)
                || block_contains_literal(then_block)
                || else_block.as_ref().is_some_and(block_contains_literal)
        }
        Statement::While {
            condition: expr,
            body,
            ..
        }
        | Statement::ForIn {
            iterable: expr,
            body,
            ..
        } => expr_contains_literal(expr) || block_contains_literal(body),
        Statement::Return { value, .. } => value.as_ref().is_some_and(expr_contains_literal),
        Statement::Try {
            try_block,
            catch_block,
            ..
        } => block_contains_literal(try_block) || block_contains_literal(catch_block),
    }
}

fn expr_contains_literal(expr: &Expr) -> bool {
    match expr {
        Expr::Literal(_) => true,
        Expr::Int { .. }
        | Expr::Float { .. }
        | Expr::Bool { .. }
        | Expr::Str { .. }
        | Expr::Nil { .. }
        | Expr::Ident { .. } => false,
        Expr::Array { elements, .. } => elements.iter().any(expr_contains_literal),
        Expr::Object { properties, .. } => properties.iter().any(|(key, value)| {
            matches!(key, PropertyKey::Computed(k) if expr_contains_literal(k))
                || expr_contains_literal(value)
        }),
        Expr::Index { object, index, .. } => {
            expr_contains_literal(object) || expr_contains_literal(index)
        }
        Expr::Field { object, .. } => expr_contains_literal(object),
        Expr::Unary { operand, .. } => expr_contains_literal(operand),
        Expr::Binary { left, right, .. } => {
            expr_contains_literal(left) || expr_contains_literal(right)
        }
        Expr::Call { callee, args, .. } => {
            expr_contains_literal(callee) || args.iter().any(expr_contains_literal)
        }
        Expr::Lambda(fn_def) => block_contains_literal(&fn_def.body),
    }
}
