//! Pretty-printer that renders the AST back as hashlit source.
//!
//! Used to show the result of desugaring (`hashlit desugar`, `--dump-desugared`).
//! The output re-parses to the same tree modulo spans.

use crate::compiler::ast::{
    AssignTarget, BinaryOp, Block, Expr, FnDef, LiteralBody, Program, PropertyKey, Statement,
    UnaryOp,
};

const UNARY_PREC: u8 = 7;
const POSTFIX_PREC: u8 = 8;
const PRIMARY_PREC: u8 = 9;

const KEYWORDS: [&str; 14] = [
    "let", "fun", "if", "else", "while", "for", "in", "return", "throw", "try", "catch", "true",
    "false", "nil",
];

fn binary_prec(op: BinaryOp) -> u8 {
    match op {
        BinaryOp::Or => 1,
        BinaryOp::And => 2,
        BinaryOp::Eq | BinaryOp::Ne => 3,
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => 4,
        BinaryOp::Add | BinaryOp::Sub => 5,
        BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => 6,
    }
}

fn precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::Binary { op, .. } => binary_prec(*op),
        Expr::Unary { .. } => UNARY_PREC,
        Expr::Call { .. } | Expr::Field { .. } | Expr::Index { .. } | Expr::Literal(_) => {
            POSTFIX_PREC
        }
        // Lambdas only appear bare where any expression is allowed.
        Expr::Lambda(_) => 0,
        _ => PRIMARY_PREC,
    }
}

/// A `#` only lexes as a marker right after a token that ends an expression,
/// and `}` is not one of those.
fn ends_with_brace(expr: &Expr) -> bool {
    match expr {
        Expr::Object { .. } | Expr::Lambda(_) => true,
        Expr::Literal(node) => matches!(node.body, LiteralBody::Mapping(_)),
        _ => false,
    }
}

fn is_plain_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !KEYWORDS.contains(&name)
}

fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            _ => out.push(ch),
        }
    }
    out.push('"');
    out
}

fn float_literal(value: f64) -> String {
    let text = value.to_string();
    if text.contains('.') {
        text
    } else {
        format!("{}.0", text)
    }
}

/// Renders programs and expressions as source text.
#[derive(Default)]
pub struct SourcePrinter {
    output: String,
    indent: usize,
}

impl SourcePrinter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn print_program(&mut self, program: &Program) -> &str {
        for stmt in &program.statements {
            self.print_statement(stmt);
        }
        &self.output
    }

    pub fn print_expression(&mut self, expr: &Expr) -> &str {
        self.print_expr(expr, 0);
        &self.output
    }

    fn write(&mut self, s: &str) {
        self.output.push_str(s);
    }

    fn write_indent(&mut self) {
        for _ in 0..self.indent {
            self.output.push_str("    ");
        }
    }

    fn print_block(&mut self, block: &Block) {
        if block.statements.is_empty() {
            self.write("{}");
            return;
        }
        self.write("{\n");
        self.indent += 1;
        for stmt in &block.statements {
            self.print_statement(stmt);
        }
        self.indent -= 1;
        self.write_indent();
        self.write("}");
    }

    fn print_fn(&mut self, fn_def: &FnDef) {
        self.write("fun");
        if let Some(name) = &fn_def.name {
            self.write(" ");
            self.write(name);
        }
        self.write("(");
        self.write(&fn_def.params.join(", "));
        self.write(") ");
        self.print_block(&fn_def.body);
    }

    fn print_statement(&mut self, stmt: &Statement) {
        self.write_indent();
        match stmt {
            Statement::Let { name, init, .. } => {
                self.write(&format!("let {} = ", name));
                self.print_expr(init, 0);
                self.write(";");
            }
            Statement::FnDecl(fn_def) => self.print_fn(fn_def),
            Statement::Assign { target, value, .. } => {
                match target {
                    AssignTarget::Ident(name) => self.write(name),
                    AssignTarget::Field { object, field } => {
                        self.print_postfix_operand(object);
                        self.write(".");
                        self.write(field);
                    }
                    AssignTarget::Index { object, index } => {
                        self.print_postfix_operand(object);
                        self.write("[");
                        self.print_expr(index, 0);
                        self.write("]");
                    }
                }
                self.write(" = ");
                self.print_expr(value, 0);
                self.write(";");
            }
            Statement::If {
                condition,
                then_block,
                else_block,
                ..
            } => {
                self.print_if(condition, then_block, else_block.as_ref());
            }
            Statement::While {
                condition, body, ..
            } => {
                self.write("while ");
                self.print_expr(condition, 0);
                self.write(" ");
                self.print_block(body);
            }
            Statement::ForIn {
                var,
                iterable,
                body,
                ..
            } => {
                self.write(&format!("for {} in ", var));
                self.print_expr(iterable, 0);
                self.write(" ");
                self.print_block(body);
            }
            Statement::Return { value, .. } => {
                self.write("return");
                if let Some(value) = value {
                    self.write(" ");
                    self.print_expr(value, 0);
                }
                self.write(";");
            }
            Statement::Throw { value, .. } => {
                self.write("throw ");
                self.print_expr(value, 0);
                self.write(";");
            }
            Statement::Try {
                try_block,
                catch_var,
                catch_block,
                ..
            } => {
                self.write("try ");
                self.print_block(try_block);
                self.write(&format!(" catch {} ", catch_var));
                self.print_block(catch_block);
            }
            Statement::Expr { expr, .. } => {
                self.print_expr(expr, 0);
                self.write(";");
            }
        }
        self.write("\n");
    }

    fn print_if(&mut self, condition: &Expr, then_block: &Block, else_block: Option<&Block>) {
        self.write("if ");
        self.print_expr(condition, 0);
        self.write(" ");
        self.print_block(then_block);

        let Some(else_block) = else_block else {
            return;
        };
        self.write(" else ");
        match else_block.statements.as_slice() {
            [
                Statement::If {
                    condition,
                    then_block,
                    else_block,
                    ..
                },
            ] => self.print_if(condition, then_block, else_block.as_ref()),
            _ => self.print_block(else_block),
        }
    }

    /// The object of a call, member access, index or literal.
    fn print_postfix_operand(&mut self, expr: &Expr) {
        if ends_with_brace(expr) || precedence(expr) < POSTFIX_PREC {
            self.write("(");
            self.print_expr(expr, 0);
            self.write(")");
        } else {
            self.print_expr(expr, POSTFIX_PREC);
        }
    }

    fn print_list(&mut self, items: &[Expr]) {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.write(", ");
            }
            self.print_expr(item, 0);
        }
    }

    fn print_expr(&mut self, expr: &Expr, min_prec: u8) {
        let parenthesize = precedence(expr) < min_prec;
        if parenthesize {
            self.write("(");
        }

        match expr {
            Expr::Int { value, .. } => self.write(&value.to_string()),
            Expr::Float { value, .. } => self.write(&float_literal(*value)),
            Expr::Bool { value, .. } => self.write(if *value { "true" } else { "false" }),
            Expr::Str { value, .. } => self.write(&quote(value)),
            Expr::Nil { .. } => self.write("nil"),
            Expr::Ident { name, .. } => self.write(name),
            Expr::Array { elements, .. } => {
                self.write("[");
                self.print_list(elements);
                self.write("]");
            }
            Expr::Object { properties, .. } => {
                self.write("{");
                for (i, (key, value)) in properties.iter().enumerate() {
                    if i > 0 {
                        self.write(", ");
                    }
                    match key {
                        PropertyKey::Named(name) if is_plain_name(name) => self.write(name),
                        PropertyKey::Named(name) => self.write(&quote(name)),
                        PropertyKey::Computed(key) => {
                            self.write("[");
                            self.print_expr(key, 0);
                            self.write("]");
                        }
                    }
                    self.write(": ");
                    self.print_expr(value, 0);
                }
                self.write("}");
            }
            Expr::Index { object, index, .. } => {
                self.print_postfix_operand(object);
                self.write("[");
                self.print_expr(index, 0);
                self.write("]");
            }
            Expr::Field { object, field, .. } => {
                self.print_postfix_operand(object);
                self.write(".");
                self.write(field);
            }
            Expr::Unary { op, operand, .. } => {
                self.write(match op {
                    UnaryOp::Neg => "-",
                    UnaryOp::Not => "!",
                });
                self.print_expr(operand, UNARY_PREC);
            }
            Expr::Binary {
                op, left, right, ..
            } => {
                let prec = binary_prec(*op);
                self.print_expr(left, prec);
                self.write(&format!(" {} ", op.symbol()));
                self.print_expr(right, prec + 1);
            }
            Expr::Call { callee, args, .. } => {
                self.print_postfix_operand(callee);
                self.write("(");
                self.print_list(args);
                self.write(")");
            }
            Expr::Lambda(fn_def) => self.print_fn(fn_def),
            Expr::Literal(node) => {
                self.print_postfix_operand(&node.constructor);
                match &node.body {
                    LiteralBody::Sequence(elements) => {
                        self.write("#[");
                        self.print_list(elements);
                        self.write("]");
                    }
                    LiteralBody::Mapping(entries) => {
                        self.write("#{");
                        for (i, entry) in entries.iter().enumerate() {
                            if i > 0 {
                                self.write(", ");
                            }
                            self.print_expr(&entry.key, 0);
                            self.write(": ");
                            self.print_expr(&entry.value, 0);
                        }
                        self.write("}");
                    }
                }
            }
        }

        if parenthesize {
            self.write(")");
        }
    }
}

/// Render a whole program as source.
pub fn program_to_source(program: &Program) -> String {
    let mut printer = SourcePrinter::new();
    printer.print_program(program).to_string()
}

/// Render a single expression as source.
pub fn expr_to_source(expr: &Expr) -> String {
    let mut printer = SourcePrinter::new();
    printer.print_expression(expr).to_string()
}
