//! Tree-walking evaluator for desugared programs.

pub mod builtins;
pub mod env;
pub mod protocol;
pub mod value;

use std::io::Write;
use std::rc::Rc;

use thiserror::Error;
use tracing::{debug, info};

use crate::compiler::ast::{
    AssignTarget, BinaryOp, Block, Expr, FnDef, Program, PropertyKey, Statement, UnaryOp,
    WellKnownSymbol,
};
use crate::compiler::lexer::Span;
use crate::config::{OutputMode, RuntimeConfig};

pub use env::Env;
pub use protocol::{LiteralProtocol, Producer};
pub use value::Value;

use value::{Closure, Key, Object};

/// Errors raised while evaluating a program.
#[derive(Debug, Clone, Error)]
pub enum RuntimeError {
    #[error("undefined variable '{name}'")]
    UndefinedVariable { name: String, span: Span },
    #[error("{callee} is not callable")]
    NotCallable { callee: String, span: Span },
    #[error("no method '{method}' on {receiver}")]
    NoSuchMethod {
        method: String,
        receiver: String,
        span: Span,
    },
    #[error("{receiver} has no {symbol} method")]
    MissingProtocolMethod {
        symbol: WellKnownSymbol,
        receiver: String,
        span: Span,
    },
    #[error("{message}")]
    TypeMismatch { message: String, span: Span },
    #[error("expected {expected} arguments, got {found}")]
    ArityMismatch {
        expected: usize,
        found: usize,
        span: Span,
    },
    #[error("index {index} out of bounds (length {length})")]
    IndexOutOfBounds {
        index: i64,
        length: usize,
        span: Span,
    },
    #[error("division by zero")]
    DivisionByZero { span: Span },
    #[error("malformed producer: {message}")]
    MalformedProducer { message: String, span: Span },
    #[error("maximum call depth of {limit} exceeded")]
    StackOverflow { limit: usize, span: Span },
    /// A value raised by `throw`, including from inside a protocol method.
    #[error("uncaught exception: {value}")]
    Thrown { value: Value, span: Span },
}

impl RuntimeError {
    pub fn span(&self) -> Span {
        match self {
            RuntimeError::UndefinedVariable { span, .. }
            | RuntimeError::NotCallable { span, .. }
            | RuntimeError::NoSuchMethod { span, .. }
            | RuntimeError::MissingProtocolMethod { span, .. }
            | RuntimeError::TypeMismatch { span, .. }
            | RuntimeError::ArityMismatch { span, .. }
            | RuntimeError::IndexOutOfBounds { span, .. }
            | RuntimeError::DivisionByZero { span }
            | RuntimeError::MalformedProducer { span, .. }
            | RuntimeError::StackOverflow { span, .. }
            | RuntimeError::Thrown { span, .. } => *span,
        }
    }

    /// The value a `catch` clause binds for this error.
    fn into_caught_value(self) -> Value {
        match self {
            RuntimeError::Thrown { value, .. } => value,
            other => Value::str(&other.to_string()),
        }
    }
}

enum Flow {
    Normal,
    Return(Value),
}

/// The interpreter state: globals, configuration and call depth.
pub struct Interpreter {
    globals: Env,
    config: RuntimeConfig,
    depth: usize,
    output: Vec<String>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        let globals = Env::new();
        builtins::install(&globals);
        Self {
            globals,
            config,
            depth: 0,
            output: Vec::new(),
        }
    }

    /// Buffer printed lines instead of writing them to stdout.
    pub fn capture_output(mut self) -> Self {
        self.config.output = OutputMode::Capture;
        self
    }

    /// Drain lines printed so far in capture mode.
    pub fn take_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.output)
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn global(&self, name: &str) -> Option<Value> {
        self.globals.get(name)
    }

    pub fn define_global(&mut self, name: impl Into<String>, value: Value) {
        self.globals.define(name, value);
    }

    /// Make a native constructor available under its own name.
    pub fn register_constructor(&mut self, ctor: Rc<dyn LiteralProtocol>) {
        let name = ctor.name().to_string();
        debug!(%name, "registering constructor");
        self.globals.define(name, Value::Constructor(ctor));
    }

    pub(crate) fn emit(&mut self, line: String) {
        match self.config.output {
            OutputMode::Capture => self.output.push(line),
            OutputMode::Stdout => {
                let mut stdout = std::io::stdout().lock();
                // A closed stdout is not a program error.
                let _ = writeln!(stdout, "{}", line);
            }
        }
    }

    /// Execute a program's top-level statements in the global scope.
    pub fn run(&mut self, program: &Program) -> Result<(), RuntimeError> {
        let globals = self.globals.clone();
        self.exec_statements(&program.statements, &globals)?;
        Ok(())
    }

    fn exec_statements(&mut self, statements: &[Statement], env: &Env) -> Result<Flow, RuntimeError> {
        for statement in statements {
            if let Flow::Return(value) = self.exec(statement, env)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_block(&mut self, block: &Block, env: &Env) -> Result<Flow, RuntimeError> {
        self.exec_statements(&block.statements, &env.child())
    }

    fn exec(&mut self, statement: &Statement, env: &Env) -> Result<Flow, RuntimeError> {
        match statement {
            Statement::Let { name, init, .. } => {
                let value = self.eval(init, env)?;
                env.define(name.clone(), value);
            }
            Statement::FnDecl(def) => {
                let closure = self.closure(def, env);
                if let Some(name) = &def.name {
                    env.define(name.clone(), closure);
                }
            }
            Statement::Assign {
                target,
                value,
                span,
            } => self.assign(target, value, env, *span)?,
            Statement::If {
                condition,
                then_block,
                else_block,
                ..
            } => {
                if self.eval(condition, env)?.is_truthy() {
                    return self.exec_block(then_block, env);
                } else if let Some(else_block) = else_block {
                    return self.exec_block(else_block, env);
                }
            }
            Statement::While {
                condition, body, ..
            } => {
                while self.eval(condition, env)?.is_truthy() {
                    if let Flow::Return(value) = self.exec_block(body, env)? {
                        return Ok(Flow::Return(value));
                    }
                }
            }
            Statement::ForIn {
                var,
                iterable,
                body,
                span,
            } => return self.exec_for_in(var, iterable, body, env, *span),
            Statement::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.eval(expr, env)?,
                    None => Value::Nil,
                };
                return Ok(Flow::Return(value));
            }
            Statement::Throw { value, span } => {
                let value = self.eval(value, env)?;
                return Err(RuntimeError::Thrown { value, span: *span });
            }
            Statement::Try {
                try_block,
                catch_var,
                catch_block,
                ..
            } => match self.exec_block(try_block, env) {
                Ok(flow) => return Ok(flow),
                Err(err) => {
                    debug!(error = %err, "caught");
                    let scope = env.child();
                    scope.define(catch_var.clone(), err.into_caught_value());
                    return self.exec_statements(&catch_block.statements, &scope);
                }
            },
            Statement::Expr { expr, .. } => {
                self.eval(expr, env)?;
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_for_in(
        &mut self,
        var: &str,
        iterable: &Expr,
        body: &Block,
        env: &Env,
        span: Span,
    ) -> Result<Flow, RuntimeError> {
        let iterable = self.eval(iterable, env)?;
        let snapshot = match &iterable {
            Value::Array(items) | Value::Set(items) => Some(items.borrow().clone()),
            Value::Map(map) => Some(
                map.borrow()
                    .entries()
                    .iter()
                    .map(|(k, v)| Value::array(vec![k.clone(), v.clone()]))
                    .collect(),
            ),
            Value::Object(_) => None,
            other => {
                return Err(RuntimeError::TypeMismatch {
                    message: format!("cannot iterate over {}", other.type_name()),
                    span,
                });
            }
        };

        let run_body = |interp: &mut Self, item: Value| {
            let scope = env.child();
            scope.define(var, item);
            interp.exec_statements(&body.statements, &scope)
        };

        match snapshot {
            Some(items) => {
                for item in items {
                    if let Flow::Return(value) = run_body(self, item)? {
                        return Ok(Flow::Return(value));
                    }
                }
            }
            None => {
                let mut producer = Producer::new(iterable, span);
                while let Some(item) = producer.pull(self)? {
                    if let Flow::Return(value) = run_body(self, item)? {
                        return Ok(Flow::Return(value));
                    }
                }
            }
        }
        Ok(Flow::Normal)
    }

    fn assign(
        &mut self,
        target: &AssignTarget,
        value: &Expr,
        env: &Env,
        span: Span,
    ) -> Result<(), RuntimeError> {
        match target {
            AssignTarget::Ident(name) => {
                let value = self.eval(value, env)?;
                if !env.assign(name, value) {
                    return Err(RuntimeError::UndefinedVariable {
                        name: name.clone(),
                        span,
                    });
                }
            }
            AssignTarget::Field { object, field } => {
                let object = self.eval(object, env)?;
                if let Value::Map(_) = object {
                    return Err(RuntimeError::TypeMismatch {
                        message: format!(
                            "cannot set field {:?} on map; use m[key] = value",
                            field
                        ),
                        span,
                    });
                }
                let value = self.eval(value, env)?;
                self.set_property(&object, Value::str(field), value, span)?;
            }
            AssignTarget::Index { object, index } => {
                let object = self.eval(object, env)?;
                let index = self.eval(index, env)?;
                let value = self.eval(value, env)?;
                self.set_property(&object, index, value, span)?;
            }
        }
        Ok(())
    }

    fn set_property(
        &mut self,
        object: &Value,
        key: Value,
        value: Value,
        span: Span,
    ) -> Result<(), RuntimeError> {
        match object {
            Value::Array(items) => {
                let mut items = items.borrow_mut();
                let index = checked_index(&key, items.len(), span)?;
                items[index] = value;
            }
            Value::Map(map) => map.borrow_mut().insert(key, value),
            Value::Object(obj) => {
                let key = object_key(&key, span)?;
                obj.borrow_mut().set(key, value);
            }
            other => {
                return Err(RuntimeError::TypeMismatch {
                    message: format!("cannot set properties on {}", other.type_name()),
                    span,
                });
            }
        }
        Ok(())
    }

    fn closure(&self, def: &FnDef, env: &Env) -> Value {
        Value::Function(Rc::new(Closure {
            def: def.clone(),
            env: env.clone(),
        }))
    }

    fn eval(&mut self, expr: &Expr, env: &Env) -> Result<Value, RuntimeError> {
        match expr {
            Expr::Int { value, .. } => Ok(Value::Int(*value)),
            Expr::Float { value, .. } => Ok(Value::Float(*value)),
            Expr::Bool { value, .. } => Ok(Value::Bool(*value)),
            Expr::Str { value, .. } => Ok(Value::str(value)),
            Expr::Nil { .. } => Ok(Value::Nil),
            Expr::Ident { name, span } => {
                env.get(name).ok_or_else(|| RuntimeError::UndefinedVariable {
                    name: name.clone(),
                    span: *span,
                })
            }
            Expr::Array { elements, .. } => {
                let items = elements
                    .iter()
                    .map(|element| self.eval(element, env))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::array(items))
            }
            Expr::Object { properties, span } => {
                let mut object = Object::new();
                for (key, value) in properties {
                    let key = match key {
                        PropertyKey::Named(name) => Key::Name(Rc::from(name.as_str())),
                        PropertyKey::Computed(expr) => {
                            let key = self.eval(expr, env)?;
                            object_key(&key, *span)?
                        }
                    };
                    let value = self.eval(value, env)?;
                    object.set(key, value);
                }
                Ok(Value::object(object))
            }
            Expr::Index {
                object,
                index,
                span,
            } => {
                let object = self.eval(object, env)?;
                let index = self.eval(index, env)?;
                Ok(self.lookup(&object, &index, *span)?.unwrap_or(Value::Nil))
            }
            Expr::Field {
                object,
                field,
                span,
            } => {
                let object = self.eval(object, env)?;
                Ok(self.field(&object, field, *span)?.unwrap_or(Value::Nil))
            }
            Expr::Unary { op, operand, span } => {
                let operand = self.eval(operand, env)?;
                unary(*op, operand, *span)
            }
            Expr::Binary {
                op: BinaryOp::And,
                left,
                right,
                ..
            } => {
                let truthy = self.eval(left, env)?.is_truthy() && self.eval(right, env)?.is_truthy();
                Ok(Value::Bool(truthy))
            }
            Expr::Binary {
                op: BinaryOp::Or,
                left,
                right,
                ..
            } => {
                let truthy = self.eval(left, env)?.is_truthy() || self.eval(right, env)?.is_truthy();
                Ok(Value::Bool(truthy))
            }
            Expr::Binary {
                op,
                left,
                right,
                span,
            } => {
                let left = self.eval(left, env)?;
                let right = self.eval(right, env)?;
                binary(*op, left, right, *span)
            }
            Expr::Call { callee, args, span } => self.eval_call(callee, args, env, *span),
            Expr::Lambda(def) => Ok(self.closure(def, env)),
            Expr::Literal(node) => Err(RuntimeError::TypeMismatch {
                message: "collection literal reached the evaluator without desugaring".to_string(),
                span: node.span,
            }),
        }
    }

    /// Method calls resolve the receiver and the method before any argument
    /// is evaluated.
    fn eval_call(
        &mut self,
        callee: &Expr,
        args: &[Expr],
        env: &Env,
        span: Span,
    ) -> Result<Value, RuntimeError> {
        let function = match callee {
            Expr::Field { object, field, .. } => {
                let receiver = self.eval(object, env)?;
                let found = self.field(&receiver, field, span)?;
                self.resolve_method(&receiver, &Value::str(field), found, span)?
            }
            Expr::Index { object, index, .. } => {
                let receiver = self.eval(object, env)?;
                let key = self.eval(index, env)?;
                self.method(&receiver, &key, span)?
            }
            other => self.eval(other, env)?,
        };
        let args = args
            .iter()
            .map(|arg| self.eval(arg, env))
            .collect::<Result<Vec<_>, _>>()?;
        self.call_value(function, args, span)
    }

    /// Call `receiver[key](args...)`.
    pub fn invoke_method(
        &mut self,
        receiver: &Value,
        key: &Value,
        args: Vec<Value>,
        span: Span,
    ) -> Result<Value, RuntimeError> {
        let function = self.method(receiver, key, span)?;
        self.call_value(function, args, span)
    }

    fn method(&mut self, receiver: &Value, key: &Value, span: Span) -> Result<Value, RuntimeError> {
        let found = self.lookup(receiver, key, span)?;
        self.resolve_method(receiver, key, found, span)
    }

    fn resolve_method(
        &mut self,
        receiver: &Value,
        key: &Value,
        found: Option<Value>,
        span: Span,
    ) -> Result<Value, RuntimeError> {
        if let Some(function) = found.filter(|f| !f.is_nil()) {
            if let Value::Symbol(symbol) = key {
                if self.config.trace_protocol {
                    info!(%symbol, receiver = %receiver.describe(), "protocol dispatch");
                } else {
                    debug!(%symbol, receiver = %receiver.describe(), "protocol dispatch");
                }
            }
            return Ok(function);
        }
        match key {
            Value::Symbol(symbol) => Err(RuntimeError::MissingProtocolMethod {
                symbol: *symbol,
                receiver: receiver.describe(),
                span,
            }),
            other => Err(RuntimeError::NoSuchMethod {
                method: other.to_string(),
                receiver: receiver.describe(),
                span,
            }),
        }
    }

    /// `a.name`. Map entries are never fields, so a key such as `"size"`
    /// cannot hide a built-in member.
    fn field(&self, object: &Value, name: &str, span: Span) -> Result<Option<Value>, RuntimeError> {
        match object {
            Value::Map(_) => Ok(builtins::member(object, name)),
            _ => self.lookup(object, &Value::str(name), span),
        }
    }

    /// Property lookup shared by `a[k]`, `a.b` and method resolution.
    fn lookup(&self, object: &Value, key: &Value, span: Span) -> Result<Option<Value>, RuntimeError> {
        match (object, key) {
            (Value::Nil, _) => Err(RuntimeError::TypeMismatch {
                message: format!("cannot read property {:?} of nil", key),
                span,
            }),
            (Value::Array(items), Value::Int(_)) => {
                let items = items.borrow();
                let index = checked_index(key, items.len(), span)?;
                Ok(Some(items[index].clone()))
            }
            (Value::Map(map), key) => Ok(map.borrow().get(key)),
            (Value::Object(obj), key) => match Key::from_value(key) {
                Some(key) => Ok(obj.borrow().get(&key)),
                None => Ok(None),
            },
            (Value::Constructor(ctor), Value::Symbol(symbol)) => {
                Ok(protocol::protocol_method(ctor, *symbol))
            }
            _ => Ok(member_by_key(object, key)),
        }
    }

    /// Call any callable value with already-evaluated arguments.
    pub fn call_value(
        &mut self,
        function: Value,
        args: Vec<Value>,
        span: Span,
    ) -> Result<Value, RuntimeError> {
        if self.depth >= self.config.max_call_depth {
            return Err(RuntimeError::StackOverflow {
                limit: self.config.max_call_depth,
                span,
            });
        }
        self.depth += 1;
        let result = match &function {
            Value::Function(closure) => self.call_closure(closure, args, span),
            Value::Native(native) => (native.func)(self, args, span),
            other => Err(RuntimeError::NotCallable {
                callee: other.describe(),
                span,
            }),
        };
        self.depth -= 1;
        result
    }

    fn call_closure(
        &mut self,
        closure: &Closure,
        args: Vec<Value>,
        span: Span,
    ) -> Result<Value, RuntimeError> {
        let params = &closure.def.params;
        if params.len() != args.len() {
            return Err(RuntimeError::ArityMismatch {
                expected: params.len(),
                found: args.len(),
                span,
            });
        }
        let scope = closure.env.child();
        for (param, arg) in params.iter().zip(args) {
            scope.define(param.clone(), arg);
        }
        match self.exec_statements(&closure.def.body.statements, &scope)? {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::Nil),
        }
    }
}

fn member_by_key(object: &Value, key: &Value) -> Option<Value> {
    match key {
        Value::Str(name) => builtins::member(object, name),
        _ => None,
    }
}

fn object_key(key: &Value, span: Span) -> Result<Key, RuntimeError> {
    Key::from_value(key).ok_or_else(|| RuntimeError::TypeMismatch {
        message: format!("object keys must be strings or symbols, got {}", key.type_name()),
        span,
    })
}

fn checked_index(key: &Value, length: usize, span: Span) -> Result<usize, RuntimeError> {
    let index = key.as_int().ok_or_else(|| RuntimeError::TypeMismatch {
        message: format!("array index must be an int, got {}", key.type_name()),
        span,
    })?;
    usize::try_from(index)
        .ok()
        .filter(|i| *i < length)
        .ok_or(RuntimeError::IndexOutOfBounds {
            index,
            length,
            span,
        })
}

fn unary(op: UnaryOp, operand: Value, span: Span) -> Result<Value, RuntimeError> {
    match (op, operand) {
        (UnaryOp::Not, value) => Ok(Value::Bool(!value.is_truthy())),
        (UnaryOp::Neg, Value::Int(n)) => Ok(Value::Int(n.wrapping_neg())),
        (UnaryOp::Neg, Value::Float(x)) => Ok(Value::Float(-x)),
        (UnaryOp::Neg, other) => Err(RuntimeError::TypeMismatch {
            message: format!("cannot negate {}", other.type_name()),
            span,
        }),
    }
}

fn binary(op: BinaryOp, left: Value, right: Value, span: Span) -> Result<Value, RuntimeError> {
    let mismatch = |left: &Value, right: &Value| RuntimeError::TypeMismatch {
        message: format!(
            "unsupported operand types for {}: {} and {}",
            op.symbol(),
            left.type_name(),
            right.type_name()
        ),
        span,
    };
    match op {
        BinaryOp::Eq => return Ok(Value::Bool(left.equals(&right))),
        BinaryOp::Ne => return Ok(Value::Bool(!left.equals(&right))),
        _ => {}
    }
    match (&left, &right) {
        (Value::Str(a), _) if op == BinaryOp::Add => Ok(Value::str(&format!("{}{}", a, right))),
        (_, Value::Str(b)) if op == BinaryOp::Add => Ok(Value::str(&format!("{}{}", left, b))),
        (Value::Str(a), Value::Str(b)) => compare(op, a.cmp(b)).ok_or_else(|| mismatch(&left, &right)),
        (Value::Int(a), Value::Int(b)) => {
            let (a, b) = (*a, *b);
            match op {
                BinaryOp::Add => Ok(Value::Int(a.wrapping_add(b))),
                BinaryOp::Sub => Ok(Value::Int(a.wrapping_sub(b))),
                BinaryOp::Mul => Ok(Value::Int(a.wrapping_mul(b))),
                BinaryOp::Div if b == 0 => Err(RuntimeError::DivisionByZero { span }),
                BinaryOp::Div => Ok(Value::Int(a.wrapping_div(b))),
                BinaryOp::Mod if b == 0 => Err(RuntimeError::DivisionByZero { span }),
                BinaryOp::Mod => Ok(Value::Int(a.wrapping_rem(b))),
                _ => compare(op, a.cmp(&b)).ok_or_else(|| mismatch(&left, &right)),
            }
        }
        _ => {
            let (Some(a), Some(b)) = (left.as_float(), right.as_float()) else {
                return Err(mismatch(&left, &right));
            };
            match op {
                BinaryOp::Add => Ok(Value::Float(a + b)),
                BinaryOp::Sub => Ok(Value::Float(a - b)),
                BinaryOp::Mul => Ok(Value::Float(a * b)),
                BinaryOp::Div => Ok(Value::Float(a / b)),
                BinaryOp::Mod => Ok(Value::Float(a % b)),
                _ => a
                    .partial_cmp(&b)
                    .and_then(|ordering| compare(op, ordering))
                    .ok_or_else(|| mismatch(&left, &right)),
            }
        }
    }
}

fn compare(op: BinaryOp, ordering: std::cmp::Ordering) -> Option<Value> {
    let result = match op {
        BinaryOp::Lt => ordering.is_lt(),
        BinaryOp::Le => ordering.is_le(),
        BinaryOp::Gt => ordering.is_gt(),
        BinaryOp::Ge => ordering.is_ge(),
        _ => return None,
    };
    Some(Value::Bool(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile_source;

    fn run(source: &str) -> Result<Vec<String>, RuntimeError> {
        let mut interp = Interpreter::new().capture_output();
        let program = compile_source(source).expect("compile");
        interp.run(&program)?;
        Ok(interp.take_output())
    }

    #[test]
    fn test_user_defined_protocol() {
        let output = run(
            r#"
            let Bag = {};
            Bag[Symbol.sequenceLiteral] = fun(items) {
                let total = 0;
                for x in items { total = total + x; }
                return {total: total};
            };
            print(Bag#[1, 2, 3].total);
            "#,
        )
        .unwrap();
        assert_eq!(output, vec!["6"]);
    }

    #[test]
    fn test_user_mapping_protocol_receives_entry_producers() {
        let output = run(
            r#"
            let Pairs = {};
            Pairs[Symbol.mappingLiteral] = fun(entries) {
                let out = [];
                for entry in entries {
                    let kv = [];
                    for part in entry { kv.push(part); }
                    out.push(kv);
                }
                return out;
            };
            print(Pairs#{"a": 1, "b": 2});
            "#,
        )
        .unwrap();
        assert_eq!(output, vec![r#"[["a", 1], ["b", 2]]"#]);
    }

    #[test]
    fn test_protocol_failure_propagates_unchanged() {
        let mut interp = Interpreter::new().capture_output();
        let program = compile_source(
            r#"
            let Boom = {};
            Boom[Symbol.sequenceLiteral] = fun(items) {
                for x in items { if x == 2 { throw "bad element"; } }
                return nil;
            };
            fun note(v) { print("saw", v); return v; }
            Boom#[note(1), note(2), note(3)];
            "#,
        )
        .unwrap();
        let err = interp.run(&program).unwrap_err();
        match err {
            RuntimeError::Thrown { value, .. } => assert_eq!(value.to_string(), "bad element"),
            other => panic!("unexpected error: {other}"),
        }
        // Side effects of elements pulled before the failure remain.
        assert_eq!(interp.take_output(), vec!["saw 1", "saw 2"]);
    }

    #[test]
    fn test_try_catch_around_literal() {
        let output = run(
            r#"
            try {
                let m = Array#{1: 2};
            } catch e {
                print(e);
            }
            "#,
        )
        .unwrap();
        assert_eq!(output, vec!["constructor Array has no Symbol.mappingLiteral method"]);
    }

    #[test]
    fn test_constructor_evaluated_before_elements() {
        let output = run(
            r#"
            fun ctor() { print("ctor"); return Array; }
            fun el(v) { print("el", v); return v; }
            print(ctor()#[el(1), el(2)]);
            "#,
        )
        .unwrap();
        assert_eq!(output, vec!["ctor", "el 1", "el 2", "[1, 2]"]);
    }

    #[test]
    fn test_nested_literals() {
        let output = run(r#"print(Array#[Set#[1, 1], Map#{"k": Array#[]}]);"#).unwrap();
        assert_eq!(output, vec![r#"[Set {1}, Map {"k" => []}]"#]);
    }

    #[test]
    fn test_recursion_limit() {
        let mut interp = Interpreter::with_config(RuntimeConfig {
            max_call_depth: 10,
            ..RuntimeConfig::default()
        })
        .capture_output();
        let program = compile_source("fun f(n) { return f(n + 1); } f(0);").unwrap();
        let err = interp.run(&program).unwrap_err();
        assert!(matches!(err, RuntimeError::StackOverflow { limit: 10, .. }));
    }

    #[test]
    fn test_closures_capture_environment() {
        let output = run(
            r#"
            fun counter() {
                let n = 0;
                return fun() { n = n + 1; return n; };
            }
            let c = counter();
            c();
            c();
            print(c());
            "#,
        )
        .unwrap();
        assert_eq!(output, vec!["3"]);
    }

    #[test]
    fn test_arithmetic_and_errors() {
        assert_eq!(run("print(7 / 2, 7 % 2, 1.5 * 2, \"a\" + 1);").unwrap(), vec!["3 1 3.0 a1"]);
        assert!(matches!(run("print(1 / 0);"), Err(RuntimeError::DivisionByZero { .. })));
        assert!(matches!(run("print(missing);"), Err(RuntimeError::UndefinedVariable { .. })));
        assert!(matches!(run("let x = 1; x();"), Err(RuntimeError::NotCallable { .. })));
    }

    #[test]
    fn test_map_iteration_yields_pairs() {
        let output = run(
            r#"
            let m = Map#{"a": 1, "b": 2};
            for pair in m { print(pair[0], pair[1]); }
            "#,
        )
        .unwrap();
        assert_eq!(output, vec!["a 1", "b 2"]);
    }

    #[test]
    fn test_map_keys_do_not_hide_members() {
        let output = run(
            r#"
            let m = Map#{"size": 99, "get": 1, "x": 2};
            print(m.size, m.get("get"), m.get("size"), m["size"], m.has("x"));
            "#,
        )
        .unwrap();
        assert_eq!(output, vec!["3 1 99 99 true"]);
    }

    #[test]
    fn test_print_array_that_contains_itself() {
        let output = run("let a = Array#[1]; a.push(a); print(a, a.length);").unwrap();
        assert_eq!(output, vec!["[1, [...]] 2"]);
    }
}
