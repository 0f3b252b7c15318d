use std::cell::RefCell;
use std::rc::Rc;

use crate::compiler::ast::WellKnownSymbol;
use crate::compiler::lexer::Span;
use crate::interp::env::Env;
use crate::interp::protocol::{
    ArrayConstructor, LiteralProtocol, MapConstructor, ObjectConstructor, SetConstructor,
};
use crate::interp::value::{Key, Object, OrderedMap, Value};
use crate::interp::RuntimeError;

/// Bind the standard globals into `env`.
pub fn install(env: &Env) {
    let constructors: [Rc<dyn LiteralProtocol>; 4] = [
        Rc::new(ArrayConstructor),
        Rc::new(SetConstructor),
        Rc::new(MapConstructor),
        Rc::new(ObjectConstructor),
    ];
    for ctor in constructors {
        env.define(ctor.name().to_string(), Value::Constructor(ctor));
    }

    let mut symbol = Object::new();
    for sym in WellKnownSymbol::ALL {
        symbol.set(Key::Name(Rc::from(sym.name())), Value::Symbol(sym));
    }
    env.define("Symbol", Value::object(symbol));

    env.define(
        "print",
        Value::native("print", |interp, args, _span| {
            let line = args
                .iter()
                .map(|arg| arg.to_string())
                .collect::<Vec<_>>()
                .join(" ");
            interp.emit(line);
            Ok(Value::Nil)
        }),
    );

    env.define(
        "len",
        Value::native("len", |_interp, args, span| {
            let [value] = one_arg(args, span)?;
            length(&value).map(Value::Int).ok_or_else(|| RuntimeError::TypeMismatch {
                message: format!("len() expects a collection or string, got {}", value.type_name()),
                span,
            })
        }),
    );
}

fn one_arg(args: Vec<Value>, span: Span) -> Result<[Value; 1], RuntimeError> {
    <[Value; 1]>::try_from(args).map_err(|args| RuntimeError::ArityMismatch {
        expected: 1,
        found: args.len(),
        span,
    })
}

fn length(value: &Value) -> Option<i64> {
    let n = match value {
        Value::Str(s) => s.chars().count(),
        Value::Array(items) | Value::Set(items) => items.borrow().len(),
        Value::Map(map) => map.borrow().len(),
        Value::Object(object) => object.borrow().len(),
        _ => return None,
    };
    Some(n as i64)
}

/// Built-in members of arrays, sets, maps and strings.
///
/// Methods are returned bound to their receiver.
pub fn member(receiver: &Value, name: &str) -> Option<Value> {
    match (receiver, name) {
        (Value::Str(_), "length")
        | (Value::Array(_), "length")
        | (Value::Set(_), "size")
        | (Value::Map(_), "size") => length(receiver).map(Value::Int),
        (Value::Array(items), "push") => {
            let items = items.clone();
            Some(Value::native("push", move |_interp, args, _span| {
                let mut items = items.borrow_mut();
                items.extend(args);
                Ok(Value::Int(items.len() as i64))
            }))
        }
        (Value::Set(items), "add") => {
            let items = items.clone();
            Some(Value::native("add", move |_interp, args, span| {
                let [value] = one_arg(args, span)?;
                let mut items = items.borrow_mut();
                if !items.iter().any(|existing| existing.equals(&value)) {
                    items.push(value);
                }
                Ok(Value::Nil)
            }))
        }
        (Value::Set(items), "has") => {
            let items = items.clone();
            Some(Value::native("has", move |_interp, args, span| {
                let [value] = one_arg(args, span)?;
                let found = items.borrow().iter().any(|existing| existing.equals(&value));
                Ok(Value::Bool(found))
            }))
        }
        (Value::Map(map), "get") => {
            let map = map.clone();
            Some(Value::native("get", move |_interp, args, span| {
                let [key] = one_arg(args, span)?;
                Ok(map.borrow().get(&key).unwrap_or(Value::Nil))
            }))
        }
        (Value::Map(map), "has") => {
            let map = map.clone();
            Some(Value::native("has", move |_interp, args, span| {
                let [key] = one_arg(args, span)?;
                Ok(Value::Bool(map.borrow().contains_key(&key)))
            }))
        }
        (Value::Map(map), "set") => {
            let map: Rc<RefCell<OrderedMap>> = map.clone();
            Some(Value::native("set", move |_interp, args, span| {
                let [key, value] = <[Value; 2]>::try_from(args).map_err(|args| {
                    RuntimeError::ArityMismatch {
                        expected: 2,
                        found: args.len(),
                        span,
                    }
                })?;
                map.borrow_mut().insert(key, value);
                Ok(Value::Nil)
            }))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_global_exposes_protocol_keys() {
        let env = Env::new();
        install(&env);
        let Some(Value::Object(symbol)) = env.get("Symbol") else {
            panic!("Symbol is not an object");
        };
        let seq = symbol.borrow().get_name("sequenceLiteral");
        assert!(matches!(seq, Some(Value::Symbol(WellKnownSymbol::SequenceLiteral))));
        let map = symbol.borrow().get_name("mappingLiteral");
        assert!(matches!(map, Some(Value::Symbol(WellKnownSymbol::MappingLiteral))));
    }

    #[test]
    fn test_member_lengths() {
        let array = Value::array(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(member(&array, "length").and_then(|v| v.as_int()), Some(2));
        assert_eq!(member(&Value::str("héllo"), "length").and_then(|v| v.as_int()), Some(5));
        assert!(member(&array, "size").is_none());
        assert!(member(&Value::Int(3), "length").is_none());
    }
}
