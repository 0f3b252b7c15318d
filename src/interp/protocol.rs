//! The literal construction protocol.
//!
//! A desugared literal calls `Ctor[Symbol.sequenceLiteral](producer)` or
//! `Ctor[Symbol.mappingLiteral](producer)`. Native constructors implement
//! [`LiteralProtocol`]; user objects expose the same methods as ordinary
//! symbol-keyed properties. Either way the constructor receives a
//! [`Producer`] and pulls elements from it on demand.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::trace;

use crate::compiler::ast::WellKnownSymbol;
use crate::compiler::lexer::Span;
use crate::interp::value::{Key, Object, OrderedMap, Value};
use crate::interp::{Interpreter, RuntimeError};

/// A constructor that can be the target of a collection literal.
pub trait LiteralProtocol {
    /// Global name the constructor is bound to.
    fn name(&self) -> &str;

    /// Whether `Ctor[symbol]` resolves to a method.
    fn supports(&self, protocol: WellKnownSymbol) -> bool;

    fn sequence_literal(
        &self,
        _interp: &mut Interpreter,
        items: &mut Producer,
    ) -> Result<Value, RuntimeError> {
        Err(RuntimeError::MissingProtocolMethod {
            symbol: WellKnownSymbol::SequenceLiteral,
            receiver: format!("constructor {}", self.name()),
            span: items.span(),
        })
    }

    fn mapping_literal(
        &self,
        _interp: &mut Interpreter,
        entries: &mut Producer,
    ) -> Result<Value, RuntimeError> {
        Err(RuntimeError::MissingProtocolMethod {
            symbol: WellKnownSymbol::MappingLiteral,
            receiver: format!("constructor {}", self.name()),
            span: entries.span(),
        })
    }
}

/// Resolve `ctor[symbol]` to a callable taking the producer.
///
/// Returns `None` when the constructor does not support the form.
pub fn protocol_method(ctor: &Rc<dyn LiteralProtocol>, symbol: WellKnownSymbol) -> Option<Value> {
    if !ctor.supports(symbol) {
        return None;
    }
    let ctor = ctor.clone();
    let name = format!("{}[{}]", ctor.name(), symbol);
    Some(Value::native(name, move |interp, args, span| {
        let [source] = <[Value; 1]>::try_from(args).map_err(|args| {
            RuntimeError::ArityMismatch {
                expected: 1,
                found: args.len(),
                span,
            }
        })?;
        let mut producer = Producer::new(source, span);
        match symbol {
            WellKnownSymbol::SequenceLiteral => ctor.sequence_literal(interp, &mut producer),
            WellKnownSymbol::MappingLiteral => ctor.mapping_literal(interp, &mut producer),
        }
    }))
}

/// A pull-based source of values.
///
/// Wraps any object with a `next()` method returning `{done, value}`
/// records. Once `done` is seen the producer stays finished and `next()`
/// is never called again.
pub struct Producer {
    source: Value,
    finished: bool,
    pulled: usize,
    span: Span,
}

impl Producer {
    pub fn new(source: Value, span: Span) -> Self {
        Self {
            source,
            finished: false,
            pulled: 0,
            span,
        }
    }

    pub fn span(&self) -> Span {
        self.span
    }

    /// Number of values pulled so far.
    pub fn pulled(&self) -> usize {
        self.pulled
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Pull the next value, evaluating it now.
    pub fn pull(&mut self, interp: &mut Interpreter) -> Result<Option<Value>, RuntimeError> {
        if self.finished {
            return Ok(None);
        }
        let step = interp.invoke_method(&self.source, &Value::str("next"), Vec::new(), self.span)?;
        let Value::Object(record) = &step else {
            self.finished = true;
            return Err(RuntimeError::MalformedProducer {
                message: format!("next() returned {}, expected {{done, value}}", step.type_name()),
                span: self.span,
            });
        };
        let record = record.borrow();
        if record.get_name("done").is_some_and(|done| done.is_truthy()) {
            trace!(pulled = self.pulled, "producer finished");
            self.finished = true;
            return Ok(None);
        }
        self.pulled += 1;
        Ok(Some(record.get_name("value").unwrap_or(Value::Nil)))
    }

    /// Iterate the remaining values. Stops after the first error.
    pub fn iter<'a>(&'a mut self, interp: &'a mut Interpreter) -> ProducerIter<'a> {
        ProducerIter {
            producer: self,
            interp,
        }
    }
}

pub struct ProducerIter<'a> {
    producer: &'a mut Producer,
    interp: &'a mut Interpreter,
}

impl Iterator for ProducerIter<'_> {
    type Item = Result<Value, RuntimeError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.producer.pull(self.interp) {
            Ok(value) => value.map(Ok),
            Err(err) => {
                self.producer.finished = true;
                Some(Err(err))
            }
        }
    }
}

/// Read one mapping entry: exactly a key then a value.
///
/// The entry producer is never asked for a third item.
pub fn pull_entry(
    interp: &mut Interpreter,
    entry: Value,
    span: Span,
) -> Result<(Value, Value), RuntimeError> {
    let mut pair = Producer::new(entry, span);
    let key = pair.pull(interp)?.ok_or_else(|| RuntimeError::MalformedProducer {
        message: "mapping entry produced no key".to_string(),
        span,
    })?;
    let value = pair.pull(interp)?.ok_or_else(|| RuntimeError::MalformedProducer {
        message: "mapping entry produced no value".to_string(),
        span,
    })?;
    Ok((key, value))
}

/// `Array#[...]`
pub struct ArrayConstructor;

impl LiteralProtocol for ArrayConstructor {
    fn name(&self) -> &str {
        "Array"
    }

    fn supports(&self, protocol: WellKnownSymbol) -> bool {
        protocol == WellKnownSymbol::SequenceLiteral
    }

    fn sequence_literal(
        &self,
        interp: &mut Interpreter,
        items: &mut Producer,
    ) -> Result<Value, RuntimeError> {
        let items = items.iter(interp).collect::<Result<Vec<_>, _>>()?;
        Ok(Value::array(items))
    }
}

/// `Set#[...]`: duplicates after the first occurrence are dropped.
pub struct SetConstructor;

impl LiteralProtocol for SetConstructor {
    fn name(&self) -> &str {
        "Set"
    }

    fn supports(&self, protocol: WellKnownSymbol) -> bool {
        protocol == WellKnownSymbol::SequenceLiteral
    }

    fn sequence_literal(
        &self,
        interp: &mut Interpreter,
        items: &mut Producer,
    ) -> Result<Value, RuntimeError> {
        let mut set: Vec<Value> = Vec::new();
        for item in items.iter(interp) {
            let item = item?;
            if !set.iter().any(|existing| existing.equals(&item)) {
                set.push(item);
            }
        }
        Ok(Value::Set(Rc::new(RefCell::new(set))))
    }
}

/// `Map#{k: v, ...}`
pub struct MapConstructor;

impl LiteralProtocol for MapConstructor {
    fn name(&self) -> &str {
        "Map"
    }

    fn supports(&self, protocol: WellKnownSymbol) -> bool {
        protocol == WellKnownSymbol::MappingLiteral
    }

    fn mapping_literal(
        &self,
        interp: &mut Interpreter,
        entries: &mut Producer,
    ) -> Result<Value, RuntimeError> {
        let span = entries.span();
        let mut map = OrderedMap::new();
        while let Some(entry) = entries.pull(interp)? {
            let (key, value) = pull_entry(interp, entry, span)?;
            map.insert(key, value);
        }
        Ok(Value::Map(Rc::new(RefCell::new(map))))
    }
}

/// `Object#{name: v, ...}`: keys must be strings or symbols.
pub struct ObjectConstructor;

impl LiteralProtocol for ObjectConstructor {
    fn name(&self) -> &str {
        "Object"
    }

    fn supports(&self, protocol: WellKnownSymbol) -> bool {
        protocol == WellKnownSymbol::MappingLiteral
    }

    fn mapping_literal(
        &self,
        interp: &mut Interpreter,
        entries: &mut Producer,
    ) -> Result<Value, RuntimeError> {
        let span = entries.span();
        let mut object = Object::new();
        while let Some(entry) = entries.pull(interp)? {
            let (key, value) = pull_entry(interp, entry, span)?;
            let key = Key::from_value(&key).ok_or_else(|| RuntimeError::TypeMismatch {
                message: format!("object keys must be strings or symbols, got {}", key.type_name()),
                span,
            })?;
            object.set(key, value);
        }
        Ok(Value::object(object))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use crate::compiler::compile_source;

    /// Pulls at most `limit` items and reports how many it took.
    struct Prefix {
        limit: usize,
    }

    impl LiteralProtocol for Prefix {
        fn name(&self) -> &str {
            "Prefix"
        }

        fn supports(&self, protocol: WellKnownSymbol) -> bool {
            protocol == WellKnownSymbol::SequenceLiteral
        }

        fn sequence_literal(
            &self,
            interp: &mut Interpreter,
            items: &mut Producer,
        ) -> Result<Value, RuntimeError> {
            let mut taken = Vec::new();
            while taken.len() < self.limit {
                match items.pull(interp)? {
                    Some(item) => taken.push(item),
                    None => break,
                }
            }
            Ok(Value::array(taken))
        }
    }

    /// Drains every producer and counts how often each method runs.
    #[derive(Default)]
    struct Counting {
        sequence_calls: Rc<Cell<usize>>,
        mapping_calls: Rc<Cell<usize>>,
    }

    impl LiteralProtocol for Counting {
        fn name(&self) -> &str {
            "Count"
        }

        fn supports(&self, _protocol: WellKnownSymbol) -> bool {
            true
        }

        fn sequence_literal(
            &self,
            interp: &mut Interpreter,
            items: &mut Producer,
        ) -> Result<Value, RuntimeError> {
            self.sequence_calls.set(self.sequence_calls.get() + 1);
            let items = items.iter(interp).collect::<Result<Vec<_>, _>>()?;
            Ok(Value::array(items))
        }

        fn mapping_literal(
            &self,
            interp: &mut Interpreter,
            entries: &mut Producer,
        ) -> Result<Value, RuntimeError> {
            self.mapping_calls.set(self.mapping_calls.get() + 1);
            let span = entries.span();
            let mut pairs = Vec::new();
            while let Some(entry) = entries.pull(interp)? {
                let (key, value) = pull_entry(interp, entry, span)?;
                pairs.push(Value::array(vec![key, value]));
            }
            Ok(Value::array(pairs))
        }
    }

    fn run(interp: &mut Interpreter, source: &str) -> Result<Vec<String>, RuntimeError> {
        let program = compile_source(source).expect("compile");
        interp.run(&program)?;
        Ok(interp.take_output())
    }

    #[test]
    fn test_unpulled_elements_are_never_evaluated() {
        let mut interp = Interpreter::new().capture_output();
        interp.register_constructor(Rc::new(Prefix { limit: 2 }));
        let output = run(
            &mut interp,
            r#"
            let seen = 0;
            fun tick(v) { seen = seen + 1; return v; }
            let xs = Prefix#[tick(1), tick(2), tick(3), tick(4)];
            print(xs, seen);
            "#,
        )
        .unwrap();
        assert_eq!(output, vec!["[1, 2] 2"]);
    }

    #[test]
    fn test_protocol_method_runs_once_per_literal() {
        let counting = Counting::default();
        let sequence_calls = counting.sequence_calls.clone();
        let mapping_calls = counting.mapping_calls.clone();
        let mut interp = Interpreter::new().capture_output();
        interp.register_constructor(Rc::new(counting));

        let output = run(
            &mut interp,
            r#"
            let xs = Count#[1, Count#[2, 3], 4];
            let m = Count#{"a": Count#[5], "b": Count#{6: 7}};
            print(xs, m);
            "#,
        )
        .unwrap();
        assert_eq!(output, vec![r#"[1, [2, 3], 4] [["a", [5]], ["b", [[6, 7]]]]"#]);
        assert_eq!(sequence_calls.get(), 3);
        assert_eq!(mapping_calls.get(), 2);
    }

    #[test]
    fn test_literal_in_loop_dispatches_per_evaluation() {
        let counting = Counting::default();
        let sequence_calls = counting.sequence_calls.clone();
        let mut interp = Interpreter::new().capture_output();
        interp.register_constructor(Rc::new(counting));

        run(&mut interp, "let i = 0; while i < 4 { Count#[i]; i = i + 1; }").unwrap();
        assert_eq!(sequence_calls.get(), 4);
    }

    #[test]
    fn test_elements_evaluated_in_source_order() {
        let mut interp = Interpreter::new().capture_output();
        let output = run(
            &mut interp,
            r#"
            let log = [];
            fun note(v) { log.push(v); return v; }
            let xs = Array#[note("a"), note("b"), note("c")];
            print(log);
            print(xs);
            "#,
        )
        .unwrap();
        assert_eq!(output, vec![r#"["a", "b", "c"]"#, r#"["a", "b", "c"]"#]);
    }

    #[test]
    fn test_map_literal_builds_in_order() {
        let mut interp = Interpreter::new().capture_output();
        let output = run(
            &mut interp,
            r#"let m = Map#{1: "one", 2: "two"}; print(m); print(m.get(2), m.size);"#,
        )
        .unwrap();
        assert_eq!(output, vec![r#"Map {1 => "one", 2 => "two"}"#, "two 2"]);
    }

    #[test]
    fn test_set_drops_duplicates() {
        let mut interp = Interpreter::new().capture_output();
        let output = run(&mut interp, "print(Set#[1, 2, 1, 3, 2]);").unwrap();
        assert_eq!(output, vec!["Set {1, 2, 3}"]);
    }

    #[test]
    fn test_wrong_form_is_missing_protocol_method() {
        let mut interp = Interpreter::new().capture_output();
        let err = run(&mut interp, "let xs = Array#{1: 2};").unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::MissingProtocolMethod {
                symbol: WellKnownSymbol::MappingLiteral,
                ..
            }
        ));
        assert_eq!(
            err.to_string(),
            "constructor Array has no Symbol.mappingLiteral method"
        );
    }

    #[test]
    fn test_missing_protocol_evaluates_no_elements() {
        let mut interp = Interpreter::new().capture_output();
        let err = run(
            &mut interp,
            r#"let thing = {}; thing#[print("evaluated")];"#,
        )
        .unwrap_err();
        assert!(matches!(err, RuntimeError::MissingProtocolMethod { .. }));
        assert!(interp.take_output().is_empty());
    }

    #[test]
    fn test_object_literal_rejects_non_string_keys() {
        let mut interp = Interpreter::new().capture_output();
        let err = run(&mut interp, "Object#{1: 2};").unwrap_err();
        assert!(matches!(err, RuntimeError::TypeMismatch { .. }));
    }

    #[test]
    fn test_producer_stops_calling_next_after_done() {
        let mut interp = Interpreter::new().capture_output();
        run(
            &mut interp,
            r#"
            let calls = 0;
            let p = {next: fun() { calls = calls + 1; return {done: true, value: nil}; }};
            "#,
        )
        .unwrap();
        let source = interp.global("p").unwrap();
        let mut producer = Producer::new(source, Span::new(1, 1));

        assert!(producer.pull(&mut interp).unwrap().is_none());
        assert!(producer.pull(&mut interp).unwrap().is_none());
        assert!(producer.is_finished());
        assert_eq!(interp.global("calls").and_then(|v| v.as_int()), Some(1));
    }

    #[test]
    fn test_non_record_step_is_malformed() {
        let mut interp = Interpreter::new().capture_output();
        let err = run(
            &mut interp,
            r#"
            let bad = {next: fun() { return 5; }};
            for x in bad { print(x); }
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, RuntimeError::MalformedProducer { .. }));
    }
}
