use std::rc::Rc;

use proptest::prelude::*;

use hashlit::compiler::ast::WellKnownSymbol;
use hashlit::{Interpreter, LiteralProtocol, Producer, RuntimeError, Value, compile_source, desugar_source};

fn run(interp: &mut Interpreter, source: &str) -> Vec<String> {
    let program = compile_source(source).unwrap();
    interp.run(&program).unwrap();
    interp.take_output()
}

fn int_list(values: &[i64]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Pulls at most `limit` elements.
struct Take {
    limit: usize,
}

impl LiteralProtocol for Take {
    fn name(&self) -> &str {
        "Take"
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

proptest! {
    #[test]
    fn sequence_preserves_source_order(values in prop::collection::vec(-1000i64..1000, 0..12)) {
        let mut interp = Interpreter::new().capture_output();
        let list = int_list(&values);
        let output = run(&mut interp, &format!("print(Array#[{}]);", list));
        prop_assert_eq!(output, vec![format!("[{}]", list)]);
    }

    #[test]
    fn mapping_preserves_entry_order(keys in prop::collection::btree_set(0i64..100, 0..10)) {
        let keys: Vec<i64> = keys.into_iter().rev().collect();
        let entries = keys
            .iter()
            .map(|k| format!("{}: {}", k, k * 2))
            .collect::<Vec<_>>()
            .join(", ");
        let mut interp = Interpreter::new().capture_output();
        let output = run(
            &mut interp,
            &format!("for pair in Map#{{{}}} {{ print(pair[0]); }}", entries),
        );
        let expected: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        prop_assert_eq!(output, expected);
    }

    #[test]
    fn only_pulled_elements_are_evaluated(n in 0usize..10, limit in 0usize..12) {
        let mut interp = Interpreter::new().capture_output();
        interp.register_constructor(Rc::new(Take { limit }));
        let elements = (0..n).map(|i| format!("tick({})", i)).collect::<Vec<_>>().join(", ");
        let source = format!(
            "let seen = 0;\nfun tick(v) {{ seen = seen + 1; return v; }}\nlet xs = Take#[{}];\nprint(seen);",
            elements
        );
        let output = run(&mut interp, &source);
        prop_assert_eq!(output, vec![n.min(limit).to_string()]);
    }

    #[test]
    fn hash_comments_do_not_change_behavior(comment in "[a-z \\[\\]{}#]{0,24}") {
        let plain = "let xs = Array#[1, 2];\nprint(xs);\n";
        let commented = format!(
            "let xs = Array#[1, 2]; #{}\n#{}\nprint(xs); # {}\n",
            comment, comment, comment
        );
        let mut interp = Interpreter::new().capture_output();
        let expected = run(&mut interp, plain);
        let actual = run(&mut interp, &commented);
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn desugared_output_is_stable(values in prop::collection::vec(0i64..50, 0..5), nested in any::<bool>()) {
        let list = int_list(&values);
        let source = if nested {
            format!("let x = Map#{{\"k\": Array#[{}]}};", list)
        } else {
            format!("let x = Set#[{}];", list)
        };
        let once = desugar_source(&source).unwrap();
        let twice = desugar_source(&once).unwrap();
        prop_assert!(!once.contains('#'));
        prop_assert_eq!(once, twice);
    }
}
