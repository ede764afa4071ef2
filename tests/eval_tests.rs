//! Library-level evaluation and round-trip tests (§8).

use amorph::ast::{Node, Program};
use amorph::canon::{canonicalize, minify, pack, unminify, unpack};
use amorph::vm::io::{BufferedIo, Capabilities};
use amorph::vm::Vm;
use serde_json::json;

fn run_program(src: serde_json::Value) -> Result<String, amorph::runtime_error::RuntimeError> {
    let program = Program::parse(&Node::from_json(&src)).expect("program should parse");
    let mut io = BufferedIo::default();
    let mut vm = Vm::new(&mut io, Capabilities::default(), None);
    vm.run(&program)?;
    drop(vm);
    Ok(io.output)
}

#[test]
fn arithmetic_and_function_call_prints_six() {
    let src = json!([
        {"let": {"name": "x", "value": {"add": [1, 2]}}},
        {"def": {"name": "double", "params": ["n"], "body": [
            {"return": {"mul": [{"var": "n"}, 2]}}
        ]}},
        {"let": {"name": "y", "value": {"call": {"name": "double", "args": [{"var": "x"}]}}}},
        {"print": [{"var": "y"}]}
    ]);
    assert_eq!(run_program(src).unwrap(), "6\n");
}

#[test]
fn recursive_factorial_prints_one_twenty() {
    let src = json!([
        {"def": {"name": "fact", "id": "fn_fact", "params": ["n"], "body": [
            {"if": {
                "cond": {"le": [{"var": "n"}, 1]},
                "then": [{"return": 1}],
                "else": [{"return": {"mul": [{"var": "n"}, {"call": {"id": "fn_fact", "args": [{"sub": [{"var": "n"}, 1]}]}}]}}]
            }}
        ]}},
        {"print": [{"call": {"id": "fn_fact", "args": [5]}}]}
    ]);
    assert_eq!(run_program(src).unwrap(), "120\n");
}

#[test]
fn determinism_across_repeated_runs() {
    let src = json!([
        {"let": {"name": "x", "value": {"add": [1, 2]}}},
        {"print": [{"var": "x"}]},
        {"print": ["again"]}
    ]);
    let first = run_program(src.clone()).unwrap();
    let second = run_program(src).unwrap();
    assert_eq!(first, second);
}

#[test]
fn canonicalize_is_idempotent() {
    let node = Node::from_json(&json!([{"print": [1, 2]}]));
    let once = canonicalize(&node);
    let reparsed = Node::from_json(&serde_json::from_str(&once).unwrap());
    let twice = canonicalize(&reparsed);
    assert_eq!(once, twice);
}

#[test]
fn unminify_of_minify_is_identity() {
    let node = Node::from_json(&json!([{"let": {"name": "x", "value": {"add": [1, 2]}}}]));
    let round_tripped = unminify(&minify(&node));
    assert_eq!(round_tripped, node);
}

#[test]
fn unpack_of_pack_is_identity() {
    let node = Node::from_json(&json!([
        {"def": {"name": "double", "params": ["n"], "body": [{"return": {"mul": [{"var": "n"}, 2]}}]}},
        {"print": ["hi there"]}
    ]));
    let bytes = pack(&node).unwrap();
    let round_tripped = unpack(&bytes).unwrap();
    assert_eq!(round_tripped, node);
}
