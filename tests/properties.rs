//! Property-based tests over randomly generated, well-formed programs.
//!
//! Programs are generated as trees and rendered to source text. Every
//! identifier in a rendered program names a function or an enclosing
//! `let`, so the whole pipeline is expected to succeed.

use std::collections::HashSet;

use proptest::prelude::*;

use deckc::{
    compile,
    config::Config,
    frontend,
    ir::{Kind, Tape},
    parse::parse,
    semantic::{discover::discover, quotes::lower, verify::verify, Context},
    source::Source,
};

const OPS: &[&str] = &[
    "+", "-", "*", "/", "%", "<<", ">>", "&", "|", "^", "~", "<=>", "=", "!=", "<", ">", "<=",
    ">=", ".", "#", "word", "byte", "?", ">|", "|>", "pop", "dup", "get", "set",
];

#[derive(Debug, Clone)]
enum Node {
    Int(u32),
    Op(usize),
    Ref(usize),
    Bind(usize),
    Mark(Vec<Node>),
    Quote(Vec<Node>),
    Let(Vec<Node>),
}

fn node() -> impl Strategy<Value = Node> {
    let leaf = prop_oneof![
        any::<u32>().prop_map(Node::Int),
        (0..OPS.len()).prop_map(Node::Op),
        (0usize..8).prop_map(Node::Ref),
        (0usize..4).prop_map(Node::Bind),
    ];

    leaf.prop_recursive(3, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Node::Mark),
            prop::collection::vec(inner.clone(), 0..4).prop_map(Node::Quote),
            prop::collection::vec(inner, 0..4).prop_map(Node::Let),
        ]
    })
}

/// Function bodies; the last function is named `main`.
fn program() -> impl Strategy<Value = Vec<Vec<Node>>> {
    prop::collection::vec(prop::collection::vec(node(), 0..6), 1..5)
}

fn function_name(index: usize, count: usize) -> String {
    if index + 1 == count {
        String::from("main")
    } else {
        format!("f{}", index)
    }
}

fn render(functions: &[Vec<Node>]) -> String {
    let mut text = String::new();
    for (index, body) in functions.iter().enumerate() {
        render_sequence(body, 0, functions.len(), &mut text);
        text.push_str(&format!(":: {}\n", function_name(index, functions.len())));
    }

    text
}

/// A `let` spans the rest of its enclosing block, so the binding depth
/// keeps growing for every node that follows it. Returns the depth at the
/// end of the sequence.
fn render_sequence(nodes: &[Node], mut depth: usize, count: usize, text: &mut String) -> usize {
    for node in nodes {
        match node {
            Node::Int(value) => text.push_str(&format!("{} ", value)),
            Node::Op(op) => text.push_str(&format!("{} ", OPS[*op])),
            Node::Ref(index) => text.push_str(&format!("{} ", function_name(index % count, count))),

            Node::Bind(slot) if depth == 0 => text.push_str(&format!("{} ", slot)),
            Node::Bind(slot) => text.push_str(&format!("x{} ", slot % depth)),

            Node::Mark(children) => {
                text.push_str("[ ");
                render_sequence(children, depth, count, text);
                text.push_str("] ");
            }

            // Quotes do not capture `let` names
            Node::Quote(children) => {
                text.push_str("{ ");
                render_sequence(children, 0, count, text);
                text.push_str("} ");
            }

            Node::Let(children) => {
                text.push_str(&format!("let x{} ", depth));
                depth = render_sequence(children, depth + 1, count, text);
            }
        }
    }

    depth
}

#[test]
fn sibling_lets_nest() {
    let functions = vec![vec![Node::Let(vec![Node::Let(vec![])]), Node::Let(vec![Node::Bind(2)])]];
    let text = render(&functions);

    assert_eq!(text, "let x0 let x1 let x2 x2 :: main\n");
    assert!(compile(&Source::new("generated", &text), &Config::default(), &mut Vec::new()).is_ok());
}

fn parse_text(text: &str) -> Tape {
    parse(&Source::new("generated", text)).expect("generated program failed to parse")
}

fn count(tape: &Tape, kind: Kind) -> usize {
    tape.iter().filter(|symbol| symbol.kind() == kind).count()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn parsed_tapes_are_balanced(functions in program()) {
        let tape = parse_text(&render(&functions));

        prop_assert!(tape.check_balance().is_ok());
        prop_assert_eq!(count(&tape, Kind::Fn), functions.len());
    }

    #[test]
    fn lowering_removes_every_quote(functions in program()) {
        let mut tape = parse_text(&render(&functions));
        let quotes = count(&tape, Kind::Quote);

        lower(&mut Context::new(), &mut tape).unwrap();

        prop_assert_eq!(count(&tape, Kind::Quote), 0);
        prop_assert_eq!(count(&tape, Kind::Fn), functions.len() + quotes);
        prop_assert!(tape.check_balance().is_ok());
    }

    #[test]
    fn verification_resolves_every_identifier(functions in program()) {
        let text = render(&functions);
        let mut cx = Context::new();
        let mut tape = parse_text(&text);

        lower(&mut cx, &mut tape).unwrap();
        discover(&mut cx, &mut tape).unwrap();
        let verified = verify(&mut cx, &mut tape);

        prop_assert!(verified.is_ok(), "{}\n{:?}", text, verified.err());
        prop_assert_eq!(count(&tape, Kind::Ident), 0);
        prop_assert!(tape.check_balance().is_ok());
    }

    #[test]
    fn reordering_emits_each_function_once(functions in program()) {
        let text = render(&functions);
        let (tape, cx) = frontend(&Source::new("generated", &text), &Config::default()).unwrap();

        let names: Vec<_> = tape.functions().map(|(name, _)| name.to_string()).collect();
        let unique: HashSet<_> = names.iter().collect();

        prop_assert_eq!(unique.len(), names.len());
        prop_assert_eq!(names.len(), cx.ranges.len());
        prop_assert!(names.iter().any(|name| name == "main"));
        prop_assert!(tape.check_balance().is_ok());

        for (name, range) in cx.ranges.iter() {
            prop_assert_eq!(tape[range.start].kind(), Kind::Fn);
            prop_assert_eq!(tape[range.start].text(), name);
            prop_assert_eq!(tape[range.end - 1].text(), name);
        }
    }

    #[test]
    fn generated_programs_compile(functions in program()) {
        let text = render(&functions);
        let mut output = Vec::new();
        let result = compile(&Source::new("generated", &text), &Config::default(), &mut output);

        prop_assert!(result.is_ok(), "{}\n{:?}", text, result.err());
        prop_assert!(String::from_utf8(output).unwrap().contains("\ndeck$main:\n"));
    }
}
