//! Grafo de referencias entre funciones.

use std::rc::Rc;

use super::{Context, Pass, Semantic};
use crate::ir::{Kind, Tape};

struct RefGraph<'a> {
    cx: &'a mut Context,
    current: Option<Rc<str>>,
}

/// Construye `refs`. Toda función obtiene una entrada, posiblemente vacía.
pub fn build(cx: &mut Context, tape: &mut Tape) -> Semantic<()> {
    super::run(&mut RefGraph { cx, current: None }, tape)
}

impl Pass for RefGraph<'_> {
    fn visit(&mut self, tape: &mut Tape, at: usize) -> Semantic<usize> {
        let symbol = &tape[at];
        match symbol.kind() {
            Kind::Fn => {
                let name = Rc::clone(symbol.text());
                self.cx.refs.entry(Rc::clone(&name)).or_default();

                let outer = self.current.replace(name);
                let next = self.block(tape, at);
                self.current = outer;

                next
            }

            // Las referencias a etiquetas se atribuyen a su función
            Kind::Addr => {
                if let Some(target) = self.cx.function_of(symbol.text()) {
                    let current = match &self.current {
                        Some(current) => Rc::clone(current),
                        None => return Err(super::unreachable(symbol)),
                    };

                    self.cx.refs.entry(current).or_default().insert(target);
                }

                Ok(at + 1)
            }

            kind if kind.is_opener() => self.block(tape, at),
            _ => Ok(at + 1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::{discover::discover, quotes::lower, tests::tape_of, verify::verify};

    fn graph(text: &str) -> Vec<(String, Vec<String>)> {
        let mut cx = Context::new();
        let mut tape = tape_of(text);

        lower(&mut cx, &mut tape).unwrap();
        discover(&mut cx, &mut tape).unwrap();
        verify(&mut cx, &mut tape).unwrap();
        build(&mut cx, &mut tape).unwrap();

        cx.refs
            .iter()
            .map(|(from, to)| {
                let to = to.iter().map(ToString::to_string).collect();
                (from.to_string(), to)
            })
            .collect()
    }

    fn edges(list: &[(&str, &[&str])]) -> Vec<(String, Vec<String>)> {
        list.iter()
            .map(|&(from, to)| {
                let to = to.iter().map(ToString::to_string).collect();
                (from.to_string(), to)
            })
            .collect()
    }

    #[test]
    fn every_function_has_an_entry() {
        assert_eq!(
            graph("1 :: a c :: b :: c"),
            edges(&[("a", &[]), ("b", &["c"]), ("c", &[])])
        );
    }

    #[test]
    fn self_references_are_edges() {
        assert_eq!(
            graph("b c :: b :: c"),
            edges(&[("b", &["b", "c"]), ("c", &[])])
        );
    }

    #[test]
    fn labels_are_attributed_to_their_owner() {
        assert_eq!(
            graph("$def top :: a top top :: b"),
            edges(&[("a", &[]), ("b", &["a"])])
        );
    }

    #[test]
    fn quotes_are_referenced_by_their_enclosing_function() {
        assert_eq!(
            graph("[ let x { 1 } x ] :: main"),
            edges(&[("___fn_0", &[]), ("main", &["___fn_0"])])
        );
    }

    #[test]
    fn externals_are_not_edges() {
        assert_eq!(
            graph("$decl puts puts $addr puts :: main"),
            edges(&[("main", &[])])
        );
    }
}
