//! Orden de emisión de funciones.
//!
//! Recorrido en profundidad en post-orden: toda función se emite
//! después de las funciones que referencia. En un ciclo, el primer
//! miembro visitado queda de último.

use std::{collections::HashSet, ops::Range, rc::Rc};

use super::{ranges, Context, Semantic};
use crate::{
    error::{InternalError, Report},
    ir::{Kind, Tape},
};

struct Reorder<'a> {
    cx: &'a Context,
    tape: &'a Tape,
    seen: HashSet<Rc<str>>,
    order: Vec<Range<usize>>,
}

/// Reconstruye la cinta con las funciones reordenadas y recalcula `ranges`.
pub fn reorder(cx: &mut Context, tape: &mut Tape) -> Semantic<()> {
    let functions: Vec<_> = tape
        .functions()
        .map(|(name, range)| (Rc::clone(name), range))
        .collect();

    let (head, foot) = match (functions.first(), functions.last()) {
        (Some((_, first)), Some((_, last))) => (0..first.start, last.end..tape.len()),
        _ => return Ok(()),
    };

    let order = {
        let mut reorder = Reorder {
            cx,
            tape,
            seen: HashSet::new(),
            order: Vec::with_capacity(functions.len()),
        };

        for (name, _) in &functions {
            reorder.visit(name)?;
        }

        reorder.order
    };

    let mut reordered = Tape::new();
    reordered.extend_from(tape, head);
    for range in order {
        reordered.extend_from(tape, range);
    }
    reordered.extend_from(tape, foot);

    *tape = reordered;
    ranges::measure(cx, tape)
}

impl Reorder<'_> {
    fn visit(&mut self, name: &Rc<str>) -> Semantic<()> {
        if !self.seen.insert(Rc::clone(name)) {
            return Ok(());
        }

        let range = match self.cx.ranges.get(name) {
            Some(range) => range,
            None => {
                let location = self.tape[0].location().clone();
                let error = InternalError::NotDefined(Rc::clone(name));
                return Err(Report::new(error, location));
            }
        };

        for symbol in &self.tape[range.clone()] {
            if symbol.kind() == Kind::Addr {
                if let Some(target) = self.cx.function_of(symbol.text()) {
                    self.visit(&target)?;
                }
            }
        }

        self.order.push(range);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{Config, Options},
        semantic::{analyze, tests::names, tests::tape_of},
    };

    fn order(text: &str) -> Vec<String> {
        let mut cx = Context::new();
        let mut tape = tape_of(text);

        let config = Config::default().with_options(Options::KEEP_DEAD);
        analyze(&mut cx, &mut tape, &config).unwrap();

        for (name, range) in cx.ranges.iter() {
            assert_eq!(tape[range.start].kind(), Kind::Fn);
            assert_eq!(tape[range.start].text(), name);
        }

        names(&tape)
    }

    #[test]
    fn callees_come_first() {
        assert_eq!(order("a b :: main :: a c :: b :: c"), ["a", "c", "b", "main"]);
    }

    #[test]
    fn independent_functions_keep_their_order() {
        assert_eq!(order(":: x :: y :: z"), ["x", "y", "z"]);
    }

    #[test]
    fn cycles_emit_each_function_once() {
        assert_eq!(order("b :: a a :: b a :: main"), ["b", "a", "main"]);
        assert_eq!(order("self :: self"), ["self"]);
    }

    #[test]
    fn label_references_pull_in_their_owner() {
        assert_eq!(order("spot :: main $def spot :: owner"), ["owner", "main"]);
    }

    #[test]
    fn empty_programs() {
        assert!(order("").is_empty());
    }
}
