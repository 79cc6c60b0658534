//! Rangos de funciones en la cinta.

use std::rc::Rc;

use super::{Context, Pass, Semantic};
use crate::ir::{Kind, Tape};

struct Ranging<'a> {
    cx: &'a mut Context,
}

/// Recalcula `ranges` desde cero.
pub fn measure(cx: &mut Context, tape: &mut Tape) -> Semantic<()> {
    cx.ranges.clear();
    super::run(&mut Ranging { cx }, tape)
}

impl Pass for Ranging<'_> {
    fn visit(&mut self, tape: &mut Tape, at: usize) -> Semantic<usize> {
        match tape[at].kind() {
            Kind::Fn => {
                let end = self.block(tape, at)?;
                self.cx.ranges.insert(Rc::clone(tape[at].text()), at..end);

                Ok(end)
            }

            kind if kind.is_opener() => self.block(tape, at),
            _ => Ok(at + 1),
        }
    }
}
