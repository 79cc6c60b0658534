//! Extracción de quotes.
//!
//! Cada `{ ... }` se convierte en una función de nivel superior con un
//! nombre generado, y en su lugar original queda una referencia
//! (`Addr`) a esa función. Las quotes anidadas se extraen primero.

use std::rc::Rc;

use super::{Context, Pass, Semantic};
use crate::ir::{Kind, Tape};

struct Quotes<'a> {
    cx: &'a mut Context,
}

/// Elimina todas las quotes de la cinta.
pub fn lower(cx: &mut Context, tape: &mut Tape) -> Semantic<()> {
    super::run(&mut Quotes { cx }, tape)
}

impl Pass for Quotes<'_> {
    fn visit(&mut self, tape: &mut Tape, at: usize) -> Semantic<usize> {
        match tape[at].kind() {
            Kind::Quote => {
                let name = self.cx.fresh_name();

                // La quote se vuelve referencia y una copia pasa a ser
                // la cabeza de la nueva función
                tape[at].rename(Kind::Addr, Rc::clone(&name));
                let head = tape[at].clone();
                tape.insert(at + 1, head);

                let until = self.block(tape, at + 1)?;
                let moved = tape.rotate_to_tail(at + 1..until);

                tape[moved.start].retag(Kind::Fn);
                tape[moved.end - 1].rename(Kind::End, name);

                Ok(at + 1)
            }

            kind if kind.is_opener() => self.block(tape, at),
            _ => Ok(at + 1),
        }
    }
}
