//! Registro de definiciones globales.

use std::rc::Rc;

use super::{Context, Definition, Pass, Semantic};
use crate::ir::{Kind, Tape};

struct Discover<'a> {
    cx: &'a mut Context,
    owner: Option<Rc<str>>,
}

/// Registra funciones, etiquetas y símbolos externos.
pub fn discover(cx: &mut Context, tape: &mut Tape) -> Semantic<()> {
    super::run(&mut Discover { cx, owner: None }, tape)
}

impl Pass for Discover<'_> {
    fn visit(&mut self, tape: &mut Tape, at: usize) -> Semantic<usize> {
        let symbol = &tape[at];
        match symbol.kind() {
            Kind::Fn => {
                self.cx.symbols.define(symbol, Definition::Function)?;

                let outer = self.owner.replace(Rc::clone(symbol.text()));
                let next = self.block(tape, at);
                self.owner = outer;

                next
            }

            Kind::Label => {
                let owner = match &self.owner {
                    Some(owner) => Rc::clone(owner),
                    None => return Err(super::unreachable(symbol)),
                };

                self.cx.symbols.define(symbol, Definition::Label { owner })?;
                Ok(at + 1)
            }

            Kind::Declare => {
                self.cx.symbols.define(symbol, Definition::External)?;
                Ok(at + 1)
            }

            kind if kind.is_opener() => self.block(tape, at),
            _ => Ok(at + 1),
        }
    }
}
