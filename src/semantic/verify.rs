//! Resolución de identificadores.
//!
//! Cada identificador se reclasifica según lo que nombra. Los nombres
//! de `let` solo son visibles dentro de su bloque.

use super::{Context, Definition, Pass, Semantic, SemanticError};
use crate::{
    error::Report,
    ir::{Kind, Symbol, Tape},
};

struct Verify<'a> {
    cx: &'a mut Context,
}

/// Resuelve todos los identificadores de la cinta.
pub fn verify(cx: &mut Context, tape: &mut Tape) -> Semantic<()> {
    super::run(&mut Verify { cx }, tape)
}

impl Pass for Verify<'_> {
    fn visit(&mut self, tape: &mut Tape, at: usize) -> Semantic<usize> {
        match tape[at].kind() {
            Kind::Let => {
                self.cx.symbols.define(&tape[at], Definition::Binding)?;
                let next = self.block(tape, at)?;
                self.cx.symbols.remove(tape[at].text());

                Ok(next)
            }

            Kind::Ident => {
                let symbol = &mut tape[at];
                let kind = match self.cx.symbols.get(symbol.text()) {
                    Some(Definition::Function) | Some(Definition::Label { .. }) => Kind::Addr,
                    Some(Definition::Binding) => Kind::Bind,
                    Some(Definition::External) => Kind::Call,
                    None => return Err(undefined(symbol)),
                };

                symbol.retag(kind);
                Ok(at + 1)
            }

            Kind::Addr => match self.cx.symbols.get(tape[at].text()) {
                Some(Definition::Binding) | None => Err(undefined(&tape[at])),
                Some(_) => Ok(at + 1),
            },

            kind if kind.is_opener() => self.block(tape, at),
            _ => Ok(at + 1),
        }
    }
}

fn undefined(symbol: &Symbol) -> Report {
    let error = SemanticError::Undefined(symbol.text().clone());
    Report::new(error, symbol.location().clone())
}
