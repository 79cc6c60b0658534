//! Compilador para deck, un lenguaje concatenativo basado en pila.
//!
//! # Front end
//! Cada programa deriva de un único texto fuente ([`source`]). Este
//! texto se somete primero a análisis léxico en [`lex`], de lo cual
//! se obtiene un flujo de símbolos. Los símbolos se disponen en una
//! cinta plana ([`ir::Tape`]) por medio de análisis sintáctico en
//! [`parse`]. La cinta pasa luego por una secuencia fija de fases de
//! análisis y transformación en [`semantic`], que extraen quotes,
//! resuelven nombres, eliminan funciones muertas y ordenan la emisión.
//!
//! # Back end
//! En esta sección el compilador deja de ser agnóstico al sistema
//! objetivo. La cinta final se traduce a ensamblador x86-64 para NASM
//! en [`target`]. El ensamblado y enlazado son externos.
//!
//! Alternativamente, [`dump`] produce listados de diagnóstico de la
//! misma cinta.

#[macro_use]
mod macros;

pub mod config;
pub mod dump;
pub mod error;
pub mod ir;
pub mod lex;
pub mod parse;
pub mod semantic;
pub mod source;

mod codegen;

use std::{io::Write, rc::Rc};

use config::Config;
use error::Report;
use ir::Tape;
use semantic::Context;
use source::Source;

/// Emisión de código.
///
/// Este módulo reexporta suficientes ítems internos relacionados a generación de código para
/// traducir la cinta final a x86-64.
pub mod target {
    pub use crate::codegen::{emit, x86_64::PRIMITIVES};
}

/// Ejecuta todas las fases delanteras sobre un texto fuente.
pub fn frontend(source: &Rc<Source>, config: &Config) -> Result<(Tape, Context), Report> {
    let mut tape = parse::parse(source)?;
    tape.check_balance()?;

    let mut cx = Context::new();
    semantic::analyze(&mut cx, &mut tape, config)?;

    Ok((tape, cx))
}

/// Compila un programa completo a ensamblador.
pub fn compile<W: Write>(source: &Rc<Source>, config: &Config, output: &mut W) -> Result<(), Report> {
    let (mut tape, cx) = frontend(source, config)?;
    target::emit(&cx, &mut tape, config, output)
}
