//! Análisis semántico y transformaciones sobre la cinta.
//!
//! Las fases se ejecutan en un orden fijo sobre una misma [`Tape`] y un
//! mismo [`Context`]. Cada una es un recorrido ([`Pass`]) que visita
//! símbolos por índice y puede mutar la cinta en el proceso:
//!
//! 1. [`quotes`]: extracción de quotes a funciones anónimas.
//! 2. [`discover`]: registro de funciones, etiquetas y externos.
//! 3. [`verify`]: resolución de identificadores.
//! 4. [`refgraph`]: grafo de referencias entre funciones.
//! 5. [`ranges`]: rangos de cada función en la cinta.
//! 6. [`dead`]: eliminación de funciones inalcanzables.
//! 7. [`reorder`]: orden de emisión, dependencias primero.

use std::{
    collections::{BTreeMap, BTreeSet},
    ops::Range,
    rc::Rc,
};

use log::{debug, trace};
use thiserror::Error;

use crate::{
    config::Config,
    error::{InternalError, Report},
    ir::{Kind, Symbol, Tape},
    source::Located,
};

pub mod dead;
pub mod discover;
pub mod quotes;
pub mod ranges;
pub mod refgraph;
pub mod reorder;
pub mod verify;

pub type Semantic<T> = Result<T, Report>;

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SemanticError {
    #[error("Symbol `{0}` is already defined")]
    Clash(Rc<str>),

    #[error("Undefined symbol `{0}`")]
    Undefined(Rc<str>),
}

/// Significado de un nombre.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Definition {
    Function,
    Binding,
    Label { owner: Rc<str> },
    External,
}

/// Tabla de símbolos. No hay scoping: todo nombre es global excepto
/// los de `let`, que existen solo mientras se visita su bloque.
#[derive(Debug, Default)]
pub struct Symbols(BTreeMap<Rc<str>, Definition>);

impl Symbols {
    pub fn get(&self, name: &str) -> Option<&Definition> {
        self.0.get(name)
    }

    /// Registra el nombre de un símbolo, fallando si ya existía.
    pub fn define(&mut self, symbol: &Symbol, definition: Definition) -> Semantic<()> {
        if self.0.contains_key(symbol.text().as_ref()) {
            let error = SemanticError::Clash(Rc::clone(symbol.text()));
            return Err(Report::new(error, symbol.location().clone()));
        }

        self.0.insert(Rc::clone(symbol.text()), definition);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Option<Definition> {
        self.0.remove(name)
    }

    /// Elimina una función junto con todas sus etiquetas.
    pub fn remove_function(&mut self, name: &str) {
        self.0.remove(name);
        self.0.retain(|_, definition| match definition {
            Definition::Label { owner } => owner.as_ref() != name,
            _ => true,
        });
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Rc<str>, &Definition)> {
        self.0.iter()
    }
}

/// Grafo de referencias: función a funciones que referencia.
pub type Refs = BTreeMap<Rc<str>, BTreeSet<Rc<str>>>;

/// Rangos `[inicio, fin)` de cada función en la cinta.
#[derive(Debug, Default)]
pub struct Ranges(BTreeMap<Rc<str>, Range<usize>>);

impl Ranges {
    pub fn get(&self, name: &str) -> Option<Range<usize>> {
        self.0.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn insert(&mut self, name: Rc<str>, range: Range<usize>) {
        self.0.insert(name, range);
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Rc<str>, &Range<usize>)> {
        self.0.iter()
    }

    /// Quita el rango de una función y desplaza todos los rangos
    /// posteriores, como si el rango ya se hubiera eliminado de la cinta.
    pub fn excise(&mut self, name: &str) -> Option<Range<usize>> {
        let removed = self.0.remove(name)?;
        let length = removed.len();

        for range in self.0.values_mut() {
            if range.start >= removed.end {
                *range = range.start - length..range.end - length;
            }
        }

        Some(removed)
    }
}

/// Generador de nombres para funciones anónimas.
#[derive(Debug, Default)]
struct Intern(usize);

impl Intern {
    fn fresh(&mut self) -> Rc<str> {
        let name = format!("___fn_{}", self.0);
        self.0 += 1;

        name.into()
    }
}

/// Estado compartido por todas las fases de una compilación.
#[derive(Debug, Default)]
pub struct Context {
    pub symbols: Symbols,
    pub refs: Refs,
    pub ranges: Ranges,
    intern: Intern,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Genera un nombre único de función anónima.
    pub fn fresh_name(&mut self) -> Rc<str> {
        self.intern.fresh()
    }

    /// Encuentra la función a la que pertenece un nombre: la función
    /// misma, o la dueña de una etiqueta.
    pub fn function_of(&self, name: &str) -> Option<Rc<str>> {
        match self.symbols.0.get_key_value(name)? {
            (name, Definition::Function) => Some(Rc::clone(name)),
            (_, Definition::Label { owner }) => Some(Rc::clone(owner)),
            _ => None,
        }
    }
}

/// Un recorrido sobre la cinta.
///
/// Las implementaciones deciden qué hacer con cada símbolo en
/// [`Pass::visit()`] y delegan el recorrido de bloques a
/// [`Pass::block()`]. Ambos retornan la posición del siguiente
/// símbolo por visitar, lo cual permite que una fase inserte o
/// mueva símbolos sin invalidar el recorrido.
pub trait Pass {
    fn visit(&mut self, tape: &mut Tape, at: usize) -> Semantic<usize>;

    /// Visita el interior del bloque que abre en `at`. Retorna la
    /// posición inmediatamente posterior a su `End`.
    fn block(&mut self, tape: &mut Tape, at: usize) -> Semantic<usize> {
        let mut next = at + 1;
        loop {
            match tape.get(next) {
                Some(symbol) if symbol.kind() == Kind::End => break Ok(next + 1),

                Some(symbol) => {
                    trace!("{:>6} {}", next, symbol);
                    next = self.visit(tape, next)?;
                }

                None => break Err(unbalanced(tape, at)),
            }
        }
    }
}

/// Ejecuta una fase desde el inicio de la cinta.
pub fn run<P: Pass>(pass: &mut P, tape: &mut Tape) -> Semantic<()> {
    if !tape.is_empty() {
        pass.visit(tape, 0)?;
    }

    Ok(())
}

/// Ejecuta todas las fases, en orden.
pub fn analyze(cx: &mut Context, tape: &mut Tape, config: &Config) -> Semantic<()> {
    debug!("lowering quotes");
    quotes::lower(cx, tape)?;
    tape.check_balance()?;

    debug!("discovering definitions");
    discover::discover(cx, tape)?;

    debug!("verifying references");
    verify::verify(cx, tape)?;

    debug!("building reference graph");
    refgraph::build(cx, tape)?;

    debug!("measuring function ranges");
    ranges::measure(cx, tape)?;

    debug!("eliminating dead functions");
    dead::eliminate(cx, tape, config)?;
    tape.check_balance()?;

    debug!("reordering functions");
    reorder::reorder(cx, tape)?;
    tape.check_balance()?;

    Ok(())
}

fn unbalanced(tape: &Tape, at: usize) -> Report {
    let symbol = &tape[at];
    Located::at(
        InternalError::Unbalanced(symbol.kind()),
        symbol.location().clone(),
    )
    .into()
}

/// Error para un símbolo que una fase no debería encontrar.
fn unreachable(symbol: &Symbol) -> Report {
    Report::new(
        InternalError::Unreachable(symbol.kind()),
        symbol.location().clone(),
    )
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{parse::parse, source::Source};

    pub fn tape_of(text: &str) -> Tape {
        parse(&Source::new("test", text)).unwrap()
    }

    pub fn shape(tape: &Tape) -> Vec<(Kind, String)> {
        tape.iter()
            .map(|symbol| (symbol.kind(), symbol.text().to_string()))
            .collect()
    }

    pub fn names(tape: &Tape) -> Vec<String> {
        tape.functions().map(|(name, _)| name.to_string()).collect()
    }

    #[test]
    fn ranges_heal_after_excision() {
        let mut ranges = Ranges::default();
        ranges.insert("a".into(), 1..4);
        ranges.insert("b".into(), 4..6);
        ranges.insert("c".into(), 6..10);

        assert_eq!(ranges.excise("b"), Some(4..6));
        assert_eq!(ranges.get("a"), Some(1..4));
        assert_eq!(ranges.get("c"), Some(4..8));
        assert_eq!(ranges.excise("b"), None);
    }

    #[test]
    fn fresh_names_are_unique() {
        let mut cx = Context::new();
        assert_eq!(cx.fresh_name().as_ref(), "___fn_0");
        assert_eq!(cx.fresh_name().as_ref(), "___fn_1");
    }

    #[test]
    fn removing_a_function_drops_its_labels() {
        let mut cx = Context::new();
        let tape = tape_of("$def here :: f $def there :: g");

        discover::discover(&mut cx, &mut tape.clone()).unwrap();
        assert_eq!(cx.function_of("here").as_deref(), Some("f"));

        cx.symbols.remove_function("f");
        assert!(cx.symbols.get("f").is_none());
        assert!(cx.symbols.get("here").is_none());
        assert_eq!(cx.function_of("there").as_deref(), Some("g"));
    }

    #[test]
    fn full_analysis_keeps_balance() {
        let mut cx = Context::new();
        let mut tape = tape_of("{ { 1 } . } :: helper helper . :: main");

        analyze(&mut cx, &mut tape, &Config::default()).unwrap();
        assert!(tape.check_balance().is_ok());
        assert_eq!(names(&tape), ["___fn_1", "___fn_0", "helper", "main"]);
    }
}
