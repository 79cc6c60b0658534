//! Representación intermedia.
//!
//! El programa completo se representa como una "cinta" ([`Tape`]):
//! una secuencia plana de [`Symbol`]s. Las estructuras anidadas
//! (funciones, quotes, `let`, workspaces) no se representan con
//! punteros a hijos, sino posicionalmente: un símbolo de apertura
//! seguido de instrucciones y terminado por un [`Kind::End`] que
//! lleva el mismo texto que su apertura.
//!
//! Las posiciones en la cinta son índices estables. Las operaciones
//! estructurales ([`Tape::rotate_to_tail()`], [`Tape::excise()`])
//! retornan los rangos corregidos para que las fases que guardan
//! índices puedan ajustarse.

use std::{
    fmt::{self, Display},
    ops::{Index, IndexMut, Range},
    rc::Rc,
    slice,
};

use crate::{
    error::InternalError,
    source::{Located, Location},
};

/// Clase de un símbolo.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    /// Fin de la entrada. Nunca aparece en una cinta.
    Eof,

    Int,
    Str,

    /// Identificador todavía no resuelto.
    Ident,
    /// Referencia a una función o etiqueta.
    Addr,
    /// Referencia a un nombre introducido por `let`.
    Bind,
    /// Llamada directa a un símbolo externo.
    Call,
    /// `$decl`
    Declare,
    /// `$def`
    Label,

    Program,
    Fn,
    Let,
    Mark,
    Quote,

    End,

    /// `::`
    FnMark,
    /// `]`
    Unmark,
    /// `}`
    Unquote,

    Go,
    Count,
    Word,
    Byte,
    Choose,
    DeqPush,
    DeqPop,
    Pop,
    Dup,
    Get,
    Set,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Shl,
    Shr,
    And,
    Or,
    Xor,
    Not,
    Cmp,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl Kind {
    /// Determina si este símbolo abre un bloque terminado por [`Kind::End`].
    pub fn is_opener(self) -> bool {
        matches!(
            self,
            Kind::Program | Kind::Fn | Kind::Let | Kind::Mark | Kind::Quote
        )
    }

    /// Determina si este símbolo es una operación primitiva.
    pub fn is_builtin(self) -> bool {
        use Kind::*;

        matches!(
            self,
            Go | Count
                | Word
                | Byte
                | Choose
                | DeqPush
                | DeqPop
                | Pop
                | Dup
                | Get
                | Set
                | Add
                | Sub
                | Mul
                | Div
                | Mod
                | Shl
                | Shr
                | And
                | Or
                | Xor
                | Not
                | Cmp
                | Eq
                | Ne
                | Lt
                | Gt
                | Le
                | Ge
        )
    }

    /// Determina si este símbolo puede iniciar una instrucción.
    pub fn is_instruction(self) -> bool {
        use Kind::*;

        self.is_builtin()
            || matches!(
                self,
                Int | Str | Ident | Addr | Declare | Label | Let | Mark | Quote
            )
    }
}

impl Display for Kind {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Kind::*;

        let string = match self {
            Eof => "EOF",
            Int => "Integer",
            Str => "String",
            Ident => "Identifier",
            Addr => "Address",
            Bind => "Bind",
            Call => "Call",
            Declare => "Declare",
            Label => "Label",
            Program => "Program",
            Fn => "Function",
            Let => "Let",
            Mark => "Mark",
            Quote => "Quote",
            End => "End",
            FnMark => "Function Marker",
            Unmark => "Unmark",
            Unquote => "Unquote",
            Go => "Go",
            Count => "Count",
            Word => "Word",
            Byte => "Byte",
            Choose => "Choose",
            DeqPush => "Deque Push",
            DeqPop => "Deque Pop",
            Pop => "Pop",
            Dup => "Dup",
            Get => "Get",
            Set => "Set",
            Add => "Add",
            Sub => "Sub",
            Mul => "Mul",
            Div => "Div",
            Mod => "Mod",
            Shl => "Shift Left",
            Shr => "Shift Right",
            And => "And",
            Or => "Or",
            Xor => "Xor",
            Not => "Not",
            Cmp => "Compare",
            Eq => "Equal",
            Ne => "Not Equal",
            Lt => "Less",
            Gt => "Greater",
            Le => "Less Or Equal",
            Ge => "Greater Or Equal",
        };

        fmt.write_str(string)
    }
}

/// Unidad atómica de la cinta.
#[derive(Debug, Clone)]
pub struct Symbol {
    kind: Kind,
    text: Rc<str>,
    location: Location,
}

impl Symbol {
    pub fn new<T: Into<Rc<str>>>(kind: Kind, text: T, location: Location) -> Self {
        Symbol {
            kind,
            text: text.into(),
            location,
        }
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// Lexema, nombre o valor literal asociado.
    pub fn text(&self) -> &Rc<str> {
        &self.text
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Cambia la clase de este símbolo, preservando su texto.
    pub fn retag(&mut self, kind: Kind) {
        self.kind = kind;
    }

    /// Cambia clase y texto, preservando la ubicación original.
    pub fn rename(&mut self, kind: Kind, text: Rc<str>) {
        self.kind = kind;
        self.text = text;
    }

    /// Construye un `End` que cierra a este símbolo.
    pub fn closer(&self, location: Location) -> Symbol {
        Symbol {
            kind: Kind::End,
            text: Rc::clone(&self.text),
            location,
        }
    }
}

impl Display for Symbol {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "{{{},'{}'}}", self.kind, self.text)
    }
}

/// Secuencia plana y mutable de símbolos.
#[derive(Debug, Clone, Default)]
pub struct Tape(Vec<Symbol>);

impl Tape {
    pub fn new() -> Self {
        Tape(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, at: usize) -> Option<&Symbol> {
        self.0.get(at)
    }

    pub fn last(&self) -> Option<&Symbol> {
        self.0.last()
    }

    pub fn iter(&self) -> slice::Iter<'_, Symbol> {
        self.0.iter()
    }

    pub fn push(&mut self, symbol: Symbol) {
        self.0.push(symbol);
    }

    pub fn insert(&mut self, at: usize, symbol: Symbol) {
        self.0.insert(at, symbol);
    }

    /// Copia un rango de otra cinta al final de esta.
    pub fn extend_from(&mut self, other: &Tape, range: Range<usize>) {
        self.0.extend_from_slice(&other.0[range]);
    }

    /// Encuentra la posición inmediatamente posterior al `End` que
    /// corresponde a la apertura en `at`.
    pub fn block_end(&self, at: usize) -> Option<usize> {
        let mut depth = 0usize;
        for (offset, symbol) in self.0.get(at..)?.iter().enumerate() {
            if symbol.kind.is_opener() {
                depth += 1;
            } else if symbol.kind == Kind::End {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(at + offset + 1);
                }
            }
        }

        None
    }

    /// Mueve un rango hasta justo antes del símbolo final de la cinta
    /// (el `End` del programa), retornando su nueva ubicación.
    pub fn rotate_to_tail(&mut self, range: Range<usize>) -> Range<usize> {
        let tail = self.0.len() - 1;
        let length = range.len();

        self.0[range.start..tail].rotate_left(length);
        tail - length..tail
    }

    /// Elimina un rango de la cinta.
    pub fn excise(&mut self, range: Range<usize>) -> Vec<Symbol> {
        self.0.drain(range).collect()
    }

    /// Recorre las funciones de nivel superior, en orden.
    pub fn functions(&self) -> Functions<'_> {
        Functions { tape: self, at: 1 }
    }

    /// Verifica que aperturas y `End`s estén balanceados y no se traslapen.
    pub fn check_balance(&self) -> Result<(), Located<InternalError>> {
        let mut open: Vec<&Symbol> = Vec::new();
        let unbalanced = |symbol: &Symbol| {
            Err(Located::at(
                InternalError::Unbalanced(symbol.kind),
                symbol.location.clone(),
            ))
        };

        let last = self.0.len().saturating_sub(1);
        for (at, symbol) in self.0.iter().enumerate() {
            match symbol.kind {
                kind if kind.is_opener() => open.push(symbol),

                Kind::End => match open.pop() {
                    Some(opener) if opener.text == symbol.text => (),
                    _ => return unbalanced(symbol),
                },

                Kind::Eof | Kind::FnMark | Kind::Unmark | Kind::Unquote => {
                    return unbalanced(symbol)
                }

                _ if open.is_empty() => return unbalanced(symbol),
                _ => (),
            }

            // Todo debe estar contenido en un único bloque de programa
            if open.is_empty() && at != last {
                return unbalanced(symbol);
            }
        }

        match open.last() {
            Some(opener) => unbalanced(opener),
            None => Ok(()),
        }
    }
}

impl Index<usize> for Tape {
    type Output = Symbol;

    fn index(&self, at: usize) -> &Symbol {
        &self.0[at]
    }
}

impl IndexMut<usize> for Tape {
    fn index_mut(&mut self, at: usize) -> &mut Symbol {
        &mut self.0[at]
    }
}

impl Index<Range<usize>> for Tape {
    type Output = [Symbol];

    fn index(&self, range: Range<usize>) -> &[Symbol] {
        &self.0[range]
    }
}

impl<'a> IntoIterator for &'a Tape {
    type Item = &'a Symbol;
    type IntoIter = slice::Iter<'a, Symbol>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<Symbol> for Tape {
    fn from_iter<I: IntoIterator<Item = Symbol>>(iter: I) -> Self {
        Tape(iter.into_iter().collect())
    }
}

/// Iterador sobre las funciones de nivel superior de una cinta.
///
/// Emite el nombre de cada función y el rango `[inicio, fin)` que
/// la abarca, incluyendo su `Fn` y su `End`.
pub struct Functions<'a> {
    tape: &'a Tape,
    at: usize,
}

impl<'a> Iterator for Functions<'a> {
    type Item = (&'a Rc<str>, Range<usize>);

    fn next(&mut self) -> Option<Self::Item> {
        let symbol = self.tape.get(self.at)?;
        if symbol.kind != Kind::Fn {
            return None;
        }

        let end = self.tape.block_end(self.at)?;
        let range = self.at..end;
        self.at = end;

        Some((&symbol.text, range))
    }
}
