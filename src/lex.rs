//! Análisis léxico.
//!
//! # Tokenization
//! Esta es la primera fase del compilador. Descompone el texto de un
//! [`Source`] en unidades léxicas, que en este compilador ya son
//! [`Symbol`]s clasificados. Los espacios en blanco y los comentarios
//! se descartan durante esta operación. Cada símbolo emitido está
//! asociado a una ubicación en el código fuente original.
//!
//! # Reglas importantes del lenguaje
//! - Un término es cualquier secuencia maximal de caracteres visibles
//!   (ASCII 33 a 126). Solo se reconoce como palabra clave u operador
//!   si coincide completo con alguna entrada de [`BUILTINS`]; por
//!   ejemplo, `letfoo` es un identificador.
//! - `#!` inicia un comentario de línea.
//! - `[`, `]`, `{` y `}` son delimitadores solamente al inicio de un
//!   término. Por lo tanto `[x]` produce `[` seguido del identificador
//!   `x]`, mientras que `[ x ]` produce tres símbolos. Los dígitos sí
//!   terminan en cualquier carácter que no lo sea, así que `[1]` se
//!   descompone en `[`, `1` y `]`.
//! - `$` introduce un intrínseco, que debe ser alguno de [`INTRINSICS`].
//! - Las constantes enteras son secuencias de dígitos que caben en `i64`.
//!
//! # Lookahead
//! El parser observa exactamente un símbolo por adelantado por medio
//! de [`Lexer::peek()`]. Al final de la entrada se emite
//! [`Kind::Eof`] indefinidamente.

use crate::{
    ir::{Kind, Symbol},
    source::{Located, Location, Source},
};

use std::{mem, ops::Range, rc::Rc};
use thiserror::Error;

/// Términos con significado fijo, por coincidencia exacta.
pub const BUILTINS: &[(&str, Kind)] = &[
    ("::", Kind::FnMark),
    ("let", Kind::Let),
    (".", Kind::Go),
    ("#", Kind::Count),
    ("word", Kind::Word),
    ("byte", Kind::Byte),
    ("?", Kind::Choose),
    (">|", Kind::DeqPush),
    ("|>", Kind::DeqPop),
    ("pop", Kind::Pop),
    ("dup", Kind::Dup),
    ("get", Kind::Get),
    ("set", Kind::Set),
    ("+", Kind::Add),
    ("-", Kind::Sub),
    ("*", Kind::Mul),
    ("/", Kind::Div),
    ("%", Kind::Mod),
    ("<<", Kind::Shl),
    (">>", Kind::Shr),
    ("&", Kind::And),
    ("|", Kind::Or),
    ("^", Kind::Xor),
    ("~", Kind::Not),
    ("<=>", Kind::Cmp),
    ("=", Kind::Eq),
    ("!=", Kind::Ne),
    ("<", Kind::Lt),
    (">", Kind::Gt),
    ("<=", Kind::Le),
    (">=", Kind::Ge),
];

/// Intrínsecos reconocidos tras `$`.
pub const INTRINSICS: &[(&str, Kind)] = &[
    ("decl", Kind::Declare),
    ("def", Kind::Label),
    ("addr", Kind::Addr),
];

/// Inicio de un comentario de línea.
const COMMENT: &str = "#!";

/// Error de escaneo.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LexerError {
    /// Carácter desconocido o inesperado en el flujo de entrada.
    #[error("Bad character {0:?} in input stream")]
    UnknownCharacter(char),

    #[error("Unterminated string literal")]
    UnterminatedString,

    #[error("Unknown intrinsic `${0}`")]
    UnknownIntrinsic(String),

    /// Una constante entera se encuentra fuera de rango.
    #[error("Integer literal overflow, valid range is [0, {}]", i64::MAX)]
    IntOverflow,
}

/// Máquina de estados para análisis léxico.
///
/// Un lexer puede encontrarse en uno de diversos estados. La
/// salida del lexer, así como su siguiente estado, se define
/// a partir de tanto su estado actual como el siguiente carácter
/// encontrado en el texto.
pub struct Lexer {
    source: Rc<Source>,
    state: State,
    start: usize,
    next: usize,
    peek: Symbol,
}

/// Posibles estados del lexer.
#[derive(Copy, Clone)]
enum State {
    /// Estado que ocurre antes de encontrar el inicio de un token.
    Start,

    /// Estado de completitud; siempre emite la clase incluida
    /// y pasa a [`State::Start`].
    Complete(Kind),

    /// Comentario de línea.
    ///
    /// Este estado vuelve a [`State::Start`] al encontrar `'\n'`.
    Comment,

    /// Constante entera.
    Integer(i64),

    /// Término que puede ser un identificador, operador o palabra clave.
    Word,

    /// Nombre de un intrínseco, tras `$`.
    Sigil,

    /// Interior de una cadena literal.
    Str,
}

impl Lexer {
    /// Crea un lexer y obtiene el primer símbolo de lookahead.
    pub fn new(source: &Rc<Source>) -> Result<Self, Located<LexerError>> {
        let mut lexer = Lexer {
            source: Rc::clone(source),
            state: State::Start,
            start: 0,
            next: 0,
            peek: Symbol::new(Kind::Eof, "", Location::new(Rc::clone(source), 0..0)),
        };

        lexer.peek = lexer.lex()?;
        Ok(lexer)
    }

    /// Observa el siguiente símbolo sin consumirlo.
    pub fn peek(&self) -> &Symbol {
        &self.peek
    }

    /// Consume el siguiente símbolo.
    pub fn take(&mut self) -> Result<Symbol, Located<LexerError>> {
        let next = self.lex()?;
        Ok(mem::replace(&mut self.peek, next))
    }

    /// Construye el siguiente símbolo.
    fn lex(&mut self) -> Result<Symbol, Located<LexerError>> {
        use State::*;

        let source = Rc::clone(&self.source);
        let text = source.text();

        let kind = loop {
            let next_char = text[self.next..].chars().next();

            // El inicio del token se mueve junto a la posición siguiente
            // mientras no se haya encontrado una frontera de token
            if let Start = self.state {
                self.start = self.next;
            }

            // Switch table principal, determina cambios de estado
            // y de salida del lexer a partir de combinaciones del
            // estado actual y el siguiente carácter
            match (self.state, next_char) {
                (Start, None) => break Kind::Eof,
                (Start, Some(c)) if is_space(c) => (),

                (Start, Some('#')) if text[self.next..].starts_with(COMMENT) => {
                    self.state = Comment
                }

                // Delimitadores de bloque
                (Start, Some('[')) => self.state = Complete(Kind::Mark),
                (Start, Some(']')) => self.state = Complete(Kind::Unmark),
                (Start, Some('{')) => self.state = Complete(Kind::Quote),
                (Start, Some('}')) => self.state = Complete(Kind::Unquote),

                (Start, Some('"')) => self.state = Str,
                (Start, Some('$')) => self.state = Sigil,

                // No se consume el primer dígito, ya que esa lógica ya
                // está implementada en el caso de acumulación
                (Start, Some(c)) if c.is_ascii_digit() => {
                    self.state = Integer(0);
                    continue;
                }

                (Start, Some(c)) if is_visible(c) => self.state = Word,
                (Start, Some(c)) => {
                    let end = self.next + c.len_utf8();
                    return Err(self.fail(LexerError::UnknownCharacter(c), self.next..end));
                }

                // Emisión retardada de tokens cualesquiera
                (Complete(kind), _) => break kind,

                // Los comentarios descartan la línea donde ocurren
                (Comment, Some('\n')) | (Comment, None) => self.state = Start,
                (Comment, Some(_)) => (),

                // Acumulación dígito por dígito de constantes enteras
                (Integer(accumulated), Some(digit)) if digit.is_ascii_digit() => {
                    let digit = i64::from(digit as u8 - b'0');

                    match accumulated
                        .checked_mul(10)
                        .and_then(|n| n.checked_add(digit))
                    {
                        Some(result) => self.state = Integer(result),
                        None => {
                            let end = self.run_end(text);
                            return Err(self.fail(LexerError::IntOverflow, self.start..end));
                        }
                    }
                }

                // Si sigue algo que no es un dígito, la constante ha terminado
                (Integer(_), _) => break Kind::Int,

                (Word, Some(c)) if is_visible(c) => (),
                (Word, _) => {
                    let word = &text[self.start..self.next];
                    break lookup(BUILTINS, word).unwrap_or(Kind::Ident);
                }

                (Sigil, Some(c)) if is_visible(c) => (),
                (Sigil, _) => {
                    let name = &text[self.start + 1..self.next];
                    match lookup(INTRINSICS, name) {
                        Some(kind) => break kind,
                        None => {
                            let error = LexerError::UnknownIntrinsic(name.to_owned());
                            return Err(self.fail(error, self.start..self.next));
                        }
                    }
                }

                (Str, Some('"')) => self.state = Complete(Kind::Str),
                (Str, Some(_)) => (),
                (Str, None) => {
                    return Err(self.fail(LexerError::UnterminatedString, self.start..self.next))
                }
            }

            // Si no hubo `continue` ni `break`, aquí se consume el
            // carácter que se observó con lookahead anteriormente
            if let Some(c) = next_char {
                self.next += c.len_utf8();
            }
        };

        self.state = Start;

        let lexeme = match kind {
            // Las comillas no forman parte del valor
            Kind::Str => &text[self.start + 1..self.next - 1],
            _ => &text[self.start..self.next],
        };

        let location = Location::new(Rc::clone(&self.source), self.start..self.next);
        Ok(Symbol::new(kind, lexeme, location))
    }

    fn fail(&self, error: LexerError, bytes: Range<usize>) -> Located<LexerError> {
        Located::at(error, Location::new(Rc::clone(&self.source), bytes))
    }

    /// Encuentra el final de la secuencia de dígitos actual.
    fn run_end(&self, text: &str) -> usize {
        text[self.start..]
            .find(|c: char| !c.is_ascii_digit())
            .map_or(text.len(), |offset| self.start + offset)
    }
}

fn lookup(table: &[(&str, Kind)], word: &str) -> Option<Kind> {
    table
        .iter()
        .find(|&&(name, _)| name == word)
        .map(|&(_, kind)| kind)
}

/// Espacios en blanco: bytes 9 a 13 y el espacio.
fn is_space(c: char) -> bool {
    matches!(c, '\t'..='\r' | ' ')
}

/// Caracteres que pueden formar parte de un término.
fn is_visible(c: char) -> bool {
    matches!(c, '!'..='~')
}
