//! Errores de compilación y su presentación.
//!
//! Cada fase define su propio tipo de error. Todos convergen en
//! [`ErrorKind`], y un [`Report`] asocia ese error con la ubicación
//! en el código fuente donde ocurrió. La compilación se aborta en el
//! primer error, por lo que a lo sumo existe un reporte por ejecución.

use crate::{
    ir::Kind,
    lex::LexerError,
    parse::ParserError,
    semantic::SemanticError,
    source::{Located, Location},
};

use std::{
    error::Error,
    fmt::{self, Display},
    io,
    rc::Rc,
};

use thiserror::Error;

/// Error que no debería ocurrir para ninguna entrada.
///
/// Un error de estos indica un defecto del compilador y no del
/// programa que se compila.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum InternalError {
    #[error("Unreachable symbol: {0}")]
    Unreachable(Kind),

    #[error("Not implemented: {0}")]
    NotImplemented(&'static str),

    #[error("`{0}` is not defined in the code generator's symbol table")]
    NotDefined(Rc<str>),

    #[error("Unbalanced block structure at {0}")]
    Unbalanced(Kind),
}

/// Cualquier error de compilación.
#[derive(Error, Debug)]
pub enum ErrorKind {
    #[error(transparent)]
    Lexer(#[from] LexerError),

    #[error(transparent)]
    Parser(#[from] ParserError),

    #[error(transparent)]
    Semantic(#[from] SemanticError),

    #[error("Internal compiler error: {0}")]
    Internal(#[from] InternalError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ErrorKind {
    /// Determina si el error corresponde a un defecto del compilador.
    pub fn is_internal(&self) -> bool {
        matches!(self, ErrorKind::Internal(_))
    }
}

/// Un error de compilación junto a su ubicación.
#[derive(Debug)]
pub struct Report {
    location: Location,
    kind: ErrorKind,
}

impl Report {
    pub fn new<E: Into<ErrorKind>>(kind: E, location: Location) -> Self {
        Report {
            location,
            kind: kind.into(),
        }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn is_internal(&self) -> bool {
        self.kind.is_internal()
    }
}

impl<E: Into<ErrorKind>> From<Located<E>> for Report {
    fn from(error: Located<E>) -> Self {
        let (location, kind) = error.split();
        Report::new(kind, location)
    }
}

impl Display for Report {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "error: `{}` => {}", self.location.text(), self.kind)
    }
}

impl Error for Report {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.kind)
    }
}

mod sealed {
    pub trait Sealed {}
}

pub trait LocatedError: sealed::Sealed {
    fn source(&self) -> &dyn Error;
    fn location(&self) -> &Location;
}

/// Presentación de errores para una terminal.
///
/// Muestra cada error junto a las líneas afectadas del código fuente
/// y un subrayado del rango exacto.
pub struct Diagnostics {
    kind: &'static str,
    errors: Vec<Box<dyn 'static + LocatedError>>,
}

impl Diagnostics {
    pub fn kind(self, kind: &'static str) -> Self {
        Diagnostics { kind, ..self }
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Diagnostics {
            kind: "error",
            errors: Default::default(),
        }
    }
}

impl<E: 'static + LocatedError> From<E> for Diagnostics {
    fn from(error: E) -> Self {
        Diagnostics {
            errors: vec![Box::new(error)],
            ..Default::default()
        }
    }
}

impl Display for Diagnostics {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Diagnostics { kind, errors } = self;

        if errors.is_empty() {
            return writeln!(fmt, "No errors were reported");
        }

        for error in errors {
            writeln!(fmt, "{}: {}", kind, error.source())?;

            let location = error.location();
            writeln!(fmt, " --> {}", location)?;

            let (start, end) = (location.start(), location.end());
            let digits = end.line().to_string().chars().count();
            writeln!(fmt, "{:digits$} |", "", digits = digits)?;

            for line_number in start.line()..=end.line() {
                location.source().with_line(line_number, |line| {
                    writeln!(fmt, "{:>digits$} | {}", line_number, line, digits = digits)
                })?
            }

            // Un rango vacío (fin de entrada) se señala con una sola columna
            let from = start.column();
            let to = if end == start {
                from
            } else {
                end.back().column()
            };

            let min = from.min(to);
            let max = from.max(to);

            let skip = (min - 1) as usize;
            let highlight = (max - min + 1) as usize;

            writeln!(
                fmt,
                "{:digits$} | {:skip$}{:^<highlight$}",
                "",
                "",
                "",
                digits = digits,
                skip = skip,
                highlight = highlight
            )?;

            writeln!(fmt)?;
        }

        let error_or_errors = if errors.len() == 1 { "error" } else { "errors" };
        writeln!(
            fmt,
            "Build failed with {} {}",
            errors.len(),
            error_or_errors
        )
    }
}

impl<E: Error> sealed::Sealed for Located<E> {}

impl<E: Error> LocatedError for Located<E> {
    fn source(&self) -> &dyn Error {
        self.as_ref()
    }

    fn location(&self) -> &Location {
        Located::location(self)
    }
}

impl sealed::Sealed for Report {}

impl LocatedError for Report {
    fn source(&self) -> &dyn Error {
        &self.kind
    }

    fn location(&self) -> &Location {
        &self.location
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Source;

    #[test]
    fn diagnostics_underline_the_span() {
        let source = Source::new("test", "1 2 + :: add\nfoo :: main");
        let location = Location::new(Rc::clone(&source), 13..16);
        let report = Report::new(SemanticError::Undefined("foo".into()), location);

        assert!(!report.is_internal());
        assert_eq!(report.to_string(), "error: `foo` => Undefined symbol `foo`");

        let rendered = Diagnostics::from(report).to_string();
        assert!(rendered.contains(" --> test:[2:1-2:3]"));
        assert!(rendered.contains("2 | foo :: main"));
        assert!(rendered.contains("  | ^^^\n"));
        assert!(rendered.ends_with("Build failed with 1 error\n"));
    }

    #[test]
    fn internal_errors_are_flagged() {
        let source = Source::new("test", "");
        let report = Report::new(
            InternalError::Unreachable(Kind::Eof),
            Location::new(source, 0..0),
        );

        assert!(report.is_internal());
        assert!(Diagnostics::from(report)
            .kind("internal compiler error")
            .to_string()
            .starts_with("internal compiler error: "));
    }
}
