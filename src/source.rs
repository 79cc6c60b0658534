//! Rastreo de ubicaciones originales en código fuente.
//!
//! Los distintos objetos internos que el compilador construye
//! deben llevar cuenta de rangos de ubicaciones en el código fuente
//! original, lo cual permite determinar un punto exacto en donde
//! ocurre un error. El programa completo se mantiene en memoria, por
//! lo cual una ubicación es simplemente un rango de bytes sobre ese
//! texto; líneas y columnas se calculan solo cuando se necesitan.

use std::{
    fmt::{self, Debug, Display, Formatter},
    io::{self, Read},
    ops::Range,
    rc::Rc,
};

/// Ancho de los divisores de tabulador.
const TAB_STOP: u32 = 4;

/// Un objeto cualquiera con una posición original asociada.
#[derive(Debug, Clone)]
pub struct Located<T> {
    location: Location,
    value: T,
}

impl<T> Located<T> {
    /// Obtiene el valor.
    pub fn val(&self) -> &T {
        &self.value
    }

    /// Obtiene la ubicación.
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Descarta la ubicación y toma ownership del valor.
    pub fn into_inner(self) -> T {
        self.value
    }

    /// Descompone y toma ownership de las dos partes.
    pub fn split(self) -> (Location, T) {
        (self.location, self.value)
    }

    /// Construye a partir de un valor y una ubicación.
    pub fn at(value: T, location: Location) -> Self {
        Located { value, location }
    }

    /// Transforma el valor con la misma ubicación.
    pub fn map<U, F>(self, map: F) -> Located<U>
    where
        F: FnOnce(T) -> U,
    {
        Located {
            value: map(self.value),
            location: self.location,
        }
    }
}

impl<T> AsRef<T> for Located<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

/// Texto fuente de un programa, junto con el nombre de su origen.
pub struct Source {
    name: String,
    text: String,
}

impl Source {
    /// Construye un origen a partir de texto ya disponible en memoria.
    pub fn new<N, T>(name: N, text: T) -> Rc<Self>
    where
        N: Into<String>,
        T: Into<String>,
    {
        Rc::new(Source {
            name: name.into(),
            text: text.into(),
        })
    }

    /// Consume un flujo de entrada completo.
    pub fn read<R, N>(mut reader: R, name: N) -> io::Result<Rc<Self>>
    where
        R: Read,
        N: Into<String>,
    {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;

        Ok(Source::new(name, text))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Invoca a `callback` con el contenido de una línea (desde 1), sin
    /// el terminador de línea.
    pub fn with_line<F, R>(&self, line: u32, callback: F) -> R
    where
        F: FnOnce(&str) -> R,
    {
        let line = self
            .text
            .lines()
            .nth(line.saturating_sub(1) as usize)
            .unwrap_or("");

        callback(line)
    }

    /// Calcula la posición línea-columna de un offset en bytes.
    fn position_of(&self, offset: usize) -> Position {
        let offset = offset.min(self.text.len());

        self.text[..offset]
            .chars()
            .fold(Position::default(), |position, c| match c {
                '\n' => position.newline(),
                '\t' => position.tab(),
                _ => position.advance(),
            })
    }
}

/// Una ubicación está conformada por un origen y un rango de bytes.
#[derive(Clone)]
pub struct Location {
    from: Rc<Source>,
    bytes: Range<usize>,
}

impl Location {
    /// Construye una ubicación sobre un origen.
    pub fn new(from: Rc<Source>, bytes: Range<usize>) -> Self {
        Location { from, bytes }
    }

    /// Unifica un rango de ubicaciones. Se asume el mismo origen.
    pub fn span(from: Location, to: &Location) -> Self {
        Location {
            from: from.from,
            bytes: from.bytes.start..to.bytes.end,
        }
    }

    /// Obtiene el origen de esta ubicación.
    pub fn source(&self) -> &Source {
        &self.from
    }

    /// Rango de bytes abarcado.
    pub fn bytes(&self) -> Range<usize> {
        self.bytes.clone()
    }

    /// Texto original abarcado por la ubicación.
    pub fn text(&self) -> &str {
        self.from.text.get(self.bytes.clone()).unwrap_or("")
    }

    /// Obtiene la posición de inicio.
    pub fn start(&self) -> Position {
        self.from.position_of(self.bytes.start)
    }

    /// Obtiene la posición de fin (exclusiva).
    pub fn end(&self) -> Position {
        self.from.position_of(self.bytes.end)
    }
}

impl Display for Location {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:", self.from.name)?;

        let (start, end) = (self.start(), self.end());
        if end.line != start.line || end.column > start.column + 1 {
            write!(formatter, "[{}-{}]", start, end.back())
        } else {
            // Solo se señala una columna en específico
            write!(formatter, "{}", start)
        }
    }
}

impl Debug for Location {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        <Self as Display>::fmt(self, formatter)
    }
}

/// Una posición línea-columna en un archivo.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Position {
    line: u32,
    column: u32,
}

impl Position {
    /// Obtiene el número de línea.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Obtiene el número de columna.
    pub fn column(&self) -> u32 {
        self.column
    }

    /// Incrementa el número de columna.
    pub fn advance(self) -> Position {
        Position {
            line: self.line,
            column: self.column + 1,
        }
    }

    /// Decrementa el número de columna.
    pub fn back(self) -> Position {
        Position {
            line: self.line,
            column: self.column.saturating_sub(1).max(1),
        }
    }

    /// Incrementa el número de línea y retorna a la columna 1.
    pub fn newline(self) -> Position {
        Position {
            line: self.line + 1,
            column: 1,
        }
    }

    /// Ajusta la posición a la siguiente columna de tabulador.
    pub fn tab(self) -> Position {
        let column = 1 + ((self.column - 1) / TAB_STOP + 1) * TAB_STOP;
        Position {
            line: self.line,
            column,
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Position { line: 1, column: 1 }
    }
}

impl Display for Position {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{}", self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_follow_lines_and_tabs() {
        let source = Source::new("test", "1 2\n\tfoo :: bar");
        let location = Location::new(Rc::clone(&source), 5..8);

        assert_eq!(location.text(), "foo");
        assert_eq!(location.start(), Position { line: 2, column: 5 });
        assert_eq!(location.to_string(), "test:[2:5-2:7]");
    }

    #[test]
    fn single_column_locations() {
        let source = Source::new("test", "x");
        let location = Location::new(source, 0..1);

        assert_eq!(location.to_string(), "test:1:1");
    }
}
