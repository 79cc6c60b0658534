//! Análisis sintáctico.
//!
//! Parser de descenso recursivo que construye directamente la cinta
//! ([`Tape`]) a partir de los símbolos del lexer. La gramática es:
//!
//! ```text
//! program     = function* , EOF ;
//! function    = instruction* , "::" , IDENT ;
//! instruction = literal | builtin | intrinsic | let | mark_block | quote | IDENT ;
//! intrinsic   = ( "$decl" | "$def" | "$addr" ) , IDENT ;
//! let         = "let" , IDENT , instruction* ;
//! mark_block  = "[" , instruction* , "]" ;
//! quote       = "{" , instruction* , "}" ;
//! ```
//!
//! El cuerpo de un `let` se extiende hasta el final del bloque que lo
//! contiene. No existe recuperación de errores: el primer error aborta
//! el análisis y no se produce una cinta parcial.

use std::{
    fmt::{self, Display},
    rc::Rc,
};

use thiserror::Error;

use crate::{
    error::Report,
    ir::{Kind, Symbol, Tape},
    lex::Lexer,
    source::{Located, Location, Source},
};

/// Constructo sintáctico que se esperaba encontrar.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Construct {
    Function,
    Ident,
    Instruction,
    Unmark,
    Unquote,
}

impl Display for Construct {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let string = match self {
            Construct::Function => "end of function (`:: name`)",
            Construct::Ident => "identifier",
            Construct::Instruction => "instruction",
            Construct::Unmark => "`]`",
            Construct::Unquote => "`}`",
        };

        fmt.write_str(string)
    }
}

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ParserError {
    #[error("Expected {0}")]
    Expect(Construct),
}

/// Construye la cinta de un programa completo.
pub fn parse(source: &Rc<Source>) -> Result<Tape, Report> {
    let mut parser = Parser {
        lexer: Lexer::new(source)?,
        tape: Tape::new(),
    };

    parser.program(source)?;
    Ok(parser.tape)
}

struct Parser {
    lexer: Lexer,
    tape: Tape,
}

type Parse<T> = Result<T, Report>;

impl Parser {
    fn program(&mut self, source: &Rc<Source>) -> Parse<()> {
        let program = Symbol::new(
            Kind::Program,
            source.name(),
            Location::new(Rc::clone(source), 0..0),
        );

        self.tape.push(program.clone());
        while self.lexer.peek().kind() != Kind::Eof {
            self.function()?;
        }

        let eof = self.lexer.take()?;
        self.tape.push(program.closer(eof.location().clone()));

        Ok(())
    }

    fn function(&mut self) -> Parse<()> {
        // El nombre se conoce hasta el final, por lo que se reserva
        // la posición del `Fn` y se reemplaza luego
        let at = self.tape.len();
        let placeholder = self.lexer.peek().clone();
        self.tape.push(placeholder);

        self.sequence()?;

        match self.lexer.peek().kind() {
            Kind::FnMark => {
                self.lexer.take()?;
            }

            Kind::Eof => return self.fail(Construct::Function),
            _ => return self.fail(Construct::Instruction),
        }

        let name = self.expect(Kind::Ident, Construct::Ident)?;
        let function = Symbol::new(Kind::Fn, Rc::clone(name.text()), name.location().clone());
        self.tape.push(function.closer(name.location().clone()));
        self.tape[at] = function;

        Ok(())
    }

    /// Consume instrucciones mientras sea posible.
    fn sequence(&mut self) -> Parse<()> {
        while self.lexer.peek().kind().is_instruction() {
            self.instruction()?;
        }

        Ok(())
    }

    fn instruction(&mut self) -> Parse<()> {
        match self.lexer.peek().kind() {
            Kind::Let => self.let_block(),
            Kind::Mark => self.delimited(Kind::Unmark, Construct::Unmark),
            Kind::Quote => self.delimited(Kind::Unquote, Construct::Unquote),
            Kind::Declare | Kind::Label | Kind::Addr => self.intrinsic(),

            _ => {
                let symbol = self.lexer.take()?;
                self.tape.push(symbol);
                Ok(())
            }
        }
    }

    fn let_block(&mut self) -> Parse<()> {
        let keyword = self.lexer.take()?;
        let name = self.expect(Kind::Ident, Construct::Ident)?;

        let location = Location::span(keyword.location().clone(), name.location());
        let binding = Symbol::new(Kind::Let, Rc::clone(name.text()), location);
        self.tape.push(binding.clone());

        self.sequence()?;

        // El `End` sintético se ubica donde termina el bloque contenedor
        let end = self.lexer.peek().location().clone();
        self.tape.push(binding.closer(end));

        Ok(())
    }

    fn delimited(&mut self, closer: Kind, expected: Construct) -> Parse<()> {
        let opener = self.lexer.take()?;
        self.tape.push(opener.clone());

        self.sequence()?;

        let end = self.expect(closer, expected)?;
        self.tape.push(opener.closer(end.location().clone()));

        Ok(())
    }

    fn intrinsic(&mut self) -> Parse<()> {
        let sigil = self.lexer.take()?;
        let name = self.expect(Kind::Ident, Construct::Ident)?;

        let location = Location::span(sigil.location().clone(), name.location());
        self.tape
            .push(Symbol::new(sigil.kind(), Rc::clone(name.text()), location));

        Ok(())
    }

    fn expect(&mut self, kind: Kind, expected: Construct) -> Parse<Symbol> {
        if self.lexer.peek().kind() == kind {
            Ok(self.lexer.take()?)
        } else {
            self.fail(expected)
        }
    }

    fn fail<T>(&self, expected: Construct) -> Parse<T> {
        let location = self.lexer.peek().location().clone();
        Err(Located::at(ParserError::Expect(expected), location).into())
    }
}
