//! Generación de código.
//!
//! Recorre la cinta final y emite ensamblador x86-64 en sintaxis NASM.
//! La emisión es estrictamente secuencial: el reordenamiento previo
//! garantiza que no hacen falta parches hacia atrás.

use std::{
    io::{self, Write},
    rc::Rc,
};

use crate::{
    config::Config,
    error::{InternalError, Report},
    ir::{Kind, Symbol, Tape},
    semantic::{self, Context, Definition, Pass, Semantic},
};

pub mod x86_64;

/// Emite el programa completo.
pub fn emit<W: Write>(
    cx: &Context,
    tape: &mut Tape,
    config: &Config,
    output: &mut W,
) -> Semantic<()> {
    let mut generator = Generator {
        cx,
        config,
        output,
        bindings: Vec::new(),
        strings: Vec::new(),
        quotes: 0,
    };

    semantic::run(&mut generator, tape)
}

struct Generator<'a, W> {
    cx: &'a Context,
    config: &'a Config,
    output: &'a mut W,
    bindings: Vec<Rc<str>>,
    strings: Vec<Rc<str>>,
    quotes: usize,
}

impl<W: Write> Pass for Generator<'_, W> {
    fn visit(&mut self, tape: &mut Tape, at: usize) -> Semantic<usize> {
        let symbol = tape[at].clone();
        let io = |error: io::Error| Report::new(error, symbol.location().clone());

        match symbol.kind() {
            Kind::Program => {
                self.header().map_err(io)?;
                let next = self.block(tape, at)?;
                self.footer().map_err(io)?;

                Ok(next)
            }

            Kind::Fn => {
                self.bindings.clear();

                writeln!(self.output(), "\n{}:", x86_64::mangle(symbol.text())).map_err(io)?;
                self.function_entry().map_err(io)?;
                let next = self.block(tape, at)?;
                self.function_exit().map_err(io)?;

                Ok(next)
            }

            Kind::Let => {
                self.bind().map_err(io)?;
                self.bindings.push(Rc::clone(symbol.text()));

                let next = self.block(tape, at)?;

                self.bindings.pop();
                self.unbind().map_err(io)?;

                Ok(next)
            }

            Kind::Mark => {
                self.mark().map_err(io)?;
                let next = self.block(tape, at)?;
                self.unmark().map_err(io)?;

                Ok(next)
            }

            // Las quotes normalmente ya fueron extraídas, pero una cinta
            // que no pasó por esa fase aún puede compilarse
            Kind::Quote => {
                let quote = self.quotes;
                self.quotes += 1;

                self.quote_entry(quote).map_err(io)?;

                let outer = std::mem::take(&mut self.bindings);
                let next = self.block(tape, at)?;
                self.bindings = outer;

                self.function_exit().map_err(io)?;
                writeln!(self.output(), "__quote_end_{}:", quote).map_err(io)?;
                self.load(format_args!("__quote_{}", quote)).map_err(io)?;

                Ok(next)
            }

            Kind::Int => {
                self.load(symbol.text()).map_err(io)?;
                Ok(at + 1)
            }

            Kind::Str => {
                let index = self.strings.len();
                self.strings.push(Rc::clone(symbol.text()));

                self.load(format_args!("__str_{}", index)).map_err(io)?;
                Ok(at + 1)
            }

            Kind::Addr => {
                self.check_defined(&symbol)?;
                let target = self.operand(symbol.text());
                self.load(target).map_err(io)?;

                Ok(at + 1)
            }

            Kind::Bind => {
                let depth = self
                    .bindings
                    .iter()
                    .rev()
                    .position(|name| name == symbol.text())
                    .ok_or_else(|| not_defined(&symbol))?;

                self.load(format_args!("[r15 + {}]", 8 * depth)).map_err(io)?;

                Ok(at + 1)
            }

            Kind::Call => {
                self.check_defined(&symbol)?;
                let target = self.operand(symbol.text());
                self.call(target).map_err(io)?;

                Ok(at + 1)
            }

            Kind::Label => {
                writeln!(self.output(), "{}:", x86_64::mangle(symbol.text())).map_err(io)?;
                Ok(at + 1)
            }

            // Ya declarado en el encabezado
            Kind::Declare => Ok(at + 1),

            kind => match x86_64::primitive(kind) {
                Some(sequence) => {
                    self.sequence(sequence).map_err(io)?;
                    Ok(at + 1)
                }

                None => Err(Report::new(
                    InternalError::Unreachable(kind),
                    symbol.location().clone(),
                )),
            },
        }
    }
}

impl<W: Write> Generator<'_, W> {
    fn output(&mut self) -> &mut W {
        &mut *self.output
    }

    fn header(&mut self) -> io::Result<()> {
        writeln!(self.output(), "bits 64\nsection .text")?;

        let externals = self
            .cx
            .symbols
            .iter()
            .filter(|(_, definition)| **definition == Definition::External)
            .map(|(name, _)| Rc::clone(name))
            .collect::<Vec<_>>();

        for name in externals {
            writeln!(self.output(), "extern {}", name)?;
        }

        writeln!(self.output(), "\nglobal _start\n_start:")?;
        emit!(self, "mov", "rbp, rsp")?;
        emit!(self, "mov", "r15, __deck_aux + {}", 8 * x86_64::AUX_WORDS)?;
        emit!(self, "xor", "eax, eax")?;

        let config = self.config;
        if self.cx.ranges.contains(&config.entry) {
            self.call(x86_64::mangle(&config.entry))?;
        }

        emit!(self, "mov", "rdi, rax")?;
        emit!(self, "mov", "rax, 60")?;
        emit!(self, "syscall")?;

        writeln!(self.output())?;
        self.output().write_all(x86_64::RUNTIME.as_bytes())
    }

    fn footer(&mut self) -> io::Result<()> {
        if !self.strings.is_empty() {
            writeln!(self.output(), "\nsection .data")?;

            let strings = std::mem::take(&mut self.strings);
            for (index, string) in strings.iter().enumerate() {
                writeln!(self.output(), "__str_{}: db {}", index, data_bytes(string))?;
            }
        }

        writeln!(self.output(), "\nsection .bss")?;
        writeln!(self.output(), "__deck_aux: resq {}", x86_64::AUX_WORDS)
    }

    /// Traslada la dirección de retorno a la pila auxiliar.
    fn function_entry(&mut self) -> io::Result<()> {
        emit!(self, "pop", "rbx")?;
        emit!(self, "sub", "r15, 8")?;
        emit!(self, "mov", "[r15], rbx")
    }

    fn function_exit(&mut self) -> io::Result<()> {
        emit!(self, "mov", "rbx, [r15]")?;
        emit!(self, "add", "r15, 8")?;
        emit!(self, "jmp", "rbx")
    }

    /// Salta sobre el cuerpo de una quote y abre su etiqueta.
    fn quote_entry(&mut self, quote: usize) -> io::Result<()> {
        emit!(self, "jmp", "__quote_end_{}", quote)?;
        writeln!(self.output(), "__quote_{}:", quote)?;
        self.function_entry()
    }

    /// Mueve el acumulador a la pila auxiliar.
    fn bind(&mut self) -> io::Result<()> {
        emit!(self, "sub", "r15, 8")?;
        emit!(self, "mov", "[r15], rax")?;
        emit!(self, "pop", "rax")
    }

    fn unbind(&mut self) -> io::Result<()> {
        emit!(self, "add", "r15, 8")
    }

    fn call<T: std::fmt::Display>(&mut self, target: T) -> io::Result<()> {
        emit!(self, "call", "{}", target)
    }

    fn mark(&mut self) -> io::Result<()> {
        self.sequence(x86_64::MARK)
    }

    fn unmark(&mut self) -> io::Result<()> {
        self.sequence(x86_64::UNMARK)
    }

    /// Operando para una función, etiqueta o externo.
    fn operand(&self, name: &str) -> String {
        match self.cx.symbols.get(name) {
            Some(Definition::External) => name.to_owned(),
            _ => x86_64::mangle(name),
        }
    }

    /// Empuja el acumulador y carga un valor inmediato.
    fn load<T: std::fmt::Display>(&mut self, value: T) -> io::Result<()> {
        emit!(self, "push", "rax")?;
        emit!(self, "mov", "rax, {}", value)
    }

    fn sequence(&mut self, sequence: &[(&str, &str)]) -> io::Result<()> {
        for &(opcode, operands) in sequence {
            if operands.is_empty() {
                emit!(self, opcode)?;
            } else {
                emit!(self, opcode, "{}", operands)?;
            }
        }

        Ok(())
    }

    /// Verifica que un destino de `call` o de dirección exista en la salida.
    fn check_defined(&self, symbol: &Symbol) -> Semantic<()> {
        let ranges = &self.cx.ranges;
        let defined = match self.cx.symbols.get(symbol.text()) {
            Some(Definition::Function) => ranges.contains(symbol.text()),
            Some(Definition::Label { owner }) => ranges.contains(owner),
            Some(Definition::External) => true,
            Some(Definition::Binding) | None => false,
        };

        if defined {
            Ok(())
        } else {
            Err(not_defined(symbol))
        }
    }
}

fn not_defined(symbol: &Symbol) -> Report {
    let error = InternalError::NotDefined(Rc::clone(symbol.text()));
    Report::new(error, symbol.location().clone())
}

/// Operandos de `db` para una cadena terminada en nulo. Los bytes que
/// no son imprimibles se escriben como números.
fn data_bytes(string: &str) -> String {
    let mut parts = Vec::new();
    let mut printable = String::new();

    for byte in string.bytes() {
        if (b' '..=b'~').contains(&byte) && byte != b'"' {
            printable.push(byte as char);
        } else {
            if !printable.is_empty() {
                parts.push(format!("\"{}\"", std::mem::take(&mut printable)));
            }

            parts.push(byte.to_string());
        }
    }

    if !printable.is_empty() {
        parts.push(format!("\"{}\"", printable));
    }

    parts.push(String::from("0"));
    parts.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Options,
        error::ErrorKind,
        parse::parse,
        semantic::{analyze, discover, ranges, refgraph, verify},
        source::Source,
    };

    fn compile(text: &str, config: &Config) -> Result<String, Report> {
        let mut cx = Context::new();
        let mut tape = parse(&Source::new("test", text))?;
        analyze(&mut cx, &mut tape, config)?;

        let mut output = Vec::new();
        emit(&cx, &mut tape, config, &mut output)?;

        Ok(String::from_utf8(output).unwrap())
    }

    #[test]
    fn arithmetic() {
        let asm = compile("1 2 + :: main", &Config::default()).unwrap();

        assert!(asm.starts_with("bits 64\nsection .text\n"));
        assert!(asm.contains("\tcall    deck$main\n"));
        assert!(asm.contains(
            "deck$main:\n\tpop     rbx\n\tsub     r15, 8\n\tmov     [r15], rbx\n\
             \tpush    rax\n\tmov     rax, 1\n\
             \tpush    rax\n\tmov     rax, 2\n\
             \tpop     rbx\n\tadd     rax, rbx\n\
             \tmov     rbx, [r15]\n\tadd     r15, 8\n\tjmp     rbx\n"
        ));
        assert!(asm.ends_with("section .bss\n__deck_aux: resq 4096\n"));
    }

    #[test]
    fn library_without_entry_point() {
        let asm = compile("1 2 + :: add", &Config::default()).unwrap();

        assert!(asm.contains("\ndeck$add:\n"));
        assert!(!asm.contains("\tcall    deck$add"));
    }

    #[test]
    fn bindings_are_read_by_depth() {
        let asm = compile("1 let x 2 let y x y :: main", &Config::default()).unwrap();

        assert!(asm.contains("\tmov     rax, [r15 + 8]\n"));
        assert!(asm.contains("\tmov     rax, [r15 + 0]\n"));
        assert_eq!(asm.matches("\tadd     r15, 8\n").count(), 3);
    }

    #[test]
    fn externals_strings_and_workspaces() {
        let asm = compile("$decl puts [ \"hi\" ] puts :: main", &Config::default()).unwrap();

        assert!(asm.contains("extern puts\n"));
        assert!(asm.contains("\tcall    puts\n"));
        assert!(asm.contains("\tpush    rbp\n\tmov     rbp, rsp\n"));
        assert!(asm.contains("\tmov     rsp, rbp\n\tpop     rbp\n"));
        assert!(asm.contains("\tmov     rax, __str_0\n"));
        assert!(asm.contains("__str_0: db \"hi\", 0\n"));
    }

    #[test]
    fn lowered_quotes_are_addressed() {
        let asm = compile("{ 1 } . :: main", &Config::default()).unwrap();

        assert!(asm.contains("\ndeck$___fn_0:\n"));
        assert!(asm.contains("\tmov     rax, deck$___fn_0\n"));
        assert!(asm.contains("\tmov     rbx, rax\n\tpop     rax\n\tcall    rbx\n"));
        assert!(asm.find("deck$___fn_0:").unwrap() < asm.find("\ndeck$main:").unwrap());
    }

    #[test]
    fn residual_quotes() {
        let mut cx = Context::new();
        let mut tape = parse(&Source::new("test", "{ 1 } . :: main")).unwrap();

        discover::discover(&mut cx, &mut tape).unwrap();
        verify::verify(&mut cx, &mut tape).unwrap();
        refgraph::build(&mut cx, &mut tape).unwrap();
        ranges::measure(&mut cx, &mut tape).unwrap();

        let mut output = Vec::new();
        emit(&cx, &mut tape, &Config::default(), &mut output).unwrap();
        let asm = String::from_utf8(output).unwrap();

        assert!(asm.contains("\tjmp     __quote_end_0\n__quote_0:\n"));
        assert!(asm.contains("__quote_end_0:\n\tpush    rax\n\tmov     rax, __quote_0\n"));
    }

    #[test]
    fn missing_targets_are_internal_errors() {
        let config = Config::default().with_options(Options::KEEP_DEAD);
        let mut cx = Context::new();
        let mut tape = parse(&Source::new("test", "$decl puts puts :: main")).unwrap();
        analyze(&mut cx, &mut tape, &config).unwrap();

        cx.symbols.remove("puts");

        let report = emit(&cx, &mut tape, &config, &mut Vec::new()).unwrap_err();
        assert!(report.is_internal());
        assert!(matches!(
            report.kind(),
            ErrorKind::Internal(InternalError::NotDefined(name)) if name.as_ref() == "puts"
        ));
    }

    #[test]
    fn unresolved_identifiers_are_unreachable() {
        let mut cx = Context::new();
        let mut tape = parse(&Source::new("test", "x :: main")).unwrap();
        ranges::measure(&mut cx, &mut tape).unwrap();

        let report = emit(&cx, &mut tape, &Config::default(), &mut Vec::new()).unwrap_err();
        assert!(matches!(
            report.kind(),
            ErrorKind::Internal(InternalError::Unreachable(Kind::Ident))
        ));
    }

    #[test]
    fn user_names_cannot_escape_their_namespace() {
        let asm = compile("7 :: rbx $addr rbx . :: main", &Config::default()).unwrap();
        assert!(asm.contains("\ndeck$rbx:\n"));
        assert!(asm.contains("\tmov     rax, deck$rbx\n"));
        assert!(!asm.contains("\tmov     rax, rbx\n"));

        let asm = compile("1 :: my-func my-func . :: main", &Config::default()).unwrap();
        assert!(asm.contains("\ndeck$my$2dfunc:\n"));
        assert!(asm.contains("\tmov     rax, deck$my$2dfunc\n"));

        let text = "$def _start 1 :: __deck_deq_push __deck_deq_push . :: main";
        let asm = compile(text, &Config::default()).unwrap();
        assert_eq!(asm.matches("\n_start:\n").count(), 1);
        assert_eq!(asm.matches("\n__deck_deq_push:\n").count(), 1);
        assert!(asm.contains("deck$_start:\n"));
        assert!(asm.contains("\ndeck$__deck_deq_push:\n"));
    }

    #[test]
    fn externals_keep_their_names() {
        let asm = compile("$decl my_puts $addr my_puts my_puts :: main", &Config::default()).unwrap();
        assert!(asm.contains("extern my_puts\n"));
        assert!(asm.contains("\tmov     rax, my_puts\n"));
        assert!(asm.contains("\tcall    my_puts\n"));
        assert!(!asm.contains("deck$my_puts"));
    }

    #[test]
    fn data_strings() {
        assert_eq!(data_bytes(""), "0");
        assert_eq!(data_bytes("a\nb"), "\"a\", 10, \"b\", 0");
    }
}
