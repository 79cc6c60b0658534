//! Volcados de diagnóstico de la cinta.
//!
//! Ninguno de estos formatos es necesario para compilar; existen para
//! inspeccionar el resultado de las fases desde la CLI.

use std::{
    fmt::Display,
    io::{self, Write},
};

use crate::{
    error::Report,
    ir::{Kind, Tape},
    semantic::{self, Context, Pass, Semantic},
};

/// Listado indentado del árbol de bloques.
pub fn tape<W: Write>(tape: &mut Tape, output: &mut W) -> Semantic<()> {
    semantic::run(&mut Printer { output, depth: 0 }, tape)
}

/// Grafo de Graphviz: un cluster por función, con aristas de `refs`.
pub fn dot<W: Write>(cx: &Context, tape: &mut Tape, output: &mut W) -> Semantic<()> {
    semantic::run(
        &mut Dot {
            cx,
            output,
            record: String::new(),
            clusters: 0,
        },
        tape,
    )
}

struct Printer<'a, W> {
    output: &'a mut W,
    depth: usize,
}

impl<W: Write> Printer<'_, W> {
    fn line(&mut self, kind: Kind, text: &dyn Display) -> io::Result<()> {
        writeln!(self.output, "{:indent$}{} {}", "", kind, text, indent = 2 * self.depth)
    }
}

impl<W: Write> Pass for Printer<'_, W> {
    fn visit(&mut self, tape: &mut Tape, at: usize) -> Semantic<usize> {
        let symbol = tape[at].clone();
        let io = |error: io::Error| Report::new(error, symbol.location().clone());

        self.line(symbol.kind(), symbol.text()).map_err(io)?;
        if !symbol.kind().is_opener() {
            return Ok(at + 1);
        }

        self.depth += 1;
        let next = self.block(tape, at)?;
        self.depth -= 1;

        let end = &tape[next - 1];
        self.line(end.kind(), end.text()).map_err(io)?;

        Ok(next)
    }
}

struct Dot<'a, W> {
    cx: &'a Context,
    output: &'a mut W,
    record: String,
    clusters: usize,
}

impl<W: Write> Dot<'_, W> {
    fn header(&mut self) -> io::Result<()> {
        writeln!(self.output, "digraph G {{")?;
        writeln!(
            self.output,
            "  node [shape=record style=filled fontsize=10 fontname=\"monospace\" fillcolor=\"#bfbfbf\"]"
        )?;
        writeln!(
            self.output,
            "  graph [style=filled fontsize=10 fontname=\"monospace\" fillcolor=\"#efefef\"]"
        )?;
        writeln!(
            self.output,
            "  edge [fontsize=10 fontname=\"monospace\" arrowsize=0.5]"
        )
    }

    fn footer(&mut self) -> io::Result<()> {
        for (from, targets) in &self.cx.refs {
            for target in targets {
                writeln!(self.output, "  \"n_{}\" -> \"n_{}\"", quoted(from), quoted(target))?;
            }
        }

        writeln!(self.output, "}}")
    }

    fn cluster(&mut self, name: &str) -> io::Result<()> {
        let code = std::mem::take(&mut self.record);
        let index = self.clusters;
        self.clusters += 1;

        writeln!(self.output, "  subgraph cluster_{} {{", index)?;
        let name = quoted(name);
        writeln!(self.output, "    label=\"{}\"", name)?;
        writeln!(self.output, "    \"n_{}\" [label=\"{{{}}}\"]", name, code)?;
        writeln!(self.output, "  }}")
    }
}

impl<W: Write> Pass for Dot<'_, W> {
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
                self.record.clear();
                let next = self.block(tape, at)?;
                self.cluster(symbol.text()).map_err(io)?;

                Ok(next)
            }

            kind if kind.is_opener() => {
                self.push(&format!("{} {}", kind, symbol.text()));
                let next = self.block(tape, at)?;
                self.push("End");

                Ok(next)
            }

            kind if kind.is_builtin() || kind == Kind::Call => {
                self.push(&kind.to_string());
                Ok(at + 1)
            }

            kind => {
                self.push(&format!("{} {}", kind, symbol.text()));
                Ok(at + 1)
            }
        }
    }
}

impl<W> Dot<'_, W> {
    /// Agrega una línea, alineada a la izquierda, al registro actual.
    fn push(&mut self, line: &str) {
        for c in line.chars() {
            if matches!(c, '{' | '}' | '|' | '<' | '>' | '"' | '\\') {
                self.record.push('\\');
            }

            self.record.push(c);
        }

        self.record.push_str("\\l");
    }
}

/// Escapa un nombre para un ID entre comillas de Graphviz.
fn quoted(name: &str) -> String {
    name.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::Config, frontend, source::Source};

    #[test]
    fn printed_tapes_are_indented() {
        let (mut tape, _) =
            frontend(&Source::new("test", "[ 1 ] :: main"), &Config::default()).unwrap();

        let mut output = Vec::new();
        super::tape(&mut tape, &mut output).unwrap();

        assert_eq!(
            String::from_utf8(output).unwrap(),
            "Program test\n\
             \x20 Function main\n\
             \x20   Mark [\n\
             \x20     Integer 1\n\
             \x20   End [\n\
             \x20 End main\n\
             End test\n"
        );
    }

    #[test]
    fn dot_has_a_cluster_per_function() {
        let source = Source::new("test", "{ 1 } . :: helper helper :: main");
        let (mut tape, cx) = frontend(&source, &Config::default()).unwrap();

        let mut output = Vec::new();
        dot(&cx, &mut tape, &mut output).unwrap();
        let graph = String::from_utf8(output).unwrap();

        assert!(graph.starts_with("digraph G {\n"));
        assert!(graph.ends_with("}\n"));
        assert_eq!(graph.matches("subgraph cluster_").count(), 3);
        assert!(graph.contains("\"n_main\" -> \"n_helper\"\n"));
        assert!(graph.contains("\"n_helper\" -> \"n____fn_0\"\n"));
        assert!(graph.contains("[label=\"{Address ___fn_0\\lGo\\l}\"]"));
    }

    #[test]
    fn dot_names_are_escaped() {
        let source = Source::new("test", "1 :: a\"b a\"b . :: main");
        let (mut tape, cx) = frontend(&source, &Config::default()).unwrap();

        let mut output = Vec::new();
        dot(&cx, &mut tape, &mut output).unwrap();
        let graph = String::from_utf8(output).unwrap();

        assert!(graph.contains("    label=\"a\\\"b\"\n"));
        assert!(graph.contains("\"n_main\" -> \"n_a\\\"b\"\n"));
    }
}
