//! Punto de entrada ("driver").
//!
//! Este módulo orquesta las diferentes fases del proceso de
//! compilación y expone una CLI.

use anyhow::{self, Context};
use clap::{self, crate_version, Arg, Command};
use deckc::{
    config::{Config, Options, DEFAULT_ENTRY},
    dump,
    error::{Diagnostics, Report},
    frontend,
    source::Source,
    target,
};

use std::{
    fs::File,
    io::{self, Write},
    process,
};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    // Parsing de CLI
    let args = Command::new("deck compiler")
        .version(crate_version!())
        .arg(
            Arg::new("input")
                .value_name("INPUT")
                .help("Source file ('-' or absent for stdin)"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .takes_value(true)
                .value_name("FILE")
                .help("Output file ('-' or absent for stdout)"),
        )
        .arg(
            Arg::new("emit")
                .long("emit")
                .takes_value(true)
                .value_name("FORMAT")
                .default_value("asm")
                .possible_values(["asm", "tape", "dot"])
                .help("Kind of output to generate"),
        )
        .arg(
            Arg::new("entry")
                .long("entry")
                .takes_value(true)
                .value_name("NAME")
                .default_value(DEFAULT_ENTRY)
                .help("Entry point function"),
        )
        .arg(
            Arg::new("keep-dead")
                .long("keep-dead")
                .help("Do not remove unreachable functions"),
        )
        .arg(
            Arg::new("direct-refs")
                .long("direct-refs")
                .help("Only remove functions without direct references"),
        )
        .get_matches();

    // Se extraen argumentos necesarios
    let mut options = Options::empty();
    if args.is_present("keep-dead") {
        options |= Options::KEEP_DEAD;
    }

    if args.is_present("direct-refs") {
        options |= Options::DIRECT_REFS;
    }

    let config = Config::default()
        .with_entry(args.value_of("entry").unwrap_or(DEFAULT_ENTRY))
        .with_options(options);

    let source = match args.value_of("input") {
        None | Some("-") => Source::read(io::stdin(), "<stdin>").context("Failed to read stdin")?,
        Some(path) => {
            let file =
                File::open(path).with_context(|| format!("Failed to open for reading: {}", path))?;

            Source::read(file, path).with_context(|| format!("Failed to read: {}", path))?
        }
    };

    // Nada se escribe a menos que la compilación complete exitosamente
    let mut buffer = Vec::new();
    let result = frontend(&source, &config).and_then(|(mut tape, cx)| {
        match args.value_of("emit").unwrap_or("asm") {
            "tape" => dump::tape(&mut tape, &mut buffer),
            "dot" => dump::dot(&cx, &mut tape, &mut buffer),
            _ => target::emit(&cx, &mut tape, &config, &mut buffer),
        }
    });

    if let Err(report) = result {
        fail(report);
    }

    match args.value_of("output") {
        None | Some("-") => io::stdout()
            .write_all(&buffer)
            .context("Failed to write to stdout")?,

        Some(path) => {
            let mut file = File::create(path)
                .with_context(|| format!("Failed to open for writing: {}", path))?;

            file.write_all(&buffer)
                .with_context(|| format!("Failed to write to file: {}", path))?;
        }
    };

    Ok(())
}

fn fail(report: Report) -> ! {
    let diagnostics = if report.is_internal() {
        log::error!("{} (this is a compiler bug)", report);
        Diagnostics::from(report).kind("internal compiler error")
    } else {
        Diagnostics::from(report)
    };

    eprint!("{}", diagnostics);
    process::exit(1)
}
