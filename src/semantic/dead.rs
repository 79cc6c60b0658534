//! Eliminación de funciones muertas.
//!
//! Por defecto sobrevive toda función alcanzable desde el punto de
//! entrada a través de `refs`. Con [`Options::DIRECT_REFS`] solo se
//! eliminan las funciones que nadie referencia directamente.

use std::{collections::BTreeSet, rc::Rc};

use log::{debug, info, warn};

use super::{Context, Definition, Refs, Semantic};
use crate::{
    config::{Config, Options},
    ir::Tape,
};

/// Elimina de la cinta toda función que no sobreviva.
pub fn eliminate(cx: &mut Context, tape: &mut Tape, config: &Config) -> Semantic<()> {
    if config.options.contains(Options::KEEP_DEAD) {
        debug!("dead function elimination is disabled");
        return Ok(());
    }

    let entry = config.entry.as_str();
    if cx.symbols.get(entry) != Some(&Definition::Function) {
        warn!("entry point `{}` is not defined, no function will be removed", entry);
        return Ok(());
    }

    let live = if config.options.contains(Options::DIRECT_REFS) {
        referenced(&cx.refs, entry)
    } else {
        reachable(&cx.refs, entry)
    };

    let dead: Vec<Rc<str>> = cx
        .ranges
        .iter()
        .map(|(name, _)| name)
        .filter(|&name| !live.contains(name))
        .cloned()
        .collect();

    for name in dead {
        if let Some(range) = cx.ranges.excise(&name) {
            info!("removing unreferenced function `{}`", name);

            tape.excise(range);
            cx.refs.remove(&name);
            cx.symbols.remove_function(&name);
        }
    }

    Ok(())
}

/// Funciones alcanzables desde `entry`, incluyéndola.
fn reachable(refs: &Refs, entry: &str) -> BTreeSet<Rc<str>> {
    let mut live = BTreeSet::new();
    let mut pending: Vec<Rc<str>> = vec![entry.into()];

    while let Some(name) = pending.pop() {
        if live.contains(&name) {
            continue;
        }

        if let Some(targets) = refs.get(&name) {
            pending.extend(targets.iter().filter(|&target| !live.contains(target)).cloned());
        }

        live.insert(name);
    }

    live
}

/// Funciones con al menos una referencia directa, más `entry`.
///
/// Se invierte el grafo y sobreviven las llaves del grafo invertido.
fn referenced(refs: &Refs, entry: &str) -> BTreeSet<Rc<str>> {
    let mut inverted = Refs::new();
    inverted.entry(entry.into()).or_default();

    for (from, targets) in refs {
        for target in targets {
            inverted
                .entry(Rc::clone(target))
                .or_default()
                .insert(Rc::clone(from));
        }
    }

    inverted.into_keys().collect()
}
