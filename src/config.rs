//! Parámetros de una compilación.

use bitflags::bitflags;

/// Nombre por defecto del punto de entrada.
pub const DEFAULT_ENTRY: &str = "main";

bitflags! {
    /// Opciones que alteran las fases de transformación.
    pub struct Options: u32 {
        /// Omitir la eliminación de funciones muertas.
        const KEEP_DEAD = 0x01;

        /// Eliminar únicamente funciones sin referencias directas,
        /// en vez de calcular alcanzabilidad transitiva desde el
        /// punto de entrada. Una función referida solo por otra
        /// función muerta sobrevive en este modo.
        const DIRECT_REFS = 0x02;
    }
}

/// Configuración completa de una compilación.
#[derive(Debug, Clone)]
pub struct Config {
    /// Función que invoca `_start` y que nunca se elimina.
    pub entry: String,
    pub options: Options,
}

impl Config {
    pub fn with_entry<S: Into<String>>(self, entry: S) -> Self {
        Config {
            entry: entry.into(),
            ..self
        }
    }

    pub fn with_options(self, options: Options) -> Self {
        Config { options, ..self }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            entry: String::from(DEFAULT_ENTRY),
            options: Options::empty(),
        }
    }
}
