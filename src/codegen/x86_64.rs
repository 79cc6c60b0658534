//! Secuencias de instrucciones x86-64 (sintaxis NASM).
//!
//! Convenciones de la máquina:
//! - `rax` es el acumulador, es decir, el tope de la pila de datos.
//! - El resto de la pila de datos vive en la pila de hardware.
//! - `rbp` es la base del workspace actual (`[ ... ]`).
//! - `r15` es una pila auxiliar, creciendo hacia abajo, que guarda
//!   direcciones de retorno y valores de `let`.
//! - `rbx`, `rcx`, `rdx`, `r8` y `r11` son temporales.
//!
//! # Workspaces
//! Al abrir un workspace el acumulador externo se empuja antes que el
//! `rbp` anterior, por lo que el primer valor cargado adentro empuja
//! de nuevo ese acumulador a `[rbp - 8]`. Ese slot no pertenece al
//! workspace. Con `n` elementos:
//!
//! ```text
//! [rbp + 8]            acumulador externo
//! [rbp]                rbp anterior
//! [rbp - 8]            copia del acumulador externo
//! [rbp - 16 - 8 * i]   elemento i, para 0 <= i < n - 1
//! rax                  elemento n - 1 (tope)
//! ```
//!
//! Así `rsp = rbp - 8 * n` y `#` es `(rbp - rsp) / 8`.

use crate::ir::Kind;

/// Espacio de la pila auxiliar, en palabras de 8 bytes.
pub const AUX_WORDS: usize = 4096;

/// Apertura de un workspace.
pub const MARK: &[(&str, &str)] = &[("push", "rax"), ("push", "rbp"), ("mov", "rbp, rsp")];

/// Cierre de un workspace; el tope queda en el acumulador.
pub const UNMARK: &[(&str, &str)] = &[("mov", "rsp, rbp"), ("pop", "rbp")];

/// Tabla literal de primitivas: clase de símbolo a `(opcode, operandos)`.
pub const PRIMITIVES: &[(Kind, &[(&str, &str)])] = &[
    (Kind::Go, &[("mov", "rbx, rax"), ("pop", "rax"), ("call", "rbx")]),
    (
        Kind::Count,
        &[
            ("mov", "rbx, rbp"),
            ("sub", "rbx, rsp"),
            ("shr", "rbx, 3"),
            ("push", "rax"),
            ("mov", "rax, rbx"),
        ],
    ),
    (Kind::Word, &[("mov", "rax, [rax]")]),
    (Kind::Byte, &[("movzx", "rax, byte [rax]")]),
    (
        Kind::Choose,
        &[
            ("pop", "rbx"),
            ("pop", "rcx"),
            ("test", "rcx, rcx"),
            ("cmovnz", "rax, rbx"),
        ],
    ),
    (Kind::DeqPush, &[("call", "__deck_deq_push")]),
    (Kind::DeqPop, &[("call", "__deck_deq_pop")]),
    (Kind::Pop, &[("pop", "rax")]),
    (Kind::Dup, &[("push", "rax")]),
    (Kind::Get, &[("neg", "rax"), ("mov", "rax, [rbp + rax * 8 - 16]")]),
    (
        Kind::Set,
        &[
            ("mov", "rcx, rax"),
            ("pop", "rbx"),
            ("neg", "rcx"),
            ("mov", "[rbp + rcx * 8 - 16], rbx"),
            ("pop", "rax"),
        ],
    ),
    (Kind::Add, &[("pop", "rbx"), ("add", "rax, rbx")]),
    (Kind::Sub, &[("mov", "rbx, rax"), ("pop", "rax"), ("sub", "rax, rbx")]),
    (Kind::Mul, &[("pop", "rbx"), ("imul", "rax, rbx")]),
    (
        Kind::Div,
        &[("mov", "rbx, rax"), ("pop", "rax"), ("cqo", ""), ("idiv", "rbx")],
    ),
    (
        Kind::Mod,
        &[
            ("mov", "rbx, rax"),
            ("pop", "rax"),
            ("cqo", ""),
            ("idiv", "rbx"),
            ("mov", "rax, rdx"),
        ],
    ),
    (Kind::Shl, &[("mov", "rcx, rax"), ("pop", "rax"), ("shl", "rax, cl")]),
    (Kind::Shr, &[("mov", "rcx, rax"), ("pop", "rax"), ("sar", "rax, cl")]),
    (Kind::And, &[("pop", "rbx"), ("and", "rax, rbx")]),
    (Kind::Or, &[("pop", "rbx"), ("or", "rax, rbx")]),
    (Kind::Xor, &[("pop", "rbx"), ("xor", "rax, rbx")]),
    (Kind::Not, &[("not", "rax")]),
    (
        Kind::Cmp,
        &[
            ("pop", "rbx"),
            ("cmp", "rbx, rax"),
            ("setg", "al"),
            ("setl", "cl"),
            ("movzx", "rax, al"),
            ("movzx", "rcx, cl"),
            ("sub", "rax, rcx"),
        ],
    ),
    (Kind::Eq, &[("pop", "rbx"), ("cmp", "rbx, rax"), ("sete", "al"), ("movzx", "rax, al")]),
    (Kind::Ne, &[("pop", "rbx"), ("cmp", "rbx, rax"), ("setne", "al"), ("movzx", "rax, al")]),
    (Kind::Lt, &[("pop", "rbx"), ("cmp", "rbx, rax"), ("setl", "al"), ("movzx", "rax, al")]),
    (Kind::Gt, &[("pop", "rbx"), ("cmp", "rbx, rax"), ("setg", "al"), ("movzx", "rax, al")]),
    (Kind::Le, &[("pop", "rbx"), ("cmp", "rbx, rax"), ("setle", "al"), ("movzx", "rax, al")]),
    (Kind::Ge, &[("pop", "rbx"), ("cmp", "rbx, rax"), ("setge", "al"), ("movzx", "rax, al")]),
];

/// Rutinas de soporte para las operaciones de deque.
///
/// `>|` mueve el tope al fondo del workspace (`[rbp - 16]`); `|>` trae
/// el fondo al tope. Con menos de dos elementos ninguna hace nada.
pub const RUNTIME: &str = "\
__deck_deq_push:
\tpop     r11
\tlea     rdx, [rbp - 16]
\tcmp     rsp, rdx
\tja      .done
\tmov     rbx, rax
\tmov     rax, [rsp]
\tmov     rcx, rsp
.shift:
\tcmp     rcx, rdx
\tjae     .bottom
\tmov     r8, [rcx + 8]
\tmov     [rcx], r8
\tadd     rcx, 8
\tjmp     .shift
.bottom:
\tmov     [rdx], rbx
.done:
\tjmp     r11

__deck_deq_pop:
\tpop     r11
\tlea     rdx, [rbp - 16]
\tcmp     rsp, rdx
\tja      .done
\tmov     rbx, [rdx]
\tmov     rcx, rdx
.shift:
\tcmp     rcx, rsp
\tjbe     .top
\tmov     r8, [rcx - 8]
\tmov     [rcx], r8
\tsub     rcx, 8
\tjmp     .shift
.top:
\tmov     [rsp], rax
\tmov     rax, rbx
.done:
\tjmp     r11
";

/// Nombre en ensamblador de una función o etiqueta del programa.
///
/// Todo nombre recibe el prefijo `deck$`, y cada byte fuera de
/// `[A-Za-z0-9_]` se escribe como `$` seguido de dos dígitos
/// hexadecimales. Así ningún nombre choca con registros, con el
/// runtime ni con externos, que se emiten sin cambios.
pub fn mangle(name: &str) -> String {
    let mut mangled = String::from("deck$");
    for byte in name.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'_' {
            mangled.push(byte as char);
        } else {
            mangled.push_str(&format!("${:02x}", byte));
        }
    }

    mangled
}

/// Busca la secuencia de una primitiva.
pub fn primitive(kind: Kind) -> Option<&'static [(&'static str, &'static str)]> {
    PRIMITIVES
        .iter()
        .find(|&&(primitive, _)| primitive == kind)
        .map(|&(_, sequence)| sequence)
}
