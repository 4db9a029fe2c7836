//! NovaIR DSL - lexer, parser, and pretty-printer for the NovaIR control
//! runtime description language.
//!
//! The DSL declares the `state`, `constraints`, `objectives`, `actions`, and
//! `tick` sections a [`novair_core`] consumer needs to drive a closed-loop
//! decision engine.
//!
//! Architecture:
//! ```text
//! DSL source (.novair file)
//!     ↓
//! Lexer (indentation-sensitive tokenizer)
//!     ↓
//! Parser (recursive descent, one-token lookahead) -> System AST
//!     ↓
//! Validator (non-fatal semantic checks) -> Vec<ValidationError>
//!     ↓
//! Pretty-printer (canonical re-emission, used for round-trip tests)
//! ```

pub mod lexer;
pub mod parser;
pub mod pretty_printer;

pub use lexer::*;
pub use parser::*;
pub use pretty_printer::{pretty_print, round_trip};
