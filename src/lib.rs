//! A pure Lisp with dynamically scoped named `let`.
//!
//! Atoms and pairs live in one append-only slot [`arena::Arena`] that is
//! reset wholesale between top-level evaluations. The [`eval::Machine`] owns
//! the arena and evaluates against an [`env::Env`] association list, resolving
//! free variables in the caller's environment at call time.

pub mod arena;
pub mod config;
pub mod env;
pub mod error;
pub mod eval;
pub mod primitives;
pub mod printer;
pub mod reader;
pub mod stream;
pub mod symbol;
pub mod value;

pub use config::{Config, UnboundPolicy};
pub use env::Env;
pub use error::{LispError, LispResult};
pub use eval::Machine;
pub use value::{Handle, Slot, Value};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
