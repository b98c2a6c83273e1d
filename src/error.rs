use std::io;

use thiserror::Error;

/// Errors raised while reading, evaluating or printing.
///
/// Read faults and evaluation faults are recoverable: the session can be
/// reset and the next top-level expression evaluated. Fatal errors end the
/// session. `Exit` is not a failure at all: it is the request raised by the
/// `exit` special form, carried on the error channel so it unwinds every
/// pending evaluation.
#[derive(Debug, Error)]
pub enum LispError {
    /// Input ended inside a list or after a quote.
    #[error("Read error: unexpected end of input")]
    UnexpectedEof,

    /// A `)` with no list open.
    #[error("Read error: unexpected ')'")]
    UnexpectedCloseParen,

    /// An atom longer than the token buffer.
    #[error("Read error: token longer than {limit} bytes")]
    TokenTooLong { limit: usize },

    /// Unbound variable (only under the strict lookup policy).
    #[error("Error: unbound variable '{0}'")]
    Unbound(String),

    /// An arithmetic operand that is not a decimal integer.
    #[error("Error: malformed numeral '{0}'")]
    MalformedNumeral(String),

    /// Call position held something that is neither a primitive nor a `fn` form.
    #[error("Error: cannot apply {0}")]
    NotAFunction(String),

    /// A primitive received a value of the wrong kind.
    #[error("Type error: {0}")]
    TypeMismatch(String),

    #[error("Error: division by zero")]
    DivisionByZero,

    #[error("Error: arithmetic overflow")]
    ArithmeticOverflow,

    /// The printer only understands proper lists.
    #[error("Error: cannot print an improper list")]
    ImproperList,

    /// Atom text must be non-empty and free of the terminator byte.
    #[error("Error: invalid atom text")]
    InvalidAtom,

    /// A handle issued before the last arena reset.
    #[error("Error: stale handle {index} (epoch {epoch}, arena is at epoch {current})")]
    StaleHandle { index: u32, epoch: u32, current: u32 },

    /// Arena capacity exceeded. Fatal.
    #[error("arena exhausted ({capacity} slots)")]
    ArenaExhausted { capacity: usize },

    /// Evaluation nested deeper than the configured limit. Fatal.
    #[error("evaluation depth limit of {0} exceeded")]
    DepthExceeded(usize),

    /// `(exit)` was evaluated.
    #[error("exit requested")]
    Exit,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl LispError {
    /// True for errors that must end the session.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            LispError::ArenaExhausted { .. } | LispError::DepthExceeded(_)
        )
    }

    pub fn is_exit(&self) -> bool {
        matches!(self, LispError::Exit)
    }

    /// True for faults raised by the reader.
    pub fn is_read_error(&self) -> bool {
        matches!(
            self,
            LispError::UnexpectedEof
                | LispError::UnexpectedCloseParen
                | LispError::TokenTooLong { .. }
        )
    }
}

pub type LispResult<T> = Result<T, LispError>;
