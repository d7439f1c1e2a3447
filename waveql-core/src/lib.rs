//! # `waveql-core`
//!
//! This crate provides the core functionality or interfaces for the other
//! WaveQL components. Mainly, the crate provides:
//!
//! 1. The value model of the query language, including closure values (see
//!    [`value`]).
//! 2. Expression tree nodes consumed by the evaluator, along with the built-in
//!    and temporal operator identifiers (see [`expr`]).
//! 3. A list of possible errors any component in WaveQL can generate (see
//!    [`enum@Error`]).

pub mod expr;
pub mod prelude;
pub mod value;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Wrong number of arguments for a temporal operator, built-in operator,
    /// or closure application.
    ///
    /// This is always reported before any trace cursor is mutated.
    #[error("{op}: expects {expected} argument(s), got {got}")]
    Arity {
        op: &'static str,
        expected: String,
        got: usize,
    },
    /// A value used in function position is not a callable closure.
    #[error("{op}: not a valid function")]
    NotCallable { op: &'static str },
    /// A value expected to name a signal is not a symbol.
    #[error("{op}: last argument must be a signal")]
    NotASignal { op: &'static str },
    /// A named signal is missing from the trace set.
    #[error("signal \"{name}\" not found")]
    SignalNotPresent { name: String },
    /// A symbol resolves to neither a lexical binding nor a signal.
    #[error("unbound symbol \"{name}\"")]
    UnboundSymbol { name: String },
    /// A trace was read at a cursor past its last sample.
    #[error("trace \"{tid}\": cursor {index} out of bounds (length {len})")]
    CursorOutOfBounds { tid: String, index: usize, len: usize },
    /// A built-in operator was applied to operands of the wrong shape.
    #[error("invalid operation: {reason}")]
    InvalidOperation { reason: &'static str },
}

pub type WaveqlError = Error;
pub type WaveqlResult<T> = Result<T, Error>;
