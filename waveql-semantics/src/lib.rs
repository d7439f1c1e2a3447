//! WaveQL temporal semantics
//!
//! In this crate, we are predominantly concerned with querying _offline
//! waveform traces_, i.e., collections of named, independently-clocked sample
//! timelines extracted from a simulator or recorded execution. It provides:
//!
//! 1. [`Trace`] and [`TraceSet`]: cursor-bearing timelines and the aggregate
//!    that owns their cursors.
//! 2. [`Evaluator`]: evaluates expression nodes against the current cursor
//!    state of the trace set it owns.
//! 3. [`temporal`]: the five temporal operators (`find`, `find-global`,
//!    `whenever`, `fold/signal`, `count`) and their dispatch table.

pub mod eval;
pub mod temporal;
pub mod trace;

pub use eval::Evaluator;
pub use trace::{Trace, TraceSet};
