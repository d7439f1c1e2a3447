pub use crate::expr::{BuiltinOp, Expr, TemporalOp};
pub use crate::value::{Closure, Env, Value};
pub use crate::{Error, WaveqlError, WaveqlResult};
