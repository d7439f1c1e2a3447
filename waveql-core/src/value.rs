//! Runtime values of the query language
//!
//! Everything an expression can evaluate to is a [`Value`]. Function values
//! are a closed tagged union ([`Closure`]): either a built-in operator used in
//! function position, or a user-defined lambda with its captured environment.
//! Operator handlers match on these variants exhaustively and reject anything
//! else with a typed error instead of assuming list structure.

use std::collections::BTreeMap;
use std::fmt;

use hashbrown::HashMap;

use crate::expr::{BuiltinOp, Expr};

/// A captured lexical environment: the bindings visible at closure creation.
pub type Env = HashMap<String, Value>;

/// A runtime value.
#[derive(Clone, Debug, PartialEq, derive_more::From)]
pub enum Value {
    /// The "no value produced" sentinel.
    ///
    /// Distinct from every ordinary value; `whenever` returns this when its
    /// condition never held before a trace ended.
    #[from(ignore)]
    Unit,
    /// A boolean value.
    Bool(bool),
    /// A signed integer sample or literal.
    Int(i64),
    /// A symbol, typically naming a signal in the trace set.
    Symbol(String),
    /// A list of values, e.g. the indices reported by `find`.
    List(Vec<Value>),
    /// A per-trace mapping, e.g. one row of `find-global`'s result over
    /// multiple traces.
    Record(BTreeMap<String, Value>),
    /// A callable function value.
    Closure(Closure),
}

impl Value {
    /// Truthiness of a value as seen by condition-driven operators.
    ///
    /// `Unit`, `false`, `0`, and empty collections are false; every other
    /// value is true.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Unit => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Symbol(_) | Value::Closure(_) => true,
            Value::List(items) => !items.is_empty(),
            Value::Record(fields) => !fields.is_empty(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => write!(f, "()"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Symbol(name) => write!(f, "{}", name),
            Value::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
            Value::Record(fields) => {
                write!(f, "{{")?;
                for (i, (key, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "}}")
            }
            Value::Closure(closure) => write!(f, "{}", closure),
        }
    }
}

/// A callable function value.
///
/// The two variants are the only callable shapes the language knows;
/// `apply_closure` matches on them exhaustively.
#[derive(Clone, Debug, PartialEq)]
pub enum Closure {
    /// A built-in operator used as a prefix function, e.g. `+` passed to
    /// `fold/signal`.
    Builtin(BuiltinOp),
    /// A user-defined lambda: parameter list, body expression, and the
    /// environment captured at creation.
    Lambda {
        params: Vec<String>,
        body: Box<Expr>,
        env: Env,
    },
}

impl fmt::Display for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Closure::Builtin(op) => write!(f, "#<builtin {}>", op),
            Closure::Lambda { params, .. } => write!(f, "#<lambda/{}>", params.len()),
        }
    }
}
