//! Expression tree for WaveQL queries
//!
//! The surface parser is an external collaborator; this module defines the
//! nodes the evaluator consumes. The important distinction encoded here is
//! between an unevaluated source expression ([`Expr`]) and an
//! already-evaluated value injected verbatim ([`Expr::Quoted`]): temporal
//! operators re-enter the evaluator with computed values, and those must not
//! be re-interpreted as syntax.

use std::fmt;

use crate::value::Value;
use crate::{Error, WaveqlResult};

/// A single expression node.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// A self-evaluating literal.
    Lit(Value),
    /// A symbol; resolves to a lexical binding or to a signal read at the
    /// owning trace's current cursor.
    Symbol(String),
    /// An already-evaluated value, returned unchanged by the evaluator.
    Quoted(Value),
    /// A lambda form; evaluates to a [`Closure`](crate::value::Closure)
    /// capturing the current environment.
    Lambda { params: Vec<String>, body: Box<Expr> },
    /// Application of a built-in operator to argument expressions.
    Call { op: BuiltinOp, args: Vec<Expr> },
    /// A temporal operator call.
    ///
    /// The arguments are handed to the operator handler *unevaluated*; the
    /// handler controls evaluation order and timing since cursor state changes
    /// between evaluations of the same expression.
    Temporal { op: TemporalOp, args: Vec<Expr> },
}

impl Expr {
    /// An integer literal.
    pub fn int(value: i64) -> Self {
        Expr::Lit(Value::Int(value))
    }

    /// A boolean literal.
    pub fn bool(value: bool) -> Self {
        Expr::Lit(Value::Bool(value))
    }

    /// A symbol reference.
    pub fn symbol(name: impl Into<String>) -> Self {
        Expr::Symbol(name.into())
    }

    /// Wrap an already-evaluated value for re-injection into an evaluation.
    pub fn quoted(value: Value) -> Self {
        Expr::Quoted(value)
    }

    /// A lambda form.
    pub fn lambda<I, S>(params: I, body: Expr) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Expr::Lambda {
            params: params.into_iter().map(Into::into).collect(),
            body: Box::new(body),
        }
    }

    /// A built-in operator application.
    pub fn call(op: BuiltinOp, args: Vec<Expr>) -> Self {
        Expr::Call { op, args }
    }

    /// A temporal operator call with unevaluated arguments.
    pub fn temporal(op: TemporalOp, args: Vec<Expr>) -> Self {
        Expr::Temporal { op, args }
    }
}

/// Built-in operators usable both in call position and as function values.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BuiltinOp {
    /// Variadic integer addition.
    Add,
    /// Integer subtraction.
    Sub,
    /// Variadic integer multiplication.
    Mul,
    /// Structural equality.
    Eq,
    /// Structural inequality.
    Ne,
    /// Integer less-than.
    Lt,
    /// Integer less-than-or-equal.
    Le,
    /// Integer greater-than.
    Gt,
    /// Integer greater-than-or-equal.
    Ge,
    /// Logical conjunction over truthiness.
    And,
    /// Logical disjunction over truthiness.
    Or,
    /// Logical negation.
    Not,
}

impl BuiltinOp {
    /// The operator's surface name.
    pub const fn name(&self) -> &'static str {
        use BuiltinOp::*;
        match self {
            Add => "+",
            Sub => "-",
            Mul => "*",
            Eq => "=",
            Ne => "!=",
            Lt => "<",
            Le => "<=",
            Gt => ">",
            Ge => ">=",
            And => "and",
            Or => "or",
            Not => "not",
        }
    }

    /// Apply the operator to already-evaluated arguments.
    ///
    /// This is the prefix-form application used both by `Call` nodes and by
    /// [`Closure::Builtin`](crate::value::Closure) values invoked through the
    /// evaluator's apply path.
    pub fn apply(&self, args: &[Value]) -> WaveqlResult<Value> {
        use BuiltinOp::*;
        match self {
            Add => self.fold_ints(args, i64::checked_add),
            Mul => self.fold_ints(args, i64::checked_mul),
            Sub => {
                let (lhs, rhs) = self.binary_ints(args)?;
                lhs.checked_sub(rhs).map(Value::Int).ok_or_else(overflow)
            }
            Eq => {
                let (lhs, rhs) = self.binary(args)?;
                Ok(Value::Bool(lhs == rhs))
            }
            Ne => {
                let (lhs, rhs) = self.binary(args)?;
                Ok(Value::Bool(lhs != rhs))
            }
            Lt => {
                let (lhs, rhs) = self.binary_ints(args)?;
                Ok(Value::Bool(lhs < rhs))
            }
            Le => {
                let (lhs, rhs) = self.binary_ints(args)?;
                Ok(Value::Bool(lhs <= rhs))
            }
            Gt => {
                let (lhs, rhs) = self.binary_ints(args)?;
                Ok(Value::Bool(lhs > rhs))
            }
            Ge => {
                let (lhs, rhs) = self.binary_ints(args)?;
                Ok(Value::Bool(lhs >= rhs))
            }
            And => Ok(Value::Bool(args.iter().all(Value::is_truthy))),
            Or => Ok(Value::Bool(args.iter().any(Value::is_truthy))),
            Not => {
                if args.len() != 1 {
                    return Err(Error::Arity {
                        op: self.name(),
                        expected: "exactly 1".into(),
                        got: args.len(),
                    });
                }
                Ok(Value::Bool(!args[0].is_truthy()))
            }
        }
    }

    fn fold_ints(
        &self,
        args: &[Value],
        f: impl Fn(i64, i64) -> Option<i64>,
    ) -> WaveqlResult<Value> {
        let mut ints = args.iter().map(|arg| self.as_int(arg));
        let first = ints.next().ok_or(Error::Arity {
            op: self.name(),
            expected: "at least 1".into(),
            got: 0,
        })??;
        ints.try_fold(first, |acc, n| f(acc, n?).ok_or_else(overflow))
            .map(Value::Int)
    }

    fn binary<'a>(&self, args: &'a [Value]) -> WaveqlResult<(&'a Value, &'a Value)> {
        match args {
            [lhs, rhs] => Ok((lhs, rhs)),
            _ => Err(Error::Arity {
                op: self.name(),
                expected: "exactly 2".into(),
                got: args.len(),
            }),
        }
    }

    fn binary_ints(&self, args: &[Value]) -> WaveqlResult<(i64, i64)> {
        let (lhs, rhs) = self.binary(args)?;
        Ok((self.as_int(lhs)?, self.as_int(rhs)?))
    }

    fn as_int(&self, value: &Value) -> WaveqlResult<i64> {
        match value {
            Value::Int(n) => Ok(*n),
            _ => Err(Error::InvalidOperation {
                reason: "numeric operator applied to a non-integer operand",
            }),
        }
    }
}

fn overflow() -> Error {
    Error::InvalidOperation {
        reason: "integer arithmetic overflow",
    }
}

impl fmt::Display for BuiltinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The five temporal operators.
///
/// These identifiers key the dispatch table consumed by the surface-language
/// dispatcher; [`name`](Self::name) and [`from_name`](Self::from_name)
/// round-trip the surface spellings.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TemporalOp {
    /// Independent per-trace scan for indices where a condition holds.
    Find,
    /// Lock-stepped joint scan for indices where a condition holds.
    FindGlobal,
    /// Run a body whenever a condition holds during a joint scan.
    Whenever,
    /// Fold a function over a signal's values until a stop condition holds.
    FoldSignal,
    /// The number of indices `find` would report.
    Count,
}

impl TemporalOp {
    /// Every temporal operator, in dispatch-table order.
    pub const ALL: [TemporalOp; 5] = [
        TemporalOp::Find,
        TemporalOp::FindGlobal,
        TemporalOp::Whenever,
        TemporalOp::FoldSignal,
        TemporalOp::Count,
    ];

    /// The operator's surface name.
    pub const fn name(&self) -> &'static str {
        use TemporalOp::*;
        match self {
            Find => "find",
            FindGlobal => "find-global",
            Whenever => "whenever",
            FoldSignal => "fold/signal",
            Count => "count",
        }
    }

    /// Look up an operator by its surface name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }
}

impl fmt::Display for TemporalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(any(test, feature = "arbitrary"))]
pub mod arbitrary {
    //! Helper functions to generate arbitrary values and expressions using
    //! [`mod@proptest`].
    use proptest::prelude::*;

    use super::*;

    /// Generate arbitrary non-closure values.
    ///
    /// Integers are kept small so arithmetic over generated values cannot
    /// overflow.
    pub fn value() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Unit),
            any::<bool>().prop_map(Value::Bool),
            (-1000i64..1000).prop_map(Value::Int),
            "[a-z][a-z0-9_]*".prop_map(Value::Symbol),
        ]
    }

    /// Generate arbitrary integer-valued expressions.
    ///
    /// Leaves and nesting are kept small enough that evaluating a generated
    /// expression cannot overflow `i64`.
    pub fn int_expr() -> impl Strategy<Value = Expr> {
        let leaf = (-2i64..3).prop_map(Expr::int);
        leaf.prop_recursive(3, 24, 3, |inner| {
            let op = prop_oneof![Just(BuiltinOp::Add), Just(BuiltinOp::Mul)];
            (op, prop::collection::vec(inner, 1..4)).prop_map(|(op, args)| Expr::call(op, args))
        })
    }
}
