//! Expression evaluation against the current cursor state
//!
//! The [`Evaluator`] owns the [`TraceSet`] (there is no ambient registry)
//! and evaluates expression nodes against whatever cursor positions the
//! traces currently hold. Temporal operators call back into it to test
//! conditions and run bodies at each position they visit, so evaluation is
//! re-entrant: a nested temporal operator brackets its own cursor state and
//! restores exactly what it perturbed.

use waveql_core::prelude::*;

use crate::temporal;
use crate::trace::TraceSet;

/// Evaluates expressions against the current state of its trace set.
#[derive(Debug, Default)]
pub struct Evaluator {
    /// The traces this evaluator owns. Temporal operators manipulate the
    /// cursors in here directly.
    pub traces: TraceSet,
    scopes: Vec<Env>,
}

impl Evaluator {
    /// Create an evaluator owning the given traces.
    pub fn new(traces: TraceSet) -> Self {
        Self {
            traces,
            scopes: Vec::new(),
        }
    }

    /// Evaluate one expression node.
    ///
    /// Symbols resolve innermost-binding-first, then as a signal read at the
    /// owning trace's current cursor. Temporal operator arguments are passed
    /// through unevaluated; the handler controls their evaluation order.
    pub fn eval(&mut self, expr: &Expr) -> WaveqlResult<Value> {
        match expr {
            Expr::Lit(value) => Ok(value.clone()),
            Expr::Quoted(value) => Ok(value.clone()),
            Expr::Symbol(name) => self.lookup(name),
            Expr::Lambda { params, body } => Ok(Value::Closure(Closure::Lambda {
                params: params.clone(),
                body: body.clone(),
                env: self.capture(),
            })),
            Expr::Call { op, args } => {
                let mut evaluated = Vec::with_capacity(args.len());
                for arg in args {
                    evaluated.push(self.eval(arg)?);
                }
                op.apply(&evaluated)
            }
            Expr::Temporal { op, args } => temporal::dispatch(self, *op, args),
        }
    }

    /// Evaluate each expression in order and return the last result, or
    /// [`Value::Unit`] for an empty sequence.
    pub fn eval_sequence(&mut self, exprs: &[Expr]) -> WaveqlResult<Value> {
        let mut result = Value::Unit;
        for expr in exprs {
            result = self.eval(expr)?;
        }
        Ok(result)
    }

    /// Invoke a closure value with already-evaluated arguments.
    ///
    /// The two closure variants are matched exhaustively; callers reject
    /// non-closure values before reaching this point.
    pub fn apply_closure(&mut self, closure: &Closure, args: Vec<Value>) -> WaveqlResult<Value> {
        match closure {
            Closure::Builtin(op) => op.apply(&args),
            Closure::Lambda { params, body, env } => {
                if params.len() != args.len() {
                    return Err(Error::Arity {
                        op: "lambda",
                        expected: format!("exactly {}", params.len()),
                        got: args.len(),
                    });
                }
                let mut scope = env.clone();
                scope.extend(params.iter().cloned().zip(args));
                self.scopes.push(scope);
                let result = self.eval(body);
                self.scopes.pop();
                result
            }
        }
    }

    /// Read the current sample of a named signal.
    pub fn signal_value(&self, name: &str) -> WaveqlResult<Value> {
        self.traces.value_of(name)
    }

    fn lookup(&self, name: &str) -> WaveqlResult<Value> {
        for scope in self.scopes.iter().rev() {
            if let Some(value) = scope.get(name) {
                return Ok(value.clone());
            }
        }
        if self.traces.contains(name) {
            return self.traces.value_of(name);
        }
        Err(Error::UnboundSymbol {
            name: name.to_string(),
        })
    }

    /// Flatten the scope stack into a captured environment; inner bindings
    /// shadow outer ones.
    fn capture(&self) -> Env {
        let mut env = Env::new();
        for scope in &self.scopes {
            env.extend(scope.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        env
    }
}
