//! The temporal operator set
//!
//! Five operators built purely on top of [`Trace`](crate::trace::Trace)
//! stepping, [`TraceSet`](crate::trace::TraceSet) snapshots, and the
//! [`Evaluator`](crate::eval::Evaluator):
//!
//! - `find` scans each trace independently from position 0 while the other
//!   traces stay frozen, and merges the matching indices.
//! - `find-global` steps all traces in lock step and records the joint cursor
//!   positions where the condition holds.
//! - `whenever` runs a body sequence on each joint tick where the condition
//!   holds and keeps the last value produced.
//! - `fold/signal` folds a function over a signal's samples until a stop
//!   condition holds or any trace is exhausted.
//! - `count` is the length of `find`'s result.
//!
//! Every operator brackets its cursor mutation with snapshot/restore, so
//! nested and sequential calls compose without the caller ever observing a
//! moved cursor.

use std::collections::BTreeMap;

use itertools::Itertools;
use waveql_core::prelude::*;

use crate::eval::Evaluator;
use crate::trace::Trace;

/// A temporal operator handler. Receives the argument expressions
/// *unevaluated*; evaluation order and timing are the handler's business.
pub type Handler = fn(&mut Evaluator, &[Expr]) -> WaveqlResult<Value>;

/// The operator-identifier keyed handler table.
pub fn handler(op: TemporalOp) -> Handler {
    match op {
        TemporalOp::Find => op_find,
        TemporalOp::FindGlobal => op_find_global,
        TemporalOp::Whenever => op_whenever,
        TemporalOp::FoldSignal => op_fold_signal,
        TemporalOp::Count => op_count,
    }
}

/// Dispatch a temporal operator call.
///
/// This is the single entry point the surface-language dispatcher (and the
/// evaluator itself, for nested calls) goes through.
pub fn dispatch(seval: &mut Evaluator, op: TemporalOp, args: &[Expr]) -> WaveqlResult<Value> {
    log::debug!("dispatching `{}` with {} argument(s)", op, args.len());
    handler(op)(seval, args)
}

/// Run `f` with all cursors snapshotted, restoring them unconditionally
/// (success or error) before returning `f`'s result.
///
/// This makes the restore invariant structural instead of a convention each
/// handler must remember on every exit path.
fn with_saved_cursors<T, F>(seval: &mut Evaluator, f: F) -> WaveqlResult<T>
where
    F: FnOnce(&mut Evaluator) -> WaveqlResult<T>,
{
    let saved = seval.traces.indices();
    let result = f(seval);
    seval.traces.restore(&saved);
    result
}

fn exactly_one<'a>(op: TemporalOp, args: &'a [Expr]) -> WaveqlResult<&'a Expr> {
    match args {
        [arg] => Ok(arg),
        _ => Err(Error::Arity {
            op: op.name(),
            expected: "exactly 1".into(),
            got: args.len(),
        }),
    }
}

/// `find`: the sorted, deduplicated indices at which the condition holds,
/// stepping each trace individually.
///
/// Each trace is interrogated against the full condition while the other
/// traces remain frozen at their pre-scan positions; this answers "at which
/// of this trace's own cycles does the condition hold", not a joint temporal
/// condition.
fn op_find(seval: &mut Evaluator, args: &[Expr]) -> WaveqlResult<Value> {
    let condition = exactly_one(TemporalOp::Find, args)?;
    let indices = scan_each_trace(seval, condition)?;
    Ok(Value::List(indices.into_iter().map(|i| Value::Int(i as i64)).collect()))
}

/// `count`: the number of indices `find` reports for the same condition.
fn op_count(seval: &mut Evaluator, args: &[Expr]) -> WaveqlResult<Value> {
    let condition = exactly_one(TemporalOp::Count, args)?;
    let indices = scan_each_trace(seval, condition)?;
    Ok(Value::Int(indices.len() as i64))
}

/// The shared independent-per-trace scan behind `find` and `count`.
fn scan_each_trace(seval: &mut Evaluator, condition: &Expr) -> WaveqlResult<Vec<usize>> {
    let mut found = Vec::new();
    for tid in seval.traces.ids() {
        // A zero-length trace has no position to interrogate.
        if seval.traces.get(&tid).map_or(true, Trace::is_empty) {
            continue;
        }
        let start = seval.traces.index_of(&tid)?;
        seval.traces.set_index_of(&tid, 0)?;
        let scanned = scan_one_trace(seval, &tid, condition, &mut found);
        // Restore this trace's cursor on the error path too.
        seval.traces.set_index_of(&tid, start)?;
        scanned?;
    }
    Ok(found.into_iter().unique().sorted().collect())
}

fn scan_one_trace(
    seval: &mut Evaluator,
    tid: &str,
    condition: &Expr,
    found: &mut Vec<usize>,
) -> WaveqlResult<()> {
    loop {
        if seval.eval(condition)?.is_truthy() {
            found.push(seval.traces.index_of(tid)?);
        }
        if seval.traces.step_one(tid)? {
            return Ok(());
        }
    }
}

/// `find-global`: the joint cursor positions at which the condition holds,
/// stepping all traces at the same time.
///
/// Each result row is a bare index when the set holds exactly one trace, and
/// the full per-trace index mapping otherwise. The loop terminates the
/// instant any one trace is exhausted.
fn op_find_global(seval: &mut Evaluator, args: &[Expr]) -> WaveqlResult<Value> {
    let condition = exactly_one(TemporalOp::FindGlobal, args)?;
    // A joint step over zero traces can never report exhaustion.
    if seval.traces.is_empty() {
        return Ok(Value::List(Vec::new()));
    }
    with_saved_cursors(seval, |seval| {
        let mut found = Vec::new();
        loop {
            if seval.eval(condition)?.is_truthy() {
                found.push(index_row(seval.traces.indices()));
            }
            if !seval.traces.step_all().is_empty() {
                break;
            }
        }
        log::trace!("find-global: {} matching tick(s)", found.len());
        Ok(Value::List(found))
    })
}

fn index_row(mut snapshot: BTreeMap<String, usize>) -> Value {
    match snapshot.pop_first() {
        None => Value::Unit,
        Some((_, index)) if snapshot.is_empty() => Value::Int(index as i64),
        Some((tid, index)) => {
            let mut fields = BTreeMap::new();
            fields.insert(tid, Value::Int(index as i64));
            fields.extend(
                snapshot
                    .into_iter()
                    .map(|(tid, index)| (tid, Value::Int(index as i64))),
            );
            Value::Record(fields)
        }
    }
}

/// `whenever`: evaluate the body sequence at each joint tick where the
/// condition holds; the value of the last body expression at the last such
/// tick is returned, or [`Value::Unit`] if the condition never held.
fn op_whenever(seval: &mut Evaluator, args: &[Expr]) -> WaveqlResult<Value> {
    let (condition, body) = match args {
        [condition, body @ ..] if !body.is_empty() => (condition, body),
        _ => {
            return Err(Error::Arity {
                op: TemporalOp::Whenever.name(),
                expected: "at least 2".into(),
                got: args.len(),
            })
        }
    };
    if seval.traces.is_empty() {
        return Ok(Value::Unit);
    }
    with_saved_cursors(seval, |seval| {
        let mut result = Value::Unit;
        loop {
            if seval.eval(condition)?.is_truthy() {
                result = seval.eval_sequence(body)?;
            }
            if !seval.traces.step_all().is_empty() {
                break;
            }
        }
        Ok(result)
    })
}

/// `fold/signal`: fold a function over a signal's samples.
///
/// The stop condition is checked before each application, so the function
/// never runs on a tick excluded by it; trace exhaustion halts the loop after
/// the current tick's accumulation is kept.
fn op_fold_signal(seval: &mut Evaluator, args: &[Expr]) -> WaveqlResult<Value> {
    let op = TemporalOp::FoldSignal.name();
    let [function, initial, stop, signal] = args else {
        return Err(Error::Arity {
            op,
            expected: "exactly 4".into(),
            got: args.len(),
        });
    };

    let function = match seval.eval(function)? {
        Value::Closure(closure) => closure,
        _ => return Err(Error::NotCallable { op }),
    };
    let mut acc = seval.eval(initial)?;
    let name = match seval.eval(signal)? {
        Value::Symbol(name) => name,
        _ => return Err(Error::NotASignal { op }),
    };
    if !seval.traces.contains(&name) {
        return Err(Error::SignalNotPresent { name });
    }

    with_saved_cursors(seval, |seval| {
        loop {
            if seval.eval(stop)?.is_truthy() {
                break;
            }
            let sample = seval.signal_value(&name)?;
            acc = seval.apply_closure(&function, vec![acc.clone(), sample])?;
            if !seval.traces.step_all().is_empty() {
                break;
            }
        }
        Ok(acc)
    })
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use waveql_core::expr::BuiltinOp;

    use super::*;
    use crate::trace::TraceSet;

    fn evaluator(traces: &[(&str, &[i64])]) -> Evaluator {
        let mut set = TraceSet::new();
        for (tid, samples) in traces {
            set.insert(Trace::from_ints(*tid, samples.iter().copied()));
        }
        Evaluator::new(set)
    }

    fn sig_eq(name: &str, value: i64) -> Expr {
        Expr::call(BuiltinOp::Eq, vec![Expr::symbol(name), Expr::int(value)])
    }

    fn find(cond: Expr) -> Expr {
        Expr::temporal(TemporalOp::Find, vec![cond])
    }

    fn int_list(indices: &[i64]) -> Value {
        Value::List(indices.iter().copied().map(Value::Int).collect())
    }

    #[test]
    fn find_reports_sorted_deduplicated_indices() {
        let mut seval = evaluator(&[("a", &[1, 0, 1, 1])]);
        assert_eq!(seval.eval(&find(sig_eq("a", 1))), Ok(int_list(&[0, 2, 3])));
    }

    #[test]
    fn find_is_idempotent_and_restores_cursors() {
        let mut seval = evaluator(&[("a", &[1, 0, 1]), ("b", &[0, 0, 0, 0, 0])]);
        // Park the cursors away from zero so restoration is observable.
        seval.traces.step_all();
        let before = seval.traces.indices();

        let first = seval.eval(&find(sig_eq("b", 0)));
        let second = seval.eval(&find(sig_eq("b", 0)));
        assert_eq!(first, second);
        assert_eq!(seval.traces.indices(), before);
    }

    #[test]
    fn find_scans_traces_independently() {
        // Condition depends only on `a`. While `b` is scanned, `a` stays
        // frozen at its pre-scan position, where its value is not 1, so `b`
        // contributes nothing regardless of its length.
        let mut seval = evaluator(&[("a", &[1, 0, 1]), ("b", &[9, 9, 9, 9, 9])]);
        seval.traces.step_all(); // a now reads 0
        assert_eq!(seval.eval(&find(sig_eq("a", 1))), Ok(int_list(&[0, 2])));
    }

    #[test]
    fn find_on_empty_trace_set_is_empty() {
        let mut seval = evaluator(&[]);
        assert_eq!(seval.eval(&find(Expr::bool(true))), Ok(int_list(&[])));
    }

    #[test]
    fn count_equals_find_length() {
        let mut seval = evaluator(&[("a", &[1, 0, 1, 1, 0])]);
        let cond = sig_eq("a", 1);
        let found = seval.eval(&find(cond.clone()));
        let counted = seval.eval(&Expr::temporal(TemporalOp::Count, vec![cond]));
        assert_eq!(found, Ok(int_list(&[0, 2, 3])));
        assert_eq!(counted, Ok(Value::Int(3)));
    }

    #[test]
    fn find_global_stops_at_the_shortest_trace() {
        let mut seval = evaluator(&[("a", &[1, 1, 1]), ("b", &[1, 1, 1, 1, 1])]);
        let result = seval
            .eval(&Expr::temporal(TemporalOp::FindGlobal, vec![Expr::bool(true)]))
            .unwrap();
        let Value::List(rows) = result else {
            panic!("find-global must return a list");
        };
        // The shorter trace bounds the loop to 3 joint ticks.
        assert_eq!(rows.len(), 3);
        // Multi-trace sets report full per-trace index rows.
        let expected: BTreeMap<String, Value> =
            [("a".to_string(), Value::Int(1)), ("b".to_string(), Value::Int(1))]
                .into_iter()
                .collect();
        assert_eq!(rows[1], Value::Record(expected));
    }

    #[test]
    fn find_global_reports_bare_indices_for_a_single_trace() {
        let mut seval = evaluator(&[("a", &[0, 1, 0, 1])]);
        let result = seval.eval(&Expr::temporal(TemporalOp::FindGlobal, vec![sig_eq("a", 1)]));
        assert_eq!(result, Ok(int_list(&[1, 3])));
    }

    #[test]
    fn find_global_restores_cursors() {
        let mut seval = evaluator(&[("a", &[0, 1]), ("b", &[0, 1, 2])]);
        seval.traces.step_all();
        let before = seval.traces.indices();
        seval.eval(&Expr::temporal(TemporalOp::FindGlobal, vec![Expr::bool(true)]))
            .unwrap();
        assert_eq!(seval.traces.indices(), before);
    }

    #[test]
    fn find_global_restores_cursors_on_error() {
        let mut seval = evaluator(&[("a", &[0, 1, 2])]);
        let before = seval.traces.indices();
        let result = seval.eval(&Expr::temporal(
            TemporalOp::FindGlobal,
            vec![Expr::symbol("unbound")],
        ));
        assert!(matches!(result, Err(Error::UnboundSymbol { .. })));
        assert_eq!(seval.traces.indices(), before);
    }

    #[test]
    fn whenever_keeps_the_last_body_value() {
        let mut seval = evaluator(&[("a", &[1, 0, 1, 0]), ("idx", &[10, 11, 12, 13])]);
        let result = seval.eval(&Expr::temporal(
            TemporalOp::Whenever,
            vec![sig_eq("a", 1), Expr::int(0), Expr::symbol("idx")],
        ));
        // Condition holds at ticks 0 and 2; the retained value is the body's
        // value at tick 2.
        assert_eq!(result, Ok(Value::Int(12)));
    }

    #[test]
    fn whenever_returns_unit_when_the_condition_never_holds() {
        let mut seval = evaluator(&[("a", &[0, 0, 0])]);
        let result = seval.eval(&Expr::temporal(
            TemporalOp::Whenever,
            vec![sig_eq("a", 1), Expr::int(99)],
        ));
        assert_eq!(result, Ok(Value::Unit));
    }

    #[test]
    fn whenever_restores_cursors() {
        let mut seval = evaluator(&[("a", &[1, 1, 1])]);
        let before = seval.traces.indices();
        seval.eval(&Expr::temporal(
            TemporalOp::Whenever,
            vec![Expr::bool(true), Expr::symbol("a")],
        ))
        .unwrap();
        assert_eq!(seval.traces.indices(), before);
    }

    #[test]
    fn whenever_restores_cursors_on_error() {
        // The condition first holds on tick 1, so the cursors have already
        // moved when the body fails.
        let mut seval = evaluator(&[("a", &[0, 1, 0])]);
        let before = seval.traces.indices();
        let result = seval.eval(&Expr::temporal(
            TemporalOp::Whenever,
            vec![sig_eq("a", 1), Expr::symbol("unbound")],
        ));
        assert!(matches!(result, Err(Error::UnboundSymbol { .. })));
        assert_eq!(seval.traces.indices(), before);
    }

    #[test]
    fn whenever_requires_a_body() {
        let mut seval = evaluator(&[("a", &[1])]);
        let result = seval.eval(&Expr::temporal(TemporalOp::Whenever, vec![Expr::bool(true)]));
        assert!(matches!(result, Err(Error::Arity { op: "whenever", .. })));
    }

    fn fold_signal(function: Expr, initial: Expr, stop: Expr, signal: &str) -> Expr {
        Expr::temporal(
            TemporalOp::FoldSignal,
            vec![function, initial, stop, Expr::quoted(Value::Symbol(signal.into()))],
        )
    }

    #[test]
    fn fold_signal_checks_stop_before_applying() {
        // Sum the signal until its value equals 3: the tick where it reads 3
        // must not be folded in.
        let mut seval = evaluator(&[("s", &[1, 2, 3, 4])]);
        let add = Expr::quoted(Value::Closure(Closure::Builtin(BuiltinOp::Add)));
        let result = seval.eval(&fold_signal(add, Expr::int(0), sig_eq("s", 3), "s"));
        assert_eq!(result, Ok(Value::Int(3)));
    }

    #[test]
    fn fold_signal_accumulates_to_the_end_without_stop() {
        let mut seval = evaluator(&[("s", &[1, 2, 3, 4])]);
        let add = Expr::quoted(Value::Closure(Closure::Builtin(BuiltinOp::Add)));
        let result = seval.eval(&fold_signal(add, Expr::int(0), Expr::bool(false), "s"));
        // Exhaustion halts the loop after the last sample is folded in.
        assert_eq!(result, Ok(Value::Int(10)));
    }

    #[test]
    fn fold_signal_accepts_user_lambdas() {
        let mut seval = evaluator(&[("s", &[1, 2, 3])]);
        let product = Expr::lambda(
            ["acc", "x"],
            Expr::call(
                BuiltinOp::Mul,
                vec![Expr::symbol("acc"), Expr::symbol("x")],
            ),
        );
        let result = seval.eval(&fold_signal(product, Expr::int(1), Expr::bool(false), "s"));
        assert_eq!(result, Ok(Value::Int(6)));
    }

    #[test]
    fn fold_signal_restores_cursors() {
        let mut seval = evaluator(&[("s", &[1, 2, 3])]);
        let before = seval.traces.indices();
        let add = Expr::quoted(Value::Closure(Closure::Builtin(BuiltinOp::Add)));
        seval.eval(&fold_signal(add, Expr::int(0), Expr::bool(false), "s"))
            .unwrap();
        assert_eq!(seval.traces.indices(), before);
    }

    #[test]
    fn fold_signal_restores_cursors_on_error() {
        // The second sample is not an integer, so the fold fails after the
        // cursors have already stepped once.
        let mut set = TraceSet::new();
        set.insert(Trace::new(
            "s",
            vec![Value::Int(1), Value::Bool(true), Value::Int(3)],
        ));
        let mut seval = Evaluator::new(set);
        let before = seval.traces.indices();
        let add = Expr::quoted(Value::Closure(Closure::Builtin(BuiltinOp::Add)));
        let result = seval.eval(&fold_signal(add, Expr::int(0), Expr::bool(false), "s"));
        assert!(matches!(result, Err(Error::InvalidOperation { .. })));
        assert_eq!(seval.traces.indices(), before);
    }

    #[test]
    fn fold_signal_arity_error_touches_no_cursor() {
        let mut seval = evaluator(&[("s", &[1, 2, 3])]);
        seval.traces.step_all();
        let before = seval.traces.indices();
        let result = seval.eval(&Expr::temporal(
            TemporalOp::FoldSignal,
            vec![Expr::int(0), Expr::bool(false), Expr::quoted(Value::Symbol("s".into()))],
        ));
        assert!(matches!(result, Err(Error::Arity { op: "fold/signal", .. })));
        assert_eq!(seval.traces.indices(), before);
    }

    #[test]
    fn fold_signal_rejects_non_callable_functions() {
        let mut seval = evaluator(&[("s", &[1])]);
        let result = seval.eval(&fold_signal(
            Expr::int(7),
            Expr::int(0),
            Expr::bool(false),
            "s",
        ));
        assert!(matches!(result, Err(Error::NotCallable { op: "fold/signal" })));
    }

    #[test]
    fn fold_signal_rejects_non_symbol_signals() {
        let mut seval = evaluator(&[("s", &[1])]);
        let add = Expr::quoted(Value::Closure(Closure::Builtin(BuiltinOp::Add)));
        let result = seval.eval(&Expr::temporal(
            TemporalOp::FoldSignal,
            vec![add, Expr::int(0), Expr::bool(false), Expr::int(5)],
        ));
        assert!(matches!(result, Err(Error::NotASignal { op: "fold/signal" })));
    }

    #[test]
    fn fold_signal_rejects_unknown_signals() {
        let mut seval = evaluator(&[("s", &[1])]);
        let add = Expr::quoted(Value::Closure(Closure::Builtin(BuiltinOp::Add)));
        let result = seval.eval(&fold_signal(add, Expr::int(0), Expr::bool(false), "nope"));
        assert!(matches!(result, Err(Error::SignalNotPresent { .. })));
    }

    #[test]
    fn nested_temporal_operators_restore_their_own_state() {
        // `count` runs inside every tick of `whenever`; its scan must not
        // disturb the outer joint iteration.
        let mut seval = evaluator(&[("a", &[1, 0, 1])]);
        let body = Expr::temporal(TemporalOp::Count, vec![sig_eq("a", 1)]);
        let before = seval.traces.indices();
        let result = seval.eval(&Expr::temporal(
            TemporalOp::Whenever,
            vec![Expr::bool(true), body],
        ));
        assert_eq!(result, Ok(Value::Int(2)));
        assert_eq!(seval.traces.indices(), before);
    }

    #[test]
    fn dispatch_table_covers_every_operator() {
        let mut seval = evaluator(&[("a", &[1])]);
        for op in TemporalOp::ALL {
            // Zero arguments is an arity error for every operator, proving
            // each name reaches a live handler.
            assert!(matches!(
                dispatch(&mut seval, op, &[]),
                Err(Error::Arity { .. })
            ));
        }
    }

    proptest! {
        #[test]
        fn count_always_matches_find_length(
            samples in prop::collection::vec(-3i64..3, 1..20),
            needle in -3i64..3,
        ) {
            let mut seval = evaluator(&[("s", samples.as_slice())]);
            let found = seval.eval(&find(sig_eq("s", needle))).unwrap();
            let counted = seval.eval(&Expr::temporal(TemporalOp::Count, vec![sig_eq("s", needle)])).unwrap();
            let Value::List(indices) = found else {
                panic!("find must return a list");
            };
            prop_assert_eq!(counted, Value::Int(indices.len() as i64));
        }

        #[test]
        fn operators_leave_cursors_where_they_found_them(
            samples in prop::collection::vec(-3i64..3, 2..20),
            park in 0usize..2,
        ) {
            let mut seval = evaluator(&[("s", samples.as_slice())]);
            for _ in 0..park {
                seval.traces.step_all();
            }
            let before = seval.traces.indices();

            seval.eval(&find(sig_eq("s", 0))).unwrap();
            prop_assert_eq!(seval.traces.indices(), before.clone());

            seval.eval(&Expr::temporal(TemporalOp::FindGlobal, vec![sig_eq("s", 0)])).unwrap();
            prop_assert_eq!(seval.traces.indices(), before.clone());

            seval.eval(&Expr::temporal(TemporalOp::Whenever, vec![sig_eq("s", 0), Expr::int(1)])).unwrap();
            prop_assert_eq!(seval.traces.indices(), before);
        }
    }
}
