use waveql::prelude::*;

fn main() -> Result<(), WaveqlError> {
    env_logger::init();

    let mut traces = TraceSet::new();
    traces.insert(Trace::from_ints("req", [1, 0, 1, 1, 0, 0]));
    traces.insert(Trace::from_ints("ack", [0, 1, 0, 1, 1, 0]));
    let mut seval = Evaluator::new(traces);

    // Cycles where `req` and `ack` are high at the same joint tick.
    let handshake = Expr::call(
        BuiltinOp::And,
        vec![
            Expr::call(BuiltinOp::Eq, vec![Expr::symbol("req"), Expr::int(1)]),
            Expr::call(BuiltinOp::Eq, vec![Expr::symbol("ack"), Expr::int(1)]),
        ],
    );
    let ticks = seval.eval(&Expr::temporal(TemporalOp::FindGlobal, vec![handshake.clone()]))?;
    println!("handshake ticks: {}", ticks);

    let acked = seval.eval(&Expr::temporal(
        TemporalOp::Count,
        vec![Expr::call(
            BuiltinOp::Eq,
            vec![Expr::symbol("ack"), Expr::int(1)],
        )],
    ))?;
    println!("acks seen: {}", acked);

    // Sum `req` over the whole trace.
    let total = seval.eval(&Expr::temporal(
        TemporalOp::FoldSignal,
        vec![
            Expr::quoted(Value::Closure(Closure::Builtin(BuiltinOp::Add))),
            Expr::int(0),
            Expr::bool(false),
            Expr::quoted(Value::Symbol("req".into())),
        ],
    ))?;
    println!("total req cycles: {}", total);

    Ok(())
}
