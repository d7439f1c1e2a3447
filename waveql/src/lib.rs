pub mod prelude {
    pub use waveql_core::prelude::*;
    pub use waveql_semantics::temporal::{dispatch, handler, Handler};
    pub use waveql_semantics::{Evaluator, Trace, TraceSet};
}
