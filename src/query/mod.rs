//! Query execution pipeline (THE CORE §4.9): an interim-result-passing DAG
//! of `Go`/`Fetch`/insert/update/`Set`/`Return` executors built over the
//! storage service, with the back-tracker folded into `Go` itself so a
//! multi-hop traversal can report which root each destination came from.

pub mod interim;
pub mod plan;

pub use interim::InterimResult;
pub use plan::{execute, Direction, ExecContext, FetchSpec, FetchTarget, GoSpec, PlanNode, SetOp};
