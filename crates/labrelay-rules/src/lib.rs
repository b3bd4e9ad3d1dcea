//! Rule-expression interpreter for receiver filters.
//!
//! Filter expressions are small boolean predicates evaluated against a
//! bundle with an explicit focus resource:
//!
//! ```text
//! expr     = or_expr
//! or_expr  = and_expr ("or" and_expr)*
//! and_expr = not_expr ("and" not_expr)*
//! not_expr = "not" primary / primary
//! primary  = "(" expr ")" / "true" / "false" / "exists" "(" path ")" / comparison
//! compare  = path op value
//! op       = "eq" / "ne" / "co" / "sw" / "ew" / "gt" / "lt" / "ge" / "le"
//! ```
//!
//! Paths are dot-separated property traversals over the focus resource;
//! arrays match when any element matches. `%name` shorthand variables are
//! resolved against a lookup table before parsing. Parsing and evaluation are
//! bounded so a pathological expression cannot stall a worker.

pub mod error;
pub mod eval;
pub mod expr;
pub mod shorthand;

pub use error::RuleError;
pub use eval::{EvalLimits, RuleEvaluator};
pub use expr::{ComparisonOp, RuleExpression, parse_expression};
pub use shorthand::ShorthandTable;
