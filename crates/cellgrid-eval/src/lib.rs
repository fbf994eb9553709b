//! Formula evaluation over a host data-access trait, plus the
//! range-keyed result cache.

pub mod interpreter;
pub mod result_cache;
pub mod traits;

pub use interpreter::{EvalMode, Evaluator, FormulaError};
pub use result_cache::RangeResultCache;
pub use traits::SheetAccess;

pub use cellgrid_common as common;
pub use cellgrid_parse as parse;
