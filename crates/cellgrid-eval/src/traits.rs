//! Host capability surface the evaluator runs against.

use cellgrid_common::{CellValue, RangeRef, Value};

/// Everything the evaluator may ask of its host. Object-safe so the
/// host can hand the evaluator a `&dyn SheetAccess` without generic
/// plumbing.
pub trait SheetAccess {
    /// Formula text behind a defined name, or `None` when the name is
    /// unknown. The returned text is a formula body (leading `=`
    /// optional) and is parsed on each resolution.
    fn get_defined_name(&self, name: &str) -> Option<String>;

    /// Cells inside `range` that hold data, in no required order.
    /// Cells with no data are simply absent.
    fn get_by_range(&self, range: &RangeRef, sheet: Option<&str>) -> Vec<CellValue>;

    /// Same as [`get_by_range`](Self::get_by_range) but excluding
    /// cells in hidden rows or columns.
    fn get_by_range_ignore_hidden(&self, range: &RangeRef, sheet: Option<&str>)
        -> Vec<CellValue>;

    /// Location of the cell whose formula is being evaluated.
    fn formula_cell(&self) -> RangeRef;

    /// Dispatch a function call. `name` is uppercased by the caller.
    /// `None` means the function does not exist; the evaluator turns
    /// that into a `#NAME?` value.
    fn call_function(&self, name: &str, args: &[Value]) -> Option<Value>;
}
