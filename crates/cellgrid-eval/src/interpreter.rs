//! Tree-walking evaluator over a host `SheetAccess`.
//!
//! Only lexing and parsing can fail the evaluation as a whole; every
//! runtime failure is an ordinary `Value::Error` flowing through the
//! result, the way spreadsheets surface `#DIV/0!` in a cell.

use thiserror::Error;

use cellgrid_common::{CellError, CellErrorKind, RangeRef, Value};
use cellgrid_parse::{parse, AstNode, LexError, ParseError, Reference};

use crate::traits::SheetAccess;

/// Hard failure before evaluation starts.
#[derive(Debug, Error)]
pub enum FormulaError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Which range getter the evaluation uses. Selected by the caller for
/// the whole evaluation, including recursive defined-name resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalMode {
    UseHidden,
    IgnoreHidden,
}

pub struct Evaluator<'a> {
    env: &'a dyn SheetAccess,
}

impl<'a> Evaluator<'a> {
    pub fn new(env: &'a dyn SheetAccess) -> Self {
        Self { env }
    }

    pub fn eval_formula(&self, text: &str, mode: EvalMode) -> Result<Value, FormulaError> {
        let ast = parse(text)?;
        Ok(self.eval_ast(&ast, mode))
    }

    pub fn eval_ast(&self, ast: &AstNode, mode: EvalMode) -> Value {
        let mut names = Vec::new();
        self.eval_node(ast, mode, &mut names)
    }

    /// `names` is the defined-name resolution stack; a name already on
    /// it closes a cycle.
    fn eval_node(&self, node: &AstNode, mode: EvalMode, names: &mut Vec<String>) -> Value {
        match node {
            AstNode::Constant(v) => v.clone(),
            AstNode::Reference(r) => self.eval_reference(r, mode, names),
            AstNode::Intersection(refs) => self.eval_intersection(refs, mode),
            AstNode::Union(children) => {
                let row: Vec<Value> = children
                    .iter()
                    .map(|c| self.eval_node(c, mode, names))
                    .collect();
                Value::Array(vec![row])
            }
            AstNode::BinaryOp { op, left, right } => {
                let l = self.eval_node(left, mode, names);
                let r = self.eval_node(right, mode, names);
                apply_binary(op, l, r)
            }
            AstNode::UnaryOp { op, operand, .. } => {
                let v = self.eval_node(operand, mode, names);
                apply_unary(op, v)
            }
            AstNode::FunctionCall { name, args } => {
                let values: Vec<Value> = args
                    .iter()
                    .map(|a| self.eval_node(a, mode, names))
                    .collect();
                let upper = name.to_uppercase();
                self.env.call_function(&upper, &values).unwrap_or_else(|| {
                    Value::Error(
                        CellError::new(CellErrorKind::Name)
                            .with_message(format!("unknown function {upper}")),
                    )
                })
            }
        }
    }

    fn eval_reference(&self, r: &Reference, mode: EvalMode, names: &mut Vec<String>) -> Value {
        match r {
            Reference::Name { name, .. } => {
                let key = name.to_uppercase();
                if names.iter().any(|n| n == &key) {
                    return Value::Error(
                        CellError::new(CellErrorKind::Circ)
                            .with_message(format!("circular defined name {key}")),
                    );
                }
                let body = match self.env.get_defined_name(name) {
                    Some(body) => body,
                    None => {
                        return Value::Error(
                            CellError::new(CellErrorKind::Name)
                                .with_message(format!("unknown name {name}")),
                        )
                    }
                };
                names.push(key);
                let result = match parse(&body) {
                    Ok(ast) => self.eval_node(&ast, mode, names),
                    Err(err) => Value::Error(
                        CellError::new(CellErrorKind::Name).with_message(err.to_string()),
                    ),
                };
                names.pop();
                result
            }
            Reference::Cells { sheet, range, .. } => {
                self.fetch_range(range, sheet.as_deref(), mode)
            }
        }
    }

    /// Geometric intersection of the adjacency operands. Only cell
    /// ranges participate; a defined name here is a `#VALUE!`.
    fn eval_intersection(&self, refs: &[Reference], mode: EvalMode) -> Value {
        let mut sheet: Option<&str> = None;
        let mut acc: Option<RangeRef> = None;
        for r in refs {
            let (s, range) = match r {
                Reference::Cells { sheet, range, .. } => (sheet.as_deref(), range),
                Reference::Name { .. } => {
                    return Value::Error(
                        CellError::new(CellErrorKind::Value)
                            .with_message("defined name in intersection"),
                    )
                }
            };
            if sheet.is_none() {
                sheet = s;
            }
            acc = match acc {
                None => Some(*range),
                Some(prev) => match prev.intersect(range) {
                    Some(i) => Some(i),
                    None => return Value::Error(CellError::new(CellErrorKind::Null)),
                },
            };
        }
        match acc {
            Some(range) => self.fetch_range(&range, sheet, mode),
            None => Value::Error(CellError::new(CellErrorKind::Null)),
        }
    }

    /// Single cell ⇒ its value (or Empty); multi-cell ⇒ dense
    /// row-major array with Empty gaps. A full-column reference is
    /// clamped to the host's populated extent so an empty column
    /// yields an empty array, not a million-row allocation.
    fn fetch_range(&self, range: &RangeRef, sheet: Option<&str>, mode: EvalMode) -> Value {
        // A range covering the cell being evaluated is the one-cell
        // cycle; only same-sheet references can close it.
        if sheet.is_none() && range.intersects(&self.env.formula_cell()) {
            return Value::Error(
                CellError::new(CellErrorKind::Circ)
                    .with_message("formula references its own cell"),
            );
        }
        let cells = match mode {
            EvalMode::UseHidden => self.env.get_by_range(range, sheet),
            EvalMode::IgnoreHidden => self.env.get_by_range_ignore_hidden(range, sheet),
        };

        if range.is_single_cell() {
            return cells
                .into_iter()
                .find(|c| c.row == range.start_row && c.col == range.start_col)
                .map(|c| c.value)
                .unwrap_or(Value::Empty);
        }

        let end_row = if range.is_full_column() {
            match cells.iter().map(|c| c.row).max() {
                Some(max) => max,
                None => return Value::Array(Vec::new()),
            }
        } else {
            range.end_row
        };

        let width = range.width() as usize;
        let height = (end_row - range.start_row + 1) as usize;
        let mut rows = vec![vec![Value::Empty; width]; height];
        for cell in cells {
            if cell.row < range.start_row || cell.row > end_row {
                continue;
            }
            if cell.col < range.start_col || cell.col > range.end_col {
                continue;
            }
            let r = (cell.row - range.start_row) as usize;
            let c = (cell.col - range.start_col) as usize;
            rows[r][c] = cell.value;
        }
        Value::Array(rows)
    }
}

/// Scalar binary ops broadcast elementwise over arrays; two arrays
/// combine positionally and must share a shape.
fn apply_binary(op: &str, left: Value, right: Value) -> Value {
    match (left, right) {
        (Value::Array(a), Value::Array(b)) => {
            if a.len() != b.len() || a.iter().zip(&b).any(|(x, y)| x.len() != y.len()) {
                return Value::Error(
                    CellError::new(CellErrorKind::Value).with_message("array shape mismatch"),
                );
            }
            let rows = a
                .into_iter()
                .zip(b)
                .map(|(ra, rb)| {
                    ra.into_iter()
                        .zip(rb)
                        .map(|(x, y)| scalar_binary(op, x, y))
                        .collect()
                })
                .collect();
            Value::Array(rows)
        }
        (Value::Array(a), b) => Value::Array(
            a.into_iter()
                .map(|row| {
                    row.into_iter()
                        .map(|x| scalar_binary(op, x, b.clone()))
                        .collect()
                })
                .collect(),
        ),
        (a, Value::Array(b)) => Value::Array(
            b.into_iter()
                .map(|row| {
                    row.into_iter()
                        .map(|y| scalar_binary(op, a.clone(), y))
                        .collect()
                })
                .collect(),
        ),
        (a, b) => scalar_binary(op, a, b),
    }
}

fn scalar_binary(op: &str, left: Value, right: Value) -> Value {
    if let Value::Error(e) = left {
        return Value::Error(e);
    }
    if let Value::Error(e) = right {
        return Value::Error(e);
    }
    match op {
        "&" => Value::Text(format!("{}{}", display_text(&left), display_text(&right))),
        "=" | "<>" | "<" | ">" | "<=" | ">=" => compare(op, &left, &right),
        _ => numeric_binary(op, &left, &right),
    }
}

fn numeric_binary(op: &str, left: &Value, right: &Value) -> Value {
    let a = match to_number(left) {
        Ok(n) => n,
        Err(e) => return Value::Error(e),
    };
    let b = match to_number(right) {
        Ok(n) => n,
        Err(e) => return Value::Error(e),
    };
    let result = match op {
        "+" => a + b,
        "-" => a - b,
        "*" => a * b,
        "/" => {
            if b == 0.0 {
                return Value::Error(CellError::new(CellErrorKind::Div));
            }
            a / b
        }
        "^" => {
            if a < 0.0 && b.fract() != 0.0 {
                return Value::Error(CellError::new(CellErrorKind::Num));
            }
            a.powf(b)
        }
        _ => {
            return Value::Error(
                CellError::new(CellErrorKind::Value).with_message(format!("unknown operator {op}")),
            )
        }
    };
    if result.is_finite() {
        Value::Number(result)
    } else {
        Value::Error(CellError::new(CellErrorKind::Num))
    }
}

/// Numbers (and number-like values) compare numerically; everything
/// else compares as case-insensitive text.
fn compare(op: &str, left: &Value, right: &Value) -> Value {
    use std::cmp::Ordering;
    let numberish = |v: &Value| {
        matches!(
            v,
            Value::Number(_) | Value::Boolean(_) | Value::Empty
        )
    };
    let ord = if numberish(left) && numberish(right) {
        let a = to_number(left).unwrap_or(0.0);
        let b = to_number(right).unwrap_or(0.0);
        a.partial_cmp(&b).unwrap_or(Ordering::Equal)
    } else {
        display_text(left)
            .to_lowercase()
            .cmp(&display_text(right).to_lowercase())
    };
    let result = match op {
        "=" => ord == Ordering::Equal,
        "<>" => ord != Ordering::Equal,
        "<" => ord == Ordering::Less,
        ">" => ord == Ordering::Greater,
        "<=" => ord != Ordering::Greater,
        ">=" => ord != Ordering::Less,
        _ => unreachable!("non-comparison operator"),
    };
    Value::Boolean(result)
}

fn apply_unary(op: &str, value: Value) -> Value {
    if let Value::Array(rows) = value {
        return Value::Array(
            rows.into_iter()
                .map(|row| row.into_iter().map(|v| apply_unary(op, v)).collect())
                .collect(),
        );
    }
    if let Value::Error(e) = value {
        return Value::Error(e);
    }
    if op == "+" {
        return value;
    }
    let n = match to_number(&value) {
        Ok(n) => n,
        Err(e) => return Value::Error(e),
    };
    match op {
        "-" => Value::Number(-n),
        "%" => Value::Number(n / 100.0),
        _ => Value::Error(
            CellError::new(CellErrorKind::Value).with_message(format!("unknown operator {op}")),
        ),
    }
}

fn to_number(value: &Value) -> Result<f64, CellError> {
    match value {
        Value::Number(n) => Ok(*n),
        Value::Boolean(true) => Ok(1.0),
        Value::Boolean(false) => Ok(0.0),
        Value::Empty => Ok(0.0),
        Value::Text(t) => t.trim().parse::<f64>().map_err(|_| {
            CellError::new(CellErrorKind::Value).with_message(format!("not a number: {t:?}"))
        }),
        Value::Error(e) => Err(e.clone()),
        Value::Array(_) => {
            Err(CellError::new(CellErrorKind::Value).with_message("array where scalar expected"))
        }
    }
}

fn display_text(value: &Value) -> String {
    match value {
        Value::Empty => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellgrid_common::CellValue;
    use rustc_hash::FxHashMap;

    #[derive(Default)]
    struct TestSheet {
        cells: FxHashMap<(u32, u32), Value>,
        hidden_rows: Vec<u32>,
        names: FxHashMap<String, String>,
    }

    impl TestSheet {
        fn set(&mut self, row: u32, col: u32, value: Value) {
            self.cells.insert((row, col), value);
        }

        fn collect(&self, range: &RangeRef, skip_hidden: bool) -> Vec<CellValue> {
            let mut out: Vec<CellValue> = self
                .cells
                .iter()
                .filter(|(&(r, c), _)| range.contains(r, c))
                .filter(|(&(r, _), _)| !(skip_hidden && self.hidden_rows.contains(&r)))
                .map(|(&(r, c), v)| CellValue::new(r, c, v.clone()))
                .collect();
            out.sort_by_key(|c| (c.row, c.col));
            out
        }
    }

    impl SheetAccess for TestSheet {
        fn get_defined_name(&self, name: &str) -> Option<String> {
            self.names.get(&name.to_uppercase()).cloned()
        }

        fn get_by_range(&self, range: &RangeRef, _sheet: Option<&str>) -> Vec<CellValue> {
            self.collect(range, false)
        }

        fn get_by_range_ignore_hidden(
            &self,
            range: &RangeRef,
            _sheet: Option<&str>,
        ) -> Vec<CellValue> {
            self.collect(range, true)
        }

        fn formula_cell(&self) -> RangeRef {
            RangeRef::single(99, 99)
        }

        fn call_function(&self, name: &str, args: &[Value]) -> Option<Value> {
            match name {
                "SUM" => {
                    let mut total = 0.0;
                    let mut pending: Vec<&Value> = args.iter().collect();
                    while let Some(v) = pending.pop() {
                        match v {
                            Value::Array(rows) => {
                                pending.extend(rows.iter().flatten());
                            }
                            Value::Error(e) => return Some(Value::Error(e.clone())),
                            Value::Empty => {}
                            other => total += to_number(other).ok()?,
                        }
                    }
                    Some(Value::Number(total))
                }
                _ => None,
            }
        }
    }

    fn eval(sheet: &TestSheet, formula: &str) -> Value {
        Evaluator::new(sheet)
            .eval_formula(formula, EvalMode::UseHidden)
            .unwrap()
    }

    #[test]
    fn cell_addition() {
        let mut sheet = TestSheet::default();
        sheet.set(0, 0, Value::Number(5.0));
        sheet.set(0, 1, Value::Number(3.0));
        assert_eq!(eval(&sheet, "=A1+B1"), Value::Number(8.0));
    }

    #[test]
    fn row_range_with_gap() {
        let mut sheet = TestSheet::default();
        sheet.set(0, 0, Value::Number(1.0));
        sheet.set(0, 2, Value::Number(3.0));
        assert_eq!(
            eval(&sheet, "=A1:C1"),
            Value::Array(vec![vec![
                Value::Number(1.0),
                Value::Empty,
                Value::Number(3.0)
            ]])
        );
    }

    #[test]
    fn empty_full_column_is_empty_array() {
        let sheet = TestSheet::default();
        assert_eq!(eval(&sheet, "=D:D"), Value::Array(Vec::new()));
    }

    #[test]
    fn full_column_clamps_to_data_extent() {
        let mut sheet = TestSheet::default();
        sheet.set(2, 0, Value::Number(7.0));
        match eval(&sheet, "=A:A") {
            Value::Array(rows) => {
                assert_eq!(rows.len(), 3);
                assert_eq!(rows[2][0], Value::Number(7.0));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn division_by_zero() {
        let sheet = TestSheet::default();
        assert_eq!(
            eval(&sheet, "=1/0"),
            Value::Error(CellError::new(CellErrorKind::Div))
        );
    }

    #[test]
    fn negative_base_fractional_exponent() {
        let sheet = TestSheet::default();
        assert!(matches!(
            eval(&sheet, "=(0-2)^0.5"),
            Value::Error(e) if e.kind == CellErrorKind::Num
        ));
    }

    #[test]
    fn percent_and_concat() {
        let sheet = TestSheet::default();
        assert_eq!(eval(&sheet, "=50%"), Value::Number(0.5));
        assert_eq!(
            eval(&sheet, "=\"a\"&1&TRUE"),
            Value::Text("a1TRUE".to_string())
        );
    }

    #[test]
    fn comparison_is_case_insensitive_on_text() {
        let sheet = TestSheet::default();
        assert_eq!(eval(&sheet, "=\"ABC\"=\"abc\""), Value::Boolean(true));
        assert_eq!(eval(&sheet, "=2>1"), Value::Boolean(true));
    }

    #[test]
    fn empty_cell_coerces_to_zero() {
        let sheet = TestSheet::default();
        assert_eq!(eval(&sheet, "=A9+1"), Value::Number(1.0));
    }

    #[test]
    fn scalar_broadcasts_over_array() {
        let mut sheet = TestSheet::default();
        sheet.set(0, 0, Value::Number(1.0));
        sheet.set(1, 0, Value::Number(2.0));
        assert_eq!(
            eval(&sheet, "=A1:A2*10"),
            Value::Array(vec![
                vec![Value::Number(10.0)],
                vec![Value::Number(20.0)]
            ])
        );
    }

    #[test]
    fn array_shape_mismatch_is_value_error() {
        let mut sheet = TestSheet::default();
        sheet.set(0, 0, Value::Number(1.0));
        assert!(matches!(
            eval(&sheet, "=A1:A2+A1:A3"),
            Value::Error(e) if e.kind == CellErrorKind::Value
        ));
    }

    #[test]
    fn defined_name_resolves_recursively() {
        let mut sheet = TestSheet::default();
        sheet.set(0, 0, Value::Number(4.0));
        sheet.names.insert("BASE".into(), "=A1".into());
        sheet.names.insert("TOTAL".into(), "=Base*2".into());
        assert_eq!(eval(&sheet, "=Total+1"), Value::Number(9.0));
    }

    #[test]
    fn self_reference_is_circ() {
        let mut sheet = TestSheet::default();
        sheet.set(99, 98, Value::Number(1.0));
        // The fixture's formula cell is CV100; any range touching it
        // closes a cycle.
        assert!(matches!(
            eval(&sheet, "=CT100:CW101"),
            Value::Error(e) if e.kind == CellErrorKind::Circ
        ));
        assert_eq!(eval(&sheet, "=CU100"), Value::Number(1.0));
    }

    #[test]
    fn name_cycle_yields_circ() {
        let mut sheet = TestSheet::default();
        sheet.names.insert("ALPHA".into(), "=Beta+1".into());
        sheet.names.insert("BETA".into(), "=Alpha+1".into());
        assert!(matches!(
            eval(&sheet, "=Alpha+Beta"),
            Value::Error(e) if e.kind == CellErrorKind::Circ
        ));
    }

    #[test]
    fn unknown_name_and_function() {
        let sheet = TestSheet::default();
        assert!(matches!(
            eval(&sheet, "=NoSuchName"),
            Value::Error(e) if e.kind == CellErrorKind::Name
        ));
        assert!(matches!(
            eval(&sheet, "=NOSUCHFN(1)"),
            Value::Error(e) if e.kind == CellErrorKind::Name
        ));
    }

    #[test]
    fn function_sums_range() {
        let mut sheet = TestSheet::default();
        sheet.set(0, 0, Value::Number(1.0));
        sheet.set(1, 0, Value::Number(2.0));
        sheet.set(2, 0, Value::Number(3.0));
        assert_eq!(eval(&sheet, "=SUM(A1:A3, 4)"), Value::Number(10.0));
    }

    #[test]
    fn ignore_hidden_mode_skips_hidden_rows() {
        let mut sheet = TestSheet::default();
        sheet.set(0, 0, Value::Number(1.0));
        sheet.set(1, 0, Value::Number(2.0));
        sheet.set(2, 0, Value::Number(3.0));
        sheet.hidden_rows.push(1);
        let evaluator = Evaluator::new(&sheet);
        assert_eq!(
            evaluator
                .eval_formula("=SUM(A1:A3)", EvalMode::IgnoreHidden)
                .unwrap(),
            Value::Number(4.0)
        );
        assert_eq!(
            evaluator
                .eval_formula("=SUM(A1:A3)", EvalMode::UseHidden)
                .unwrap(),
            Value::Number(6.0)
        );
    }

    #[test]
    fn intersection_evaluates_overlap() {
        let mut sheet = TestSheet::default();
        sheet.set(1, 1, Value::Number(42.0)); // B2
        assert_eq!(eval(&sheet, "=A1:B2 B2:C4"), Value::Number(42.0));
        assert_eq!(
            eval(&sheet, "=A1:B3 B2:C4"),
            Value::Array(vec![vec![Value::Number(42.0)], vec![Value::Empty]])
        );
    }

    #[test]
    fn disjoint_intersection_is_null_error() {
        let sheet = TestSheet::default();
        assert!(matches!(
            eval(&sheet, "=A1:A2 C1:C2"),
            Value::Error(e) if e.kind == CellErrorKind::Null
        ));
    }

    #[test]
    fn union_collects_children() {
        let mut sheet = TestSheet::default();
        sheet.set(0, 0, Value::Number(1.0));
        sheet.set(0, 2, Value::Number(3.0));
        match eval(&sheet, "=(A1, C1)") {
            Value::Array(rows) => {
                assert_eq!(rows, vec![vec![Value::Number(1.0), Value::Number(3.0)]]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn error_values_propagate_through_operators() {
        let sheet = TestSheet::default();
        assert!(matches!(
            eval(&sheet, "=1+#REF!"),
            Value::Error(e) if e.kind == CellErrorKind::Ref
        ));
    }
}
