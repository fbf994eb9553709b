//! Grid geometry: inclusive cell rectangles, hidden intervals, and
//! the host-owned resolved cell reading.

use crate::Value;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Largest 0-based row index. Used as the `end_row` sentinel for
/// full-column references such as `A:A` or a lone `A`.
pub const MAX_ROW: u32 = 1_048_575;

/// An inclusive, axis-aligned rectangle of (row, col) logical
/// coordinates. `start_row <= end_row` and `start_col <= end_col`
/// always hold; the constructors normalise swapped corners.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RangeRef {
    pub start_row: u32,
    pub start_col: u32,
    pub end_row: u32,
    pub end_col: u32,
}

impl RangeRef {
    pub fn new(start_row: u32, start_col: u32, end_row: u32, end_col: u32) -> Self {
        Self {
            start_row: start_row.min(end_row),
            start_col: start_col.min(end_col),
            end_row: start_row.max(end_row),
            end_col: start_col.max(end_col),
        }
    }

    /// The degenerate 1x1 range of one cell.
    pub fn single(row: u32, col: u32) -> Self {
        Self {
            start_row: row,
            start_col: col,
            end_row: row,
            end_col: col,
        }
    }

    /// A whole-column range spanning rows `0..=MAX_ROW`.
    pub fn full_column(start_col: u32, end_col: u32) -> Self {
        Self::new(0, start_col, MAX_ROW, end_col)
    }

    pub fn width(&self) -> u32 {
        self.end_col - self.start_col + 1
    }

    pub fn height(&self) -> u32 {
        self.end_row - self.start_row + 1
    }

    pub fn is_single_cell(&self) -> bool {
        self.start_row == self.end_row && self.start_col == self.end_col
    }

    pub fn is_full_column(&self) -> bool {
        self.start_row == 0 && self.end_row == MAX_ROW
    }

    pub fn contains(&self, row: u32, col: u32) -> bool {
        row >= self.start_row && row <= self.end_row && col >= self.start_col && col <= self.end_col
    }

    pub fn intersects(&self, other: &RangeRef) -> bool {
        self.start_row <= other.end_row
            && other.start_row <= self.end_row
            && self.start_col <= other.end_col
            && other.start_col <= self.end_col
    }

    /// The overlapping rectangle, if any.
    pub fn intersect(&self, other: &RangeRef) -> Option<RangeRef> {
        if !self.intersects(other) {
            return None;
        }
        Some(RangeRef {
            start_row: self.start_row.max(other.start_row),
            start_col: self.start_col.max(other.start_col),
            end_row: self.end_row.min(other.end_row),
            end_col: self.end_col.min(other.end_col),
        })
    }
}

/// A contiguous interval of logical indices excluded from layout;
/// every index inside renders with size 0.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HiddenRange {
    pub min: u32,
    pub max: u32,
}

impl HiddenRange {
    pub fn new(min: u32, max: u32) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    pub fn contains(&self, index: u32) -> bool {
        index >= self.min && index <= self.max
    }
}

/// A resolved reading of one logical cell. Owned by the host data
/// model; this engine only reads it.
#[derive(Debug, Clone, PartialEq)]
pub struct CellValue {
    pub row: u32,
    pub col: u32,
    pub text: String,
    pub value: Value,
    pub color: Option<String>,
    pub is_date: bool,
}

impl CellValue {
    pub fn new(row: u32, col: u32, value: Value) -> Self {
        Self {
            row,
            col,
            text: value.to_string(),
            value,
            color: None,
            is_date: false,
        }
    }
}
