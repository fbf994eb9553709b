//! Sparse-grid viewport engine: amortised pixel positions, frozen
//! bands, merge resolution, and hit testing.

pub mod hittest;
pub mod merge;
pub mod position;
pub mod range;
pub mod view;

pub use hittest::{hit_test, HitTestKind, HitTestLayout, HitTestResult, Rect, GRID_HIT_THRESHOLD};
pub use merge::cell_to_merge_cell;
pub use position::{binary_search_size, PositionCache, Size};
pub use range::{get_axis_range, AxisRange, MAX_SCAN_STEPS};
pub use view::{AxisSizing, FrozenView, GridView, ViewRange, ViewRegion};

pub use cellgrid_common as common;
