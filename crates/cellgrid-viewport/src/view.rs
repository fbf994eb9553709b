//! Viewport assembly: scrollable region plus frozen bands.

use cellgrid_common::HiddenRange;

use crate::position::{PositionCache, Size};
use crate::range::{get_axis_range, AxisRange};

/// Host-supplied sizing and visibility metadata for one sheet.
/// Hidden intervals must be normalised (constructor does this).
pub trait AxisSizing {
    fn row_height(&self, row: u32) -> f64;
    fn col_width(&self, col: u32) -> f64;
    fn hidden_rows(&self) -> &[HiddenRange];
    fn hidden_cols(&self) -> &[HiddenRange];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewRegion {
    Normal,
    FrozenTop,
    FrozenLeft,
    FrozenCorner,
}

/// One renderable band: visible indices with pixel sizes on both
/// axes, plus the clip under-shoot of the first row/column.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewRange {
    pub region: ViewRegion,
    pub rows: Vec<u32>,
    pub row_sizes: Vec<f64>,
    pub cols: Vec<u32>,
    pub col_sizes: Vec<f64>,
    pub width: f64,
    pub height: f64,
    pub start_row_offset: f64,
    pub start_col_offset: f64,
}

impl ViewRange {
    fn from_axes(region: ViewRegion, rows: AxisRange, cols: AxisRange) -> Self {
        Self {
            region,
            width: cols.length,
            height: rows.length,
            start_row_offset: rows.start_offset,
            start_col_offset: cols.start_offset,
            rows: rows.indexes,
            row_sizes: rows.sizes,
            cols: cols.indexes,
            col_sizes: cols.sizes,
        }
    }
}

/// The stitched picture: the scrollable region and up to three
/// frozen bands.
#[derive(Debug, Clone, PartialEq)]
pub struct FrozenView {
    pub normal: ViewRange,
    pub top: Option<ViewRange>,
    pub left: Option<ViewRange>,
    pub corner: Option<ViewRange>,
}

/// Scroll state and freeze configuration for one sheet. Holds no
/// sizing data itself; every query takes the host's `AxisSizing` and
/// the per-axis caches `&mut`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GridView {
    pub frozen_rows: u32,
    pub frozen_cols: u32,
    pub scroll_x: f64,
    pub scroll_y: f64,
}

impl GridView {
    pub fn new(frozen_rows: u32, frozen_cols: u32) -> Self {
        Self {
            frozen_rows,
            frozen_cols,
            scroll_x: 0.0,
            scroll_y: 0.0,
        }
    }

    fn frozen_row_band(&self, sizing: &dyn AxisSizing, cache: &mut PositionCache) -> AxisRange {
        axis_prefix(
            self.frozen_rows,
            &|r| sizing.row_height(r),
            sizing.hidden_rows(),
            cache,
        )
    }

    fn frozen_col_band(&self, sizing: &dyn AxisSizing, cache: &mut PositionCache) -> AxisRange {
        axis_prefix(
            self.frozen_cols,
            &|c| sizing.col_width(c),
            sizing.hidden_cols(),
            cache,
        )
    }

    /// Rows of the scrollable region. The window starts at the frozen
    /// boundary (zero scroll lands on the first unfrozen row) and the
    /// scroll position rides in as the shift.
    fn scroll_rows(
        &self,
        height: f64,
        frozen_height: f64,
        sizing: &dyn AxisSizing,
        cache: &mut PositionCache,
    ) -> AxisRange {
        get_axis_range(
            frozen_height,
            self.scroll_y,
            height - frozen_height,
            &|r| sizing.row_height(r),
            sizing.hidden_rows(),
            cache,
        )
    }

    fn scroll_cols(
        &self,
        width: f64,
        frozen_width: f64,
        sizing: &dyn AxisSizing,
        cache: &mut PositionCache,
    ) -> AxisRange {
        get_axis_range(
            frozen_width,
            self.scroll_x,
            width - frozen_width,
            &|c| sizing.col_width(c),
            sizing.hidden_cols(),
            cache,
        )
    }

    /// The scrollable region of a `width` x `height` viewport.
    pub fn view_range(
        &self,
        width: f64,
        height: f64,
        sizing: &dyn AxisSizing,
        row_cache: &mut PositionCache,
        col_cache: &mut PositionCache,
    ) -> ViewRange {
        let frozen_height = self.frozen_row_band(sizing, row_cache).length;
        let frozen_width = self.frozen_col_band(sizing, col_cache).length;
        let rows = self.scroll_rows(height, frozen_height, sizing, row_cache);
        let cols = self.scroll_cols(width, frozen_width, sizing, col_cache);
        ViewRange::from_axes(ViewRegion::Normal, rows, cols)
    }

    /// Frozen rows across the scrollable columns. Zero scroll on the
    /// frozen axis, live scroll on the free one.
    pub fn frozen_top_range(
        &self,
        width: f64,
        sizing: &dyn AxisSizing,
        row_cache: &mut PositionCache,
        col_cache: &mut PositionCache,
    ) -> Option<ViewRange> {
        if self.frozen_rows == 0 {
            return None;
        }
        let rows = self.frozen_row_band(sizing, row_cache);
        let frozen_width = self.frozen_col_band(sizing, col_cache).length;
        let cols = self.scroll_cols(width, frozen_width, sizing, col_cache);
        Some(ViewRange::from_axes(ViewRegion::FrozenTop, rows, cols))
    }

    /// Frozen columns across the scrollable rows.
    pub fn frozen_left_range(
        &self,
        height: f64,
        sizing: &dyn AxisSizing,
        row_cache: &mut PositionCache,
        col_cache: &mut PositionCache,
    ) -> Option<ViewRange> {
        if self.frozen_cols == 0 {
            return None;
        }
        let cols = self.frozen_col_band(sizing, col_cache);
        let frozen_height = self.frozen_row_band(sizing, row_cache).length;
        let rows = self.scroll_rows(height, frozen_height, sizing, row_cache);
        Some(ViewRange::from_axes(ViewRegion::FrozenLeft, rows, cols))
    }

    /// The fully frozen corner block.
    pub fn frozen_top_left_range(
        &self,
        sizing: &dyn AxisSizing,
        row_cache: &mut PositionCache,
        col_cache: &mut PositionCache,
    ) -> Option<ViewRange> {
        if self.frozen_rows == 0 || self.frozen_cols == 0 {
            return None;
        }
        let rows = self.frozen_row_band(sizing, row_cache);
        let cols = self.frozen_col_band(sizing, col_cache);
        Some(ViewRange::from_axes(ViewRegion::FrozenCorner, rows, cols))
    }

    /// All bands of the viewport in one call.
    pub fn frozen_view(
        &self,
        width: f64,
        height: f64,
        sizing: &dyn AxisSizing,
        row_cache: &mut PositionCache,
        col_cache: &mut PositionCache,
    ) -> FrozenView {
        FrozenView {
            normal: self.view_range(width, height, sizing, row_cache, col_cache),
            top: self.frozen_top_range(width, sizing, row_cache, col_cache),
            left: self.frozen_left_range(height, sizing, row_cache, col_cache),
            corner: self.frozen_top_left_range(sizing, row_cache, col_cache),
        }
    }
}

/// First `count` indices of an axis, hidden ones excluded, extending
/// the cache as needed. Frozen bands always start at index 0, so this
/// never needs a window search.
fn axis_prefix(
    count: u32,
    get_size: &dyn Fn(u32) -> f64,
    hidden: &[HiddenRange],
    cache: &mut PositionCache,
) -> AxisRange {
    let mut indexes = Vec::new();
    let mut sizes = Vec::new();
    let mut total = 0.0;
    let mut pixel = 0.0;
    for idx in 0..count {
        let hidden_here = hidden.iter().any(|h| h.contains(idx));
        let entry = match cache.get(idx) {
            Some(e) => e,
            None => {
                let size = if hidden_here { 0.0 } else { get_size(idx).max(0.0) };
                let e = Size {
                    offset: pixel,
                    size: if size.is_finite() { size } else { 0.0 },
                };
                cache.push(e);
                e
            }
        };
        pixel = entry.end();
        if hidden_here {
            continue;
        }
        indexes.push(idx);
        sizes.push(entry.size);
        total += entry.size;
    }
    AxisRange {
        indexes,
        sizes,
        start_offset: 0.0,
        length: total,
    }
}
