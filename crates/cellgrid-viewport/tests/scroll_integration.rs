use std::cell::Cell;

use cellgrid_common::HiddenRange;
use cellgrid_viewport::{
    binary_search_size, get_axis_range, hit_test, AxisSizing, GridView, HitTestKind,
    HitTestLayout, PositionCache, Size,
};
use proptest::prelude::*;

/// Variable row heights with a measurement counter, the shape a host
/// sheet model takes.
struct CountingSheet {
    measurements: Cell<u32>,
    hidden_rows: Vec<HiddenRange>,
}

impl CountingSheet {
    fn new(hidden_rows: Vec<HiddenRange>) -> Self {
        Self {
            measurements: Cell::new(0),
            hidden_rows,
        }
    }

    fn height_of(&self, row: u32) -> f64 {
        self.measurements.set(self.measurements.get() + 1);
        if row % 10 == 0 {
            40.0
        } else {
            20.0
        }
    }
}

impl AxisSizing for CountingSheet {
    fn row_height(&self, row: u32) -> f64 {
        self.height_of(row)
    }
    fn col_width(&self, _col: u32) -> f64 {
        50.0
    }
    fn hidden_rows(&self) -> &[HiddenRange] {
        &self.hidden_rows
    }
    fn hidden_cols(&self) -> &[HiddenRange] {
        &[]
    }
}

#[test]
fn smooth_scroll_amortises_measurement() {
    let sheet = CountingSheet::new(Vec::new());
    let mut cache = PositionCache::new();
    let get = |r: u32| sheet.height_of(r);

    get_axis_range(0.0, 0.0, 400.0, &get, &[], &mut cache);
    let cold = sheet.measurements.get();
    assert!(cold > 0);

    // A long sequence of small scroll deltas touches each new row
    // exactly once.
    for step in 1..=50u32 {
        get_axis_range(0.0, f64::from(step) * 10.0, 400.0, &get, &[], &mut cache);
    }
    let warm = sheet.measurements.get();
    assert_eq!(u64::from(warm), u64::from(cache.len()));

    // Scrolling back re-reads the cache without measuring at all.
    get_axis_range(0.0, 0.0, 400.0, &get, &[], &mut cache);
    assert_eq!(sheet.measurements.get(), warm);
}

#[test]
fn hidden_block_never_measured() {
    let sheet = CountingSheet::new(vec![HiddenRange::new(5, 14)]);
    let mut cache = PositionCache::new();
    let get = |r: u32| sheet.height_of(r);

    let range = get_axis_range(0.0, 0.0, 300.0, &get, sheet.hidden_rows(), &mut cache);
    assert!(range.indexes.iter().all(|&r| !(5..=14).contains(&r)));
    // Every cached entry in the hidden block is zero-sized.
    for r in 5..=14 {
        assert_eq!(cache.get(r).unwrap().size, 0.0);
    }
    // Measurements cover only the visible indices that were scanned.
    assert_eq!(
        u64::from(sheet.measurements.get()),
        u64::from(cache.len()) - 10
    );
}

#[test]
fn frozen_view_and_hit_test_agree_on_geometry() {
    let sheet = CountingSheet::new(Vec::new());
    let mut grid = GridView::new(2, 0);
    grid.scroll_y = 30.0;
    let (mut rows, mut cols) = (PositionCache::new(), PositionCache::new());
    let view = grid.frozen_view(300.0, 240.0, &sheet, &mut rows, &mut cols);

    let top = view.top.as_ref().unwrap();
    // Rows 0 (40px) and 1 (20px) freeze into a 60px band.
    assert_eq!(top.rows, vec![0, 1]);
    assert_eq!(top.height, 60.0);
    assert_eq!(view.normal.rows[0], 3); // row 2 scrolled 30px away
    assert_eq!(view.normal.start_row_offset, -10.0);

    let layout = HitTestLayout {
        header_width: 40.0,
        header_height: 20.0,
        view: &view,
        merges: &[],
        drawings: &[],
    };
    // Inside the frozen strip: rows resolve against the band, not
    // the scrolled region.
    let frozen_hit = hit_test(100.0, 30.0, &layout).unwrap();
    assert_eq!(frozen_hit.kind, HitTestKind::Cell);
    assert_eq!(frozen_hit.real_row, 0);

    // First pixel rows of the scroll area belong to the partially
    // clipped row 3.
    let scrolled_hit = hit_test(100.0, 85.0, &layout).unwrap();
    assert_eq!(scrolled_hit.real_row, 3);
}

proptest! {
    /// Binary search over cumulative intervals agrees with a linear
    /// scan for arbitrary size vectors (zero sizes included).
    #[test]
    fn binary_search_matches_linear_scan(
        raw in proptest::collection::vec(0u32..40, 1..64),
        probe in 0.0f64..2000.0,
    ) {
        let mut sizes = Vec::with_capacity(raw.len());
        let mut offset = 0.0;
        for r in raw {
            let size = f64::from(r);
            sizes.push(Size { offset, size });
            offset += size;
        }
        let linear = sizes
            .iter()
            .position(|s| probe >= s.offset && probe < s.offset + s.size);
        prop_assert_eq!(binary_search_size(&sizes, probe), linear);
    }
}
