//! Card grid geometry shared by the reducer and the renderer.

use std::ops::Range;

pub const CARD_WIDTH: u16 = 30;
pub const CARD_HEIGHT: u16 = 14;
/// Header and footer rows around the grid.
pub const CHROME_ROWS: u16 = 6;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridLayout {
    pub columns: usize,
    pub viewport_height: u16,
}

impl GridLayout {
    pub fn for_terminal(width: u16, height: u16) -> Self {
        Self {
            columns: usize::from(width / CARD_WIDTH).max(1),
            viewport_height: height.saturating_sub(CHROME_ROWS),
        }
    }

    /// Card rows that fit in the viewport, at least one.
    pub fn visible_rows(&self) -> usize {
        usize::from(self.viewport_height / CARD_HEIGHT).max(1)
    }

    pub fn total_rows(&self, count: usize) -> usize {
        count.div_ceil(self.columns)
    }

    pub fn row_of(&self, index: usize) -> usize {
        index / self.columns
    }

    pub fn row_offset(&self, row: usize) -> u32 {
        row as u32 * u32::from(CARD_HEIGHT)
    }

    pub fn content_height(&self, count: usize) -> u32 {
        self.row_offset(self.total_rows(count))
    }

    pub fn max_first_row(&self, count: usize) -> usize {
        self.total_rows(count).saturating_sub(self.visible_rows())
    }

    /// Positions in the rendered list that are on screen.
    pub fn visible_range(&self, first_row: usize, count: usize) -> Range<usize> {
        let start = (first_row * self.columns).min(count);
        let end = ((first_row + self.visible_rows()) * self.columns).min(count);
        start..end
    }

    /// First row that keeps `index` on screen with the least movement.
    pub fn reveal(&self, first_row: usize, index: usize) -> usize {
        let row = self.row_of(index);
        if row < first_row {
            row
        } else if row >= first_row + self.visible_rows() {
            row + 1 - self.visible_rows()
        } else {
            first_row
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_never_drop_below_one() {
        let layout = GridLayout::for_terminal(10, 40);
        assert_eq!(layout.columns, 1);
        let layout = GridLayout::for_terminal(125, 40);
        assert_eq!(layout.columns, 4);
    }

    #[test]
    fn visible_range_clamps_to_count() {
        let layout = GridLayout::for_terminal(120, 6 + 2 * CARD_HEIGHT);
        assert_eq!(layout.visible_rows(), 2);
        assert_eq!(layout.visible_range(0, 50), 0..8);
        assert_eq!(layout.visible_range(12, 50), 48..50);
        assert_eq!(layout.visible_range(20, 50), 50..50);
    }

    #[test]
    fn reveal_scrolls_minimally() {
        let layout = GridLayout::for_terminal(60, 6 + 2 * CARD_HEIGHT);
        assert_eq!(layout.reveal(0, 3), 0);
        assert_eq!(layout.reveal(0, 4), 1);
        assert_eq!(layout.reveal(3, 1), 0);
    }

    #[test]
    fn content_height_counts_partial_rows() {
        let layout = GridLayout::for_terminal(90, 40);
        assert_eq!(layout.content_height(0), 0);
        assert_eq!(layout.content_height(4), 2 * u32::from(CARD_HEIGHT));
        assert_eq!(layout.max_first_row(4), 0);
    }
}
