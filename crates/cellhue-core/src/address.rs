//! Cell addresses and rectangular ranges

use std::fmt;

/// A zero-based cell position, displayed in A1 notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellAddress {
    /// Row index (0-based internally, 1-based in display)
    pub row: u32,
    /// Column index (0-based, A=0)
    pub col: u32,
}

impl CellAddress {
    pub const fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Convert column index to letters (0 = A, 25 = Z, 26 = AA, etc.)
    pub fn column_to_letters(col: u32) -> String {
        let mut letters = Vec::new();
        let mut n = u64::from(col) + 1;
        while n > 0 {
            n -= 1;
            letters.push(b'A' + (n % 26) as u8);
            n /= 26;
        }
        letters.reverse();
        String::from_utf8(letters).unwrap_or_default()
    }

    pub fn to_a1_string(&self) -> String {
        format!("{}{}", Self::column_to_letters(self.col), u64::from(self.row) + 1)
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_a1_string())
    }
}

/// An inclusive rectangle of cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRange {
    /// Top-left
    pub start: CellAddress,
    /// Bottom-right
    pub end: CellAddress,
}

impl CellRange {
    /// Build a range from two corners in any order.
    pub fn new(a: CellAddress, b: CellAddress) -> Self {
        Self {
            start: CellAddress::new(a.row.min(b.row), a.col.min(b.col)),
            end: CellAddress::new(a.row.max(b.row), a.col.max(b.col)),
        }
    }

    pub fn single(addr: CellAddress) -> Self {
        Self {
            start: addr,
            end: addr,
        }
    }

    pub fn row_count(&self) -> u64 {
        u64::from(self.end.row - self.start.row) + 1
    }

    pub fn col_count(&self) -> u64 {
        u64::from(self.end.col - self.start.col) + 1
    }

    pub fn cell_count(&self) -> u64 {
        self.row_count() * self.col_count()
    }

    /// Every address in the range, row by row, left to right.
    pub fn cells(&self) -> RowMajor {
        RowMajor {
            range: *self,
            next: Some(self.start),
        }
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}:{}", self.start, self.end)
        }
    }
}

/// Row-major iterator over a [`CellRange`].
#[derive(Debug, Clone)]
pub struct RowMajor {
    range: CellRange,
    next: Option<CellAddress>,
}

impl Iterator for RowMajor {
    type Item = CellAddress;

    fn next(&mut self) -> Option<CellAddress> {
        let current = self.next?;
        self.next = if current.col < self.range.end.col {
            Some(CellAddress::new(current.row, current.col + 1))
        } else if current.row < self.range.end.row {
            Some(CellAddress::new(current.row + 1, self.range.start.col))
        } else {
            None
        };
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_to_letters() {
        assert_eq!(CellAddress::column_to_letters(0), "A");
        assert_eq!(CellAddress::column_to_letters(25), "Z");
        assert_eq!(CellAddress::column_to_letters(26), "AA");
        assert_eq!(CellAddress::column_to_letters(701), "ZZ");
        assert_eq!(CellAddress::column_to_letters(702), "AAA");
        assert_eq!(CellAddress::column_to_letters(16383), "XFD");
    }

    #[test]
    fn test_display() {
        assert_eq!(CellAddress::new(11, 2).to_string(), "C12");
        assert_eq!(CellAddress::new(0, 16383).to_a1_string(), "XFD1");
    }

    #[test]
    fn test_range_normalizes_corners() {
        let range = CellRange::new(CellAddress::new(2, 2), CellAddress::new(0, 0));
        assert_eq!(range.to_string(), "A1:C3");
        assert_eq!(range.cell_count(), 9);
        assert_eq!(CellRange::single(CellAddress::new(4, 1)).to_string(), "B5");
    }

    #[test]
    fn test_row_major_order() {
        let range = CellRange::new(CellAddress::new(1, 1), CellAddress::new(2, 2));
        let cells: Vec<String> = range.cells().map(|a| a.to_string()).collect();
        assert_eq!(cells, ["B2", "C2", "B3", "C3"]);
        assert_eq!(CellRange::single(CellAddress::new(0, 0)).cells().count(), 1);
    }
}
