use crate::models::Pos;

/// Offsets of the 3x3 block around a cell, row-major, center skipped.
const DISPLACEMENTS: [(isize, isize); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

pub fn in_bounds(rows: usize, cols: usize, row: isize, col: isize) -> bool {
    row >= 0 && col >= 0 && (row as usize) < rows && (col as usize) < cols
}

/// Iterates over the in-bounds neighbors of `(row, col)` on a `rows x cols` grid.
pub fn neighbors(rows: usize, cols: usize, row: usize, col: usize) -> Neighbors {
    Neighbors {
        rows,
        cols,
        center: (row as isize, col as isize),
        index: 0,
    }
}

#[derive(Debug, Clone)]
pub struct Neighbors {
    rows: usize,
    cols: usize,
    center: (isize, isize),
    index: usize,
}

impl Iterator for Neighbors {
    type Item = Pos;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(&(dr, dc)) = DISPLACEMENTS.get(self.index) {
            self.index += 1;

            let row = self.center.0 + dr;
            let col = self.center.1 + dc;
            if in_bounds(self.rows, self.cols, row, col) {
                return Some(Pos {
                    row: row as usize,
                    col: col as usize,
                });
            }
        }

        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(DISPLACEMENTS.len() - self.index))
    }
}
