use crate::{
    grid,
    models::{CellView, Pos},
};

/// `adjacent` value stored on mine cells.
pub const MINE_SENTINEL: i8 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CellState {
    #[default]
    Hidden,
    Flagged,
    Revealed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cell {
    pub mine: bool,
    /// Mine neighbors in `0..=8`, or [`MINE_SENTINEL`] for a mine.
    pub adjacent: i8,
    pub state: CellState,
}

impl Cell {
    pub const fn is_mine(&self) -> bool {
        self.mine
    }

    pub const fn is_revealed(&self) -> bool {
        matches!(self.state, CellState::Revealed)
    }

    pub const fn is_flagged(&self) -> bool {
        matches!(self.state, CellState::Flagged)
    }

    pub const fn is_hidden(&self) -> bool {
        matches!(self.state, CellState::Hidden)
    }
}

impl From<&Cell> for CellView {
    fn from(value: &Cell) -> Self {
        match value.state {
            CellState::Hidden => Self::Hidden,
            CellState::Flagged => Self::Flagged,
            CellState::Revealed if value.mine => Self::Mine,
            CellState::Revealed => Self::Revealed {
                adjacent: value.adjacent.max(0) as u8,
            },
        }
    }
}

/// Row-major grid of cells. Owned by exactly one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    rows: usize,
    cols: usize,
    cells: Vec<Cell>,
}

impl Board {
    /// A board without mines, as it exists before the first click.
    pub fn empty(rows: usize, cols: usize) -> Self {
        let rows = rows.max(1);
        let cols = cols.max(1);
        Self {
            rows,
            cols,
            cells: vec![Cell::default(); rows * cols],
        }
    }

    /// Builds a board from explicit mine positions and fills in the counts.
    /// Out-of-range positions are ignored.
    pub fn with_mines(rows: usize, cols: usize, mines: &[Pos]) -> Self {
        let mut board = Self::empty(rows, cols);
        for &pos in mines {
            if let Some(cell) = board.get_mut(pos) {
                cell.mine = true;
            }
        }
        board.recount();
        board
    }

    pub const fn rows(&self) -> usize {
        self.rows
    }

    pub const fn cols(&self) -> usize {
        self.cols
    }

    pub const fn total_cells(&self) -> usize {
        self.rows * self.cols
    }

    pub fn contains(&self, pos: Pos) -> bool {
        pos.row < self.rows && pos.col < self.cols
    }

    pub fn get(&self, pos: Pos) -> Option<&Cell> {
        if self.contains(pos) {
            self.cells.get(self.index(pos))
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, pos: Pos) -> Option<&mut Cell> {
        if self.contains(pos) {
            let index = self.index(pos);
            self.cells.get_mut(index)
        } else {
            None
        }
    }

    pub fn neighbors(&self, pos: Pos) -> grid::Neighbors {
        grid::neighbors(self.rows, self.cols, pos.row, pos.col)
    }

    pub fn positions(&self) -> impl Iterator<Item = Pos> + use<> {
        let cols = self.cols;
        (0..self.total_cells()).map(move |index| Pos {
            row: index / cols,
            col: index % cols,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (Pos, &Cell)> {
        self.positions().zip(self.cells.iter())
    }

    pub fn mine_count(&self) -> usize {
        self.cells.iter().filter(|cell| cell.mine).count()
    }

    pub fn flag_count(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_flagged()).count()
    }

    /// Recomputes every `adjacent` value from the current mine layout.
    pub fn recount(&mut self) {
        for index in 0..self.cells.len() {
            let pos = Pos {
                row: index / self.cols,
                col: index % self.cols,
            };

            let adjacent = if self.cells[index].mine {
                MINE_SENTINEL
            } else {
                self.neighbors(pos)
                    .filter(|&neighbor| self.cells[self.index(neighbor)].mine)
                    .count() as i8
            };
            self.cells[index].adjacent = adjacent;
        }
    }

    /// Player-visible rows, as sent to the rendering layer.
    pub fn view(&self) -> Vec<Vec<CellView>> {
        self.cells
            .chunks(self.cols)
            .map(|row| row.iter().map(CellView::from).collect())
            .collect()
    }

    fn index(&self, pos: Pos) -> usize {
        pos.row * self.cols + pos.col
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_follow_mine_layout() {
        let board = Board::with_mines(3, 3, &[Pos::new(0, 0), Pos::new(2, 2)]);

        assert_eq!(board.mine_count(), 2);
        assert_eq!(board.get(Pos::new(0, 0)).unwrap().adjacent, MINE_SENTINEL);
        assert_eq!(board.get(Pos::new(1, 1)).unwrap().adjacent, 2);
        assert_eq!(board.get(Pos::new(0, 2)).unwrap().adjacent, 0);
        assert_eq!(board.get(Pos::new(1, 0)).unwrap().adjacent, 1);
    }

    #[test]
    fn view_hides_unrevealed_mines() {
        let mut board = Board::with_mines(1, 2, &[Pos::new(0, 0)]);
        assert_eq!(board.view(), vec![vec![CellView::Hidden, CellView::Hidden]]);

        board.get_mut(Pos::new(0, 0)).unwrap().state = CellState::Revealed;
        board.get_mut(Pos::new(0, 1)).unwrap().state = CellState::Revealed;
        assert_eq!(
            board.view(),
            vec![vec![CellView::Mine, CellView::Revealed { adjacent: 1 }]]
        );
    }

    #[test]
    fn lookups_outside_the_grid_return_none() {
        let mut board = Board::empty(2, 3);
        assert!(board.get(Pos::new(2, 0)).is_none());
        assert!(board.get_mut(Pos::new(0, 3)).is_none());
        assert_eq!(board.positions().count(), 6);
        assert_eq!(board.positions().last(), Some(Pos::new(1, 2)));
    }
}
