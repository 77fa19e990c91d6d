//! Player actions applied to a [`Board`].
//!
//! Every mutating function records the positions it touched in `changed`,
//! in the order they changed, so callers can forward minimal updates.

use std::ops::BitOr;

use crate::{
    board::{Board, CellState},
    models::Pos,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RevealOutcome {
    NoChange,
    Revealed,
    HitMine,
}

impl BitOr for RevealOutcome {
    type Output = RevealOutcome;

    fn bitor(self, rhs: Self) -> Self::Output {
        use RevealOutcome::*;
        match (self, rhs) {
            (HitMine, _) | (_, HitMine) => HitMine,
            (Revealed, _) | (_, Revealed) => Revealed,
            (NoChange, NoChange) => NoChange,
        }
    }
}

/// Reveals one hidden cell, cascading through empty regions.
pub fn reveal_single(board: &mut Board, pos: Pos, changed: &mut Vec<Pos>) -> RevealOutcome {
    let Some(cell) = board.get_mut(pos) else {
        return RevealOutcome::NoChange;
    };

    if !cell.is_hidden() {
        return RevealOutcome::NoChange;
    }

    if cell.mine {
        cell.state = CellState::Revealed;
        changed.push(pos);
        return RevealOutcome::HitMine;
    }

    flood_reveal(board, pos, changed);
    RevealOutcome::Revealed
}

/// Reveals `start` and, while the revealed cells have no mine neighbors, keeps
/// opening outward. Numbered cells on the border are revealed but stop the
/// cascade. Flagged, revealed and mine cells are never touched.
///
/// Returns the number of cells revealed.
pub fn flood_reveal(board: &mut Board, start: Pos, changed: &mut Vec<Pos>) -> usize {
    if !open(board, start, changed) {
        return 0;
    }

    let mut revealed = 1;
    let mut stack = vec![start];

    while let Some(pos) = stack.pop() {
        if board.get(pos).is_none_or(|cell| cell.adjacent != 0) {
            continue;
        }

        for neighbor in board.neighbors(pos) {
            if open(board, neighbor, changed) {
                revealed += 1;
                stack.push(neighbor);
            }
        }
    }

    revealed
}

/// Reveals every hidden neighbor of a revealed number once the player has
/// flagged exactly that many neighbors. Mines among them are revealed too and
/// turn the whole chord into [`RevealOutcome::HitMine`].
pub fn chord_reveal(board: &mut Board, pos: Pos, changed: &mut Vec<Pos>) -> RevealOutcome {
    let Some(cell) = board.get(pos) else {
        return RevealOutcome::NoChange;
    };

    if !cell.is_revealed() || cell.mine || cell.adjacent <= 0 {
        return RevealOutcome::NoChange;
    }

    if count_flagged_neighbors(board, pos) != cell.adjacent as u8 {
        return RevealOutcome::NoChange;
    }

    board
        .neighbors(pos)
        .map(|neighbor| reveal_single(board, neighbor, changed))
        .fold(RevealOutcome::NoChange, BitOr::bitor)
}

/// Flips the flag on a hidden cell. Returns the change to the flag counter.
pub fn toggle_flag(board: &mut Board, pos: Pos, changed: &mut Vec<Pos>) -> i32 {
    let Some(cell) = board.get_mut(pos) else {
        return 0;
    };

    let delta = match cell.state {
        CellState::Hidden => {
            cell.state = CellState::Flagged;
            1
        }
        CellState::Flagged => {
            cell.state = CellState::Hidden;
            -1
        }
        CellState::Revealed => return 0,
    };

    changed.push(pos);
    delta
}

pub fn count_flagged_neighbors(board: &Board, pos: Pos) -> u8 {
    board
        .neighbors(pos)
        .filter(|&neighbor| board.get(neighbor).is_some_and(|cell| cell.is_flagged()))
        .count() as u8
}

/// Exposes every mine on the board, flagged or not.
pub fn reveal_all_mines(board: &mut Board, changed: &mut Vec<Pos>) {
    for pos in board.positions() {
        if let Some(cell) = board.get_mut(pos)
            && cell.mine
            && !cell.is_revealed()
        {
            cell.state = CellState::Revealed;
            changed.push(pos);
        }
    }
}

/// Flags every mine that is not flagged yet. Used for the won-board display.
pub fn flag_all_mines(board: &mut Board, changed: &mut Vec<Pos>) {
    for pos in board.positions() {
        if let Some(cell) = board.get_mut(pos)
            && cell.mine
            && !cell.is_flagged()
        {
            cell.state = CellState::Flagged;
            changed.push(pos);
        }
    }
}

pub fn revealed_safe_count(board: &Board) -> usize {
    board
        .iter()
        .filter(|(_, cell)| cell.is_revealed() && !cell.mine)
        .count()
}

/// True once every non-mine cell is revealed.
pub fn is_cleared(board: &Board) -> bool {
    revealed_safe_count(board) == board.total_cells() - board.mine_count()
}

fn open(board: &mut Board, pos: Pos, changed: &mut Vec<Pos>) -> bool {
    match board.get_mut(pos) {
        Some(cell) if cell.is_hidden() && !cell.mine => {
            cell.state = CellState::Revealed;
            changed.push(pos);
            true
        }
        _ => false,
    }
}
