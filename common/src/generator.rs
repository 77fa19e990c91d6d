use std::collections::HashSet;

use rand::{Rng, seq::SliceRandom};
use tracing::{debug, instrument, warn};

use crate::{board::Board, models::Pos};

/// Lays out `mines` mines on a `rows x cols` board, never on `first` or any of
/// its neighbors, and fills in the neighbor counts.
///
/// When the request does not fit outside that forbidden zone the count is
/// clamped to the number of free cells instead of failing.
#[instrument(level = "trace", skip(rng))]
pub fn generate<R: Rng + ?Sized>(
    rows: usize,
    cols: usize,
    mines: usize,
    first: Pos,
    rng: &mut R,
) -> Board {
    let mut board = Board::empty(rows, cols);

    let forbidden: HashSet<Pos> = board
        .neighbors(first)
        .chain(board.contains(first).then_some(first))
        .collect();

    let mut pool: Vec<Pos> = board
        .positions()
        .filter(|pos| !forbidden.contains(pos))
        .collect();

    let count = if mines > pool.len() {
        warn!(
            "Requested {} mines but only {} cells are outside the safe zone, clamping",
            mines,
            pool.len()
        );
        pool.len()
    } else {
        mines
    };

    let (chosen, _) = pool.partial_shuffle(rng, count);
    for &pos in chosen.iter() {
        if let Some(cell) = board.get_mut(pos) {
            cell.mine = true;
        }
    }
    board.recount();

    debug!(
        "Generated {}x{} board with {} mines, safe cell {}",
        rows, cols, count, first
    );
    board
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::MINE_SENTINEL;
    use rand::{SeedableRng, rngs::StdRng};

    fn mines_in_block(board: &Board, center: Pos) -> usize {
        board
            .neighbors(center)
            .chain(std::iter::once(center))
            .filter(|&pos| board.get(pos).unwrap().is_mine())
            .count()
    }

    #[test]
    fn beginner_board_keeps_first_click_block_clear() {
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let board = generate(9, 9, 10, Pos::new(4, 4), &mut rng);

            assert_eq!(board.mine_count(), 10);
            assert_eq!(mines_in_block(&board, Pos::new(4, 4)), 0, "seed {seed}");
        }
    }

    #[test]
    fn corner_first_click_only_reserves_four_cells() {
        let mut rng = StdRng::seed_from_u64(7);
        let board = generate(3, 3, 100, Pos::new(0, 0), &mut rng);

        assert_eq!(board.mine_count(), 5);
        assert_eq!(mines_in_block(&board, Pos::new(0, 0)), 0);
    }

    #[test]
    fn excess_mines_are_clamped_not_rejected() {
        let mut rng = StdRng::seed_from_u64(1);
        let board = generate(5, 5, 25, Pos::new(2, 2), &mut rng);

        assert_eq!(board.mine_count(), 16);

        let board = generate(3, 3, 4, Pos::new(1, 1), &mut rng);
        assert_eq!(board.mine_count(), 0);
    }

    #[test]
    fn counts_match_exact_neighborhoods() {
        let mut rng = StdRng::seed_from_u64(99);
        let board = generate(16, 30, 99, Pos::new(8, 15), &mut rng);

        for (pos, cell) in board.iter() {
            if cell.is_mine() {
                assert_eq!(cell.adjacent, MINE_SENTINEL);
            } else {
                let expected = board
                    .neighbors(pos)
                    .filter(|&n| board.get(n).unwrap().is_mine())
                    .count() as i8;
                assert_eq!(cell.adjacent, expected, "at {pos}");
            }
        }
    }

    #[test]
    fn same_seed_gives_same_layout() {
        let first = generate(9, 9, 10, Pos::new(0, 8), &mut StdRng::seed_from_u64(42));
        let second = generate(9, 9, 10, Pos::new(0, 8), &mut StdRng::seed_from_u64(42));

        assert_eq!(first, second);
    }
}
