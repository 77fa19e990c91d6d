use rand::Rng;
use tracing::{debug, info, instrument};

use crate::{
    board::{Board, CellState},
    clock::Clock,
    generator,
    models::{BoardConfig, Difficulty, Pos, SessionState, Snapshot},
    reveal::{self, RevealOutcome},
};

/// Reported once when a session is won.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub elapsed_seconds: u64,
    pub difficulty: Difficulty,
    /// False when a preset was played on a non-standard board size.
    pub ranked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Won(Completion),
    Lost { triggered: Pos },
}

/// Result of one intent: the cells that changed and, on the terminal
/// transition only, how the session ended.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    pub changed: Vec<Pos>,
    pub outcome: Option<Outcome>,
}

impl Update {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.outcome.is_none()
    }
}

/// One game from the first click to a win or loss.
///
/// Mines are laid out lazily on the first reveal so that the clicked cell
/// and its neighbors are always safe.
pub struct Session<C, R> {
    config: BoardConfig,
    difficulty: Difficulty,
    board: Board,
    generated: bool,
    mines: usize,
    state: SessionState,
    flags_placed: usize,
    completed: bool,
    clock: C,
    rng: R,
}

impl<C: Clock, R: Rng> Session<C, R> {
    pub fn new(config: BoardConfig, difficulty: Difficulty, mut clock: C, rng: R) -> Self {
        clock.reset();
        Self {
            config,
            difficulty,
            board: Board::empty(config.rows, config.cols),
            generated: false,
            mines: config.mines,
            state: SessionState::NotStarted,
            flags_placed: 0,
            completed: false,
            clock,
            rng,
        }
    }

    /// Starts a session on a fixed layout instead of generating one on the
    /// first click.
    pub fn from_layout(board: Board, difficulty: Difficulty, clock: C, rng: R) -> Self {
        let config = BoardConfig {
            rows: board.rows(),
            cols: board.cols(),
            mines: board.mine_count(),
        };
        let mut session = Self::new(config, difficulty, clock, rng);
        session.flags_placed = board.flag_count();
        session.board = board;
        session.generated = true;
        session
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn config(&self) -> BoardConfig {
        self.config
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn flags_placed(&self) -> usize {
        self.flags_placed
    }

    /// Mines left to flag. Goes negative when the player over-flags.
    pub fn flags_remaining(&self) -> i64 {
        self.mines as i64 - self.flags_placed as i64
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.clock.elapsed_seconds()
    }

    pub fn is_first_click(&self) -> bool {
        self.state == SessionState::NotStarted
    }

    pub fn is_game_over(&self) -> bool {
        self.state.is_finished()
    }

    pub fn is_win(&self) -> bool {
        self.state.is_won()
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            rows: self.board.rows(),
            cols: self.board.cols(),
            difficulty: self.difficulty,
            cells: self.board.view(),
            flags_remaining: self.flags_remaining(),
            elapsed_seconds: self.elapsed_seconds(),
            state: self.state,
        }
    }

    #[instrument(level = "trace", skip(self), fields(row = pos.row, col = pos.col))]
    pub fn on_reveal(&mut self, pos: Pos) -> Update {
        if !self.accepts(pos) {
            return Update::default();
        }

        if !self.board.get(pos).is_some_and(|cell| cell.is_hidden()) {
            debug!("Ignoring reveal on non-hidden cell {}", pos);
            return Update::default();
        }

        if self.state == SessionState::NotStarted {
            self.begin(pos);
        }

        let mut changed = Vec::new();
        let outcome = reveal::reveal_single(&mut self.board, pos, &mut changed);
        self.settle(pos, outcome, changed)
    }

    #[instrument(level = "trace", skip(self), fields(row = pos.row, col = pos.col))]
    pub fn on_chord(&mut self, pos: Pos) -> Update {
        if !self.accepts(pos) || self.state != SessionState::InProgress {
            return Update::default();
        }

        let mut changed = Vec::new();
        let outcome = reveal::chord_reveal(&mut self.board, pos, &mut changed);
        self.settle(pos, outcome, changed)
    }

    #[instrument(level = "trace", skip(self), fields(row = pos.row, col = pos.col))]
    pub fn on_toggle_flag(&mut self, pos: Pos) -> Update {
        if !self.accepts(pos) {
            return Update::default();
        }

        let mut changed = Vec::new();
        match reveal::toggle_flag(&mut self.board, pos, &mut changed) {
            1 => self.flags_placed += 1,
            -1 => self.flags_placed = self.flags_placed.saturating_sub(1),
            _ => debug!("Ignoring flag on revealed cell {}", pos),
        }

        Update {
            changed,
            outcome: None,
        }
    }

    /// Throws the current game away and starts over with an empty board.
    pub fn on_reset(&mut self, config: BoardConfig, difficulty: Difficulty) {
        info!(
            "Resetting session: {}x{} with {} mines ({})",
            config.rows, config.cols, config.mines, difficulty
        );
        self.clock.reset();
        self.config = config;
        self.difficulty = difficulty;
        self.board = Board::empty(config.rows, config.cols);
        self.generated = false;
        self.mines = config.mines;
        self.state = SessionState::NotStarted;
        self.flags_placed = 0;
        self.completed = false;
    }

    fn accepts(&self, pos: Pos) -> bool {
        if self.state.is_finished() {
            debug!("Ignoring intent at {} on finished session", pos);
            return false;
        }
        if !self.board.contains(pos) {
            debug!("Ignoring intent at out-of-range {}", pos);
            return false;
        }
        true
    }

    /// Lays out mines around the first click and starts the clock.
    fn begin(&mut self, first: Pos) {
        if !self.generated {
            let mut board = generator::generate(
                self.config.rows,
                self.config.cols,
                self.config.mines,
                first,
                &mut self.rng,
            );

            for (pos, cell) in self.board.iter() {
                if cell.is_flagged()
                    && let Some(target) = board.get_mut(pos)
                {
                    target.state = CellState::Flagged;
                }
            }

            self.mines = board.mine_count();
            self.board = board;
            self.generated = true;
        }

        self.state = SessionState::InProgress;
        self.clock.start();
        debug!("Session started at {} with {} mines", first, self.mines);
    }

    fn settle(&mut self, pos: Pos, outcome: RevealOutcome, mut changed: Vec<Pos>) -> Update {
        let outcome = match outcome {
            RevealOutcome::NoChange => None,
            RevealOutcome::HitMine => {
                let triggered = changed
                    .iter()
                    .copied()
                    .find(|&candidate| self.board.get(candidate).is_some_and(|cell| cell.mine))
                    .unwrap_or(pos);
                Some(self.lose(triggered, &mut changed))
            }
            RevealOutcome::Revealed => self.check_win(&mut changed),
        };

        Update { changed, outcome }
    }

    fn lose(&mut self, pos: Pos, changed: &mut Vec<Pos>) -> Outcome {
        reveal::reveal_all_mines(&mut self.board, changed);
        self.flags_placed = self.board.flag_count();
        self.clock.stop();
        self.state = SessionState::Lost;
        info!(
            "Session lost at {} after {}s",
            pos,
            self.clock.elapsed_seconds()
        );
        Outcome::Lost { triggered: pos }
    }

    fn check_win(&mut self, changed: &mut Vec<Pos>) -> Option<Outcome> {
        if !reveal::is_cleared(&self.board) {
            return None;
        }

        self.clock.stop();
        self.state = SessionState::Won;
        reveal::flag_all_mines(&mut self.board, changed);
        self.flags_placed = self.mines;

        if self.completed {
            return None;
        }
        self.completed = true;

        let completion = Completion {
            elapsed_seconds: self.clock.elapsed_seconds(),
            difficulty: self.difficulty,
            ranked: self.difficulty.ranks(self.config.rows, self.config.cols),
        };
        info!(
            "Session won in {}s ({})",
            completion.elapsed_seconds, completion.difficulty
        );
        Some(Outcome::Won(completion))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{clock::ManualClock, models::CellView};
    use rand::{SeedableRng, rngs::StdRng};

    type TestSession = Session<ManualClock, StdRng>;

    fn beginner(seed: u64) -> TestSession {
        Session::new(
            BoardConfig::new(9, 9, 10).unwrap(),
            Difficulty::Beginner,
            ManualClock::new(),
            StdRng::seed_from_u64(seed),
        )
    }

    fn fixed(rows: usize, cols: usize, mines: &[(usize, usize)]) -> TestSession {
        let mines: Vec<Pos> = mines.iter().map(|&(row, col)| Pos::new(row, col)).collect();
        Session::from_layout(
            Board::with_mines(rows, cols, &mines),
            Difficulty::Beginner,
            ManualClock::new(),
            StdRng::seed_from_u64(0),
        )
    }

    fn safe_cells(session: &TestSession) -> Vec<Pos> {
        session
            .board()
            .iter()
            .filter(|(_, cell)| !cell.is_mine())
            .map(|(pos, _)| pos)
            .collect()
    }

    fn mine_cells(session: &TestSession) -> Vec<Pos> {
        session
            .board()
            .iter()
            .filter(|(_, cell)| cell.is_mine())
            .map(|(pos, _)| pos)
            .collect()
    }

    #[test]
    fn first_reveal_generates_around_the_click() {
        let mut session = beginner(3);
        assert!(session.is_first_click());
        assert_eq!(session.board().mine_count(), 0);

        let update = session.on_reveal(Pos::new(4, 4));

        assert_eq!(session.state(), SessionState::InProgress);
        assert_eq!(session.board().mine_count(), 10);
        assert!(!update.changed.is_empty());
        let block = session
            .board()
            .neighbors(Pos::new(4, 4))
            .chain(std::iter::once(Pos::new(4, 4)));
        for pos in block {
            assert!(!session.board().get(pos).unwrap().is_mine());
            assert!(session.board().get(pos).unwrap().is_revealed());
        }
        assert!(session.clock().is_running());
    }

    #[test]
    fn flags_before_first_click_survive_generation() {
        let mut session = beginner(5);
        session.on_toggle_flag(Pos::new(0, 0));
        assert_eq!(session.flags_placed(), 1);
        assert_eq!(session.flags_remaining(), 9);

        session.on_reveal(Pos::new(8, 8));

        assert!(session.board().get(Pos::new(0, 0)).unwrap().is_flagged());
        assert_eq!(session.flags_placed(), 1);
    }

    #[test]
    fn reveal_on_flagged_first_cell_does_not_start() {
        let mut session = beginner(5);
        session.on_toggle_flag(Pos::new(2, 2));

        assert!(session.on_reveal(Pos::new(2, 2)).is_empty());
        assert!(session.is_first_click());
        assert_eq!(session.clock().starts(), 0);
    }

    #[test]
    fn flagging_twice_nets_zero() {
        let mut session = beginner(1);

        session.on_toggle_flag(Pos::new(3, 3));
        session.on_toggle_flag(Pos::new(3, 3));

        assert_eq!(session.flags_placed(), 0);
        assert!(!session.board().get(Pos::new(3, 3)).unwrap().is_flagged());
    }

    #[test]
    fn hitting_a_mine_loses_and_freezes_the_session() {
        let mut session = beginner(11);
        session.on_reveal(Pos::new(4, 4));
        session.clock_mut().advance(7);
        let mines = mine_cells(&session);
        let (mine, flagged) = (mines[0], mines[1]);
        session.on_toggle_flag(flagged);

        let update = session.on_reveal(mine);

        assert_eq!(update.outcome, Some(Outcome::Lost { triggered: mine }));
        assert!(update.changed.contains(&flagged));
        assert!(session.board().get(flagged).unwrap().is_revealed());
        assert_eq!(session.flags_placed(), 0);
        assert_eq!(session.state(), SessionState::Lost);
        assert!(session.is_game_over() && !session.is_win());
        for pos in mine_cells(&session) {
            assert!(session.board().get(pos).unwrap().is_revealed());
        }
        assert!(!session.clock().is_running());

        let before = session.board().clone();
        session.clock_mut().advance(5);
        assert!(session.on_reveal(Pos::new(0, 0)).is_empty());
        assert!(session.on_toggle_flag(Pos::new(0, 0)).is_empty());
        assert!(session.on_chord(Pos::new(4, 4)).is_empty());
        assert_eq!(session.board(), &before);
        assert_eq!(session.elapsed_seconds(), 7);
    }

    #[test]
    fn clearing_every_safe_cell_wins_once() {
        let mut session = beginner(21);
        session.on_reveal(Pos::new(4, 4));
        session.clock_mut().advance(42);

        let mut outcomes = Vec::new();
        for pos in safe_cells(&session) {
            if let Some(outcome) = session.on_reveal(pos).outcome {
                outcomes.push(outcome);
            }
        }

        assert_eq!(
            outcomes,
            vec![Outcome::Won(Completion {
                elapsed_seconds: 42,
                difficulty: Difficulty::Beginner,
                ranked: true,
            })]
        );
        assert!(session.is_win());
        assert_eq!(session.flags_placed(), 10);
        assert_eq!(session.flags_remaining(), 0);
        assert_eq!(session.board().flag_count(), 10);
        assert!(!session.clock().is_running());
    }

    #[test]
    fn wins_on_resized_presets_are_unranked() {
        let mut session = fixed(1, 3, &[(0, 0)]);

        let update = session.on_reveal(Pos::new(0, 2));

        assert!(matches!(
            update.outcome,
            Some(Outcome::Won(Completion { ranked: false, .. }))
        ));
    }

    #[test]
    fn intents_after_a_win_change_nothing() {
        let mut session = fixed(1, 3, &[(0, 0)]);
        session.on_reveal(Pos::new(0, 2));
        assert!(session.is_win());
        let snapshot = session.snapshot();

        for pos in [Pos::new(0, 0), Pos::new(0, 1), Pos::new(0, 2)] {
            assert!(session.on_reveal(pos).is_empty());
            assert!(session.on_toggle_flag(pos).is_empty());
        }
        assert_eq!(session.snapshot(), snapshot);
    }

    #[test]
    fn chord_handles_win_and_loss() {
        let mut session = fixed(3, 3, &[(0, 0), (0, 2)]);
        session.on_reveal(Pos::new(1, 1));
        session.on_toggle_flag(Pos::new(0, 0));
        session.on_toggle_flag(Pos::new(0, 2));

        let update = session.on_chord(Pos::new(1, 1));
        assert!(matches!(update.outcome, Some(Outcome::Won(_))));

        let mut session = fixed(3, 3, &[(0, 0)]);
        session.on_reveal(Pos::new(1, 1));
        session.on_toggle_flag(Pos::new(2, 2));

        let update = session.on_chord(Pos::new(1, 1));
        assert_eq!(
            update.outcome,
            Some(Outcome::Lost {
                triggered: Pos::new(0, 0)
            })
        );
        assert_eq!(session.state(), SessionState::Lost);
    }

    #[test]
    fn chord_before_first_click_is_ignored() {
        let mut session = beginner(2);
        assert!(session.on_chord(Pos::new(0, 0)).is_empty());
        assert!(session.is_first_click());
    }

    #[test]
    fn out_of_range_intents_are_ignored() {
        let mut session = beginner(2);
        assert!(session.on_reveal(Pos::new(9, 0)).is_empty());
        assert!(session.on_toggle_flag(Pos::new(0, 9)).is_empty());
        assert!(session.is_first_click());
    }

    #[test]
    fn reset_returns_to_an_empty_board() {
        let mut session = beginner(8);
        session.on_reveal(Pos::new(0, 0));
        session.on_toggle_flag(Pos::new(8, 8));
        session.clock_mut().advance(12);

        let config = BoardConfig::new(16, 16, 40).unwrap();
        session.on_reset(config, Difficulty::Intermediate);

        assert!(session.is_first_click());
        assert_eq!(session.flags_placed(), 0);
        assert_eq!(session.flags_remaining(), 40);
        assert_eq!(session.elapsed_seconds(), 0);
        assert!(!session.clock().is_running());
        assert_eq!(session.board().rows(), 16);
        assert_eq!(session.board().mine_count(), 0);

        session.on_reveal(Pos::new(8, 8));
        assert_eq!(session.board().mine_count(), 40);
        assert_eq!(session.clock().starts(), 2);
    }

    #[test]
    fn snapshot_hides_mines_until_revealed() {
        let mut session = fixed(2, 2, &[(0, 0)]);
        session.on_reveal(Pos::new(1, 1));

        let snapshot = session.snapshot();
        assert_eq!(snapshot.cells[0][0], CellView::Hidden);
        assert_eq!(snapshot.cells[1][1], CellView::Revealed { adjacent: 1 });
        assert_eq!(snapshot.flags_remaining, 1);
        assert_eq!(snapshot.state, SessionState::InProgress);
    }
}
