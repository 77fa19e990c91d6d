use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Largest accepted board side.
pub const MAX_DIMENSION: usize = 100;

/// Cells kept free of mines around the first click: the cell plus its neighbors.
pub const SAFE_ZONE_CELLS: usize = 9;

/// What a player may see of a cell. Mines are only exposed once revealed.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(tag = "state")]
pub enum CellView {
    #[serde(rename = "hidden")]
    Hidden,
    #[serde(rename = "flagged")]
    Flagged,
    #[serde(rename = "revealed")]
    Revealed { adjacent: u8 },
    #[serde(rename = "mine")]
    Mine,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Pos {
    pub row: usize,
    pub col: usize,
}

impl Pos {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Beginner,
    Intermediate,
    Expert,
    Custom,
}

impl Difficulty {
    /// Fraction of cells holding a mine, `None` for custom boards.
    pub const fn density(self) -> Option<f64> {
        match self {
            Self::Beginner => Some(0.123),
            Self::Intermediate => Some(0.156),
            Self::Expert => Some(0.206),
            Self::Custom => None,
        }
    }

    pub const fn is_ranked(self) -> bool {
        !matches!(self, Self::Custom)
    }

    /// Board size a preset tier is ranked on.
    pub const fn dimensions(self) -> Option<(usize, usize)> {
        match self {
            Self::Beginner => Some((9, 9)),
            Self::Intermediate => Some((16, 16)),
            Self::Expert => Some((16, 30)),
            Self::Custom => None,
        }
    }

    /// Whether a win on a `rows`x`cols` board counts towards this tier.
    /// Either orientation of the preset size is accepted.
    pub fn ranks(self, rows: usize, cols: usize) -> bool {
        self.dimensions()
            .is_some_and(|size| size == (rows, cols) || size == (cols, rows))
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Expert => "expert",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "beginner" => Ok(Self::Beginner),
            "intermediate" => Ok(Self::Intermediate),
            "expert" => Ok(Self::Expert),
            "custom" => Ok(Self::Custom),
            other => Err(format!("unknown difficulty: {other}")),
        }
    }
}

/// Validated board dimensions and mine count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardConfig {
    pub rows: usize,
    pub cols: usize,
    pub mines: usize,
}

impl BoardConfig {
    pub fn new(rows: usize, cols: usize, mines: usize) -> Result<Self, ConfigError> {
        if rows == 0 || cols == 0 {
            return Err(ConfigError::ZeroDimension);
        }
        if rows > MAX_DIMENSION || cols > MAX_DIMENSION {
            return Err(ConfigError::TooLarge);
        }
        if mines == 0 {
            return Err(ConfigError::NoMines);
        }

        let max = Self::max_mines(rows, cols);
        if mines > max {
            return Err(ConfigError::TooManyMines { max });
        }

        Ok(Self { rows, cols, mines })
    }

    /// Upper mine bound that still leaves room for a safe first click.
    pub const fn max_mines(rows: usize, cols: usize) -> usize {
        (rows * cols).saturating_sub(SAFE_ZONE_CELLS)
    }

    pub const fn total_cells(&self) -> usize {
        self.rows * self.cols
    }
}

/// Board request as sent by a front end.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GameParams {
    pub rows: usize,
    pub cols: usize,
    pub difficulty: Difficulty,
    /// Only consulted for [`Difficulty::Custom`].
    pub mines: Option<usize>,
}

impl Default for GameParams {
    fn default() -> Self {
        Self {
            rows: 9,
            cols: 9,
            difficulty: Difficulty::Beginner,
            mines: None,
        }
    }
}

impl GameParams {
    pub fn resolve(&self) -> Result<BoardConfig, ConfigError> {
        let mines = match self.difficulty.density() {
            Some(density) => {
                let cells = self.rows.saturating_mul(self.cols) as f64;
                (cells * density).round().max(1.0) as usize
            }
            None => self.mines.ok_or(ConfigError::MissingMineCount)?,
        };

        BoardConfig::new(self.rows, self.cols, mines)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    NotStarted,
    InProgress,
    Won,
    Lost,
}

impl SessionState {
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Won | Self::Lost)
    }

    pub const fn is_won(self) -> bool {
        matches!(self, Self::Won)
    }
}

/// Read-only view of a session handed to the rendering layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub rows: usize,
    pub cols: usize,
    pub difficulty: Difficulty,
    pub cells: Vec<Vec<CellView>>,
    pub flags_remaining: i64,
    pub elapsed_seconds: u64,
    pub state: SessionState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerIdentity {
    pub user_id: String,
    pub display_name: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateRequest {
    #[serde(default)]
    pub params: GameParams,
    #[serde(default)]
    pub player: Option<PlayerIdentity>,
}

#[derive(Serialize, Deserialize)]
pub struct CreateResponse {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreSubmission {
    pub user_id: String,
    pub display_name: String,
    pub email: String,
    pub elapsed_seconds: u64,
    pub difficulty: Difficulty,
}

impl ScoreSubmission {
    pub fn new(player: &PlayerIdentity, elapsed_seconds: u64, difficulty: Difficulty) -> Self {
        Self {
            user_id: player.user_id.clone(),
            display_name: player.display_name.clone(),
            email: player.email.clone(),
            elapsed_seconds,
            difficulty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub user_id: String,
    pub display_name: String,
    pub elapsed_seconds: u64,
}
