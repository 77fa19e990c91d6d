use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use bestsweep_common::{
    error::LeaderboardError,
    models::{Difficulty, ScoreEntry, ScoreSubmission},
};
use dashmap::DashMap;
use tracing::{debug, info, instrument};

/// Entries returned by [`Leaderboard::fetch_top_scores`].
pub const TOP_SCORES: usize = 10;

/// Best times kept per difficulty; slower entries beyond this are dropped.
const RETAINED_SCORES: usize = 1000;

/// Ranked best-time store. Implementations decide how scores persist; the
/// game only ever submits finished wins and reads the top of a tier.
#[rocket::async_trait]
pub trait Leaderboard: Send + Sync {
    async fn submit_score(&self, submission: ScoreSubmission) -> Result<(), LeaderboardError>;

    /// Fastest [`TOP_SCORES`] entries for a ranked difficulty, quickest first.
    async fn fetch_top_scores(
        &self,
        difficulty: Difficulty,
    ) -> Result<Vec<ScoreEntry>, LeaderboardError>;
}

pub type SharedLeaderboard = Arc<dyn Leaderboard>;

#[derive(Debug, Clone)]
struct Ranked {
    sequence: u64,
    submission: ScoreSubmission,
}

/// Process-local leaderboard holding each player's best time per difficulty.
#[derive(Debug, Default)]
pub struct MemoryLeaderboard {
    tiers: DashMap<Difficulty, Vec<Ranked>>,
    sequence: AtomicU64,
}

impl MemoryLeaderboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedLeaderboard {
        Arc::new(Self::new())
    }
}

#[rocket::async_trait]
impl Leaderboard for MemoryLeaderboard {
    #[instrument(level = "trace", skip(self, submission), fields(user = %submission.user_id, difficulty = %submission.difficulty))]
    async fn submit_score(&self, submission: ScoreSubmission) -> Result<(), LeaderboardError> {
        if !submission.difficulty.is_ranked() {
            return Err(LeaderboardError::Unranked);
        }
        if submission.user_id.trim().is_empty() {
            return Err(LeaderboardError::InvalidScore("missing user id"));
        }

        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        let mut tier = self.tiers.entry(submission.difficulty).or_default();

        match tier
            .iter_mut()
            .find(|ranked| ranked.submission.user_id == submission.user_id)
        {
            Some(existing) if existing.submission.elapsed_seconds <= submission.elapsed_seconds => {
                debug!(
                    "Keeping previous best of {}s for {}",
                    existing.submission.elapsed_seconds, submission.user_id
                );
                return Ok(());
            }
            Some(existing) => {
                *existing = Ranked {
                    sequence,
                    submission,
                };
            }
            None => tier.push(Ranked {
                sequence,
                submission,
            }),
        }

        tier.sort_by_key(|ranked| (ranked.submission.elapsed_seconds, ranked.sequence));
        tier.truncate(RETAINED_SCORES);
        info!("Recorded new best time, {} players ranked", tier.len());
        Ok(())
    }

    async fn fetch_top_scores(
        &self,
        difficulty: Difficulty,
    ) -> Result<Vec<ScoreEntry>, LeaderboardError> {
        if !difficulty.is_ranked() {
            return Err(LeaderboardError::Unranked);
        }

        Ok(self
            .tiers
            .get(&difficulty)
            .map(|tier| {
                tier.iter()
                    .take(TOP_SCORES)
                    .map(|ranked| ScoreEntry {
                        user_id: ranked.submission.user_id.clone(),
                        display_name: ranked.submission.display_name.clone(),
                        elapsed_seconds: ranked.submission.elapsed_seconds,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}
