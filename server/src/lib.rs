pub mod cleanup;
pub mod clock;
pub mod cors;
pub mod leaderboard;
pub mod logic;
pub mod rate_limit;
pub mod routes;
