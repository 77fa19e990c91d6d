use bestsweep_common::models::{CreateRequest, CreateResponse, Difficulty, ScoreEntry};
use reqwest::{Client, StatusCode};
use tracing::debug;
use url::Url;

use crate::Result;

/// HTTP client for the bestsweep server API
pub struct BestsweepClient {
    client: Client,
    base_url: Url,
}

impl BestsweepClient {
    /// Create a new client connecting to the specified server URL
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)?;
        let client = Client::new();

        Ok(Self { client, base_url })
    }

    /// Create a new hosted game and return its ID.
    ///
    /// Pass a player in the request to have a win submitted to the leaderboard.
    pub async fn create_game(&self, request: &CreateRequest) -> Result<String> {
        let create_url = self.base_url.join("/create")?;

        let response = self.client.post(create_url).json(request).send().await?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::UNPROCESSABLE_ENTITY => {
                return Err("Server rejected the board parameters".into());
            }
            StatusCode::TOO_MANY_REQUESTS => {
                return Err("Too many games created, try again in a minute".into());
            }
            status => return Err(format!("Failed to create game: {}", status).into()),
        }

        let create_response: CreateResponse = response.json().await?;
        Ok(create_response.id)
    }

    /// Fetch the fastest times for a ranked difficulty
    pub async fn top_scores(&self, difficulty: Difficulty) -> Result<Vec<ScoreEntry>> {
        let scores_url = self.scores_url(difficulty)?;
        debug!("Fetching leaderboard from {}", scores_url);

        let response = self.client.get(scores_url).send().await?;
        if !response.status().is_success() {
            return Err(format!("Failed to fetch leaderboard: {}", response.status()).into());
        }

        Ok(response.json().await?)
    }

    /// Get the WebSocket URL for a game
    pub fn websocket_url(&self, game_id: &str) -> Result<String> {
        let mut ws_url = self.base_url.clone();
        ws_url
            .set_scheme(match self.base_url.scheme() {
                "https" => "wss",
                _ => "ws",
            })
            .map_err(|_| "Failed to set WebSocket scheme")?;
        ws_url.set_path("/ws");
        ws_url.query_pairs_mut().clear().append_pair("id", game_id);

        Ok(ws_url.to_string())
    }

    fn scores_url(&self, difficulty: Difficulty) -> Result<Url> {
        Ok(self
            .base_url
            .join(&format!("/scores/{}", difficulty.as_str()))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn websocket_url_follows_the_http_scheme() {
        let client = BestsweepClient::new("https://sweep.example.com").unwrap();
        assert_eq!(
            client.websocket_url("abc12").unwrap(),
            "wss://sweep.example.com/ws?id=abc12"
        );

        let client = BestsweepClient::new("http://localhost:8000").unwrap();
        assert_eq!(
            client.websocket_url("x_Y-z").unwrap(),
            "ws://localhost:8000/ws?id=x_Y-z"
        );
    }

    #[test]
    fn scores_url_uses_lowercase_tier_names() {
        let client = BestsweepClient::new("http://localhost:8000/").unwrap();
        assert_eq!(
            client.scores_url(Difficulty::Expert).unwrap().as_str(),
            "http://localhost:8000/scores/expert"
        );
    }
}
