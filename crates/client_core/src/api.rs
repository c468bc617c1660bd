//! HTTP lookups that supply session context the live protocol never carries:
//! who the player is and which colour they play.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client};
use serde::de::DeserializeOwned;
use shared::{
    domain::{GameId, Piece, SessionToken},
    protocol::{ApiEnvelope, GameRecord, MemberSummary},
};
use tracing::{debug, warn};

use crate::error::ClientError;

pub const SESSION_COOKIE_NAME: &str = "sid";

/// The host of a game plays Black; everyone else plays White.
pub fn color_for(game: &GameRecord, me: &MemberSummary) -> Piece {
    if game.host == me.id {
        Piece::Black
    } else {
        Piece::White
    }
}

#[async_trait]
pub trait GameDirectory: Send + Sync {
    async fn me(&self) -> Result<MemberSummary>;
    async fn game(&self, id: GameId) -> Result<GameRecord>;

    /// Looks the game up and refuses one that is still waiting for a guest
    /// or already over.
    async fn playable_game(&self, id: GameId) -> Result<GameRecord> {
        let game = self.game(id).await?;
        let state = if game.pending {
            "pending"
        } else if game.ended {
            "ended"
        } else {
            return Ok(game);
        };
        warn!(game_id = %id, state, "game is not playable");
        Err(ClientError::GameUnavailable { id, state }.into())
    }

    async fn resolve_color(&self, id: GameId) -> Result<Piece> {
        let game = self.playable_game(id).await?;
        let me = self.me().await?;
        let color = color_for(&game, &me);
        debug!(game_id = %id, %color, "resolved player colour");
        Ok(color)
    }
}

pub struct HttpGameDirectory {
    http: Client,
    server_url: String,
    token: SessionToken,
}

impl HttpGameDirectory {
    pub fn new(server_url: impl Into<String>, token: SessionToken) -> Self {
        Self {
            http: Client::new(),
            server_url: server_url.into(),
            token,
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{path}", self.server_url);
        let res = self
            .http
            .get(&url)
            .header(
                header::COOKIE,
                format!("{SESSION_COOKIE_NAME}={}", self.token.as_str()),
            )
            .send()
            .await
            .with_context(|| format!("GET {url} failed"))?
            .error_for_status()
            .with_context(|| format!("GET {url} was rejected"))?;
        let body: ApiEnvelope<T> = res
            .json()
            .await
            .with_context(|| format!("GET {url} returned an unexpected body"))?;
        Ok(body.message)
    }
}

#[async_trait]
impl GameDirectory for HttpGameDirectory {
    async fn me(&self) -> Result<MemberSummary> {
        self.get("/@me").await
    }

    async fn game(&self, id: GameId) -> Result<GameRecord> {
        self.get(&format!("/game/{id}")).await
    }
}

#[cfg(test)]
#[path = "tests/api_tests.rs"]
mod tests;
