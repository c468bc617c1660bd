use shared::domain::GameId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("server_url must start with http:// or https://, got {0:?}")]
    InvalidServerUrl(String),
    #[error("failed to connect websocket {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: tokio_tungstenite::tungstenite::Error,
    },
    #[error("cannot build {command} command: no {missing} known for this session")]
    MissingContext {
        command: &'static str,
        missing: &'static str,
    },
    #[error("coordinate ({x}, {y}) is off the board")]
    OffBoard { x: u8, y: u8 },
    #[error("failed to encode outbound command: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("connection closed")]
    Closed,
    #[error("game {id} cannot be played: it is {state}")]
    GameUnavailable { id: GameId, state: &'static str },
}
