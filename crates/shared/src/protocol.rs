use std::{fmt, str::FromStr};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    domain::{Board, Coord, GameId, Piece, SessionToken, BOARD_CELLS},
    error::{DecodeError, ProtocolError, UnknownProtocolVersion},
};

/// Inbound op numbering. The two schemes disagree on op 3 and only the
/// current one knows op 7, so a connection speaks exactly one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolVersion {
    /// 1 Ack, 2 Ready, 3 GameCreate, 4 GameUpdate, 5 Preview, 6 Error.
    Legacy,
    /// 1 Ack, 2 Ready, 3 GameAbort, 4 GameUpdate, 5 Preview, 6 Error, 7 GameEnd.
    #[default]
    Current,
}

impl ProtocolVersion {
    pub fn event_kind(self, op: u64) -> Option<EventKind> {
        match (self, op) {
            (_, 1) => Some(EventKind::Ack),
            (_, 2) => Some(EventKind::Ready),
            (Self::Legacy, 3) => Some(EventKind::GameCreate),
            (Self::Current, 3) => Some(EventKind::GameAbort),
            (_, 4) => Some(EventKind::GameUpdate),
            (_, 5) => Some(EventKind::Preview),
            (_, 6) => Some(EventKind::Error),
            (Self::Current, 7) => Some(EventKind::GameEnd),
            _ => None,
        }
    }

    pub fn opcode(self, kind: EventKind) -> Option<u64> {
        match (self, kind) {
            (_, EventKind::Ack) => Some(1),
            (_, EventKind::Ready) => Some(2),
            (Self::Legacy, EventKind::GameCreate) => Some(3),
            (Self::Current, EventKind::GameAbort) => Some(3),
            (_, EventKind::GameUpdate) => Some(4),
            (_, EventKind::Preview) => Some(5),
            (_, EventKind::Error) => Some(6),
            (Self::Current, EventKind::GameEnd) => Some(7),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Legacy => "legacy",
            Self::Current => "current",
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProtocolVersion {
    type Err = UnknownProtocolVersion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy" | "v1" | "1" => Ok(Self::Legacy),
            "current" | "v2" | "2" => Ok(Self::Current),
            _ => Err(UnknownProtocolVersion(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Ack,
    Ready,
    GameCreate,
    GameAbort,
    GameUpdate,
    Preview,
    Error,
    GameEnd,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSnapshot {
    pub board: Board,
    pub turn: Piece,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameResult {
    pub winner: String,
    pub points: u32,
    pub total: u32,
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} won the game with a score of {} / {}",
            self.winner, self.points, self.total
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    Ack,
    Ready {
        token: Option<SessionToken>,
    },
    GameCreate {
        id: GameId,
    },
    GameUpdate(GameSnapshot),
    Preview {
        changed: Vec<Coord>,
    },
    Error(ProtocolError),
    GameAbort {
        token: Option<SessionToken>,
        id: Option<String>,
    },
    GameEnd(GameResult),
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    op: u64,
    #[serde(default)]
    t: Option<String>,
    #[serde(default)]
    d: Value,
}

#[derive(Debug, Default, Deserialize)]
struct ReadyPayload {
    #[serde(default)]
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GameCreatePayload {
    id: GameId,
}

#[derive(Debug, Deserialize)]
struct GameUpdatePayload {
    game: RawGame,
}

#[derive(Debug, Deserialize)]
struct RawGame {
    board: Vec<Option<String>>,
    turn: String,
}

#[derive(Debug, Deserialize)]
struct PreviewPayload {
    changed: Vec<(i64, i64)>,
}

#[derive(Debug, Default, Deserialize)]
struct AbortPayload {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    id: Option<String>,
}

fn payload<T: DeserializeOwned>(kind: EventKind, d: Value) -> Result<T, DecodeError> {
    serde_json::from_value(d).map_err(|source| DecodeError::Payload { kind, source })
}

fn piece(raw: &str) -> Result<Piece, DecodeError> {
    Piece::from_wire(raw).ok_or_else(|| DecodeError::UnknownPiece(raw.to_string()))
}

impl TryFrom<RawGame> for GameSnapshot {
    type Error = DecodeError;

    fn try_from(raw: RawGame) -> Result<Self, Self::Error> {
        if raw.board.len() != BOARD_CELLS {
            return Err(DecodeError::BoardLength {
                expected: BOARD_CELLS,
                actual: raw.board.len(),
            });
        }
        let mut cells = [None; BOARD_CELLS];
        for (cell, value) in cells.iter_mut().zip(raw.board.iter()) {
            *cell = value.as_deref().map(piece).transpose()?;
        }
        Ok(Self {
            board: Board::from_cells(cells),
            turn: piece(&raw.turn)?,
        })
    }
}

fn coords(changed: Vec<(i64, i64)>) -> Result<Vec<Coord>, DecodeError> {
    changed
        .into_iter()
        .map(|(x, y)| {
            u8::try_from(x)
                .ok()
                .zip(u8::try_from(y).ok())
                .and_then(|(cx, cy)| Coord::new(cx, cy))
                .ok_or(DecodeError::CoordinateOutOfRange { x, y })
        })
        .collect()
}

impl ServerEvent {
    /// Decodes one text frame. `op` picks the payload shape under `version`;
    /// anything that does not fit is a [`DecodeError`].
    pub fn decode(text: &str, version: ProtocolVersion) -> Result<Self, DecodeError> {
        let raw: RawEnvelope = serde_json::from_str(text).map_err(DecodeError::Envelope)?;
        let kind = version
            .event_kind(raw.op)
            .ok_or(DecodeError::UnknownOpcode {
                op: raw.op,
                version,
            })?;

        let event = match kind {
            EventKind::Ack => Self::Ack,
            EventKind::Ready => {
                let body: Option<ReadyPayload> = payload(kind, raw.d)?;
                let token = body.unwrap_or_default().token.or(raw.t);
                Self::Ready {
                    token: token.map(SessionToken::new),
                }
            }
            EventKind::GameCreate => {
                let body: GameCreatePayload = payload(kind, raw.d)?;
                Self::GameCreate { id: body.id }
            }
            EventKind::GameUpdate => {
                let body: GameUpdatePayload = payload(kind, raw.d)?;
                Self::GameUpdate(GameSnapshot::try_from(body.game)?)
            }
            EventKind::Preview => {
                let body: PreviewPayload = payload(kind, raw.d)?;
                Self::Preview {
                    changed: coords(body.changed)?,
                }
            }
            EventKind::Error => Self::Error(payload(kind, raw.d)?),
            EventKind::GameAbort => {
                let body: Option<AbortPayload> = payload(kind, raw.d)?;
                let body = body.unwrap_or_default();
                Self::GameAbort {
                    token: body.token.map(SessionToken::new),
                    id: body.id,
                }
            }
            EventKind::GameEnd => Self::GameEnd(payload(kind, raw.d)?),
        };
        Ok(event)
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::Ack => EventKind::Ack,
            Self::Ready { .. } => EventKind::Ready,
            Self::GameCreate { .. } => EventKind::GameCreate,
            Self::GameUpdate(_) => EventKind::GameUpdate,
            Self::Preview { .. } => EventKind::Preview,
            Self::Error(_) => EventKind::Error,
            Self::GameAbort { .. } => EventKind::GameAbort,
            Self::GameEnd(_) => EventKind::GameEnd,
        }
    }
}

/// Payload of an outbound frame, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CommandData {
    Identify,
    Create {
        guest: String,
    },
    Join {
        id: GameId,
    },
    Place {
        id: GameId,
        x: u8,
        y: u8,
        piece: Piece,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub op: u8,
    pub t: SessionToken,
    pub d: CommandData,
}

impl CommandEnvelope {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    Identify,
    Create {
        guest: String,
    },
    Join {
        id: GameId,
    },
    Place {
        id: GameId,
        at: Coord,
        piece: Piece,
    },
    /// Hover preview request; the server answers with a Preview of the flips.
    PreviewPlace {
        id: GameId,
        at: Coord,
        piece: Piece,
    },
}

impl ClientCommand {
    pub const OP_CREATE: u8 = 1;
    pub const OP_PLACE: u8 = 2;
    pub const OP_JOIN: u8 = 3;
    pub const OP_IDENTIFY: u8 = 6;
    pub const OP_PREVIEW_PLACE: u8 = 7;

    pub fn opcode(&self) -> u8 {
        match self {
            Self::Identify => Self::OP_IDENTIFY,
            Self::Create { .. } => Self::OP_CREATE,
            Self::Join { .. } => Self::OP_JOIN,
            Self::Place { .. } => Self::OP_PLACE,
            Self::PreviewPlace { .. } => Self::OP_PREVIEW_PLACE,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Identify => "identify",
            Self::Create { .. } => "create",
            Self::Join { .. } => "join",
            Self::Place { .. } => "place",
            Self::PreviewPlace { .. } => "preview_place",
        }
    }

    pub fn into_envelope(self, token: &SessionToken) -> CommandEnvelope {
        let op = self.opcode();
        let d = match self {
            Self::Identify => CommandData::Identify,
            Self::Create { guest } => CommandData::Create { guest },
            Self::Join { id } => CommandData::Join { id },
            Self::Place { id, at, piece } | Self::PreviewPlace { id, at, piece } => {
                CommandData::Place {
                    id,
                    x: at.x,
                    y: at.y,
                    piece,
                }
            }
        };
        CommandEnvelope {
            op,
            t: token.clone(),
            d,
        }
    }
}

/// Every HTTP response body is wrapped as `{"message": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub message: T,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberSummary {
    pub id: Uuid,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRecord {
    pub id: GameId,
    #[serde(default)]
    pub pending: bool,
    pub host: Uuid,
    #[serde(default)]
    pub guest: Option<Uuid>,
    #[serde(default)]
    pub ended: bool,
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
