//! Session state for one live game connection and the reducer that folds
//! inbound server events into it.
//!
//! The reducer is pure: it never touches the network or a clock. Anything the
//! protocol requires in response to an event comes back as an [`Effect`] for
//! the transport (or a test) to carry out.

use std::time::Duration;

use shared::{
    domain::{Board, Coord, GameId, Piece, SessionToken},
    error::{DecodeError, ProtocolError},
    protocol::{ClientCommand, CommandEnvelope, GameResult, ProtocolVersion, ServerEvent},
};
use tracing::{debug, info, warn};

use crate::error::ClientError;

pub const DEFAULT_ABORT_REDIRECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReducerSettings {
    pub protocol: ProtocolVersion,
    pub abort_redirect_delay: Duration,
    /// `None` keeps the finished board on screen instead of navigating away.
    pub end_redirect_delay: Option<Duration>,
}

impl Default for ReducerSettings {
    fn default() -> Self {
        Self {
            protocol: ProtocolVersion::Current,
            abort_redirect_delay: DEFAULT_ABORT_REDIRECT_DELAY,
            end_redirect_delay: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameOver {
    Aborted { id: Option<String> },
    Completed(GameResult),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Send(ClientCommand),
    ScheduleRedirect { delay: Duration },
    ReportError(ProtocolError),
    AnnounceResult(GameResult),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    board: Board,
    turn: Piece,
    color: Option<Piece>,
    token: Option<SessionToken>,
    game_id: Option<GameId>,
    preview: Option<Vec<Coord>>,
    ready: bool,
    game_over: Option<GameOver>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            board: Board::empty(),
            turn: Piece::Black,
            color: None,
            token: None,
            game_id: None,
            preview: None,
            ready: false,
            game_over: None,
        }
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_game_id(mut self, game_id: GameId) -> Self {
        self.game_id = Some(game_id);
        self
    }

    /// Seeds the credential before the connection opens, e.g. from a stored
    /// session cookie. A later Ready will not replace it.
    pub fn with_token(mut self, token: SessionToken) -> Self {
        self.token = Some(token);
        self
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn turn(&self) -> Piece {
        self.turn
    }

    pub fn color(&self) -> Option<Piece> {
        self.color
    }

    pub fn token(&self) -> Option<&SessionToken> {
        self.token.as_ref()
    }

    pub fn game_id(&self) -> Option<GameId> {
        self.game_id
    }

    pub fn preview(&self) -> Option<&[Coord]> {
        self.preview.as_deref()
    }

    pub fn is_previewed(&self, at: Coord) -> bool {
        self.preview.as_ref().is_some_and(|cells| cells.contains(&at))
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn game_over(&self) -> Option<&GameOver> {
        self.game_over.as_ref()
    }

    pub fn is_over(&self) -> bool {
        self.game_over.is_some()
    }

    pub fn is_my_turn(&self) -> bool {
        self.color == Some(self.turn)
    }

    /// Colour comes from the host lookup, never from the wire.
    pub fn set_color(&mut self, color: Piece) {
        if let Some(previous) = self.color.filter(|previous| *previous != color) {
            warn!(%previous, %color, "session colour reassigned");
        }
        self.color = Some(color);
    }

    /// Pointer left the hovered cell.
    pub fn clear_preview(&mut self) {
        self.preview = None;
    }

    pub fn apply(&mut self, event: &ServerEvent, settings: &ReducerSettings) -> Vec<Effect> {
        let mut effects = Vec::new();
        debug!(kind = ?event.kind(), "applying server event");

        match event {
            ServerEvent::Ack => {}
            ServerEvent::Ready { token } => {
                if self.ready {
                    warn!("ignoring duplicate ready");
                    return effects;
                }
                self.ready = true;
                match (&self.token, token) {
                    (None, Some(token)) => self.token = Some(token.clone()),
                    (Some(existing), Some(token)) if existing != token => {
                        debug!("ready carried a different token; keeping the first one");
                    }
                    _ => {}
                }
                match self.game_id {
                    Some(id) => effects.push(Effect::Send(ClientCommand::Join { id })),
                    None => debug!("ready before a game id is known; join deferred"),
                }
            }
            ServerEvent::GameCreate { id } => {
                self.game_id = Some(*id);
                effects.push(Effect::Send(ClientCommand::Join { id: *id }));
            }
            ServerEvent::GameUpdate(snapshot) => {
                self.board = snapshot.board.clone();
                self.turn = snapshot.turn;
                self.preview = None;
            }
            ServerEvent::Preview { changed } => {
                self.preview = Some(changed.clone());
            }
            ServerEvent::Error(err) => {
                warn!(code = err.code, message = %err.message, "server reported an error");
                effects.push(Effect::ReportError(err.clone()));
            }
            ServerEvent::GameAbort { token, id } => {
                if self.game_over.is_none() {
                    // The abort token names the player who left; it never replaces ours.
                    let by_me = token.is_some() && token.as_ref() == self.token.as_ref();
                    info!(game_id = ?id, ?token, by_me, "game aborted");
                    self.game_over = Some(GameOver::Aborted { id: id.clone() });
                    effects.push(Effect::ScheduleRedirect {
                        delay: settings.abort_redirect_delay,
                    });
                }
            }
            ServerEvent::GameEnd(result) => {
                if self.game_over.is_none() {
                    info!(winner = %result.winner, points = result.points, total = result.total, "game ended");
                    self.game_over = Some(GameOver::Completed(result.clone()));
                    effects.push(Effect::AnnounceResult(result.clone()));
                    if let Some(delay) = settings.end_redirect_delay {
                        effects.push(Effect::ScheduleRedirect { delay });
                    }
                }
            }
        }

        effects
    }

    /// Decodes and applies one text frame. On a decode failure the state is
    /// left untouched.
    pub fn handle_frame(
        &mut self,
        text: &str,
        settings: &ReducerSettings,
    ) -> Result<Vec<Effect>, DecodeError> {
        let event = ServerEvent::decode(text, settings.protocol)?;
        Ok(self.apply(&event, settings))
    }

    pub fn identify(&self) -> ClientCommand {
        ClientCommand::Identify
    }

    pub fn join(&self) -> Result<ClientCommand, ClientError> {
        let id = self.require_game_id("join")?;
        Ok(ClientCommand::Join { id })
    }

    pub fn place(&self, x: u8, y: u8) -> Result<ClientCommand, ClientError> {
        let (id, at, piece) = self.move_context("place", x, y)?;
        Ok(ClientCommand::Place { id, at, piece })
    }

    pub fn hover(&self, x: u8, y: u8) -> Result<ClientCommand, ClientError> {
        let (id, at, piece) = self.move_context("preview_place", x, y)?;
        Ok(ClientCommand::PreviewPlace { id, at, piece })
    }

    /// Stamps `command` with the token held right now.
    pub fn envelope(&self, command: ClientCommand) -> Result<CommandEnvelope, ClientError> {
        let token = self.token.as_ref().ok_or(ClientError::MissingContext {
            command: command.name(),
            missing: "token",
        })?;
        Ok(command.into_envelope(token))
    }

    fn require_game_id(&self, command: &'static str) -> Result<GameId, ClientError> {
        self.game_id.ok_or(ClientError::MissingContext {
            command,
            missing: "game id",
        })
    }

    fn move_context(
        &self,
        command: &'static str,
        x: u8,
        y: u8,
    ) -> Result<(GameId, Coord, Piece), ClientError> {
        let id = self.require_game_id(command)?;
        let piece = self.color.ok_or(ClientError::MissingContext {
            command,
            missing: "colour",
        })?;
        let at = Coord::new(x, y).ok_or(ClientError::OffBoard { x, y })?;
        Ok((id, at, piece))
    }
}

/// By-value form of [`SessionState::apply`].
pub fn reduce(
    mut state: SessionState,
    event: &ServerEvent,
    settings: &ReducerSettings,
) -> (SessionState, Vec<Effect>) {
    let effects = state.apply(event, settings);
    (state, effects)
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;

#[cfg(test)]
#[path = "tests/session_proptests.rs"]
mod proptests;
