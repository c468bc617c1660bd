//! Live WebSocket connection for one game session.
//!
//! One reader task decodes frames strictly in arrival order and folds them
//! into the shared [`SessionState`]; one writer task owns the socket sink and
//! stamps each outbound command with the token held at send time. Observers
//! follow along through a broadcast channel of [`ClientEvent`]s.

use std::{sync::Arc, time::Duration};

use futures::{SinkExt, StreamExt};
use shared::{
    domain::{GameId, Piece, SessionToken},
    error::ProtocolError,
    protocol::{ClientCommand, GameResult},
};
use tokio::{
    sync::{broadcast, mpsc, Mutex},
    task::JoinHandle,
};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    config::{ClientSettings, MAX_CHANNEL_BUFFER},
    error::ClientError,
    redirect::RedirectTimer,
    session::{Effect, ReducerSettings, SessionState},
};

const CLOSE_GRACE: Duration = Duration::from_millis(500);

/// Context known before the socket opens.
#[derive(Debug, Clone, Default)]
pub struct SessionSeed {
    pub game_id: Option<GameId>,
    pub token: Option<SessionToken>,
    pub color: Option<Piece>,
}

#[derive(Debug, Clone)]
pub enum ClientEvent {
    StateChanged(Arc<SessionState>),
    ServerError(ProtocolError),
    GameFinished(GameResult),
    /// The post-game delay elapsed; leave the game view.
    Redirect,
    DecodeFailed(String),
    CommandRejected(String),
    Disconnected(Option<String>),
}

enum Outbound {
    Command(ClientCommand),
    Close,
}

/// Maps the HTTP base URL onto the live endpoint: `http` becomes `ws` and
/// `https` becomes `wss`.
pub fn ws_url(server_url: &str, live_path: &str) -> Result<Url, ClientError> {
    let mut url =
        Url::parse(server_url).map_err(|_| ClientError::InvalidServerUrl(server_url.to_string()))?;
    let scheme = match url.scheme() {
        "http" => "ws",
        "https" => "wss",
        _ => return Err(ClientError::InvalidServerUrl(server_url.to_string())),
    };
    url.set_scheme(scheme)
        .map_err(|_| ClientError::InvalidServerUrl(server_url.to_string()))?;
    let base = url.path().trim_end_matches('/').to_string();
    url.set_path(&format!("{base}/{}", live_path.trim_start_matches('/')));
    Ok(url)
}

pub struct LiveConnection {
    state: Arc<Mutex<SessionState>>,
    events: broadcast::Sender<ClientEvent>,
    outbound: mpsc::Sender<Outbound>,
    redirect: Arc<std::sync::Mutex<RedirectTimer>>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl LiveConnection {
    pub async fn connect(
        settings: &ClientSettings,
        seed: SessionSeed,
    ) -> Result<(Self, broadcast::Receiver<ClientEvent>), ClientError> {
        // The server hangs up on sockets that do not identify promptly.
        let token = seed.token.clone().ok_or(ClientError::MissingContext {
            command: "identify",
            missing: "token",
        })?;
        let url = ws_url(&settings.server_url, &settings.live_path)?;
        let (ws_stream, _) =
            connect_async(url.as_str())
                .await
                .map_err(|source| ClientError::Connect {
                    url: url.to_string(),
                    source,
                })?;
        info!(%url, game_id = ?seed.game_id, "live connection open");
        let (ws_writer, ws_reader) = ws_stream.split();

        let mut session = SessionState::new().with_token(token);
        if let Some(id) = seed.game_id {
            session = session.with_game_id(id);
        }
        if let Some(color) = seed.color {
            session.set_color(color);
        }

        let state = Arc::new(Mutex::new(session));
        let (events, events_rx) =
            broadcast::channel(settings.event_buffer.clamp(1, MAX_CHANNEL_BUFFER));
        let (outbound, outbound_rx) =
            mpsc::channel(settings.outbound_buffer.clamp(1, MAX_CHANNEL_BUFFER));
        let redirect = Arc::new(std::sync::Mutex::new(RedirectTimer::new()));

        let writer = tokio::spawn(run_writer(
            ws_writer,
            outbound_rx,
            Arc::clone(&state),
            events.clone(),
        ));
        let reader = tokio::spawn(run_reader(
            ws_reader,
            ReaderContext {
                state: Arc::clone(&state),
                events: events.clone(),
                outbound: outbound.clone(),
                redirect: Arc::clone(&redirect),
                settings: settings.reducer(),
            },
        ));

        outbound
            .send(Outbound::Command(ClientCommand::Identify))
            .await
            .map_err(|_| ClientError::Closed)?;

        Ok((
            Self {
                state,
                events,
                outbound,
                redirect,
                reader,
                writer,
            },
            events_rx,
        ))
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> SessionState {
        self.state.lock().await.clone()
    }

    /// Queues a command. The token is attached by the writer when the frame
    /// goes out, not here.
    pub async fn send(&self, command: ClientCommand) -> Result<(), ClientError> {
        self.outbound
            .send(Outbound::Command(command))
            .await
            .map_err(|_| ClientError::Closed)
    }

    pub async fn place(&self, x: u8, y: u8) -> Result<(), ClientError> {
        let command = self.state.lock().await.place(x, y)?;
        self.send(command).await
    }

    pub async fn hover(&self, x: u8, y: u8) -> Result<(), ClientError> {
        let command = self.state.lock().await.hover(x, y)?;
        self.send(command).await
    }

    pub async fn clear_preview(&self) {
        let mut state = self.state.lock().await;
        if state.preview().is_some() {
            state.clear_preview();
            let _ = self
                .events
                .send(ClientEvent::StateChanged(Arc::new(state.clone())));
        }
    }

    pub async fn set_color(&self, color: Piece) {
        let mut state = self.state.lock().await;
        state.set_color(color);
        let _ = self
            .events
            .send(ClientEvent::StateChanged(Arc::new(state.clone())));
    }

    pub fn redirect_pending(&self) -> bool {
        self.redirect
            .lock()
            .map(|timer| timer.is_pending())
            .unwrap_or(false)
    }

    /// Leaves the session: cancels any pending redirect, stops reading and
    /// sends a close frame.
    pub async fn close(mut self) {
        self.shutdown();
        if self.outbound.send(Outbound::Close).await.is_ok() {
            let _ = tokio::time::timeout(CLOSE_GRACE, &mut self.writer).await;
        }
        info!("live connection closed");
    }

    fn shutdown(&self) {
        if let Ok(mut timer) = self.redirect.lock() {
            timer.cancel();
        }
        self.reader.abort();
    }
}

impl Drop for LiveConnection {
    fn drop(&mut self) {
        self.shutdown();
        self.writer.abort();
    }
}

struct ReaderContext {
    state: Arc<Mutex<SessionState>>,
    events: broadcast::Sender<ClientEvent>,
    outbound: mpsc::Sender<Outbound>,
    redirect: Arc<std::sync::Mutex<RedirectTimer>>,
    settings: ReducerSettings,
}

impl ReaderContext {
    async fn handle_text(&self, text: &str) {
        let effects = {
            let mut state = self.state.lock().await;
            let before = state.clone();
            match state.handle_frame(text, &self.settings) {
                Ok(effects) => {
                    if *state != before {
                        let _ = self
                            .events
                            .send(ClientEvent::StateChanged(Arc::new(state.clone())));
                    }
                    effects
                }
                Err(err) => {
                    warn!(%err, "dropping undecodable frame");
                    let _ = self.events.send(ClientEvent::DecodeFailed(err.to_string()));
                    return;
                }
            }
        };

        for effect in effects {
            self.dispatch(effect).await;
        }
    }

    async fn dispatch(&self, effect: Effect) {
        match effect {
            Effect::Send(command) => {
                if self.outbound.send(Outbound::Command(command)).await.is_err() {
                    warn!("writer gone; dropping reducer command");
                }
            }
            Effect::ScheduleRedirect { delay } => {
                let events = self.events.clone();
                if let Ok(mut timer) = self.redirect.lock() {
                    timer.schedule(delay, move || {
                        let _ = events.send(ClientEvent::Redirect);
                    });
                }
            }
            Effect::ReportError(err) => {
                let _ = self.events.send(ClientEvent::ServerError(err));
            }
            Effect::AnnounceResult(result) => {
                info!(%result, "announcing result");
                let _ = self.events.send(ClientEvent::GameFinished(result));
            }
        }
    }
}

async fn run_reader<S>(mut ws_reader: S, ctx: ReaderContext)
where
    S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    let reason = loop {
        match ws_reader.next().await {
            Some(Ok(Message::Text(text))) => ctx.handle_text(&text).await,
            Some(Ok(Message::Close(frame))) => {
                break frame.map(|frame| frame.reason.to_string());
            }
            Some(Ok(Message::Binary(_))) => debug!("ignoring binary frame"),
            Some(Ok(_)) => {}
            Some(Err(err)) => {
                warn!(%err, "websocket receive failed");
                break Some(err.to_string());
            }
            None => break None,
        }
    };
    info!(reason = ?reason, "live connection ended");
    let _ = ctx.events.send(ClientEvent::Disconnected(reason));
}

async fn run_writer<S>(
    mut ws_writer: S,
    mut outbound: mpsc::Receiver<Outbound>,
    state: Arc<Mutex<SessionState>>,
    events: broadcast::Sender<ClientEvent>,
) where
    S: futures::Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    while let Some(next) = outbound.recv().await {
        let command = match next {
            Outbound::Command(command) => command,
            Outbound::Close => {
                let _ = ws_writer.send(Message::Close(None)).await;
                break;
            }
        };
        let name = command.name();
        let frame = state
            .lock()
            .await
            .envelope(command)
            .and_then(|envelope| envelope.to_json().map_err(ClientError::from));
        let frame = match frame {
            Ok(frame) => frame,
            Err(err) => {
                warn!(command = name, %err, "command not sent");
                let _ = events.send(ClientEvent::CommandRejected(err.to_string()));
                continue;
            }
        };
        debug!(command = name, "sending command");
        if let Err(err) = ws_writer.send(Message::Text(frame)).await {
            warn!(%err, "websocket send failed");
            break;
        }
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
