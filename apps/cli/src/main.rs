use anyhow::{anyhow, Context, Result};
use clap::Parser;
use client_core::{
    color_for, load_settings, ClientEvent, GameDirectory, HttpGameDirectory, LiveConnection,
    SessionSeed, SessionState,
};
use shared::{
    domain::{Coord, GameId, Piece, SessionToken},
    protocol::{ClientCommand, ProtocolVersion},
};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::error::RecvError,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Args {
    /// Overrides `server_url` from client.toml and the environment.
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long)]
    game_id: GameId,
    /// Value of the `sid` session cookie.
    #[arg(long)]
    token: String,
    #[arg(long)]
    protocol: Option<ProtocolVersion>,
    /// Play this colour instead of deriving it from the game host.
    #[arg(long, value_parser = parse_piece)]
    color: Option<Piece>,
}

fn parse_piece(raw: &str) -> Result<Piece, String> {
    match raw.to_ascii_lowercase().as_str() {
        "black" | "b" => Ok(Piece::Black),
        "white" | "w" => Ok(Piece::White),
        other => Err(format!("expected black or white, got {other:?}")),
    }
}

enum Input {
    Place(u8, u8),
    Hover(u8, u8),
    Leave,
    Invite(String),
    Quit,
}

fn parse_input(line: &str) -> Result<Input> {
    let mut parts = line.split_whitespace();
    let verb = parts.next().unwrap_or_default();
    let mut coord = || -> Result<u8> {
        parts
            .next()
            .ok_or_else(|| anyhow!("{verb} needs x and y"))?
            .parse()
            .with_context(|| format!("{verb} coordinates must be 0-7"))
    };
    match verb {
        "place" | "p" => Ok(Input::Place(coord()?, coord()?)),
        "hover" | "h" => Ok(Input::Hover(coord()?, coord()?)),
        "leave" | "l" => Ok(Input::Leave),
        "invite" => {
            let guest = parts.next().ok_or_else(|| anyhow!("invite needs a username"))?;
            Ok(Input::Invite(guest.to_string()))
        }
        "quit" | "q" => Ok(Input::Quit),
        other => Err(anyhow!("unknown command {other:?}; try place, hover, leave, invite or quit")),
    }
}

fn render(state: &SessionState) {
    println!("   0 1 2 3 4 5 6 7");
    for (y, row) in state.board().rows().enumerate() {
        let cells: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(x, cell)| match cell {
                Some(piece) => piece.glyph().to_string(),
                None if Coord::new(x as u8, y as u8).is_some_and(|at| state.is_previewed(at)) => {
                    "*".to_string()
                }
                None => ".".to_string(),
            })
            .collect();
        println!("{y}  {}", cells.join(" "));
    }
    let whose = if state.is_my_turn() { "your" } else { "their" };
    println!("{} to move ({whose} turn)", state.turn());
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let mut settings = load_settings();
    if let Some(server_url) = args.server_url {
        settings.server_url = server_url.trim_end_matches('/').to_string();
    }
    if let Some(protocol) = args.protocol {
        settings.protocol = protocol;
    }
    let token = SessionToken::new(args.token);

    let directory = HttpGameDirectory::new(settings.server_url.clone(), token.clone());
    let game = directory
        .playable_game(args.game_id)
        .await
        .context("invalid game id provided")?;
    let color = match args.color {
        Some(color) => color,
        None => {
            let me = directory
                .me()
                .await
                .context("failed to look up which colour you play")?;
            color_for(&game, &me)
        }
    };
    info!(game_id = %args.game_id, %color, protocol = %settings.protocol, "joining game");

    let (conn, mut events) = LiveConnection::connect(
        &settings,
        SessionSeed {
            game_id: Some(args.game_id),
            token: Some(token),
            color: Some(color),
        },
    )
    .await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(ClientEvent::StateChanged(state)) => render(&state),
                Ok(ClientEvent::ServerError(err)) => println!("server: {} ({})", err.message, err.code),
                Ok(ClientEvent::GameFinished(result)) => println!("{result}"),
                Ok(ClientEvent::Redirect) => {
                    println!("game over; returning to the lobby");
                    break;
                }
                Ok(ClientEvent::DecodeFailed(err)) => warn!(%err, "ignored a frame"),
                Ok(ClientEvent::CommandRejected(err)) => println!("not sent: {err}"),
                Ok(ClientEvent::Disconnected(reason)) => {
                    println!("disconnected{}", reason.map(|r| format!(": {r}")).unwrap_or_default());
                    break;
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event stream lagged"),
                Err(RecvError::Closed) => break,
            },
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                let outcome: Result<()> = match parse_input(&line) {
                    Ok(Input::Place(x, y)) => conn.place(x, y).await.map_err(Into::into),
                    Ok(Input::Hover(x, y)) => conn.hover(x, y).await.map_err(Into::into),
                    Ok(Input::Leave) => {
                        conn.clear_preview().await;
                        Ok(())
                    }
                    Ok(Input::Invite(guest)) => conn
                        .send(ClientCommand::Create { guest })
                        .await
                        .map_err(Into::into),
                    Ok(Input::Quit) => break,
                    Err(err) => Err(err),
                };
                if let Err(err) = outcome {
                    println!("{err:#}");
                }
            }
        }
    }

    conn.close().await;
    Ok(())
}
