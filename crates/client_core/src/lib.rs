pub mod api;
pub mod config;
pub mod error;
pub mod redirect;
pub mod session;
pub mod transport;

pub use api::{color_for, GameDirectory, HttpGameDirectory};
pub use config::{load_settings, ClientSettings};
pub use error::ClientError;
pub use redirect::RedirectTimer;
pub use session::{reduce, Effect, GameOver, ReducerSettings, SessionState};
pub use transport::{ws_url, ClientEvent, LiveConnection, SessionSeed};
