use std::{collections::HashMap, fs, time::Duration};

use shared::protocol::ProtocolVersion;
use tracing::warn;

use crate::session::{ReducerSettings, DEFAULT_ABORT_REDIRECT_DELAY};

pub const SETTINGS_FILE: &str = "client.toml";
/// Upper bound for `event_buffer` and `outbound_buffer`.
pub const MAX_CHANNEL_BUFFER: usize = 65_536;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub server_url: String,
    pub live_path: String,
    pub protocol: ProtocolVersion,
    pub abort_redirect_delay: Duration,
    pub end_redirect_delay: Option<Duration>,
    pub event_buffer: usize,
    pub outbound_buffer: usize,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:3000".into(),
            live_path: "/live".into(),
            protocol: ProtocolVersion::Current,
            abort_redirect_delay: DEFAULT_ABORT_REDIRECT_DELAY,
            end_redirect_delay: None,
            event_buffer: 256,
            outbound_buffer: 16,
        }
    }
}

impl ClientSettings {
    pub fn reducer(&self) -> ReducerSettings {
        ReducerSettings {
            protocol: self.protocol,
            abort_redirect_delay: self.abort_redirect_delay,
            end_redirect_delay: self.end_redirect_delay,
        }
    }
}

/// Defaults, then `client.toml` in the working directory, then environment.
pub fn load_settings() -> ClientSettings {
    let raw = fs::read_to_string(SETTINGS_FILE).ok();
    load_settings_with(raw.as_deref(), |key| std::env::var(key).ok())
}

pub fn load_settings_with(
    file: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> ClientSettings {
    let mut settings = ClientSettings::default();

    if let Some(raw) = file {
        match toml::from_str::<HashMap<String, toml::Value>>(raw) {
            Ok(file_cfg) => {
                for (key, value) in file_cfg {
                    let Some(value) = scalar(&value) else {
                        warn!(key = %key, "ignoring non-scalar setting in {SETTINGS_FILE}");
                        continue;
                    };
                    apply(&mut settings, &key, &value);
                }
            }
            Err(err) => warn!(%err, "ignoring unreadable {SETTINGS_FILE}"),
        }
    }

    for (var, key) in [
        ("OTHELLO_SERVER_URL", "server_url"),
        ("APP__SERVER_URL", "server_url"),
        ("APP__LIVE_PATH", "live_path"),
        ("APP__PROTOCOL_VERSION", "protocol_version"),
        ("APP__ABORT_REDIRECT_MS", "abort_redirect_ms"),
        ("APP__END_REDIRECT_MS", "end_redirect_ms"),
        ("APP__EVENT_BUFFER", "event_buffer"),
        ("APP__OUTBOUND_BUFFER", "outbound_buffer"),
    ] {
        if let Some(v) = env(var) {
            apply(&mut settings, key, &v);
        }
    }

    settings
}

fn scalar(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(v) => Some(v.clone()),
        toml::Value::Integer(v) => Some(v.to_string()),
        toml::Value::Boolean(v) => Some(v.to_string()),
        _ => None,
    }
}

fn apply(settings: &mut ClientSettings, key: &str, value: &str) {
    let value = value.trim();
    match key {
        "server_url" => settings.server_url = value.trim_end_matches('/').to_string(),
        "live_path" => settings.live_path = normalize_path(value),
        "protocol_version" => match value.parse() {
            Ok(protocol) => settings.protocol = protocol,
            Err(err) => warn!(%err, "keeping protocol {}", settings.protocol),
        },
        "abort_redirect_ms" => {
            if let Some(ms) = parse_number(key, value) {
                settings.abort_redirect_delay = Duration::from_millis(ms);
            }
        }
        // Empty or "off" disables the redirect after a completed game.
        "end_redirect_ms" => {
            if value.is_empty() || value.eq_ignore_ascii_case("off") {
                settings.end_redirect_delay = None;
            } else if let Some(ms) = parse_number(key, value) {
                settings.end_redirect_delay = Some(Duration::from_millis(ms));
            }
        }
        "event_buffer" => {
            if let Some(n) = parse_buffer(key, value) {
                settings.event_buffer = n;
            }
        }
        "outbound_buffer" => {
            if let Some(n) = parse_buffer(key, value) {
                settings.outbound_buffer = n;
            }
        }
        _ => warn!(key = %key, "unknown client setting"),
    }
}

fn parse_number(key: &str, value: &str) -> Option<u64> {
    match value.parse::<u64>() {
        Ok(n) => Some(n),
        Err(_) => {
            warn!(key = %key, value = %value, "expected a non-negative integer");
            None
        }
    }
}

fn parse_buffer(key: &str, value: &str) -> Option<usize> {
    let n = parse_number(key, value)?;
    match usize::try_from(n) {
        Ok(n) if (1..=MAX_CHANNEL_BUFFER).contains(&n) => Some(n),
        _ => {
            warn!(key = %key, value = n, max = MAX_CHANNEL_BUFFER, "buffer size out of range");
            None
        }
    }
}

fn normalize_path(raw: &str) -> String {
    let trimmed = raw.trim_matches('/');
    format!("/{trimmed}")
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
