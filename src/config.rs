//! Gateway configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Everything has a default except
//! `TOKEN_SECRET`, which must be present for the gateway to start.

use std::net::SocketAddr;
use std::time::Duration;

/// Top-level relay configuration.
///
/// Loaded once at startup via [`RelayConfig::from_env`].
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:8080`).
    pub listen_addr: SocketAddr,

    /// Shared secret used to verify connection-upgrade tokens.
    pub token_secret: String,

    /// Capacity of each hub input stream (register, unregister, inbound).
    pub hub_queue_capacity: usize,

    /// Capacity of each client's outbound frame queue.
    pub outbound_queue_capacity: usize,

    /// Maximum accepted size of a single inbound frame, in bytes.
    pub max_frame_bytes: usize,

    /// Seconds a connection may go without a pong before its reader
    /// gives up.
    pub read_deadline_secs: u64,

    /// Seconds allowed for a single outbound write.
    pub write_deadline_secs: u64,

    /// Master switch for the periodic news bulletin.
    pub news_enabled: bool,

    /// Seconds between news bulletins.
    pub news_interval_secs: u64,
}

impl RelayConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to sensible defaults when a variable is not set.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns an error if `TOKEN_SECRET` is unset or empty, or if
    /// `LISTEN_ADDR` is set but cannot be parsed as a [`SocketAddr`].
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let listen_addr: SocketAddr = std::env::var("LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse()?;

        let token_secret = std::env::var("TOKEN_SECRET")
            .map_err(|_| anyhow::anyhow!("TOKEN_SECRET environment variable is required"))?;
        if token_secret.is_empty() {
            anyhow::bail!("TOKEN_SECRET must not be empty");
        }

        Ok(Self {
            listen_addr,
            token_secret,
            hub_queue_capacity: parse_env("HUB_QUEUE_CAPACITY", 256),
            outbound_queue_capacity: parse_env("OUTBOUND_QUEUE_CAPACITY", 256),
            max_frame_bytes: parse_env("MAX_FRAME_BYTES", 512),
            read_deadline_secs: parse_env("READ_DEADLINE_SECS", 60),
            write_deadline_secs: parse_env("WRITE_DEADLINE_SECS", 10),
            news_enabled: parse_env_bool("NEWS_ENABLED", true),
            news_interval_secs: parse_env("NEWS_INTERVAL_SECS", 10),
        })
    }

    /// Returns the per-connection pump settings derived from this config.
    #[must_use]
    pub fn pump(&self) -> PumpConfig {
        PumpConfig {
            read_window: Duration::from_secs(self.read_deadline_secs),
            write_wait: Duration::from_secs(self.write_deadline_secs),
            max_frame_bytes: self.max_frame_bytes,
            outbound_capacity: self.outbound_queue_capacity,
        }
    }
}

/// Timing and capacity settings for one connection's read/write pumps.
#[derive(Debug, Clone, Copy)]
pub struct PumpConfig {
    /// How long the reader waits for traffic; refreshed by pongs.
    pub read_window: Duration,
    /// Deadline for a single outbound write.
    pub write_wait: Duration,
    /// Maximum accepted inbound frame size in bytes.
    pub max_frame_bytes: usize,
    /// Outbound frame queue capacity.
    pub outbound_capacity: usize,
}

impl PumpConfig {
    /// Heartbeat send interval: 9/10 of the read window, so a ping is
    /// always in flight before the peer's read deadline can expire.
    #[must_use]
    pub fn ping_period(&self) -> Duration {
        self.read_window * 9 / 10
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Parses an environment variable as a boolean. Accepts `"true"`, `"1"`,
/// `"false"`, `"0"` (case-insensitive). Returns `default` otherwise.
fn parse_env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key).ok().as_deref() {
        Some("true") | Some("TRUE") | Some("1") => true,
        Some("false") | Some("FALSE") | Some("0") => false,
        _ => default,
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn ping_period_is_nine_tenths_of_the_read_window() {
        let pump = PumpConfig {
            read_window: Duration::from_secs(60),
            write_wait: Duration::from_secs(10),
            max_frame_bytes: 512,
            outbound_capacity: 256,
        };
        assert_eq!(pump.ping_period(), Duration::from_secs(54));
        assert!(pump.ping_period() < pump.read_window);
    }
}
