//! Server configuration.
//!
//! Deployment knobs come from environment variables; protocol timings
//! carry the production defaults and exist as fields so tests can
//! compress them (a 30-second grace makes for a bad test suite).

use std::time::Duration;

/// Everything tunable about a running server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen port (`PORT`, default 8080).
    pub port: u16,

    /// PostgreSQL connection string (`DATABASE_URL`). When absent the
    /// server runs on the in-memory stats store.
    pub database_url: Option<String>,

    /// How long a waiting room holds out for a human opponent before
    /// the bot is seated. Default: 10 s.
    pub bot_join_delay: Duration,

    /// The bot's "thinking" pause before each of its moves.
    /// Default: 1 s.
    pub bot_think_delay: Duration,

    /// How long a disconnected player may take to rejoin before the
    /// opponent is declared winner. Default: 30 s.
    pub reconnect_grace: Duration,

    /// How long a finished room lingers so final notifications and
    /// stats writes flush before the indexes drop it. Default: 5 s.
    pub finished_linger: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            database_url: None,
            bot_join_delay: Duration::from_secs(10),
            bot_think_delay: Duration::from_secs(1),
            reconnect_grace: Duration::from_secs(30),
            finished_linger: Duration::from_secs(5),
        }
    }
}

impl ServerConfig {
    /// Reads the deployment knobs from the environment, keeping the
    /// default timings.
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);
        let database_url =
            std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty());
        Self {
            port,
            database_url,
            ..Self::default()
        }
    }

    /// The address `run()` binds to.
    pub fn bind_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timings_match_protocol() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.bot_join_delay, Duration::from_secs(10));
        assert_eq!(config.bot_think_delay, Duration::from_secs(1));
        assert_eq!(config.reconnect_grace, Duration::from_secs(30));
        assert_eq!(config.finished_linger, Duration::from_secs(5));
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_bind_addr_uses_port() {
        let config = ServerConfig {
            port: 9999,
            ..ServerConfig::default()
        };
        assert_eq!(config.bind_addr(), "0.0.0.0:9999");
    }
}
