use std::str::FromStr;
use std::time::Duration;

use mentorlink_channel::ReconnectConfig;
use mentorlink_core::roles::ActorRole;
use mentorlink_core::types::{Actor, DbId};

/// Client configuration loaded from environment variables.
///
/// All fields except the actor id have defaults suitable for local
/// development against a platform running on `localhost:3000`.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// REST base URL, without trailing slash.
    pub api_base_url: String,
    /// WebSocket URL of the real-time channel.
    pub channel_ws_url: String,
    /// Bearer token issued by the external auth service.
    pub auth_token: Option<String>,
    pub actor_id: Option<DbId>,
    pub actor_role: ActorRole,
    pub reconnect_initial_ms: u64,
    pub reconnect_max_secs: u64,
    pub request_timeout_secs: u64,
    pub draft_ttl_secs: i64,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} has an invalid value: '{value}'")]
    Invalid { var: &'static str, value: String },
}

impl ClientConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                          |
    /// |------------------------|----------------------------------|
    /// | `API_BASE_URL`         | `http://localhost:3000/api/v1`   |
    /// | `CHANNEL_WS_URL`       | `ws://localhost:3000/ws`         |
    /// | `AUTH_TOKEN`           | none                             |
    /// | `ACTOR_ID`             | none                             |
    /// | `ACTOR_ROLE`           | `student`                        |
    /// | `RECONNECT_INITIAL_MS` | `1000`                           |
    /// | `RECONNECT_MAX_SECS`   | `30`                             |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                             |
    /// | `DRAFT_TTL_SECS`       | `86400`                          |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_base_url = lookup("API_BASE_URL")
            .unwrap_or_else(|| "http://localhost:3000/api/v1".into())
            .trim_end_matches('/')
            .to_string();

        let channel_ws_url =
            lookup("CHANNEL_WS_URL").unwrap_or_else(|| "ws://localhost:3000/ws".into());

        let auth_token = lookup("AUTH_TOKEN").filter(|t| !t.trim().is_empty());

        let actor_id = match lookup("ACTOR_ID") {
            Some(value) => Some(parse_value("ACTOR_ID", &value)?),
            None => None,
        };

        let actor_role = match lookup("ACTOR_ROLE") {
            Some(value) => ActorRole::parse(&value).ok_or(ConfigError::Invalid {
                var: "ACTOR_ROLE",
                value,
            })?,
            None => ActorRole::Student,
        };

        Ok(Self {
            api_base_url,
            channel_ws_url,
            auth_token,
            actor_id,
            actor_role,
            reconnect_initial_ms: parse_or(&lookup, "RECONNECT_INITIAL_MS", 1000)?,
            reconnect_max_secs: parse_or(&lookup, "RECONNECT_MAX_SECS", 30)?,
            request_timeout_secs: parse_or(&lookup, "REQUEST_TIMEOUT_SECS", 30)?,
            draft_ttl_secs: parse_or(&lookup, "DRAFT_TTL_SECS", 86_400)?,
        })
    }

    /// The acting user. Requires `ACTOR_ID`.
    pub fn actor(&self) -> Result<Actor, ConfigError> {
        let user_id = self.actor_id.ok_or(ConfigError::Missing("ACTOR_ID"))?;
        Ok(Actor {
            user_id,
            role: self.actor_role,
        })
    }

    pub fn reconnect(&self) -> ReconnectConfig {
        ReconnectConfig::new(
            Duration::from_millis(self.reconnect_initial_ms),
            Duration::from_secs(self.reconnect_max_secs),
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn draft_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.draft_ttl_secs)
    }
}

fn parse_value<T: FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        var,
        value: value.to_string(),
    })
}

fn parse_or<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(var) {
        Some(value) => parse_value(var, &value),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<ClientConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ClientConfig::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.api_base_url, "http://localhost:3000/api/v1");
        assert_eq!(config.channel_ws_url, "ws://localhost:3000/ws");
        assert_eq!(config.auth_token, None);
        assert_eq!(config.actor_role, ActorRole::Student);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.draft_ttl(), chrono::Duration::hours(24));
        assert_eq!(config.reconnect(), ReconnectConfig::default());
    }

    #[test]
    fn overrides() {
        let config = load(&[
            ("API_BASE_URL", "https://platform.test/api/v1/"),
            ("AUTH_TOKEN", "abc"),
            ("ACTOR_ID", "42"),
            ("ACTOR_ROLE", "MENTOR"),
            ("RECONNECT_INITIAL_MS", "250"),
        ])
        .unwrap();
        assert_eq!(config.api_base_url, "https://platform.test/api/v1");
        assert_eq!(config.auth_token.as_deref(), Some("abc"));
        assert_eq!(config.actor().unwrap(), Actor::mentor(42));
        assert_eq!(
            config.reconnect().initial_delay,
            Duration::from_millis(250)
        );
    }

    #[test]
    fn malformed_number_is_reported() {
        assert_matches!(
            load(&[("REQUEST_TIMEOUT_SECS", "soon")]),
            Err(ConfigError::Invalid { var: "REQUEST_TIMEOUT_SECS", ref value }) if value == "soon"
        );
    }

    #[test]
    fn unknown_role_is_reported() {
        assert_matches!(
            load(&[("ACTOR_ROLE", "admin")]),
            Err(ConfigError::Invalid { var: "ACTOR_ROLE", .. })
        );
    }

    #[test]
    fn actor_requires_id() {
        let config = load(&[]).unwrap();
        assert_eq!(config.actor(), Err(ConfigError::Missing("ACTOR_ID")));
    }
}
