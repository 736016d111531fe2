//! Client configuration
//!
//! Everything about the outbound call that is fixed for the lifetime of a
//! client: where it goes, how it is authorised and how long it may take.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::ClientError;

pub const DEFAULT_ENDPOINT: &str = "https://ismp.crpt.ru/api/v3/lk/documents/create";
pub const DEFAULT_AUTHORIZATION: &str = "Bearer YOUR_TOKEN";
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// How admission relates to the network call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CallOrdering {
    /// A slot is reserved and released to the caller; up to `max_requests`
    /// calls may be in flight at once.
    #[default]
    Concurrent,
    /// Admission and the call happen under one client-wide lock, so calls
    /// leave strictly one at a time.
    Serialized,
}

impl FromStr for CallOrdering {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "concurrent" => Ok(CallOrdering::Concurrent),
            "serialized" | "serial" => Ok(CallOrdering::Serialized),
            other => Err(ClientError::Config(format!(
                "unknown call ordering `{other}`, expected `concurrent` or `serialized`"
            ))),
        }
    }
}

/// Configuration of the outbound call.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Target of every POST
    pub endpoint: String,
    /// Value of the `Authorization` header
    pub authorization: String,
    /// Value of the `Content-Type` header
    pub content_type: String,
    /// Limit on establishing a connection
    pub connect_timeout: Duration,
    /// Limit on one request, from connecting until the body is read
    pub send_timeout: Duration,
    pub ordering: CallOrdering,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            authorization: DEFAULT_AUTHORIZATION.to_string(),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            send_timeout: DEFAULT_SEND_TIMEOUT,
            ordering: CallOrdering::default(),
        }
    }
}

impl ClientConfig {
    /// Builds a configuration from `THROTTLE_*` environment variables,
    /// falling back to the defaults for anything unset.
    ///
    /// | Variable | Format |
    /// |---|---|
    /// | `THROTTLE_ENDPOINT` | URL |
    /// | `THROTTLE_AUTHORIZATION` | header value |
    /// | `THROTTLE_CONTENT_TYPE` | header value |
    /// | `THROTTLE_CONNECT_TIMEOUT` | duration, e.g. `5s` |
    /// | `THROTTLE_SEND_TIMEOUT` | duration, e.g. `10s` |
    /// | `THROTTLE_ORDERING` | `concurrent` or `serialized` |
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ClientError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(endpoint) = lookup("THROTTLE_ENDPOINT") {
            config.endpoint = endpoint;
        }
        if let Some(authorization) = lookup("THROTTLE_AUTHORIZATION") {
            config.authorization = authorization;
        }
        if let Some(content_type) = lookup("THROTTLE_CONTENT_TYPE") {
            config.content_type = content_type;
        }
        if let Some(timeout) = lookup("THROTTLE_CONNECT_TIMEOUT") {
            config.connect_timeout = parse_duration("THROTTLE_CONNECT_TIMEOUT", &timeout)?;
        }
        if let Some(timeout) = lookup("THROTTLE_SEND_TIMEOUT") {
            config.send_timeout = parse_duration("THROTTLE_SEND_TIMEOUT", &timeout)?;
        }
        if let Some(ordering) = lookup("THROTTLE_ORDERING") {
            config.ordering = ordering.parse()?;
        }

        Ok(config)
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_authorization(mut self, authorization: impl Into<String>) -> Self {
        self.authorization = authorization.into();
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Choose whether calls may overlap. See [`CallOrdering`].
    pub fn with_ordering(mut self, ordering: CallOrdering) -> Self {
        self.ordering = ordering;
        self
    }
}

fn parse_duration(key: &str, value: &str) -> Result<Duration, ClientError> {
    humantime::parse_duration(value)
        .map_err(|e| ClientError::Config(format!("{key}: {e}")))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_match_the_documented_constants() {
        let config = ClientConfig::default();
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.send_timeout, Duration::from_secs(10));
        assert_eq!(config.ordering, CallOrdering::Concurrent);
    }

    #[test]
    fn it_reads_overrides() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            ("THROTTLE_ENDPOINT", "http://localhost:8080/api"),
            ("THROTTLE_AUTHORIZATION", "Bearer abc"),
            ("THROTTLE_SEND_TIMEOUT", "250ms"),
            ("THROTTLE_CONNECT_TIMEOUT", "1s"),
            ("THROTTLE_ORDERING", "Serialized"),
        ]))
        .unwrap();

        assert_eq!(config.endpoint, "http://localhost:8080/api");
        assert_eq!(config.authorization, "Bearer abc");
        assert_eq!(config.content_type, DEFAULT_CONTENT_TYPE);
        assert_eq!(config.send_timeout, Duration::from_millis(250));
        assert_eq!(config.connect_timeout, Duration::from_secs(1));
        assert_eq!(config.ordering, CallOrdering::Serialized);
    }

    #[test]
    fn it_rejects_bad_durations() {
        let result =
            ClientConfig::from_lookup(lookup_from(&[("THROTTLE_SEND_TIMEOUT", "soon")]));
        assert!(matches!(result, Err(ClientError::Config(msg)) if msg.starts_with("THROTTLE_SEND_TIMEOUT")));
    }

    #[test]
    fn it_rejects_unknown_ordering() {
        assert!("sometimes".parse::<CallOrdering>().is_err());
        assert_eq!(
            " concurrent ".parse::<CallOrdering>().unwrap(),
            CallOrdering::Concurrent
        );
    }

    #[test]
    fn builders_override_fields() {
        let config = ClientConfig::default()
            .with_endpoint("http://127.0.0.1:1/")
            .with_content_type("text/plain")
            .with_ordering(CallOrdering::Serialized);

        assert_eq!(config.endpoint, "http://127.0.0.1:1/");
        assert_eq!(config.content_type, "text/plain");
        assert_eq!(config.ordering, CallOrdering::Serialized);
    }
}
