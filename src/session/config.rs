use crate::config::{BusinessConfig, Config, DEFAULT_ENDPOINT};
use crate::protocol::{Business, Common};
use std::fmt;
use std::time::Duration;

/// Service credentials and endpoint
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub app_id: String,
    pub api_key: String,
    pub api_secret: String,
    /// Base `https://` endpoint, e.g. `https://iat-api.xfyun.cn/v2/iat`
    pub endpoint: String,
}

impl Credentials {
    pub fn new(
        app_id: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            endpoint: endpoint.into(),
        }
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::new("", "", "", DEFAULT_ENDPOINT)
    }
}

// Keep the secret out of logs
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("app_id", &self.app_id)
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// Configuration for one recognition session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Client-side identifier used in logs (the service assigns its own `sid`)
    pub session_id: String,

    pub credentials: Credentials,

    /// Recognition parameters sent with the first frame
    pub business: BusinessConfig,

    /// Bytes of PCM per frame (1280 = 40ms at 16kHz/16-bit)
    pub frame_size: usize,

    /// Delay between frames
    pub frame_interval: Duration,

    /// Optional bound on the whole session. `None` waits for the service.
    pub timeout: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: format!("iat-{}", uuid::Uuid::new_v4()),
            credentials: Credentials::default(),
            business: BusinessConfig::default(),
            frame_size: 1280,
            frame_interval: Duration::from_millis(40),
            timeout: None,
        }
    }
}

impl SessionConfig {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            ..Default::default()
        }
    }

    pub(crate) fn common(&self) -> Common {
        Common {
            app_id: self.credentials.app_id.clone(),
        }
    }

    pub(crate) fn business_params(&self) -> Business {
        Business {
            language: self.business.language.clone(),
            domain: self.business.domain.clone(),
            accent: self.business.accent.clone(),
            vad_eos: self.business.vad_eos_ms,
            dwa: self.business.dwa.clone(),
        }
    }
}

impl From<&Config> for SessionConfig {
    fn from(cfg: &Config) -> Self {
        Self {
            credentials: Credentials::new(
                cfg.credentials.app_id.clone(),
                cfg.credentials.api_key.clone(),
                cfg.credentials.api_secret.clone(),
                cfg.credentials.url.clone(),
            ),
            business: cfg.business.clone(),
            frame_size: cfg.stream.frame_size,
            frame_interval: Duration::from_millis(cfg.stream.frame_interval_ms),
            timeout: cfg.session.timeout_secs.map(Duration::from_secs),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_secret() {
        let creds = Credentials::new("app", "key", "very-secret", DEFAULT_ENDPOINT);
        let printed = format!("{:?}", creds);
        assert!(printed.contains("app"));
        assert!(!printed.contains("very-secret"));
    }

    #[test]
    fn test_from_config() {
        let mut cfg = Config::default();
        cfg.credentials.app_id = "app".to_string();
        cfg.business.vad_eos_ms = 2500;
        cfg.stream.frame_interval_ms = 10;
        cfg.session.timeout_secs = Some(30);

        let session = SessionConfig::from(&cfg);
        assert_eq!(session.credentials.app_id, "app");
        assert_eq!(session.credentials.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(session.business_params().vad_eos, 2500);
        assert_eq!(session.frame_size, 1280);
        assert_eq!(session.frame_interval, Duration::from_millis(10));
        assert_eq!(session.timeout, Some(Duration::from_secs(30)));
        assert!(session.session_id.starts_with("iat-"));
    }
}
