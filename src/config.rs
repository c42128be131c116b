use anyhow::{ensure, Result};
use serde::Deserialize;

pub const DEFAULT_ENDPOINT: &str = "https://iat-api.xfyun.cn/v2/iat";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub business: BusinessConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub session: SessionPolicyConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub name: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
        }
    }
}

/// Credentials issued by the recognition service console
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub app_id: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_secret: String,
    #[serde(default = "default_endpoint")]
    pub url: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            api_key: String::new(),
            api_secret: String::new(),
            url: default_endpoint(),
        }
    }
}

/// Parameters sent once, in the `business` block of the first frame
#[derive(Debug, Clone, Deserialize)]
pub struct BusinessConfig {
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_domain")]
    pub domain: String,
    #[serde(default = "default_accent")]
    pub accent: String,
    /// Trailing silence (ms) after which the service ends the utterance
    #[serde(default = "default_vad_eos_ms")]
    pub vad_eos_ms: u32,
    /// `wpgs` enables dynamic correction (`pgs`/`rg` in results)
    #[serde(default = "default_dwa")]
    pub dwa: String,
}

impl Default for BusinessConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
            domain: default_domain(),
            accent: default_accent(),
            vad_eos_ms: default_vad_eos_ms(),
            dwa: default_dwa(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    #[serde(default = "default_frame_size")]
    pub frame_size: usize,
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            frame_size: default_frame_size(),
            frame_interval_ms: default_frame_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionPolicyConfig {
    /// Optional upper bound on a whole session. Absent means wait for the
    /// service to end the stream.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_service_name() -> String {
    "iat-stream".to_string()
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_language() -> String {
    "zh_cn".to_string()
}

fn default_domain() -> String {
    "iat".to_string()
}

fn default_accent() -> String {
    "mandarin".to_string()
}

fn default_vad_eos_ms() -> u32 {
    5000
}

fn default_dwa() -> String {
    "wpgs".to_string()
}

fn default_frame_size() -> usize {
    1280
}

fn default_frame_interval_ms() -> u64 {
    40
}

impl Config {
    /// Load `path` (any format the `config` crate understands, extension
    /// optional) with `IAT__SECTION__KEY` environment overrides on top.
    /// A missing file is not an error.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("IAT").separator("__"))
            .build()?;

        let cfg: Self = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Environment-only configuration
    pub fn from_env() -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::Environment::with_prefix("IAT").separator("__"))
            .build()?;

        let cfg: Self = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        ensure!(self.stream.frame_size > 0, "stream.frame_size must be positive");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_service_protocol() {
        let cfg = Config::default();
        assert_eq!(cfg.credentials.url, DEFAULT_ENDPOINT);
        assert_eq!(cfg.business.language, "zh_cn");
        assert_eq!(cfg.business.domain, "iat");
        assert_eq!(cfg.business.accent, "mandarin");
        assert_eq!(cfg.business.vad_eos_ms, 5000);
        assert_eq!(cfg.business.dwa, "wpgs");
        assert_eq!(cfg.stream.frame_size, 1280);
        assert_eq!(cfg.stream.frame_interval_ms, 40);
        assert!(cfg.session.timeout_secs.is_none());
    }

    #[test]
    fn test_load_from_file() -> Result<()> {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile()?;
        writeln!(
            file,
            r#"
[credentials]
app_id = "app"
api_key = "key"
api_secret = "secret"

[business]
vad_eos_ms = 3000

[stream]
frame_interval_ms = 0
"#
        )?;

        let cfg = Config::load(file.path().to_str().unwrap())?;
        assert_eq!(cfg.credentials.app_id, "app");
        assert_eq!(cfg.credentials.url, DEFAULT_ENDPOINT);
        assert_eq!(cfg.business.vad_eos_ms, 3000);
        assert_eq!(cfg.business.language, "zh_cn");
        assert_eq!(cfg.stream.frame_size, 1280);
        assert_eq!(cfg.stream.frame_interval_ms, 0);
        Ok(())
    }

    #[test]
    fn test_rejects_zero_frame_size() -> Result<()> {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile()?;
        writeln!(file, "[stream]\nframe_size = 0")?;

        assert!(Config::load(file.path().to_str().unwrap()).is_err());
        Ok(())
    }
}
