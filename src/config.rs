// YAML configuration for the gateway: peer list, local SMPP server, HTTP
// server and logging. Loaded once at startup; route regexes are compiled
// here so the router never touches pattern strings.

use regex::Regex;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("no SMPP peers configured")]
    NoPeers,

    #[error("duplicate peer id '{0}'")]
    DuplicatePeerId(String),

    #[error("more than one peer marked default ('{0}' and '{1}')")]
    MultipleDefaults(String, String),

    #[error("invalid kamailio_url '{url}': {reason}")]
    InvalidKamailioUrl { url: String, reason: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    pub smpp_peers: Vec<PeerConfig>,
    pub smpp_server: ServerConfig,
    pub http_server: HttpConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PeerConfig {
    pub id: String,
    pub ipaddress: String,
    pub port: u16,
    pub system_id: String,
    pub password: String,
    #[serde(default)]
    pub system_type: String,
    #[serde(default = "default_ton_npi")]
    pub source_addr_ton: u8,
    #[serde(default = "default_ton_npi")]
    pub source_addr_npi: u8,
    #[serde(default = "default_ton_npi")]
    pub dest_addr_ton: u8,
    #[serde(default = "default_ton_npi")]
    pub dest_addr_npi: u8,
    /// Delay between reconnect attempts, milliseconds.
    #[serde(default = "default_reconnect_interval")]
    pub reconnect_interval: u64,
    /// Idle interval after which an enquire_link is sent, milliseconds.
    #[serde(default = "default_enquire_link_interval")]
    pub enquire_link_interval: u64,
    /// Deadline for a response to any request PDU, milliseconds.
    #[serde(default = "default_response_timeout")]
    pub response_timeout: u64,
    #[serde(default)]
    pub route_regex: Option<String>,
    #[serde(rename = "default", default)]
    pub is_default: bool,
    /// Compiled form of `route_regex`, populated at load time.
    #[serde(skip)]
    pub route: Option<Regex>,
}

impl PeerConfig {
    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval)
    }

    pub fn enquire_link_interval(&self) -> Duration {
        Duration::from_millis(self.enquire_link_interval)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout)
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.ipaddress, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub bind_ip: String,
    #[serde(default = "default_smpp_port")]
    pub port: u16,
    #[serde(default)]
    pub auth: Vec<AuthCredential>,
    /// Concurrent inbound session cap.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.bind_ip, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthCredential {
    pub system_id: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind_ip: String,
    pub port: u16,
    pub kamailio_url: String,
}

impl HttpConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.bind_ip, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub file_path: Option<String>,
    /// Rotation size hint (e.g. "20m") for the external log supervisor.
    #[serde(default)]
    pub max_size: Option<String>,
    #[serde(default)]
    pub max_files: Option<u32>,
    #[serde(default = "default_console_enabled")]
    pub console_enabled: bool,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            file_path: None,
            max_size: None,
            max_files: None,
            console_enabled: default_console_enabled(),
            log_level: default_log_level(),
        }
    }
}

impl GatewayConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        let mut config: GatewayConfig = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&mut self) -> Result<(), ConfigError> {
        if self.smpp_peers.is_empty() {
            return Err(ConfigError::NoPeers);
        }

        let mut default_peer: Option<&str> = None;
        for i in 0..self.smpp_peers.len() {
            let id = self.smpp_peers[i].id.clone();

            if self.smpp_peers[i + 1..].iter().any(|p| p.id == id) {
                return Err(ConfigError::DuplicatePeerId(id));
            }

            if self.smpp_peers[i].is_default {
                if let Some(first) = default_peer {
                    return Err(ConfigError::MultipleDefaults(first.to_owned(), id));
                }
                default_peer = Some(self.smpp_peers[i].id.as_str());
            }
        }

        for peer in &mut self.smpp_peers {
            if let Some(pattern) = &peer.route_regex {
                match Regex::new(pattern) {
                    Ok(re) => peer.route = Some(re),
                    // The peer keeps serving as a default candidate; it is
                    // only excluded from regex-based routing.
                    Err(e) => warn!(
                        peer = %peer.id,
                        pattern = %pattern,
                        error = %e,
                        "invalid route_regex; peer disabled for regex routing"
                    ),
                }
            }
        }

        if let Err(e) = reqwest::Url::parse(&self.http_server.kamailio_url) {
            return Err(ConfigError::InvalidKamailioUrl {
                url: self.http_server.kamailio_url.clone(),
                reason: e.to_string(),
            });
        }

        Ok(())
    }
}

fn default_ton_npi() -> u8 {
    1
}

fn default_reconnect_interval() -> u64 {
    10_000
}

fn default_enquire_link_interval() -> u64 {
    30_000
}

fn default_response_timeout() -> u64 {
    10_000
}

fn default_smpp_port() -> u16 {
    2775
}

fn default_max_sessions() -> usize {
    64
}

fn default_console_enabled() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_owned()
}
