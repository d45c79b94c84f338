use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_CONFIG_PATH: &str = "linkwheel.toml";
pub const DEFAULT_SCHEDULE_TIME: &str = "09:00";
pub const DEFAULT_TIMEZONE: &str = "Asia/Kolkata";
pub const DEFAULT_LINKS_PATH: &str = "link.txt";
pub const DEFAULT_CURSOR_PATH: &str = "linkIndex.json";
pub const DEFAULT_TEMPLATE: &str = "📌 Today's link: {link}";
pub const DEFAULT_BRIDGE_URL: &str = "http://127.0.0.1:3000";
pub const SEND_TIMEOUT_SECS: u64 = 10; // hard deadline on a single send attempt
pub const PROBE_INTERVAL_SECS: u64 = 30; // bridge session re-check cadence

/// Top-level config (linkwheel.toml + LINKWHEEL_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LinkwheelConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub rotation: RotationConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
}

/// Keep-alive HTTP listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

/// When the daily dispatch fires.
///
/// `time` ("HH:MM", interpreted in `timezone`) and `every` (seconds) are
/// mutually exclusive. With neither set, the dispatch runs daily at
/// 09:00 in the default timezone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Daily fire time, e.g. "09:00".
    /// Override with env var: LINKWHEEL_SCHEDULE_TIME=07:30
    pub time: Option<String>,
    /// Fixed interval in seconds, e.g. 3600.
    pub every: Option<u64>,
    /// IANA timezone name applied to `time`.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            time: None,
            every: None,
            timezone: DEFAULT_TIMEZONE.to_string(),
        }
    }
}

/// Where the daily link goes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    #[serde(default)]
    pub kind: TargetKind,
    /// Group name for `kind = "group"`, phone number for `kind = "individual"`.
    #[serde(default)]
    pub value: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            kind: TargetKind::Group,
            value: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    #[default]
    Group,
    Individual,
}

/// Link source and cursor record locations. Both are plain files an
/// operator can inspect and edit while the daemon runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationConfig {
    #[serde(default = "default_links_path")]
    pub links: String,
    #[serde(default = "default_cursor_path")]
    pub cursor: String,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            links: DEFAULT_LINKS_PATH.to_string(),
            cursor: DEFAULT_CURSOR_PATH.to_string(),
        }
    }
}

/// Message shape and send behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Message template. `{link}` and `{time}` are substituted per dispatch.
    #[serde(default = "default_template")]
    pub template: String,
    /// Send deadline in seconds. One attempt per tick, no retry.
    #[serde(default = "default_send_timeout")]
    pub timeout: u64,
    /// Dispatch one link right after startup (default: false).
    /// Override with env var: LINKWHEEL_DELIVERY_IMMEDIATE=true
    #[serde(default)]
    pub immediate: bool,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            template: DEFAULT_TEMPLATE.to_string(),
            timeout: SEND_TIMEOUT_SECS,
            immediate: false,
        }
    }
}

/// Messaging sidecar the transport talks to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Base URL of the sidecar, without trailing slash.
    #[serde(default = "default_bridge_url")]
    pub url: String,
    /// Optional bearer token sent on every sidecar request.
    pub token: Option<String>,
    /// Session probe interval in seconds.
    #[serde(default = "default_probe")]
    pub probe: u64,
    /// When set, the latest pairing QR payload is written here so it can
    /// be rendered out of band.
    pub qr: Option<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_BRIDGE_URL.to_string(),
            token: None,
            probe: PROBE_INTERVAL_SECS,
            qr: None,
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}
fn default_links_path() -> String {
    DEFAULT_LINKS_PATH.to_string()
}
fn default_cursor_path() -> String {
    DEFAULT_CURSOR_PATH.to_string()
}
fn default_template() -> String {
    DEFAULT_TEMPLATE.to_string()
}
fn default_send_timeout() -> u64 {
    SEND_TIMEOUT_SECS
}
fn default_probe() -> u64 {
    PROBE_INTERVAL_SECS
}
fn default_bridge_url() -> String {
    DEFAULT_BRIDGE_URL.to_string()
}

impl LinkwheelConfig {
    /// Load config from a TOML file with LINKWHEEL_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. LINKWHEEL_CONFIG env var
    ///   3. ./linkwheel.toml
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .or_else(|| std::env::var("LINKWHEEL_CONFIG").ok())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

        let config: LinkwheelConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("LINKWHEEL_").split("_"))
            .extract()
            .map_err(|e| crate::error::LinkwheelError::Config(e.to_string()))?;

        Ok(config)
    }
}
