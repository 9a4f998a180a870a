use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct TraceSettings {
    #[serde(default = "default_pipe")]
    pub pipe: PathBuf,
    #[serde(default = "default_idle_poll_ms")]
    pub idle_poll_ms: u64,
}

pub fn default_pipe() -> PathBuf {
    PathBuf::from("/tmp/netcovmap")
}

fn default_idle_poll_ms() -> u64 {
    50
}

impl TraceSettings {
    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }
}

impl Default for TraceSettings {
    fn default() -> Self {
        Self {
            pipe: default_pipe(),
            idle_poll_ms: default_idle_poll_ms(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct ForwardSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5678
}

fn default_connect_timeout_ms() -> u64 {
    5000
}

impl ForwardSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ForwardSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum MutatorKind {
    #[default]
    XorByte,
    AddByte,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct FuzzerSettings {
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default = "default_target")]
    pub target: String,
    #[serde(default = "default_seed_len")]
    pub seed_len: usize,
    #[serde(default = "default_seed_byte")]
    pub seed_byte: u8,
    #[serde(default = "default_target_timeout_ms")]
    pub target_timeout_ms: u64,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default)]
    pub max_iterations: Option<u64>,
    #[serde(default)]
    pub rng_seed: u64,
    #[serde(default)]
    pub mutator: MutatorKind,
}

fn default_listen() -> String {
    "127.0.0.1:5678".to_string()
}

fn default_target() -> String {
    "127.0.0.1:1234".to_string()
}

fn default_seed_len() -> usize {
    20
}

fn default_seed_byte() -> u8 {
    b'Z'
}

fn default_target_timeout_ms() -> u64 {
    4000
}

fn default_retry_delay_ms() -> u64 {
    3000
}

impl FuzzerSettings {
    pub fn seed_input(&self) -> Vec<u8> {
        vec![self.seed_byte; self.seed_len]
    }
}

impl Default for FuzzerSettings {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            target: default_target(),
            seed_len: default_seed_len(),
            seed_byte: default_seed_byte(),
            target_timeout_ms: default_target_timeout_ms(),
            retry_delay_ms: default_retry_delay_ms(),
            max_iterations: None,
            rng_seed: 0,
            mutator: MutatorKind::default(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct NetcovConfig {
    #[serde(default)]
    pub trace: TraceSettings,
    #[serde(default)]
    pub forward: ForwardSettings,
    #[serde(default)]
    pub fuzzer: FuzzerSettings,
}

impl NetcovConfig {
    pub fn load_from_file(path: &Path) -> Result<Self, anyhow::Error> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file at {:?}: {}", path, e))?;

        let config: NetcovConfig = toml::from_str(&content).map_err(|e| {
            anyhow::anyhow!("Failed to parse TOML from config file {:?}: {}", path, e)
        })?;

        Ok(config)
    }
}

/// Splits a `host:port` target at its last `:`, so bracket-less IPv6 hosts keep their colons.
pub fn parse_host_port(target: &str) -> Result<(String, u16), String> {
    let (host, port) = target
        .rsplit_once(':')
        .ok_or_else(|| format!("expected host:port, got {target:?}"))?;
    if host.is_empty() {
        return Err(format!("missing host in {target:?}"));
    }
    let port = port
        .parse::<u16>()
        .map_err(|e| format!("invalid port {port:?}: {e}"))?;
    Ok((host.to_string(), port))
}
