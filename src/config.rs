use std::net::IpAddr;
use std::time::Duration;

use anyhow::Context;
use tracing::trace;

use crate::AddressFamily;

/// Where a probe binds its local source address.
///
/// Config values are either an IP literal or `if:<interface>`; the latter
/// is resolved against the named interface when the client or pinger
/// process is built.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(try_from = "String")]
pub enum SourceAddr {
    Literal(IpAddr),
    Interface(String),
}

impl TryFrom<String> for SourceAddr {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        if let Some(name) = raw.strip_prefix("if:") {
            if name.is_empty() {
                return Err("empty interface name in source address".into());
            }
            return Ok(SourceAddr::Interface(name.to_string()));
        }
        raw.parse::<IpAddr>()
            .map(SourceAddr::Literal)
            .map_err(|_| format!("source address must be an IP literal or if:<interface>, got {raw:?}"))
    }
}

impl SourceAddr {
    /// Resolve to a concrete address, looking the interface up if needed.
    pub fn resolve(&self, family: AddressFamily) -> anyhow::Result<IpAddr> {
        match self {
            SourceAddr::Literal(addr) => Ok(*addr),
            SourceAddr::Interface(name) => crate::iface::lookup_addr(name, family),
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct RunConfig {
    pub influxdb: InfluxConfig,

    #[serde(default)]
    pub ping: PingConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub core: CoreConfig,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct InfluxConfig {
    pub host: String,

    #[serde(default = "default_influx_port")]
    pub port: u16,

    pub username: Option<String>,
    pub password: Option<String>,

    pub database: String,

    /// Identity tag stamped on every point written by this collector.
    pub srchost: String,
}

impl InfluxConfig {
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct PingConfig {
    #[serde(default = "default_ping_measurement")]
    pub measurement: String,

    #[serde(default)]
    pub ipv4_hosts: Vec<String>,

    #[serde(default)]
    pub ipv6_hosts: Vec<String>,

    pub ipv4_srcaddr: Option<SourceAddr>,
    pub ipv6_srcaddr: Option<SourceAddr>,

    /// Seconds to wait before relaunching a dead pinger process.
    #[serde(default = "default_restart_delay")]
    pub restart_delay: u64,
}

impl Default for PingConfig {
    fn default() -> Self {
        Self {
            measurement: default_ping_measurement(),
            ipv4_hosts: Vec::new(),
            ipv6_hosts: Vec::new(),
            ipv4_srcaddr: None,
            ipv6_srcaddr: None,
            restart_delay: default_restart_delay(),
        }
    }
}

impl PingConfig {
    pub fn hosts(&self, family: AddressFamily) -> &[String] {
        match family {
            AddressFamily::V4 => &self.ipv4_hosts,
            AddressFamily::V6 => &self.ipv6_hosts,
        }
    }

    pub fn srcaddr(&self, family: AddressFamily) -> Option<&SourceAddr> {
        match family {
            AddressFamily::V4 => self.ipv4_srcaddr.as_ref(),
            AddressFamily::V6 => self.ipv6_srcaddr.as_ref(),
        }
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_secs(self.restart_delay)
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_measurement")]
    pub measurement: String,

    /// Urls to probe; `ipv4:`/`ipv6:` prefixes select a family-bound client.
    #[serde(default)]
    pub urls: Vec<String>,

    pub ipv4_srcaddr: Option<SourceAddr>,
    pub ipv6_srcaddr: Option<SourceAddr>,

    /// Seconds between probe rounds.
    #[serde(default = "default_http_interval")]
    pub interval: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            measurement: default_http_measurement(),
            urls: Vec::new(),
            ipv4_srcaddr: None,
            ipv6_srcaddr: None,
            interval: default_http_interval(),
        }
    }
}

impl HttpConfig {
    pub fn srcaddr(&self, family: AddressFamily) -> Option<&SourceAddr> {
        match family {
            AddressFamily::V4 => self.ipv4_srcaddr.as_ref(),
            AddressFamily::V6 => self.ipv6_srcaddr.as_ref(),
        }
    }

    pub fn round_interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct CoreConfig {
    #[serde(default)]
    pub verbose: bool,

    #[serde(default)]
    pub debug: bool,
}

fn default_influx_port() -> u16 {
    8086
}

fn default_ping_measurement() -> String {
    String::from("ping")
}

fn default_http_measurement() -> String {
    String::from("http")
}

fn default_restart_delay() -> u64 {
    30
}

fn default_http_interval() -> u64 {
    30
}

impl RunConfig {
    /// Reject configurations that cannot produce a working collector.
    /// Anything caught here would otherwise only surface mid-probe.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.ping.ipv4_hosts.is_empty()
            && self.ping.ipv6_hosts.is_empty()
            && self.http.urls.is_empty()
        {
            anyhow::bail!("configuration has no ping hosts and no http urls, nothing to probe");
        }

        for (key, addr, family) in [
            ("ping.ipv4_srcaddr", &self.ping.ipv4_srcaddr, AddressFamily::V4),
            ("ping.ipv6_srcaddr", &self.ping.ipv6_srcaddr, AddressFamily::V6),
            ("http.ipv4_srcaddr", &self.http.ipv4_srcaddr, AddressFamily::V4),
            ("http.ipv6_srcaddr", &self.http.ipv6_srcaddr, AddressFamily::V6),
        ] {
            if let Some(SourceAddr::Literal(ip)) = addr {
                let matches = match family {
                    AddressFamily::V4 => ip.is_ipv4(),
                    AddressFamily::V6 => ip.is_ipv6(),
                };
                if !matches {
                    anyhow::bail!("{key}: {ip} is not an {family} address");
                }
            }
        }

        Ok(())
    }
}

pub fn read_config_file(path: &str) -> anyhow::Result<RunConfig> {
    let file_content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {path}"))?;
    let config: RunConfig =
        toml::from_str(&file_content).context("invalid configuration file")?;
    config.validate()?;
    trace!("loaded config: {config:?}");
    Ok(config)
}
