//! Minimal InfluxDB v1 client: line protocol over HTTP.
//!
//! Points are rendered to the v1 line protocol and POSTed to `/write`
//! with second-precision timestamps under the `autogen` retention policy.
//! `/ping` is used once at startup to fail fast when the database is
//! unreachable.

use std::time::Duration;

use anyhow::{Context, bail};
use reqwest::Client;
use tracing::debug;

use crate::config::InfluxConfig;
use crate::point::{FieldValue, Point};

const RETENTION_POLICY: &str = "autogen";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct InfluxClient {
    write_url: String,
    ping_url: String,
    credentials: Option<(String, String)>,
    http: Client,
}

impl InfluxClient {
    pub fn new(config: &InfluxConfig) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build influxdb http client")?;

        let base = config.url();
        let credentials = match (&config.username, &config.password) {
            (Some(user), Some(pass)) => Some((user.clone(), pass.clone())),
            _ => None,
        };

        Ok(Self {
            write_url: format!("{base}/write"),
            ping_url: format!("{base}/ping"),
            credentials,
            http,
        })
    }

    /// Startup health check; logs the server version when reported.
    pub async fn ping(&self) -> anyhow::Result<()> {
        let response = self
            .http
            .get(&self.ping_url)
            .send()
            .await
            .context("influxdb is unreachable")?;

        if !response.status().is_success() {
            bail!("influxdb ping returned {}", response.status());
        }

        if let Some(version) = response
            .headers()
            .get("X-Influxdb-Version")
            .and_then(|v| v.to_str().ok())
        {
            debug!("connected to influxdb {version}");
        }
        Ok(())
    }

    /// Submit a batch of points to the named database.
    pub async fn write(&self, database: &str, points: &[Point]) -> anyhow::Result<()> {
        if points.is_empty() {
            return Ok(());
        }

        let body = points
            .iter()
            .map(line_protocol)
            .collect::<Vec<_>>()
            .join("\n");

        let mut request = self
            .http
            .post(&self.write_url)
            .query(&[
                ("db", database),
                ("rp", RETENTION_POLICY),
                ("precision", "s"),
            ])
            .body(body);

        if let Some((user, pass)) = &self.credentials {
            request = request.basic_auth(user, Some(pass));
        }

        let response = request
            .send()
            .await
            .context("influxdb write request failed")?;

        if !response.status().is_success() {
            bail!("influxdb write returned {}", response.status());
        }
        Ok(())
    }
}

/// Render one point as a v1 line-protocol line with a seconds timestamp.
pub fn line_protocol(point: &Point) -> String {
    let mut line = escape_measurement(&point.measurement);

    for (key, value) in &point.tags {
        line.push(',');
        line.push_str(&escape_tag(key));
        line.push('=');
        line.push_str(&escape_tag(value));
    }

    line.push(' ');
    let mut first = true;
    for (key, value) in &point.fields {
        if !first {
            line.push(',');
        }
        first = false;
        line.push_str(&escape_tag(key));
        line.push('=');
        match value {
            FieldValue::Integer(v) => {
                line.push_str(&v.to_string());
                line.push('i');
            }
            FieldValue::Float(v) => line.push_str(&v.to_string()),
        }
    }

    line.push(' ');
    line.push_str(&point.timestamp.timestamp().to_string());
    line
}

fn escape_measurement(raw: &str) -> String {
    raw.replace(',', "\\,").replace(' ', "\\ ")
}

fn escape_tag(raw: &str) -> String {
    raw.replace(',', "\\,").replace('=', "\\=").replace(' ', "\\ ")
}
