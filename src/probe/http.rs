//! HTTP endpoint prober.
//!
//! Every round, one GET is dispatched per configured url. Urls prefixed
//! `ipv4:`/`ipv6:` go through a client bound to the configured local
//! source address for that family; the prefix is stripped for the request
//! but stays part of the url tag. Rounds never wait for each other: the
//! timer dispatches, a drain task collects the outcomes.

use std::net::IpAddr;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::Client;
use tokio::task::JoinSet;
use tokio::time::interval;
use tracing::{debug, warn};

use crate::config::HttpConfig;
use crate::point::PointWriter;
use crate::{AddressFamily, HttpMeasurement};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// The three clients a round can route through, built once at startup.
#[derive(Clone)]
struct ProbeClients {
    unbound: Client,
    v4: Client,
    v6: Client,
}

impl ProbeClients {
    /// Building a bound client resolves the configured source address up
    /// front; an unresolvable `if:` source is a startup failure, since
    /// probing must not silently run unbound when the config asked for a
    /// bound socket.
    fn from_config(config: &HttpConfig) -> Result<Self> {
        Ok(Self {
            unbound: build_client(None)?,
            v4: build_client(resolve_source(config, AddressFamily::V4)?)?,
            v6: build_client(resolve_source(config, AddressFamily::V6)?)?,
        })
    }
}

fn resolve_source(config: &HttpConfig, family: AddressFamily) -> Result<Option<IpAddr>> {
    match config.srcaddr(family) {
        Some(source) => {
            let addr = source
                .resolve(family)
                .with_context(|| format!("cannot resolve {family} http source address"))?;
            Ok(Some(addr))
        }
        None => Ok(None),
    }
}

fn build_client(local_addr: Option<IpAddr>) -> Result<Client> {
    let mut builder = Client::builder().timeout(REQUEST_TIMEOUT);
    if let Some(addr) = local_addr {
        builder = builder.local_address(addr);
    }
    builder.build().context("failed to build http probe client")
}

pub struct HttpProbe {
    urls: Vec<String>,
    clients: ProbeClients,
    writer: PointWriter,
    round_interval: Duration,
}

impl HttpProbe {
    pub fn new(config: &HttpConfig, writer: PointWriter) -> Result<Self> {
        Ok(Self {
            urls: config.urls.clone(),
            clients: ProbeClients::from_config(config)?,
            writer,
            round_interval: config.round_interval(),
        })
    }

    /// Pick the client for a url and strip its family prefix.
    fn route<'a>(&self, url: &'a str) -> (&Client, &'a str) {
        if let Some(rest) = url.strip_prefix("ipv4:") {
            (&self.clients.v4, rest)
        } else if let Some(rest) = url.strip_prefix("ipv6:") {
            (&self.clients.v6, rest)
        } else {
            (&self.clients.unbound, url)
        }
    }

    /// Dispatch probe rounds forever. The ticker never waits on a round's
    /// requests, so slow endpoints from one round overlap the next.
    pub async fn run(self) {
        debug!(
            "probing {} urls every {:?}",
            self.urls.len(),
            self.round_interval
        );
        let mut ticker = interval(self.round_interval);
        loop {
            ticker.tick().await;
            let requests = self.spawn_requests();
            tokio::spawn(drain_round(requests, self.writer.clone()));
        }
    }

    /// Dispatch one round and wait for every outcome to be drained.
    /// Normal operation overlaps rounds via [`HttpProbe::run`]; tests and
    /// one-shot probing want the round joined.
    pub async fn run_round(&self) {
        drain_round(self.spawn_requests(), self.writer.clone()).await;
    }

    fn spawn_requests(&self) -> JoinSet<Result<HttpMeasurement>> {
        let mut requests = JoinSet::new();
        for url in &self.urls {
            let (client, target) = self.route(url);
            requests.spawn(probe_url(client.clone(), url.clone(), target.to_string()));
        }
        requests
    }
}

async fn probe_url(client: Client, url: String, target: String) -> Result<HttpMeasurement> {
    let start = Instant::now();

    let response = client
        .get(&target)
        .send()
        .await
        .with_context(|| format!("request to {url} failed"))?;
    let status = response.status().as_u16();
    let body = response
        .bytes()
        .await
        .with_context(|| format!("reading body from {url} failed"))?;

    Ok(HttpMeasurement {
        url,
        status,
        bytes: body.len() as u64,
        elapsed: start.elapsed().as_secs_f64(),
    })
}

/// Collect one round's outcomes. A failed probe is logged and costs
/// nothing but its own point; the rest of the round goes on.
async fn drain_round(mut requests: JoinSet<Result<HttpMeasurement>>, writer: PointWriter) {
    let (mut written, mut failed) = (0u32, 0u32);
    while let Some(joined) = requests.join_next().await {
        match joined {
            Ok(Ok(measurement)) => {
                debug!(
                    url = %measurement.url,
                    status = measurement.status,
                    bytes = measurement.bytes,
                    elapsed = measurement.elapsed,
                    "http probe complete"
                );
                writer.write_http(&measurement).await;
                written += 1;
            }
            Ok(Err(e)) => {
                warn!("http probe failed: {e:#}");
                failed += 1;
            }
            Err(e) => {
                warn!("http probe task died: {e}");
                failed += 1;
            }
        }
    }
    debug!(written, failed, "http round drained");
}
