//! Driver for the external fping measurement process.
//!
//! One driver instance owns one pinger process for one address family.
//! The process probes every target once a second and reports per-target
//! loss summaries on stderr every ten seconds; those lines go through the
//! parser and out as points. The process is expected to run forever, so
//! returning from [`PingProbe::run`] always means it died and the owning
//! supervisor should relaunch it.

use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::AddressFamily;
use crate::config::SourceAddr;
use crate::parser::LineGrammar;
use crate::point::PointWriter;

const PINGER_V4: &str = "/usr/bin/fping";
const PINGER_V6: &str = "/usr/bin/fping6";

/// Fixed measurement flags: backoff factor 1, timestamps, no retries,
/// 10s loss reporting cycle, 1s per-target period, loop forever.
const BASE_ARGS: [&str; 10] = ["-B", "1", "-D", "-r", "0", "-Q", "10", "-p", "1000", "-l"];

#[derive(Clone)]
pub struct PingProbe {
    family: AddressFamily,
    hosts: Vec<String>,
    source: Option<SourceAddr>,
    writer: PointWriter,
}

impl PingProbe {
    pub fn new(
        family: AddressFamily,
        hosts: Vec<String>,
        source: Option<SourceAddr>,
        writer: PointWriter,
    ) -> Self {
        Self {
            family,
            hosts,
            source,
            writer,
        }
    }

    fn pinger(&self) -> &'static str {
        match self.family {
            AddressFamily::V4 => PINGER_V4,
            AddressFamily::V6 => PINGER_V6,
        }
    }

    /// Build the pinger argument list.
    ///
    /// The source address is resolved on every call, so a relaunch picks
    /// up an interface address change; an unresolvable source fails the
    /// whole process start.
    pub fn build_args(&self) -> Result<Vec<String>> {
        let mut args: Vec<String> = BASE_ARGS.iter().map(|s| s.to_string()).collect();

        if let AddressFamily::V4 = self.family {
            // explicit type of service
            args.push("-O".into());
            args.push("0".into());
        }

        if let Some(source) = &self.source {
            let addr = source.resolve(self.family).with_context(|| {
                format!("cannot resolve source address for the {} pinger", self.family)
            })?;
            args.push("-S".into());
            args.push(addr.to_string());
        }

        args.extend(self.hosts.iter().cloned());
        Ok(args)
    }

    /// Run one pinger process to completion.
    ///
    /// Diagnostic lines arrive on stderr by convention of the wrapped
    /// tool; stdout stays quiet until exit, when any trailing summary is
    /// logged and discarded.
    pub async fn run(&self) -> Result<()> {
        let args = self.build_args()?;
        info!(
            "starting {} for {} {} hosts",
            self.pinger(),
            self.hosts.len(),
            self.family
        );

        let mut child = Command::new(self.pinger())
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to spawn {}", self.pinger()))?;

        let stderr = child.stderr.take().context("pinger has no stderr handle")?;
        let grammar = LineGrammar::for_family(self.family);

        let mut lines = BufReader::new(stderr).lines();
        while let Some(line) = lines.next_line().await.context("reading pinger output")? {
            match grammar.parse(&line) {
                Some(measurement) => {
                    debug!(
                        host = %measurement.host,
                        loss = measurement.loss,
                        defaulted = measurement.defaulted_fields,
                        "parsed ping summary"
                    );
                    self.writer.write_ping(&measurement).await;
                }
                None => debug!(%line, "skipped pinger line"),
            }
        }

        // stderr closed, the process is going away
        let mut summary = String::new();
        if let Some(mut stdout) = child.stdout.take() {
            let _ = stdout.read_to_string(&mut summary).await;
        }
        let status = child.wait().await.context("waiting for pinger exit")?;
        if !summary.trim().is_empty() {
            info!("pinger stdout: {}", summary.trim());
        }
        warn!("{} exited with {status}", self.pinger());
        Ok(())
    }
}
