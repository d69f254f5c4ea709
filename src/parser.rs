//! Parsing of the pinger's per-target summary lines.
//!
//! With `-Q`, fping prints one summary line per target on stderr every
//! reporting cycle:
//!
//! ```text
//! 10.0.0.1 : xmt/rcv/%loss = 10/10/0%, min/avg/max = 1.10/1.25/1.40
//! ```
//!
//! The latency triple is only present when at least one packet came back.
//! Interspersed timestamp markers, banners and partial lines must be
//! skipped without ever failing the read loop, so everything here returns
//! `Option` and a line that does not match is simply no measurement.

use tracing::debug;

use crate::{AddressFamily, Latency, PingMeasurement};

/// Whitespace-field index of the `sent/recv/loss` counter triple.
const COUNTERS_FIELD: usize = 4;

/// Whitespace-field index of the `min/avg/max` latency triple.
const LATENCY_FIELD: usize = 7;

/// Line shape variant, selected by the address family of the pinger that
/// produced the output.
///
/// fping6 output carries a leading `:` separator token in field 1; lines
/// missing it (startup banners, resolver noise) are rejected outright. The
/// IPv4 pinger emits no such token, so its grammar skips the check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineGrammar {
    V4,
    V6,
}

impl LineGrammar {
    pub fn for_family(family: AddressFamily) -> Self {
        match family {
            AddressFamily::V4 => LineGrammar::V4,
            AddressFamily::V6 => LineGrammar::V6,
        }
    }

    pub fn family(&self) -> AddressFamily {
        match self {
            LineGrammar::V4 => AddressFamily::V4,
            LineGrammar::V6 => AddressFamily::V6,
        }
    }

    /// Parse one diagnostic line into a measurement, or skip it.
    ///
    /// Skips are expected in normal operation (timestamp lines, banners);
    /// they are not errors. Non-numeric counter or latency sub-fields
    /// degrade to zero and are counted in `defaulted_fields` so the
    /// fallback stays observable.
    pub fn parse(&self, line: &str) -> Option<PingMeasurement> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 4 {
            return None;
        }
        if let LineGrammar::V6 = self {
            if fields[1] != ":" {
                return None;
            }
        }

        let host = fields[0];
        let counters: Vec<&str> = fields.get(COUNTERS_FIELD)?.split('/').collect();
        if counters.len() < 3 {
            return None;
        }

        let mut defaulted = 0u8;
        let sent = lenient_u64(counters[0], &mut defaulted);
        let recv = lenient_u64(counters[1], &mut defaulted);
        let loss_raw = counters[2].trim_end_matches(['%', ',']);
        let loss = lenient_u64(loss_raw, &mut defaulted).min(100) as u8;

        let latency = if fields.len() > 5 {
            parse_latency(fields.get(LATENCY_FIELD).copied(), &mut defaulted)
        } else {
            None
        };

        if defaulted > 0 {
            debug!(host, defaulted, "defaulted non-numeric sub-fields to zero");
        }

        Some(PingMeasurement {
            host: host.to_string(),
            family: self.family(),
            sent,
            recv,
            loss,
            latency,
            defaulted_fields: defaulted,
        })
    }
}

/// The `min/avg/max` triple, parsed optimistically: a missing or misshapen
/// field degrades to "no latency data" rather than rejecting the line.
fn parse_latency(field: Option<&str>, defaulted: &mut u8) -> Option<Latency> {
    let parts: Vec<&str> = field?.split('/').collect();
    if parts.len() < 3 {
        return None;
    }
    Some(Latency {
        min: lenient_f64(parts[0], defaulted),
        avg: lenient_f64(parts[1], defaulted),
        max: lenient_f64(parts[2], defaulted),
    })
}

fn lenient_u64(raw: &str, defaulted: &mut u8) -> u64 {
    raw.parse().unwrap_or_else(|_| {
        *defaulted += 1;
        0
    })
}

fn lenient_f64(raw: &str, defaulted: &mut u8) -> f64 {
    raw.parse().unwrap_or_else(|_| {
        *defaulted += 1;
        0.0
    })
}
