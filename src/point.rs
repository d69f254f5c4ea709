//! Conversion of measurements into database points.
//!
//! A [`Point`] is write-once: it is built from a measurement, submitted as
//! a single-point batch, and dropped. The timestamp is taken from the
//! collector's clock at write time, not from probe start.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::config::RunConfig;
use crate::influx::InfluxClient;
use crate::{HttpMeasurement, PingMeasurement};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, FieldValue>,
    pub timestamp: DateTime<Utc>,
}

/// Turns measurements into tagged points and submits them best-effort.
///
/// A failed write is logged and dropped; probing never stops or retries
/// because the database had a bad moment.
#[derive(Clone)]
pub struct PointWriter {
    client: InfluxClient,
    database: String,
    srchost: String,
    ping_measurement: String,
    http_measurement: String,
}

impl PointWriter {
    pub fn new(client: InfluxClient, config: &RunConfig) -> Self {
        Self {
            client,
            database: config.influxdb.database.clone(),
            srchost: config.influxdb.srchost.clone(),
            ping_measurement: config.ping.measurement.clone(),
            http_measurement: config.http.measurement.clone(),
        }
    }

    pub fn ping_point(&self, m: &PingMeasurement) -> Point {
        let mut tags = BTreeMap::new();
        tags.insert("host".into(), m.host.clone());
        tags.insert("srchost".into(), self.srchost.clone());
        tags.insert("af".into(), m.family.tag().into());

        let mut fields = BTreeMap::new();
        fields.insert("sent".into(), FieldValue::Integer(m.sent as i64));
        fields.insert("recv".into(), FieldValue::Integer(m.recv as i64));
        fields.insert("loss".into(), FieldValue::Integer(m.loss as i64));
        if let Some(latency) = m.latency {
            fields.insert("min".into(), FieldValue::Float(latency.min));
            fields.insert("avg".into(), FieldValue::Float(latency.avg));
            fields.insert("max".into(), FieldValue::Float(latency.max));
        }

        Point {
            measurement: self.ping_measurement.clone(),
            tags,
            fields,
            timestamp: Utc::now(),
        }
    }

    pub fn http_point(&self, m: &HttpMeasurement) -> Point {
        let mut tags = BTreeMap::new();
        tags.insert("url".into(), m.url.clone());
        tags.insert("srchost".into(), self.srchost.clone());

        let mut fields = BTreeMap::new();
        fields.insert("code".into(), FieldValue::Integer(m.status as i64));
        fields.insert("bytes".into(), FieldValue::Integer(m.bytes as i64));
        fields.insert("elapsed".into(), FieldValue::Float(m.elapsed));

        Point {
            measurement: self.http_measurement.clone(),
            tags,
            fields,
            timestamp: Utc::now(),
        }
    }

    pub async fn write_ping(&self, m: &PingMeasurement) {
        self.submit(self.ping_point(m)).await;
    }

    pub async fn write_http(&self, m: &HttpMeasurement) {
        self.submit(self.http_point(m)).await;
    }

    async fn submit(&self, point: Point) {
        let measurement = point.measurement.clone();
        if let Err(e) = self
            .client
            .write(&self.database, std::slice::from_ref(&point))
            .await
        {
            warn!("dropping {measurement} point: {e:#}");
        }
    }
}
