//! InfluxDB client and write-failure behavior tests

use pingflux::influx::InfluxClient;
use pingflux::probe::http::HttpProbe;
use pingflux::{AddressFamily, PingMeasurement};
use wiremock::matchers::{header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;
use tokio_test::assert_ok;

#[tokio::test]
async fn startup_ping_succeeds_against_live_server() {
    let influx = mock_influx().await;
    let config = make_config(&influx.uri(), &[]);

    let client = InfluxClient::new(&config.influxdb).unwrap();
    assert_ok!(client.ping().await);
}

#[tokio::test]
async fn startup_ping_fails_when_unreachable() {
    // nothing listens on the mock server once it is dropped
    let influx = MockServer::start().await;
    let uri = influx.uri();
    drop(influx);

    let config = make_config(&uri, &[]);
    let client = InfluxClient::new(&config.influxdb).unwrap();
    assert!(client.ping().await.is_err());
}

#[tokio::test]
async fn startup_ping_fails_on_error_status() {
    let influx = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ping"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&influx)
        .await;

    let config = make_config(&influx.uri(), &[]);
    let client = InfluxClient::new(&config.influxdb).unwrap();
    assert!(client.ping().await.is_err());
}

#[tokio::test]
async fn ping_measurement_write_renders_tags_and_fields() {
    let influx = mock_influx().await;
    let config = make_config(&influx.uri(), &[]);
    let writer = make_writer(&config);

    writer
        .write_ping(&PingMeasurement {
            host: "10.0.0.1".into(),
            family: AddressFamily::V4,
            sent: 10,
            recv: 9,
            loss: 10,
            latency: Some(pingflux::Latency {
                min: 1.1,
                avg: 1.25,
                max: 1.4,
            }),
            defaulted_fields: 0,
        })
        .await;

    let requests = influx.received_requests().await.unwrap();
    let write = requests.iter().find(|r| r.url.path() == "/write").unwrap();
    let body = String::from_utf8(write.body.clone()).unwrap();

    assert!(body.starts_with("ping,"), "unexpected body: {body}");
    assert!(body.contains("af=ipv4"), "unexpected body: {body}");
    assert!(body.contains("host=10.0.0.1"), "unexpected body: {body}");
    assert!(body.contains("loss=10i"), "unexpected body: {body}");
    assert!(body.contains("avg=1.25"), "unexpected body: {body}");
}

#[tokio::test]
async fn write_failure_does_not_stop_later_rounds() {
    // influxdb that rejects every write
    let influx = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ping"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&influx)
        .await;
    Mock::given(method("POST"))
        .and(path("/write"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&influx)
        .await;

    let target = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&target)
        .await;

    let urls = vec![format!("{}/health", target.uri())];
    let config = make_config(&influx.uri(), &urls);
    let probe = HttpProbe::new(&config.http, make_writer(&config)).unwrap();

    // two rounds; the failed write in the first must not poison the second
    probe.run_round().await;
    probe.run_round().await;

    let writes = influx
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == "/write")
        .count();
    assert_eq!(writes, 2);
}

#[tokio::test]
async fn credentials_are_sent_when_configured() {
    let influx = MockServer::start().await;
    // only authenticated writes match; the expectation is verified when
    // the mock server drops
    Mock::given(method("POST"))
        .and(path("/write"))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&influx)
        .await;

    let parsed = url::Url::parse(&influx.uri()).unwrap();
    let config: pingflux::config::RunConfig = toml::from_str(&format!(
        r#"
        [influxdb]
        host = "{host}"
        port = {port}
        username = "collector"
        password = "hunter2"
        database = "telemetry"
        srchost = "test-collector"
        "#,
        host = parsed.host_str().unwrap(),
        port = parsed.port().unwrap(),
    ))
    .unwrap();

    let writer = make_writer(&config);
    writer
        .write_ping(&PingMeasurement {
            host: "10.0.0.1".into(),
            family: AddressFamily::V4,
            sent: 10,
            recv: 10,
            loss: 0,
            latency: None,
            defaulted_fields: 0,
        })
        .await;

    influx.verify().await;
}
