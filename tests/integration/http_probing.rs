//! HTTP probe round tests against mock endpoints

use pingflux::probe::http::HttpProbe;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

#[tokio::test]
async fn round_writes_one_point_per_successful_url() {
    let influx = mock_influx().await;

    let target = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "ok"})),
        )
        .mount(&target)
        .await;

    let urls = vec![
        format!("{}/health", target.uri()),
        format!("ipv4:{}/health", target.uri()),
    ];
    let config = make_config(&influx.uri(), &urls);
    let probe = HttpProbe::new(&config.http, make_writer(&config)).unwrap();

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
async fn failing_url_is_skipped_and_round_continues() {
    let influx = mock_influx().await;

    let target = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&target)
        .await;

    // port 9 is discard; connection refused on any sane test machine
    let urls = vec![
        String::from("ipv4:http://127.0.0.1:9/unreachable"),
        format!("{}/health", target.uri()),
    ];
    let config = make_config(&influx.uri(), &urls);
    let probe = HttpProbe::new(&config.http, make_writer(&config)).unwrap();

    probe.run_round().await;

    // only the reachable url produced a point
    let writes = influx
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == "/write")
        .count();
    assert_eq!(writes, 1);
}

#[tokio::test]
async fn written_point_carries_url_tag_and_status_field() {
    let influx = mock_influx().await;

    let target = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/payload"))
        .respond_with(ResponseTemplate::new(200).set_body_string("abcdefgh"))
        .mount(&target)
        .await;

    let urls = vec![format!("{}/payload", target.uri())];
    let config = make_config(&influx.uri(), &urls);
    let probe = HttpProbe::new(&config.http, make_writer(&config)).unwrap();

    probe.run_round().await;

    let requests = influx.received_requests().await.unwrap();
    let write = requests
        .iter()
        .find(|r| r.url.path() == "/write")
        .expect("one write expected");

    let body = String::from_utf8(write.body.clone()).unwrap();
    assert!(body.starts_with("http,"), "unexpected body: {body}");
    assert!(body.contains("srchost=test-collector"), "unexpected body: {body}");
    assert!(body.contains("code=200i"), "unexpected body: {body}");
    assert!(body.contains("bytes=8i"), "unexpected body: {body}");
    assert!(body.contains("elapsed="), "unexpected body: {body}");

    let query: Vec<(String, String)> = write
        .url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    assert!(query.contains(&("db".into(), "telemetry".into())));
    assert!(query.contains(&("rp".into(), "autogen".into())));
    assert!(query.contains(&("precision".into(), "s".into())));
}

#[tokio::test]
async fn redirected_probe_reports_final_status() {
    let influx = mock_influx().await;

    let target = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/moved"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("Location", format!("{}/new", target.uri())),
        )
        .mount(&target)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(ResponseTemplate::new(200).set_body_string("landed"))
        .mount(&target)
        .await;

    let urls = vec![format!("{}/moved", target.uri())];
    let config = make_config(&influx.uri(), &urls);
    let probe = HttpProbe::new(&config.http, make_writer(&config)).unwrap();

    probe.run_round().await;

    let requests = influx.received_requests().await.unwrap();
    let write = requests.iter().find(|r| r.url.path() == "/write").unwrap();
    let body = String::from_utf8(write.body.clone()).unwrap();
    assert!(body.contains("code=200i"), "unexpected body: {body}");
    assert!(body.contains("bytes=6i"), "unexpected body: {body}");
}
