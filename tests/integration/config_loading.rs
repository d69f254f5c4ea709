//! Config file loading tests

use std::io::Write;

use pingflux::config::read_config_file;
use tempfile::NamedTempFile;

fn write_temp(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn valid_file_loads() {
    let file = write_temp(
        r#"
        [influxdb]
        host = "influx.example.net"
        database = "telemetry"
        srchost = "collector-1"

        [ping]
        ipv4_hosts = ["10.0.0.1"]

        [http]
        urls = ["https://example.net/"]
        "#,
    );

    let config = read_config_file(file.path().to_str().unwrap()).unwrap();
    assert_eq!(config.ping.ipv4_hosts, ["10.0.0.1"]);
    assert_eq!(config.http.urls, ["https://example.net/"]);
}

#[test]
fn missing_file_fails() {
    let err = read_config_file("/nonexistent/pingflux.toml").unwrap_err();
    assert!(err.to_string().contains("/nonexistent/pingflux.toml"));
}

#[test]
fn unparseable_file_fails() {
    let file = write_temp("this is not toml = = =");
    assert!(read_config_file(file.path().to_str().unwrap()).is_err());
}

#[test]
fn file_with_nothing_to_probe_fails_validation() {
    let file = write_temp(
        r#"
        [influxdb]
        host = "localhost"
        database = "db"
        srchost = "me"
        "#,
    );
    assert!(read_config_file(file.path().to_str().unwrap()).is_err());
}
