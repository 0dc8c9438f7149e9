use clap::Parser;
use std::time::Duration;

use volley_client::cli::CliArgs;
use volley_common::LogFormat;

#[test]
fn no_arguments_gives_defaults() {
    let settings = CliArgs::try_parse_from(["volley"]).unwrap().resolve().unwrap();
    assert_eq!(settings.host, "127.0.0.1");
    assert_eq!(settings.port, 4063);
    assert_eq!(settings.waves, 5);
    assert!(settings.logging_enabled);
    assert!(!settings.metrics_enabled);
}

#[test]
fn short_flags_override_defaults() {
    let args = CliArgs::try_parse_from([
        "volley", "-H", "example.test", "-p", "8080", "-e", "/bid", "-r", "bid.json", "-T", "3", "-c",
        "10", "-t", "4", "-l", "false", "-d", "0", "-v", "50",
    ])
    .unwrap();
    let settings = args.resolve().unwrap();

    assert_eq!(settings.host, "example.test");
    assert_eq!(settings.port, 8080);
    assert_eq!(settings.endpoint, "/bid");
    assert_eq!(settings.request_file.to_str(), Some("bid.json"));
    assert_eq!(settings.response_timeout, Duration::from_secs(3));
    assert_eq!(settings.connections, 10);
    assert_eq!(settings.threads, 4);
    assert!(!settings.logging_enabled);
    assert_eq!(settings.delay, Duration::ZERO);
    assert_eq!(settings.waves, 50);
}

#[test]
fn logging_flag_accepts_numeric_booleans() {
    let settings = CliArgs::try_parse_from(["volley", "--logging", "0"])
        .unwrap()
        .resolve()
        .unwrap();
    assert!(!settings.logging_enabled);
}

#[test]
fn cli_wins_over_config_file() {
    let path = std::env::temp_dir().join(format!("volley-cli-{}.yaml", std::process::id()));
    std::fs::write(
        &path,
        "target:\n  host: from-file\n  port: 9000\nload:\n  connections: 7\nlogging:\n  format: json\n",
    )
    .unwrap();

    let settings = CliArgs::try_parse_from([
        "volley",
        "--config",
        path.to_str().unwrap(),
        "--port",
        "9001",
        "--metrics-port",
        "9999",
    ])
    .unwrap()
    .resolve();
    std::fs::remove_file(&path).ok();
    let settings = settings.unwrap();

    assert_eq!(settings.host, "from-file");
    assert_eq!(settings.port, 9001);
    assert_eq!(settings.connections, 7);
    assert_eq!(settings.log_format, LogFormat::Json);
    assert!(settings.metrics_enabled);
    assert_eq!(settings.metrics_port, 9999);
}

#[test]
fn zero_threads_is_rejected() {
    let result = CliArgs::try_parse_from(["volley", "--threads", "0"]).unwrap().resolve();
    assert!(result.is_err());
}
