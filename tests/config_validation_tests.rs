//! Config loading and validation against real files on disk.

use std::io::Write;
use std::path::PathBuf;

use sentryd::config::validation::{known_config_keys, suggest_correction, validate_unknown_keys};
use sentryd::config::{CheckSpec, ConfigError, DaemonConfig};

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    f.write_all(contents.as_bytes()).unwrap();
    f
}

#[test]
fn full_config_round_trips_every_check_variant() {
    let f = write_config(
        r#"
check_interval_secs = 15
restart_limit = 5
restart_window_secs = 600
alert_cooldown_secs = 120
check_timeout_secs = 3
webhook_url = "https://hooks.example.com/sentryd"
state_file = "/var/lib/sentryd/state.json"
pid_file = "/run/sentryd.pid"

[[service]]
name = "nginx"
check = "process"
process = "nginx"
restart_cmd = "systemctl restart nginx"

[[service]]
name = "postgres"
check = "port"
host = "127.0.0.1"
port = 5432

[[service]]
name = "api"
check = "http"
url = "http://localhost:9000/health"
expect_status = 204
restart_cmd = "systemctl restart api"

[[service]]
name = "disk"
check = "custom"
command = "df -h / | awk 'NR==2 {exit ($5+0 > 90)}'"
"#,
    );

    let config = DaemonConfig::load_from_file(f.path()).unwrap();
    assert_eq!(config.check_interval_secs, 15);
    assert_eq!(config.restart_limit, 5);
    assert_eq!(config.webhook_url.as_deref(), Some("https://hooks.example.com/sentryd"));
    assert_eq!(config.state_file, PathBuf::from("/var/lib/sentryd/state.json"));
    assert_eq!(config.services.len(), 4);

    assert_eq!(config.services[0].check.kind(), "process");
    assert_eq!(
        config.services[1].check,
        CheckSpec::Port {
            host: "127.0.0.1".to_string(),
            port: 5432
        }
    );
    assert_eq!(
        config.services[2].check,
        CheckSpec::Http {
            url: "http://localhost:9000/health".to_string(),
            expect_status: 204
        }
    );
    assert_eq!(config.services[3].check.kind(), "custom");
    assert!(config.services[1].restart_cmd.is_none());
}

#[test]
fn missing_file_is_io_error() {
    let err = DaemonConfig::load_from_file(std::path::Path::new(
        "/nonexistent/sentryd.toml",
    ))
    .unwrap_err();
    assert!(matches!(err, ConfigError::Io(_, _)));
}

#[test]
fn broken_toml_is_parse_error() {
    let f = write_config("[[service]\nname = ");
    let err = DaemonConfig::load_from_file(f.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_, _)));
}

#[test]
fn invalid_error_lists_each_problem_on_its_own_line() {
    let f = write_config(
        r#"
restart_limit = 0

[[service]]
name = "web"
check = "http"
"#,
    );
    let err = DaemonConfig::load_from_file(f.path()).unwrap_err();
    let rendered = err.to_string();
    assert!(rendered.contains("2 problems"), "{rendered}");
    assert!(rendered.contains("restart_limit"));
    assert!(rendered.contains("'url'"));
}

#[test]
fn unknown_keys_warn_with_suggestions() {
    let warnings = validate_unknown_keys(
        r#"
check_intervall_secs = 30
restart_limit = 3

[[service]]
name = "web"
check = "port"
host = "127.0.0.1"
port = 80
restart_comand = "systemctl restart web"
"#,
    );
    assert_eq!(warnings.len(), 2, "warnings: {warnings:?}");
    let rendered: Vec<String> = warnings.iter().map(ToString::to_string).collect();
    assert!(rendered
        .iter()
        .any(|w| w.contains("check_intervall_secs") && w.contains("check_interval_secs")));
    assert!(rendered
        .iter()
        .any(|w| w.contains("restart_comand") && w.contains("restart_cmd")));
}

#[test]
fn suggestion_rejects_distant_names() {
    let known = known_config_keys();
    assert_eq!(
        suggest_correction("webhook_uri", &known),
        Some("webhook_url".to_string())
    );
    assert_eq!(suggest_correction("a_completely_unrelated_key_name", &known), None);
}

#[test]
fn env_var_resolves_config_path() {
    // Explicit flag wins over everything, no filesystem access needed.
    let explicit = PathBuf::from("/etc/sentryd/custom.toml");
    let resolved = DaemonConfig::resolve_path(Some(&explicit)).unwrap();
    assert_eq!(resolved, explicit);
}
