//! Unknown-key detection with Levenshtein "did you mean?" suggestions.
//!
//! The raw TOML is walked before serde deserialization and every dotted key
//! path is compared against the known option set. Unknown keys produce
//! warnings, never errors — a misspelled optional field silently falling
//! back to its default is the failure mode this catches.

use std::collections::HashSet;

/// A non-fatal config warning (typo, suspicious key).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

/// Returns the complete set of valid dotted key paths.
///
/// Maintained manually to match `RawConfig` / `RawService` in mod.rs.
/// Any new field added there must be added here too.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // daemon-wide options
        "check_interval_secs",
        "restart_limit",
        "restart_window_secs",
        "alert_cooldown_secs",
        "check_timeout_secs",
        "restart_settle_secs",
        "restart_cmd_timeout_secs",
        "webhook_url",
        "state_file",
        "pid_file",
        // [[service]]
        "service",
        "service.name",
        "service.check",
        "service.process",
        "service.host",
        "service.port",
        "service.url",
        "service.expect_status",
        "service.command",
        "service.restart_cmd",
    ];
    keys.iter().copied().collect()
}

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// Array-of-table entries share their parent's path, so every `[[service]]`
/// block contributes `service.<field>` keys.
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    match value {
        toml::Value::Table(table) => {
            for (k, v) in table {
                let path = if prefix.is_empty() {
                    k.clone()
                } else {
                    format!("{prefix}.{k}")
                };
                keys.push(path.clone());
                keys.extend(walk_toml_keys(v, &path));
            }
        }
        toml::Value::Array(items) => {
            for item in items {
                keys.extend(walk_toml_keys(item, prefix));
            }
        }
        _ => {}
    }
    keys
}

/// Compute the Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let a_len = a.chars().count();
    let b_len = b.chars().count();
    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    let mut prev: Vec<usize> = (0..=b_len).collect();
    let mut curr = vec![0; b_len + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.chars().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_len]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    known
        .iter()
        .map(|&k| (k, levenshtein(unknown, k)))
        .filter(|&(_, dist)| dist <= 3)
        .min_by_key(|&(_, dist)| dist)
        .map(|(k, _)| k.to_string())
}

/// Parse a raw TOML string and return warnings for any unknown config keys.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(), // parse errors are handled by serde later
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| ValidationWarning {
            field: key.clone(),
            message: format!("Unknown config key '{key}'"),
            suggestion: suggest_correction(key, &known),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_config_yields_no_warnings() {
        let warnings = validate_unknown_keys(
            r#"
check_interval_secs = 10

[[service]]
name = "web"
check = "port"
host = "localhost"
port = 8080
"#,
        );
        assert!(warnings.is_empty(), "unexpected: {warnings:?}");
    }

    #[test]
    fn typo_in_service_field_suggests_correction() {
        let warnings = validate_unknown_keys(
            r#"
[[service]]
name = "web"
check = "port"
host = "localhost"
prot = 8080
"#,
        );
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].field, "service.prot");
        assert_eq!(warnings[0].suggestion.as_deref(), Some("service.port"));
    }

    #[test]
    fn typo_in_daemon_option_suggests_correction() {
        let warnings = validate_unknown_keys("check_intervall_secs = 10\n");
        assert_eq!(warnings.len(), 1);
        assert_eq!(
            warnings[0].suggestion.as_deref(),
            Some("check_interval_secs")
        );
    }

    #[test]
    fn distant_unknown_key_has_no_suggestion() {
        let warnings = validate_unknown_keys("completely_wrong_thing = true\n");
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].suggestion.is_none());
    }
}
