use clap::Subcommand;
use std::path::Path;

use tempo_session::{config_path, TelemetryConfig};

// ── CLI Schema ──

#[derive(Subcommand)]
pub enum ConfigCmd {
    /// Set a config value
    Set {
        /// Config key (e.g. snapshot_interval_ms)
        key: String,
        /// Config value (true/false/number/JSON array/string)
        value: String,
    },
    /// Get the effective value of a key
    Get {
        /// Config key
        key: String,
    },
    /// List effective config values
    List,
}

// ── Dispatch ──

pub fn run(cmd: ConfigCmd, root: &Path) -> anyhow::Result<()> {
    let path = config_path(root);
    match cmd {
        ConfigCmd::Set { key, value } => {
            set(&path, &key, &value)?;
            println!("{key} = {value}");
        }
        ConfigCmd::Get { key } => match effective(&path)?.get(&key) {
            Some(val) => println!("{val}"),
            None => anyhow::bail!("unknown config key: {key}"),
        },
        ConfigCmd::List => {
            let explicit = read_config(&path)?;
            for (k, v) in effective(&path)? {
                let marker = if explicit.contains_key(&k) { "" } else { "  (default)" };
                println!("{k} = {v}{marker}");
            }
        }
    }
    Ok(())
}

// ── Command Implementations ──

/// Read `.tempo/config.json` as written. Returns an empty map if the file doesn't exist.
fn read_config(path: &Path) -> anyhow::Result<serde_json::Map<String, serde_json::Value>> {
    if !path.exists() {
        return Ok(serde_json::Map::new());
    }
    let content = std::fs::read_to_string(path)?;
    let val: serde_json::Value = serde_json::from_str(&content)?;
    match val {
        serde_json::Value::Object(map) => Ok(map),
        _ => Ok(serde_json::Map::new()),
    }
}

/// File values over defaults, as the recorder sees them (without env overrides).
fn effective(path: &Path) -> anyhow::Result<serde_json::Map<String, serde_json::Value>> {
    let config = TelemetryConfig::from_file(path)?;
    match serde_json::to_value(config)? {
        serde_json::Value::Object(map) => Ok(map),
        _ => Ok(serde_json::Map::new()),
    }
}

/// Parse a string value into an appropriate JSON value (bool/number/array/string).
fn parse_value(s: &str) -> serde_json::Value {
    match s {
        "true" => serde_json::Value::Bool(true),
        "false" => serde_json::Value::Bool(false),
        "null" => serde_json::Value::Null,
        _ => {
            if let Ok(n) = s.parse::<u64>() {
                serde_json::Value::Number(n.into())
            } else if s.starts_with('[') {
                serde_json::from_str(s).unwrap_or_else(|_| serde_json::Value::String(s.to_string()))
            } else {
                serde_json::Value::String(s.to_string())
            }
        }
    }
}

/// Set one key, rejecting unknown keys and values of the wrong shape.
fn set(path: &Path, key: &str, value: &str) -> anyhow::Result<()> {
    if !known_keys().iter().any(|k| k == key) {
        anyhow::bail!("unknown config key: {key}");
    }
    let mut config = read_config(path)?;
    config.insert(key.to_string(), parse_value(value));
    let merged = serde_json::Value::Object(config.clone());
    serde_json::from_value::<TelemetryConfig>(merged)
        .map_err(|e| anyhow::anyhow!("invalid value for {key}: {e}"))?;

    let json = serde_json::to_string_pretty(&config)?;
    tempo_store::write_atomic(path, json.as_bytes())
}

fn known_keys() -> Vec<String> {
    match serde_json::to_value(TelemetryConfig::default()) {
        Ok(serde_json::Value::Object(map)) => map.keys().cloned().collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_value_shapes() {
        assert_eq!(parse_value("true"), serde_json::json!(true));
        assert_eq!(parse_value("300000"), serde_json::json!(300000));
        assert_eq!(parse_value(r#"["rs","ts"]"#), serde_json::json!(["rs", "ts"]));
        assert_eq!(parse_value("/tmp/logs"), serde_json::json!("/tmp/logs"));
        assert_eq!(parse_value("null"), serde_json::Value::Null);
    }

    #[test]
    fn set_then_effective() {
        let dir = tempfile::tempdir().unwrap();
        let path = config_path(dir.path());
        set(&path, "snapshot_interval_ms", "1000").unwrap();
        set(&path, "store_prompt_text", "true").unwrap();

        let eff = effective(&path).unwrap();
        assert_eq!(eff["snapshot_interval_ms"], 1000);
        assert_eq!(eff["store_prompt_text"], true);
        assert_eq!(eff["paste_like_threshold"], 50);

        let explicit = read_config(&path).unwrap();
        assert_eq!(explicit.len(), 2);
    }

    #[test]
    fn set_rejects_unknown_keys_and_bad_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = config_path(dir.path());
        assert!(set(&path, "no_such_key", "1").is_err());
        assert!(set(&path, "snapshot_interval_ms", "soon").is_err());
        assert!(!path.exists());
    }
}
