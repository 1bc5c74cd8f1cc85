use clap::Subcommand;
use serde_json::Value;
use studyroom_core::{Config, ConfigError};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print one value by dot path (e.g. "reminders.event_hour", "ai.model")
    Get { key: String },
    /// Change one value; lists take JSON, e.g. "[-7,-1]"
    Set { key: String, value: String },
    /// Print every key as `dot.path = value`
    List,
    /// Overwrite config.toml with the defaults
    Reset,
    /// Print where config.toml lives
    Path,
}

pub fn run(action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Get { key } => {
            let value = Config::load()?
                .get(&key)
                .ok_or(ConfigError::UnknownKey(key))?;
            println!("{value}");
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            println!("{key} = {}", config.get(&key).unwrap_or(value));
        }
        ConfigAction::List => {
            let tree = serde_json::to_value(Config::load()?)?;
            for (key, value) in leaves(&tree) {
                println!("{key} = {value}");
            }
        }
        ConfigAction::Reset => {
            Config::default().save()?;
            println!("reset {}", Config::file_path()?.display());
        }
        ConfigAction::Path => println!("{}", Config::file_path()?.display()),
    }
    Ok(())
}

/// Flatten nested tables into `(dot.path, value)` pairs, in key order.
/// Arrays are leaves; unset optionals are skipped.
fn leaves(tree: &Value) -> Vec<(String, String)> {
    fn walk(prefix: &str, value: &Value, out: &mut Vec<(String, String)>) {
        match value {
            Value::Object(map) => {
                for (key, child) in map {
                    let path = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{prefix}.{key}")
                    };
                    walk(&path, child, out);
                }
            }
            Value::Null => {}
            Value::String(s) => out.push((prefix.to_string(), s.clone())),
            other => out.push((prefix.to_string(), other.to_string())),
        }
    }

    let mut out = Vec::new();
    walk("", tree, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn leaves_use_dot_paths() {
        let tree = json!({
            "ai": { "model": "llama", "timeout_secs": 30 },
            "database_path": null,
            "reminders": { "deadline_offsets_days": [-7, -1] },
        });
        assert_eq!(
            leaves(&tree),
            vec![
                ("ai.model".to_string(), "llama".to_string()),
                ("ai.timeout_secs".to_string(), "30".to_string()),
                ("reminders.deadline_offsets_days".to_string(), "[-7,-1]".to_string()),
            ]
        );
    }

    #[test]
    fn every_listed_key_reads_back() {
        let config = Config::default();
        let tree = serde_json::to_value(&config).unwrap();
        let listed = leaves(&tree);
        assert!(listed.iter().any(|(k, _)| k == "pomodoro.max_sessions"));
        for (key, value) in listed {
            assert_eq!(config.get(&key).as_deref(), Some(value.as_str()), "{key}");
        }
    }
}
