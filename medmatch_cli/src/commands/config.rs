use crate::cli::{Cli, ConfigAction};
use crate::commands::Result;
use crate::output::{format_output, OutputData};
use medmatch_core::AppConfig;
use serde_json::{json, Value};

pub async fn run(cli: &Cli, action: ConfigAction) -> Result<()> {
    let path = cli.config.clone().unwrap_or_else(AppConfig::default_path);
    match action {
        ConfigAction::Path => {
            println!("{}", path.display());
            Ok(())
        }
        ConfigAction::Show => {
            let config = AppConfig::load_with_env(cli.config.as_deref())?;
            let mut value = serde_json::to_value(&config)?;
            mask_secrets(&mut value);
            if let Value::Object(map) = &mut value {
                map.insert("path".into(), json!(path.display().to_string()));
                map.insert("file_exists".into(), json!(path.exists()));
            }
            format_output(&OutputData::ConfigInfo(value), &cli.output)
        }
    }
}

/// Replace every `api_key` value with `***`.
fn mask_secrets(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, v) in map.iter_mut() {
                if key == "api_key" && !v.is_null() {
                    *v = json!("***");
                } else {
                    mask_secrets(v);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(mask_secrets),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_secrets() {
        let mut value = json!({
            "sources": { "scholar": { "api_key": "abc", "limit": 3 } },
            "assistant": { "api_key": "xyz", "model": "gemini-1.5-flash" }
        });
        mask_secrets(&mut value);
        assert_eq!(value["sources"]["scholar"]["api_key"], "***");
        assert_eq!(value["sources"]["scholar"]["limit"], 3);
        assert_eq!(value["assistant"]["api_key"], "***");
        assert_eq!(value["assistant"]["model"], "gemini-1.5-flash");
    }
}
