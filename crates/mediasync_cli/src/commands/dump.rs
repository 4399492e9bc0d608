//! Dump command implementation.

use mediasync_protocol::Record;
use mediasync_storage::{FileStore, KvStore};
use serde_json::Value;
use std::path::Path;

/// Runs the dump command.
pub fn run(data_dir: &Path, key: &str, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = FileStore::open(data_dir)?;
    let Some(text) = store.get(key)? else {
        return Err(format!("no entry for key {key:?}").into());
    };
    let value: Value = serde_json::from_str(&text)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&value)?),
        "text" => {
            println!("Key: {key}");
            let lines = render_text(&value);
            println!("Records: {}", lines.len());
            println!();
            for line in lines {
                println!("{line}");
            }
        }
        other => return Err(format!("unknown format {other:?}, expected text or json").into()),
    }
    Ok(())
}

/// One line per record: saved_at, url and title.
fn render_text(value: &Value) -> Vec<String> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .map(|item| match Record::from_value(item) {
            Some(record) => {
                let saved_at = record
                    .saved_at
                    .map_or_else(|| "-".to_string(), |ts| ts.to_string());
                let title = record.title.as_deref().unwrap_or("");
                format!("{saved_at:>14}  {}  {title}", record.url)
            }
            None => format!("{:>14}  <invalid> {item}", "-"),
        })
        .collect()
}
