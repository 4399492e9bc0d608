//! Keys command implementation.

use mediasync_storage::{FileStore, KvStore};
use serde_json::Value;
use std::path::Path;

/// Runs the keys command.
pub fn run(data_dir: &Path, prefix: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let store = FileStore::open(data_dir)?;
    let listing = list(&store, prefix)?;

    if listing.is_empty() {
        println!("No keys stored");
        return Ok(());
    }
    for (key, count) in &listing {
        println!("{key:<40} {count:>8} records");
    }
    println!();
    println!("{} keys", listing.len());
    Ok(())
}

/// Keys matching `prefix` with the number of records stored under each.
pub fn list(
    store: &dyn KvStore,
    prefix: Option<&str>,
) -> Result<Vec<(String, usize)>, Box<dyn std::error::Error>> {
    let mut out = Vec::new();
    for key in store.keys()? {
        if prefix.is_some_and(|p| !key.starts_with(p)) {
            continue;
        }
        let count = match store.get(&key)? {
            Some(text) => match serde_json::from_str::<Value>(&text)? {
                Value::Array(items) => items.len(),
                _ => 0,
            },
            None => 0,
        };
        out.push((key, count));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediasync_storage::InMemoryStore;

    #[test]
    fn list_counts_records_and_filters_prefix() {
        let store = InMemoryStore::with_entries([
            ("filmin_a", r#"[{"url":"1"},{"url":"2"}]"#),
            ("filmin_b", "[]"),
            ("viki_a", r#"[{"url":"3"}]"#),
        ]);

        let all = list(&store, None).unwrap();
        assert_eq!(all.len(), 3);

        let filmin = list(&store, Some("filmin_")).unwrap();
        assert_eq!(
            filmin,
            vec![("filmin_a".to_string(), 2), ("filmin_b".to_string(), 0)]
        );
    }
}
