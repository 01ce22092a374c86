//! JSON cache helpers for block files and exported artifacts.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use eyre::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Loads a JSON document from disk.
pub fn load_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let file =
        File::open(path).wrap_err_with(|| format!("failed to open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .wrap_err_with(|| format!("failed to parse JSON from {}", path.display()))
}

/// Writes a JSON document to disk, creating parent directories as needed.
pub fn dump_json<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .wrap_err_with(|| format!("failed to create directory {}", parent.display()))?;
    }
    let file =
        File::create(path).wrap_err_with(|| format!("failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, value)
        .wrap_err_with(|| format!("failed to write JSON to {}", path.display()))?;
    writer
        .flush()
        .wrap_err_with(|| format!("failed to flush {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn round_trips_nested_map() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out/agg/agg_tx.json");

        let mut map: HashMap<String, HashMap<String, u64>> = HashMap::new();
        map.entry("beaverbuild".to_string())
            .or_default()
            .insert("0xaaa".to_string(), 3);

        dump_json(&path, &map).expect("dump should create parent dirs");
        let loaded: HashMap<String, HashMap<String, u64>> =
            load_json(&path).expect("load should succeed");
        assert_eq!(loaded, map);
    }

    #[test]
    fn load_missing_file_is_an_error() {
        let result: Result<HashMap<String, u64>> = load_json("/nonexistent/path.json");
        assert!(result.is_err());
    }
}
