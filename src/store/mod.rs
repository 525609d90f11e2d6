pub mod cache;
pub mod lock;
pub mod overrides;
pub mod seen;

use std::io;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};

/// Read a JSON state file. A missing file yields the default; an unreadable
/// or invalid one is logged and also yields the default.
pub(crate) fn read_json_or_default<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    match read_json(path) {
        Ok(Some(value)) => value,
        Ok(None) => {
            tracing::debug!("state file {} not found, starting empty", path.display());
            T::default()
        }
        Err(e) => {
            tracing::warn!("{e}; ignoring it");
            T::default()
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(Error::PersistedStateCorrupt {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
        }
    };
    if contents.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|e| Error::PersistedStateCorrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    lock::write_atomic(path, json.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn corrupt_file_reads_as_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{ not json").unwrap();
        let value: BTreeMap<String, u32> = read_json_or_default(&path);
        assert!(value.is_empty());
    }

    #[test]
    fn missing_and_empty_files_read_as_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let value: Vec<String> = read_json_or_default(&path);
        assert!(value.is_empty());
        std::fs::write(&path, "  \n").unwrap();
        let value: Vec<String> = read_json_or_default(&path);
        assert!(value.is_empty());
    }

    #[test]
    fn written_json_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut map = BTreeMap::new();
        map.insert("a".to_string(), 1u32);
        write_json(&path, &map).unwrap();
        let back: BTreeMap<String, u32> = read_json_or_default(&path);
        assert_eq!(back, map);
    }
}
