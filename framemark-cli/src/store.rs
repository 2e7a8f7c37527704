//! File-backed persistence: the identity pin store and the record sinks.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use framemark_runtime::{KvStore, RecordSink};

/// Identity pins as a small JSON map on disk, one entry per comparison
/// group.
pub struct FilePinStore {
    path: PathBuf,
}

impl FilePinStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_map(&self) -> io::Result<BTreeMap<String, String>> {
        match fs::read_to_string(&self.path) {
            Ok(text) => serde_json::from_str(&text).map_err(|err| {
                // A corrupt pin file must not silently unpin anything.
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("pin store {} is corrupt: {}", self.path.display(), err),
                )
            }),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(err),
        }
    }
}

impl KvStore for FilePinStore {
    fn get(&mut self, key: &str) -> io::Result<Option<String>> {
        Ok(self.read_map()?.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> io::Result<()> {
        let mut map = self.read_map()?;
        map.insert(key.to_string(), value.to_string());
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(&map)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        fs::write(&self.path, text)
    }
}

/// Writes the flushed NDJSON payload to one file.
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RecordSink for FileSink {
    fn persist(&mut self, ndjson: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, ndjson)
    }
}

/// Streams the flushed payload to stdout, for piping into other tools.
pub struct StdoutSink;

impl RecordSink for StdoutSink {
    fn persist(&mut self, ndjson: &str) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        stdout.write_all(ndjson.as_bytes())?;
        stdout.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_pin_store_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pins.json");
        let mut store = FilePinStore::new(&path);

        assert_eq!(store.get("default").unwrap(), None);
        store.set("default", "synthetic:abcd1234").unwrap();
        assert_eq!(
            store.get("default").unwrap().as_deref(),
            Some("synthetic:abcd1234")
        );

        // A second group does not disturb the first.
        store.set("lab-b", "gl:ffff0000").unwrap();
        assert_eq!(
            store.get("default").unwrap().as_deref(),
            Some("synthetic:abcd1234")
        );
    }

    #[test]
    fn test_pin_store_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pins.json");
        FilePinStore::new(&path)
            .set("default", "synthetic:1111")
            .unwrap();

        let mut reopened = FilePinStore::new(&path);
        assert_eq!(
            reopened.get("default").unwrap().as_deref(),
            Some("synthetic:1111")
        );
    }

    #[test]
    fn test_pin_store_rejects_corrupt_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pins.json");
        fs::write(&path, "not json at all").unwrap();

        let mut store = FilePinStore::new(&path);
        let err = store.get("default").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_file_sink_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("records.ndjson");
        let mut sink = FileSink::new(&path);

        sink.persist("{\"a\":1}\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"a\":1}\n");
    }
}
