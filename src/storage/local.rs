//! Local filesystem storage backend
//!
//! Each target is a plain file: a one-line JSON schema header followed by one
//! line per update string.

use std::fs::{self, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::{Error, Result};

use super::{StorageBackend, TargetSchema, TargetState};

const HEADER_PREFIX: &str = "# ";

/// Local filesystem storage
pub struct LocalStorage {
    root_path: PathBuf,
}

impl LocalStorage {
    pub fn new(root_path: impl Into<PathBuf>) -> Result<Self> {
        let root_path = root_path.into();
        fs::create_dir_all(&root_path)?;
        Ok(Self { root_path })
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    fn resolve_path(&self, target: &str) -> PathBuf {
        self.root_path.join(target)
    }

    /// Read back the schema header of a target.
    pub fn read_schema(&self, target: &str) -> Result<TargetSchema> {
        let contents = fs::read_to_string(self.resolve_path(target))?;
        let header = contents
            .lines()
            .next()
            .and_then(|line| line.strip_prefix(HEADER_PREFIX))
            .ok_or_else(|| Error::storage(format!("{} has no schema header", target)))?;
        Ok(serde_json::from_str(header)?)
    }

    /// Read back every update line of a target, oldest first.
    pub fn read_values(&self, target: &str) -> Result<Vec<String>> {
        let contents = fs::read_to_string(self.resolve_path(target))?;
        Ok(contents
            .lines()
            .filter(|line| !line.starts_with(HEADER_PREFIX))
            .map(str::to_string)
            .collect())
    }
}

impl StorageBackend for LocalStorage {
    fn probe(&self, target: &str) -> Result<TargetState> {
        match fs::metadata(self.resolve_path(target)) {
            Ok(meta) if meta.is_file() => Ok(TargetState::Present),
            Ok(_) => Ok(TargetState::NotAFile),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(TargetState::Missing),
            Err(e) => Err(e.into()),
        }
    }

    fn create(&self, target: &str, schema: &TargetSchema) -> Result<()> {
        let path = self.resolve_path(target);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let header = serde_json::to_string(schema)?;
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| Error::storage(format!("Failed to create {}: {}", target, e)))?;
        writeln!(file, "{}{}", HEADER_PREFIX, header)?;
        file.sync_all()?;

        tracing::debug!(file = %target, "Created storage target");
        Ok(())
    }

    fn update(&self, target: &str, values: &[String]) -> Result<()> {
        let path = self.resolve_path(target);
        let file = OpenOptions::new()
            .append(true)
            .open(&path)
            .map_err(|e| Error::storage(format!("Failed to open {}: {}", target, e)))?;

        let mut writer = BufWriter::new(file);
        for value in values {
            writeln!(writer, "{}", value)?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataSource;
    use tempfile::TempDir;

    fn schema() -> TargetSchema {
        TargetSchema {
            step: 10,
            heartbeat: 20,
            rra_rows: 1200,
            rra_timespans: vec![3600],
            xff: 0.1,
            sources: vec![DataSource::gauge("value")],
        }
    }

    #[test]
    fn test_local_storage() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path()).unwrap();

        let target = "host/load/load.rrd";
        assert_eq!(storage.probe(target).unwrap(), TargetState::Missing);

        storage.create(target, &schema()).unwrap();
        assert_eq!(storage.probe(target).unwrap(), TargetState::Present);
        assert_eq!(storage.read_schema(target).unwrap(), schema());

        storage
            .update(target, &["10:1.000000".to_string(), "20:2.000000".to_string()])
            .unwrap();
        storage.update(target, &["30:3.000000".to_string()]).unwrap();

        assert_eq!(
            storage.read_values(target).unwrap(),
            vec!["10:1.000000", "20:2.000000", "30:3.000000"]
        );
    }

    #[test]
    fn test_directory_is_not_a_file() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path()).unwrap();
        fs::create_dir_all(temp_dir.path().join("host/cpu.rrd")).unwrap();

        assert_eq!(storage.probe("host/cpu.rrd").unwrap(), TargetState::NotAFile);
    }

    #[test]
    fn test_update_missing_target_fails() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path()).unwrap();

        let err = storage.update("nope.rrd", &["1:1".to_string()]).unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }

    #[test]
    fn test_create_twice_fails() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path()).unwrap();

        storage.create("a.rrd", &schema()).unwrap();
        assert!(storage.create("a.rrd", &schema()).is_err());
    }
}
