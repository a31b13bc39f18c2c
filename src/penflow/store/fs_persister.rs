use super::{PersistedTables, Persister, StorageError, StorageResult};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Persists each database as `<root>/<db_name>.json`.
pub struct FsPersister {
    root: PathBuf,
}

impl FsPersister {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn database_path(&self, db_name: &str) -> PathBuf {
        self.root.join(format!("{}.json", db_name))
    }

    fn ensure_dir(&self) -> StorageResult<()> {
        if !self.root.exists() {
            fs::create_dir_all(&self.root)?;
        }
        Ok(())
    }
}

fn check_db_name(db_name: &str) -> StorageResult<()> {
    let valid = !db_name.is_empty()
        && db_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        && !db_name.starts_with('.');
    if valid {
        Ok(())
    } else {
        Err(StorageError::Unavailable(format!(
            "invalid database name: {:?}",
            db_name
        )))
    }
}

impl Persister for FsPersister {
    fn open(&mut self, db_name: &str) -> StorageResult<()> {
        check_db_name(db_name)?;
        self.ensure_dir()?;
        if !self.root.is_dir() {
            return Err(StorageError::Unavailable(format!(
                "{} is not a directory",
                self.root.display()
            )));
        }
        Ok(())
    }

    fn load(&self, db_name: &str) -> StorageResult<Option<PersistedTables>> {
        check_db_name(db_name)?;
        let path = self.database_path(db_name);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        let tables: PersistedTables = serde_json::from_str(&content)?;
        Ok(Some(tables))
    }

    fn save(&self, db_name: &str, tables: &PersistedTables) -> StorageResult<()> {
        check_db_name(db_name)?;
        self.ensure_dir()?;

        let target = self.database_path(db_name);
        let content = serde_json::to_string_pretty(tables)?;

        // Atomic write
        let tmp = self.root.join(format!(".{}-{}.tmp", db_name, Uuid::new_v4()));
        if let Err(e) = fs::write(&tmp, content).and_then(|()| fs::rename(&tmp, &target)) {
            if let Err(cleanup) = fs::remove_file(&tmp) {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("Could not remove {}: {}", tmp.display(), cleanup);
                }
            }
            return Err(e.into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RawTable;
    use serde_json::json;
    use tempfile::TempDir;

    fn sample_tables() -> PersistedTables {
        let mut library = RawTable::new();
        library.insert("a".into(), json!({"title": "A", "createdAt": 1}));
        let mut tables = PersistedTables::new();
        tables.insert("library".into(), library);
        tables
    }

    #[test]
    fn load_before_any_save_is_none() {
        let dir = TempDir::new().unwrap();
        let mut persister = FsPersister::new(dir.path().join("data"));
        persister.open("penflow").unwrap();
        assert!(dir.path().join("data").is_dir());
        assert!(persister.load("penflow").unwrap().is_none());
    }

    #[test]
    fn save_then_load_roundtrips() {
        let dir = TempDir::new().unwrap();
        let mut persister = FsPersister::new(dir.path().to_path_buf());
        persister.open("notes").unwrap();

        persister.save("notes", &sample_tables()).unwrap();
        assert!(dir.path().join("notes.json").exists());

        let loaded = persister.load("notes").unwrap().unwrap();
        assert_eq!(loaded, sample_tables());
    }

    #[test]
    fn save_leaves_no_tmp_files() {
        let dir = TempDir::new().unwrap();
        let persister = FsPersister::new(dir.path().to_path_buf());
        persister.save("notes", &sample_tables()).unwrap();

        for entry in fs::read_dir(dir.path()).unwrap() {
            let path = entry.unwrap().path();
            let name = path.file_name().unwrap().to_str().unwrap().to_string();
            assert!(!name.ends_with(".tmp"), "Found leftover tmp file: {}", name);
        }
    }

    #[test]
    fn failed_rename_cleans_up_the_tmp_file() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("notes.json");
        fs::create_dir(&blocker).unwrap();
        fs::write(blocker.join("keep"), "x").unwrap();

        let persister = FsPersister::new(dir.path().to_path_buf());
        assert!(matches!(
            persister.save("notes", &sample_tables()),
            Err(StorageError::Io(_))
        ));

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["notes.json"]);
    }

    #[test]
    fn databases_are_isolated_by_name() {
        let dir = TempDir::new().unwrap();
        let persister = FsPersister::new(dir.path().to_path_buf());
        persister.save("one", &sample_tables()).unwrap();
        assert!(persister.load("two").unwrap().is_none());
    }

    #[test]
    fn malformed_document_is_a_serialization_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("bad.json"), "{ not json").unwrap();
        let persister = FsPersister::new(dir.path().to_path_buf());
        assert!(matches!(
            persister.load("bad"),
            Err(StorageError::Serialization(_))
        ));
    }

    #[test]
    fn open_rejects_path_like_names() {
        let dir = TempDir::new().unwrap();
        let mut persister = FsPersister::new(dir.path().to_path_buf());
        assert!(persister.open("../escape").is_err());
        assert!(persister.open("").is_err());
        assert!(persister.open(".hidden").is_err());
    }

    #[test]
    fn open_fails_when_root_is_a_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("occupied");
        fs::write(&file, "x").unwrap();
        let mut persister = FsPersister::new(file);
        assert!(persister.open("penflow").is_err());
    }
}
