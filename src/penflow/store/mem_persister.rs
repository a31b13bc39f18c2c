use super::{PersistedTables, Persister, StorageError, StorageResult};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Default)]
struct MemState {
    documents: RefCell<HashMap<String, String>>,
    open: RefCell<Vec<String>>,
    saves: Cell<usize>,
    simulate_open_error: Cell<bool>,
    simulate_write_error: Cell<bool>,
}

/// In-memory persister for tests.
///
/// Documents are kept as serialized JSON strings so the persisted format is
/// exercised exactly as on disk. Clones share state, which lets a test keep a
/// handle after moving the persister into an adapter.
///
/// Uses `Cell`/`RefCell` since the crate is single-threaded.
#[derive(Clone, Default)]
pub struct MemPersister {
    state: Rc<MemState>,
}

impl MemPersister {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `open` fail, as if storage were unavailable.
    pub fn set_simulate_open_error(&self, simulate: bool) {
        self.state.simulate_open_error.set(simulate);
    }

    /// Make `save` fail, as if the quota were exceeded.
    pub fn set_simulate_write_error(&self, simulate: bool) {
        self.state.simulate_write_error.set(simulate);
    }

    /// Raw JSON currently stored for `db_name`.
    pub fn document(&self, db_name: &str) -> Option<String> {
        self.state.documents.borrow().get(db_name).cloned()
    }

    /// Overwrites the stored JSON for `db_name`, bypassing serialization.
    pub fn set_document(&self, db_name: &str, json: impl Into<String>) {
        self.state
            .documents
            .borrow_mut()
            .insert(db_name.to_string(), json.into());
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.state.saves.get()
    }

    pub fn is_open(&self, db_name: &str) -> bool {
        self.state.open.borrow().iter().any(|n| n == db_name)
    }
}

impl Persister for MemPersister {
    fn open(&mut self, db_name: &str) -> StorageResult<()> {
        if self.state.simulate_open_error.get() {
            return Err(StorageError::Unavailable(
                "Simulated open error".to_string(),
            ));
        }
        if !self.is_open(db_name) {
            self.state.open.borrow_mut().push(db_name.to_string());
        }
        Ok(())
    }

    fn load(&self, db_name: &str) -> StorageResult<Option<PersistedTables>> {
        match self.state.documents.borrow().get(db_name) {
            Some(json) => Ok(Some(serde_json::from_str(json)?)),
            None => Ok(None),
        }
    }

    fn save(&self, db_name: &str, tables: &PersistedTables) -> StorageResult<()> {
        if self.state.simulate_write_error.get() {
            return Err(StorageError::Unavailable(
                "Simulated write error".to_string(),
            ));
        }
        let json = serde_json::to_string(tables)?;
        self.state
            .documents
            .borrow_mut()
            .insert(db_name.to_string(), json);
        self.state.saves.set(self.state.saves.get() + 1);
        Ok(())
    }

    fn close(&mut self, db_name: &str) -> StorageResult<()> {
        self.state.open.borrow_mut().retain(|n| n != db_name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_documents() {
        let persister = MemPersister::new();
        let handle = persister.clone();
        persister.save("db", &PersistedTables::new()).unwrap();

        assert_eq!(handle.document("db"), Some("{}".to_string()));
        assert_eq!(handle.save_count(), 1);
    }

    #[test]
    fn simulated_errors() {
        let mut persister = MemPersister::new();
        persister.set_simulate_open_error(true);
        assert!(persister.open("db").is_err());

        persister.set_simulate_write_error(true);
        assert!(persister.save("db", &PersistedTables::new()).is_err());
        assert_eq!(persister.save_count(), 0);
    }

    #[test]
    fn open_and_close_track_databases() {
        let mut persister = MemPersister::new();
        persister.open("db").unwrap();
        assert!(persister.is_open("db"));
        persister.close("db").unwrap();
        assert!(!persister.is_open("db"));
    }

    #[test]
    fn injected_garbage_fails_to_load() {
        let persister = MemPersister::new();
        persister.set_document("db", "[1, 2");
        assert!(matches!(
            persister.load("db"),
            Err(StorageError::Serialization(_))
        ));
    }
}
