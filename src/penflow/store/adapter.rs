use super::table::{Table, LIBRARY_TABLE};
use super::{PersistedTables, Persister};
use crate::error::{PenflowError, Result};
use crate::model::{
    create_default_markdown_file, row_to_markdown_file, table_to_markdown_files, FileMap,
    FileUpdate, MarkdownFile,
};
use crate::observe::{Subscribers, Subscription};
use std::time::{Duration, Instant};

pub const DEFAULT_AUTOSAVE_INTERVAL: Duration = Duration::from_millis(1000);

const COMPONENT: &str = "LibraryAdapter";

/// Write-back bookkeeping: mark dirty on every write, flush once the interval
/// has passed since the last flush.
#[derive(Debug)]
struct AutoSave {
    interval: Duration,
    dirty: bool,
    last_flush: Instant,
}

impl AutoSave {
    fn start(interval: Duration) -> Self {
        Self {
            interval,
            dirty: false,
            last_flush: Instant::now(),
        }
    }

    fn is_due(&self) -> bool {
        self.dirty && self.last_flush.elapsed() >= self.interval
    }

    fn mark_flushed(&mut self) {
        self.dirty = false;
        self.last_flush = Instant::now();
    }
}

/// Typed CRUD over the `library` table, kept in sync with a [`Persister`].
///
/// Nothing works until [`initialize`](Self::initialize) has run: every data
/// operation returns [`PenflowError::NotInitialized`] before that and leaves
/// the table untouched.
///
/// Every successful write notifies the table listeners synchronously with the
/// full, revalidated file map, then hands over to auto-save. Durable
/// write-back happens on the first write after the auto-save interval, on
/// [`flush_if_due`](Self::flush_if_due) (call it from a timer), on
/// [`flush`](Self::flush), or on [`destroy`](Self::destroy).
pub struct LibraryAdapter<P: Persister> {
    db_name: String,
    persister: P,
    autosave_interval: Duration,
    table: Option<Table>,
    autosave: Option<AutoSave>,
    listeners: Subscribers<FileMap>,
}

impl<P: Persister> LibraryAdapter<P> {
    pub fn new(db_name: impl Into<String>, persister: P) -> Self {
        Self {
            db_name: db_name.into(),
            persister,
            autosave_interval: DEFAULT_AUTOSAVE_INTERVAL,
            table: None,
            autosave: None,
            listeners: Subscribers::new(),
        }
    }

    /// Zero means every write is flushed immediately.
    pub fn with_autosave_interval(mut self, interval: Duration) -> Self {
        self.autosave_interval = interval;
        self
    }

    pub fn database_name(&self) -> &str {
        &self.db_name
    }

    pub fn persister(&self) -> &P {
        &self.persister
    }

    pub fn is_initialized(&self) -> bool {
        self.table.is_some()
    }

    /// Whether there are writes not yet flushed to durable storage.
    pub fn is_dirty(&self) -> bool {
        self.autosave.as_ref().is_some_and(|a| a.dirty)
    }

    /// Opens durable storage, loads the persisted table and starts auto-save.
    ///
    /// Calling it again on an initialized adapter logs a warning and returns
    /// `Ok(())` without reloading.
    pub fn initialize(&mut self) -> Result<()> {
        if self.is_initialized() {
            log::warn!("{} already initialized", COMPONENT);
            return Ok(());
        }

        self.persister
            .open(&self.db_name)
            .map_err(|e| PenflowError::database("initialization", e))?;

        let mut table = Table::library();
        match self.persister.load(&self.db_name) {
            Ok(Some(tables)) => {
                if let Some(raw) = tables.get(LIBRARY_TABLE) {
                    table.load_raw(raw);
                }
            }
            Ok(None) => log::debug!("No persisted data for {}, starting empty", self.db_name),
            Err(e) => {
                if let Err(close_err) = self.persister.close(&self.db_name) {
                    log::warn!("Failed to close {}: {}", self.db_name, close_err);
                }
                return Err(PenflowError::database("initialization", e));
            }
        }

        self.table = Some(table);
        self.autosave = Some(AutoSave::start(self.autosave_interval));
        Ok(())
    }

    fn table(&self) -> Result<&Table> {
        self.table
            .as_ref()
            .ok_or_else(|| PenflowError::not_initialized(COMPONENT))
    }

    fn table_mut(&mut self) -> Result<&mut Table> {
        self.table
            .as_mut()
            .ok_or_else(|| PenflowError::not_initialized(COMPONENT))
    }

    /// Every valid record. Corrupt rows are logged and left out.
    pub fn get_all_files(&self) -> Result<FileMap> {
        Ok(table_to_markdown_files(self.table()?.rows()))
    }

    /// The record for `id`, or `None` if it is absent, empty or corrupt.
    pub fn get_file(&self, id: &str) -> Result<Option<MarkdownFile>> {
        let row = match self.table()?.get_row(id) {
            Some(row) if !row.is_empty() => row,
            _ => return Ok(None),
        };

        match row_to_markdown_file(id, row) {
            Ok(file) => Ok(Some(file)),
            Err(e) => {
                log::error!("Failed to parse file with id {}: {}", id, e);
                Ok(None)
            }
        }
    }

    /// Writes a complete row, taking defaults for anything not in `data`.
    ///
    /// An existing row with the same id is overwritten.
    pub fn create_file(&mut self, id: &str, data: &FileUpdate) -> Result<()> {
        let row = create_default_markdown_file(data).to_row();
        self.table_mut()?.set_row(id, row);
        self.after_write();
        Ok(())
    }

    /// Merges the supplied fields into the row for `id`.
    ///
    /// The row doesn't have to exist: updating an unknown id creates a row
    /// holding only the supplied cells, which readers treat as corrupt until
    /// it is complete.
    pub fn update_file(&mut self, id: &str, updates: &FileUpdate) -> Result<()> {
        if self.table_mut()?.set_partial_row(id, updates.to_cells()) {
            self.after_write();
        }
        Ok(())
    }

    /// Removes the row. Missing ids are fine.
    pub fn delete_file(&mut self, id: &str) -> Result<()> {
        if self.table_mut()?.del_row(id) {
            self.after_write();
        }
        Ok(())
    }

    pub fn file_exists(&self, id: &str) -> Result<bool> {
        Ok(self.table()?.has_row(id))
    }

    /// Rows in the table, corrupt ones included.
    pub fn get_file_count(&self) -> Result<usize> {
        Ok(self.table()?.row_count())
    }

    pub fn clear_all_files(&mut self) -> Result<()> {
        if self.table_mut()?.clear() {
            self.after_write();
        }
        Ok(())
    }

    /// Registers `callback` to receive the full file map after every change.
    pub fn add_table_listener<F>(&self, callback: F) -> Result<Subscription>
    where
        F: FnMut(&FileMap) + 'static,
    {
        self.table()?;
        Ok(self.listeners.add(callback))
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Re-reads durable storage, replacing the in-memory table, and notifies
    /// listeners. Unflushed writes are discarded.
    pub fn reload(&mut self) -> Result<()> {
        self.table()?;
        let loaded = self
            .persister
            .load(&self.db_name)
            .map_err(|e| PenflowError::database("load", e))?;

        let table = self.table_mut()?;
        match loaded.as_ref().and_then(|tables| tables.get(LIBRARY_TABLE)) {
            Some(raw) => table.load_raw(raw),
            None => {
                table.clear();
            }
        }

        if let Some(autosave) = self.autosave.as_mut() {
            autosave.mark_flushed();
        }
        self.notify_listeners();
        Ok(())
    }

    /// Writes pending changes to durable storage now.
    pub fn flush(&mut self) -> Result<()> {
        self.table()?;
        if self.is_dirty() {
            self.save_now()?;
        }
        Ok(())
    }

    /// Flushes if there are pending writes and the interval has elapsed.
    ///
    /// Writes only check the interval when they happen, so a write followed
    /// by silence is persisted by this call and nothing else. Hosts must call
    /// it on a timer, at least once per auto-save interval.
    ///
    /// Returns whether a flush happened.
    pub fn flush_if_due(&mut self) -> Result<bool> {
        self.table()?;
        if self.autosave.as_ref().is_some_and(AutoSave::is_due) {
            self.save_now()?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Flushes pending writes (best effort), drops every listener, releases
    /// the table and closes durable storage. Safe to call more than once; the
    /// adapter can be initialized again afterwards.
    pub fn destroy(&mut self) {
        if self.is_dirty() {
            if let Err(e) = self.save_now() {
                log::warn!("Discarding unsaved changes to {}: {}", self.db_name, e);
            }
        }

        self.listeners.clear();

        if self.table.take().is_some() {
            self.autosave = None;
            if let Err(e) = self.persister.close(&self.db_name) {
                log::warn!("Failed to close {}: {}", self.db_name, e);
            }
        }
    }

    fn save_now(&mut self) -> Result<()> {
        let table = self.table()?;
        let rows = table.row_count();
        let mut tables = PersistedTables::new();
        tables.insert(table.name().to_string(), table.to_raw());

        self.persister
            .save(&self.db_name, &tables)
            .map_err(|e| PenflowError::database("save", e))?;

        if let Some(autosave) = self.autosave.as_mut() {
            autosave.mark_flushed();
        }
        log::debug!("Flushed {} rows to {}", rows, self.db_name);
        Ok(())
    }

    fn notify_listeners(&self) {
        if self.listeners.is_empty() {
            return;
        }
        if let Ok(files) = self.get_all_files() {
            self.listeners.notify(&files);
        }
    }

    fn after_write(&mut self) {
        self.notify_listeners();

        if let Some(autosave) = self.autosave.as_mut() {
            autosave.dirty = true;
        }
        if self.autosave.as_ref().is_some_and(AutoSave::is_due) {
            if let Err(e) = self.save_now() {
                log::warn!("Auto-save failed, will retry: {}", e);
            }
        }
    }
}
