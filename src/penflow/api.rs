//! # API Facade
//!
//! [`PenflowApi`] is the composition root: it builds the storage stack from
//! a [`PenflowConfig`], binds a [`Library`] to it and pairs the library with
//! an [`EditorSession`]. Hosts talk to this type and reach for the parts
//! only when they need finer control.
//!
//! ## What the API Does NOT Do
//!
//! - **Business logic**: queries live in [`Library`], buffer handling in
//!   [`EditorSession`].
//! - **Timers**: the host must call [`PenflowApi::tick`] at least once per
//!   auto-save interval to drive background flushes.
//!
//! ## Generic Over Persister
//!
//! `PenflowApi<P: Persister>` is generic over durable storage:
//! - Production: `PenflowApi<FsPersister>` via [`PenflowApi::open`]
//! - Testing: `PenflowApi<MemPersister>` via [`PenflowApi::with_adapter`]
//!
//! Dropping the API destroys the library, which flushes pending writes.

use crate::config::PenflowConfig;
use crate::editor::{EditorSession, Exporter};
use crate::error::Result;
use crate::library::{Confirm, Library};
use crate::observe::Subscription;
use crate::store::adapter::LibraryAdapter;
use crate::store::fs_persister::FsPersister;
use crate::store::Persister;

pub struct PenflowApi<P: Persister> {
    library: Library<P>,
    editor: EditorSession,
}

impl PenflowApi<FsPersister> {
    /// Opens the file-backed library described by `config`.
    pub fn open(config: &PenflowConfig) -> Result<Self> {
        let data_dir = config.resolved_data_dir()?;
        log::debug!(
            "Opening {} in {}",
            config.database_name,
            data_dir.display()
        );
        let adapter = LibraryAdapter::new(&config.database_name, FsPersister::new(data_dir))
            .with_autosave_interval(config.autosave_interval());
        Self::with_adapter(adapter)
    }
}

impl<P: Persister> PenflowApi<P> {
    pub fn with_adapter(adapter: LibraryAdapter<P>) -> Result<Self> {
        let mut library = Library::new();
        library.initialize(adapter)?;
        Ok(Self {
            library,
            editor: EditorSession::new(),
        })
    }

    pub fn library(&self) -> &Library<P> {
        &self.library
    }

    pub fn library_mut(&mut self) -> &mut Library<P> {
        &mut self.library
    }

    pub fn editor(&self) -> &EditorSession {
        &self.editor
    }

    /// Opens a library file in the editor.
    pub fn open_file(&mut self, id: &str) -> Result<()> {
        self.editor.open_file(&mut self.library, id)
    }

    /// Saves the editor buffer. See [`EditorSession::save`].
    pub fn save_current(&mut self) -> Result<Option<String>> {
        self.editor.save(&mut self.library)
    }

    pub fn new_file(&self, confirm: &dyn Confirm) -> bool {
        self.editor.new_file(confirm)
    }

    pub fn export_current(&self, exporter: &dyn Exporter) -> Result<()> {
        self.editor.export(exporter)
    }

    /// Deletes a file, clearing the editor if it was showing it.
    pub fn delete_file(&mut self, id: &str) -> Result<()> {
        self.library.delete_file(id)?;
        if self.editor.state().active_file_id.as_deref() == Some(id) {
            self.editor.reset();
        }
        Ok(())
    }

    /// Background auto-save. Returns whether a flush happened.
    ///
    /// The host must call this on a timer, at least once per auto-save
    /// interval. There is no timer inside the library: a write only flushes
    /// when the interval has already elapsed at the moment it is made, so
    /// without `tick` the last edit before the user goes idle stays in
    /// memory until the next write, [`flush`](Self::flush) or drop.
    pub fn tick(&mut self) -> Result<bool> {
        self.library.flush_if_due()
    }

    pub fn flush(&mut self) -> Result<()> {
        self.library.flush()
    }

    /// Follows the tag list as files change.
    pub fn on_tags_changed<F>(&self, mut callback: F) -> Subscription
    where
        F: FnMut(Vec<String>) + 'static,
    {
        self.library.files().subscribe(move |files| {
            callback(crate::tags::collect_tags(files.values()));
        })
    }
}

impl<P: Persister> Drop for PenflowApi<P> {
    fn drop(&mut self) {
        self.library.destroy();
    }
}
