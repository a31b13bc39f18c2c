//! # Library State
//!
//! [`Library`] is the in-memory view of every document the user can see,
//! plus the query surface (sort, search, tag filter) built on top of it.
//!
//! ## Ownership
//!
//! The library owns its [`LibraryAdapter`] once initialized. All mutations
//! go through the adapter; the library never edits `files` itself. Instead it
//! subscribes to the adapter's table listener and replaces `files`
//! wholesale with each snapshot it receives:
//!
//! ```text
//! Library::update_file
//!   └── LibraryAdapter::update_file
//!         ├── Table write
//!         └── table listener ──► files.set(snapshot) ──► files subscribers
//! ```
//!
//! Because notification is synchronous, `files` already reflects a write by
//! the time the mutating call returns.
//!
//! ## Queries
//!
//! Queries read the current `files` snapshot and never touch storage, so
//! they work (returning nothing) even before initialization.

use crate::error::{PenflowError, Result};
use crate::model::{
    now_millis, title_from_content, FileMap, FileUpdate, MarkdownFile, SortConfig, SortField,
    SortOrder,
};
use crate::observe::{Observable, Subscription};
use crate::store::adapter::LibraryAdapter;
use crate::store::Persister;
use crate::tags::{collect_tags, has_tag};
use icu_collator::{Collator, CollatorOptions, Strength};
use std::cmp::Ordering;

const COMPONENT: &str = "Library";

pub const CLEAR_ALL_PROMPT: &str =
    "Are you sure you want to delete all files? This action cannot be undone.";

/// Asks the user a yes/no question.
///
/// Plain closures work: `|message: &str| true`.
pub trait Confirm {
    fn confirm(&self, message: &str) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&str) -> bool,
{
    fn confirm(&self, message: &str) -> bool {
        self(message)
    }
}

pub struct Library<P: Persister> {
    adapter: Option<LibraryAdapter<P>>,
    subscription: Option<Subscription>,
    files: Observable<FileMap>,
    is_loading: Observable<bool>,
    sort_config: Observable<SortConfig>,
}

impl<P: Persister> Default for Library<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Persister> Library<P> {
    pub fn new() -> Self {
        Self {
            adapter: None,
            subscription: None,
            files: Observable::new(FileMap::new()),
            is_loading: Observable::new(true),
            sort_config: Observable::new(SortConfig::default()),
        }
    }

    /// Takes over `adapter`, initializing it if needed, loads every file and
    /// starts following the adapter's changes.
    ///
    /// On failure the adapter is released, `files` is left empty and
    /// `is_loading` is false; calling again with a fresh adapter is fine.
    pub fn initialize(&mut self, mut adapter: LibraryAdapter<P>) -> Result<()> {
        if self.adapter.is_some() {
            log::warn!("{} already initialized", COMPONENT);
            return Ok(());
        }

        self.is_loading.set(true);
        match attach(&mut adapter, &self.files) {
            Ok((files, subscription)) => {
                self.files.set(files);
                self.subscription = Some(subscription);
                self.adapter = Some(adapter);
                self.is_loading.set(false);
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to initialize library: {}", e);
                adapter.destroy();
                self.files.set(FileMap::new());
                self.is_loading.set(false);
                Err(e)
            }
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.adapter.is_some()
    }

    /// Handle on the current file map. Subscribe to it to follow changes.
    pub fn files(&self) -> Observable<FileMap> {
        self.files.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading.get()
    }

    pub fn loading(&self) -> Observable<bool> {
        self.is_loading.clone()
    }

    pub fn sort_config(&self) -> SortConfig {
        self.sort_config.get()
    }

    pub fn set_sort_config(&self, config: SortConfig) {
        self.sort_config.set(config);
    }

    pub fn sort_config_observable(&self) -> Observable<SortConfig> {
        self.sort_config.clone()
    }

    pub fn adapter(&self) -> Option<&LibraryAdapter<P>> {
        self.adapter.as_ref()
    }

    fn adapter_ref(&self) -> Result<&LibraryAdapter<P>> {
        self.adapter
            .as_ref()
            .ok_or_else(|| PenflowError::not_initialized(COMPONENT))
    }

    fn adapter_mut(&mut self) -> Result<&mut LibraryAdapter<P>> {
        self.adapter
            .as_mut()
            .ok_or_else(|| PenflowError::not_initialized(COMPONENT))
    }

    // --- Queries ---

    /// Every file, in id order.
    pub fn get_files_array(&self) -> Vec<MarkdownFile> {
        self.files.with(|files| files.values().cloned().collect())
    }

    /// Every file, ordered by the current sort configuration.
    pub fn get_sorted_files(&self) -> Vec<MarkdownFile> {
        sort_files(self.get_files_array(), &self.sort_config())
    }

    /// Case-insensitive substring search over title, content and tags.
    ///
    /// A blank query matches everything. Otherwise the query is matched as
    /// typed, surrounding whitespace included.
    pub fn search_files(&self, query: &str) -> Vec<MarkdownFile> {
        let sorted = self.get_sorted_files();
        if query.trim().is_empty() {
            return sorted;
        }
        let needle = query.to_lowercase();

        sorted
            .into_iter()
            .filter(|f| {
                f.title.to_lowercase().contains(&needle)
                    || f.content.to_lowercase().contains(&needle)
                    || f.tags.to_lowercase().contains(&needle)
            })
            .collect()
    }

    /// Files carrying `tag`. A blank tag matches everything.
    pub fn filter_by_tag(&self, tag: &str) -> Vec<MarkdownFile> {
        let sorted = self.get_sorted_files();
        if tag.trim().is_empty() {
            return sorted;
        }
        sorted.into_iter().filter(|f| has_tag(&f.tags, tag)).collect()
    }

    pub fn get_all_tags(&self) -> Vec<String> {
        self.files.with(|files| collect_tags(files.values()))
    }

    // --- Delegations ---

    pub fn get_file(&self, id: &str) -> Result<Option<MarkdownFile>> {
        self.adapter_ref()?.get_file(id)
    }

    pub fn file_exists(&self, id: &str) -> Result<bool> {
        self.adapter_ref()?.file_exists(id)
    }

    pub fn get_file_count(&self) -> Result<usize> {
        self.adapter_ref()?.get_file_count()
    }

    /// Creates a file stamped with the current time.
    ///
    /// Without an explicit `title`, the first level-1 heading of `content`
    /// is used, or an empty title if there is none.
    pub fn create_file(
        &mut self,
        id: &str,
        content: &str,
        title: Option<&str>,
        tags: &str,
    ) -> Result<()> {
        let title = match title {
            Some(title) => title.to_string(),
            None => title_from_content(content).unwrap_or_default(),
        };
        let now = now_millis();
        let data = FileUpdate::default()
            .content(content)
            .title(title)
            .tags(tags)
            .created_at(now)
            .updated_at(now)
            .visited_at(now);

        self.adapter_mut()?.create_file(id, &data)
    }

    /// Applies `updates` and bumps `updated_at`.
    pub fn update_file(&mut self, id: &str, updates: FileUpdate) -> Result<()> {
        let updates = updates.updated_at(now_millis());
        self.adapter_mut()?.update_file(id, &updates)
    }

    pub fn delete_file(&mut self, id: &str) -> Result<()> {
        self.adapter_mut()?.delete_file(id)
    }

    /// Stamps `visited_at` with the current time. `updated_at` is left alone.
    pub fn mark_file_visited(&mut self, id: &str) -> Result<()> {
        let updates = FileUpdate::default().visited_at(now_millis());
        self.adapter_mut()?.update_file(id, &updates)
    }

    /// Deletes every file once `confirm` agrees. Returns whether it did.
    pub fn clear_all_files(&mut self, confirm: &dyn Confirm) -> Result<bool> {
        let adapter = self.adapter_mut()?;
        if !confirm.confirm(CLEAR_ALL_PROMPT) {
            return Ok(false);
        }
        adapter.clear_all_files()?;
        Ok(true)
    }

    /// Writes pending changes to durable storage.
    pub fn flush(&mut self) -> Result<()> {
        self.adapter_mut()?.flush()
    }

    /// Auto-save hook for a host timer. Returns whether a flush happened.
    pub fn flush_if_due(&mut self) -> Result<bool> {
        self.adapter_mut()?.flush_if_due()
    }

    /// Stops following the adapter, destroys it and resets the state.
    pub fn destroy(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        if let Some(mut adapter) = self.adapter.take() {
            adapter.destroy();
        }
        self.files.set(FileMap::new());
        self.is_loading.set(true);
    }
}

fn attach<P: Persister>(
    adapter: &mut LibraryAdapter<P>,
    files: &Observable<FileMap>,
) -> Result<(FileMap, Subscription)> {
    if !adapter.is_initialized() {
        adapter.initialize()?;
    }
    let loaded = adapter.get_all_files()?;
    let mirror = files.clone();
    let subscription = adapter.add_table_listener(move |snapshot| mirror.set(snapshot.clone()))?;
    Ok((loaded, subscription))
}

/// Orders `files` by `config`. Ties fall back to ascending id.
///
/// Titles are collated with the root locale at tertiary strength, so
/// accents and case only decide between otherwise equal titles.
pub fn sort_files(mut files: Vec<MarkdownFile>, config: &SortConfig) -> Vec<MarkdownFile> {
    let collator = match config.by {
        SortField::Title => title_collator(),
        _ => None,
    };
    files.sort_by(|a, b| compare_files(a, b, config, collator.as_ref()));
    files
}

fn title_collator() -> Option<Collator> {
    let mut options = CollatorOptions::new();
    options.strength = Some(Strength::Tertiary);
    match Collator::try_new(&Default::default(), options) {
        Ok(collator) => Some(collator),
        Err(e) => {
            log::warn!("No collation data, sorting titles by case-folded code points: {}", e);
            None
        }
    }
}

fn compare_files(
    a: &MarkdownFile,
    b: &MarkdownFile,
    config: &SortConfig,
    collator: Option<&Collator>,
) -> Ordering {
    let primary = match config.by {
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        SortField::VisitedAt => a.visited_at.cmp(&b.visited_at),
        SortField::Title => match collator {
            Some(collator) => collator.compare(&a.title, &b.title),
            None => compare_folded(&a.title, &b.title),
        },
    };
    let directed = match config.order {
        SortOrder::Asc => primary,
        SortOrder::Desc => primary.reverse(),
    };
    directed.then_with(|| a.id.cmp(&b.id))
}

fn compare_folded(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}
