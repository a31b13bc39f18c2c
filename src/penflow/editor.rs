//! Editor session: the open document, its dirty flag and the view mode.
//!
//! The session does not own any text widget or renderer. It keeps the
//! buffer contents as a string in an observable [`EditorState`] and delegates
//! persistence to a [`Library`] and exporting to an [`Exporter`].

use crate::error::{PenflowError, Result};
use crate::library::{Confirm, Library};
use crate::model::{
    new_file_id, now_millis, parse_frontmatter, title_from_content, FileUpdate, MarkdownFile,
};
use crate::observe::Observable;
use crate::store::Persister;
use serde::{Deserialize, Serialize};

pub const DEFAULT_DOCUMENT_TITLE: &str = "Untitled";

pub const DISCARD_CHANGES_PROMPT: &str =
    "You have unsaved changes. Discard them and create a new file?";

/// How the document is shown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EditorMode {
    #[default]
    Edit,
    SideBySide,
    Preview,
}

impl EditorMode {
    /// Edit → SideBySide → Preview → Edit, or the reverse.
    pub fn cycle(self, forward: bool) -> Self {
        match (self, forward) {
            (EditorMode::Edit, true) => EditorMode::SideBySide,
            (EditorMode::SideBySide, true) => EditorMode::Preview,
            (EditorMode::Preview, true) => EditorMode::Edit,
            (EditorMode::Edit, false) => EditorMode::Preview,
            (EditorMode::Preview, false) => EditorMode::SideBySide,
            (EditorMode::SideBySide, false) => EditorMode::Edit,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditorState {
    pub mode: EditorMode,
    pub content: String,
    pub active_filename: Option<String>,
    /// `None` until the buffer has been saved to, or opened from, the library.
    pub active_file_id: Option<String>,
    pub is_dirty: bool,
}

impl EditorState {
    /// Replaces the buffer and marks it dirty.
    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
        self.is_dirty = true;
    }

    pub fn cycle_mode(&mut self, forward: bool) {
        self.mode = self.mode.cycle(forward);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Receives the document when the user exports it.
///
/// Returns the file name the document was written under.
pub trait Exporter {
    fn export(&self, file: &MarkdownFile, suggested_filename: &str) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct EditorSession {
    state: Observable<EditorState>,
}

impl Default for EditorSession {
    fn default() -> Self {
        Self::new()
    }
}

impl EditorSession {
    pub fn new() -> Self {
        Self {
            state: Observable::new(EditorState::default()),
        }
    }

    /// A copy of the current state.
    pub fn state(&self) -> EditorState {
        self.state.get()
    }

    /// Handle on the state. Subscribe to it to follow changes.
    pub fn observable(&self) -> Observable<EditorState> {
        self.state.clone()
    }

    pub fn set_content(&self, content: impl Into<String>) {
        let content = content.into();
        self.state.update(|s| s.set_content(content));
    }

    pub fn set_mode(&self, mode: EditorMode) {
        self.state.update(|s| s.mode = mode);
    }

    pub fn cycle_mode(&self, forward: bool) -> EditorMode {
        self.state.update(|s| {
            s.cycle_mode(forward);
            s.mode
        })
    }

    pub fn reset(&self) {
        self.state.update(EditorState::reset);
    }

    /// Loads external text into the buffer. The result is clean.
    pub fn load_content(&self, filename: &str, content: &str, file_id: Option<&str>) {
        self.state.update(|s| {
            s.content = content.to_string();
            s.active_filename = Some(filename.to_string());
            s.active_file_id = file_id.map(str::to_string);
            s.is_dirty = false;
        });
    }

    /// Opens a library file in the buffer and marks it visited.
    pub fn open_file<P: Persister>(&self, library: &mut Library<P>, id: &str) -> Result<()> {
        let wrap = |e| PenflowError::file_operation("open", Some(id), e);

        let file = library
            .get_file(id)
            .map_err(wrap)?
            .ok_or_else(|| wrap(PenflowError::validation("id", format!("no file {}", id))))?;

        self.load_content(&file.title, &file.content, Some(&file.id));
        library.mark_file_visited(id).map_err(wrap)
    }

    /// Starts an empty buffer, asking first if there are unsaved changes.
    ///
    /// Returns whether the buffer was cleared.
    pub fn new_file(&self, confirm: &dyn Confirm) -> bool {
        if self.state.with(|s| s.is_dirty) && !confirm.confirm(DISCARD_CHANGES_PROMPT) {
            return false;
        }
        self.state.update(|s| {
            s.content.clear();
            s.active_filename = None;
            s.active_file_id = None;
            s.is_dirty = false;
        });
        true
    }

    /// Writes the buffer to the library and returns the file id.
    ///
    /// Updates the active file if it still exists, otherwise creates one
    /// (under the active id, or a fresh one). Empty buffers are not saved
    /// and return `None`.
    pub fn save<P: Persister>(&self, library: &mut Library<P>) -> Result<Option<String>> {
        let state = self.state.get();
        if state.content.is_empty() {
            return Ok(None);
        }

        let id = state.active_file_id.clone().unwrap_or_else(new_file_id);
        let wrap = |e| PenflowError::file_operation("save", Some(id.as_str()), e);
        let title = title_from_content(&state.content).unwrap_or_default();

        if library.file_exists(&id).map_err(wrap)? {
            let updates = FileUpdate::default()
                .content(state.content.as_str())
                .title(title.as_str());
            library.update_file(&id, updates).map_err(wrap)?;
        } else {
            library
                .create_file(&id, &state.content, Some(&title), "")
                .map_err(wrap)?;
        }

        self.state.update(|s| {
            s.active_file_id = Some(id.clone());
            if s.active_filename.is_none() {
                s.active_filename = Some(document_title(&state.content, DEFAULT_DOCUMENT_TITLE));
            }
            s.is_dirty = false;
        });
        Ok(Some(id))
    }

    /// Hands the buffer to `exporter` as a transient record.
    ///
    /// The record is titled after the active file name, else the document's
    /// frontmatter `title`, else its first level-1 heading, else
    /// [`DEFAULT_DOCUMENT_TITLE`]. Nothing happens when there is neither
    /// content nor a file name.
    pub fn export(&self, exporter: &dyn Exporter) -> Result<()> {
        let state = self.state.get();
        if state.content.is_empty() && state.active_filename.is_none() {
            return Ok(());
        }

        let title = match &state.active_filename {
            Some(name) => filename_stem(name).to_string(),
            None => export_title(&state.content),
        };
        let now = now_millis();
        let file = MarkdownFile {
            id: state
                .active_file_id
                .clone()
                .unwrap_or_else(|| "temp".to_string()),
            content: state.content.clone(),
            created_at: now,
            updated_at: now,
            visited_at: now,
            title,
            tags: String::new(),
        };
        let suggested = state
            .active_filename
            .clone()
            .unwrap_or_else(|| export_filename(&file.title));

        let written = exporter.export(&file, &suggested).map_err(|e| {
            PenflowError::file_operation("export", state.active_file_id.as_deref(), e)
        })?;

        self.state.update(|s| {
            s.active_filename = Some(written);
            s.is_dirty = false;
        });
        Ok(())
    }

    pub fn document_title(&self, default: &str) -> String {
        self.state.with(|s| document_title(&s.content, default))
    }
}

/// Title from the first level-1 heading, or `default`.
pub fn document_title(content: &str, default: &str) -> String {
    title_from_content(content).unwrap_or_else(|| default.to_string())
}

/// Frontmatter `title`, else the first level-1 heading of the body, else
/// [`DEFAULT_DOCUMENT_TITLE`].
pub fn export_title(content: &str) -> String {
    let (frontmatter, body) = parse_frontmatter(content);
    frontmatter
        .title()
        .unwrap_or_else(|| document_title(body, DEFAULT_DOCUMENT_TITLE))
}

/// Drops everything from the last `.` on: `notes.md` → `notes`,
/// `.hidden` → `""`. Names without a `.` are returned whole.
pub fn filename_stem(filename: &str) -> &str {
    match filename.rsplit_once('.') {
        Some((stem, _)) => stem,
        None => filename,
    }
}

/// Lowercase, hyphenated `.md` file name for `title`.
pub fn export_filename(title: &str) -> String {
    let mut slug = String::new();
    for c in title.trim().to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if (c.is_whitespace() || c == '-') && !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "untitled.md".to_string()
    } else {
        format!("{}.md", slug)
    }
}
