use crate::error::{PenflowError, Result};
use chrono::Utc;
use pulldown_cmark::{Event, HeadingLevel, Parser, Tag, TagEnd};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use serde_yaml::Mapping;
use std::collections::BTreeMap;
use uuid::Uuid;

/// A raw table row as it sits in the store: cell name to JSON value.
pub type Row = Map<String, Value>;

/// The library as seen by readers: id to validated record.
pub type FileMap = BTreeMap<String, MarkdownFile>;

/// The persisted shape of a document, without its id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSchema {
    pub content: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub visited_at: i64,
    pub title: String,
    pub tags: String,
}

/// A document together with its id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkdownFile {
    pub id: String,
    pub content: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub visited_at: i64,
    pub title: String,
    pub tags: String,
}

impl MarkdownFile {
    pub fn from_schema(id: impl Into<String>, schema: FileSchema) -> Self {
        Self {
            id: id.into(),
            content: schema.content,
            created_at: schema.created_at,
            updated_at: schema.updated_at,
            visited_at: schema.visited_at,
            title: schema.title,
            tags: schema.tags,
        }
    }

    pub fn schema(&self) -> FileSchema {
        FileSchema {
            content: self.content.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            visited_at: self.visited_at,
            title: self.title.clone(),
            tags: self.tags.clone(),
        }
    }
}

/// A partial record. Only the fields that are `Some` are written.
///
/// There is no `id` field, so an update can never move a record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visited_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
}

impl FileUpdate {
    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn tags(mut self, tags: impl Into<String>) -> Self {
        self.tags = Some(tags.into());
        self
    }

    pub fn created_at(mut self, millis: i64) -> Self {
        self.created_at = Some(millis);
        self
    }

    pub fn updated_at(mut self, millis: i64) -> Self {
        self.updated_at = Some(millis);
        self
    }

    pub fn visited_at(mut self, millis: i64) -> Self {
        self.visited_at = Some(millis);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// The supplied fields as row cells.
    pub fn to_cells(&self) -> Row {
        let mut row = Row::new();
        if let Some(content) = &self.content {
            row.insert("content".into(), Value::from(content.as_str()));
        }
        if let Some(created_at) = self.created_at {
            row.insert("createdAt".into(), Value::from(created_at));
        }
        if let Some(updated_at) = self.updated_at {
            row.insert("updatedAt".into(), Value::from(updated_at));
        }
        if let Some(visited_at) = self.visited_at {
            row.insert("visitedAt".into(), Value::from(visited_at));
        }
        if let Some(title) = &self.title {
            row.insert("title".into(), Value::from(title.as_str()));
        }
        if let Some(tags) = &self.tags {
            row.insert("tags".into(), Value::from(tags.as_str()));
        }
        row
    }
}

impl FileSchema {
    pub fn to_row(&self) -> Row {
        match serde_json::to_value(self) {
            Ok(Value::Object(row)) => row,
            // A struct of strings and integers always serializes to an object.
            _ => Row::new(),
        }
    }
}

/// Sortable fields of a [`MarkdownFile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    CreatedAt,
    UpdatedAt,
    VisitedAt,
    Title,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortConfig {
    pub by: SortField,
    pub order: SortOrder,
}

impl SortConfig {
    pub fn new(by: SortField, order: SortOrder) -> Self {
        Self { by, order }
    }
}

impl Default for SortConfig {
    fn default() -> Self {
        Self {
            by: SortField::VisitedAt,
            order: SortOrder::Desc,
        }
    }
}

/// Current time as Unix epoch milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// A fresh random id for a new document.
pub fn new_file_id() -> String {
    Uuid::new_v4().to_string()
}

/// Builds a complete record from defaults: empty text fields and all three
/// timestamps set to now. Supplied fields win.
pub fn create_default_markdown_file(overrides: &FileUpdate) -> FileSchema {
    let now = now_millis();
    FileSchema {
        content: overrides.content.clone().unwrap_or_default(),
        created_at: overrides.created_at.unwrap_or(now),
        updated_at: overrides.updated_at.unwrap_or(now),
        visited_at: overrides.visited_at.unwrap_or(now),
        title: overrides.title.clone().unwrap_or_default(),
        tags: overrides.tags.clone().unwrap_or_default(),
    }
}

const STRING_FIELDS: [&str; 3] = ["content", "title", "tags"];
const TIMESTAMP_FIELDS: [&str; 3] = ["createdAt", "updatedAt", "visitedAt"];

/// Structural check: an object with all six cells present and correctly typed.
pub fn is_markdown_file_schema(value: &Value) -> bool {
    value.as_object().is_some_and(row_matches_schema)
}

/// Same as [`is_markdown_file_schema`] plus a string `id`.
pub fn is_markdown_file(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|obj| obj.get("id").is_some_and(Value::is_string) && row_matches_schema(obj))
}

fn row_matches_schema(row: &Row) -> bool {
    STRING_FIELDS
        .iter()
        .all(|f| row.get(*f).is_some_and(Value::is_string))
        && TIMESTAMP_FIELDS
            .iter()
            .all(|f| row.get(*f).is_some_and(|v| v.as_i64().is_some()))
}

/// Checks a raw row and converts it to a [`FileSchema`].
pub fn validate_markdown_file_schema(row: &Row) -> Result<FileSchema> {
    for field in STRING_FIELDS {
        match row.get(field) {
            Some(v) if v.is_string() => {}
            Some(_) => return Err(PenflowError::validation(field, "expected a string")),
            None => return Err(PenflowError::validation(field, "missing")),
        }
    }
    for field in TIMESTAMP_FIELDS {
        match row.get(field) {
            Some(v) if v.as_i64().is_some() => {}
            Some(_) => return Err(PenflowError::validation(field, "expected an integer")),
            None => return Err(PenflowError::validation(field, "missing")),
        }
    }

    serde_json::from_value(Value::Object(row.clone()))
        .map_err(|e| PenflowError::validation("row", e.to_string()))
}

/// Converts a stored row into a record. Fails with a validation error if the
/// row is corrupt; callers treat that as "skip this row".
pub fn row_to_markdown_file(id: &str, row: &Row) -> Result<MarkdownFile> {
    let schema = validate_markdown_file_schema(row)?;
    Ok(MarkdownFile::from_schema(id, schema))
}

/// Converts every valid row, logging and dropping the corrupt ones.
pub fn table_to_markdown_files<'a, I>(rows: I) -> FileMap
where
    I: IntoIterator<Item = (&'a String, &'a Row)>,
{
    let mut files = FileMap::new();
    for (id, row) in rows {
        match row_to_markdown_file(id, row) {
            Ok(file) => {
                files.insert(id.clone(), file);
            }
            Err(e) => log::warn!("Skipping corrupt file row {}: {}", id, e),
        }
    }
    files
}

/// Text of the first level-1 heading, whitespace collapsed.
///
/// Returns `None` when the content has no H1 or the heading is blank.
pub fn title_from_content(content: &str) -> Option<String> {
    let mut in_h1 = false;
    let mut text = String::new();

    for event in Parser::new(content) {
        match event {
            Event::Start(Tag::Heading {
                level: HeadingLevel::H1,
                ..
            }) => in_h1 = true,
            Event::End(TagEnd::Heading(HeadingLevel::H1)) => {
                let title = text.split_whitespace().collect::<Vec<_>>().join(" ");
                if !title.is_empty() {
                    return Some(title);
                }
                in_h1 = false;
                text.clear();
            }
            Event::Text(t) | Event::Code(t) if in_h1 => text.push_str(&t),
            Event::SoftBreak | Event::HardBreak if in_h1 => text.push(' '),
            _ => {}
        }
    }

    None
}

/// YAML metadata block at the top of a document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frontmatter {
    pub fields: Mapping,
}

impl Frontmatter {
    /// The `title` field, if it is a non-empty scalar.
    pub fn title(&self) -> Option<String> {
        self.fields
            .get("title")
            .and_then(yaml_scalar)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }

    /// The `tags` field, given either as a list or a comma-separated string.
    pub fn tags(&self) -> Vec<String> {
        match self.fields.get("tags") {
            Some(serde_yaml::Value::Sequence(items)) => {
                items.iter().filter_map(yaml_scalar).collect()
            }
            Some(value) => yaml_scalar(value)
                .map(|raw| raw.split(',').map(|t| t.trim().to_string()).collect())
                .unwrap_or_default(),
            None => Vec::new(),
        }
    }
}

fn yaml_scalar(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Splits `content` into its frontmatter block and the body after it.
///
/// The block opens with a `---` line at the very start and closes at the
/// next `---` line. Returns `None` when there is no complete block.
pub fn split_frontmatter(content: &str) -> Option<(&str, &str)> {
    let rest = content.strip_prefix("---")?;
    let (opening, rest) = rest.split_once('\n')?;
    if !opening.trim().is_empty() {
        return None;
    }

    let mut from = 0;
    while let Some(pos) = rest[from..].find("\n---") {
        let yaml_end = from + pos;
        if let Some((tail, body)) = rest[yaml_end + 4..].split_once('\n') {
            if tail.trim().is_empty() {
                return Some((&rest[..yaml_end], body));
            }
        }
        from = yaml_end + 1;
    }
    None
}

/// Parses the frontmatter of `content`, returning it with the body.
///
/// Documents without a block, or whose block is not a YAML mapping, get an
/// empty [`Frontmatter`] and their full content as the body. An empty block
/// is still split off.
pub fn parse_frontmatter(content: &str) -> (Frontmatter, &str) {
    let Some((yaml, body)) = split_frontmatter(content) else {
        return (Frontmatter::default(), content);
    };
    if yaml.trim().is_empty() {
        return (Frontmatter::default(), body);
    }

    match serde_yaml::from_str::<Mapping>(yaml) {
        Ok(fields) => (Frontmatter { fields }, body),
        Err(e) => {
            log::debug!("Ignoring unparseable frontmatter: {}", e);
            (Frontmatter::default(), content)
        }
    }
}
