use super::RawTable;
use crate::model::Row;
use serde_json::Value;
use std::collections::BTreeMap;

pub const LIBRARY_TABLE: &str = "library";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellType {
    String,
    Number,
}

impl CellType {
    fn accepts(self, value: &Value) -> bool {
        match self {
            CellType::String => value.is_string(),
            CellType::Number => value.is_number(),
        }
    }

    fn default_value(self) -> Value {
        match self {
            CellType::String => Value::from(""),
            CellType::Number => Value::from(0),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CellSchema {
    pub name: &'static str,
    pub cell_type: CellType,
}

/// Cells of the `library` table. Defaults are `""` and `0`.
pub const LIBRARY_SCHEMA: &[CellSchema] = &[
    CellSchema {
        name: "content",
        cell_type: CellType::String,
    },
    CellSchema {
        name: "createdAt",
        cell_type: CellType::Number,
    },
    CellSchema {
        name: "updatedAt",
        cell_type: CellType::Number,
    },
    CellSchema {
        name: "visitedAt",
        cell_type: CellType::Number,
    },
    CellSchema {
        name: "title",
        cell_type: CellType::String,
    },
    CellSchema {
        name: "tags",
        cell_type: CellType::String,
    },
];

/// An in-memory table bound to a fixed cell schema.
///
/// Writes are filtered through the schema: unknown cells and cells of the
/// wrong type are dropped with a warning. Full-row writes get defaults for
/// missing cells; partial writes and loads do not, so a row may be
/// incomplete. Readers decide what to do with incomplete rows.
///
/// Rows are never empty: a write that leaves no cells removes nothing and
/// creates nothing.
#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    schema: &'static [CellSchema],
    rows: BTreeMap<String, Row>,
}

impl Table {
    pub fn new(name: &str, schema: &'static [CellSchema]) -> Self {
        Self {
            name: name.to_string(),
            schema,
            rows: BTreeMap::new(),
        }
    }

    pub fn library() -> Self {
        Self::new(LIBRARY_TABLE, LIBRARY_SCHEMA)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn cell_schema(&self, cell: &str) -> Option<&CellSchema> {
        self.schema.iter().find(|c| c.name == cell)
    }

    fn conforming_cells(&self, id: &str, cells: Row) -> Row {
        let mut out = Row::new();
        for (cell, value) in cells {
            match self.cell_schema(&cell) {
                Some(schema) if schema.cell_type.accepts(&value) => {
                    out.insert(cell, value);
                }
                Some(_) => log::warn!(
                    "Dropping cell {}.{}.{}: wrong type",
                    self.name,
                    id,
                    cell
                ),
                None => log::warn!(
                    "Dropping cell {}.{}.{}: not in schema",
                    self.name,
                    id,
                    cell
                ),
            }
        }
        out
    }

    /// Replaces the whole row, filling missing cells with schema defaults.
    pub fn set_row(&mut self, id: &str, cells: Row) {
        let mut row = self.conforming_cells(id, cells);
        for schema in self.schema {
            row.entry(schema.name)
                .or_insert_with(|| schema.cell_type.default_value());
        }
        self.rows.insert(id.to_string(), row);
    }

    /// Merges `cells` into the row, creating it if needed.
    ///
    /// Returns whether anything was written.
    pub fn set_partial_row(&mut self, id: &str, cells: Row) -> bool {
        let cells = self.conforming_cells(id, cells);
        if cells.is_empty() {
            return false;
        }
        self.rows.entry(id.to_string()).or_default().extend(cells);
        true
    }

    /// Returns whether a row was removed.
    pub fn del_row(&mut self, id: &str) -> bool {
        self.rows.remove(id).is_some()
    }

    pub fn get_row(&self, id: &str) -> Option<&Row> {
        self.rows.get(id)
    }

    pub fn has_row(&self, id: &str) -> bool {
        self.rows.get(id).is_some_and(|row| !row.is_empty())
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn rows(&self) -> impl Iterator<Item = (&String, &Row)> {
        self.rows.iter()
    }

    /// Returns whether there was anything to remove.
    pub fn clear(&mut self) -> bool {
        let had_rows = !self.rows.is_empty();
        self.rows.clear();
        had_rows
    }

    /// Replaces the contents with rows read from storage.
    ///
    /// Non-object rows are skipped; object rows keep whatever cells conform.
    pub fn load_raw(&mut self, raw: &RawTable) {
        self.rows.clear();
        for (id, value) in raw {
            match value {
                Value::Object(cells) => {
                    let row = self.conforming_cells(id, cells.clone());
                    if !row.is_empty() {
                        self.rows.insert(id.clone(), row);
                    }
                }
                _ => log::warn!("Skipping row {}.{}: not an object", self.name, id),
            }
        }
        log::debug!("Loaded {} rows into {}", self.rows.len(), self.name);
    }

    pub fn to_raw(&self) -> RawTable {
        self.rows
            .iter()
            .map(|(id, row)| (id.clone(), super::row_to_raw(row)))
            .collect()
    }
}
