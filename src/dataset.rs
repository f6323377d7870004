//! Read-only views over a single result set

use crate::error::Error;
use crate::model::Table;
use crate::value::Value;
use crate::Result;
use indexmap::IndexMap;

/// One row keyed by header, in header order.
pub type Record = IndexMap<String, Value>;

static NULL: Value = Value::Null;

/// A borrowed view over one [`Table`].
///
/// Nothing is materialized until a row is asked for, so looking up one
/// dataset in a ten-table response stays cheap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dataset<'a> {
    table: &'a Table,
}

impl<'a> Dataset<'a> {
    pub fn new(table: &'a Table) -> Self {
        Self { table }
    }

    pub fn name(&self) -> &'a str {
        self.table.name()
    }

    pub fn headers(&self) -> &'a [String] {
        self.table.headers()
    }

    pub fn rows(&self) -> &'a [Vec<Value>] {
        self.table.rows()
    }

    pub fn row_count(&self) -> usize {
        self.table.rows().len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    /// Number of rows whose length differs from the header count.
    pub fn mismatched_rows(&self) -> usize {
        let width = self.headers().len();
        self.rows().iter().filter(|r| r.len() != width).count()
    }

    pub fn get_row(&self, index: usize) -> Result<Record> {
        self.rows()
            .get(index)
            .map(|row| zip_row(self.headers(), row))
            .ok_or(Error::RowIndexOutOfRange {
                index,
                len: self.row_count(),
            })
    }

    /// Materialize every row.
    ///
    /// Headers and values are zipped by position over the shorter of the two:
    /// values past the last header are left out of the record, and a table
    /// with no headers yields one empty record per row. The result always has
    /// exactly [`Dataset::row_count`] entries.
    pub fn to_map(&self) -> Vec<Record> {
        let mismatched = self.mismatched_rows();
        if mismatched > 0 {
            tracing::debug!(
                "{}: {} of {} rows do not match {} headers",
                self.name(),
                mismatched,
                self.row_count(),
                self.headers().len()
            );
        }
        self.iter().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = Record> + 'a {
        let headers = self.headers();
        self.rows().iter().map(move |row| zip_row(headers, row))
    }

    /// All values under `header`, one per row. Short rows give `Value::Null`.
    pub fn column(&self, header: &str) -> Option<Vec<&'a Value>> {
        let idx = self.headers().iter().position(|h| h == header)?;
        Some(
            self.rows()
                .iter()
                .map(|row| row.get(idx).unwrap_or(&NULL))
                .collect(),
        )
    }
}

impl<'a> IntoIterator for Dataset<'a> {
    type Item = Record;
    type IntoIter = Box<dyn Iterator<Item = Record> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

/// Duplicate headers keep their first column.
fn zip_row(headers: &[String], row: &[Value]) -> Record {
    let mut record = Record::with_capacity(headers.len().min(row.len()));
    for (header, value) in headers.iter().zip(row) {
        if !record.contains_key(header) {
            record.insert(header.clone(), value.clone());
        }
    }
    record
}
