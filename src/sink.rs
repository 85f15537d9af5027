// Record sinks: where zipped records go once a tuple survives the column-count check.
// Sinks know nothing about the dump; filters decide per target whether a record is kept.

use crate::error::{Error, Result};
use crate::parser::{Record, TableSchema};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Consumer of records for one routed table.
pub trait RecordSink {
    fn accept(&mut self, record: &Record) -> Result<()>;

    /// Called once after the last line of input.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<F> RecordSink for F
where
    F: FnMut(&Record) -> Result<()>,
{
    fn accept(&mut self, record: &Record) -> Result<()> {
        self(record)
    }
}

/// Equality conditions over text columns.
///
/// AND across columns, OR across the values listed for one column. Null never
/// matches, and an empty filter keeps everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordFilter {
    conditions: BTreeMap<String, Vec<String>>,
}

impl RecordFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow `value` for `column` (in addition to values already allowed).
    pub fn require(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.conditions
            .entry(column.into())
            .or_default()
            .push(value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Every filtered column must exist in the table.
    pub fn validate(&self, schema: &TableSchema) -> Result<()> {
        for column in self.conditions.keys() {
            if schema.column_index(column).is_none() {
                return Err(Error::UnknownColumn {
                    table: schema.name().to_string(),
                    column: column.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.conditions.iter().all(|(column, allowed)| {
            record
                .text(column)
                .is_some_and(|v| allowed.iter().any(|a| a == v))
        })
    }
}

/// One filtered destination of a routed table.
pub struct Target<'s> {
    label: String,
    filter: Option<RecordFilter>,
    sink: Box<dyn RecordSink + 's>,
    written: u64,
    filtered: u64,
}

impl<'s> Target<'s> {
    pub fn new(
        label: impl Into<String>,
        filter: Option<RecordFilter>,
        sink: impl RecordSink + 's,
    ) -> Self {
        Self {
            label: label.into(),
            filter: filter.filter(|f| !f.is_empty()),
            sink: Box::new(sink),
            written: 0,
            filtered: 0,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn filter(&self) -> Option<&RecordFilter> {
        self.filter.as_ref()
    }

    /// Hand the record to the sink unless the filter rejects it.
    /// Returns whether the record was forwarded.
    pub fn offer(&mut self, record: &Record) -> Result<bool> {
        if let Some(filter) = &self.filter {
            if !filter.matches(record) {
                self.filtered += 1;
                return Ok(false);
            }
        }
        self.sink.accept(record)?;
        self.written += 1;
        Ok(true)
    }

    pub fn finish(&mut self) -> Result<()> {
        self.sink.finish()
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn filtered(&self) -> u64 {
        self.filtered
    }
}

/// Writes one JSON object per line, keys in column order.
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl JsonLinesSink<BufWriter<File>> {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path.as_ref())?;
        Ok(Self::new(BufWriter::with_capacity(1024 * 1024, file)))
    }
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> RecordSink for JsonLinesSink<W> {
    fn accept(&mut self, record: &Record) -> Result<()> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Keeps records in memory keyed by the text of one column.
///
/// Records whose key is Null (or whose table lacks the column) are skipped;
/// a repeated key keeps the last record seen.
#[derive(Debug, Default)]
pub struct IndexSink {
    key_column: String,
    rows: AHashMap<String, Record>,
}

impl IndexSink {
    pub fn new(key_column: impl Into<String>) -> Self {
        Self {
            key_column: key_column.into(),
            rows: AHashMap::new(),
        }
    }

    pub fn key_column(&self) -> &str {
        &self.key_column
    }

    pub fn get(&self, key: &str) -> Option<&Record> {
        self.rows.get(key)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn into_map(self) -> AHashMap<String, Record> {
        self.rows
    }
}

impl RecordSink for IndexSink {
    fn accept(&mut self, record: &Record) -> Result<()> {
        if let Some(key) = record.text(&self.key_column) {
            self.rows.insert(key.to_string(), record.clone());
        }
        Ok(())
    }
}
