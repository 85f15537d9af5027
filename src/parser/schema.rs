// Schema parser: collects the ordered column list of each CREATE TABLE block.
// This is a line scan over mysqldump's layout, not a DDL parser.

use crate::error::{Error, Result};
use crate::parser::TableSchema;
use ahash::AHashSet;
use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::sync::Arc;

/// Table schemas by name, ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, Vec<String>>",
    into = "BTreeMap<String, Vec<String>>"
)]
pub struct SchemaCatalog {
    tables: BTreeMap<String, Arc<TableSchema>>,
}

impl SchemaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a table.
    pub fn insert(&mut self, schema: TableSchema) {
        self.tables
            .insert(schema.name().to_string(), Arc::new(schema));
    }

    pub fn get(&self, table: &str) -> Option<&Arc<TableSchema>> {
        self.tables.get(table)
    }

    pub fn require(&self, table: &str) -> Result<&Arc<TableSchema>> {
        self.get(table)
            .ok_or_else(|| Error::UnknownTable(table.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    pub fn save<W: Write>(&self, mut writer: W) -> Result<()> {
        serde_json::to_writer_pretty(&mut writer, self)?;
        writeln!(writer)?;
        Ok(())
    }
}

impl TryFrom<BTreeMap<String, Vec<String>>> for SchemaCatalog {
    type Error = Error;

    fn try_from(map: BTreeMap<String, Vec<String>>) -> Result<Self> {
        let mut catalog = SchemaCatalog::new();
        for (table, columns) in map {
            catalog.insert(TableSchema::new(table, columns)?);
        }
        Ok(catalog)
    }
}

impl From<SchemaCatalog> for BTreeMap<String, Vec<String>> {
    fn from(catalog: SchemaCatalog) -> Self {
        catalog
            .tables
            .into_iter()
            .map(|(name, schema)| (name, schema.columns().to_vec()))
            .collect()
    }
}

pub struct SchemaParser {
    create_table_re: Regex,
    column_re: Regex,
}

impl Default for SchemaParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaParser {
    // Build regexes once for reuse.
    pub fn new() -> Self {
        let create_table_re = Regex::new(
            r"(?i)^\s*CREATE\s+TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?(?:`?[^`\s(]+`?\.)?`?([^`\s(]+)`?",
        )
        .expect("valid create table regex");
        let column_re = Regex::new(r"^\s*`([^`]+)`\s+\w").expect("valid column regex");
        Self {
            create_table_re,
            column_re,
        }
    }

    /// Scan a dump file for CREATE TABLE blocks. With `only`, other tables are skipped.
    pub fn parse_file(
        &self,
        filename: &str,
        only: Option<&AHashSet<String>>,
        bar: Option<&indicatif::ProgressBar>,
    ) -> Result<SchemaCatalog> {
        debug!("ParseSchema: Opening file {}", filename);
        let file = File::open(filename)?;
        let catalog = self.parse_reader(BufReader::new(file), only, bar)?;
        if let Some(b) = bar {
            b.finish();
        }
        Ok(catalog)
    }

    pub fn parse_reader<R: BufRead>(
        &self,
        mut reader: R,
        only: Option<&AHashSet<String>>,
        bar: Option<&indicatif::ProgressBar>,
    ) -> Result<SchemaCatalog> {
        let mut catalog = SchemaCatalog::new();
        // (table, columns) of the CREATE TABLE block being read.
        let mut current: Option<(String, Vec<String>)> = None;
        let mut tables_seen = 0usize;

        let mut raw = Vec::new();
        loop {
            raw.clear();
            let n = reader.read_until(b'\n', &mut raw)?;
            if n == 0 {
                break;
            }
            if let Some(b) = bar {
                b.inc(n as u64);
            }
            let line = String::from_utf8_lossy(&raw);

            if let Some(cap) = self.create_table_re.captures(&line) {
                if let Some(table) = cap.get(1) {
                    tables_seen += 1;
                    let table = table.as_str().to_string();
                    let wanted = only.map_or(true, |set| set.contains(&table));
                    debug!(
                        "ParseSchema: Found CREATE TABLE for {} ({})",
                        table,
                        if wanted { "kept" } else { "skipped" }
                    );
                    current = wanted.then(|| (table, Vec::new()));
                }
                continue;
            }

            let Some((table, columns)) = current.as_mut() else {
                continue;
            };
            if let Some(cap) = self.column_re.captures(&line) {
                if let Some(col) = cap.get(1) {
                    columns.push(col.as_str().to_string());
                }
            }
            if line.trim_end().ends_with(';') {
                if columns.is_empty() {
                    debug!("ParseSchema: Table {} has no columns, ignored", table);
                } else {
                    debug!(
                        "ParseSchema: Table {} has {} columns",
                        table,
                        columns.len()
                    );
                    catalog.insert(TableSchema::new(table.clone(), std::mem::take(columns))?);
                }
                current = None;
            }
        }

        debug!(
            "ParseSchema: Processed {} tables, extracted columns for {}",
            tables_seen,
            catalog.len()
        );
        Ok(catalog)
    }
}
