// Extraction plan: which tables to pull out of a dump, where each one goes and
// which rows each output keeps. Loaded from JSON or assembled from CLI flags.

use crate::error::{Error, Result};
use crate::parser::insert::Router;
use crate::parser::schema::SchemaCatalog;
use crate::sink::{JsonLinesSink, RecordFilter};
use ahash::AHashSet;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractPlan {
    pub tables: Vec<TablePlan>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TablePlan {
    pub table: String,
    /// Empty means one unfiltered `<table>.jsonl`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<OutputPlan>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputPlan {
    /// File name relative to the output directory.
    pub file: String,
    #[serde(default, skip_serializing_if = "RecordFilter::is_empty")]
    pub filter: RecordFilter,
}

/// `table.column=value`, as given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterExpr {
    pub table: String,
    pub column: String,
    pub value: String,
}

impl std::str::FromStr for FilterExpr {
    type Err = Error;

    fn from_str(expr: &str) -> Result<Self> {
        let invalid = || Error::InvalidFilter(expr.to_string());
        let (target, value) = expr.split_once('=').ok_or_else(invalid)?;
        let (table, column) = target.rsplit_once('.').ok_or_else(invalid)?;
        let (table, column) = (table.trim(), column.trim());
        if table.is_empty() || column.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            table: table.to_string(),
            column: column.to_string(),
            value: value.to_string(),
        })
    }
}

impl ExtractPlan {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    /// Plan with one default output per table; each filter narrows the
    /// output of its table. Filtered tables are added when not listed.
    pub fn from_tables<I, S>(tables: I, filters: &[FilterExpr]) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut plan = ExtractPlan::default();
        for table in tables {
            plan.table_mut(table.into());
        }
        for f in filters {
            let entry = plan.table_mut(f.table.clone());
            if entry.outputs.is_empty() {
                entry.outputs.push(OutputPlan {
                    file: default_file_name(&entry.table),
                    filter: RecordFilter::new(),
                });
            }
            for output in &mut entry.outputs {
                output.filter =
                    std::mem::take(&mut output.filter).require(f.column.clone(), f.value.clone());
            }
        }
        plan
    }

    fn table_mut(&mut self, table: String) -> &mut TablePlan {
        let idx = match self.tables.iter().position(|t| t.table == table) {
            Some(idx) => idx,
            None => {
                self.tables.push(TablePlan {
                    table,
                    outputs: Vec::new(),
                });
                self.tables.len() - 1
            }
        };
        &mut self.tables[idx]
    }

    pub fn table_names(&self) -> AHashSet<String> {
        self.tables.iter().map(|t| t.table.clone()).collect()
    }

    /// Resolved (table, file, filter) triples, default outputs filled in.
    pub fn outputs(&self) -> Vec<(&str, String, Option<&RecordFilter>)> {
        let mut out = Vec::new();
        for t in &self.tables {
            if t.outputs.is_empty() {
                out.push((t.table.as_str(), default_file_name(&t.table), None));
            }
            for o in &t.outputs {
                out.push((t.table.as_str(), o.file.clone(), Some(&o.filter)));
            }
        }
        out
    }

    /// Create the output directory and one JSON-lines file per output, and
    /// register them with a fresh router.
    pub fn build_router(
        &self,
        catalog: &SchemaCatalog,
        out_dir: &Path,
    ) -> Result<Router<'static>> {
        let outputs = self.outputs();
        let mut seen = AHashSet::new();
        for (table, file, filter) in &outputs {
            let schema = catalog.require(table)?;
            if let Some(f) = filter {
                f.validate(schema)?;
            }
            if !seen.insert(file.clone()) {
                return Err(Error::DuplicateOutput(file.clone()));
            }
        }

        fs::create_dir_all(out_dir)?;
        let mut router = Router::new();
        for (table, file, filter) in outputs {
            let schema = catalog.require(table)?;
            let path = out_dir.join(&file);
            debug!("Plan: {} -> {}", table, path.display());
            router.add_target(
                std::sync::Arc::clone(schema),
                file,
                filter.cloned(),
                JsonLinesSink::create(&path)?,
            )?;
        }
        Ok(router)
    }
}

// Table name made safe for use as a file name.
pub fn default_file_name(table: &str) -> String {
    let mut out = String::new();
    for c in table.chars() {
        if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            out.push(c);
        } else {
            out.push('_');
        }
    }
    if out.is_empty() {
        out.push_str("table");
    }
    format!("{}.jsonl", out)
}
