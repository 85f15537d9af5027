//! # sqldump-extract
//!
//! Streams a mysqldump file and turns the tuples of its multi-row
//! `INSERT INTO `table` VALUES (...),(...);` lines into named records, one
//! pass for any number of tables, without a SQL parser and without holding
//! more than one line in memory.
//!
//! ```rust
//! use sqldump_extract::{Record, Router, ScalarValue, TableSchema};
//! use std::sync::Arc;
//!
//! # fn main() -> sqldump_extract::Result<()> {
//! let schema = Arc::new(TableSchema::new("t", vec!["id".into(), "x".into()])?);
//! let mut rows = Vec::new();
//! {
//!     let mut router = Router::new();
//!     router.add_target(schema, "t", None, |r: &Record| -> sqldump_extract::Result<()> {
//!         rows.push(r.values().to_vec());
//!         Ok(())
//!     })?;
//!     router.route("INSERT INTO `t` VALUES (1,'a'),(2,NULL);")?;
//! }
//! assert_eq!(rows[1][1], ScalarValue::Null);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod logger;
pub mod parser;
pub mod plan;
pub mod progress;
pub mod sink;

pub use error::{Error, Result};
pub use parser::insert::{route_file, route_reader, ExtractStats, LineOutcome, Router, TableStats};
pub use parser::lexer::lex;
pub use parser::schema::{SchemaCatalog, SchemaParser};
pub use parser::tuple::split_tuples;
pub use parser::{Record, ScalarValue, TableSchema};
pub use plan::{ExtractPlan, FilterExpr};
pub use progress::{ProgressManager, RowProgress};
pub use sink::{IndexSink, JsonLinesSink, RecordFilter, RecordSink};
