// INSERT router: finds `INSERT INTO `table` VALUES ...;` lines, splits their
// tuples and hands each complete record to the table's targets.
// We intentionally keep parsing simple (no full SQL grammar) for speed.

use crate::error::Result;
use crate::logger;
use crate::parser::lexer;
use crate::parser::tuple::split_tuples;
use crate::parser::{Record, TableSchema};
use crate::progress::RowProgress;
use crate::sink::{RecordFilter, RecordSink, Target};
use ahash::AHashMap;
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::sync::Arc;

// The table name is read from between the backticks and looked up exactly, so
// `wp_posts` never matches an INSERT into `wp_postmeta`.
static INSERT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"INSERT INTO `([^`]+)` VALUES").expect("valid insert regex"));

/// Counters for one routed table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableStats {
    /// INSERT lines routed to this table.
    pub statements: u64,
    /// Tuples whose field count matched the schema.
    pub rows: u64,
    /// Tuples dropped for a field-count mismatch.
    pub dropped: u64,
    /// Records forwarded to a sink (summed over targets).
    pub written: u64,
    /// Records rejected by a target filter (summed over targets).
    pub filtered: u64,
    /// Lines that ended inside an unclosed tuple.
    pub truncated: u64,
}

/// Totals for one extraction pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractStats {
    pub lines: u64,
    pub bytes: u64,
    pub tables: BTreeMap<String, TableStats>,
}

impl ExtractStats {
    pub fn rows(&self) -> u64 {
        self.tables.values().map(|t| t.rows).sum()
    }

    pub fn written(&self) -> u64 {
        self.tables.values().map(|t| t.written).sum()
    }

    pub fn dropped(&self) -> u64 {
        self.tables.values().map(|t| t.dropped).sum()
    }

    pub fn truncated(&self) -> u64 {
        self.tables.values().map(|t| t.truncated).sum()
    }
}

/// What happened to one routed line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineOutcome {
    pub rows: u64,
    pub dropped: u64,
    pub truncated: bool,
}

struct Route<'s> {
    schema: Arc<TableSchema>,
    targets: Vec<Target<'s>>,
    stats: TableStats,
}

/// Table name -> (schema, targets) lookup, consulted once per line.
pub struct Router<'s> {
    routes: AHashMap<String, Route<'s>>,
    progress: Option<RowProgress<'s>>,
    lines: u64,
    bytes: u64,
}

impl Default for Router<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'s> Router<'s> {
    pub fn new() -> Self {
        Self {
            routes: AHashMap::new(),
            progress: None,
            lines: 0,
            bytes: 0,
        }
    }

    /// Register a target for a table. A table may get several targets; each
    /// sees every record of the table and applies its own filter.
    pub fn add_target(
        &mut self,
        schema: Arc<TableSchema>,
        label: impl Into<String>,
        filter: Option<RecordFilter>,
        sink: impl RecordSink + 's,
    ) -> Result<()> {
        if let Some(f) = &filter {
            f.validate(&schema)?;
        }
        let target = Target::new(label, filter, sink);
        let route = self
            .routes
            .entry(schema.name().to_string())
            .or_insert_with(|| Route {
                schema: Arc::clone(&schema),
                targets: Vec::new(),
                stats: TableStats::default(),
            });
        if route.schema != schema {
            debug!(
                "Router: schema for {} replaced by a later registration",
                schema.name()
            );
            route.schema = schema;
        }
        route.targets.push(target);
        Ok(())
    }

    pub fn set_progress(&mut self, progress: RowProgress<'s>) {
        self.progress = Some(progress);
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }

    /// Route one dump line. Returns `None` when the line is not an INSERT
    /// into a registered table.
    pub fn route(&mut self, line: &str) -> Result<Option<LineOutcome>> {
        self.lines += 1;
        self.bytes += line.len() as u64;

        let Some(cap) = INSERT_RE.captures(line) else {
            return Ok(None);
        };
        let (Some(name), Some(whole)) = (cap.get(1), cap.get(0)) else {
            return Ok(None);
        };
        let Some(route) = self.routes.get_mut(name.as_str()) else {
            return Ok(None);
        };

        let payload = line[whole.end()..].trim();
        let payload = payload.strip_suffix(';').unwrap_or(payload);

        route.stats.statements += 1;
        let mut outcome = LineOutcome::default();
        let mut tuples = split_tuples(payload);
        for body in tuples.by_ref() {
            let values = lexer::lex(body);
            let got = values.len();
            let Some(record) = Record::new(Arc::clone(&route.schema), values) else {
                debug!(
                    "Router: skip row in {} line {} (expected {}, got {})",
                    route.schema.name(),
                    self.lines,
                    route.schema.len(),
                    got
                );
                route.stats.dropped += 1;
                outcome.dropped += 1;
                continue;
            };
            route.stats.rows += 1;
            outcome.rows += 1;
            for target in &mut route.targets {
                if target.offer(&record)? {
                    route.stats.written += 1;
                } else {
                    route.stats.filtered += 1;
                }
            }
            if let Some(progress) = self.progress.as_mut() {
                progress.tick();
            }
        }
        if tuples.is_truncated() {
            warn!(
                "Router: line {} ends inside an unclosed tuple for {}; partial tuple discarded",
                self.lines,
                route.schema.name()
            );
            route.stats.truncated += 1;
            outcome.truncated = true;
        }
        Ok(Some(outcome))
    }

    /// Snapshot of the counters so far.
    pub fn stats(&self) -> ExtractStats {
        ExtractStats {
            lines: self.lines,
            bytes: self.bytes,
            tables: self
                .routes
                .iter()
                .map(|(name, route)| (name.clone(), route.stats.clone()))
                .collect(),
        }
    }

    /// Finish every sink (flushes writers) and return the final counters.
    pub fn finish(&mut self) -> Result<ExtractStats> {
        for route in self.routes.values_mut() {
            for target in &mut route.targets {
                target.finish()?;
                debug!(
                    "Router: {} -> {}: written={} filtered={}",
                    route.schema.name(),
                    target.label(),
                    target.written(),
                    target.filtered()
                );
            }
        }
        Ok(self.stats())
    }
}

/// Stream a dump through the router line by line.
///
/// Only one line is held in memory at a time. Invalid UTF-8 is replaced rather
/// than rejected. Input errors are fatal; whatever sinks already wrote stays.
pub fn route_reader<R: BufRead>(
    mut reader: R,
    router: &mut Router<'_>,
    bar: Option<&indicatif::ProgressBar>,
) -> Result<()> {
    let mut raw = Vec::new();
    let mut bytes_read: u64 = 0;
    let mut last_logged: u64 = 0;
    loop {
        raw.clear();
        let n = reader.read_until(b'\n', &mut raw)?;
        if n == 0 {
            break;
        }
        bytes_read += n as u64;
        if let Some(b) = bar {
            b.inc(n as u64);
        } else if logger::is_debug() && bytes_read - last_logged > 100 * 1024 * 1024 {
            debug!("RouteReader: {} bytes read", bytes_read);
            last_logged = bytes_read;
        }
        let line = String::from_utf8_lossy(&raw);
        router.route(&line)?;
    }
    Ok(())
}

pub fn route_file(
    filename: &str,
    router: &mut Router<'_>,
    bar: Option<&indicatif::ProgressBar>,
) -> Result<()> {
    debug!("RouteFile: Opening file {}", filename);
    let file = File::open(filename)?;
    route_reader(BufReader::with_capacity(1024 * 1024, file), router, bar)?;
    if let Some(b) = bar {
        b.finish();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ScalarValue;
    use crate::sink::IndexSink;
    use std::io::Cursor;

    fn schema(name: &str, columns: &[&str]) -> Arc<TableSchema> {
        Arc::new(
            TableSchema::new(name, columns.iter().map(|c| c.to_string()).collect()).unwrap(),
        )
    }

    fn collecting<'a>(rows: &'a mut Vec<Vec<ScalarValue>>) -> impl RecordSink + 'a {
        move |r: &Record| -> Result<()> {
            rows.push(r.values().to_vec());
            Ok(())
        }
    }

    fn text(s: &str) -> ScalarValue {
        ScalarValue::Text(s.to_string())
    }

    #[test]
    fn routes_multi_row_insert() {
        let mut rows = Vec::new();
        let outcome = {
            let mut router = Router::new();
            router
                .add_target(schema("t", &["id", "x", "y"]), "t", None, collecting(&mut rows))
                .unwrap();
            router
                .route("INSERT INTO `t` VALUES (1,'a,b','c\\'d'),(2,NULL,'e');\n")
                .unwrap()
        };
        assert_eq!(
            outcome,
            Some(LineOutcome {
                rows: 2,
                dropped: 0,
                truncated: false
            })
        );
        assert_eq!(
            rows,
            vec![
                vec![text("1"), text("a,b"), text("c\\'d")],
                vec![text("2"), ScalarValue::Null, text("e")],
            ]
        );
    }

    #[test]
    fn table_name_prefix_does_not_match() {
        let mut rows = Vec::new();
        {
            let mut router = Router::new();
            router
                .add_target(schema("posts", &["id"]), "posts", None, collecting(&mut rows))
                .unwrap();
            let hit = router
                .route("INSERT INTO `postmeta` VALUES (1),(2);")
                .unwrap();
            assert!(hit.is_none());
            let hit = router.route("INSERT INTO `posts` VALUES (3);").unwrap();
            assert!(hit.is_some());
        }
        assert_eq!(rows, vec![vec![text("3")]]);
    }

    #[test]
    fn non_insert_lines_are_ignored() {
        let mut router = Router::new();
        router
            .add_target(schema("t", &["id"]), "t", None, |_: &Record| -> Result<()> {
                panic!("no record expected")
            })
            .unwrap();
        for line in [
            "-- comment",
            "LOCK TABLES `t` WRITE;",
            "/*!40000 ALTER TABLE `t` DISABLE KEYS */;",
            "",
        ] {
            assert!(router.route(line).unwrap().is_none());
        }
        assert_eq!(router.stats().lines, 4);
    }

    #[test]
    fn mismatched_tuples_are_dropped() {
        let mut rows = Vec::new();
        let stats = {
            let mut router = Router::new();
            router
                .add_target(schema("t", &["a", "b", "c"]), "t", None, collecting(&mut rows))
                .unwrap();
            router
                .route("INSERT INTO `t` VALUES (1,2),(1,2,3),(1,2,3,4);")
                .unwrap();
            router.finish().unwrap()
        };
        assert_eq!(rows.len(), 1);
        let t = &stats.tables["t"];
        assert_eq!((t.rows, t.dropped, t.written), (1, 2, 1));
    }

    #[test]
    fn truncated_line_keeps_complete_tuples() {
        let mut rows = Vec::new();
        let outcome = {
            let mut router = Router::new();
            router
                .add_target(schema("t", &["a", "b"]), "t", None, collecting(&mut rows))
                .unwrap();
            router
                .route("INSERT INTO `t` VALUES (1,'x'),(2,'unterminated")
                .unwrap()
        };
        assert_eq!(
            outcome,
            Some(LineOutcome {
                rows: 1,
                dropped: 0,
                truncated: true
            })
        );
        assert_eq!(rows, vec![vec![text("1"), text("x")]]);
    }

    #[test]
    fn targets_fan_out_with_filters() {
        let posts = schema("wp_posts", &["ID", "post_type"]);
        let mut published = IndexSink::new("ID");
        let mut attachments = IndexSink::new("ID");
        let stats = {
            let mut router = Router::new();
            router
                .add_target(
                    Arc::clone(&posts),
                    "posts",
                    Some(RecordFilter::new().require("post_type", "post")),
                    |r: &Record| published.accept(r),
                )
                .unwrap();
            router
                .add_target(
                    posts,
                    "attachments",
                    Some(RecordFilter::new().require("post_type", "attachment")),
                    |r: &Record| attachments.accept(r),
                )
                .unwrap();
            router
                .route("INSERT INTO `wp_posts` VALUES (1,'post'),(2,'attachment'),(3,'page');")
                .unwrap();
            router.finish().unwrap()
        };
        assert!(published.get("1").is_some());
        assert_eq!(published.len(), 1);
        assert!(attachments.get("2").is_some());
        assert_eq!(attachments.len(), 1);
        let t = &stats.tables["wp_posts"];
        assert_eq!((t.rows, t.written, t.filtered), (3, 2, 4));
    }

    #[test]
    fn unknown_filter_column_is_rejected() {
        let mut router = Router::new();
        let err = router
            .add_target(
                schema("t", &["a"]),
                "t",
                Some(RecordFilter::new().require("b", "1")),
                |_: &Record| -> Result<()> { Ok(()) },
            )
            .unwrap_err();
        assert!(err.to_string().contains("no column `b`"));
    }

    #[test]
    fn progress_callback_counts_rows() {
        let mut ticks = Vec::new();
        {
            let mut router = Router::new();
            router
                .add_target(schema("t", &["a"]), "t", None, |_: &Record| -> Result<()> {
                    Ok(())
                })
                .unwrap();
            router.set_progress(RowProgress::new(2, |rows| ticks.push(rows)));
            let dump = "INSERT INTO `t` VALUES (1),(2),(3);\nINSERT INTO `t` VALUES (4),(5,6);\n";
            route_reader(Cursor::new(dump), &mut router, None).unwrap();
        }
        assert_eq!(ticks, vec![2, 4]);
    }

    #[test]
    fn reader_replaces_invalid_utf8() {
        let mut rows = Vec::new();
        {
            let mut router = Router::new();
            router
                .add_target(schema("t", &["a"]), "t", None, collecting(&mut rows))
                .unwrap();
            let mut dump = b"INSERT INTO `t` VALUES ('caf".to_vec();
            dump.push(0xff);
            dump.extend_from_slice(b"');\n");
            route_reader(Cursor::new(dump), &mut router, None).unwrap();
        }
        assert_eq!(rows, vec![vec![text("caf\u{fffd}")]]);
    }
}
