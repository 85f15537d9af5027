use serde_json::{json, Value};
use sqldump_extract::{
    lex, route_file, split_tuples, Error, ExtractPlan, Record, Router, ScalarValue,
    SchemaCatalog, SchemaParser, TableSchema,
};
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

const DUMP: &str = r#"-- MySQL dump 10.13
/*!40101 SET NAMES utf8mb4 */;
DROP TABLE IF EXISTS `wp_posts`;
CREATE TABLE `wp_posts` (
  `ID` bigint(20) unsigned NOT NULL AUTO_INCREMENT,
  `post_author` bigint(20) unsigned NOT NULL DEFAULT '0',
  `post_title` text NOT NULL,
  `post_content` longtext NOT NULL,
  `post_status` varchar(20) NOT NULL DEFAULT 'publish',
  `post_type` varchar(20) NOT NULL DEFAULT 'post',
  PRIMARY KEY (`ID`)
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;
CREATE TABLE `wp_postmeta` (
  `meta_id` bigint(20) unsigned NOT NULL AUTO_INCREMENT,
  `post_id` bigint(20) unsigned NOT NULL DEFAULT '0',
  `meta_key` varchar(255) DEFAULT NULL,
  `meta_value` longtext,
  PRIMARY KEY (`meta_id`)
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;
CREATE TABLE `wp_users` (
  `ID` bigint(20) unsigned NOT NULL AUTO_INCREMENT,
  `display_name` varchar(250) NOT NULL DEFAULT '',
  PRIMARY KEY (`ID`)
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;
LOCK TABLES `wp_posts` WRITE;
INSERT INTO `wp_posts` VALUES (1,1,'Hello, world','<p>f(x) = (a, b)</p>','publish','post'),(2,1,'It\'s a photo','','inherit','attachment'),(3,2,'Draft','x','draft','post');
INSERT INTO `wp_posts` VALUES (4,2,'Broken row','publish','post');
UNLOCK TABLES;
INSERT INTO `wp_postmeta` VALUES (1,1,'_thumbnail_id','2'),(2,1,'_edit_last',NULL),(3,3,'_wp_old_slug','draft');
INSERT INTO `wp_users` VALUES (1,'Redacción'),(2,'O\'Brien');
INSERT INTO `wp_comments` VALUES (1,'ignored');
"#;

fn write_dump(dir: &Path, contents: &str) -> String {
    let path = dir.join("dump.sql");
    let mut file = fs::File::create(&path).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    path.to_string_lossy().into_owned()
}

fn read_lines(path: &Path) -> Vec<Value> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

fn plan() -> ExtractPlan {
    serde_json::from_value(json!({
        "tables": [
            {"table": "wp_posts", "outputs": [
                {"file": "posts.jsonl", "filter": {"post_type": ["post"], "post_status": ["publish"]}},
                {"file": "attachments.jsonl", "filter": {"post_type": ["attachment"]}}
            ]},
            {"table": "wp_postmeta", "outputs": [
                {"file": "postmeta.jsonl", "filter": {"meta_key": ["_thumbnail_id", "_edit_last"]}}
            ]},
            {"table": "wp_users"}
        ]
    }))
    .unwrap()
}

fn run(dump: &str, out_dir: &Path) -> sqldump_extract::ExtractStats {
    let catalog = SchemaParser::new().parse_file(dump, None, None).unwrap();
    let mut router = plan().build_router(&catalog, out_dir).unwrap();
    route_file(dump, &mut router, None).unwrap();
    router.finish().unwrap()
}

#[test]
fn extracts_filtered_tables_in_one_pass() {
    let dir = tempfile::tempdir().unwrap();
    let dump = write_dump(dir.path(), DUMP);
    let out = dir.path().join("out");
    let stats = run(&dump, &out);

    let posts = read_lines(&out.join("posts.jsonl"));
    assert_eq!(
        posts,
        vec![json!({
            "ID": "1",
            "post_author": "1",
            "post_title": "Hello, world",
            "post_content": "<p>f(x) = (a, b)</p>",
            "post_status": "publish",
            "post_type": "post"
        })]
    );

    let attachments = read_lines(&out.join("attachments.jsonl"));
    assert_eq!(attachments.len(), 1);
    assert_eq!(attachments[0]["post_title"], json!("It\\'s a photo"));

    let meta = read_lines(&out.join("postmeta.jsonl"));
    assert_eq!(meta.len(), 2);
    assert_eq!(meta[1]["meta_value"], Value::Null);

    let users = read_lines(&out.join("wp_users.jsonl"));
    assert_eq!(users[0]["display_name"], json!("Redacción"));
    assert_eq!(users[1]["display_name"], json!("O\\'Brien"));

    assert!(!out.join("wp_comments.jsonl").exists());

    let posts_stats = &stats.tables["wp_posts"];
    assert_eq!(posts_stats.statements, 2);
    assert_eq!(posts_stats.rows, 3);
    assert_eq!(posts_stats.dropped, 1);
    assert_eq!(posts_stats.written, 2);
    assert_eq!(stats.tables["wp_users"].written, 2);
    assert!(!stats.tables.contains_key("wp_comments"));
}

#[test]
fn rerun_produces_identical_output() {
    let dir = tempfile::tempdir().unwrap();
    let dump = write_dump(dir.path(), DUMP);
    let first = dir.path().join("first");
    let second = dir.path().join("second");
    let stats_a = run(&dump, &first);
    let stats_b = run(&dump, &second);
    assert_eq!(stats_a, stats_b);
    for file in ["posts.jsonl", "attachments.jsonl", "postmeta.jsonl", "wp_users.jsonl"] {
        assert_eq!(
            fs::read(first.join(file)).unwrap(),
            fs::read(second.join(file)).unwrap(),
            "{} differs between runs",
            file
        );
    }
}

#[test]
fn scenario_line_yields_two_records() {
    let schema = Arc::new(
        TableSchema::new("t", vec!["id".into(), "x".into(), "y".into()]).unwrap(),
    );
    let mut records = Vec::new();
    {
        let mut router = Router::new();
        router
            .add_target(schema, "t", None, |r: &Record| -> sqldump_extract::Result<()> {
                records.push(serde_json::to_value(r).unwrap());
                Ok(())
            })
            .unwrap();
        router
            .route(r"INSERT INTO `t` VALUES (1,'a,b','c\'d'),(2,NULL,'e');")
            .unwrap();
        router.route("INSERT INTO `t` VALUES (1,2);").unwrap();
    }
    assert_eq!(
        records,
        vec![
            json!({"id": "1", "x": "a,b", "y": "c\\'d"}),
            json!({"id": "2", "x": null, "y": "e"}),
        ]
    );
}

#[test]
fn split_then_lex_matches_manual_reading() {
    let payload = r"(1,'f(x)=1'),(),( 'NULL' , null ,'a\\b'),(7,'(,)')";
    let rows: Vec<Vec<ScalarValue>> = split_tuples(payload).map(lex).collect();
    let t = |s: &str| ScalarValue::Text(s.to_string());
    assert_eq!(
        rows,
        vec![
            vec![t("1"), t("f(x)=1")],
            vec![t("")],
            vec![t("NULL"), ScalarValue::Null, t(r"a\\b")],
            vec![t("7"), t("(,)")],
        ]
    );
}

#[test]
fn schema_file_round_trips_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let dump = write_dump(dir.path(), DUMP);
    let catalog = SchemaParser::new().parse_file(&dump, None, None).unwrap();
    let path = dir.path().join("schema.json");
    catalog.save(fs::File::create(&path).unwrap()).unwrap();
    let loaded = SchemaCatalog::load(&path).unwrap();
    assert_eq!(loaded, catalog);
    assert_eq!(
        loaded.names().collect::<Vec<_>>(),
        vec!["wp_postmeta", "wp_posts", "wp_users"]
    );
}

#[test]
fn missing_input_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.sql");
    let mut router = Router::new();
    let err = route_file(&missing.to_string_lossy(), &mut router, None).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}
