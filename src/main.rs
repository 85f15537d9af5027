// sqldump-extract: pull table rows out of a mysqldump file as JSON lines.
// `schema` discovers column lists, `extract` streams INSERT rows to files.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use log::{debug, info};
use sqldump_extract::{
    logger, route_file, ExtractPlan, ExtractStats, FilterExpr, ProgressManager, RowProgress,
    SchemaCatalog, SchemaParser,
};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Instant;

// Command-line flags and positional arguments.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Enable debug logging (disables progress bars).
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the column list of every CREATE TABLE as JSON.
    Schema {
        /// Dump file path.
        dump: String,

        /// Write the schema JSON here instead of stdout.
        #[arg(long, short = 'o')]
        output: Option<String>,

        /// Only these tables (repeatable).
        #[arg(long = "table")]
        tables: Vec<String>,
    },

    /// Write the rows of selected tables as JSON lines, one file per output.
    Extract(ExtractArgs),
}

#[derive(clap::Args, Debug)]
struct ExtractArgs {
    /// Dump file path.
    dump: String,

    /// Directory for the .jsonl outputs (created if missing).
    #[arg(long, short = 'o')]
    out_dir: String,

    /// Schema JSON from `schema`. If omitted, the dump is scanned for it first.
    #[arg(long)]
    schema: Option<String>,

    /// Extraction plan JSON (tables, output files, filters).
    #[arg(long, conflicts_with_all = ["tables", "filters"])]
    plan: Option<String>,

    /// Table to extract (repeatable). Default: every table in the schema.
    #[arg(long = "table")]
    tables: Vec<String>,

    /// Keep only rows where the column equals the value (repeatable).
    #[arg(long = "filter", value_name = "TABLE.COLUMN=VALUE")]
    filters: Vec<FilterExpr>,

    /// Log a progress line every N rows (0 = off).
    #[arg(long, default_value_t = 0)]
    progress_every: u64,

    /// Write per-table counters as JSON to this file.
    #[arg(long)]
    stats_json: Option<String>,
}

fn main() -> Result<()> {
    if std::env::args().len() == 1 {
        Args::command().print_help()?;
        eprintln!();
        std::process::exit(1);
    }
    let args = Args::parse();

    logger::init(args.debug);

    // Progress bars are disabled in debug mode to avoid mangled output.
    let progress = ProgressManager::new(!args.debug);

    match args.command {
        Command::Schema {
            dump,
            output,
            tables,
        } => run_schema(&dump, output.as_deref(), tables, &progress),
        Command::Extract(extract) => run_extract(extract, &progress),
    }
}

fn run_schema(
    dump: &str,
    output: Option<&str>,
    tables: Vec<String>,
    progress: &ProgressManager,
) -> Result<()> {
    let only: Option<ahash::AHashSet<String>> =
        (!tables.is_empty()).then(|| tables.into_iter().collect());
    let bar = progress.new_file_bar(dump, &format!("Schema {}", basename(dump)));
    let catalog = SchemaParser::new()
        .parse_file(dump, only.as_ref(), bar.as_ref())
        .with_context(|| format!("reading schema from {}", dump))?;
    info!("Found {} tables in {}", catalog.len(), dump);

    match output {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("creating {}", path))?;
            catalog.save(BufWriter::new(file))?;
        }
        None => catalog.save(io::stdout().lock())?,
    }
    Ok(())
}

fn run_extract(args: ExtractArgs, progress: &ProgressManager) -> Result<()> {
    let start = Instant::now();

    let mut plan = match &args.plan {
        Some(path) => {
            ExtractPlan::load(path).with_context(|| format!("loading plan {}", path))?
        }
        None => ExtractPlan::from_tables(args.tables.iter().cloned(), &args.filters),
    };

    let catalog = match &args.schema {
        Some(path) => {
            SchemaCatalog::load(path).with_context(|| format!("loading schema {}", path))?
        }
        None => {
            let only = (!plan.tables.is_empty()).then(|| plan.table_names());
            let bar = progress.new_file_bar(&args.dump, &format!("Schema {}", basename(&args.dump)));
            SchemaParser::new()
                .parse_file(&args.dump, only.as_ref(), bar.as_ref())
                .with_context(|| format!("reading schema from {}", args.dump))?
        }
    };
    debug!(
        "main: schema ready ({} tables) after {:?}",
        catalog.len(),
        start.elapsed()
    );

    if plan.tables.is_empty() {
        plan = ExtractPlan::from_tables(catalog.names(), &[]);
    }
    if plan.tables.is_empty() {
        anyhow::bail!("no tables to extract: the schema is empty");
    }

    let mut router = plan
        .build_router(&catalog, Path::new(&args.out_dir))
        .context("preparing outputs")?;
    if args.progress_every > 0 {
        router.set_progress(RowProgress::new(args.progress_every, |rows| {
            info!("Processed {} rows...", rows)
        }));
    }

    let bar = progress.new_file_bar(&args.dump, &format!("Extract {}", basename(&args.dump)));
    route_file(&args.dump, &mut router, bar.as_ref())
        .with_context(|| format!("extracting from {}", args.dump))?;
    let stats = router.finish().context("flushing outputs")?;
    debug!("main: extraction took {:?}", start.elapsed());

    if let Some(path) = &args.stats_json {
        let json = serde_json::to_string_pretty(&stats)?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path))?;
    }
    print_summary(&stats)?;
    Ok(())
}

fn print_summary(stats: &ExtractStats) -> Result<()> {
    let sep = "=".repeat(60);
    let mut stderr = io::stderr();
    writeln!(stderr, "\n{}\nSUMMARY\n{}", sep, sep)?;
    for (table, t) in &stats.tables {
        writeln!(
            stderr,
            "{:<28} rows={} written={} filtered={} dropped={} truncated={}",
            table, t.rows, t.written, t.filtered, t.dropped, t.truncated
        )?;
    }
    writeln!(stderr, "{}", sep)?;
    writeln!(stderr, "Lines:     {}", stats.lines)?;
    writeln!(stderr, "Rows:      {}", stats.rows())?;
    writeln!(stderr, "Written:   {}", stats.written())?;
    writeln!(stderr, "Dropped:   {}", stats.dropped())?;
    writeln!(stderr, "Truncated: {}", stats.truncated())?;
    writeln!(stderr, "{}", sep)?;
    Ok(())
}

fn basename(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string()
}
