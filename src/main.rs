mod db;
mod parser;
mod render;
mod scraper;
mod settings;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use parser::blocks::ContentBlock;
use parser::schema::Schema;
use parser::units::Classifier;
use render::vault::{Mode, Vault};
use settings::Settings;

#[derive(Parser)]
#[command(name = "botapi_schema", about = "Bot API reference page to typed schema")]
struct Cli {
    /// Only headings of this level open definitions, 0 for any (overrides settings)
    #[arg(long, global = true)]
    definition_level: Option<u8>,
    /// SQLite cache file (overrides settings)
    #[arg(long, global = true)]
    db: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Retrieve the reference page and store a snapshot
    Fetch,
    /// Build the schema and write it as JSON
    Export {
        /// Markdown page or JSON block list (default: latest snapshot)
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Output file (default: <output_dir>/botapi.json)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Build the schema and write one note per entity
    Vault {
        /// Markdown page or JSON block list (default: latest snapshot)
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Vault directory (default: <output_dir>/vault)
        #[arg(short, long)]
        path: Option<PathBuf>,
        /// Only rewrite notes that already exist
        #[arg(short, long)]
        update: bool,
    },
    /// Build the schema and report counts and failures
    Check {
        /// Markdown page or JSON block list (default: latest snapshot)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
    /// Show cache statistics
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let mut settings = Settings::load()?;
    if let Some(level) = cli.definition_level {
        settings.definition_level = level;
    }
    if let Some(db) = cli.db {
        settings.db_path = db;
    }

    let result = match cli.command {
        Commands::Fetch => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            println!("Fetching {}...", settings.page_url);
            let row = scraper::fetch_page(&settings).await?;
            let id = db::save_snapshot(&conn, &row)?;
            match (&row.error, &row.markdown) {
                (None, Some(md)) => {
                    println!("Stored snapshot #{} ({} bytes)", id, md.len());
                    Ok(())
                }
                (Some(e), _) => Err(anyhow::anyhow!(
                    "Fetch failed (attempt stored as #{}): {}",
                    id,
                    e
                )),
                (None, None) => Err(anyhow::anyhow!(
                    "Fetch returned no content (attempt stored as #{})",
                    id
                )),
            }
        }
        Commands::Export { input, out } => {
            let schema = run_pipeline(&settings, input.as_deref())?;
            let out = out.unwrap_or_else(|| Path::new(&settings.output_dir).join("botapi.json"));
            if let Some(dir) = out.parent().filter(|d| !d.as_os_str().is_empty()) {
                fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create {}", dir.display()))?;
            }
            fs::write(&out, render::json::export(&schema)?)
                .with_context(|| format!("Failed to write {}", out.display()))?;
            println!("Wrote {}", out.display());
            Ok(())
        }
        Commands::Vault { input, path, update } => {
            let schema = run_pipeline(&settings, input.as_deref())?;
            let path = path.unwrap_or_else(|| Path::new(&settings.output_dir).join("vault"));
            let mode = if update { Mode::Update } else { Mode::Create };
            let stats = Vault::new(&path, mode).write(&schema)?;
            println!(
                "Vault {}: {} notes written, {} skipped",
                path.display(),
                stats.written,
                stats.skipped
            );
            Ok(())
        }
        Commands::Check { input } => run_pipeline(&settings, input.as_deref()).map(|_| ()),
        Commands::Stats => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Snapshots:    {}", s.snapshots);
            println!("Fetch errors: {}", s.fetch_errors);
            println!("Runs:         {}", s.runs);
            println!("Last fetch:   {}", s.last_fetch.as_deref().unwrap_or("-"));
            if let Some(run) = s.last_run {
                println!(
                    "Last run:     snapshot #{}: {} types, {} methods, {} primitives, {} failures",
                    run.snapshot_id, run.types, run.methods, run.primitives, run.failures
                );
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

/// Where the page came from: a local file or a cached snapshot.
struct Input {
    page: Page,
    snapshot_id: Option<i64>,
}

enum Page {
    Markdown(String),
    Blocks(Vec<ContentBlock>),
}

fn load_input(settings: &Settings, path: Option<&Path>) -> anyhow::Result<Input> {
    if let Some(path) = path {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let page = if path.extension().is_some_and(|ext| ext == "json") {
            let blocks = serde_json::from_str(&text)
                .with_context(|| format!("Invalid block list in {}", path.display()))?;
            Page::Blocks(blocks)
        } else {
            Page::Markdown(text)
        };
        return Ok(Input {
            page,
            snapshot_id: None,
        });
    }

    let conn = db::connect(&settings.db_path)?;
    db::init_schema(&conn)?;
    let Some(snapshot) = db::latest_snapshot(&conn, &settings.page_url)? else {
        bail!("No cached snapshot of {}. Run 'fetch' first or pass --input.", settings.page_url);
    };
    info!(
        id = snapshot.id,
        url = %snapshot.url,
        fetched_at = %snapshot.fetched_at,
        "using cached snapshot"
    );
    Ok(Input {
        page: Page::Markdown(snapshot.markdown),
        snapshot_id: Some(snapshot.id),
    })
}

fn run_pipeline(settings: &Settings, path: Option<&Path>) -> anyhow::Result<Schema> {
    let input = load_input(settings, path)?;
    let classifier = match settings.definition_level {
        0 => Classifier::new(),
        level => Classifier::with_definition_level(level),
    };

    let t_parse = Instant::now();
    let schema = match &input.page {
        Page::Markdown(md) => parser::process_page(&classifier, md)?,
        Page::Blocks(blocks) => parser::process_blocks(&classifier, blocks)?,
    };
    info!(elapsed_ms = t_parse.elapsed().as_millis() as u64, "schema assembled");

    print_summary(&schema);

    if let Some(snapshot_id) = input.snapshot_id {
        let conn = db::connect(&settings.db_path)?;
        db::save_run(
            &conn,
            &db::RunRow {
                snapshot_id,
                types: schema.type_count(),
                methods: schema.method_count(),
                primitives: schema.primitives.len(),
                failures: schema.failures.len(),
            },
        )?;
    }

    Ok(schema)
}

fn print_summary(schema: &Schema) {
    println!("Api types overall:   {}", schema.type_count());
    println!("Api methods overall: {}", schema.method_count());
    println!("Primitives:          {}", schema.primitives.len());

    if !schema.failures.is_empty() {
        eprintln!("\n--- Failures ({}) ---", schema.failures.len());
        for failure in &schema.failures {
            warn!(entity = %failure.entity, error = %failure.error, "entity failed");
            eprintln!("  {}: {}", failure.entity, failure.error);
        }
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
