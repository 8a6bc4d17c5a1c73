//! entity-sql CLI - writes datasets as SQL scripts or into a live database
//!
//! Status messages go to stderr, so a script written to stdout can be piped
//! into a database client.

use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

use entity_sql::context::{GenerationConfig, GenerationContext};
use entity_sql::dataset::{Dataset, DatasetPlan};
use entity_sql::dialect::DialectKind;
use entity_sql::writer::ScriptWriter;

#[derive(Parser)]
#[command(name = "entity-sql")]
#[command(version, about = "Generate SQL inserts for entity datasets", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a SQL script that inserts the dataset
    Script {
        /// Path to the dataset (YAML or JSON)
        #[arg(short, long)]
        dataset: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// SQL dialect (postgres, mysql, oracle)
        #[arg(long)]
        dialect: Option<String>,

        /// Write literal ids instead of ids relative to the database counters
        #[arg(long)]
        absolute_ids: bool,
    },

    /// Insert the dataset into a database
    Execute {
        /// Path to the dataset (YAML or JSON)
        #[arg(short, long)]
        dataset: PathBuf,

        /// Database URL (default: DATABASE_URL)
        #[arg(long)]
        database_url: Option<String>,

        /// SQL dialect (postgres, mysql, oracle)
        #[arg(long)]
        dialect: Option<String>,

        /// Fail if a generator can't be read from the database
        #[arg(long)]
        strict_sync: bool,
    },

    /// Check a dataset without writing anything
    Validate {
        /// Path to the dataset (YAML or JSON)
        #[arg(short, long)]
        dataset: PathBuf,
    },
}

fn main() {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Script { dataset, output, dialect, absolute_ids } => {
            write_script(dataset, output, dialect, absolute_ids)
        }
        Commands::Execute { dataset, database_url, dialect, strict_sync } => {
            execute_dataset(dataset, database_url, dialect, strict_sync)
        }
        Commands::Validate { dataset } => validate_dataset(dataset),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Determine the dialect with precedence: CLI > ENV > DATABASE_URL > default
fn detect_dialect(cli_override: Option<String>, database_url: Option<&str>) -> Result<DialectKind, String> {
    // 1. CLI flag (highest priority)
    if let Some(name) = cli_override {
        let dialect = DialectKind::parse(&name).ok_or_else(|| {
            format!(
                "Unsupported dialect: '{}'. Supported dialects: postgres, mysql, oracle",
                name
            )
        })?;
        eprintln!("  ℹ Using dialect from CLI flag: {}", dialect);
        return Ok(dialect);
    }

    // 2. Environment variable ENTITY_SQL_DIALECT
    if let Ok(name) = std::env::var("ENTITY_SQL_DIALECT") {
        if let Some(dialect) = DialectKind::parse(&name) {
            eprintln!("  ℹ Using dialect from ENTITY_SQL_DIALECT: {}", dialect);
            return Ok(dialect);
        }
        eprintln!("  ⚠ Ignoring unsupported ENTITY_SQL_DIALECT: {}", name);
    }

    // 3. Scheme of the database URL
    if let Some(url) = database_url {
        if let Some(dialect) = url.split("://").next().and_then(DialectKind::parse) {
            eprintln!("  ℹ Detected dialect from database URL: {}", dialect);
            return Ok(dialect);
        }
    }

    // 4. Default
    Ok(DialectKind::default())
}

fn load_dataset(path: &Path) -> Result<Dataset, String> {
    eprintln!("📖 Loading dataset {}...", path.display());
    let dataset = Dataset::load_from_file(path).map_err(|e| e.to_string())?;
    eprintln!(
        "  ✓ {} entities, {} rows",
        dataset.entities.len(),
        dataset.rows.len()
    );
    Ok(dataset)
}

/// Write the dataset as SQL script
fn write_script(
    dataset_path: PathBuf,
    output: Option<PathBuf>,
    dialect: Option<String>,
    absolute_ids: bool,
) -> Result<(), String> {
    let dataset = load_dataset(&dataset_path)?;
    let config = GenerationConfig {
        write_relative_ids: !absolute_ids,
        dialect: detect_dialect(dialect, None)?,
        ..GenerationConfig::default()
    };
    let mut context = GenerationContext::new(config);
    let mut plan = DatasetPlan::prepare(&dataset, &mut context).map_err(|e| e.to_string())?;

    let sink: Box<dyn Write> = match &output {
        Some(path) => Box::new(BufWriter::new(File::create(path).map_err(|e| {
            format!("Failed to create {}: {}", path.display(), e)
        })?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };
    let mut writer = ScriptWriter::new(sink, &context);
    plan.write_rows(&mut writer).map_err(|e| e.to_string())?;
    let count = writer.statements_count();
    writer.close(&context).map_err(|e| e.to_string())?;

    match output {
        Some(path) => eprintln!("✅ Wrote {} statements to {}", count, path.display()),
        None => eprintln!("✅ Wrote {} statements", count),
    }
    Ok(())
}

/// Insert the dataset into the database
#[cfg(any(feature = "postgres", feature = "mysql"))]
fn execute_dataset(
    dataset_path: PathBuf,
    database_url: Option<String>,
    dialect: Option<String>,
    strict_sync: bool,
) -> Result<(), String> {
    use entity_sql::diesel_runtime::Database;
    use entity_sql::writer::ConnectedWriter;

    let dataset = load_dataset(&dataset_path)?;
    let database_url = database_url
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .ok_or_else(|| "No database URL given and DATABASE_URL is not set".to_string())?;

    let config = GenerationConfig {
        write_relative_ids: false,
        dialect: detect_dialect(dialect, Some(&database_url))?,
        strict_generator_sync: strict_sync,
        ..GenerationConfig::default()
    };
    let mut context = GenerationContext::new(config);
    let mut plan = DatasetPlan::prepare(&dataset, &mut context).map_err(|e| e.to_string())?;

    eprintln!("🔌 Connecting to database...");
    let mut database = Database::new(&database_url).map_err(|e| e.to_string())?;
    let mut writer = ConnectedWriter::new(&mut database, &context).map_err(|e| e.to_string())?;
    plan.write_rows(&mut writer).map_err(|e| e.to_string())?;
    let count = writer.close(&context).map_err(|e| e.to_string())?;

    eprintln!("✅ Executed {} statements", count);
    Ok(())
}

#[cfg(not(any(feature = "postgres", feature = "mysql")))]
fn execute_dataset(
    _dataset_path: PathBuf,
    _database_url: Option<String>,
    _dialect: Option<String>,
    _strict_sync: bool,
) -> Result<(), String> {
    Err("entity-sql was built without a database backend (features: postgres, mysql)".to_string())
}

/// Run the dataset against a discarded script to report all errors
fn validate_dataset(dataset_path: PathBuf) -> Result<(), String> {
    let dataset = load_dataset(&dataset_path)?;
    let mut context = GenerationContext::new(GenerationConfig::default());
    let mut plan = DatasetPlan::prepare(&dataset, &mut context).map_err(|e| e.to_string())?;

    let mut writer = ScriptWriter::new(io::sink(), &context);
    let inserted = plan.write_rows(&mut writer).map_err(|e| e.to_string())?;
    writer.close(&context).map_err(|e| e.to_string())?;

    eprintln!("✅ Dataset is valid ({} rows to insert)", inserted);
    Ok(())
}
