use std::fs;
use std::io;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use interlinear::config::Config;
use interlinear::db::Database;
use interlinear::formats::{self, ReaderRegistry, WriterRegistry};
use interlinear::render;

#[derive(Parser)]
#[command(name = "ilx")]
#[command(about = "Convert interlinear glossed text through a feature store")]
struct Cli {
    /// Database file (defaults to the per-user data directory)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a document into the store
    Import {
        /// Reader identifier, e.g. flextext
        format: String,
        infile: PathBuf,
    },
    /// Export the store as a document
    Export {
        /// Writer identifier, e.g. flextext
        format: String,
        /// Output file, or - for stdout
        outfile: PathBuf,

        /// Level to use as the top of the exported tree
        #[arg(long)]
        root: Option<String>,

        /// Level to leave out (repeatable)
        #[arg(long)]
        skip: Vec<String>,
    },
    /// List available readers and writers
    Formats,
    /// Show the stored unit hierarchy
    Tree {
        /// Print as JSON instead of an ASCII tree
        #[arg(long)]
        json: bool,
    },
}

/// Log to stderr so exports written to stdout stay clean.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "interlinear=info".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn open_database(config: &Config) -> anyhow::Result<Database> {
    let db = match &config.database {
        Some(path) => Database::open(path.clone())?,
        None => Database::open_default()?,
    };
    db.migrate()?;
    Ok(db)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.database = Some(db);
    }

    let readers = ReaderRegistry::with_defaults()?;
    let writers = WriterRegistry::with_defaults()?;

    match cli.command {
        Commands::Import { format, infile } => {
            let source = fs::read_to_string(&infile)
                .with_context(|| format!("Failed to read {}", infile.display()))?;
            let db = open_database(&config)?;
            formats::import(&readers, &db, &format, &source)?;
        }
        Commands::Export {
            format,
            outfile,
            root,
            skip,
        } => {
            if root.is_some() {
                config.export.root = root;
            }
            if !skip.is_empty() {
                config.export.skip = skip;
            }

            let db = open_database(&config)?;
            if outfile.as_os_str() == "-" {
                let stdout = io::stdout();
                let mut out = stdout.lock();
                formats::export(&writers, &db, &format, &config.export, &mut out)?;
            } else {
                // A failed export must not leave a file behind.
                let mut buffer = Vec::new();
                formats::export(&writers, &db, &format, &config.export, &mut buffer)?;
                fs::write(&outfile, &buffer)
                    .with_context(|| format!("Failed to write {}", outfile.display()))?;
            }
        }
        Commands::Formats => {
            for identifier in readers.identifiers() {
                let reader = readers.get(identifier)?;
                println!("reader  {:<10}  {}", identifier, reader.description());
            }
            for identifier in writers.identifiers() {
                let writer = writers.get(identifier)?;
                println!("writer  {:<10}  {}", identifier, writer.description());
            }
        }
        Commands::Tree { json } => {
            let db = open_database(&config)?;
            let tree = db.get_unit_tree()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&tree)?);
            } else {
                print!("{}", render::render_tree(&tree));
            }
        }
    }

    Ok(())
}
