use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use schema_rev::config::{self, Config};
use schema_rev::utils::init_logging;
use schema_rev::{Migrator, SchemaFile, SchemaRevClient};

#[derive(Parser)]
#[command(name = "schema_rev")]
#[command(about = "Generate and apply reversible schema migrations")]
struct Cli {
    /// Path of the TOML configuration file
    #[arg(long, short, default_value = "schema_rev.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Append a migration bringing the log up to the head schema
    Generate {
        /// Head schema file, overriding `[migrations] schema`
        #[arg(long)]
        schema: Option<PathBuf>,
    },
    /// Move the database to a revision
    Migrate {
        /// Target revision, defaults to the newest
        #[arg(long, allow_negative_numbers = true)]
        to: Option<i64>,
        /// Only record the revision, without running any DDL
        #[arg(long)]
        fake: bool,
    },
    /// Print the revision recorded in the database
    Revision,
    /// Print the operations of every migration
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::load_from_file(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    init_logging(&config.logging)?;

    match cli.command {
        Command::Generate { schema } => generate(&config, schema),
        Command::Migrate { to, fake } => {
            let mut client = SchemaRevClient::new(config).await?;
            let revision = client.migrate(to, fake).await?;
            println!("Database is at revision {}", revision);
            Ok(())
        }
        Command::Revision => {
            let client = SchemaRevClient::new(config).await?;
            println!("{}", client.db_revision().await?);
            Ok(())
        }
        Command::Show => show(&config),
    }
}

fn generate(config: &Config, schema: Option<PathBuf>) -> Result<()> {
    let path = schema
        .or_else(|| config.migrations.schema.as_ref().map(PathBuf::from))
        .context("no head schema given; pass --schema or set [migrations] schema")?;

    let mut migrator = Migrator::from_config(&config.migrations);
    match migrator.generate(&SchemaFile::new(path))? {
        Some(migration) => {
            println!("Generated migration {}", migration.number);
            for op in &migration.operations {
                println!("  {}", op);
            }
        }
        None => println!("No changes"),
    }
    Ok(())
}

fn show(config: &Config) -> Result<()> {
    let mut migrator = Migrator::from_config(&config.migrations);
    let log = migrator.ensure_loaded()?;

    for migration in log.migrations() {
        println!("Migration {}", migration.number);
        for op in &migration.operations {
            println!("  {}", op);
        }
    }
    Ok(())
}
