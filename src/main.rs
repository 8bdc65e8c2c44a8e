use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{Cell, ContentArrangement, Table, presets};

use sqlpool::logging::{self, LogOptions};
use sqlpool::statement::split_statements;
use sqlpool::{PoolOptions, Session, Statement, pool_mgr};

/// Run SQL through a bounded connection pool configured from `DB_*` variables.
#[derive(Parser, Debug)]
#[command(name = "sqlpool", version, about)]
struct Cli {
    /// Log level, overridden by RUST_LOG directives
    #[arg(long, env = "LOG_LEVEL", default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch rows and print them as a table
    Query { sql: String },
    /// Run one write statement in its own transaction
    Exec { sql: String },
    /// Run the `;`-separated statements of FILE as one transaction
    Batch { file: PathBuf },
    /// Open the pool and print its statistics
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_options = LogOptions {
        level: cli.log_level.clone(),
        ..LogOptions::from_env()
    };
    let _log_guard = logging::init(&log_options)?;

    let options = PoolOptions::from_env().context("failed to load pool configuration")?;
    pool_mgr()
        .scoped(&options, |session| run(cli.command, session))
        .await
}

async fn run(command: Commands, session: Session) -> Result<()> {
    match command {
        Commands::Query { sql } => {
            let result = session.fetch_tabular(&sql).await;
            if let Some(err) = result.error {
                anyhow::bail!(err);
            }
            let mut table = Table::new();
            table
                .load_preset(presets::UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(result.columns.iter().map(Cell::new));
            for row in &result.rows {
                table.add_row(row.iter().map(|v| Cell::new(v.to_string())));
            }
            println!("{table}");
            println!("{} row(s)", result.rows.len());
        }
        Commands::Exec { sql } => {
            let status = session.execute(&Statement::new(sql)).await?;
            println!("{} row(s) affected", status.rows_affected);
            if let Some(id) = status.last_insert_id.filter(|id| *id > 0) {
                println!("last insert id: {id}");
            }
        }
        Commands::Batch { file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let statements: Vec<Statement> = split_statements(&text)
                .into_iter()
                .map(Statement::from)
                .collect();
            let summary = session.execute_transaction(&statements).await?;
            println!(
                "committed {} statement(s), {} row(s) affected",
                summary.statements, summary.rows_affected
            );
        }
        Commands::Status => {
            let stats = session.stats();
            let mut table = Table::new();
            table
                .load_preset(presets::NOTHING)
                .set_header(vec!["TOTAL", "IDLE", "BORROWED", "WAITING", "MAX"]);
            table.add_row(vec![
                stats.total.to_string(),
                stats.idle.to_string(),
                stats.borrowed.to_string(),
                stats.waiting.to_string(),
                stats.max_size.to_string(),
            ]);
            println!("{table}");
        }
    }
    Ok(())
}
