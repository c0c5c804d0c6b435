//! SQL Manager - Main entry point.
//!
//! Runs one operation against the configured database and prints the result
//! as JSON on stdout. Logs go to stderr.

use clap::Parser;
use serde_json::Value as JsonValue;
use sql_manager::config::{Command, Config, StatementArgs};
use sql_manager::models::{Arg, Statement};
use sql_manager::{Manager, PoolManager};
use std::path::Path;
use tokio::io::AsyncReadExt;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn bind_args(args: &StatementArgs) -> Vec<Arg> {
    args.args.iter().cloned().map(Some).collect()
}

/// Read a JSON array of statements from `file`, or from stdin.
async fn read_batch(file: Option<&Path>) -> Result<Vec<Statement>, Box<dyn std::error::Error>> {
    let input = match file {
        Some(path) => tokio::fs::read_to_string(path).await?,
        None => {
            let mut buf = String::new();
            tokio::io::stdin().read_to_string(&mut buf).await?;
            buf
        }
    };
    Ok(serde_json::from_str(&input)?)
}

async fn run(manager: &dyn Manager, command: &Command) -> Result<JsonValue, Box<dyn std::error::Error>> {
    let output = match command {
        Command::Exec(args) => JsonValue::from(manager.exec(&args.sql, &bind_args(args)).await?),
        Command::Query(args) => {
            let mapping = args.mapping();
            let rows = manager
                .query(&args.statement.sql, &bind_args(&args.statement), mapping.as_ref())
                .await?;
            JsonValue::Array(rows.into_iter().map(JsonValue::Object).collect())
        }
        Command::QueryOne(args) => {
            let mapping = args.mapping();
            manager
                .query_one(&args.statement.sql, &bind_args(&args.statement), mapping.as_ref())
                .await?
                .map_or(JsonValue::Null, JsonValue::Object)
        }
        Command::Scalar(args) => manager
            .exec_scalar(&args.sql, &bind_args(args))
            .await?
            .unwrap_or(JsonValue::Null),
        Command::Count(args) => JsonValue::from(manager.count(&args.sql, &bind_args(args)).await?),
        Command::Batch { file } => {
            let statements = read_batch(file.as_deref()).await?;
            info!(statements = statements.len(), "Running batch");
            JsonValue::from(manager.exec_batch(&statements).await?)
        }
    };
    Ok(output)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse configuration from command line and environment
    let config = Config::parse();

    // Initialize logging
    init_tracing(&config);

    let conn_config = config.connection_config()?;
    info!(
        db_type = %conn_config.db_type,
        url = %conn_config.masked_connection_string(),
        "Starting SQL manager v{}",
        env!("CARGO_PKG_VERSION")
    );

    let manager = PoolManager::connect(&conn_config).await?;
    let result = run(&manager, &config.command).await;
    manager.close().await;

    match result {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Operation failed");
            Err(e)
        }
    }
}
