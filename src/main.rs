//! pgbridge MCP server - main entry point.
//!
//! Loads configuration, builds the database tool dispatcher and serves MCP
//! over stdin/stdout until the client closes the stream.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use pgbridge::db::PgDatabase;
use pgbridge::mcp::McpServer;
use pgbridge::tools::{database_tools, Dispatcher, ToolCatalog};
use pgbridge::types::{load_config, CONFIG_PATH_ENV};

#[derive(Debug, Parser)]
#[command(name = "pgbridge-mcp", version, about = "MCP tool server for PostgreSQL")]
struct Args {
    /// Path to the JSON configuration file.
    #[arg(long, env = CONFIG_PATH_ENV)]
    config: Option<PathBuf>,

    /// Print the tool summary and exit.
    #[arg(long)]
    print_tools: bool,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run(Args::parse()).await {
        eprintln!("pgbridge-mcp: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    if args.print_tools {
        let mut catalog = ToolCatalog::new();
        for (descriptor, _) in database_tools() {
            catalog.register(descriptor)?;
        }
        println!("{}", catalog.generate_prompt());
        return Ok(());
    }

    dotenvy::dotenv().ok();

    let config = Arc::new(load_config(args.config.as_deref())?);
    pgbridge::observability::init_tracing(&config.observability);

    let database = PgDatabase::from_config(&config.database)?;
    let dispatcher = Arc::new(Dispatcher::with_database_tools(Arc::new(database))?);

    tracing::info!(
        "pgbridge {} serving {} tools on stdio (database {})",
        env!("CARGO_PKG_VERSION"),
        dispatcher.list_tools().len(),
        config.database.redacted_url(),
    );

    let server = McpServer::new(dispatcher, config.server.clone());
    tokio::select! {
        result = server.serve_stdio() => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, shutting down");
        }
    }

    Ok(())
}
