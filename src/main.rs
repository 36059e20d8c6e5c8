use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use procedure_roster::{api, config::ServerConfig, db};

#[derive(Parser)]
#[command(name = "roster")]
#[command(about = "Assign users to the procedures of a repair plan")]
struct Cli {
    /// SQLite database file (overrides PROCEDURE_ROSTER_DB)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port for HTTP API (overrides PROCEDURE_ROSTER_PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Address to bind (overrides PROCEDURE_ROSTER_HOST)
        #[arg(long)]
        host: Option<String>,
    },
    /// Create or upgrade the database schema
    Migrate,
    /// Load demo users, procedures and a plan
    Seed,
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG")
            .unwrap_or_else(|_| "procedure_roster=debug,tower_http=debug".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let db = config.open_database()?;
    let shutdown = CancellationToken::new();
    let app = api::create_router(db, shutdown.clone());

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Procedure roster listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutting down");
            shutdown.cancel();
        })
        .await?;

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let mut config = ServerConfig::from_env()?;
    if let Some(path) = cli.db {
        config.db_path = Some(path);
    }

    match cli.command {
        Some(Commands::Serve { port, host }) => {
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(host) = host {
                config.host = host;
            }
            serve(config).await?;
        }
        Some(Commands::Migrate) => {
            config.open_database()?;
            tracing::info!("Database schema is up to date");
        }
        Some(Commands::Seed) => {
            let db = config.open_database()?;
            let summary = db::seed_demo_data(&db)?;
            println!(
                "Seeded {} users, {} procedures, {} plan procedures",
                summary.users, summary.procedures, summary.plan_procedures
            );
        }
        None => serve(config).await?,
    }

    Ok(())
}
