use clap::Parser;
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

use groundwork::config::{Cli, Command, Config};
use groundwork::state::{AppState, DbPool};
use groundwork::{admin, db, routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;
    let pool = db::create_pool(&config.db_path())?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::InitDb => admin::init_db(&pool),
        Command::PromoteLeader => {
            db::run_migrations(&pool)?;
            let stdin = std::io::stdin();
            let promoted = admin::promote_leader(&pool, &mut stdin.lock(), &mut std::io::stdout())?;
            if !promoted {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Serve => serve(pool, config).await,
    }
}

async fn serve(pool: DbPool, config: Config) -> anyhow::Result<()> {
    // Ensure upload directories exist
    std::fs::create_dir_all(config.uploads_path())?;
    db::run_migrations(&pool)?;

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let app = routes::app(AppState::new(pool, config));

    tracing::info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
