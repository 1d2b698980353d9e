//! # Circles Server
//!
//! Runs one Circles node: the client API, the node-to-node payload endpoint,
//! and the sharing engine behind both.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use circles_api::{build_router, AppState};
use circles_common::{auth::generate_access_token, config::AppConfig};
use circles_db::Database;
use circles_federation::{notify::TracingSink, EngineSettings, HttpTransport, SharingFrameService};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "circles", version, about = "Federated circles sharing node")]
struct Cli {
    /// Config file (TOML); defaults to ./config.toml when present.
    #[arg(long, short, global = true, env = "CIRCLES_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the node (default).
    Serve,
    /// Mint an access token for a user, for development and scripting.
    IssueToken {
        #[arg(long)]
        user: String,
        #[arg(long)]
        name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = circles_common::config::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::IssueToken { user, name } => {
            let display_name = name.as_deref().unwrap_or(&user);
            let token = generate_access_token(
                &user,
                display_name,
                &config.auth.jwt_secret,
                config.auth.access_token_ttl_secs,
            )?;
            println!("{token}");
            Ok(())
        }
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "circles=debug,tower_http=debug".into());
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    if json {
        builder.json().init();
    } else {
        builder.with_thread_ids(true).init();
    }
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    init_tracing(config.server.json_logs);

    tracing::info!("Starting Circles v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Node address: {}", config.server.local_address);

    let db = Database::connect(&config.database).await?;
    db.migrate().await?;

    let transport = HttpTransport::new(&config.federation)?.with_local_auth(config.auth.jwt_secret.clone());
    let engine = SharingFrameService::new(
        db.clone(),
        transport,
        Arc::new(TracingSink),
        EngineSettings::from_config(&config),
    );

    let state = AppState { db, engine: Arc::new(engine), jwt_secret: config.auth.jwt_secret.clone() };
    let router = build_router(state);

    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);
    tracing::info!("Listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
