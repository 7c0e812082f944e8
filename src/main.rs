use std::{sync::Arc, time::Duration};

use clap::{Parser, Subcommand};
use reelnote::{AppState, auth, build_router, config::Config, db};

#[derive(Debug, Parser)]
#[command(name = "reelnote", about = "Movie discovery and review API")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP API (default).
    Serve,
    /// Create a user and print its API token.
    CreateUser {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,reelnote=debug,sqlx=warn".to_string()),
        )
        .init();

    let cli = Cli::parse();
    let config = Arc::new(Config::from_env()?);
    let db = db::connect_and_migrate(&config.database_url).await?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::CreateUser { name, email } => {
            let (user, token) = auth::create_user(&db, &name, &email).await?;
            println!("user {} created, token: {token}", user.id);
        },
        Command::Serve => {
            let http = reqwest::Client::builder()
                .user_agent("reelnote/0.1")
                .timeout(Duration::from_secs(config.http_timeout_secs))
                .build()?;

            let state = Arc::new(AppState::new(config.clone(), db, http));
            let app = build_router(state);

            let listener = tokio::net::TcpListener::bind(config.addr).await?;
            tracing::info!(addr = %config.addr, "listening");
            axum::serve(listener, app).await?;
        },
    }

    Ok(())
}
