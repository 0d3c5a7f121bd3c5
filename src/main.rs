//! Recipe API server and operator commands.
//!
//! ```bash
//! recipe-api                      # same as `serve`
//! recipe-api migrate
//! recipe-api create-superuser --email admin@example.com --password s3cret!
//! recipe-api delete-user --email someone@example.com
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};

mod app;
mod auth;
mod cli;
mod config;
mod db;
mod error;
mod extract;
mod images;
mod recipes;
mod state;
mod storage;
mod users;
mod validation;

#[cfg(test)]
mod test_support;

use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "recipe-api")]
#[command(author, version, about = "Recipe management API")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Apply pending database migrations and exit
    Migrate,
    /// Create a staff superuser
    CreateSuperuser {
        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        password: String,
    },
    /// Delete a user together with their tags, ingredients and recipes
    DeleteUser {
        #[arg(short, long)]
        email: String,
    },
}

fn init_tracing() {
    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "recipe_api=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let args = Cli::parse();
    let config = AppConfig::from_env().context("loading configuration")?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let state = state::AppState::init(config).await?;
            app::serve(app::build_app(state)).await?;
        }
        Command::Migrate => cli::migrate(&config).await?,
        Command::CreateSuperuser { email, password } => {
            cli::create_superuser(&config, &email, &password).await?
        }
        Command::DeleteUser { email } => cli::delete_user(&config, &email).await?,
    }
    Ok(())
}
