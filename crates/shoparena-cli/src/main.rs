//! Shoparena CLI - operator command-line interface
//!
//! Usage:
//!   shoparena [--config <file>] <command>
//!   shoparena migrate
//!   shoparena category add <name>
//!   shoparena category list [--json]
//!   shoparena account deactivate --role <buyer|seller> --email <email>
//!   shoparena account activate --role <buyer|seller> --email <email>
//!   shoparena token revoke <token>
//!
//! Author: Shoparena developers

use anyhow::Context;
use clap::{Parser, Subcommand};
use shoparena_core::config::AppConfig;
use shoparena_core::postgres::{self, PgAccountStore, PgStore};
use shoparena_core::{BlacklistStore, CatalogStore, Role};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "shoparena")]
#[command(about = "Shoparena marketplace operator CLI")]
#[command(version)]
struct Cli {
    /// TOML configuration file; environment variables override its values
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Manage product categories
    Category {
        #[command(subcommand)]
        action: CategoryAction,
    },
    /// Manage buyer and seller accounts
    Account {
        #[command(subcommand)]
        action: AccountAction,
    },
    /// Manage session tokens
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
}

#[derive(Subcommand)]
enum CategoryAction {
    /// Create a category
    Add { name: String },
    /// List all categories
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum AccountAction {
    /// Mark an account inactive; its tokens stop working immediately
    Deactivate {
        #[arg(long)]
        role: Role,
        #[arg(long)]
        email: String,
    },
    /// Mark an account active again
    Activate {
        #[arg(long)]
        role: Role,
        #[arg(long)]
        email: String,
    },
}

#[derive(Subcommand)]
enum TokenAction {
    /// Blacklist a token value
    Revoke { token: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shoparena_core=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let file = cli
        .config
        .clone()
        .or_else(|| std::env::var_os("SHOPARENA_CONFIG").map(PathBuf::from));
    let config = AppConfig::load(file).context("Failed to load configuration")?;
    let pool = postgres::connect(&config.database)
        .await
        .context("Failed to connect to PostgreSQL")?;
    let store = PgStore::new(pool.clone());

    match cli.command {
        Commands::Migrate => {
            store.migrate().await?;
            println!("Migrations applied");
        }
        Commands::Category { action } => match action {
            CategoryAction::Add { name } => {
                let category = store.create_category(&name).await?;
                println!("Created category {} ({})", category.name, category.id);
            }
            CategoryAction::List { json } => {
                let categories = store.list_categories().await?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&categories)?);
                } else {
                    for category in categories {
                        println!("{:>6}  {}", category.id, category.name);
                    }
                }
            }
        },
        Commands::Account { action } => {
            let (role, email, active) = match action {
                AccountAction::Deactivate { role, email } => (role, email, false),
                AccountAction::Activate { role, email } => (role, email, true),
            };
            let accounts = PgAccountStore::new(pool, role);
            if !accounts.set_active(&email, active).await? {
                anyhow::bail!("No {role} registered under {email}");
            }
            let state = if active { "activated" } else { "deactivated" };
            println!("{role} {email} {state}");
        }
        Commands::Token { action } => match action {
            TokenAction::Revoke { token } => {
                if store.insert(&token).await? {
                    println!("Token revoked");
                } else {
                    println!("Token was already revoked");
                }
            }
        },
    }

    Ok(())
}
