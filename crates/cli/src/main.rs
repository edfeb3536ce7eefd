//! LA RED MAFIA CLI - database migrations and store management.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront and session-store migrations
//! la-red-cli migrate
//!
//! # Create a member, optionally with a starting balance
//! la-red-cli user create -e fan@example.com -p 'correct horse battery' --tokens 500
//!
//! # Grant tokens to an existing member
//! la-red-cli tokens grant -e fan@example.com -a 250
//!
//! # Insert or update products from YAML
//! la-red-cli catalog import catalog.yaml
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "la-red-cli")]
#[command(author, version, about = "LA RED MAFIA storefront tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage members
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Manage token balances
    Tokens {
        #[command(subcommand)]
        action: TokensAction,
    },
    /// Manage the product catalog
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a member with a password
    Create {
        /// Member email address
        #[arg(short, long)]
        email: String,

        /// Password (at least 8 characters)
        #[arg(short, long)]
        password: String,

        /// Tokens to credit after creation
        #[arg(short, long, default_value_t = 0)]
        tokens: i64,
    },
}

#[derive(Subcommand)]
enum TokensAction {
    /// Credit tokens to a member
    Grant {
        /// Member email address
        #[arg(short, long)]
        email: String,

        /// Tokens to add
        #[arg(short, long)]
        amount: i64,
    },
}

#[derive(Subcommand)]
enum CatalogAction {
    /// Insert or update products from a YAML list
    Import {
        /// Path to the YAML file
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::User { action } => match action {
            UserAction::Create {
                email,
                password,
                tokens,
            } => commands::users::create(&email, &password, tokens).await?,
        },
        Commands::Tokens { action } => match action {
            TokensAction::Grant { email, amount } => {
                commands::tokens::grant(&email, amount).await?;
            }
        },
        Commands::Catalog { action } => match action {
            CatalogAction::Import { file } => commands::catalog::import(&file).await?,
        },
    }
    Ok(())
}
