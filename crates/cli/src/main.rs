//! Notekeeper CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! nk-cli migrate
//!
//! # Create a user who can log in immediately
//! nk-cli user create -e ada@example.com -f Ada -l Lovelace -p analytical
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "nk-cli")]
#[command(author, version, about = "Notekeeper CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage users
    User {
        #[command(subcommand)]
        action: UserAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a verified user, skipping the email code flow
    Create {
        /// Email address
        #[arg(short, long)]
        email: String,

        /// First name
        #[arg(short, long)]
        first_name: String,

        /// Last name
        #[arg(short, long)]
        last_name: String,

        /// Login password (omit to create a user without one)
        #[arg(short, long)]
        password: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::User { action } => match action {
            UserAction::Create {
                email,
                first_name,
                last_name,
                password,
            } => {
                let id = commands::user::create(commands::user::CreateUser {
                    email: &email,
                    first_name: &first_name,
                    last_name: &last_name,
                    password: password.as_deref(),
                })
                .await?;
                tracing::info!("Created user {id}");
            }
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_user_create() {
        let cli = Cli::try_parse_from([
            "nk-cli", "user", "create", "-e", "a@x.com", "-f", "Ada", "-l", "Lovelace",
        ])
        .expect("parse");

        match cli.command {
            Commands::User {
                action: UserAction::Create { email, password, .. },
            } => {
                assert_eq!(email, "a@x.com");
                assert!(password.is_none());
            }
            Commands::Migrate => panic!("expected user create"),
        }
    }

    #[test]
    fn test_parse_migrate() {
        let cli = Cli::try_parse_from(["nk-cli", "migrate"]).expect("parse");
        assert!(matches!(cli.command, Commands::Migrate));
    }
}
