//! Guidebook CLI - database migrations and operations.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations (and the session table)
//! gb-cli migrate
//!
//! # Create a password account, optionally already paid
//! gb-cli user create -e reader@example.pl -p 'long password' --paid
//!
//! # Run one partner mail batch
//! gb-cli mail run [--force] [--fast-minutes N]
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "gb-cli")]
#[command(author, version, about = "Guidebook storefront CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage accounts
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Partner chapter mailing
    Mail {
        #[command(subcommand)]
        action: MailAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a password account
    Create {
        /// Account e-mail address
        #[arg(short, long)]
        email: String,

        /// Password (at least 8 characters)
        #[arg(short, long)]
        password: String,

        /// Create the account as already paid
        #[arg(long)]
        paid: bool,
    },
}

#[derive(Subcommand)]
enum MailAction {
    /// Send chapters for due schedules
    Run {
        /// Send every active schedule regardless of its send time
        #[arg(long)]
        force: bool,

        /// Schedule the next send this many minutes ahead instead of the cadence
        #[arg(long)]
        fast_minutes: Option<u32>,
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

async fn run(cli: Cli) -> Result<(), commands::CliError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::User { action } => match action {
            UserAction::Create {
                email,
                password,
                paid,
            } => {
                commands::user::create(&email, &password, paid).await?;
            }
        },
        Commands::Mail { action } => match action {
            MailAction::Run {
                force,
                fast_minutes,
            } => {
                commands::mail::run(force, fast_minutes).await?;
            }
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_parses_mail_run_flags() {
        let cli = Cli::try_parse_from(["gb-cli", "mail", "run", "--force", "--fast-minutes", "3"])
            .unwrap();
        match cli.command {
            Commands::Mail {
                action:
                    MailAction::Run {
                        force,
                        fast_minutes,
                    },
            } => {
                assert!(force);
                assert_eq!(fast_minutes, Some(3));
            }
            _ => panic!("expected mail run"),
        }
    }
}
