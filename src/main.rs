//! Record Store - command line entry point.
//!
//! Connects to the configured database, runs one command against the users table, and
//! disposes the pool.

use record_store::config::{Command, Config};
use record_store::db::{ConnectionPool, Repository, SessionFactory};
use record_store::error::DbError;
use record_store::models::{NewUser, User};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    // Logs go to stderr; stdout carries command output.
    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

async fn run(command: Command, users: &Repository<User>) -> Result<(), DbError> {
    match command {
        Command::InitSchema => {
            users.ensure_table().await?;
            println!("{} ready", users.table_name());
        }
        Command::CreateUser {
            email,
            hashed_password,
            name,
            last_name,
        } => {
            let mut draft = NewUser::new(email, hashed_password, name);
            draft.last_name = last_name;
            let user = users.create(draft).await?;
            info!(%user, "Created user");
            print_json(&user)?;
        }
        Command::GetUser { id } => match users.get_by_id(id).await? {
            Some(user) => print_json(&user)?,
            None => {
                return Err(DbError::invalid_input(format!("No user with id {}", id)));
            }
        },
    }
    Ok(())
}

fn print_json(user: &User) -> Result<(), DbError> {
    let json = serde_json::to_string_pretty(user)
        .map_err(|e| DbError::internal(format!("Failed to serialize user: {e}")))?;
    println!("{json}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse configuration from .env, command line and environment
    let config = Config::load();

    // Initialize logging
    init_tracing(&config);

    info!("Starting record-store v{}", env!("CARGO_PKG_VERSION"));

    let connection_string = config.connection_string()?;
    let pool = ConnectionPool::initialize(&connection_string, config.pool_options()).await?;
    let users: Repository<User> = Repository::new(SessionFactory::new(pool.clone()));

    let result = run(config.command.clone(), &users).await;

    pool.dispose().await;

    if let Err(e) = result {
        error!(error = %e, suggestion = ?e.suggestion(), "Command failed");
        return Err(e.into());
    }

    Ok(())
}
