//! SQLite persistence layer for the SMS gateway.
//!
//! This crate provides async database operations for users, provider
//! gateways, phone numbers, conversations and messages using SQLx with SQLite.
//!
//! # Example
//!
//! ```no_run
//! use database::{conversation, phone_number, user, Database, NewPhoneNumber};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("sqlite:sms-gateway.db?mode=rwc").await?;
//!     db.migrate().await?;
//!
//!     let admin = user::create_admin(db.pool(), "acme").await?;
//!     let number = phone_number::upsert_phone_number(
//!         db.pool(),
//!         &NewPhoneNumber {
//!             number: "+14155551234".to_string(),
//!             friendly_name: None,
//!             provider_sid: None,
//!             provider: "twilio".to_string(),
//!             gateway_id: None,
//!             tenant_id: admin.id,
//!             capabilities: vec!["sms".to_string()],
//!             purchased_at: None,
//!             monthly_rate: None,
//!         },
//!     )
//!     .await?;
//!
//!     let (conversation, _) =
//!         conversation::find_or_create(db.pool(), number.id, "+19998887777", None).await?;
//!     println!("conversation {}", conversation.id);
//!     Ok(())
//! }
//! ```

pub mod conversation;
pub mod error;
pub mod gateway;
pub mod message;
pub mod models;
pub mod phone_number;
pub mod user;

pub use error::{DatabaseError, Result};
pub use models::{
    Conversation, ConversationFlags, Gateway, Message, MessageDirection, MessageStatus,
    NewMessage, NewPhoneNumber, PhoneNumber, ProviderKind, UnknownProvider, User, UserRole,
};

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;

/// Database connection wrapper.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Default pool size for database connections.
    const DEFAULT_POOL_SIZE: u32 = 20;

    /// How long a connection waits on another connection's write lock.
    const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

    /// Connect to a SQLite database.
    ///
    /// The URL should be in the format `sqlite:path/to/db.sqlite?mode=rwc`.
    /// Use `?mode=rwc` to create the database file if it doesn't exist.
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_pool_size(url, Self::DEFAULT_POOL_SIZE).await
    }

    /// Connect to a SQLite database with a custom pool size.
    ///
    /// In-memory databases are per-connection, so `sqlite::memory:` should be
    /// opened with a pool size of 1.
    pub async fn connect_with_pool_size(url: &str, pool_size: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Self::BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await?;

        tracing::info!(
            "Connected to database: {} (pool size: {})",
            url,
            pool_size
        );

        Ok(Self { pool })
    }

    /// Open a migrated in-memory database. Intended for tests.
    pub async fn in_memory() -> Result<Self> {
        let db = Self::connect_with_pool_size("sqlite::memory:", 1).await?;
        db.migrate().await?;
        Ok(db)
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        tracing::info!("Running database migrations...");

        sqlx::migrate!("./migrations").run(&self.pool).await?;

        tracing::info!("Migrations complete");
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
