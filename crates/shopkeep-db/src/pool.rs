//! # Database Pool Management
//!
//! Connection pool creation and configuration for SQLite.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Database Connection Pool                           │
//! │                                                                         │
//! │  App Startup                                                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ShopConfig::load() ─► DbConfig ← Configure pool settings              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::new(config).await ← Create pool + run migrations            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────┐                           │
//! │  │            SqlitePool                    │                           │
//! │  │  ┌─────┐ ┌─────┐ ┌─────┐ ┌─────┐       │                           │
//! │  │  │Conn1│ │Conn2│ │Conn3│ │Conn4│ ...   │  (max_connections)        │
//! │  │  └─────┘ └─────┘ └─────┘ └─────┘       │                           │
//! │  └─────────────────────────────────────────┘                           │
//! │       │                                                                 │
//! │       ├── reads: any free connection, in parallel                      │
//! │       └── writes: one UnitOfWork at a time (write lock)                │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## WAL Mode
//! SQLite WAL (Write-Ahead Logging) mode is enabled so history and balance
//! reads never wait on a workflow that is writing.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

use shopkeep_core::allocation::ShortfallPolicy;

use crate::error::{DbError, DbResult};
use crate::ledger::cash::CashLedger;
use crate::ledger::payment::PaymentTracker;
use crate::ledger::stock::StockLedger;
use crate::migrations;
use crate::unit_of_work::UnitOfWork;
use crate::workflow::expense::ExpenseWorkflow;
use crate::workflow::purchase::PurchaseWorkflow;
use crate::workflow::sale::SaleWorkflow;

// =============================================================================
// Configuration
// =============================================================================

/// Database configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/path/to/shop.db")
///     .max_connections(5)
///     .busy_timeout(Duration::from_secs(5));
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Maximum number of connections in the pool.
    /// Default: 5
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    /// Default: 1
    pub min_connections: u32,

    /// How long to wait for a free connection.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Idle timeout before closing a connection.
    /// Default: 10 minutes
    pub idle_timeout: Duration,

    /// How long SQLite retries a locked database before reporting busy.
    /// Default: 5 seconds
    pub busy_timeout: Duration,

    /// Whether to run migrations on connect.
    /// Default: true
    pub run_migrations: bool,

    /// Gym-client oversell answer for updates where nobody was asked.
    /// Default: Reject
    pub gym_shortfall: ShortfallPolicy,
}

impl DbConfig {
    /// Creates a new database configuration with the given path.
    ///
    /// The file is created if it doesn't exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
            gym_shortfall: ShortfallPolicy::Reject,
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    pub fn gym_shortfall(mut self, policy: ShortfallPolicy) -> Self {
        self.gym_shortfall = policy;
        self
    }

    /// Creates an in-memory database configuration (for testing).
    ///
    /// Each call yields an isolated, empty database.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(":memory:"),
            max_connections: 1, // In-memory requires single connection
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            busy_timeout: Duration::from_secs(1),
            run_migrations: true,
            gym_shortfall: ShortfallPolicy::Reject,
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Main database handle providing ledger and workflow access.
///
/// Cloning is cheap: clones share the pool and the write lock, so units of
/// work opened from any clone are serialised against each other.
///
/// ## Usage
/// ```rust,ignore
/// let db = Database::new(DbConfig::new("shop.db")).await?;
///
/// let sale = db.sales().add_sale(input).await?;
/// let balance = db.cash().current_balance().await?;
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    write_lock: Arc<Mutex<()>>,
    gym_shortfall: ShortfallPolicy,
}

impl Database {
    /// Creates a new database connection pool.
    ///
    /// ## What This Does
    /// 1. Creates the database file if it doesn't exist
    /// 2. Configures SQLite:
    ///    - WAL mode for concurrent reads
    ///    - NORMAL synchronous (balance of safety/speed)
    ///    - Foreign keys enabled
    ///    - busy timeout
    /// 3. Creates the connection pool
    /// 4. Runs migrations (if enabled)
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Initializing database connection"
        );

        // sqlite://path?mode=rwc creates the file if missing
        let connect_url = format!("sqlite://{}?mode=rwc", config.database_path.display());

        let connect_options = SqliteConnectOptions::from_str(&connect_url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            // SQLite has them disabled by default for backwards compatibility
            .foreign_keys(true)
            .busy_timeout(config.busy_timeout)
            .create_if_missing(true);

        debug!("Connection options configured");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "Database pool created"
        );

        let db = Database {
            pool,
            write_lock: Arc::new(Mutex::new(())),
            gym_shortfall: config.gym_shortfall,
        };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Applies all pending migrations. Idempotent.
    pub async fn run_migrations(&self) -> DbResult<()> {
        info!("Running database migrations");
        migrations::run_migrations(&self.pool).await?;
        info!("Migrations complete");
        Ok(())
    }

    /// Returns a reference to the connection pool.
    ///
    /// For reads only; writes go through [`Database::begin`].
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Opens a unit of work, waiting for any other writer to finish.
    pub async fn begin(&self, label: &'static str) -> DbResult<UnitOfWork> {
        UnitOfWork::begin(&self.pool, Arc::clone(&self.write_lock), label).await
    }

    /// Configured default for gym-client oversells.
    pub fn gym_shortfall(&self) -> ShortfallPolicy {
        self.gym_shortfall
    }

    pub fn stock(&self) -> StockLedger {
        StockLedger::new(self.clone())
    }

    pub fn cash(&self) -> CashLedger {
        CashLedger::new(self.clone())
    }

    pub fn payments(&self) -> PaymentTracker {
        PaymentTracker::new(self.clone())
    }

    /// Customer and gym-client sales.
    pub fn sales(&self) -> SaleWorkflow {
        SaleWorkflow::new(self.clone())
    }

    /// Wholesalers, bills and product batches.
    pub fn purchases(&self) -> PurchaseWorkflow {
        PurchaseWorkflow::new(self.clone())
    }

    pub fn expenses(&self) -> ExpenseWorkflow {
        ExpenseWorkflow::new(self.clone())
    }

    /// Closes the database connection pool.
    ///
    /// After calling close, every ledger operation fails.
    pub async fn close(&self) {
        info!("Closing database connection pool");
        self.pool.close().await;
    }

    /// Checks if the database is responsive.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_database() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.health_check().await);

        let (total, applied) = migrations::migration_status(db.pool()).await.unwrap();
        assert_eq!(total, applied);
    }

    #[test]
    fn test_config_builder() {
        let config = DbConfig::new("/tmp/shop.db")
            .max_connections(10)
            .min_connections(2)
            .busy_timeout(Duration::from_secs(9))
            .run_migrations(false)
            .gym_shortfall(ShortfallPolicy::Proceed);

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
        assert_eq!(config.busy_timeout, Duration::from_secs(9));
        assert!(!config.run_migrations);
        assert_eq!(config.gym_shortfall, ShortfallPolicy::Proceed);
        assert_eq!(DbConfig::in_memory().gym_shortfall, ShortfallPolicy::Reject);
    }

    #[tokio::test]
    async fn test_clones_share_write_lock() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let other = db.clone();

        let uow = db.begin("holder").await.unwrap();
        assert!(other.write_lock.try_lock().is_err());
        uow.commit().await.unwrap();
        assert!(other.write_lock.try_lock().is_ok());
    }
}
