use async_trait::async_trait;
use thiserror::Error;

// ============================================================================
// Storage Keys
// ============================================================================

/// Durable key holding the full quote collection as a JSON array.
pub const QUOTES_KEY: &str = "quotes";

/// Durable key holding the last chosen category filter.
pub const SELECTED_FILTER_KEY: &str = "selectedFilter";

/// Session-scoped key holding the most recently displayed quote.
pub const LAST_VIEWED_KEY: &str = "lastViewedQuote";

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised by a [`KeyValueStore`] backend.
///
/// All of these are recoverable: callers log them and keep their in-memory
/// state authoritative for the rest of the session.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The value would push the backend past its size limit
    #[error("Storage quota exceeded: {size} bytes requested, limit is {quota} bytes")]
    QuotaExceeded { size: usize, quota: usize },

    /// The backend rejected or failed the write
    #[error("Storage write failed: {0}")]
    WriteFailed(String),

    /// The backend could not be read
    #[error("Storage read failed: {0}")]
    ReadFailed(String),
}

/// Errors opening the SQLite-backed durable store.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another instance of the application has locked the database
    #[error("Another instance of quotebox appears to be running. Please close it and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        if is_lock_error(&err.to_string()) {
            return DatabaseError::InstanceLocked;
        }
        DatabaseError::Other(err)
    }
}

/// SQLITE_BUSY (5), SQLITE_LOCKED (6) and SQLITE_CANTOPEN (14) all surface
/// as one of these messages.
pub(crate) fn is_lock_error(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("database is locked")
        || message.contains("database table is locked")
        || message.contains("sqlite_busy")
        || message.contains("sqlite_locked")
        || message.contains("unable to open database file")
}

// ============================================================================
// KeyValueStore
// ============================================================================

/// Byte-valued key-value persistence.
///
/// Writes are whole-value: a successful `set` replaces the previous value
/// entirely, a failed one leaves it untouched.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch the value stored under `key`, or `None` if it was never set.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;

    /// Delete `key`. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}
