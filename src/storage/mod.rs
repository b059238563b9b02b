mod key_value;
mod memory;
mod schema;
mod types;

pub use memory::MemoryStore;
pub use schema::Database;
pub use types::{
    DatabaseError, KeyValueStore, StorageError, LAST_VIEWED_KEY, QUOTES_KEY, SELECTED_FILTER_KEY,
};
