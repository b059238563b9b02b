//! Quote records and the store that owns them.
//!
//! - [`types`] - the `Quote` record, validation, and the default seed list
//! - [`store`] - `QuoteStore`: persistence, filtering, reconcile, snapshots
//! - [`random`] - injectable random source behind `pick_random`
//! - [`snapshot`] - reading and writing exported snapshot files

mod random;
mod snapshot;
mod store;
mod types;

pub use random::{pick_index, RandomSource, SequenceRandom, StdRandom};
pub use snapshot::{read_snapshot, write_snapshot, EXPORT_FILE_NAME, MAX_SNAPSHOT_SIZE};
pub use store::{QuoteStore, SharedStore};
pub use types::{default_quotes, ImportError, Quote, ValidationError, ALL_CATEGORIES};
