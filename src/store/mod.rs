/*!
 * Store Module
 *
 * In-memory dictionary engine:
 * - Shift-add key hasher
 * - Owned bucket chains with full key comparison
 * - Load-triggered growth with relinking by cached hash
 * - Single global guard serializing all operations
 */

mod entry;
mod growth;
mod guard;
mod hash;
mod table;

pub use entry::Entry;
pub use growth::GrowthPolicy;
pub use guard::{DictStore, ValueInfo};
pub use hash::{bucket_index, hash_bytes};
pub use table::{Iter, SetOutcome, StoreStats, Table};

/// Reference-counted handle passed to request handlers
pub type SharedStore = std::sync::Arc<DictStore>;
