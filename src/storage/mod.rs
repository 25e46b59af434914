pub mod memory;
pub mod plan;
pub mod postgres;
pub mod sql;
pub mod sqlite;
pub mod trait_def;

pub use memory::MemoryStore;
pub use plan::{Grouping, QueryPlan, SortOrder};
pub use postgres::PostgresStore;
pub use sqlite::SqliteStore;
pub use trait_def::{GroupedRow, RecordStore, StoreError, StoreResult};
