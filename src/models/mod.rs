mod record;

pub use record::{Dimension, EventRecord, ScopeId};
