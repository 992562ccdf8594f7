// Org-scoped document access: tenant-prefixed CRUD over a pluggable backend,
// query composition, and the tagged-value wire codec used by the REST
// fallback transport.

pub mod backend;
pub mod clock;
pub mod codec;
pub mod config;
pub mod error;
pub mod query;
pub mod rest;
pub mod scoped;

pub use backend::{Document, DocumentStore, MemoryStore, UnavailableStore};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use query::{Direction, OrderBy, Predicate, Query, QueryBuilder, QueryError};
pub use rest::RestStore;
pub use scoped::{OrgContext, ScopedStore};
