//! Single-record profile persistence.

mod store;

pub use store::ProfileStore;
