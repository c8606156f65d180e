//! Conversation session storage.

mod memory;
mod store;

pub use memory::InMemorySessionStore;
pub use store::SessionStore;
