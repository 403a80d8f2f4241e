//! # Transactional Store
//!
//! A base key-value store plus an arena of copy-on-write overlay scopes.
//!
//! | Piece | File | Purpose |
//! |-------|------|---------|
//! | `KvStore` | `kv.rs` | Base store trait and in-memory implementation |
//! | `StateArena` | `arena.rs` | Nested scopes that commit into their parent or are discarded |
//! | Key layout | `keys.rs` | Prefixes and key builders for persisted records |

pub mod arena;
pub mod keys;
pub mod kv;

pub use arena::{ScopeId, StateArena, ROOT_SCOPE};
pub use kv::{KvPair, KvStore, MemStore, Order, ReadOnlyStore};
