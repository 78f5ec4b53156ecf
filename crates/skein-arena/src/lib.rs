//! Chunk stores for captured trace events.
//!
//! Events are written into fixed-capacity [`Chunk`]s which are checked
//! out of, and returned to, a [`ChunkStore`]. Two strategies exist:
//!
//! - [`RingStore`] recycles a fixed number of slots through a free-index
//!   queue and never reports full; the oldest data is overwritten.
//! - [`GrowStore`] appends a slot per acquisition up to a ceiling and
//!   then reports full, keeping everything it has.
//!
//! A slot whose chunk is checked out holds `None`, so a writer's chunk
//! and the store never alias. Stores are plain data; the engine
//! serializes access with its store lock.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod chunk;
pub mod config;
pub mod error;
pub mod grow;
pub mod ring;
pub mod store;

pub use chunk::Chunk;
pub use config::{StoreConfig, StoreKind};
pub use error::StoreError;
pub use grow::GrowStore;
pub use ring::RingStore;
pub use store::{ChunkStore, StoreIter, StoreSnapshot};
