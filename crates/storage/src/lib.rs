//! Persistence for Periscope: the part codec and the SQLite chat store.

pub mod codec;
pub mod row;
pub mod store;

pub use codec::{decode, encode};
pub use row::PartRow;
pub use store::ChatStore;
