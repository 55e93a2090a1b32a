pub mod buffer;
pub mod db;
pub mod error;
pub mod store;
pub mod types;

pub use buffer::{Buffer, BlobProcessor};
pub use error::{BufferError, Result};
pub use store::BufferStore;
pub use types::{BufferEntry, ChatModalResponse};
