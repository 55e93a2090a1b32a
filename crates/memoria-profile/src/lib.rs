pub mod db;
pub mod error;
pub mod store;
pub mod truncate;
pub mod types;

pub use error::{ProfileError, Result};
pub use store::ProfileStore;
pub use truncate::truncate_profiles;
pub use types::{Profile, ProfileAttributes, TruncateOptions};
