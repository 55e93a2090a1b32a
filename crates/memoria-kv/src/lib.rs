pub mod cache;
pub mod lock;

pub use cache::{InProcessCache, TtlCache};
pub use lock::{DistributedLock, InProcessLock, LockGuard};
