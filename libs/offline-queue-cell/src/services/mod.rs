pub mod queue;
pub mod store;

pub use queue::OfflineQueue;
pub use store::{store_from_config, MemoryQueueStore, QueueStore, RedisQueueStore};
