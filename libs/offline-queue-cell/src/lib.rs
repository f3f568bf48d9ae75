//! Server-side queue for mutations made while a clinic device was offline.
//!
//! Clients post batches of create/update/delete operations against patients,
//! appointments and visits, then trigger a replay once connectivity returns.
//! Storage is Redis when configured and process memory otherwise.

pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{EnqueueRequest, QueueError, QueuedMutation, ReplayReport};
pub use router::offline_queue_routes;
pub use services::{store_from_config, MemoryQueueStore, OfflineQueue, QueueStore};
