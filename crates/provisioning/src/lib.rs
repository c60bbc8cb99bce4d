//! Provisioning: the durable job queue, its in-memory implementation, the
//! worker that drains it, and the advisory transport wrapper.

pub mod job;
pub mod memory_queue;
pub mod queue;
pub mod transport;
pub mod worker;

pub use job::{truncate_error, JobState, ProvisioningJob};
pub use memory_queue::InMemoryProvisioningQueue;
pub use queue::{ProvisioningQueue, QueueError};
pub use transport::{LoggingNotifier, MemoryBusNotifier, NotifyingQueue, QueueNotifier};
pub use worker::{process_next_job, run_forever, run_once};
