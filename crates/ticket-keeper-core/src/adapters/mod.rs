//! # Infrastructure Adapters
//!
//! Implementations of the store, event publisher, scheduler and
//! acknowledgement interfaces, both in-memory and platform-backed.

pub mod callback_scheduler;
pub mod filesystem_store;
pub mod gemini;
pub mod memory_store;
pub mod pubsub_publisher;
pub mod recording_publisher;
pub mod recording_scheduler;
pub mod tracing_publisher;

pub use callback_scheduler::{CallbackScheduler, CallbackSchedulerConfig};
pub use filesystem_store::FilesystemTicketStore;
pub use gemini::{GeminiAcknowledgement, GeminiConfig};
pub use memory_store::InMemoryTicketStore;
pub use pubsub_publisher::{PubSubConfig, PubSubEventPublisher, PUBSUB_BASE_URL};
pub use recording_publisher::RecordingEventPublisher;
pub use recording_scheduler::RecordingScheduler;
pub use tracing_publisher::TracingEventPublisher;
