//! Fiber-based concurrency toolkit for Rust.
//!
//! Strand provides serial execution contexts ("fibers") backed by pluggable
//! strategies, a typed publish/subscribe channel layer with batched delivery
//! strategies, and a timer scheduling service. Producer threads hand work and
//! messages to logically single-threaded consumers without the consumer
//! needing its own locking.

pub mod channels;
pub mod context;
pub mod error;
pub mod executor;
pub mod fibers;
pub mod queues;
pub mod registry;
pub mod scheduling;

// Public re-exports for convenience
pub use channels::{Channel, QueueChannel, RequestReplyChannel, SnapshotChannel};
pub use context::{Action, Disposable, ExecutionContext, ScheduledTask};
pub use error::{PrimingError, QueueFull};
pub use fibers::{ExecutionStrategy, Fiber, FiberContext, StubFiber, ThreadPool};
pub use scheduling::Scheduler;
