// src/channels/mod.rs

//! Typed in-process publish/subscribe over fibers.

mod channel;
mod queue_channel;
mod request_reply;
mod snapshot;
mod subscribers;

pub use channel::{Channel, ProducerThreadReceiver};
pub use queue_channel::QueueChannel;
pub use request_reply::{ChannelRequest, RequestReplyChannel};
pub use snapshot::SnapshotChannel;
pub use subscribers::{
  BatchSubscriber, ChannelSubscription, KeyedBatchSubscriber, LastSubscriber,
  MessageFilter,
};
