//! # MTB Bus - Event Fan-out for Daemon Sessions
//!
//! Routes module state changes to the client sessions that asked for them.
//!
//! ## Flow
//!
//! ```text
//! ┌──────────────┐   Vec<ModuleEvent>   ┌──────────────────┐
//! │   Registry   │ ───────────────────→ │ EventDispatcher  │
//! │  (mutation)  │                      │  targets(event)  │
//! └──────────────┘                      └────────┬─────────┘
//!                                                │ try_send
//!                    ┌───────────────────────────┼──────────────┐
//!                    ▼                           ▼              ▼
//!              EventQueue(s1)              EventQueue(s2)     ...
//! ```
//!
//! ## Rules
//!
//! - State mutations never talk to sessions directly; they return events and
//!   the caller publishes them.
//! - Routing is a pure function of the event and the [`SubscriptionIndex`].
//! - Publishing never blocks: a session whose queue is full is disconnected
//!   instead of silently missing an event.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod events;
pub mod index;
pub mod publisher;
pub mod subscriber;

pub use events::{EventTopic, ModuleEvent};
pub use index::SubscriptionIndex;
pub use publisher::{EventDispatcher, EventPublisher};
pub use subscriber::{EventQueue, QueueError, SessionId};

/// Events buffered per session before it is considered lagging.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;
