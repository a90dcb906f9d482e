//! Domain core for the crawlq task queue.
//!
//! Holds the error taxonomy, status enums, schema and payload validation,
//! queue policy, the [`queue::QueueStore`] storage contract with its
//! in-memory engine, and the [`queue::TaskQueue`] service that the HTTP
//! layer drives. Nothing in here talks to the network.

pub mod error;
pub mod payload;
pub mod policy;
pub mod progress;
pub mod queue;
pub mod record;
pub mod schema;
pub mod status;
pub mod types;
