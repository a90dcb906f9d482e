//! Worker side of the crawl task queue.
//!
//! [`TaskClient`] speaks the queue's HTTP API, [`WorkerLoop`] drives the
//! claim / work / report cycle, and [`TaskHandler`] is the seam where the
//! actual work plugs in. [`crawler::FetchHandler`] is the stock handler
//! that fetches each task's URL.

pub mod client;
pub mod crawler;
pub mod handler;
pub mod runner;

pub use client::{ClientError, TaskClient};
pub use handler::{HandlerError, TaskHandler};
pub use runner::{StepOutcome, WorkerLoop, WorkerStats};
