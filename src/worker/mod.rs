//! # Worker Module
//!
//! Supervision of the external scan/test worker process.
//!
//! This module handles:
//! - Dispatching operation requests to worker invocations
//! - Launching and observing the single active worker process
//! - Parsing the worker's line-delimited JSON status stream
//! - Queueing status events for polling clients
//! - Forced termination and hardware recovery after failures

pub mod event;
pub mod channel;
pub mod request;
pub mod supervisor;

pub use channel::UpdateChannel;
pub use event::{StatusEvent, WorkerStatus};
pub use request::{OperationRequest, ScanParams, TestKind};
pub use supervisor::{Phase, WorkerSupervisor};
