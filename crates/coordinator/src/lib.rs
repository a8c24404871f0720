//! glucolink Coordinator
//!
//! Reconciles the pump radio bridge and the glucose transmitter with the
//! configured identifiers, routes their traffic through deduplication and
//! the propagation throttle, and keeps the companion display in sync.
//!
//! All state lives on one task. Setters, link traffic and dispatch
//! completions are queued as [`Command`]s and handled in order.

pub mod actor;
pub mod command;
pub mod coordinator;
pub mod error;
pub mod factory;
pub mod sink;

pub use actor::{spawn, CoordinatorHandle};
pub use command::{Command, CoordinatorEvent, CoordinatorSnapshot, IgnoreReason, RouteOutcome};
pub use coordinator::{CoordinatorBuilder, DeviceCoordinator};
pub use error::{CoordinatorError, CoordinatorResult};
pub use factory::{DeviceFactory, LoopbackFactory};
pub use sink::{GlucoseSample, GlucoseSampleSink, MemorySampleSink, SinkError, UnavailableSink};
