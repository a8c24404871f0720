//! glucolink CGM
//!
//! Glucose readings as produced by the transmitter decoder, and the link
//! resource that delivers them. The transmitter's session and encryption
//! protocol is handled upstream of this crate.

pub mod loopback;
pub mod reading;
pub mod transmitter;

pub use loopback::{LoopbackTransmitter, TransmitterFeeder};
pub use reading::{DecodeError, GlucoseReading, TransmitterEvent};
pub use transmitter::Transmitter;
