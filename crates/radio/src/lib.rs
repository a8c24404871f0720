//! glucolink radio bridge
//!
//! Types for decoded insulin-pump packets and the link resource that
//! delivers them. Framing and the pump command protocol live in the
//! transport; this crate starts at validated, decoded messages.

pub mod loopback;
pub mod packet;
pub mod radio;

pub use loopback::{LoopbackRadioBridge, RadioFeeder};
pub use packet::{
    AlertBody, MessageBody, PacketCategory, PumpMessage, PumpStatusReading, RadioPacket,
    UnknownBody,
};
pub use radio::RadioBridge;
