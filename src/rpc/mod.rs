//! # Remote Procedure Interface
//!
//! Transport-neutral wire records, the projection from decoded messages to
//! those records and a service trait a network transport can be built on.

pub mod projection;
pub mod service;
pub mod types;

pub use projection::{device_key, to_parameter, to_wire_message};
pub use service::{MiHomeRpc, MiHomeService};
pub use types::{
    CommandAck, CommandKind, CommandRequest, MessageFilter, Parameter, ParameterValue, SensorKey,
    WireMessage, WirePowerMode, WireValveState,
};
