pub mod command;
pub mod host;
pub mod node_identifier;
pub mod status;
pub mod wire;

pub use command::*;
pub use host::{AgentEndpoint, DispatchTarget, NewHost};
pub use node_identifier::{is_node_identifier_str_valid, NodeIdentifier, NodeIdentifierSpec};
pub use status::CommandStatusCode;
pub use wire::{
    Command, CommandData, CommandStatus, CommandStatusReq, LogData, LogLine, LogReq, RepStatus,
    WireMessage,
};
