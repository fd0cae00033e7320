//! External-collaborator transports (§1 "out of scope, external
//! collaborators"): the outbound TCP connector used by both transport
//! shapes, and the WebSocket adapter for the streaming transport.

pub mod client;
pub mod connector;
pub mod ws;
