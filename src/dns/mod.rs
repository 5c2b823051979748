//! Authoritative DNS responder and its wire codec.

mod responder;
mod server;
mod wire;

pub use responder::{Responder, Zone, MAX_ADDRS};
pub use server::{bind_socket, run_server, ServerStats};
