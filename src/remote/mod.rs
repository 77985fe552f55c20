//! Remote command server.
//!
//! Operators send `modify_gui`, `update_settings` and `add_function` requests
//! over TCP. Each request is applied through the detection cycle's control
//! queue and, once applied, recorded in the update journal.

mod handler;
mod protocol;
mod server;
mod session;

pub use handler::CommandHandler;
pub use protocol::{ProtocolError, decode_command, parse_request};
pub use server::CommandServer;
pub use session::serve_session;
