//! Transports: raw TCP and WebSocket, both feeding the same [`Session`]
//! driver.

mod session;
pub mod tcp;
pub mod ws;

pub use session::{CloseSignal, Session};
