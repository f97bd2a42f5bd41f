//! WebSocket transport: wire protocol, connection hub and per-connection pumps

pub mod handler;
pub mod hub;
pub mod protocol;
pub mod pump;

pub use hub::Hub;
