pub mod client;
pub mod codec;
pub mod handshake;
pub mod message;
pub mod time;
pub mod transport;
