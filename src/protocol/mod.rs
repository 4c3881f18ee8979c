//! Wire formats owned by the stream.

pub mod handshake;
pub mod sockjs;

pub use handshake::Handshake;
pub use sockjs::SockJsFrame;
