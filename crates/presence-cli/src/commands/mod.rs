pub mod anchor;
pub mod common;
pub mod config;
pub mod handshake;
