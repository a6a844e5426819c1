//! Library crate for port-sniffer: a full-range TCP connect scanner and its HTTP front end.
pub mod ports;
pub mod probe;
pub mod scanner;
pub mod server;
pub mod types;
