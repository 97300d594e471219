use std::net::SocketAddr;

pub mod docs;
pub mod pb;
pub mod routes;
pub mod service;

pub use pb::*;
pub use service::{Discover, DiscoverService};

/// Gateway address from the `PORT` env var, defaulting to 8080.
pub fn server_addr() -> Result<SocketAddr, std::net::AddrParseError> {
    addr_from_env("PORT", 8080)
}

/// Documentation server address from the `DOCS_PORT` env var, defaulting to 8081.
pub fn docs_addr() -> Result<SocketAddr, std::net::AddrParseError> {
    addr_from_env("DOCS_PORT", 8081)
}

fn addr_from_env(var: &str, default: u16) -> Result<SocketAddr, std::net::AddrParseError> {
    let port = std::env::var(var).unwrap_or_else(|_| default.to_string());
    format!("0.0.0.0:{port}").parse()
}
