//! Per-connection session glue and the top-level server that binds
//! endpoints and drives accept/dispatch. See spec §4.7 and §3.

pub mod client;
pub mod server;
pub mod session;

pub use client::ClientRegistry;
pub use server::Server;
pub use session::Session;
